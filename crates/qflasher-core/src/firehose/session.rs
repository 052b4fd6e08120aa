//! Firehose session engine

use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{FlashConfig, StorageType};
use crate::error::{Error, Result};
use crate::progress::FlashProgress;
use crate::sparse::read_full;
use crate::transport::Transport;

use super::command::{ConfigureCommand, FirehoseCommand, ResponseCommand, ResponseValue};
use super::response::parse_messages;
use super::script::load_script;

/// Payload size offered in the first configure
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 8192;

const RX_BUFFER_SIZE: usize = 4096;

const COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);
const CONFIGURE_TIMEOUT: Duration = Duration::from_millis(5000);
const ERASE_TIMEOUT: Duration = Duration::from_millis(15000);
const PROGRAM_ACK_TIMEOUT: Duration = Duration::from_millis(3000);
const RAW_DATA_TIMEOUT: Duration = Duration::from_millis(15000);
const PROGRAM_DONE_TIMEOUT: Duration = Duration::from_millis(6000);
const BOOTABLE_TIMEOUT: Duration = Duration::from_millis(3000);
const RESET_TIMEOUT: Duration = Duration::from_millis(3000);

const DRAIN_DELAY: Duration = Duration::from_millis(300);
const DRAIN_TIMEOUT: Duration = Duration::from_millis(100);
const DRAIN_MAX_READS: usize = 8;

/// Counts of a completed Firehose run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FirehoseReport {
    /// Erase commands acknowledged
    pub erased: usize,
    /// Erase commands that failed
    pub erase_failed: usize,
    /// Program commands completed
    pub programmed: usize,
    /// Program commands that failed validation or transfer
    pub program_failed: usize,
    /// Patch entries present in the script and not executed
    pub patches_ignored: usize,
}

impl FirehoseReport {
    /// Returns true when every erase and program command succeeded
    pub fn is_clean(&self) -> bool {
        self.erase_failed == 0 && self.program_failed == 0
    }
}

/// A Firehose session over an open transport
pub struct FirehoseSession<T: Transport> {
    transport: T,
    dir: PathBuf,
    commands: Vec<FirehoseCommand>,
    storage: StorageType,
    set_bootable: bool,
    reset_delay_secs: u32,
    max_payload_size: u32,
    configured: bool,
    rx: Vec<u8>,
    pending: VecDeque<FirehoseCommand>,
}

impl<T: Transport> FirehoseSession<T> {
    /// Create a session for an already parsed command table
    ///
    /// `dir` is the directory program file names are resolved against.
    pub fn new(
        transport: T,
        dir: impl Into<PathBuf>,
        commands: Vec<FirehoseCommand>,
        config: &FlashConfig,
    ) -> Self {
        Self {
            transport,
            dir: dir.into(),
            commands,
            storage: config.storage,
            set_bootable: config.set_bootable,
            reset_delay_secs: config.reset_delay_secs,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            configured: false,
            rx: vec![0u8; RX_BUFFER_SIZE],
            pending: VecDeque::new(),
        }
    }

    /// Create a session from the rawprogram script in `dir`
    pub fn from_dir(transport: T, dir: &Path, config: &FlashConfig) -> Result<Self> {
        let commands = load_script(&dir.join(&config.script_name))?;
        Ok(Self::new(transport, dir, commands, config))
    }

    /// The command table
    pub fn commands(&self) -> &[FirehoseCommand] {
        &self.commands
    }

    /// Negotiated maximum payload size
    pub fn max_payload_size(&self) -> u32 {
        self.max_payload_size
    }

    /// Returns true once configure has been acknowledged
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Give the transport back
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Run the whole session: configure, erase, program, reset
    ///
    /// Individual erase and program failures are counted in the report;
    /// only a failed configure or reset fails the run.
    pub fn run(&mut self, progress: &mut dyn FlashProgress) -> Result<FirehoseReport> {
        self.drain();
        self.configure()?;

        let mut report = FirehoseReport {
            patches_ignored: self
                .commands
                .iter()
                .filter(|c| matches!(c, FirehoseCommand::Patch(_)))
                .count(),
            ..Default::default()
        };
        if report.patches_ignored > 0 {
            log::info!("Ignoring {} patch entries", report.patches_ignored);
        }

        self.erase_all(&mut report);
        self.program_all(&mut report, progress);
        log::info!(
            "Firehose: {} erased ({} failed), {} programmed ({} failed)",
            report.erased,
            report.erase_failed,
            report.programmed,
            report.program_failed
        );

        if self.set_bootable {
            if let Err(e) = self.set_bootable_storage_drive() {
                log::error!("setbootablestoragedrive failed: {}", e);
            }
        }
        self.reset()?;
        Ok(report)
    }

    /// Discard unsolicited messages such as the programmer banner
    pub fn drain(&mut self) {
        thread::sleep(DRAIN_DELAY);
        for message in self.pending.drain(..) {
            log::debug!("Drained {}", message.kind());
        }

        for _ in 0..DRAIN_MAX_READS {
            let n = self.transport.read(&mut self.rx, DRAIN_TIMEOUT);
            if n == 0 {
                break;
            }
            for message in parse_messages(&self.rx[..n]) {
                match message {
                    FirehoseCommand::Log { message } => log::info!("TARGET: {}", message),
                    other => log::debug!("Drained {}", other.kind()),
                }
            }
        }
    }

    /// Negotiate the session parameters
    ///
    /// A NAK advertising a different payload size is answered with exactly
    /// one configure using that size.
    pub fn configure(&mut self) -> Result<()> {
        let mut cfg = ConfigureCommand::new(self.storage, DEFAULT_MAX_PAYLOAD_SIZE);
        self.send(&FirehoseCommand::Configure(cfg.clone()))?;
        let mut resp = self.wait_response(CONFIGURE_TIMEOUT, "configure response")?;

        if resp.value == ResponseValue::Nak {
            if let Some(size) = resp.max_payload_size_to_target.filter(|&s| s > 0) {
                log::info!("Target supports {} byte payloads, reconfiguring", size);
                cfg.max_payload_size_to_target = size;
                self.send(&FirehoseCommand::Configure(cfg.clone()))?;
                resp = self.wait_response(CONFIGURE_TIMEOUT, "configure response")?;
            }
        }

        if !resp.is_ack() {
            log::error!("Configure rejected: {:?}", resp.value);
            return Err(Error::ConfigureRejected(format!("{:?}", resp.value)));
        }

        self.max_payload_size = cfg.max_payload_size_to_target;
        self.configured = true;
        log::info!(
            "Firehose configured: {} storage, {} byte payloads",
            self.storage,
            self.max_payload_size
        );
        Ok(())
    }

    /// Execute every erase entry with a non-zero sector size
    pub fn erase_all(&mut self, report: &mut FirehoseReport) {
        for idx in 0..self.commands.len() {
            let FirehoseCommand::Erase(erase) = &self.commands[idx] else {
                continue;
            };
            if erase.sector_size == 0 {
                log::debug!("Skipping erase with zero sector size: {}", erase.xml);
                continue;
            }
            let cmd = self.commands[idx].clone();

            match self.execute(&cmd, ERASE_TIMEOUT, "erase response") {
                Ok(()) => report.erased += 1,
                Err(e) => {
                    log::error!("Erase failed: {}", e);
                    report.erase_failed += 1;
                }
            }
        }
    }

    /// Validate and execute every program entry starting at sector 0
    ///
    /// Entries with another start sector continue an image split over
    /// several entries and are not sent on their own.
    pub fn program_all(&mut self, report: &mut FirehoseReport, progress: &mut dyn FlashProgress) {
        for idx in 0..self.commands.len() {
            let FirehoseCommand::Program(program) = &self.commands[idx] else {
                continue;
            };
            if program.start_sector != Some(0) {
                log::debug!("Skipping continuation entry for {}", program.filename);
                continue;
            }

            match self.program(idx, progress) {
                Ok(()) => report.programmed += 1,
                Err(e) => {
                    log::error!("Cannot flash this file: {}", e);
                    report.program_failed += 1;
                }
            }
        }
    }

    fn program(&mut self, idx: usize, progress: &mut dyn FlashProgress) -> Result<()> {
        let FirehoseCommand::Program(program) = &mut self.commands[idx] else {
            return Ok(());
        };
        let path = program.validate(&self.dir)?;
        let sector_size = program.sector_size;
        let name = program.filename.clone();
        let total = program.file_size;
        let cmd = self.commands[idx].clone();

        log::info!("Programming {} ({} bytes)", name, total);
        self.send(&cmd)?;
        let resp = self.wait_response(PROGRAM_ACK_TIMEOUT, "program response")?;
        if !resp.is_ack() {
            return Err(Error::Nak(format!("program of {}", name)));
        }
        if !resp.raw_mode {
            return Err(Error::Nak(format!("raw mode for {}", name)));
        }

        progress.transfer_started(&name, total);
        let streamed = self.stream_file(&path, sector_size, progress);
        progress.transfer_finished(streamed.is_ok());
        streamed?;

        let resp = self.wait_response(PROGRAM_DONE_TIMEOUT, "program completion")?;
        if !resp.is_ack() || resp.raw_mode {
            return Err(Error::Nak(format!("raw data of {}", name)));
        }
        log::info!("Programmed {}", name);
        Ok(())
    }

    /// Stream a file in payload-sized chunks, padding the last one to whole
    /// sectors
    fn stream_file(
        &mut self,
        path: &Path,
        sector_size: u32,
        progress: &mut dyn FlashProgress,
    ) -> Result<()> {
        let mut file = File::open(path).map_err(|source| Error::ImageOpen {
            path: path.to_path_buf(),
            source,
        })?;

        let sector = sector_size as usize;
        let payload = self.max_payload_size as usize;
        // Every chunk but the last must be whole sectors
        let chunk_len = if payload >= sector {
            payload - payload % sector
        } else {
            sector
        };

        let mut buf = vec![0u8; chunk_len];
        let mut sent = 0u64;
        loop {
            let n = read_full(&mut file, &mut buf)?;
            if n == 0 {
                break;
            }
            let padded = n.div_ceil(sector) * sector;
            buf[n..padded].fill(0);

            let written = self
                .transport
                .submit_write(&buf[..padded], true, RAW_DATA_TIMEOUT)?;
            if written != padded {
                return Err(Error::Transport(format!(
                    "short raw data write: {} of {} bytes",
                    written, padded
                )));
            }
            sent += n as u64;
            progress.transfer_progress(sent);

            if n < chunk_len {
                break;
            }
        }
        log::debug!("Streamed {} bytes from {}", sent, path.display());
        Ok(())
    }

    /// Select the boot storage drive
    pub fn set_bootable_storage_drive(&mut self) -> Result<()> {
        let value = u32::from(self.storage == StorageType::Ufs);
        self.execute(
            &FirehoseCommand::SetBootableStorageDrive { value },
            BOOTABLE_TIMEOUT,
            "setbootablestoragedrive response",
        )
    }

    /// Reset the target
    pub fn reset(&mut self) -> Result<()> {
        let cmd = FirehoseCommand::Reset {
            delay_secs: self.reset_delay_secs,
        };
        match self.execute(&cmd, RESET_TIMEOUT, "reset response") {
            Ok(()) => {
                log::info!("Target resetting in {} s", self.reset_delay_secs);
                Ok(())
            }
            Err(e) => {
                log::error!("Reset not acknowledged: {}", e);
                Err(Error::ResetNotAcknowledged)
            }
        }
    }

    /// Send a command and require an ACK
    fn execute(
        &mut self,
        cmd: &FirehoseCommand,
        timeout: Duration,
        what: &'static str,
    ) -> Result<()> {
        self.send(cmd)?;
        let resp = self.wait_response(timeout, what)?;
        if resp.is_ack() {
            Ok(())
        } else {
            Err(Error::Nak(cmd.kind().to_string()))
        }
    }

    fn send(&mut self, cmd: &FirehoseCommand) -> Result<()> {
        let frame = cmd.frame()?;
        log::debug!("SEND -> {}", cmd.to_xml());
        let written = self.transport.submit_write(&frame, true, COMMAND_TIMEOUT)?;
        if written != frame.len() {
            return Err(Error::Transport(format!(
                "short {} write: {} of {} bytes",
                cmd.kind(),
                written,
                frame.len()
            )));
        }
        Ok(())
    }

    /// Wait for the next `<response>`, logging any `<log>` messages
    ///
    /// A read that returns nothing means the transport timed out for the
    /// remaining time.
    pub fn wait_response(
        &mut self,
        timeout: Duration,
        what: &'static str,
    ) -> Result<ResponseCommand> {
        let deadline = Instant::now() + timeout;

        loop {
            while let Some(message) = self.pending.pop_front() {
                match message {
                    FirehoseCommand::Response(resp) => {
                        log::debug!(
                            "RECV <- {}",
                            FirehoseCommand::Response(resp.clone()).to_xml()
                        );
                        return Ok(resp);
                    }
                    FirehoseCommand::Log { message } => log::info!("TARGET: {}", message),
                    other => log::debug!("Ignoring {} message", other.kind()),
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let n = self.transport.read(&mut self.rx, remaining);
            if n == 0 {
                break;
            }
            self.pending.extend(parse_messages(&self.rx[..n]));
        }

        log::error!("Timed out waiting for {}", what);
        Err(Error::Timeout { timeout, what })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::firehose::parse_script;
    use crate::progress::NoProgress;
    use crate::transport::mock::MockTransport;
    use std::io::Cursor;

    fn doc(body: &str) -> Vec<u8> {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" ?>\n<data>\n{}\n</data>",
            body
        )
        .into_bytes()
    }

    fn ack(raw_mode: bool) -> Vec<u8> {
        doc(&format!("<response value=\"ACK\" rawmode=\"{}\" />", raw_mode))
    }

    fn nak() -> Vec<u8> {
        doc("<response value=\"NAK\" />")
    }

    fn session<'a>(
        t: &'a mut MockTransport,
        dir: &Path,
        script: &str,
    ) -> FirehoseSession<&'a mut MockTransport> {
        let commands = parse_script(Cursor::new(script.as_bytes())).unwrap();
        FirehoseSession::new(t, dir, commands, &FlashConfig::default())
    }

    fn position(texts: &[String], needle: &str) -> usize {
        texts
            .iter()
            .position(|t| t.contains(needle))
            .unwrap_or_else(|| panic!("{} not sent", needle))
    }

    #[test]
    fn test_end_to_end_corrects_sector_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sbl.mbn"), vec![0x11u8; 51_200]).unwrap();
        let script = r#"<?xml version="1.0" ?>
<data>
<program SECTOR_SIZE_IN_BYTES="512" filename="sbl.mbn" num_partition_sectors="50" physical_partition_number="0" start_sector="0" />
<erase SECTOR_SIZE_IN_BYTES="512" num_partition_sectors="100" physical_partition_number="0" start_sector="0" />
</data>
"#;

        let mut t = MockTransport::new(512);
        t.push_read(doc("<log value=\"INFO: Binary build date\" />"));
        t.push_read(Vec::new());
        t.push_read(ack(false)); // configure
        t.push_read(ack(false)); // erase
        t.push_read(ack(true)); // program
        t.push_read(ack(false)); // raw data
        t.push_read(ack(false)); // reset

        let mut s = session(&mut t, dir.path(), script);
        let report = s.run(&mut NoProgress).unwrap();
        assert!(s.is_configured());
        assert_eq!(report.erased, 1);
        assert_eq!(report.programmed, 1);
        assert!(report.is_clean());

        let texts = t.submitted_text();
        let erase = position(&texts, "<erase ");
        let program = position(&texts, "<program ");
        assert!(erase < program, "erase must precede program");
        assert!(texts[program].contains("num_partition_sectors=\"100\""));
        assert!(!texts[program].contains("num_partition_sectors=\"50\""));
        assert!(texts
            .last()
            .unwrap()
            .contains("<power DelayInSeconds=\"10\" value=\"reset\" />"));

        // 51200 bytes in 8192 byte payloads: six full chunks and 2048 bytes
        let data: Vec<&(Vec<u8>, bool)> =
            t.submits.iter().filter(|(d, _)| d[0] == 0x11).collect();
        let lens: Vec<usize> = data.iter().map(|(d, _)| d.len()).collect();
        assert_eq!(lens, vec![8192, 8192, 8192, 8192, 8192, 8192, 2048]);
        assert!(data.iter().all(|(_, zlp)| *zlp));
    }

    #[test]
    fn test_configure_nak_renegotiates_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = MockTransport::new(512);
        t.push_read(doc(
            "<response value=\"NAK\" MaxPayloadSizeToTargetInBytes=\"4096\" />",
        ));
        t.push_read(ack(false));

        let mut s = session(&mut t, dir.path(), "");
        s.configure().unwrap();
        assert!(s.is_configured());
        assert_eq!(s.max_payload_size(), 4096);

        let texts = t.submitted_text();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("MaxPayloadSizeToTargetInBytes=\"8192\""));
        assert!(texts[1].contains("MaxPayloadSizeToTargetInBytes=\"4096\""));
    }

    #[test]
    fn test_configure_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = MockTransport::new(512);
        t.push_read(doc(
            "<response value=\"NAK\" MaxPayloadSizeToTargetInBytes=\"4096\" />",
        ));
        t.push_read(nak());

        let mut s = session(&mut t, dir.path(), "");
        assert!(matches!(s.configure(), Err(Error::ConfigureRejected(_))));
        assert!(!s.is_configured());
        assert_eq!(s.max_payload_size(), DEFAULT_MAX_PAYLOAD_SIZE);
        drop(s);
        assert_eq!(t.submits.len(), 2);
    }

    #[test]
    fn test_configure_nak_without_size_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = MockTransport::new(512);
        t.push_read(nak());

        let mut s = session(&mut t, dir.path(), "");
        assert!(s.configure().is_err());
        drop(s);
        assert_eq!(t.submits.len(), 1);
    }

    #[test]
    fn test_logs_do_not_satisfy_wait() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = MockTransport::new(512);
        let mut buf = doc("<log value=\"INFO: Calling handler for configure\" />");
        buf.extend(ack(false));
        t.push_read(buf);

        let mut s = session(&mut t, dir.path(), "");
        s.configure().unwrap();
    }

    #[test]
    fn test_ack_survives_truncated_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = MockTransport::new(512);
        let mut buf = ack(false);
        buf.extend_from_slice(b"<?xml version=\"1.0\" ?>\n<data>\n");
        buf.extend_from_slice(b"<log value=\"INFO: partial");
        t.push_read(buf);

        let mut s = session(&mut t, dir.path(), "");
        s.configure().unwrap();
        assert!(s.is_configured());
    }

    #[test]
    fn test_ack_survives_unknown_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = MockTransport::new(512);
        let mut buf = ack(false);
        buf.extend(doc("<getsha256digest />"));
        t.push_read(buf);

        let mut s = session(&mut t, dir.path(), "");
        s.configure().unwrap();
        assert!(s.is_configured());
    }

    #[test]
    fn test_wait_response_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = MockTransport::new(512);
        t.push_read(doc("<log value=\"INFO: only a log\" />"));

        let mut s = session(&mut t, dir.path(), "");
        let err = s
            .wait_response(Duration::from_millis(50), "test response")
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { what: "test response", .. }));
    }

    #[test]
    fn test_zero_sector_size_never_sent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), vec![1u8; 512]).unwrap();
        let script = r#"<data>
<program SECTOR_SIZE_IN_BYTES="0" filename="a.bin" num_partition_sectors="1" start_sector="0" />
</data>"#;

        let mut t = MockTransport::new(512);
        let mut s = session(&mut t, dir.path(), script);
        let mut report = FirehoseReport::default();
        s.program_all(&mut report, &mut NoProgress);
        assert_eq!(report.program_failed, 1);
        drop(s);
        assert!(t.submits.is_empty());
    }

    #[test]
    fn test_program_failures_do_not_stop_pass() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.bin"), vec![0x22u8; 700]).unwrap();
        let script = r#"<data>
<program SECTOR_SIZE_IN_BYTES="512" filename="missing.bin" num_partition_sectors="1" start_sector="0" />
<program SECTOR_SIZE_IN_BYTES="512" filename="b.bin" num_partition_sectors="1" start_sector="0" />
<program SECTOR_SIZE_IN_BYTES="512" filename="b.bin" num_partition_sectors="1" start_sector="2" />
</data>"#;

        let mut t = MockTransport::new(512);
        t.push_read(ack(true));
        t.push_read(ack(false));
        let mut s = session(&mut t, dir.path(), script);
        let mut report = FirehoseReport::default();
        s.program_all(&mut report, &mut NoProgress);
        assert_eq!(report.programmed, 1);
        assert_eq!(report.program_failed, 1);
        drop(s);

        // Command plus one chunk padded to two sectors
        assert_eq!(t.submits.len(), 2);
        let (data, _) = &t.submits[1];
        assert_eq!(data.len(), 1024);
        assert!(data[..700].iter().all(|&b| b == 0x22));
        assert!(data[700..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_program_nak_fails_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), vec![1u8; 512]).unwrap();
        let script = r#"<program SECTOR_SIZE_IN_BYTES="512" filename="a.bin" num_partition_sectors="1" start_sector="0" />"#;

        let mut t = MockTransport::new(512);
        t.push_read(nak());
        let mut s = session(&mut t, dir.path(), script);
        let mut report = FirehoseReport::default();
        s.program_all(&mut report, &mut NoProgress);
        assert_eq!(report.program_failed, 1);
        drop(s);
        // No raw data after the NAK
        assert_eq!(t.submits.len(), 1);
    }

    #[test]
    fn test_program_requires_raw_mode() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), vec![1u8; 512]).unwrap();
        let script = r#"<program SECTOR_SIZE_IN_BYTES="512" filename="a.bin" num_partition_sectors="1" start_sector="0" />"#;

        let mut t = MockTransport::new(512);
        t.push_read(ack(false));
        let mut s = session(&mut t, dir.path(), script);
        let mut report = FirehoseReport::default();
        s.program_all(&mut report, &mut NoProgress);
        assert_eq!(report.program_failed, 1);
    }

    #[test]
    fn test_erase_failure_continues() {
        let dir = tempfile::tempdir().unwrap();
        let script = r#"<data>
<erase SECTOR_SIZE_IN_BYTES="2048" num_partition_sectors="64" start_sector="0" />
<erase SECTOR_SIZE_IN_BYTES="0" num_partition_sectors="64" start_sector="64" />
<erase SECTOR_SIZE_IN_BYTES="2048" num_partition_sectors="64" start_sector="128" />
</data>"#;

        let mut t = MockTransport::new(512);
        t.push_read(nak());
        t.push_read(ack(false));
        let mut s = session(&mut t, dir.path(), script);
        let mut report = FirehoseReport::default();
        s.erase_all(&mut report);
        assert_eq!(report.erased, 1);
        assert_eq!(report.erase_failed, 1);
        drop(s);
        assert_eq!(t.submits.len(), 2);
    }

    #[test]
    fn test_reset_not_acknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = MockTransport::new(512);
        let mut s = session(&mut t, dir.path(), "");
        assert!(matches!(s.reset(), Err(Error::ResetNotAcknowledged)));
    }

    #[test]
    fn test_set_bootable_before_reset() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = MockTransport::new(512);
        t.push_read(Vec::new());
        t.push_read(ack(false)); // configure
        t.push_read(ack(false)); // setbootablestoragedrive
        t.push_read(ack(false)); // reset

        let config = FlashConfig {
            storage: StorageType::Ufs,
            set_bootable: true,
            ..FlashConfig::default()
        };
        let mut s = FirehoseSession::new(&mut t, dir.path(), Vec::new(), &config);
        s.run(&mut NoProgress).unwrap();
        drop(s);

        let texts = t.submitted_text();
        assert_eq!(texts.len(), 3);
        assert!(texts[0].contains("MemoryName=\"ufs\""));
        assert!(texts[1].contains("<setbootablestoragedrive value=\"1\" />"));
        assert!(texts[2].contains("<power "));
    }

    #[test]
    fn test_from_dir_loads_script() {
        let dir = tempfile::tempdir().unwrap();
        let config = FlashConfig::default();
        std::fs::write(
            dir.path().join(&config.script_name),
            "<data>\n<erase SECTOR_SIZE_IN_BYTES=\"2048\" start_sector=\"0\" />\n</data>\n",
        )
        .unwrap();

        let mut t = MockTransport::new(512);
        let s = FirehoseSession::from_dir(&mut t, dir.path(), &config).unwrap();
        assert_eq!(s.commands().len(), 1);

        let mut t = MockTransport::new(512);
        let missing = tempfile::tempdir().unwrap();
        assert!(FirehoseSession::from_dir(&mut t, missing.path(), &config).is_err());
    }
}
