//! Progress reporting for flashing sessions

/// Progress callback for long-running flash operations
///
/// Sahara multi-image sessions report device-side percentages per image;
/// Firehose program commands report host-side byte counts of the raw data
/// stream.
pub trait FlashProgress {
    /// Called when the device starts pulling a Sahara image
    fn image_started(&mut self, name: &str);

    /// Called for each device-side progress report of the current image
    fn image_progress(&mut self, percent: u32);

    /// Called when the device reports the end of the current image
    fn image_finished(&mut self, success: bool);

    /// Called before raw program data is streamed
    fn transfer_started(&mut self, name: &str, total_bytes: u64);

    /// Called after each raw data chunk
    fn transfer_progress(&mut self, bytes_sent: u64);

    /// Called when the raw data stream ends
    fn transfer_finished(&mut self, success: bool);
}

/// A no-op progress reporter
pub struct NoProgress;

impl FlashProgress for NoProgress {
    fn image_started(&mut self, _name: &str) {}
    fn image_progress(&mut self, _percent: u32) {}
    fn image_finished(&mut self, _success: bool) {}
    fn transfer_started(&mut self, _name: &str, _total_bytes: u64) {}
    fn transfer_progress(&mut self, _bytes_sent: u64) {}
    fn transfer_finished(&mut self, _success: bool) {}
}
