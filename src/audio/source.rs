//! Input device abstractions consumed by the capture worker.
//!
//! A [`PcmDevice`] is a not-yet-opened input. The capture worker acquires it
//! into a [`PcmSource`] on its own thread, so sources never cross threads and
//! may wrap platform handles that are not `Send`.

use crate::audio::AudioStreamConfig;
use crate::error::CaptureError;

/// An input device that can be opened for one recording session
pub trait PcmDevice: Send + 'static {
    /// Human-readable device name for logs
    fn name(&self) -> String;

    /// Open the device in `config`'s format
    ///
    /// # Errors
    /// `CaptureError::DeviceInit` when the device cannot be acquired. The
    /// controller reports this from `start` and does not retry.
    fn acquire(&mut self, config: &AudioStreamConfig) -> Result<Box<dyn PcmSource>, CaptureError>;
}

/// An opened input producing 16-bit little-endian PCM bytes
pub trait PcmSource {
    /// Read the next chunk into `buf`
    ///
    /// May block. `Ok(0)` is a transient miss; the capture loop backs off
    /// and retries instead of treating it as end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError>;

    /// Release the underlying device handle
    ///
    /// Called exactly once by the capture worker after the last read.
    fn release(&mut self) {}
}
