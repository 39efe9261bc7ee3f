// FFT module - windowed magnitude spectrum of one analysis frame
//
// The FFT size equals the frame length, so no zero padding happens and the
// spectrum has frame_len / 2 + 1 bins.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::WindowFunction;

/// Windowed forward FFT planned once for a fixed frame length
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    /// Plan the transform and pre-compute the window coefficients
    pub fn new(frame_len: usize, window: WindowFunction) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(frame_len);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft,
            window: window.coefficients(frame_len),
            buffer: Vec::with_capacity(frame_len),
            scratch,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.window.len()
    }

    /// Number of magnitude bins produced per frame
    pub fn bin_count(&self) -> usize {
        self.frame_len() / 2 + 1
    }

    /// Compute the magnitude spectrum of `frame` into `spectrum`
    ///
    /// Samples past the frame length are ignored; a short frame is padded
    /// with zeros.
    pub fn magnitude_spectrum(&mut self, frame: &[f32], spectrum: &mut Vec<f32>) {
        let frame_len = self.frame_len();

        self.buffer.clear();
        self.buffer.extend(
            frame
                .iter()
                .zip(&self.window)
                .map(|(&sample, &w)| Complex::new(sample * w, 0.0)),
        );
        self.buffer.resize(frame_len, Complex::new(0.0, 0.0));

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        spectrum.clear();
        spectrum.extend(self.buffer[..frame_len / 2 + 1].iter().map(|c| c.norm()));
    }
}
