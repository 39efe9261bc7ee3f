// Frames module - overlapping analysis windows over a sample buffer
//
// Frame i covers samples [i * hop, i * hop + frame_len). The trailing
// partial frame is dropped, never zero-padded.

use crate::error::ExtractionError;

/// Splits sample buffers into fixed-length overlapping frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSegmenter {
    frame_len: usize,
    hop_len: usize,
}

/// One analysis window borrowed from the clip
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame<'a> {
    /// Position in the frame sequence
    pub index: usize,
    /// Sample offset of the first sample
    pub offset: usize,
    pub samples: &'a [f32],
}

impl FrameSegmenter {
    /// Create a segmenter from lengths in samples
    pub fn new(frame_len: usize, hop_len: usize) -> Result<Self, ExtractionError> {
        if frame_len == 0 || hop_len == 0 {
            return Err(ExtractionError::Configuration {
                reason: format!(
                    "frame length ({}) and hop length ({}) must be at least one sample",
                    frame_len, hop_len
                ),
            });
        }
        Ok(Self { frame_len, hop_len })
    }

    /// Create a segmenter from durations in seconds
    ///
    /// Lengths are `round(duration * sample_rate)`.
    ///
    /// # Errors
    /// `Configuration` for a zero rate, non-finite or negative durations, or
    /// durations too short to cover one sample
    pub fn from_durations(
        sample_rate: u32,
        frame_duration_secs: f64,
        hop_duration_secs: f64,
    ) -> Result<Self, ExtractionError> {
        if sample_rate == 0 {
            return Err(ExtractionError::Configuration {
                reason: "sample rate must be greater than 0".to_string(),
            });
        }
        let to_samples = |secs: f64, what: &str| {
            if !secs.is_finite() || secs < 0.0 {
                return Err(ExtractionError::Configuration {
                    reason: format!("{} duration must be a finite positive number (got {})", what, secs),
                });
            }
            Ok((secs * sample_rate as f64).round() as usize)
        };

        let frame_len = to_samples(frame_duration_secs, "frame")?;
        let hop_len = to_samples(hop_duration_secs, "hop")?;
        Self::new(frame_len, hop_len)
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn hop_len(&self) -> usize {
        self.hop_len
    }

    /// Number of full frames in `sample_count` samples
    pub fn frame_count(&self, sample_count: usize) -> usize {
        if sample_count < self.frame_len {
            0
        } else {
            (sample_count - self.frame_len) / self.hop_len + 1
        }
    }

    /// Lazily iterate the frames of `samples`
    ///
    /// Clones are cheap and resume from the same position.
    pub fn frames<'a>(&self, samples: &'a [f32]) -> Frames<'a> {
        Frames {
            samples,
            frame_len: self.frame_len,
            hop_len: self.hop_len,
            next_index: 0,
            remaining: self.frame_count(samples.len()),
        }
    }
}

/// Iterator over the frames of one buffer
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    samples: &'a [f32],
    frame_len: usize,
    hop_len: usize,
    next_index: usize,
    remaining: usize,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let index = self.next_index;
        let offset = index * self.hop_len;
        self.next_index += 1;
        self.remaining -= 1;
        Some(Frame {
            index,
            offset,
            samples: &self.samples[offset..offset + self.frame_len],
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Frames<'_> {}
