// ClipExtractor - container file -> frames -> feature vectors -> selection
//
// One extractor processes one clip at a time (`&mut self`). Frame and hop
// lengths are derived from each clip's own sample rate, so a 44.1 kHz
// recording and a 16 kHz buffer are both cut into the configured durations.

use std::borrow::Cow;
use std::path::Path;

use super::dedup::{SegmentDeduplicator, SelectedFeatures};
use super::frames::FrameSegmenter;
use super::mfcc::{pre_emphasize, FrameAnalyzer, MfccPipeline};
use crate::audio::format::{decode_pcm16, ContainerHeader, HEADER_LEN};
use crate::config::ExtractionConfig;
use crate::error::{log_extraction_error, ExtractionError};

/// Runs the extraction pipeline over whole clips
pub struct ClipExtractor<A: FrameAnalyzer = MfccPipeline> {
    config: ExtractionConfig,
    analyzer: A,
}

impl ClipExtractor<MfccPipeline> {
    /// Extractor backed by the MFCC pipeline
    ///
    /// # Errors
    /// `Configuration` if `config` fails validation
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractionError> {
        let analyzer = MfccPipeline::new(&config)?;
        Ok(Self { config, analyzer })
    }
}

impl<A: FrameAnalyzer> ClipExtractor<A> {
    /// Extractor backed by a custom frame analyzer
    pub fn with_analyzer(config: ExtractionConfig, analyzer: A) -> Result<Self, ExtractionError> {
        config.validate()?;
        Ok(Self { config, analyzer })
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn analyzer(&self) -> &A {
        &self.analyzer
    }

    /// Extract from a WAV file written by the capture worker
    ///
    /// The payload is decoded at the sample rate recorded in the header.
    ///
    /// # Errors
    /// - `FileNotFound` if `path` does not exist
    /// - `InvalidContainer` for a malformed, unfinalized or truncated file,
    ///   or a format other than mono 16-bit PCM
    /// - `EmptyFeatureSet` if no frame survives selection
    pub fn extract_file<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<SelectedFeatures, ExtractionError> {
        let path = path.as_ref();
        let result = self.extract_file_inner(path);
        if let Err(err) = &result {
            log_extraction_error(err, &format!("extract_file({})", path.display()));
        }
        result
    }

    fn extract_file_inner(&mut self, path: &Path) -> Result<SelectedFeatures, ExtractionError> {
        if !path.exists() {
            return Err(ExtractionError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let bytes = std::fs::read(path)?;
        let header = ContainerHeader::parse(&bytes)?;
        let payload_len = bytes.len() - HEADER_LEN;

        if header.data_len == 0 && payload_len > 0 {
            return Err(ExtractionError::InvalidContainer {
                reason: format!(
                    "header not finalized: data length 0 with {} payload bytes",
                    payload_len
                ),
            });
        }
        if header.data_len as usize > payload_len {
            return Err(ExtractionError::InvalidContainer {
                reason: format!(
                    "declared data length {} exceeds {} payload bytes",
                    header.data_len, payload_len
                ),
            });
        }
        if header.channels != 1 || header.bits_per_sample != 16 {
            return Err(ExtractionError::InvalidContainer {
                reason: format!(
                    "expected mono 16-bit PCM, found {} ch x {} bit",
                    header.channels, header.bits_per_sample
                ),
            });
        }

        let payload = &bytes[HEADER_LEN..HEADER_LEN + header.data_len as usize];
        tracing::debug!(
            "[ClipExtractor] {}: {} Hz, {} data bytes",
            path.display(),
            header.sample_rate,
            header.data_len
        );
        self.run(&decode_pcm16(payload), header.sample_rate)
    }

    /// Extract from raw 16-bit little-endian PCM at `sample_rate`
    pub fn extract_pcm(
        &mut self,
        pcm: &[u8],
        sample_rate: u32,
    ) -> Result<SelectedFeatures, ExtractionError> {
        self.extract_samples(&decode_pcm16(pcm), sample_rate)
    }

    /// Extract from normalized samples at `sample_rate`
    pub fn extract_samples(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<SelectedFeatures, ExtractionError> {
        let result = self.run(samples, sample_rate);
        if let Err(err) = &result {
            log_extraction_error(err, "extract_samples");
        }
        result
    }

    fn run(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<SelectedFeatures, ExtractionError> {
        let segmenter = FrameSegmenter::from_durations(
            sample_rate,
            self.config.frame_duration_secs,
            self.config.hop_duration_secs,
        )?;
        self.analyzer.prepare(sample_rate, segmenter.frame_len())?;

        let samples: Cow<[f32]> = if self.config.apply_pre_emphasis {
            Cow::Owned(pre_emphasize(samples, self.config.pre_emphasis))
        } else {
            Cow::Borrowed(samples)
        };

        let mut dedup = SegmentDeduplicator::new(self.config.sentinel);
        for frame in segmenter.frames(&samples) {
            dedup.offer(self.analyzer.analyze(frame.samples));
        }

        let stats = dedup.stats();
        tracing::info!(
            "[ClipExtractor] {} frames: {} retained, {} sentinel, {} duplicate, {} invalid",
            stats.frames_seen,
            stats.retained(),
            stats.sentinel_frames,
            stats.duplicate_frames,
            stats.invalid_frames
        );

        dedup.finish()
    }
}
