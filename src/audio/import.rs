//! Import arbitrary WAV files through hound.
//!
//! Clips written by the capture worker are read with [`ContainerHeader`]
//! directly; this path covers files from elsewhere (float samples, 24-bit,
//! stereo) by downmixing to mono `f32`.
//!
//! [`ContainerHeader`]: crate::audio::ContainerHeader

use std::path::Path;

use crate::error::ExtractionError;

/// Mono samples decoded from a WAV file
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source file before downmixing
    pub source_channels: u16,
}

impl ImportedClip {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode `path` into normalized mono samples
///
/// Multi-channel files are averaged per frame.
///
/// # Errors
/// - `FileNotFound` if `path` does not exist
/// - `InvalidContainer` if hound rejects the file or the format is unsupported
pub fn import_wav(path: &Path) -> Result<ImportedClip, ExtractionError> {
    if !path.exists() {
        return Err(ExtractionError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let invalid = |err: hound::Error| ExtractionError::InvalidContainer {
        reason: format!("error reading {}: {err}", path.display()),
    };

    let mut reader = hound::WavReader::open(path).map_err(invalid)?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(ExtractionError::InvalidContainer {
            reason: format!("{} has zero channels", path.display()),
        });
    }

    let interleaved = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(invalid)?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            8 | 16 | 24 | 32 => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<f32>, _>>()
                    .map_err(invalid)?
            }
            other => {
                return Err(ExtractionError::InvalidContainer {
                    reason: format!("unsupported bit depth {} in {}", other, path.display()),
                })
            }
        },
    };

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    tracing::debug!(
        "[WavImport] {} -> {} mono samples @ {} Hz ({} ch source)",
        path.display(),
        samples.len(),
        spec.sample_rate,
        spec.channels
    );

    Ok(ImportedClip {
        samples,
        sample_rate: spec.sample_rate,
        source_channels: spec.channels,
    })
}
