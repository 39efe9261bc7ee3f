// MFCC module - cepstral feature vectors from analysis frames
//
// Per frame: window -> magnitude spectrum -> triangular mel filter bank ->
// natural log floored at LOG_FLOOR -> truncated DCT-II.
//
// The floor makes silence deterministic: a frame with no energy puts every
// band at LOG_FLOOR, so its first coefficient is LOG_FLOOR x band count
// (-25000 for 500 bands). The deduplicator uses that value as its sentinel.

pub mod dct;
pub mod fft;
pub mod mel;

use serde::{Deserialize, Serialize};

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use dct::DctTable;
use fft::SpectrumAnalyzer;
use mel::MelFilterBank;

/// Lowest value a log band energy can take
pub const LOG_FLOOR: f32 = -50.0;

/// Taper applied to each frame before the FFT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    Hamming,
    Hann,
}

impl WindowFunction {
    /// Symmetric window coefficients for `len` samples
    pub fn coefficients(self, len: usize) -> Vec<f32> {
        if len == 1 {
            return vec![1.0];
        }
        let denom = (len - 1) as f32;
        (0..len)
            .map(|i| {
                let phase = (2.0 * std::f32::consts::PI * i as f32 / denom).cos();
                match self {
                    WindowFunction::Hamming => 0.54 - 0.46 * phase,
                    WindowFunction::Hann => 0.5 * (1.0 - phase),
                }
            })
            .collect()
    }
}

/// One frame's cepstral coefficients
///
/// Two vectors are equal when every element pair is `==` or has the same bit
/// pattern, so bitwise-identical vectors (NaN included) compare equal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First coefficient (frame log-energy term)
    pub fn first(&self) -> Option<f32> {
        self.0.first().copied()
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Comma-space joined text encoding used on the upload wire
    pub fn to_joined_string(&self) -> String {
        self.0
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl PartialEq for FeatureVector {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| a == b || a.to_bits() == b.to_bits())
    }
}

impl From<Vec<f32>> for FeatureVector {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

/// Turns one analysis frame into a feature vector
///
/// `ClipExtractor` is generic over this so the selection policy can run on
/// deterministic analyzers.
pub trait FrameAnalyzer: Send {
    /// Re-plan for a clip at `sample_rate` cut into `frame_len`-sample frames
    ///
    /// Called before each clip; implementations should make this cheap when
    /// nothing changed.
    fn prepare(&mut self, _sample_rate: u32, _frame_len: usize) -> Result<(), ExtractionError> {
        Ok(())
    }

    fn analyze(&mut self, frame: &[f32]) -> FeatureVector;
}

/// Apply `y[n] = x[n] - alpha * x[n-1]` across a whole clip
pub fn pre_emphasize(samples: &[f32], alpha: f32) -> Vec<f32> {
    let mut previous = 0.0;
    samples
        .iter()
        .map(|&x| {
            let y = x - alpha * previous;
            previous = x;
            y
        })
        .collect()
}

/// Parameters fixed for one plan of the pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
struct Plan {
    sample_rate: u32,
    frame_len: usize,
}

/// Window -> FFT -> mel -> log -> DCT over single frames
pub struct MfccPipeline {
    feature_count: usize,
    filter_bank_size: usize,
    lower_frequency_hz: f32,
    window: WindowFunction,
    plan: Option<Plan>,
    spectrum: Option<SpectrumAnalyzer>,
    filter_bank: Option<MelFilterBank>,
    dct: DctTable,
    magnitudes: Vec<f32>,
    energies: Vec<f32>,
}

impl MfccPipeline {
    /// Validate `config` and build an unplanned pipeline
    ///
    /// The FFT and filter bank are planned on the first
    /// [`prepare`](FrameAnalyzer::prepare).
    pub fn new(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        config.validate()?;
        if !config.lower_frequency_hz.is_finite() || config.lower_frequency_hz < 0.0 {
            return Err(ExtractionError::Configuration {
                reason: format!(
                    "lower_frequency_hz must be non-negative (got {})",
                    config.lower_frequency_hz
                ),
            });
        }

        Ok(Self {
            feature_count: config.feature_count,
            filter_bank_size: config.filter_bank_size,
            lower_frequency_hz: config.lower_frequency_hz,
            window: config.window,
            plan: None,
            spectrum: None,
            filter_bank: None,
            dct: DctTable::new(config.filter_bank_size, config.feature_count),
            magnitudes: Vec::new(),
            energies: Vec::with_capacity(config.filter_bank_size),
        })
    }

    /// Build and plan in one step
    pub fn planned(
        config: &ExtractionConfig,
        sample_rate: u32,
        frame_len: usize,
    ) -> Result<Self, ExtractionError> {
        let mut pipeline = Self::new(config)?;
        pipeline.prepare(sample_rate, frame_len)?;
        Ok(pipeline)
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    pub fn filter_bank_size(&self) -> usize {
        self.filter_bank_size
    }

    /// First coefficient of a frame with no energy
    pub fn silent_first_coefficient(&self) -> f32 {
        LOG_FLOOR * self.filter_bank_size as f32
    }
}

impl FrameAnalyzer for MfccPipeline {
    fn prepare(&mut self, sample_rate: u32, frame_len: usize) -> Result<(), ExtractionError> {
        let plan = Plan {
            sample_rate,
            frame_len,
        };
        if self.plan == Some(plan) {
            return Ok(());
        }

        if sample_rate == 0 || frame_len == 0 {
            return Err(ExtractionError::Configuration {
                reason: format!(
                    "cannot plan MFCC for {} Hz with {}-sample frames",
                    sample_rate, frame_len
                ),
            });
        }
        let nyquist = sample_rate as f32 / 2.0;
        if self.lower_frequency_hz >= nyquist {
            return Err(ExtractionError::Configuration {
                reason: format!(
                    "lower_frequency_hz {} is not below Nyquist ({} Hz)",
                    self.lower_frequency_hz, nyquist
                ),
            });
        }

        self.spectrum = Some(SpectrumAnalyzer::new(frame_len, self.window));
        self.filter_bank = Some(MelFilterBank::new(
            self.filter_bank_size,
            frame_len,
            sample_rate,
            self.lower_frequency_hz,
            nyquist,
        ));
        self.plan = Some(plan);

        tracing::debug!(
            "[MfccPipeline] Planned {} Hz, {}-sample frames, {} bands, {} coefficients",
            sample_rate,
            frame_len,
            self.filter_bank_size,
            self.feature_count
        );
        Ok(())
    }

    /// Compute the coefficients of one frame
    ///
    /// An unplanned pipeline returns an empty vector, which the deduplicator
    /// discards as invalid.
    fn analyze(&mut self, frame: &[f32]) -> FeatureVector {
        let (spectrum, filter_bank) = match (self.spectrum.as_mut(), self.filter_bank.as_ref()) {
            (Some(spectrum), Some(filter_bank)) => (spectrum, filter_bank),
            _ => return FeatureVector::default(),
        };

        spectrum.magnitude_spectrum(frame, &mut self.magnitudes);
        filter_bank.apply(&self.magnitudes, &mut self.energies);

        for energy in self.energies.iter_mut() {
            // ln(0) = -inf clamps to the floor
            *energy = energy.ln().max(LOG_FLOOR);
        }

        FeatureVector::new(self.dct.apply(&self.energies))
    }
}
