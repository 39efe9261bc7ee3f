use super::*;
use crate::audio::format::{encode_pcm16, AudioStreamConfig, HEADER_LEN};
use crate::audio::wav_writer::StreamingContainerWriter;
use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use std::path::PathBuf;

const SENTINEL: f32 = -25_000.0;

/// Marks the frame starting at sample 16 as the only non-silent one
///
/// Samples carry their own index, so the frame's first sample is its offset.
#[derive(Default)]
struct OffsetProbeAnalyzer {
    prepared: Vec<(u32, usize)>,
}

impl FrameAnalyzer for OffsetProbeAnalyzer {
    fn prepare(&mut self, sample_rate: u32, frame_len: usize) -> Result<(), ExtractionError> {
        self.prepared.push((sample_rate, frame_len));
        Ok(())
    }

    fn analyze(&mut self, frame: &[f32]) -> FeatureVector {
        if frame[0] == 16.0 {
            FeatureVector::new(vec![1.0, 2.0, 3.0])
        } else {
            FeatureVector::new(vec![SENTINEL, 0.0, 0.0])
        }
    }
}

fn temp_wav(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("voiceprint_analysis_{}_{}.wav", std::process::id(), name))
}

fn write_clip(path: &PathBuf, sample_rate: u32, samples: &[f32]) {
    let config = AudioStreamConfig::mono_16bit(sample_rate).unwrap();
    let mut writer = StreamingContainerWriter::open(path, config).unwrap();
    writer.write_header_placeholder().unwrap();
    let pcm = encode_pcm16(samples);
    writer.append_pcm(&pcm).unwrap();
    writer.finalize(pcm.len() as u64).unwrap();
}

#[test]
fn test_single_voiced_frame_at_offset_16() {
    // 16 kHz with 1 ms / 0.5 ms gives F = 16, H = 8: 7 frames in 64 samples
    let samples: Vec<f32> = (0..64).map(|i| i as f32).collect();
    let mut extractor =
        ClipExtractor::with_analyzer(ExtractionConfig::default(), OffsetProbeAnalyzer::default())
            .unwrap();

    let selected = extractor.extract_samples(&samples, 16_000).unwrap();

    assert_eq!(extractor.analyzer().prepared, vec![(16_000, 16)]);
    assert_eq!(selected.vectors().len(), 1);
    assert_eq!(
        selected.representative(),
        &FeatureVector::new(vec![1.0, 2.0, 3.0])
    );
    let stats = selected.stats();
    assert_eq!(stats.frames_seen, 7);
    assert_eq!(stats.sentinel_frames, 6);
}

#[test]
fn test_silence_is_empty_feature_set() {
    let mut extractor = ClipExtractor::new(ExtractionConfig::default()).unwrap();
    let result = extractor.extract_samples(&vec![0.0; 1_600], 16_000);
    assert_eq!(result, Err(ExtractionError::EmptyFeatureSet));
}

#[test]
fn test_clip_shorter_than_one_frame_is_empty() {
    let mut extractor = ClipExtractor::new(ExtractionConfig::default()).unwrap();
    let result = extractor.extract_samples(&[0.3; 10], 16_000);
    assert_eq!(result, Err(ExtractionError::EmptyFeatureSet));
}

#[test]
fn test_constant_signal_collapses_to_one_vector() {
    let mut extractor = ClipExtractor::new(ExtractionConfig::default()).unwrap();
    let selected = extractor.extract_samples(&vec![0.25; 3_200], 16_000).unwrap();

    let stats = selected.stats();
    assert_eq!(stats.frames_seen, 399);
    assert_eq!(selected.vectors().len(), 1);
    assert_eq!(stats.duplicate_frames, 398);
    assert_eq!(selected.representative().len(), 300);
    assert_ne!(selected.representative().first(), Some(SENTINEL));
}

#[test]
fn test_pre_emphasis_separates_the_onset_frame() {
    let config = ExtractionConfig {
        apply_pre_emphasis: true,
        ..ExtractionConfig::default()
    };
    let mut extractor = ClipExtractor::new(config).unwrap();
    let selected = extractor.extract_samples(&vec![0.25; 1_600], 16_000).unwrap();

    // Only the first frame sees the unfiltered leading sample
    assert_eq!(selected.vectors().len(), 2);
}

#[test]
fn test_extract_pcm_matches_extract_samples() {
    let samples: Vec<f32> = (0..1_600)
        .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 16_000.0).sin() * 0.5)
        .collect();
    let pcm = encode_pcm16(&samples);
    let decoded = crate::audio::format::decode_pcm16(&pcm);

    let mut extractor = ClipExtractor::new(ExtractionConfig::default()).unwrap();
    let from_pcm = extractor.extract_pcm(&pcm, 16_000).unwrap();
    let from_samples = extractor.extract_samples(&decoded, 16_000).unwrap();
    assert_eq!(from_pcm, from_samples);
}

#[test]
fn test_extract_file_uses_header_rate() {
    let path = temp_wav("rate");
    let samples: Vec<f32> = (0..1_600)
        .map(|i| (2.0 * std::f32::consts::PI * 300.0 * i as f32 / 8_000.0).sin() * 0.4)
        .collect();
    write_clip(&path, 8_000, &samples);

    let mut extractor =
        ClipExtractor::with_analyzer(ExtractionConfig::default(), OffsetProbeAnalyzer::default())
            .unwrap();
    let _ = extractor.extract_file(&path);
    assert_eq!(extractor.analyzer().prepared, vec![(8_000, 8)]);

    let mut mfcc = ClipExtractor::new(ExtractionConfig::default()).unwrap();
    let selected = mfcc.extract_file(&path).unwrap();
    assert!(!selected.vectors().is_empty());
    let _ = std::fs::remove_file(path);
}

#[test]
fn test_missing_file() {
    let mut extractor = ClipExtractor::new(ExtractionConfig::default()).unwrap();
    let result = extractor.extract_file("/nonexistent/voiceprint/clip.wav");
    assert!(matches!(result, Err(ExtractionError::FileNotFound { .. })));
}

#[test]
fn test_unfinalized_file_is_rejected() {
    let path = temp_wav("unfinalized");
    let config = AudioStreamConfig::mono_16bit(16_000).unwrap();
    let mut writer = StreamingContainerWriter::open(&path, config).unwrap();
    writer.write_header_placeholder().unwrap();
    writer.append_pcm(&encode_pcm16(&[0.5; 800])).unwrap();
    // Simulate a crash: flush the sink without patching the sizes
    drop(writer);

    let mut extractor = ClipExtractor::new(ExtractionConfig::default()).unwrap();
    match extractor.extract_file(&path) {
        Err(ExtractionError::InvalidContainer { reason }) => {
            assert!(reason.contains("not finalized"))
        }
        other => panic!("Expected InvalidContainer, got {:?}", other),
    }
    let _ = std::fs::remove_file(path);
}

#[test]
fn test_truncated_file_is_rejected() {
    let path = temp_wav("truncated");
    write_clip(&path, 16_000, &[0.1; 800]);
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..HEADER_LEN + 100]).unwrap();

    let mut extractor = ClipExtractor::new(ExtractionConfig::default()).unwrap();
    assert!(matches!(
        extractor.extract_file(&path),
        Err(ExtractionError::InvalidContainer { .. })
    ));
    let _ = std::fs::remove_file(path);
}

#[test]
fn test_garbage_file_is_rejected() {
    let path = temp_wav("garbage");
    std::fs::write(&path, vec![7u8; 100]).unwrap();

    let mut extractor = ClipExtractor::new(ExtractionConfig::default()).unwrap();
    assert!(matches!(
        extractor.extract_file(&path),
        Err(ExtractionError::InvalidContainer { .. })
    ));
    let _ = std::fs::remove_file(path);
}

#[test]
fn test_corrupt_channel_count_is_rejected() {
    let path = temp_wav("corrupt_channels");
    write_clip(&path, 16_000, &[0.1; 800]);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[22..24].copy_from_slice(&40_000u16.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let mut extractor = ClipExtractor::new(ExtractionConfig::default()).unwrap();
    assert!(matches!(
        extractor.extract_file(&path),
        Err(ExtractionError::InvalidContainer { .. })
    ));
    let _ = std::fs::remove_file(path);
}

#[test]
fn test_invalid_config_rejected_up_front() {
    let config = ExtractionConfig {
        frame_duration_secs: 0.0,
        ..ExtractionConfig::default()
    };
    let mut extractor = ClipExtractor::new(config).unwrap();
    assert!(matches!(
        extractor.extract_samples(&[0.1; 100], 16_000),
        Err(ExtractionError::Configuration { .. })
    ));

    let config = ExtractionConfig {
        feature_count: 0,
        ..ExtractionConfig::default()
    };
    assert!(ClipExtractor::new(config).is_err());
}
