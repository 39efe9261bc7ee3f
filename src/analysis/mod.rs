// Analysis module - feature extraction from recorded clips
//
// This module turns a finished clip into the small set of MFCC vectors that
// is sent for verification.
//
// Architecture:
// - FrameSegmenter: overlapping fixed-length frames over the sample buffer
// - MfccPipeline: window -> FFT -> mel bank -> log -> DCT per frame
// - SegmentDeduplicator: drops sentinel and duplicate vectors, keeps order
// - ClipExtractor: container file -> samples -> the three stages above

pub mod dedup;
pub mod extractor;
pub mod frames;
pub mod mfcc;

pub use dedup::{Admission, FeatureSet, SegmentDeduplicator, SelectedFeatures, SelectionStats};
pub use extractor::ClipExtractor;
pub use frames::{Frame, FrameSegmenter, Frames};
pub use mfcc::{pre_emphasize, FeatureVector, FrameAnalyzer, MfccPipeline, WindowFunction};

#[cfg(test)]
mod tests;
