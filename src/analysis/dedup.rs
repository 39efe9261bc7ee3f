// SegmentDeduplicator - keeps the distinct, non-silent vectors of a clip
//
// Vectors are kept in arrival order. Membership is a linear scan, so a clip
// of N retained vectors costs O(N^2) comparisons; clips are seconds long and
// most frames collapse into the sentinel or a handful of duplicates.

use serde::{Deserialize, Serialize};

use super::mfcc::FeatureVector;
use crate::error::ExtractionError;

/// What `offer` did with a vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Retained,
    /// First coefficient equals the sentinel
    Sentinel,
    /// Equal to a vector already retained
    Duplicate,
    /// Empty vector
    Invalid,
}

/// Insertion-ordered set of distinct feature vectors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    vectors: Vec<FeatureVector>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn contains(&self, vector: &FeatureVector) -> bool {
        self.vectors.iter().any(|kept| kept == vector)
    }

    /// Append unless already present; returns whether it was added
    pub fn insert(&mut self, vector: FeatureVector) -> bool {
        if self.contains(&vector) {
            return false;
        }
        self.vectors.push(vector);
        true
    }

    pub fn first(&self) -> Option<&FeatureVector> {
        self.vectors.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeatureVector> {
        self.vectors.iter()
    }

    pub fn into_vec(self) -> Vec<FeatureVector> {
        self.vectors
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a FeatureVector;
    type IntoIter = std::slice::Iter<'a, FeatureVector>;

    fn into_iter(self) -> Self::IntoIter {
        self.vectors.iter()
    }
}

/// Per-clip frame accounting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionStats {
    pub frames_seen: usize,
    pub sentinel_frames: usize,
    pub duplicate_frames: usize,
    pub invalid_frames: usize,
}

impl SelectionStats {
    pub fn retained(&self) -> usize {
        self.frames_seen - self.sentinel_frames - self.duplicate_frames - self.invalid_frames
    }
}

/// Result of a clip with at least one usable frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedFeatures {
    vectors: FeatureSet,
    stats: SelectionStats,
}

impl SelectedFeatures {
    /// First retained vector in frame order
    pub fn representative(&self) -> &FeatureVector {
        // finish() never builds an empty set
        &self.vectors.vectors[0]
    }

    pub fn vectors(&self) -> &FeatureSet {
        &self.vectors
    }

    pub fn stats(&self) -> SelectionStats {
        self.stats
    }

    pub fn into_vectors(self) -> FeatureSet {
        self.vectors
    }
}

/// Filters sentinel frames and duplicates from a stream of vectors
#[derive(Debug, Clone)]
pub struct SegmentDeduplicator {
    sentinel: f32,
    retained: FeatureSet,
    stats: SelectionStats,
}

impl SegmentDeduplicator {
    pub fn new(sentinel: f32) -> Self {
        Self {
            sentinel,
            retained: FeatureSet::new(),
            stats: SelectionStats::default(),
        }
    }

    pub fn sentinel(&self) -> f32 {
        self.sentinel
    }

    pub fn stats(&self) -> SelectionStats {
        self.stats
    }

    pub fn retained(&self) -> &FeatureSet {
        &self.retained
    }

    /// Offer the next frame's vector
    pub fn offer(&mut self, vector: FeatureVector) -> Admission {
        self.stats.frames_seen += 1;

        let admission = match vector.first() {
            None => Admission::Invalid,
            Some(first) if first == self.sentinel => Admission::Sentinel,
            Some(_) => {
                if self.retained.insert(vector) {
                    Admission::Retained
                } else {
                    Admission::Duplicate
                }
            }
        };

        match admission {
            Admission::Invalid => self.stats.invalid_frames += 1,
            Admission::Sentinel => self.stats.sentinel_frames += 1,
            Admission::Duplicate => self.stats.duplicate_frames += 1,
            Admission::Retained => {}
        }
        admission
    }

    /// Close the clip
    ///
    /// # Errors
    /// `EmptyFeatureSet` when no vector was retained
    pub fn finish(self) -> Result<SelectedFeatures, ExtractionError> {
        if self.retained.is_empty() {
            return Err(ExtractionError::EmptyFeatureSet);
        }
        Ok(SelectedFeatures {
            vectors: self.retained,
            stats: self.stats,
        })
    }
}
