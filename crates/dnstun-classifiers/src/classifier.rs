//! Sequence classifier trait and common types

use crate::encoder::EncodedSequence;
use async_trait::async_trait;
use dnstun_core::{Error, Result};
use tokio_util::sync::CancellationToken;

/// Index of a class in the model's output vector
pub type ClassIndex = usize;

/// Trait for all sequence classifiers
#[async_trait]
pub trait SequenceClassifier: Send + Sync {
    /// Classify one encoded name.
    ///
    /// Once `cancel` fires the caller has stopped waiting; work that has not
    /// started yet must be skipped and `Error::Cancelled` returned.
    async fn classify(
        &self,
        sequence: &EncodedSequence,
        cancel: &CancellationToken,
    ) -> Result<Prediction>;

    /// Get the classifier name
    fn name(&self) -> &str;

    /// Number of classes the model outputs
    fn num_classes(&self) -> usize;
}

/// Result of classification
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Index of the highest-scoring class
    pub class_index: ClassIndex,

    /// Score of the winning class
    pub score: f32,

    /// All class scores, in class order
    pub scores: Vec<f32>,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl Prediction {
    /// Build a prediction from a raw score vector.
    ///
    /// Fails when the vector does not hold exactly `expected_classes`
    /// scores or contains a non-finite value.
    pub fn from_scores(scores: Vec<f32>, expected_classes: usize, latency_us: u64) -> Result<Self> {
        if scores.len() != expected_classes {
            return Err(Error::classification(format!(
                "model produced {} scores, expected {}",
                scores.len(),
                expected_classes
            )));
        }

        let (class_index, score) = argmax(&scores)
            .ok_or_else(|| Error::classification("model produced no usable scores"))?;

        Ok(Self {
            class_index,
            score,
            scores,
            latency_us,
        })
    }
}

/// Index and value of the largest score; ties resolve to the lowest index.
///
/// Returns `None` for an empty slice or when any score is not finite.
pub fn argmax(scores: &[f32]) -> Option<(ClassIndex, f32)> {
    let mut best: Option<(ClassIndex, f32)> = None;

    for (idx, &score) in scores.iter().enumerate() {
        if !score.is_finite() {
            return None;
        }
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((idx, score)),
        }
    }

    best
}
