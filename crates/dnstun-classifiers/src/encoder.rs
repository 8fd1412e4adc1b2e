//! Fixed-length domain name encoder
//!
//! Names are case-folded, mapped through the vocabulary and right-aligned
//! into exactly `length` positions:
//! - shorter names are padded on the left with the padding id
//! - longer names keep their last `length` ids, i.e. the top-level end
//!
//! This pre-padding / pre-truncation layout is what the model was trained
//! on and is not configurable per request.

use crate::vocabulary::{self, Vocabulary};

/// Sequence length of the reference model
pub const DEFAULT_SEQUENCE_LENGTH: usize = 256;

/// Fixed-length integer feature vector derived from a domain name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedSequence(Vec<u32>);

impl EncodedSequence {
    /// The encoded ids
    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence has zero positions
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Encoder mapping names to `EncodedSequence`s
#[derive(Debug, Clone, Copy)]
pub struct NameEncoder {
    vocabulary: &'static Vocabulary,
    length: usize,
}

impl NameEncoder {
    /// Create an encoder over the process-wide vocabulary
    pub fn new(length: usize) -> Self {
        Self::with_vocabulary(vocabulary::en_us(), length)
    }

    /// Create an encoder over a specific vocabulary
    pub fn with_vocabulary(vocabulary: &'static Vocabulary, length: usize) -> Self {
        Self { vocabulary, length }
    }

    /// Output length of every encoded sequence
    pub fn length(&self) -> usize {
        self.length
    }

    /// Vocabulary used for lookups
    pub fn vocabulary(&self) -> &'static Vocabulary {
        self.vocabulary
    }

    /// Encode a name. Never fails; any string yields exactly `length` ids.
    pub fn encode(&self, name: &str) -> EncodedSequence {
        let ids: Vec<u32> = name
            .chars()
            .flat_map(char::to_lowercase)
            .map(|c| self.vocabulary.id(c))
            .collect();

        let mut sequence = Vec::with_capacity(self.length);
        if ids.len() >= self.length {
            sequence.extend_from_slice(&ids[ids.len() - self.length..]);
        } else {
            sequence.resize(self.length - ids.len(), self.vocabulary.padding_id());
            sequence.extend_from_slice(&ids);
        }

        EncodedSequence(sequence)
    }
}

impl Default for NameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE_LENGTH)
    }
}
