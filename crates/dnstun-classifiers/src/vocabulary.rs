//! Character vocabulary shared by the encoder and the model
//!
//! The table is compiled in and must match the one the model was trained
//! with. Ids are laid out as:
//! - `0` padding
//! - `1..=39` the domain-name alphabet, in table order
//! - `40` any character outside the alphabet

use std::sync::OnceLock;

/// Identifier used to pad short sequences
pub const PADDING_ID: u32 = 0;

/// Domain-name alphabet, in id order starting at 1
const EN_US_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789-._";

/// Read-only char → id mapping
#[derive(Debug)]
pub struct Vocabulary {
    ascii: [u32; 128],
    unknown_id: u32,
    size: usize,
}

impl Vocabulary {
    fn from_alphabet(alphabet: &str) -> Self {
        let unknown_id = alphabet.chars().count() as u32 + 1;
        let mut ascii = [unknown_id; 128];

        for (idx, c) in alphabet.chars().enumerate() {
            ascii[c as usize] = idx as u32 + 1;
        }

        Self {
            ascii,
            unknown_id,
            size: unknown_id as usize + 1,
        }
    }

    /// Id of a single, already case-folded character
    #[inline]
    pub fn id(&self, c: char) -> u32 {
        if c.is_ascii() {
            self.ascii[c as usize]
        } else {
            self.unknown_id
        }
    }

    /// Id assigned to characters outside the alphabet
    pub fn unknown_id(&self) -> u32 {
        self.unknown_id
    }

    /// Id used for padding
    pub fn padding_id(&self) -> u32 {
        PADDING_ID
    }

    /// Number of distinct ids, padding and unknown included
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the vocabulary has no ids
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Process-wide vocabulary the reference model was trained with
pub fn en_us() -> &'static Vocabulary {
    static VOCABULARY: OnceLock<Vocabulary> = OnceLock::new();
    VOCABULARY.get_or_init(|| Vocabulary::from_alphabet(EN_US_ALPHABET))
}
