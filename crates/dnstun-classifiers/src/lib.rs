//! dnstun classifiers
//!
//! Turns a DNS query name into a class decision:
//! - `vocabulary` / `encoder`: name → fixed-length id sequence
//! - `model_loader` / `char_cnn`: candle character CNN producing class scores
//! - `decision`: class index → allow or refuse
//!
//! Inference runs on CPU by default; CUDA and Metal are selected per model.

pub mod char_cnn;
pub mod classifier;
pub mod config;
pub mod decision;
pub mod encoder;
pub mod model_loader;
pub mod vocabulary;

pub use char_cnn::{CharCnn, CharCnnClassifier};
pub use classifier::{argmax, ClassIndex, Prediction, SequenceClassifier};
pub use config::{DeviceSpec, ModelConfigSpec};
pub use decision::{Decision, DecisionPolicy, DEFAULT_BLOCKED_CLASS};
pub use encoder::{EncodedSequence, NameEncoder, DEFAULT_SEQUENCE_LENGTH};
pub use model_loader::{DeviceType, LoadedModel, ModelConfig, ModelMetadata};
pub use vocabulary::Vocabulary;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::char_cnn::CharCnnClassifier;
    pub use crate::classifier::{Prediction, SequenceClassifier};
    pub use crate::decision::{Decision, DecisionPolicy};
    pub use crate::encoder::{EncodedSequence, NameEncoder};
    pub use crate::model_loader::{DeviceType, ModelConfig};
}
