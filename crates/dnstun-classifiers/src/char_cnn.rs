//! Character-level CNN tunneling classifier
//!
//! Graph layout expected in the model file:
//! - `<input>.weight` embedding table `(vocab, dim)`
//! - `conv.0`, `conv.1`, ... 1-D convolutions `(out, in, kernel)` with ReLU
//! - global max-pool over the sequence axis
//! - `<output>.weight` / `<output>.bias` dense head `(classes, channels)`
//! - softmax over classes
//!
//! All layout checks run once at load time; the per-query path only
//! re-checks the input length and the output width.

use crate::classifier::{Prediction, SequenceClassifier};
use crate::encoder::EncodedSequence;
use crate::model_loader::{LoadedModel, ModelConfig};
use crate::vocabulary;
use async_trait::async_trait;
use candle_core::{Device, Tensor, D};
use candle_nn::{Conv1d, Conv1dConfig, Embedding, Linear, Module};
use dnstun_core::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Prefix of the convolution layers, numbered from 0
const CONV_PREFIX: &str = "conv";

/// Character CNN with weights resident on one device
pub struct CharCnn {
    embedding: Embedding,
    convs: Vec<Conv1d>,
    head: Linear,
    device: Device,
    num_classes: usize,
    sequence_length: usize,
}

impl CharCnn {
    /// Bind the layers of a loaded model and validate its layout
    pub fn from_model(
        model: &LoadedModel,
        config: &ModelConfig,
        sequence_length: usize,
        vocab_size: usize,
    ) -> Result<Self> {
        if !model.has_endpoint(&config.input) {
            return Err(Error::initialization(format!(
                "input endpoint '{}' not found in model",
                config.input
            )));
        }
        if !model.has_endpoint(&config.output) {
            return Err(Error::initialization(format!(
                "output endpoint '{}' not found in model",
                config.output
            )));
        }

        let table = model.tensor(&format!("{}.weight", config.input))?;
        let (rows, dim) = dims2(&table, &config.input)?;
        if rows < vocab_size {
            return Err(Error::initialization(format!(
                "embedding has {} rows, vocabulary needs {}",
                rows, vocab_size
            )));
        }
        let embedding = Embedding::new(table, dim);

        let mut convs = Vec::new();
        let mut channels = dim;
        let mut remaining = sequence_length;
        while model.has_tensor(&format!("{}.{}.weight", CONV_PREFIX, convs.len())) {
            let prefix = format!("{}.{}", CONV_PREFIX, convs.len());
            let weight = model.tensor(&format!("{}.weight", prefix))?;
            let (out, input, kernel) = weight
                .dims3()
                .map_err(|e| Error::initialization(format!("{}: {}", prefix, e)))?;

            if input != channels {
                return Err(Error::initialization(format!(
                    "{} expects {} input channels, previous layer has {}",
                    prefix, input, channels
                )));
            }
            remaining = remaining
                .checked_sub(kernel.saturating_sub(1))
                .filter(|len| *len > 0)
                .ok_or_else(|| {
                    Error::initialization(format!(
                        "sequence length {} is too short for {}",
                        sequence_length, prefix
                    ))
                })?;

            let bias = optional_bias(model, &prefix, out)?;
            convs.push(Conv1d::new(weight, bias, Conv1dConfig::default()));
            channels = out;
        }

        if convs.is_empty() {
            return Err(Error::initialization(
                "model has no convolution layers (expected conv.0.weight)",
            ));
        }

        let head_weight = model.tensor(&format!("{}.weight", config.output))?;
        let (num_classes, head_in) = dims2(&head_weight, &config.output)?;
        if head_in != channels {
            return Err(Error::initialization(format!(
                "output endpoint expects {} features, convolutions produce {}",
                head_in, channels
            )));
        }
        if let Some(expected) = config.num_classes {
            if expected != num_classes {
                return Err(Error::initialization(format!(
                    "model outputs {} classes, configuration expects {}",
                    num_classes, expected
                )));
            }
        }
        let head_bias = optional_bias(model, &config.output, num_classes)?;
        let head = Linear::new(head_weight, head_bias);

        tracing::debug!(
            conv_layers = convs.len(),
            num_classes,
            sequence_length,
            "Character CNN bound"
        );

        Ok(Self {
            embedding,
            convs,
            head,
            device: model.device().clone(),
            num_classes,
            sequence_length,
        })
    }

    /// Run one forward pass over a single-item batch, returning class scores
    pub fn forward(&self, ids: &[u32]) -> candle_core::Result<Vec<f32>> {
        let input = Tensor::from_slice(ids, (1, ids.len()), &self.device)?;

        // (1, L, dim) -> (1, dim, L)
        let mut xs = self
            .embedding
            .forward(&input)?
            .transpose(1, 2)?
            .contiguous()?;
        for conv in &self.convs {
            xs = conv.forward(&xs)?.relu()?;
        }

        let pooled = xs.max(D::Minus1)?;
        let logits = self.head.forward(&pooled)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;

        probs.squeeze(0)?.to_vec1::<f32>()
    }

    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Input length the model was bound for
    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }
}

fn dims2(tensor: &Tensor, name: &str) -> Result<(usize, usize)> {
    tensor
        .dims2()
        .map_err(|e| Error::initialization(format!("{}: {}", name, e)))
}

fn optional_bias(model: &LoadedModel, prefix: &str, len: usize) -> Result<Option<Tensor>> {
    let name = format!("{}.bias", prefix);
    if !model.has_tensor(&name) {
        return Ok(None);
    }

    let bias = model.tensor(&name)?;
    let actual = bias
        .dims1()
        .map_err(|e| Error::initialization(format!("{}: {}", name, e)))?;
    if actual != len {
        return Err(Error::initialization(format!(
            "{} has {} entries, expected {}",
            name, actual, len
        )));
    }
    Ok(Some(bias))
}

/// `SequenceClassifier` backed by a `CharCnn`.
///
/// Forward passes run on the blocking pool, at most `max_concurrency` at a
/// time. A pass whose caller cancelled before it got a thread is skipped.
pub struct CharCnnClassifier {
    name: String,
    model: Arc<CharCnn>,
    permits: Arc<Semaphore>,
    forward_passes: Arc<AtomicU64>,
}

impl CharCnnClassifier {
    /// Load and validate a model file
    pub fn load(config: &ModelConfig, sequence_length: usize) -> Result<Self> {
        if config.max_concurrency == 0 {
            return Err(Error::initialization("max_concurrency must be positive"));
        }

        let loaded = LoadedModel::load(config)?;
        let model = CharCnn::from_model(
            &loaded,
            config,
            sequence_length,
            vocabulary::en_us().len(),
        )?;

        Ok(Self::new(
            loaded.metadata().name.clone(),
            model,
            config.max_concurrency,
        ))
    }

    /// Wrap an already bound model; `max_concurrency` must be at least one
    pub fn new(name: impl Into<String>, model: CharCnn, max_concurrency: usize) -> Self {
        Self {
            name: name.into(),
            model: Arc::new(model),
            permits: Arc::new(Semaphore::new(max_concurrency)),
            forward_passes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Input length the model was bound for
    pub fn sequence_length(&self) -> usize {
        self.model.sequence_length()
    }

    /// Number of forward passes actually executed
    pub fn forward_passes(&self) -> u64 {
        self.forward_passes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SequenceClassifier for CharCnnClassifier {
    async fn classify(
        &self,
        sequence: &EncodedSequence,
        cancel: &CancellationToken,
    ) -> Result<Prediction> {
        let start = Instant::now();

        if sequence.len() != self.model.sequence_length() {
            return Err(Error::classification(format!(
                "sequence has {} positions, model expects {}",
                sequence.len(),
                self.model.sequence_length()
            )));
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            permit = Arc::clone(&self.permits).acquire_owned() => permit
                .map_err(|_| Error::classification("inference slots closed"))?,
        };

        // Tensors created for this call live and die on the blocking thread
        let model = Arc::clone(&self.model);
        let passes = Arc::clone(&self.forward_passes);
        let cancel = cancel.clone();
        let ids = sequence.as_slice().to_vec();

        let scores = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            if cancel.is_cancelled() {
                tracing::trace!("Skipping forward pass for abandoned query");
                return Err(Error::Cancelled);
            }

            passes.fetch_add(1, Ordering::Relaxed);
            model
                .forward(&ids)
                .map_err(|e| Error::classification(format!("inference failed: {}", e)))
        })
        .await
        .map_err(|e| Error::classification(format!("inference task failed: {}", e)))??;

        Prediction::from_scores(
            scores,
            self.model.num_classes(),
            start.elapsed().as_micros() as u64,
        )
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn num_classes(&self) -> usize {
        self.model.num_classes()
    }
}
