//! Mock classifiers, writers and model fixtures for detector tests

#![allow(dead_code)]

use async_trait::async_trait;
use candle_core::{Device, Tensor};
use dnstun_classifiers::{EncodedSequence, NameEncoder, Prediction, SequenceClassifier};
use dnstun_core::{Error, Handler, Outcome, QueryContext, ResponseWriter, Result};
use hickory_proto::op::{Message, Query};
use hickory_proto::rr::{Name, RecordType};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Sequence length used by mock-backed detectors
pub const SEQUENCE_LENGTH: usize = 64;

/// Build a request for `name`
pub fn query(id: u16, name: &str) -> Message {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_recursion_desired(true);
    msg.add_query(Query::query(Name::from_str(name).unwrap(), RecordType::CNAME));
    msg
}

/// Classifier returning a fixed class per name, `default_class` otherwise
pub struct MockClassifier {
    encoder: NameEncoder,
    classes: HashMap<EncodedSequence, usize>,
    default_class: usize,
    num_classes: usize,
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl MockClassifier {
    pub fn new(num_classes: usize, default_class: usize) -> Self {
        Self {
            encoder: NameEncoder::new(SEQUENCE_LENGTH),
            classes: HashMap::new(),
            default_class,
            num_classes,
            failures_left: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    /// Classify `name` (any case, with or without trailing dot) as `class`
    pub fn with_name(mut self, name: &str, class: usize) -> Self {
        let mut fqdn = name.to_lowercase();
        if !fqdn.ends_with('.') {
            fqdn.push('.');
        }
        self.classes.insert(self.encoder.encode(&fqdn), class);
        self
    }

    /// Fail the next `count` calls
    pub fn failing(self, count: u32) -> Self {
        self.failures_left.store(count, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SequenceClassifier for MockClassifier {
    async fn classify(
        &self,
        sequence: &EncodedSequence,
        _cancel: &CancellationToken,
    ) -> Result<Prediction> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::classification("simulated inference failure"));
        }

        let class = self
            .classes
            .get(sequence)
            .copied()
            .unwrap_or(self.default_class);
        let mut scores = vec![0.0; self.num_classes];
        scores[class] = 1.0;

        Prediction::from_scores(scores, self.num_classes, 100)
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

/// Classifier that never completes; keeps the token of the last call
#[derive(Default)]
pub struct HangingClassifier {
    last_cancel: Mutex<Option<CancellationToken>>,
}

impl HangingClassifier {
    /// Token handed to the most recent `classify` call
    pub fn last_cancel(&self) -> Option<CancellationToken> {
        self.last_cancel.lock().unwrap().clone()
    }
}

#[async_trait]
impl SequenceClassifier for HangingClassifier {
    async fn classify(
        &self,
        _sequence: &EncodedSequence,
        cancel: &CancellationToken,
    ) -> Result<Prediction> {
        *self.last_cancel.lock().unwrap() = Some(cancel.clone());
        std::future::pending().await
    }

    fn name(&self) -> &str {
        "hanging"
    }

    fn num_classes(&self) -> usize {
        2
    }
}

/// Writer recording every response
#[derive(Default)]
pub struct RecordingWriter {
    pub written: Vec<Message>,
}

#[async_trait]
impl ResponseWriter for RecordingWriter {
    async fn write_msg(&mut self, msg: &Message) -> Result<()> {
        self.written.push(msg.clone());
        Ok(())
    }
}

/// Writer whose every write fails
pub struct BrokenWriter;

#[async_trait]
impl ResponseWriter for BrokenWriter {
    async fn write_msg(&mut self, _msg: &Message) -> Result<()> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "client went away",
        )))
    }
}

/// Downstream handler counting the queries that reach it
#[derive(Default)]
pub struct CountingHandler {
    calls: AtomicU32,
}

impl CountingHandler {
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Handler for CountingHandler {
    async fn serve_dns(
        &self,
        _ctx: &QueryContext,
        _writer: &mut dyn ResponseWriter,
        _request: &Message,
    ) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Outcome::Success
    }

    fn name(&self) -> &str {
        "next"
    }
}

/// Shared counting handler
pub fn counting_handler() -> Arc<CountingHandler> {
    Arc::new(CountingHandler::default())
}

/// Write a model that refuses (class 0) names containing a digit
pub fn write_digit_model(dir: &Path) -> PathBuf {
    let device = Device::Cpu;
    let mut table = vec![0f32; 41];
    for id in 27..=36 {
        table[id] = 1.0;
    }

    let mut tensors = HashMap::new();
    tensors.insert(
        "embedding.weight".to_string(),
        Tensor::from_vec(table, (41, 1), &device).unwrap(),
    );
    tensors.insert(
        "conv.0.weight".to_string(),
        Tensor::from_vec(vec![1f32], (1, 1, 1), &device).unwrap(),
    );
    tensors.insert(
        "dense.weight".to_string(),
        Tensor::from_vec(vec![2f32, -2.0], (2, 1), &device).unwrap(),
    );
    tensors.insert(
        "dense.bias".to_string(),
        Tensor::from_vec(vec![-1f32, 1.0], 2, &device).unwrap(),
    );

    let path = dir.join("dnscnn.safetensors");
    candle_core::safetensors::save(&tensors, &path).unwrap();
    path
}
