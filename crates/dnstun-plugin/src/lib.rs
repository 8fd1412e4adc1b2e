//! dnstun plugin
//!
//! The tunneling detector as a pipeline handler:
//! - `detector`: the `Dnstun` handler (encode → classify → decide → respond)
//! - `config`: YAML configuration
//! - `setup`: building the handler and registering it in a pipeline
//! - `telemetry`: metric names and descriptions

pub mod config;
pub mod detector;
pub mod setup;
pub mod telemetry;

pub use config::DnstunConfig;
pub use detector::{Dnstun, HANDLER_NAME};
pub use setup::{register, setup, setup_from_file};
