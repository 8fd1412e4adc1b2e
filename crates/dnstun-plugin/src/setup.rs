//! Handler setup and pipeline registration

use crate::config::DnstunConfig;
use crate::detector::{Dnstun, HANDLER_NAME};
use dnstun_core::{PipelineBuilder, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Build the detector from its configuration.
///
/// Any model loading or validation failure is returned to the caller;
/// no handler is produced in that case.
pub fn setup(config: &DnstunConfig) -> Result<Arc<Dnstun>> {
    let dnstun = Dnstun::from_config(config).map_err(|e| {
        error!(
            graph = %config.model.graph.display(),
            error = %e,
            "Failed to initialize {}", HANDLER_NAME
        );
        e
    })?;

    info!(
        classifier = dnstun.classifier_name(),
        sequence_length = dnstun.sequence_length(),
        blocked_class = dnstun.policy().blocked_class(),
        timeout_ms = dnstun.timeout().as_millis() as u64,
        "Detector initialized"
    );

    Ok(Arc::new(dnstun))
}

/// Build the detector from a configuration file
pub fn setup_from_file(path: impl AsRef<Path>) -> Result<Arc<Dnstun>> {
    setup(&DnstunConfig::from_file(path)?)
}

/// Append the detector to a pipeline as a chain node.
///
/// Handlers registered afterwards run only for queries the detector allows.
pub fn register(builder: PipelineBuilder, config: &DnstunConfig) -> Result<PipelineBuilder> {
    let dnstun = setup(config)?;
    Ok(builder.chain(dnstun))
}
