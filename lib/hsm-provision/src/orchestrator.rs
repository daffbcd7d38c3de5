//! Batch orchestration
//!
//! One pipeline per label (create, then derive), all spawned at once as detached tokio
//! tasks. Pipelines share nothing; the batch result is assembled only after every one of
//! them has finished, and a failed label only ever removes its own entry.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::{validate_count, validate_prefix};
use crate::error::ProvisionError;
use crate::hsm::HsmOperations;
use crate::types::{KeyLabel, MAX_KEYS, ProvisioningResult, RecoveredAddress};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Creation,
    Derivation,
    Task,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Creation => f.write_str("creation"),
            FailureStage::Derivation => f.write_str("derivation"),
            FailureStage::Task => f.write_str("task"),
        }
    }
}

/// A label that did not produce a result, and why.
#[derive(Debug)]
pub struct LabelFailure {
    pub label: KeyLabel,
    pub stage: FailureStage,
    pub error: ProvisionError,
}

/// Outcome of one batch. `results` holds only fully verified keys, ordered by label index.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<ProvisioningResult>,
    pub failures: Vec<LabelFailure>,
}

pub struct BatchOrchestrator {
    hsm: Arc<dyn HsmOperations>,
    max_keys: usize,
}

impl BatchOrchestrator {
    pub fn new(hsm: Arc<dyn HsmOperations>) -> Self {
        Self {
            hsm,
            max_keys: MAX_KEYS,
        }
    }

    pub fn with_max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }

    /// Provision `prefix_0 .. prefix_(count-1)` concurrently.
    ///
    /// Fails only on invalid arguments, before any HSM call is issued.
    ///
    /// Pipelines are not cancelled if the returned future is dropped. Spawned pipelines
    /// keep running to completion and their outcomes are discarded.
    pub async fn provision_batch(
        &self,
        prefix: &str,
        count: usize,
    ) -> Result<BatchReport, ProvisionError> {
        validate_prefix(prefix)?;
        validate_count(count, self.max_keys)?;

        info!("Provisioning {} keys with prefix {}", count, prefix);

        let handles: Vec<_> = (0..count)
            .map(|index| {
                let hsm = self.hsm.clone();
                let label = KeyLabel::indexed(prefix, index);
                let task_label = label.clone();
                let handle =
                    tokio::spawn(async move { run_pipeline(hsm.as_ref(), &task_label).await });
                (label, handle)
            })
            .collect();

        // Awaiting in spawn order keeps the report ordered by label index
        let mut report = BatchReport::default();
        for (label, handle) in handles {
            let outcome = handle.await.unwrap_or_else(|e| {
                error!("Pipeline for {} did not complete: {}", label, e);
                Err((FailureStage::Task, ProvisionError::TaskFailed(e.to_string())))
            });
            match outcome {
                Ok(address) => report.results.push(ProvisioningResult { label, address }),
                Err((stage, error)) => report.failures.push(LabelFailure {
                    label,
                    stage,
                    error,
                }),
            }
        }

        if report.failures.is_empty() {
            info!("Provisioned {}/{} keys", report.results.len(), count);
        } else {
            warn!(
                "Provisioned {}/{} keys; {} failed",
                report.results.len(),
                count,
                report.failures.len()
            );
        }

        Ok(report)
    }
}

async fn run_pipeline(
    hsm: &dyn HsmOperations,
    label: &KeyLabel,
) -> Result<RecoveredAddress, (FailureStage, ProvisionError)> {
    hsm.create_key_pair(label)
        .await
        .map_err(|e| (FailureStage::Creation, e))?;

    let address = hsm
        .derive_address(label)
        .await
        .map_err(|e| (FailureStage::Derivation, e))?;

    info!("Key {} has address {}", label, address);
    Ok(address)
}
