//! Parallel transform of independent plugin modules.
//!
//! Every job owns its allocator, tree and binding table, so jobs share only
//! the read-only configuration. A failed job is reported in its own slot and
//! never stops its siblings.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::TransformConfig;
use crate::error::Result;
use crate::transform::{transform_named_module, BuildParams, TransformOutput};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleJob {
    /// Labels errors and log events, usually the bundle file name.
    pub id: String,
    pub source: String,
    pub params: BuildParams,
}

#[derive(Debug, Clone)]
pub struct ModuleOutcome {
    pub id: String,
    pub result: Result<TransformOutput>,
}

impl ModuleOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs every job on the rayon pool. Outcomes come back in job order.
pub fn transform_batch(jobs: &[ModuleJob], config: &TransformConfig) -> Vec<ModuleOutcome> {
    jobs.par_iter()
        .map(|job| {
            let result = transform_named_module(&job.id, &job.source, &job.params, config);
            match &result {
                Ok(output) => info!(
                    module = %job.id,
                    passes = output.passes,
                    edits = output.stats.total(),
                    "transformed plugin module"
                ),
                Err(err) => warn!(module = %job.id, code = err.code(), "{}", err),
            }
            ModuleOutcome {
                id: job.id.clone(),
                result,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;

    fn job(id: &str, source: &str) -> ModuleJob {
        ModuleJob {
            id: id.to_string(),
            source: source.to_string(),
            params: BuildParams::new(id),
        }
    }

    #[test]
    fn test_batch_preserves_job_order() {
        let jobs: Vec<ModuleJob> = (0..16)
            .map(|i| job(&format!("Plugin{i}"), "BdApi.saveData('k', 1);"))
            .collect();
        let outcomes = transform_batch(&jobs, &TransformConfig::default());

        assert_eq!(outcomes.len(), jobs.len());
        for (i, outcome) in outcomes.iter().enumerate() {
            assert_eq!(outcome.id, format!("Plugin{i}"));
            let code = &outcome.result.as_ref().unwrap().code;
            assert!(
                code.contains(&format!("bind(null, \"Plugin{i}\")")),
                "each module binds its own name: {code}"
            );
        }
    }

    #[test]
    fn test_failure_is_isolated() {
        let jobs = vec![
            job("Good", "BdApi.findModule(f); go();"),
            job("Broken", "function ("),
            job("AlsoGood", "var React = require('react');"),
        ];
        let outcomes = transform_batch(&jobs, &TransformConfig::default());

        assert!(outcomes[0].is_ok());
        assert!(outcomes[2].is_ok());
        match &outcomes[1].result {
            Err(TransformError::Parse { module, .. }) => assert_eq!(module, "Broken"),
            other => panic!("expected parse error, got {:?}", other),
        }
        let react = &outcomes[2].result.as_ref().unwrap().code;
        assert!(react.contains("BdApi.React"));
    }

    #[test]
    fn test_empty_batch() {
        assert!(transform_batch(&[], &TransformConfig::default()).is_empty());
    }
}
