//! Module transform pipeline.
//!
//! Each round parses the current text, builds a fresh semantic model, plans
//! edits against it and applies them. Rounds repeat until one plans nothing,
//! so removals that only become valid after an earlier rewrite (a loader call
//! substituted, a statement elided) are picked up without re-validating
//! reference counts inside a single walk.

#[cfg(feature = "napi")]
use napi_derive::napi;
use oxc_allocator::Allocator;
use oxc_codegen::Codegen;
use oxc_semantic::SemanticBuilder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::analyze::plan_edits;
use crate::config::TransformConfig;
use crate::error::{Result, TransformError};
use crate::finalize::{
    ensure_export_convention, prepend_banner, render_banner, strip_banner, validate_metadata,
};
use crate::parse::{parse_program, syntax_errors};
use crate::rewriter::apply_plan;

// ═══════════════════════════════════════════════════════════════════════════════
// BUILD PARAMETERS AND RESULTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildParams {
    /// Bound as the first argument of every bindable host method.
    pub plugin_name: String,
    /// Manifest entries rendered into the output banner, in order.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl BuildParams {
    pub fn new(plugin_name: impl Into<String>) -> Self {
        BuildParams {
            plugin_name: plugin_name.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransformStats {
    pub statements_elided: usize,
    pub patterns_pruned: usize,
    pub imports_substituted: usize,
    pub members_bound: usize,
    pub declarators_split: usize,
}

impl TransformStats {
    pub fn total(&self) -> usize {
        self.statements_elided
            + self.patterns_pruned
            + self.imports_substituted
            + self.members_bound
            + self.declarators_split
    }

    pub fn absorb(&mut self, other: &TransformStats) {
        self.statements_elided += other.statements_elided;
        self.patterns_pruned += other.patterns_pruned;
        self.imports_substituted += other.imports_substituted;
        self.members_bound += other.members_bound;
        self.declarators_split += other.declarators_split;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub code: String,
    /// Analysis rounds run, including the final one that planned nothing.
    pub passes: u32,
    /// The last round planned no edits.
    pub converged: bool,
    pub stats: TransformStats,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PIPELINE
// ═══════════════════════════════════════════════════════════════════════════════

struct PassResult {
    code: Option<String>,
    planned: usize,
    stats: TransformStats,
}

fn run_pass(
    source: &str,
    module_id: &str,
    params: &BuildParams,
    config: &TransformConfig,
) -> Result<PassResult> {
    let allocator = Allocator::default();
    let mut program = parse_program(&allocator, source, module_id)?;

    // The semantic model borrows the program; it must be gone before mutation.
    let plan = {
        let semantic = SemanticBuilder::new().build(&program).semantic;
        plan_edits(&semantic, &program, config, &params.plugin_name)
    };
    if plan.is_empty() {
        return Ok(PassResult {
            code: None,
            planned: 0,
            stats: TransformStats::default(),
        });
    }

    let stats = apply_plan(&allocator, &mut program, &plan, &params.plugin_name);
    Ok(PassResult {
        code: Some(Codegen::new().build(&program).code),
        planned: plan.len(),
        stats,
    })
}

/// A generated text that fails to parse is a serialization failure, not an
/// input error.
fn as_serialize_error(err: TransformError, module_id: &str) -> TransformError {
    match err {
        TransformError::Parse { message, .. } => {
            TransformError::serialize_error(module_id, &[message])
        }
        other => other,
    }
}

fn finalize_module(
    code: &str,
    rewritten: bool,
    module_id: &str,
    params: &BuildParams,
    config: &TransformConfig,
) -> Result<String> {
    let allocator = Allocator::default();
    let mut program = parse_program(&allocator, code, module_id).map_err(|err| {
        if rewritten {
            as_serialize_error(err, module_id)
        } else {
            err
        }
    })?;
    ensure_export_convention(&allocator, &mut program, &config.exports)?;

    let output = Codegen::new().build(&program).code;
    let errors = syntax_errors(&output);
    if !errors.is_empty() {
        return Err(TransformError::serialize_error(module_id, &errors));
    }

    Ok(match render_banner(&params.metadata)? {
        Some(banner) => prepend_banner(&output, &banner),
        None => output,
    })
}

/// Transforms one bundled plugin module, naming errors after the plugin.
pub fn transform_module(
    source: &str,
    params: &BuildParams,
    config: &TransformConfig,
) -> Result<TransformOutput> {
    transform_named_module(&params.plugin_name, source, params, config)
}

/// Transforms one bundled plugin module. `module_id` only labels errors and
/// log events.
pub fn transform_named_module(
    module_id: &str,
    source: &str,
    params: &BuildParams,
    config: &TransformConfig,
) -> Result<TransformOutput> {
    config.validate()?;
    validate_metadata(&params.metadata)?;

    let mut code = strip_banner(source, &params.metadata).to_string();
    let mut stats = TransformStats::default();
    let mut passes = 0;
    let mut converged = false;
    let mut rewritten = false;

    while passes < config.max_passes {
        let pass = run_pass(&code, module_id, params, config).map_err(|err| {
            if rewritten {
                as_serialize_error(err, module_id)
            } else {
                err
            }
        })?;
        passes += 1;
        debug!(
            module = module_id,
            pass = passes,
            planned = pass.planned,
            applied = pass.stats.total(),
            "rewrite pass"
        );

        let Some(next) = pass.code else {
            converged = true;
            break;
        };
        stats.absorb(&pass.stats);
        code = next;
        rewritten = true;

        // Planned edits that no longer match anything would repeat forever.
        if pass.stats.total() == 0 {
            break;
        }
    }

    if !converged && config.max_passes > 1 {
        warn!(
            module = module_id,
            passes, "no fixed point reached; emitting last rewrite"
        );
    }

    let code = finalize_module(&code, rewritten, module_id, params, config)?;
    Ok(TransformOutput {
        code,
        passes,
        converged,
        stats,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
fn native_inputs(
    plugin_name: String,
    metadata_json: Option<String>,
    config_json: Option<String>,
) -> napi::Result<(BuildParams, TransformConfig)> {
    let metadata = match metadata_json {
        Some(json) => serde_json::from_str::<Map<String, Value>>(&json)
            .map_err(|e| napi::Error::from_reason(format!("Metadata parse error: {}", e)))?,
        None => Map::new(),
    };
    let config = match config_json {
        Some(json) => TransformConfig::from_json(&json)
            .map_err(|e| napi::Error::from_reason(format!("[{}] {}", e.code(), e)))?,
        None => TransformConfig::default(),
    };
    Ok((BuildParams::new(plugin_name).with_metadata(metadata), config))
}

#[cfg(feature = "napi")]
#[napi]
pub fn transform_plugin_native(
    code: String,
    plugin_name: String,
    metadata_json: Option<String>,
    config_json: Option<String>,
) -> napi::Result<String> {
    let (params, config) = native_inputs(plugin_name, metadata_json, config_json)?;
    transform_module(&code, &params, &config)
        .map(|output| output.code)
        .map_err(|e| napi::Error::from_reason(format!("[{}] {}", e.code(), e)))
}

/// Like `transform_plugin_native`, returning the whole output (code, passes,
/// stats) as JSON.
#[cfg(feature = "napi")]
#[napi]
pub fn transform_plugin_stats_native(
    code: String,
    plugin_name: String,
    metadata_json: Option<String>,
    config_json: Option<String>,
) -> napi::Result<String> {
    let (params, config) = native_inputs(plugin_name, metadata_json, config_json)?;
    let output = transform_module(&code, &params, &config)
        .map_err(|e| napi::Error::from_reason(format!("[{}] {}", e.code(), e)))?;
    serde_json::to_string(&output)
        .map_err(|e| napi::Error::from_reason(format!("Output serialize error: {}", e)))
}
