//! # BetterDiscord Plugin Transform
//!
//! Rewrites a bundled CommonJS plugin module into the form the host loads:
//! loader calls for host modules become property chains on the host object,
//! host methods that need a caller identity get the plugin name bound as
//! their first argument, dead lookups and unused destructures are removed,
//! and the module is finished with a lazy-export statement and a metadata
//! banner.
//!
//! ## Rewrite Invariants
//!
//! 1. **Origin Gate**: every destructive rewrite requires a static proof that
//!    the affected expression descends from the unshadowed host global, via
//!    member access, never-reassigned variable declarators, or the bundler's
//!    single-argument interop helper. Anything else is left unchanged.
//!
//! 2. **Liveness Gate**: a destructure property or rest element is removed
//!    only when no reference to its binding remains, counting references
//!    inside statements elided in the same round as gone.
//!
//! 3. **Plan, Then Apply**: each round plans edits on an immutable tree with
//!    its semantic model, then applies the owned plan bottom-up. Rounds repeat
//!    until one plans nothing or `maxPasses` is reached.
//!
//! 4. **Idempotence**: a member already wrapped in `.bind(null, "<name>")` is
//!    never wrapped again, an existing `module.exports` assignment is never
//!    duplicated, and a previous build's banner is replaced rather than
//!    stacked, so the transform's output is its own fixed point.
//!
//! 5. **Isolation**: modules share nothing but read-only configuration; one
//!    module's failure never affects another.

mod analyze;
mod batch;
mod config;
mod error;
mod finalize;
mod origin;
mod parse;
mod rewriter;
mod scope;
mod transform;

#[cfg(feature = "logging")]
pub mod logging;

#[cfg(test)]
mod safety_tests;

pub use analyze::{plan_edits, EditPlan, PropertySplit};
pub use batch::{transform_batch, ModuleJob, ModuleOutcome};
pub use config::{
    default_module_replacements, ExportConvention, ExternalNamespace, ModuleReplacement,
    TransformConfig,
};
pub use error::{Result, TransformError};
pub use finalize::{
    ensure_export_convention, has_export_convention, prepend_banner, render_banner, strip_banner,
    validate_metadata,
};
pub use origin::OriginTracer;
pub use parse::{parse_program, syntax_errors};
pub use rewriter::apply_plan;
pub use scope::{resolve_root, LivenessTable};
pub use transform::{
    transform_module, transform_named_module, BuildParams, TransformOutput, TransformStats,
};

#[cfg(feature = "napi")]
pub use transform::{transform_plugin_native, transform_plugin_stats_native};
