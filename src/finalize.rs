//! Output finalization.
//!
//! Two independent steps run once the rewrite has reached its fixed point:
//! the lazy-export statement is appended to the program when no top-level
//! statement already assigns the export slot, and the plugin metadata is
//! prepended as a `/** @key value */` banner.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{AssignmentOperator, AssignmentTarget, Expression, Program, Statement};
use regex::Regex;
use serde_json::{Map, Value};

use crate::config::ExportConvention;
use crate::error::{Result, TransformError};
use crate::parse::parse_statement;

lazy_static! {
    static ref META_KEY_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").unwrap();
    static ref LINE_BREAK_RE: Regex = Regex::new(r"\s*[\r\n]+\s*").unwrap();
    static ref LEADING_BANNER_RE: Regex = Regex::new(
        r"^\s*/\*\*[ \t]*\r?\n((?:[ \t]*\*[ \t]*@[^\r\n]*\r?\n)+)[ \t]*\*/[ \t]*(?:\r?\n)?"
    )
    .unwrap();
    static ref BANNER_TAG_RE: Regex =
        Regex::new(r"^[ \t]*\*[ \t]*@([A-Za-z][A-Za-z0-9_-]*)").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXPORT CONVENTION
// ═══════════════════════════════════════════════════════════════════════════════

fn assigns_export_slot(stmt: &Statement<'_>, convention: &ExportConvention) -> bool {
    let Statement::ExpressionStatement(expr_stmt) = stmt else {
        return false;
    };
    let Expression::AssignmentExpression(assign) = &expr_stmt.expression else {
        return false;
    };
    if assign.operator != AssignmentOperator::Assign {
        return false;
    }

    let (object, property) = match &assign.left {
        AssignmentTarget::StaticMemberExpression(member) => {
            (&member.object, member.property.name.as_str())
        }
        AssignmentTarget::ComputedMemberExpression(member) => match &member.expression {
            Expression::StringLiteral(key) => (&member.object, key.value.as_str()),
            _ => return false,
        },
        _ => return false,
    };

    matches!(object, Expression::Identifier(ident) if ident.name == convention.container.as_str())
        && property == convention.property
}

/// True when some top-level statement already assigns `module.exports`.
pub fn has_export_convention(program: &Program<'_>, convention: &ExportConvention) -> bool {
    program
        .body
        .iter()
        .any(|stmt| assigns_export_slot(stmt, convention))
}

/// Appends `module.exports = () => exports;` unless the slot is already
/// assigned. Returns whether a statement was added.
pub fn ensure_export_convention<'a>(
    allocator: &'a Allocator,
    program: &mut Program<'a>,
    convention: &ExportConvention,
) -> Result<bool> {
    if has_export_convention(program, convention) {
        return Ok(false);
    }
    let source = convention.statement_source();
    let stmt = parse_statement(allocator, &source).ok_or_else(|| {
        TransformError::InvalidConfig(format!("export convention {:?} does not parse", source))
    })?;
    program.body.push(stmt);
    Ok(true)
}

// ═══════════════════════════════════════════════════════════════════════════════
// METADATA BANNER
// ═══════════════════════════════════════════════════════════════════════════════

pub fn validate_metadata(metadata: &Map<String, Value>) -> Result<()> {
    for key in metadata.keys() {
        if !META_KEY_RE.is_match(key) {
            return Err(TransformError::InvalidMetadata {
                key: key.clone(),
                reason: "keys must start with a letter and contain only letters, digits, '_' or '-'"
                    .to_string(),
            });
        }
    }
    Ok(())
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(render_value).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

/// Keeps a value on one banner line and unable to close the comment.
fn sanitize(text: &str) -> String {
    LINE_BREAK_RE
        .replace_all(text.trim(), " ")
        .replace("*/", "*\\/")
}

/// Renders the metadata banner, or `None` for an empty mapping.
pub fn render_banner(metadata: &Map<String, Value>) -> Result<Option<String>> {
    if metadata.is_empty() {
        return Ok(None);
    }
    validate_metadata(metadata)?;

    let mut lines = Vec::with_capacity(metadata.len() + 2);
    lines.push("/**".to_string());
    for (key, value) in metadata {
        let rendered = sanitize(&render_value(value));
        if rendered.is_empty() {
            lines.push(format!(" * @{}", key));
        } else {
            lines.push(format!(" * @{} {}", key, rendered));
        }
    }
    lines.push(" */".to_string());
    Ok(Some(lines.join("\n")))
}

/// Removes a leading banner whose every tag is a key of `metadata`, so a
/// rebuilt module gets exactly one banner. Other leading comments stay.
pub fn strip_banner<'c>(code: &'c str, metadata: &Map<String, Value>) -> &'c str {
    let Some(captures) = LEADING_BANNER_RE.captures(code) else {
        return code;
    };
    let owned_by_build = captures[1].lines().all(|line| {
        BANNER_TAG_RE
            .captures(line)
            .is_some_and(|tag| metadata.contains_key(&tag[1]))
    });
    if !owned_by_build {
        return code;
    }
    &code[captures[0].len()..]
}

pub fn prepend_banner(code: &str, banner: &str) -> String {
    if code.starts_with(banner) {
        return code.to_string();
    }
    format!("{}\n{}", banner, code)
}
