//! Parsing bundled CommonJS output with oxc.

use oxc_allocator::Allocator;
use oxc_ast::ast::{Program, Statement};
use oxc_parser::{ParseOptions, Parser};
use oxc_span::SourceType;

use crate::error::{Result, TransformError};

/// Bundler output is a single CommonJS script, not an ES module.
pub fn module_source_type() -> SourceType {
    SourceType::default().with_module(false)
}

/// Parentheses are dropped so `(0, x.y)` style wrappers never hide a member
/// chain from the resolver.
fn parse_options() -> ParseOptions {
    ParseOptions {
        preserve_parens: false,
        ..ParseOptions::default()
    }
}

pub fn parse_program<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    module_id: &str,
) -> Result<Program<'a>> {
    let ret = Parser::new(allocator, source, module_source_type())
        .with_options(parse_options())
        .parse();

    if ret.panicked || !ret.errors.is_empty() {
        let diagnostics: Vec<String> = ret.errors.iter().map(|e| format!("{e}")).collect();
        return Err(TransformError::parse_error(module_id, &diagnostics));
    }
    Ok(ret.program)
}

/// Returns the diagnostics produced by parsing `source`; empty when valid.
pub fn syntax_errors(source: &str) -> Vec<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, module_source_type())
        .with_options(parse_options())
        .parse();
    let mut errors: Vec<String> = ret.errors.iter().map(|e| format!("{e}")).collect();
    if ret.panicked && errors.is_empty() {
        errors.push("parser aborted".to_string());
    }
    errors
}

/// Parses a single generated statement into `allocator`, so it can be spliced
/// into a program living in the same arena.
pub fn parse_statement<'a>(allocator: &'a Allocator, snippet: &str) -> Option<Statement<'a>> {
    let text: &'a str = allocator.alloc_str(snippet);
    let ret = Parser::new(allocator, text, module_source_type())
        .with_options(parse_options())
        .parse();
    if ret.panicked || !ret.errors.is_empty() {
        return None;
    }
    ret.program.body.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_module() {
        let allocator = Allocator::default();
        let program = parse_program(
            &allocator,
            "'use strict';\nvar React = require('react');\nexports.start = start;",
            "Example",
        )
        .unwrap();
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_parse_failure_carries_module_id() {
        let allocator = Allocator::default();
        let err = parse_program(&allocator, "const = ;", "Broken").unwrap_err();
        match err {
            TransformError::Parse { module, message } => {
                assert_eq!(module, "Broken");
                assert!(!message.is_empty());
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_errors() {
        assert!(syntax_errors("module.exports = () => exports;").is_empty());
        assert!(!syntax_errors("function (").is_empty());
    }

    #[test]
    fn test_parse_statement_snippet() {
        let allocator = Allocator::default();
        let stmt = parse_statement(&allocator, "module.exports = () => exports;");
        assert!(matches!(stmt, Some(Statement::ExpressionStatement(_))));
        assert!(parse_statement(&allocator, "module.exports = (").is_none());
    }
}
