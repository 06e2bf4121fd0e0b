//! Origin tracing: is an expression statically known to be (a descendant of)
//! the host namespace object?
//!
//! Every destructive rewrite is gated on this check. A `false` leaves code
//! untouched, which is always safe; a wrong `true` corrupts output. The trace
//! therefore accepts exactly three hops:
//!
//! - member access (`BdApi.Webpack.Filters` descends from `BdApi`)
//! - a variable declarator initializer (`const { Webpack } = BdApi`)
//! - the bundler's single-argument interop helper call
//!
//! Parameters, reassigned bindings, and arbitrary calls all end the trace.

use oxc_ast::ast::Expression;
use oxc_ast::AstKind;
use oxc_semantic::Semantic;
use oxc_syntax::symbol::SymbolId;
use std::collections::HashSet;

use crate::config::ExternalNamespace;
use crate::scope::{is_unshadowed_global, resolve_root, resolved_symbol};

pub struct OriginTracer<'s, 'a> {
    semantic: &'s Semantic<'a>,
    namespace: &'s ExternalNamespace,
}

impl<'s, 'a> OriginTracer<'s, 'a> {
    pub fn new(semantic: &'s Semantic<'a>, namespace: &'s ExternalNamespace) -> Self {
        OriginTracer {
            semantic,
            namespace,
        }
    }

    pub fn namespace(&self) -> &'s ExternalNamespace {
        self.namespace
    }

    pub fn originates_from_external<'r>(&self, expr: &'r Expression<'a>) -> bool {
        let scoping = self.semantic.scoping();
        let mut visited: HashSet<SymbolId> = HashSet::new();
        let mut current: &'r Expression<'a> = expr;

        loop {
            match resolve_root(current) {
                Expression::CallExpression(call) => {
                    let Expression::Identifier(callee) = &call.callee else {
                        return false;
                    };
                    if callee.name != self.namespace.interop_helper.as_str() {
                        return false;
                    }
                    if call.arguments.len() != 1 {
                        return false;
                    }
                    let Some(wrapped) = call.arguments[0].as_expression() else {
                        return false;
                    };
                    current = wrapped;
                }
                Expression::Identifier(ident) => {
                    if ident.name == self.namespace.reserved_name.as_str()
                        && is_unshadowed_global(scoping, ident)
                    {
                        return true;
                    }
                    let Some(symbol_id) = resolved_symbol(scoping, ident) else {
                        return false;
                    };
                    // `const a = b, b = a` style cycles
                    if !visited.insert(symbol_id) {
                        return false;
                    }
                    let Some(init) = self.declarator_init(symbol_id) else {
                        return false;
                    };
                    current = init;
                }
                _ => return false,
            }
        }
    }

    /// Initializer of the declarator that binds `symbol_id`, if the symbol is
    /// a variable that is never reassigned.
    fn declarator_init(&self, symbol_id: SymbolId) -> Option<&'a Expression<'a>> {
        let scoping = self.semantic.scoping();
        let reassigned = scoping
            .get_resolved_reference_ids(symbol_id)
            .iter()
            .any(|&reference_id| scoping.get_reference(reference_id).is_write());
        // `var api = BdApi; var api = other;` has no write reference.
        if reassigned || !scoping.symbol_redeclarations(symbol_id).is_empty() {
            return None;
        }

        let node_id = scoping.symbol_declaration(symbol_id);
        match self.semantic.nodes().get_node(node_id).kind() {
            AstKind::VariableDeclarator(declarator) => declarator.init.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse_program;
    use oxc_allocator::Allocator;
    use oxc_ast::ast::Statement;
    use oxc_semantic::SemanticBuilder;

    /// Traces the expression of the module's last statement.
    fn traces(code: &str) -> bool {
        let allocator = Allocator::default();
        let program = parse_program(&allocator, code, "test").unwrap();
        let semantic = SemanticBuilder::new().build(&program).semantic;
        let namespace = ExternalNamespace::default();
        let tracer = OriginTracer::new(&semantic, &namespace);
        match program.body.last() {
            Some(Statement::ExpressionStatement(stmt)) => {
                tracer.originates_from_external(&stmt.expression)
            }
            _ => panic!("last statement must be an expression statement"),
        }
    }

    #[test]
    fn test_direct_global() {
        assert!(traces("BdApi;"));
        assert!(traces("BdApi.Webpack.Filters.byProps;"));
    }

    #[test]
    fn test_alias_chain() {
        assert!(traces("const a = BdApi; const b = a.Webpack; const c = b; c.getModule;"));
    }

    #[test]
    fn test_destructure_chain() {
        assert!(traces(
            "const { Webpack } = BdApi; const { getModule, Filters } = Webpack; getModule;"
        ));
        assert!(traces(
            "const { Webpack } = BdApi; const { Filters: { byProps } } = Webpack; byProps;"
        ));
    }

    #[test]
    fn test_interop_wrapper() {
        assert!(traces(
            "function _interopDefaultLegacy(e) { return e; } \
             var api = _interopDefaultLegacy(BdApi); api['default'].Patcher;"
        ));
    }

    #[test]
    fn test_interop_wrapper_requires_single_argument() {
        assert!(!traces(
            "function _interopDefaultLegacy(e) { return e; } \
             var api = _interopDefaultLegacy(BdApi, 1); api.Patcher;"
        ));
    }

    #[test]
    fn test_other_calls_fail() {
        assert!(!traces("const api = getApi(BdApi); api.Patcher;"));
        assert!(!traces("const api = BdApi.Webpack.getModule(x); api.Patcher;"));
    }

    /// Traces the last expression statement inside the module's first function.
    fn traces_in_function(code: &str) -> bool {
        let allocator = Allocator::default();
        let program = parse_program(&allocator, code, "test").unwrap();
        let semantic = SemanticBuilder::new().build(&program).semantic;
        let namespace = ExternalNamespace::default();
        let tracer = OriginTracer::new(&semantic, &namespace);
        let Some(Statement::FunctionDeclaration(func)) = program.body.first() else {
            panic!("first statement must be a function declaration");
        };
        let body = func.body.as_ref().unwrap();
        match body.statements.last() {
            Some(Statement::ExpressionStatement(stmt)) => {
                tracer.originates_from_external(&stmt.expression)
            }
            _ => panic!("function must end with an expression statement"),
        }
    }

    #[test]
    fn test_parameter_fails() {
        assert!(!traces_in_function("function f(api) { api.Patcher; } f(BdApi);"));
        assert!(!traces("function f(api) { return api; } f;"));
    }

    #[test]
    fn test_parameter_shadowing_reserved_name_fails() {
        assert!(!traces_in_function("function f(BdApi) { BdApi.Patcher; }"));
        assert!(traces_in_function("function f(x) { BdApi.Patcher; }"));
    }

    #[test]
    fn test_local_inside_function_traces() {
        assert!(traces_in_function(
            "function f() { const { Patcher } = BdApi; Patcher.before; }"
        ));
    }

    #[test]
    fn test_shadowed_reserved_name_fails() {
        assert!(!traces("const BdApi = {}; BdApi.Patcher;"));
        assert!(!traces("const BdApi = makeFake(); const x = BdApi; x;"));
    }

    #[test]
    fn test_reassigned_binding_fails() {
        assert!(!traces("let api = BdApi; api = other; api.Patcher;"));
    }

    #[test]
    fn test_redeclared_binding_fails() {
        assert!(!traces("var api = BdApi; var api = makeFake(); api.saveData;"));
        assert!(!traces("var api = BdApi; function api() {} api.saveData;"));
        assert!(traces("var api = BdApi; var other = makeFake(); api.saveData;"));
    }

    #[test]
    fn test_unknown_global_fails() {
        assert!(!traces("window.BdApi;"));
        assert!(!traces("somethingElse.Patcher;"));
    }

    #[test]
    fn test_cycle_terminates() {
        assert!(!traces("var a = b; var b = a; a;"));
    }
}
