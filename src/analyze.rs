//! Read-only planning phase.
//!
//! Walks the parsed module together with its semantic model and records every
//! rewrite it would perform in an owned [`EditPlan`] keyed by source spans.
//! Nothing is mutated here; the plan is applied afterwards by
//! [`crate::rewriter`], once the semantic model (which borrows the tree) has
//! been dropped.
//!
//! Planning runs in two walks so that the liveness check sees the effect of
//! statement elision:
//!
//! 1. statements, loader calls and member accesses
//! 2. destructuring declarators

use oxc_ast::ast::{
    Argument, BindingPattern, CallExpression, Expression, ExpressionStatement, ObjectPattern,
    PropertyKey, Program, Statement, VariableDeclaration, VariableDeclarator,
};
use oxc_ast_visit::walk::{
    walk_call_expression, walk_expression, walk_expression_statement, walk_statements,
    walk_variable_declaration, walk_variable_declarator,
};
use oxc_ast_visit::Visit;
use oxc_semantic::{Scoping, Semantic};
use oxc_span::Span;
use std::collections::{HashMap, HashSet};
use tracing::trace;

use crate::config::TransformConfig;
use crate::origin::OriginTracer;
use crate::scope::{
    callee_method_name, is_unshadowed_global, resolve_root, LivenessTable, ReferenceCollector,
};

/// A property moved out of a destructure into its own bound declarator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySplit {
    pub property: Span,
    pub method: String,
}

#[derive(Debug, Clone, Default)]
pub struct EditPlan {
    /// Expression statements calling pure host methods.
    pub removed_statements: HashSet<Span>,
    /// Unreferenced destructure properties and rest elements.
    pub removed_patterns: HashSet<Span>,
    /// Loader calls replaced by a static property chain.
    pub substitutions: HashMap<Span, Vec<String>>,
    /// Member accesses wrapped in `.bind(null, "<plugin>")`.
    pub bound_members: HashSet<Span>,
    /// Bindable host methods moved out of a destructure, keyed by declarator.
    pub splits: HashMap<Span, Vec<PropertySplit>>,
    /// Declarators that may go away once their object pattern is empty.
    pub droppable_declarators: HashSet<Span>,
}

impl EditPlan {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.removed_statements.len()
            + self.removed_patterns.len()
            + self.substitutions.len()
            + self.bound_members.len()
            + self.splits.values().map(Vec::len).sum::<usize>()
    }
}

/// Plans every rewrite for one pass over `program`.
pub fn plan_edits<'a>(
    semantic: &Semantic<'a>,
    program: &Program<'a>,
    config: &TransformConfig,
    plugin_name: &str,
) -> EditPlan {
    let mut planner = EditPlanner {
        tracer: OriginTracer::new(semantic, &config.namespace),
        scoping: semantic.scoping(),
        config,
        plugin_name,
        liveness: LivenessTable::from_scoping(semantic.scoping()),
        already_bound: HashSet::new(),
        plan: EditPlan::default(),
    };
    planner.visit_program(program);

    let mut destructures = DestructurePlanner {
        inner: planner,
        listed_declarations: HashSet::new(),
        in_listed_declaration: false,
    };
    destructures.visit_program(program);
    destructures.inner.plan
}

struct EditPlanner<'s, 'a> {
    tracer: OriginTracer<'s, 'a>,
    scoping: &'s Scoping,
    config: &'s TransformConfig,
    plugin_name: &'s str,
    liveness: LivenessTable,
    /// Members that already sit inside `.bind(null, "<plugin>")`.
    already_bound: HashSet<Span>,
    plan: EditPlan,
}

impl<'s, 'a> EditPlanner<'s, 'a> {
    /// A standalone call to a pure host method whose value is discarded.
    fn is_pure_statement(&self, stmt: &ExpressionStatement<'a>) -> bool {
        let Expression::CallExpression(call) = resolve_root(&stmt.expression) else {
            return false;
        };
        let Some(method) = callee_method_name(&call.callee) else {
            return false;
        };
        self.config.namespace.is_pure(method) && self.tracer.originates_from_external(&call.callee)
    }

    /// `require("<specifier>")` with an unshadowed loader and a known specifier.
    fn substitution_for(&self, call: &CallExpression<'a>) -> Option<Vec<String>> {
        let Expression::Identifier(callee) = &call.callee else {
            return None;
        };
        if callee.name != self.config.namespace.loader.as_str() {
            return None;
        }
        if !is_unshadowed_global(self.scoping, callee) {
            return None;
        }
        if call.arguments.len() != 1 {
            return None;
        }
        let Argument::StringLiteral(specifier) = &call.arguments[0] else {
            return None;
        };
        self.config
            .replacement_for(specifier.value.as_str())
            .map(|chain| chain.to_vec())
    }

    /// Recognizes `<member>.bind(null, "<plugin>")` and remembers `<member>`.
    fn note_existing_bind(&mut self, call: &CallExpression<'a>) {
        let Expression::StaticMemberExpression(bind) = &call.callee else {
            return;
        };
        if bind.property.name != "bind" || call.arguments.len() != 2 {
            return;
        }
        let this_is_null = matches!(&call.arguments[0], Argument::NullLiteral(_));
        let binds_plugin = matches!(
            &call.arguments[1],
            Argument::StringLiteral(name) if name.value == self.plugin_name
        );
        if this_is_null && binds_plugin {
            if let Expression::StaticMemberExpression(target) = &bind.object {
                self.already_bound.insert(target.span);
            }
        }
    }
}

impl<'s, 'a> Visit<'a> for EditPlanner<'s, 'a> {
    fn visit_expression_statement(&mut self, stmt: &ExpressionStatement<'a>) {
        if self.is_pure_statement(stmt) {
            trace!(start = stmt.span.start, "eliding pure host call statement");
            self.plan.removed_statements.insert(stmt.span);

            let mut references = ReferenceCollector::new(self.scoping);
            references.visit_expression_statement(stmt);
            for symbol_id in references.symbols {
                self.liveness.release(symbol_id);
            }
            return;
        }
        walk_expression_statement(self, stmt);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Some(chain) = self.substitution_for(call) {
            trace!(start = call.span.start, chain = %chain.join("."), "substituting loader call");
            self.plan.substitutions.insert(call.span, chain);
            return;
        }
        self.note_existing_bind(call);
        walk_call_expression(self, call);
    }

    fn visit_expression(&mut self, expr: &Expression<'a>) {
        // Only expression positions; assignment targets never get bound.
        if let Expression::StaticMemberExpression(member) = expr {
            let bindable = self
                .config
                .namespace
                .is_bindable(member.property.name.as_str());
            if bindable
                && !self.already_bound.contains(&member.span)
                && self.tracer.originates_from_external(&member.object)
            {
                trace!(
                    start = member.span.start,
                    method = %member.property.name,
                    "binding host method"
                );
                self.plan.bound_members.insert(member.span);
                return;
            }
        }
        walk_expression(self, expr);
    }
}

struct DestructurePlanner<'s, 'a> {
    inner: EditPlanner<'s, 'a>,
    /// Declarations that sit directly in a statement list and so may lose
    /// every declarator.
    listed_declarations: HashSet<Span>,
    in_listed_declaration: bool,
}

impl<'s, 'a> DestructurePlanner<'s, 'a> {
    fn is_unreferenced(&self, pattern: &BindingPattern<'a>) -> bool {
        match pattern {
            BindingPattern::BindingIdentifier(ident) => ident
                .symbol_id
                .get()
                .is_some_and(|symbol_id| self.inner.liveness.is_unreferenced(symbol_id)),
            _ => false,
        }
    }

    /// Marks unreferenced properties of `pattern` and, at the top level of a
    /// declarator, bindable host methods to split out. Returns true when
    /// every property and the rest element are marked.
    fn plan_object_pattern(
        &mut self,
        pattern: &ObjectPattern<'a>,
        splits: Option<&mut Vec<PropertySplit>>,
    ) -> bool {
        let no_live_rest = match &pattern.rest {
            Some(rest) if self.is_unreferenced(&rest.argument) => {
                self.inner.plan.removed_patterns.insert(rest.span);
                true
            }
            Some(_) => false,
            None => true,
        };

        let mut emptied = no_live_rest;
        let mut splits = splits;
        for property in &pattern.properties {
            // Computed keys may have side effects.
            if property.computed {
                emptied = false;
                continue;
            }
            match &property.value {
                BindingPattern::BindingIdentifier(_) => {
                    // A live rest element would start collecting moved keys.
                    if !no_live_rest {
                        continue;
                    }
                    if self.is_unreferenced(&property.value) {
                        trace!(start = property.span.start, "pruning unreferenced binding");
                        self.inner.plan.removed_patterns.insert(property.span);
                        continue;
                    }
                    emptied = false;
                    let Some(splits) = splits.as_deref_mut() else {
                        continue;
                    };
                    if let PropertyKey::StaticIdentifier(key) = &property.key {
                        if self.inner.config.namespace.is_bindable(key.name.as_str()) {
                            splits.push(PropertySplit {
                                property: property.span,
                                method: key.name.to_string(),
                            });
                        }
                    }
                }
                BindingPattern::ObjectPattern(nested) => {
                    // `{ Filters: { byProps } }` with `byProps` dead leaves `Filters: {}`.
                    if self.plan_object_pattern(nested, None) && no_live_rest {
                        trace!(start = property.span.start, "pruning emptied nested pattern");
                        self.inner.plan.removed_patterns.insert(property.span);
                    } else {
                        emptied = false;
                    }
                }
                BindingPattern::ArrayPattern(nested) => {
                    emptied = false;
                    if let Some(rest) = &nested.rest {
                        if self.is_unreferenced(&rest.argument) {
                            self.inner.plan.removed_patterns.insert(rest.span);
                        }
                    }
                }
                BindingPattern::AssignmentPattern(_) => emptied = false,
            }
        }
        emptied
    }
}

/// `a` or `a.b.c`: evaluating it twice is unobservable.
fn is_static_chain(expr: &Expression<'_>) -> bool {
    let mut current = expr;
    loop {
        match current {
            Expression::Identifier(_) => return true,
            Expression::StaticMemberExpression(member) => current = &member.object,
            _ => return false,
        }
    }
}

impl<'s, 'a> Visit<'a> for DestructurePlanner<'s, 'a> {
    fn visit_statements(&mut self, stmts: &oxc_allocator::Vec<'a, Statement<'a>>) {
        for stmt in stmts {
            if let Statement::VariableDeclaration(decl) = stmt {
                self.listed_declarations.insert(decl.span);
            }
        }
        walk_statements(self, stmts);
    }

    fn visit_expression_statement(&mut self, stmt: &ExpressionStatement<'a>) {
        if self.inner.plan.removed_statements.contains(&stmt.span) {
            return;
        }
        walk_expression_statement(self, stmt);
    }

    fn visit_variable_declaration(&mut self, decl: &VariableDeclaration<'a>) {
        let outer = self.in_listed_declaration;
        self.in_listed_declaration = self.listed_declarations.contains(&decl.span);
        walk_variable_declaration(self, decl);
        self.in_listed_declaration = outer;
    }

    fn visit_variable_declarator(&mut self, declarator: &VariableDeclarator<'a>) {
        if let Some(init) = &declarator.init {
            if self.inner.tracer.originates_from_external(init) {
                match &declarator.id {
                    BindingPattern::ObjectPattern(pattern) => {
                        let static_init = is_static_chain(init);
                        let mut splits = Vec::new();
                        self.plan_object_pattern(
                            pattern,
                            if static_init { Some(&mut splits) } else { None },
                        );
                        if static_init && self.in_listed_declaration {
                            self.inner.plan.droppable_declarators.insert(declarator.span);
                        }
                        if !splits.is_empty() {
                            trace!(
                                start = declarator.span.start,
                                count = splits.len(),
                                "splitting bindable host methods out of destructure"
                            );
                            self.inner.plan.splits.insert(declarator.span, splits);
                        }
                    }
                    BindingPattern::ArrayPattern(pattern) => {
                        if let Some(rest) = &pattern.rest {
                            if self.is_unreferenced(&rest.argument) {
                                self.inner.plan.removed_patterns.insert(rest.span);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        walk_variable_declarator(self, declarator);
    }
}
