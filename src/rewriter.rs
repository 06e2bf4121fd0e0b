//! Mutating phase: applies an [`EditPlan`] to the tree it was planned on.
//!
//! All decisions were made during planning; this visitor only matches spans
//! and rebuilds nodes. Children are rewritten before their parents so a
//! substituted loader call inside a destructure initializer is already in
//! place when the declarator is split.

use oxc_allocator::{Allocator, Box as oxc_box, CloneIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_ast_visit::walk_mut::{
    walk_array_pattern, walk_expression, walk_object_pattern, walk_statement, walk_statements,
    walk_variable_declaration,
};
use oxc_ast_visit::VisitMut;
use oxc_span::SPAN;

use crate::analyze::{EditPlan, PropertySplit};
use crate::transform::TransformStats;

pub struct PlanApplier<'p, 'a> {
    ast: AstBuilder<'a>,
    plan: &'p EditPlan,
    plugin_name: &'a str,
    pub stats: TransformStats,
}

impl<'p, 'a> PlanApplier<'p, 'a> {
    pub fn new(allocator: &'a Allocator, plan: &'p EditPlan, plugin_name: &str) -> Self {
        PlanApplier {
            ast: AstBuilder::new(allocator),
            plan,
            plugin_name: allocator.alloc_str(plugin_name),
            stats: TransformStats::default(),
        }
    }

    fn is_removed(&self, stmt: &Statement<'a>) -> bool {
        matches!(
            stmt,
            Statement::ExpressionStatement(expr_stmt)
                if self.plan.removed_statements.contains(&expr_stmt.span)
        )
    }

    /// `["BdApi", "Webpack", "Filters"]` -> `BdApi.Webpack.Filters`
    fn property_chain(&self, chain: &[String]) -> Option<Expression<'a>> {
        let (root, rest) = chain.split_first()?;
        let root: &'a str = self.ast.allocator.alloc_str(root);
        let mut expr = self.ast.expression_identifier(SPAN, root);
        for name in rest {
            expr = self.static_member(expr, name);
        }
        Some(expr)
    }

    fn static_member(&self, object: Expression<'a>, property: &str) -> Expression<'a> {
        let property: &'a str = self.ast.allocator.alloc_str(property);
        Expression::from(self.ast.member_expression_static(
            SPAN,
            object,
            self.ast.identifier_name(SPAN, property),
            false,
        ))
    }

    /// `target` -> `target.bind(null, "<plugin>")`
    fn bind_to_plugin(&self, target: Expression<'a>) -> Expression<'a> {
        let callee = self.static_member(target, "bind");

        let mut args = self.ast.vec();
        args.push(Argument::from(self.ast.expression_null_literal(SPAN)));
        args.push(Argument::from(self.ast.expression_string_literal(
            SPAN,
            self.plugin_name,
            None,
        )));

        self.ast.expression_call(
            SPAN,
            callee,
            None::<oxc_box<TSTypeParameterInstantiation>>,
            args,
            false,
        )
    }

    /// Moves the planned properties out of `declarator`'s object pattern and
    /// returns one `name = <init>.<method>.bind(null, "<plugin>")` declarator
    /// for each.
    fn split_declarator(
        &mut self,
        declarator: &mut VariableDeclarator<'a>,
        splits: &[PropertySplit],
    ) -> Vec<VariableDeclarator<'a>> {
        let moved = {
            let BindingPattern::ObjectPattern(pattern) = &mut declarator.id else {
                return Vec::new();
            };
            let properties = std::mem::replace(&mut pattern.properties, self.ast.vec());
            let mut moved = Vec::new();
            for property in properties {
                match splits.iter().find(|split| split.property == property.span) {
                    Some(split) => moved.push((split.method.as_str(), property.value)),
                    None => pattern.properties.push(property),
                }
            }
            moved
        };

        let Some(init) = declarator.init.as_ref() else {
            return Vec::new();
        };
        let init = init.clone_in(self.ast.allocator);

        let mut declarators = Vec::with_capacity(moved.len());
        for (method, id) in moved {
            let member = self.static_member(init.clone_in(self.ast.allocator), method);
            let mut split = declarator.clone_in(self.ast.allocator);
            split.span = SPAN;
            split.id = id;
            split.init = Some(self.bind_to_plugin(member));
            declarators.push(split);
        }
        self.stats.declarators_split += declarators.len();
        declarators
    }
}

fn is_empty_object_pattern(pattern: &BindingPattern<'_>) -> bool {
    matches!(
        pattern,
        BindingPattern::ObjectPattern(object) if object.properties.is_empty() && object.rest.is_none()
    )
}

impl<'p, 'a> VisitMut<'a> for PlanApplier<'p, 'a> {
    fn visit_statements(&mut self, stmts: &mut ArenaVec<'a, Statement<'a>>) {
        let before = stmts.len();
        stmts.retain(|stmt| !self.is_removed(stmt));
        self.stats.statements_elided += before - stmts.len();

        walk_statements(self, stmts);

        // Every declarator of a listed declaration may have been dropped.
        stmts.retain(|stmt| {
            !matches!(stmt, Statement::VariableDeclaration(decl) if decl.declarations.is_empty())
        });
    }

    fn visit_statement(&mut self, stmt: &mut Statement<'a>) {
        // Single-statement positions such as `if (x) BdApi.findModule(f);`
        if self.is_removed(stmt) {
            *stmt = self.ast.statement_empty(SPAN);
            self.stats.statements_elided += 1;
            return;
        }
        walk_statement(self, stmt);
    }

    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        walk_expression(self, expr);

        let plan = self.plan;
        match expr {
            Expression::CallExpression(call) => {
                let Some(chain) = plan.substitutions.get(&call.span) else {
                    return;
                };
                if let Some(replacement) = self.property_chain(chain) {
                    *expr = replacement;
                    self.stats.imports_substituted += 1;
                }
            }
            Expression::StaticMemberExpression(member) => {
                if !plan.bound_members.contains(&member.span) {
                    return;
                }
                let target = std::mem::replace(expr, self.ast.expression_null_literal(SPAN));
                *expr = self.bind_to_plugin(target);
                self.stats.members_bound += 1;
            }
            _ => {}
        }
    }

    fn visit_object_pattern(&mut self, pattern: &mut ObjectPattern<'a>) {
        let plan = self.plan;
        let before = pattern.properties.len();
        pattern
            .properties
            .retain(|property| !plan.removed_patterns.contains(&property.span));
        self.stats.patterns_pruned += before - pattern.properties.len();

        if pattern
            .rest
            .as_ref()
            .is_some_and(|rest| plan.removed_patterns.contains(&rest.span))
        {
            pattern.rest = None;
            self.stats.patterns_pruned += 1;
        }
        walk_object_pattern(self, pattern);
    }

    fn visit_array_pattern(&mut self, pattern: &mut ArrayPattern<'a>) {
        let plan = self.plan;
        if pattern
            .rest
            .as_ref()
            .is_some_and(|rest| plan.removed_patterns.contains(&rest.span))
        {
            pattern.rest = None;
            self.stats.patterns_pruned += 1;
        }
        walk_array_pattern(self, pattern);
    }

    fn visit_variable_declaration(&mut self, decl: &mut VariableDeclaration<'a>) {
        walk_variable_declaration(self, decl);

        let plan = self.plan;
        let touched = decl.declarations.iter().any(|declarator| {
            plan.splits.contains_key(&declarator.span)
                || plan.droppable_declarators.contains(&declarator.span)
        });
        if !touched {
            return;
        }

        let declarations = std::mem::replace(&mut decl.declarations, self.ast.vec());
        for mut declarator in declarations {
            let split_out = match plan.splits.get(&declarator.span) {
                Some(splits) => self.split_declarator(&mut declarator, splits),
                None => Vec::new(),
            };
            let droppable = plan.droppable_declarators.contains(&declarator.span);
            if !(droppable && is_empty_object_pattern(&declarator.id)) {
                decl.declarations.push(declarator);
            }
            for split in split_out {
                decl.declarations.push(split);
            }
        }
    }
}

/// Applies `plan` to `program` and reports what was actually rewritten.
pub fn apply_plan<'a>(
    allocator: &'a Allocator,
    program: &mut Program<'a>,
    plan: &EditPlan,
    plugin_name: &str,
) -> TransformStats {
    let mut applier = PlanApplier::new(allocator, plan, plugin_name);
    applier.visit_program(program);
    applier.stats
}
