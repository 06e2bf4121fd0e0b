//! Root resolution, reference lookups and the liveness table.

use oxc_ast::ast::{Expression, IdentifierReference};
use oxc_ast_visit::Visit;
use oxc_semantic::Scoping;
use oxc_syntax::symbol::SymbolId;
use std::collections::HashMap;

/// Unwraps a member-access chain down to its root: `a.b['c'].d` -> `a`,
/// `f(x).y` -> `f(x)`. Any other shape is already a root.
pub fn resolve_root<'b, 'a>(expr: &'b Expression<'a>) -> &'b Expression<'a> {
    let mut current = expr;
    while let Some(member) = current.as_member_expression() {
        current = member.object();
    }
    current
}

/// Name of the method a callee invokes: the final static property of a member
/// callee, or the callee identifier itself.
pub fn callee_method_name<'b>(callee: &'b Expression<'_>) -> Option<&'b str> {
    match callee {
        Expression::StaticMemberExpression(member) => Some(member.property.name.as_str()),
        Expression::Identifier(ident) => Some(ident.name.as_str()),
        _ => None,
    }
}

pub fn resolved_symbol(scoping: &Scoping, ident: &IdentifierReference<'_>) -> Option<SymbolId> {
    let reference_id = ident.reference_id.get()?;
    scoping.get_reference(reference_id).symbol_id()
}

/// True when `ident` refers to a global: no declaration anywhere in the
/// enclosing scopes binds its name. An unresolvable reference is treated as
/// shadowed.
pub fn is_unshadowed_global(scoping: &Scoping, ident: &IdentifierReference<'_>) -> bool {
    match ident.reference_id.get() {
        Some(reference_id) => scoping.get_reference(reference_id).symbol_id().is_none(),
        None => false,
    }
}

/// Reference counts per symbol, seeded from semantic analysis and lowered as
/// planned removals drop use-sites.
#[derive(Debug, Clone, Default)]
pub struct LivenessTable {
    counts: HashMap<SymbolId, usize>,
}

impl LivenessTable {
    pub fn from_scoping(scoping: &Scoping) -> Self {
        let counts = scoping
            .symbol_ids()
            .map(|symbol_id| {
                (
                    symbol_id,
                    scoping.get_resolved_reference_ids(symbol_id).len(),
                )
            })
            .collect();
        LivenessTable { counts }
    }

    pub fn reference_count(&self, symbol_id: SymbolId) -> usize {
        self.counts.get(&symbol_id).copied().unwrap_or(0)
    }

    pub fn is_unreferenced(&self, symbol_id: SymbolId) -> bool {
        self.reference_count(symbol_id) == 0
    }

    /// Records that one use-site of `symbol_id` is going away.
    pub fn release(&mut self, symbol_id: SymbolId) {
        if let Some(count) = self.counts.get_mut(&symbol_id) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Collects the symbols of every resolved reference inside a subtree.
pub struct ReferenceCollector<'s> {
    scoping: &'s Scoping,
    pub symbols: Vec<SymbolId>,
}

impl<'s> ReferenceCollector<'s> {
    pub fn new(scoping: &'s Scoping) -> Self {
        ReferenceCollector {
            scoping,
            symbols: Vec::new(),
        }
    }
}

impl<'a, 's> Visit<'a> for ReferenceCollector<'s> {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if let Some(symbol_id) = resolved_symbol(self.scoping, ident) {
            self.symbols.push(symbol_id);
        }
    }
}
