//! Safety Gate Tests for Plugin Transform Invariants
//!
//! These tests pin the guarantees a build depends on:
//! - no rewrite fires on code that does not provably reach the host object
//! - pruning never removes a binding that is still read
//! - finalization never duplicates the export statement
//! - identical input always yields identical output

#[cfg(test)]
mod tests {
    use crate::config::TransformConfig;
    use crate::transform::{transform_module, BuildParams};
    use serde_json::json;

    fn run(code: &str) -> String {
        transform_module(code, &BuildParams::new("Example"), &TransformConfig::default())
            .unwrap_or_else(|e| panic!("transform failed: {e}"))
            .code
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // ORIGIN SAFETY: shadowed host names never trigger rewrites
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_parameter_shadowing_blocks_every_rewrite() {
        let out = run("function setup(BdApi) {\n\
               const { a } = BdApi;\n\
               BdApi.findModule(filter);\n\
               BdApi.saveData('key', 1);\n\
             }\n\
             setup(fake);");
        assert!(!out.contains("bind("), "no binding on a shadowed root: {out}");
        assert!(out.contains("BdApi.findModule(filter)"), "pure call kept: {out}");
        assert!(out.contains("{ a }"), "destructure untouched: {out}");
    }

    #[test]
    fn test_local_declaration_shadowing_blocks_every_rewrite() {
        let out = run("const BdApi = makeFake();\n\
             const { unused } = BdApi;\n\
             BdApi.getModule(f);\n\
             BdApi.injectCSS('id', 'css');");
        assert!(!out.contains("bind("), "{out}");
        assert!(out.contains("BdApi.getModule(f)"), "{out}");
        assert!(out.contains("unused"), "{out}");
    }

    #[test]
    fn test_shadowed_loader_keeps_require() {
        let out = run("function load(require) { return require('react'); }");
        assert!(out.contains("require(\"react\")"), "{out}");
        assert!(!out.contains("BdApi.React"), "{out}");
    }

    #[test]
    fn test_untraced_bindable_member_is_not_bound() {
        let out = run("const x = someLocalObject;\nx.loadData('key');");
        assert!(!out.contains("bind("), "{out}");
        assert!(out.contains("x.loadData(\"key\")"), "{out}");
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // LIVENESS: pruning and elision only remove dead code
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_destructure_keeps_only_used_sibling() {
        let out = run("const { first, second, third } = BdApi.Webpack;\nuse(second);");
        assert!(out.contains("const { second } = BdApi.Webpack;"), "{out}");
        assert!(!out.contains("first"), "{out}");
        assert!(!out.contains("third"), "{out}");
    }

    #[test]
    fn test_bindable_statement_is_not_elided() {
        let out = run("BdApi.saveData('key', { a: 1 });");
        assert!(
            out.contains("BdApi.saveData.bind(null, \"Example\")(\"key\""),
            "bindable call kept and bound: {out}"
        );
    }

    #[test]
    fn test_pure_statement_with_used_result_is_kept() {
        let out = run("const mod = BdApi.Webpack.getModule(f);\nuse(mod);");
        assert!(out.contains("BdApi.Webpack.getModule(f)"), "{out}");
    }

    #[test]
    fn test_untraced_pure_statement_is_kept() {
        let out = run("localApi.findModule(f);");
        assert!(out.contains("localApi.findModule(f)"), "{out}");
    }

    #[test]
    fn test_reassigned_alias_is_not_trusted() {
        let out = run("let api = BdApi;\napi = other;\napi.saveData('k');");
        assert!(!out.contains("bind("), "{out}");
    }

    #[test]
    fn test_redeclared_alias_is_not_trusted() {
        let out = run("var api = BdApi;\nvar api = makeFake();\napi.saveData('k', 1);");
        assert!(!out.contains("bind("), "{out}");
        assert!(out.contains("api.saveData(\"k\", 1)"), "{out}");
    }

    #[test]
    fn test_emptied_nested_destructure_is_dropped() {
        let out = run("const { Filters: { byProps } } = BdApi.Webpack;\ngo();");
        assert!(!out.contains("Filters"), "{out}");
        assert!(!out.contains("byProps"), "{out}");
        assert!(!out.contains("{}"), "no empty pattern left behind: {out}");
        assert!(out.contains("go();"), "{out}");
    }

    #[test]
    fn test_rest_in_use_keeps_siblings() {
        let out = run("const { a, ...rest } = BdApi;\nuse(rest);");
        assert!(out.contains("a,"), "removing `a` would change `rest`: {out}");
        assert!(out.contains("...rest"), "{out}");
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // IDEMPOTENCE AND DETERMINISM
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_retransform_adds_no_second_export_statement() {
        let once = run("const { injectCSS } = require('bdapi');\ninjectCSS('id', 'css');");
        let twice = run(&once);
        assert_eq!(twice.matches("module.exports").count(), 1, "{twice}");
        assert_eq!(once, twice, "output is a fixed point of the transform");
    }

    #[test]
    fn test_retransform_keeps_a_single_banner() {
        let mut params = BuildParams::new("Example");
        if let serde_json::Value::Object(map) = json!({ "name": "Example", "version": "1.0.0" }) {
            params.metadata = map;
        }
        let config = TransformConfig::default();
        let build = |code: &str| {
            transform_module(code, &params, &config)
                .unwrap_or_else(|e| panic!("transform failed: {e}"))
                .code
        };

        let once = build("BdApi.saveData('k', 1);");
        let twice = build(&once);
        assert_eq!(twice.matches("@name").count(), 1, "{twice}");
        assert_eq!(once, twice, "output is a fixed point of the transform");
    }

    #[test]
    fn test_retransform_does_not_double_bind() {
        let once = run("BdApi.Patcher.before(target, 'render', cb);");
        let twice = run(&once);
        assert_eq!(twice.matches(".bind(").count(), 1, "{twice}");
    }

    #[test]
    fn test_hand_written_export_is_respected() {
        let out = run("module.exports = Plugin;");
        assert_eq!(out.matches("module.exports").count(), 1, "{out}");
        assert!(!out.contains("() => exports"), "{out}");
    }

    #[test]
    fn test_repeated_runs_are_byte_identical() {
        let source = "'use strict';\n\
             var bdapi = require('bdapi');\n\
             function _interopDefaultLegacy(e) { return e && typeof e === 'object' && 'default' in e ? e : { 'default': e }; }\n\
             var bdapi__default = _interopDefaultLegacy(bdapi);\n\
             const { Filters, getModule } = bdapi__default['default'].Webpack;\n\
             getModule(Filters.byProps('x'));\n\
             bdapi__default['default'].saveData('k', 1);";
        let first = run(source);
        for _ in 0..4 {
            assert_eq!(run(source), first);
        }
    }
}
