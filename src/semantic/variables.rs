//! Per-stage variable scoping.
//!
//! A stage's scope is a chain: build-arg overrides → stage-local ARG/ENV in
//! declaration order → global meta-ARG defaults. ENV shadows ARG with the
//! same name within a stage; a build-arg override only applies to names
//! declared as ARG (meta or stage-local).

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Arg,
    Env,
}

#[derive(Debug, Clone)]
struct ScopeEntry {
    name: String,
    value: Option<String>,
    kind: VarKind,
    line: usize,
}

/// The variable scope of one stage.
#[derive(Debug, Clone, Default)]
pub struct VariableScope {
    build_args: BTreeMap<String, String>,
    /// Stage-local declarations, in source order.
    entries: Vec<ScopeEntry>,
    /// Meta-ARG defaults (declared before the first FROM).
    meta: BTreeMap<String, Option<String>>,
}

impl VariableScope {
    pub fn new(
        meta: &[(String, Option<String>)],
        build_args: &BTreeMap<String, String>,
    ) -> VariableScope {
        VariableScope {
            build_args: build_args.clone(),
            entries: Vec::new(),
            meta: meta.iter().cloned().collect(),
        }
    }

    pub fn declare_arg(&mut self, name: &str, default: Option<&str>, line: usize) {
        self.entries.push(ScopeEntry {
            name: name.to_string(),
            value: default.map(|s| s.to_string()),
            kind: VarKind::Arg,
            line,
        });
    }

    pub fn declare_env(&mut self, name: &str, value: &str, line: usize) {
        self.entries.push(ScopeEntry {
            name: name.to_string(),
            value: Some(value.to_string()),
            kind: VarKind::Env,
            line,
        });
    }

    /// Resolves a name through the scope chain. Returns `None` when the
    /// name is not visible; `Some(None)` when it is declared without any
    /// value (an ARG with no default and no override).
    pub fn resolve(&self, name: &str) -> Option<Option<String>> {
        // ENV wins over ARG within the stage.
        if let Some(entry) = self
            .entries
            .iter()
            .rev()
            .find(|e| e.kind == VarKind::Env && e.name == name)
        {
            return Some(entry.value.clone());
        }

        if let Some(entry) = self
            .entries
            .iter()
            .rev()
            .find(|e| e.kind == VarKind::Arg && e.name == name)
        {
            if let Some(over) = self.build_args.get(name) {
                return Some(Some(over.clone()));
            }
            if entry.value.is_some() {
                return Some(entry.value.clone());
            }
            // Redeclared meta-ARG inherits its global default.
            if let Some(meta_default) = self.meta.get(name) {
                return Some(meta_default.clone());
            }
            return Some(None);
        }

        if let Some(meta_default) = self.meta.get(name) {
            if let Some(over) = self.build_args.get(name) {
                return Some(Some(over.clone()));
            }
            return Some(meta_default.clone());
        }

        None
    }

    /// True when the name is visible anywhere in the chain.
    pub fn is_declared(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// The 1-based line where the name was last declared in this stage.
    pub fn declaration_line(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.name == name)
            .map(|e| e.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, Option<&str>)]) -> Vec<(String, Option<String>)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(|s| s.to_string())))
            .collect()
    }

    #[test]
    fn test_env_shadows_arg() {
        let mut scope = VariableScope::new(&[], &BTreeMap::new());
        scope.declare_arg("PATH_PREFIX", Some("/usr"), 2);
        scope.declare_env("PATH_PREFIX", "/opt", 3);
        assert_eq!(
            scope.resolve("PATH_PREFIX"),
            Some(Some("/opt".to_string()))
        );
    }

    #[test]
    fn test_env_shadows_arg_regardless_of_order() {
        let mut scope = VariableScope::new(&[], &BTreeMap::new());
        scope.declare_env("NAME", "env-value", 2);
        scope.declare_arg("NAME", Some("arg-value"), 3);
        assert_eq!(scope.resolve("NAME"), Some(Some("env-value".to_string())));
    }

    #[test]
    fn test_build_arg_overrides_arg_default() {
        let mut build_args = BTreeMap::new();
        build_args.insert("VERSION".to_string(), "9.9".to_string());
        let mut scope = VariableScope::new(&[], &build_args);
        scope.declare_arg("VERSION", Some("1.0"), 2);
        assert_eq!(scope.resolve("VERSION"), Some(Some("9.9".to_string())));
    }

    #[test]
    fn test_build_arg_does_not_override_env() {
        let mut build_args = BTreeMap::new();
        build_args.insert("MODE".to_string(), "debug".to_string());
        let mut scope = VariableScope::new(&[], &build_args);
        scope.declare_env("MODE", "release", 2);
        assert_eq!(scope.resolve("MODE"), Some(Some("release".to_string())));
    }

    #[test]
    fn test_meta_arg_visible() {
        let scope = VariableScope::new(&meta(&[("BASE", Some("alpine"))]), &BTreeMap::new());
        assert_eq!(scope.resolve("BASE"), Some(Some("alpine".to_string())));
    }

    #[test]
    fn test_redeclared_meta_arg_inherits_default() {
        let mut scope = VariableScope::new(&meta(&[("BASE", Some("alpine"))]), &BTreeMap::new());
        scope.declare_arg("BASE", None, 3);
        assert_eq!(scope.resolve("BASE"), Some(Some("alpine".to_string())));
    }

    #[test]
    fn test_undeclared_not_visible() {
        let scope = VariableScope::new(&[], &BTreeMap::new());
        assert_eq!(scope.resolve("NOPE"), None);
        assert!(!scope.is_declared("NOPE"));
    }

    #[test]
    fn test_arg_without_default() {
        let mut scope = VariableScope::new(&[], &BTreeMap::new());
        scope.declare_arg("TOKEN", None, 2);
        assert_eq!(scope.resolve("TOKEN"), Some(None));
        assert!(scope.is_declared("TOKEN"));
    }
}
