//! Environment
//!
//! Scoped variable storage. The environment is a scope chain:
//!
//! - one base scope (`Global` for the top-level shell, `Subshell` for a
//!   snapshot taken at subshell entry),
//! - `Function` scopes pushed on function call and popped on return,
//! - `Temporary` scopes holding `NAME=value cmd` prefix assignments.
//!
//! Lookups walk from the innermost scope outwards; the nearest binding wins.
//! Plain assignment writes to the nearest scope that already defines the
//! name and otherwise to the base scope (dynamic scoping).

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::interpreter::errors::ExpansionError;

/// Variable value: string or indexed array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarValue {
    Scalar(String),
    Array(Vec<String>),
}

impl VarValue {
    /// Scalar view: arrays read as their first element.
    pub fn as_scalar(&self) -> String {
        match self {
            VarValue::Scalar(s) => s.clone(),
            VarValue::Array(items) => items.first().cloned().unwrap_or_default(),
        }
    }
}

impl From<&str> for VarValue {
    fn from(value: &str) -> Self {
        VarValue::Scalar(value.to_string())
    }
}

impl From<String> for VarValue {
    fn from(value: String) -> Self {
        VarValue::Scalar(value)
    }
}

impl From<Vec<String>> for VarValue {
    fn from(value: Vec<String>) -> Self {
        VarValue::Array(value)
    }
}

/// A variable binding with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub value: VarValue,
    pub exported: bool,
    pub readonly: bool,
}

impl Variable {
    pub fn new(value: impl Into<VarValue>) -> Self {
        Self {
            value: value.into(),
            exported: false,
            readonly: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Subshell,
    Temporary,
}

#[derive(Debug, Clone)]
struct Scope {
    kind: ScopeKind,
    vars: IndexMap<String, Variable>,
    /// Positional parameters owned by this scope ($1, $2, ...)
    positional: Option<Vec<String>>,
}

impl Scope {
    fn new(kind: ScopeKind, positional: Option<Vec<String>>) -> Self {
        Self {
            kind,
            vars: IndexMap::new(),
            positional,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeKind::Global, Some(Vec::new()))],
        }
    }

    /// Global environment seeded with exported variables.
    pub fn with_exported<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut env = Self::new();
        for (name, value) in vars {
            env.scopes[0].vars.insert(
                name.into(),
                Variable {
                    value: VarValue::Scalar(value.into()),
                    exported: true,
                    readonly: false,
                },
            );
        }
        env
    }

    // =========================================================================
    // SCOPES
    // =========================================================================

    pub fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind, None));
    }

    /// Push a function scope binding the call's positional parameters.
    pub fn push_function_scope(&mut self, args: Vec<String>) {
        self.scopes.push(Scope::new(ScopeKind::Function, Some(args)));
    }

    /// Pop the innermost scope. The base scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    pub fn current_kind(&self) -> ScopeKind {
        self.scopes.last().map_or(ScopeKind::Global, |s| s.kind)
    }

    pub fn in_function(&self) -> bool {
        self.scopes.iter().any(|s| s.kind == ScopeKind::Function)
    }

    fn find_scope_index(&self, name: &str) -> Option<usize> {
        self.scopes.iter().rposition(|s| s.vars.contains_key(name))
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.scopes.iter().rev().find_map(|s| s.vars.get(name))
    }

    /// Scalar value of a variable, if set.
    pub fn get_value(&self, name: &str) -> Option<String> {
        self.get(name).map(|v| v.value.as_scalar())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn is_readonly(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| v.readonly)
    }

    fn check_writable(&self, name: &str) -> Result<(), ExpansionError> {
        if self.is_readonly(name) {
            return Err(ExpansionError::Readonly(name.to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Assign a variable.
    ///
    /// With `local` set the binding goes into the innermost scope; otherwise
    /// into the nearest scope defining `name`, or the base scope. `export`
    /// marks the binding exported; an existing export flag is never cleared.
    pub fn set(&mut self, name: &str, value: impl Into<VarValue>, export: bool, local: bool) -> Result<(), ExpansionError> {
        self.check_writable(name)?;
        let index = if local {
            self.scopes.len() - 1
        } else {
            self.find_scope_index(name).unwrap_or(0)
        };
        let value = value.into();
        let vars = &mut self.scopes[index].vars;
        match vars.get_mut(name) {
            Some(var) => {
                var.value = value;
                var.exported |= export;
            }
            None => {
                vars.insert(
                    name.to_string(),
                    Variable {
                        value,
                        exported: export,
                        readonly: false,
                    },
                );
            }
        }
        Ok(())
    }

    /// `NAME+=value`: string concatenation or array append.
    pub fn append(&mut self, name: &str, value: impl Into<VarValue>, export: bool) -> Result<(), ExpansionError> {
        let combined = match (self.get(name).map(|v| v.value.clone()), value.into()) {
            (None, value) => value,
            (Some(VarValue::Scalar(old)), VarValue::Scalar(new)) => VarValue::Scalar(old + &new),
            (Some(VarValue::Scalar(old)), VarValue::Array(new)) => {
                VarValue::Array(std::iter::once(old).chain(new).collect())
            }
            (Some(VarValue::Array(mut old)), VarValue::Scalar(new)) => {
                match old.first_mut() {
                    Some(first) => first.push_str(&new),
                    None => old.push(new),
                }
                VarValue::Array(old)
            }
            (Some(VarValue::Array(mut old)), VarValue::Array(new)) => {
                old.extend(new);
                VarValue::Array(old)
            }
        };
        self.set(name, combined, export, false)
    }

    /// Assign one element of an indexed array, padding with empty strings.
    pub fn set_array_element(&mut self, name: &str, index: usize, value: String) -> Result<(), ExpansionError> {
        let mut items = match self.get(name).map(|v| v.value.clone()) {
            Some(VarValue::Array(items)) => items,
            Some(VarValue::Scalar(s)) => vec![s],
            None => Vec::new(),
        };
        if items.len() <= index {
            items.resize(index + 1, String::new());
        }
        items[index] = value;
        self.set(name, VarValue::Array(items), false, false)
    }

    /// Remove the nearest binding of `name`. Returns whether one existed.
    pub fn unset(&mut self, name: &str) -> Result<bool, ExpansionError> {
        self.check_writable(name)?;
        match self.find_scope_index(name) {
            Some(index) => {
                self.scopes[index].vars.shift_remove(name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Set the export flag on the nearest binding. Returns false if unset.
    pub fn mark_exported(&mut self, name: &str) -> bool {
        self.set_flag(name, |v| v.exported = true)
    }

    /// Clear the export flag on the nearest binding, keeping its value.
    pub fn clear_exported(&mut self, name: &str) -> bool {
        self.set_flag(name, |v| v.exported = false)
    }

    pub fn set_readonly(&mut self, name: &str) -> bool {
        self.set_flag(name, |v| v.readonly = true)
    }

    fn set_flag(&mut self, name: &str, apply: impl FnOnce(&mut Variable)) -> bool {
        match self.scopes.iter_mut().rev().find_map(|s| s.vars.get_mut(name)) {
            Some(var) => {
                apply(var);
                true
            }
            None => false,
        }
    }

    /// Declare a variable local to the innermost function scope.
    /// Without a value an existing local keeps its value.
    pub fn declare_local(&mut self, name: &str, value: Option<VarValue>) -> Result<(), ExpansionError> {
        let Some(index) = self.scopes.iter().rposition(|s| s.kind == ScopeKind::Function) else {
            return Ok(());
        };
        if self.scopes[index].vars.get(name).is_some_and(|v| v.readonly) {
            return Err(ExpansionError::Readonly(name.to_string()));
        }
        let vars = &mut self.scopes[index].vars;
        match (vars.get_mut(name), value) {
            (Some(var), Some(value)) => var.value = value,
            (Some(_), None) => {}
            (None, value) => {
                vars.insert(name.to_string(), Variable::new(value.unwrap_or(VarValue::Scalar(String::new()))));
            }
        }
        Ok(())
    }

    // =========================================================================
    // POSITIONAL PARAMETERS
    // =========================================================================

    pub fn positional(&self) -> &[String] {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.positional.as_deref())
            .unwrap_or(&[])
    }

    pub fn set_positional(&mut self, args: Vec<String>) {
        if let Some(slot) = self.scopes.iter_mut().rev().find_map(|s| s.positional.as_mut()) {
            *slot = args;
        }
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Every visible binding, nearest scope winning.
    pub fn visible_variables(&self) -> BTreeMap<String, Variable> {
        let mut out = BTreeMap::new();
        for scope in &self.scopes {
            for (name, var) in &scope.vars {
                out.insert(name.clone(), var.clone());
            }
        }
        out
    }

    /// New isolated environment seeded with a deep copy of every visible
    /// binding and its attributes. Writes to the snapshot never reach `self`.
    pub fn snapshot_for_subshell(&self) -> Environment {
        let mut scope = Scope::new(ScopeKind::Subshell, Some(self.positional().to_vec()));
        for s in &self.scopes {
            for (name, var) in &s.vars {
                scope.vars.insert(name.clone(), var.clone());
            }
        }
        Environment { scopes: vec![scope] }
    }

    /// name → value of every exported scalar visible from the current
    /// scope. A nearer binding without the export flag hides an outer
    /// exported one.
    pub fn flatten_exported(&self) -> BTreeMap<String, String> {
        self.visible_variables()
            .into_iter()
            .filter_map(|(name, var)| match (var.exported, var.value) {
                (true, VarValue::Scalar(value)) => Some((name, value)),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_unset() {
        let mut env = Environment::new();
        assert!(env.get("X").is_none());
        env.set("X", "1", false, false).unwrap();
        assert_eq!(env.get_value("X").as_deref(), Some("1"));
        assert!(env.unset("X").unwrap());
        assert!(!env.is_set("X"));
        assert!(!env.unset("X").unwrap());
    }

    #[test]
    fn test_function_assignment_is_dynamic() {
        let mut env = Environment::new();
        env.set("OUTER", "o", false, false).unwrap();
        env.push_function_scope(vec![]);
        env.declare_local("L", Some("l".into())).unwrap();
        env.set("OUTER", "changed", false, false).unwrap();
        env.set("NEW", "n", false, false).unwrap();
        env.set("L", "l2", false, false).unwrap();
        env.pop_scope();
        assert_eq!(env.get_value("OUTER").as_deref(), Some("changed"));
        assert_eq!(env.get_value("NEW").as_deref(), Some("n"));
        assert!(env.get("L").is_none());
    }

    #[test]
    fn test_local_shadows_outer() {
        let mut env = Environment::new();
        env.set("X", "global", true, false).unwrap();
        env.push_function_scope(vec![]);
        env.declare_local("X", Some("local".into())).unwrap();
        assert_eq!(env.get_value("X").as_deref(), Some("local"));
        // Local without export hides the exported global from children
        assert!(!env.flatten_exported().contains_key("X"));
        env.pop_scope();
        assert_eq!(env.get_value("X").as_deref(), Some("global"));
        assert!(env.flatten_exported().contains_key("X"));
    }

    #[test]
    fn test_flatten_exported_excludes_plain_vars() {
        let mut env = Environment::with_exported([("A", "1")]);
        env.set("B", "2", false, false).unwrap();
        env.set("ARR", vec!["x".to_string()], true, false).unwrap();
        let flat = env.flatten_exported();
        assert_eq!(flat.get("A").map(String::as_str), Some("1"));
        assert!(!flat.contains_key("B"));
        assert!(!flat.contains_key("ARR"));
    }

    #[test]
    fn test_export_flags() {
        let mut env = Environment::new();
        env.set("X", "v", false, false).unwrap();
        assert!(env.mark_exported("X"));
        assert_eq!(env.flatten_exported().get("X").map(String::as_str), Some("v"));
        assert!(env.clear_exported("X"));
        assert!(env.flatten_exported().is_empty());
        assert_eq!(env.get_value("X").as_deref(), Some("v"));
        assert!(!env.mark_exported("MISSING"));
        // Re-assigning keeps the export flag
        env.mark_exported("X");
        env.set("X", "w", false, false).unwrap();
        assert!(env.get("X").unwrap().exported);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let mut env = Environment::new();
        env.set("X", "1", true, false).unwrap();
        env.set("Y", "plain", false, false).unwrap();
        env.push_function_scope(vec!["a".into()]);
        env.declare_local("L", Some("local".into())).unwrap();

        let mut snap = env.snapshot_for_subshell();
        assert_eq!(snap.get_value("L").as_deref(), Some("local"));
        assert_eq!(snap.positional(), &["a".to_string()]);
        assert!(snap.get("X").unwrap().exported);
        assert!(!snap.get("Y").unwrap().exported);

        snap.set("X", "2", false, false).unwrap();
        snap.unset("Y").unwrap();
        snap.set("Z", "new", false, false).unwrap();
        assert_eq!(env.get_value("X").as_deref(), Some("1"));
        assert_eq!(env.get_value("Y").as_deref(), Some("plain"));
        assert!(env.get("Z").is_none());
    }

    #[test]
    fn test_readonly() {
        let mut env = Environment::new();
        env.set("R", "fixed", false, false).unwrap();
        env.set_readonly("R");
        assert_eq!(env.set("R", "x", false, false), Err(ExpansionError::Readonly("R".into())));
        assert!(env.unset("R").is_err());
        assert_eq!(env.get_value("R").as_deref(), Some("fixed"));
    }

    #[test]
    fn test_temporary_scope() {
        let mut env = Environment::new();
        env.push_scope(ScopeKind::Temporary);
        env.set("T", "tmp", true, true).unwrap();
        assert_eq!(env.flatten_exported().get("T").map(String::as_str), Some("tmp"));
        env.pop_scope();
        assert!(env.get("T").is_none());
    }

    #[test]
    fn test_append_and_arrays() {
        let mut env = Environment::new();
        env.append("S", "a", false).unwrap();
        env.append("S", "b", false).unwrap();
        assert_eq!(env.get_value("S").as_deref(), Some("ab"));

        env.set("A", vec!["x".to_string()], false, false).unwrap();
        env.append("A", vec!["y".to_string()], false).unwrap();
        env.set_array_element("A", 3, "z".into()).unwrap();
        assert_eq!(
            env.get("A").unwrap().value,
            VarValue::Array(vec!["x".into(), "y".into(), String::new(), "z".into()])
        );
        assert_eq!(env.get_value("A").as_deref(), Some("x"));
    }

    #[test]
    fn test_positional_parameters() {
        let mut env = Environment::new();
        env.set_positional(vec!["g".into()]);
        env.push_function_scope(vec!["f1".into(), "f2".into()]);
        assert_eq!(env.positional().len(), 2);
        env.set_positional(vec![]);
        env.pop_scope();
        assert_eq!(env.positional(), &["g".to_string()]);
    }
}
