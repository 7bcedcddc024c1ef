//! Scope namespaces
//!
//! A namespace is the address of a DOM source relative to the render root:
//! an ordered list of selector segments and isolation boundaries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a namespace segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// Narrows by CSS match, no boundary
    Selector,
    /// Boundary permeable to the scope that declared it
    Sibling,
    /// Impermeable boundary
    Total,
}

/// One namespace segment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    #[serde(rename = "type")]
    pub kind: ScopeKind,
    #[serde(rename = "scope")]
    pub text: String,
}

impl Scope {
    pub fn selector(text: &str) -> Self {
        Self {
            kind: ScopeKind::Selector,
            text: text.to_string(),
        }
    }

    pub fn sibling(text: &str) -> Self {
        Self {
            kind: ScopeKind::Sibling,
            text: text.to_string(),
        }
    }

    pub fn total(text: &str) -> Self {
        Self {
            kind: ScopeKind::Total,
            text: text.to_string(),
        }
    }

    /// Boundary segment for an isolation scope: class and id scopes are
    /// `Sibling`, anything else is `Total`
    pub fn for_isolation(scope: &str) -> Self {
        if is_class_or_id(scope) {
            Self::sibling(scope)
        } else {
            Self::total(scope)
        }
    }

    /// True for `Sibling` and `Total` segments
    pub fn is_boundary(&self) -> bool {
        self.kind != ScopeKind::Selector
    }
}

/// True if `scope` looks like `.class` or `#id`
pub fn is_class_or_id(scope: &str) -> bool {
    scope.len() > 1 && (scope.starts_with('.') || scope.starts_with('#'))
}

/// Ordered list of scope segments; equality is structural
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(Vec<Scope>);

impl Namespace {
    /// The empty namespace of the render root
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(scopes: Vec<Scope>) -> Self {
        Self(scopes)
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy of this namespace with `scope` appended
    pub fn with(&self, scope: Scope) -> Self {
        let mut scopes = self.0.clone();
        scopes.push(scope);
        Self(scopes)
    }

    /// First `len` segments (clamped)
    pub fn prefix(&self, len: usize) -> &[Scope] {
        &self.0[..len.min(self.0.len())]
    }

    /// The namespace without its selector segments
    pub fn isolation_path(&self) -> Namespace {
        Self(self.0.iter().filter(|s| s.is_boundary()).cloned().collect())
    }

    /// Space-joined text of the trailing run of selector segments
    pub fn selectors(&self) -> String {
        let start = self
            .0
            .iter()
            .rposition(Scope::is_boundary)
            .map_or(0, |i| i + 1);
        self.0[start..]
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    }

    /// Length of the prefix ending at the last `Total` segment (0 if none).
    ///
    /// Events are routed through the listener queue stored at this prefix.
    pub fn dispatch_len(&self) -> usize {
        self.0
            .iter()
            .rposition(|s| s.kind == ScopeKind::Total)
            .map_or(0, |i| i + 1)
    }

    /// Stable JSON form, used as a vnode key
    pub fn key(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<Vec<Scope>> for Namespace {
    fn from(scopes: Vec<Scope>) -> Self {
        Self(scopes)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, scope) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let kind = match scope.kind {
                ScopeKind::Selector => "selector",
                ScopeKind::Sibling => "sibling",
                ScopeKind::Total => "total",
            };
            write!(f, "{}:{}", kind, scope.text)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_structural() {
        let a = Namespace::new(vec![Scope::total("foo"), Scope::selector(".bar")]);
        let b = Namespace::new(vec![Scope::total("foo"), Scope::selector(".bar")]);
        let c = Namespace::new(vec![Scope::sibling("foo"), Scope::selector(".bar")]);

        assert_eq!(Namespace::root(), Namespace::root());
        assert_eq!(a, b);
        assert_eq!(b, a);
        assert_ne!(a, c);
        assert_ne!(a, Namespace::new(vec![Scope::total("foo")]));
    }

    #[test]
    fn test_scope_for_isolation() {
        assert_eq!(Scope::for_isolation(".item").kind, ScopeKind::Sibling);
        assert_eq!(Scope::for_isolation("#main").kind, ScopeKind::Sibling);
        assert_eq!(Scope::for_isolation("counter").kind, ScopeKind::Total);
        assert_eq!(Scope::for_isolation(".").kind, ScopeKind::Total);
    }

    #[test]
    fn test_selectors_and_isolation_path() {
        let ns = Namespace::new(vec![
            Scope::selector(".outer"),
            Scope::total("foo"),
            Scope::selector(".bar"),
            Scope::selector("li"),
        ]);

        assert_eq!(ns.selectors(), ".bar li");
        assert_eq!(ns.isolation_path(), Namespace::new(vec![Scope::total("foo")]));
        assert_eq!(Namespace::new(vec![Scope::total("foo")]).selectors(), "");
    }

    #[test]
    fn test_dispatch_len() {
        let ns = Namespace::new(vec![
            Scope::sibling(".a"),
            Scope::total("b"),
            Scope::sibling(".c"),
        ]);
        assert_eq!(ns.dispatch_len(), 2);
        assert_eq!(Namespace::new(vec![Scope::sibling(".a")]).dispatch_len(), 0);
    }

    #[test]
    fn test_key_is_json() {
        let ns = Namespace::new(vec![Scope::total("foo")]);
        assert_eq!(ns.key(), r#"[{"type":"total","scope":"foo"}]"#);
        assert_eq!(Namespace::root().key(), "[]");
    }
}
