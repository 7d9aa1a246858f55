//! Global bindings
//!
//! Name → value map that remembers declaration order, so `#vars` and
//! record-like listings are deterministic. Redefining a name replaces the
//! value in place and keeps its original position.

use std::collections::HashMap;
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    entries: Vec<(String, Value)>,
    /// Index for O(1) lookup by name → position in `entries`
    index: HashMap<String, usize>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or overwrite a binding.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(&idx) = self.index.get(&name) {
            self.entries[idx].1 = value;
        } else {
            let idx = self.entries.len();
            self.entries.push((name.clone(), value));
            self.index.insert(name, idx);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&idx| &self.entries[idx].1)
    }

    /// Mutable access to an existing binding.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        match self.index.get(name) {
            Some(&idx) => Some(&mut self.entries[idx].1),
            None => None,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut b = Bindings::new();
        b.set("x", Value::Int(1));
        assert_eq!(b.get("x"), Some(&Value::Int(1)));
        assert!(b.get("y").is_none());
        assert!(b.contains("x"));
    }

    #[test]
    fn test_redefine_keeps_order() {
        let mut b = Bindings::new();
        b.set("a", Value::Int(1));
        b.set("b", Value::Int(2));
        b.set("a", Value::Int(3));
        assert_eq!(b.names(), vec!["a", "b"]);
        assert_eq!(b.get("a"), Some(&Value::Int(3)));
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn test_get_mut_and_clear() {
        let mut b = Bindings::new();
        b.set("n", Value::Int(1));
        if let Some(v) = b.get_mut("n") {
            *v = Value::Int(2);
        }
        assert_eq!(b.get("n"), Some(&Value::Int(2)));
        b.clear();
        assert!(b.is_empty());
        assert_eq!(b, Bindings::default());
    }
}
