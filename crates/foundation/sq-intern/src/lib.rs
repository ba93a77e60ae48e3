//! String interning for symbols
//!
//! Every name that reaches the lowering stage (bindings, type names, field
//! names, attributes) is interned once per compilation; everything past the
//! input tree compares `Symbol`s.

pub use lasso::Spur as Symbol;
use lasso::Rodeo;

/// Per-compilation string interner
#[derive(Debug, Default)]
pub struct Interner {
    rodeo: Rodeo,
}

impl Interner {
    /// Create an empty interner
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `name`, returning the existing symbol if it was seen before
    pub fn intern(&mut self, name: &str) -> Symbol {
        self.rodeo.get_or_intern(name)
    }

    /// Text of an interned symbol
    ///
    /// Symbols from a different interner resolve to `"<unknown>"`.
    pub fn resolve(&self, sym: Symbol) -> &str {
        self.rodeo.try_resolve(&sym).unwrap_or("<unknown>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let mut interner = Interner::new();
        let first = interner.intern("point");
        let second = interner.intern("point");
        assert_eq!(first, second);
        assert_eq!(interner.resolve(first), "point");
        assert_ne!(interner.intern("line"), first);
    }

    #[test]
    fn test_foreign_symbol_resolves_to_placeholder() {
        let mut other = Interner::new();
        other.intern("a");
        let foreign = other.intern("b");
        let mut interner = Interner::new();
        interner.intern("a");
        assert_eq!(interner.resolve(foreign), "<unknown>");
    }
}
