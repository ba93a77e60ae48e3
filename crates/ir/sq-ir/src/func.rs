//! Function entities

use crate::module::{BlockId, ValueId, VarId};
use crate::types::TypeId;
use la_arena::Idx;
use sq_intern::Symbol;

/// Function ID for arena allocation
pub type FuncId = Idx<Func>;

/// A declared function or method
#[derive(Debug, Clone, PartialEq)]
pub struct Func {
    /// Declared name
    pub name: Symbol,
    /// Parameters in declaration order
    pub params: Vec<FuncParam>,
    /// Generic slots, explicit ones first, then implicit ones
    pub generics: Vec<TypeId>,
    /// Declared return type, if annotated
    pub ret: Option<TypeId>,
    /// Attribute tags
    pub attributes: Vec<Symbol>,
    /// Lexically enclosing function
    pub enclosing: Option<FuncId>,
    /// Type this function is a method of
    pub method_of: Option<TypeId>,
    /// Body block
    pub body: BlockId,
    /// Facts collected while lowering the body
    pub flags: FuncFlags,
    /// Provided by the session rather than declared in source
    pub builtin: bool,
}

/// Parameter of a function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncParam {
    /// Parameter name
    pub name: Symbol,
    /// Parameter type
    pub ty: TypeId,
    /// Default value
    pub default: Option<ValueId>,
    /// Variable holding the argument inside the body
    pub var: VarId,
}

/// Body facts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FuncFlags {
    /// Contains a `return`
    pub has_return: bool,
    /// Contains a `yield`; the function is a generator
    pub has_yield: bool,
    /// Contains a `prefetch`
    pub has_prefetch: bool,
}

impl Func {
    /// Record that the body returns
    pub fn saw_return(&mut self) {
        self.flags.has_return = true;
    }

    /// Record that the body yields
    pub fn saw_yield(&mut self) {
        self.flags.has_yield = true;
    }

    /// Record that the body prefetches
    pub fn saw_prefetch(&mut self) {
        self.flags.has_prefetch = true;
    }

    /// Whether the function is a generator
    pub fn is_generator(&self) -> bool {
        self.flags.has_yield
    }

    /// Whether the function carries attribute `name`
    pub fn has_attribute(&self, name: Symbol) -> bool {
        self.attributes.contains(&name)
    }

    /// Position of parameter `name`
    pub fn param_index(&self, name: Symbol) -> Option<usize> {
        self.params.iter().position(|param| param.name == name)
    }
}
