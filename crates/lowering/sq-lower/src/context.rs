//! Scope stack and symbol table used during lowering
//!
//! Each frame is tied to the IR block its statements are emitted into and
//! records the function (base) and type (enclosing type) active while it
//! is on the stack. The module frame is never popped.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use sq_intern::Symbol;
use sq_ir::{BlockId, FuncId, TypeId, VarId};
use std::iter;

/// What a name is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// Storage slot
    Variable {
        /// Backing variable
        var: VarId,
        /// Declared at module level (or re-bound by `global`)
        global: bool,
        /// Base active when the binding was added
        base: Option<FuncId>,
    },
    /// Type name
    Type(TypeId),
    /// Free function
    Function(FuncId),
    /// Generic placeholder
    Generic(TypeId),
}

/// A named scope entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Bound entity
    pub kind: BindingKind,
    /// Parameter names, for function bindings
    pub params: Vec<Symbol>,
}

impl Binding {
    /// Backing variable, if this is a variable binding
    pub fn var(&self) -> Option<VarId> {
        match self.kind {
            BindingKind::Variable { var, .. } => Some(var),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct Frame {
    block: BlockId,
    base: Option<FuncId>,
    enclosing_type: Option<TypeId>,
    bindings: IndexMap<Symbol, Binding>,
}

impl Frame {
    fn new(block: BlockId, base: Option<FuncId>, enclosing_type: Option<TypeId>) -> Self {
        Self {
            block,
            base,
            enclosing_type,
            bindings: IndexMap::new(),
        }
    }
}

/// Lexical scope stack of one compilation
#[derive(Debug, Clone)]
pub struct Context {
    root: Frame,
    scopes: Vec<Frame>,
    flags: FxHashMap<String, bool>,
}

impl Context {
    /// Context whose module frame emits into `main`
    pub fn new(main: BlockId) -> Self {
        Self {
            root: Frame::new(main, None, None),
            scopes: Vec::new(),
            flags: FxHashMap::default(),
        }
    }

    fn current(&self) -> &Frame {
        self.scopes.last().unwrap_or(&self.root)
    }

    fn current_mut(&mut self) -> &mut Frame {
        self.scopes.last_mut().unwrap_or(&mut self.root)
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.scopes.iter().rev().chain(iter::once(&self.root))
    }

    /// Innermost binding of `name`, ignoring visibility rules
    pub fn find(&self, name: Symbol) -> Option<&Binding> {
        self.frames().find_map(|frame| frame.bindings.get(&name))
    }

    /// Innermost binding of `name` visible from the current base
    ///
    /// A global variable bound under a different base is shadow-only: it
    /// is reported as unbound until a `global` statement re-binds it.
    pub fn lookup(&self, name: Symbol) -> Option<&Binding> {
        let binding = self.find(name)?;
        match binding.kind {
            BindingKind::Variable {
                global: true, base, ..
            } if base != self.base() => None,
            _ => Some(binding),
        }
    }

    /// Bind `name` in the innermost scope
    pub fn add(&mut self, name: Symbol, kind: BindingKind) {
        self.add_with_params(name, kind, Vec::new());
    }

    /// Bind `name` in the innermost scope, recording parameter names
    pub fn add_with_params(&mut self, name: Symbol, kind: BindingKind, params: Vec<Symbol>) {
        tracing::debug!(?name, ?kind, depth = self.depth(), "adding binding");
        self.current_mut()
            .bindings
            .insert(name, Binding { kind, params });
    }

    /// Push a scope emitting into `block`, keeping the base and enclosing type
    pub fn add_block(&mut self, block: BlockId) {
        let current = self.current();
        let frame = Frame::new(block, current.base, current.enclosing_type);
        self.scopes.push(frame);
        tracing::debug!(?block, depth = self.depth(), "pushed scope");
    }

    /// Push the body scope of `func`, making it the base
    ///
    /// The enclosing type is not inherited: declarations nested in a
    /// method body are ordinary local functions.
    pub fn add_function_block(&mut self, block: BlockId, func: FuncId) {
        self.scopes.push(Frame::new(block, Some(func), None));
        tracing::debug!(?block, ?func, depth = self.depth(), "pushed function scope");
    }

    /// Pop the innermost scope, returning its block
    ///
    /// The module scope stays in place; popping it returns `None`.
    pub fn pop_block(&mut self) -> Option<BlockId> {
        let frame = self.scopes.pop()?;
        tracing::debug!(block = ?frame.block, depth = self.depth(), "popped scope");
        Some(frame.block)
    }

    /// Remove `name` from the nearest scope binding it
    pub fn remove(&mut self, name: Symbol) -> Option<Binding> {
        let frame = self
            .scopes
            .iter_mut()
            .rev()
            .chain(iter::once(&mut self.root))
            .find(|frame| frame.bindings.contains_key(&name))?;
        tracing::debug!(?name, "removing binding");
        frame.bindings.shift_remove(&name)
    }

    /// Function enclosing the current scope; `None` at module level
    pub fn base(&self) -> Option<FuncId> {
        self.current().base
    }

    /// Whether lowering is at module level
    pub fn is_toplevel(&self) -> bool {
        self.base().is_none()
    }

    /// Block statements are currently emitted into
    pub fn block(&self) -> BlockId {
        self.current().block
    }

    /// Set the type whose body is being lowered
    pub fn set_enclosing_type(&mut self, ty: Option<TypeId>) {
        self.current_mut().enclosing_type = ty;
    }

    /// Type whose body is being lowered
    pub fn enclosing_type(&self) -> Option<TypeId> {
        self.current().enclosing_type
    }

    /// Set a compilation-wide flag
    pub fn set_flag(&mut self, name: &str, value: bool) {
        self.flags.insert(name.to_owned(), value);
    }

    /// Compilation-wide flag; unset flags are `false`
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    /// Number of scopes, module scope included
    pub fn depth(&self) -> usize {
        self.scopes.len() + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sq_intern::Interner;
    use sq_ir::{IrModule, TypeRegistry};

    struct Fixture {
        interner: Interner,
        types: TypeRegistry,
        module: IrModule,
    }

    fn fixture() -> Fixture {
        let mut interner = Interner::new();
        let types = TypeRegistry::new(&mut interner);
        Fixture {
            interner,
            types,
            module: IrModule::new(),
        }
    }

    #[test]
    fn test_find_walks_outwards() {
        let mut fx = fixture();
        let mut ctx = Context::new(fx.module.main());
        let x = fx.interner.intern("x");
        let int = fx.types.int();
        ctx.add(x, BindingKind::Type(int));
        let inner = fx.module.new_block(fx.module.main());
        ctx.add_block(inner);
        assert_eq!(ctx.find(x).map(|binding| binding.kind), Some(BindingKind::Type(int)));
        assert_eq!(ctx.pop_block(), Some(inner));
        assert_eq!(ctx.find(x).map(|binding| binding.kind), Some(BindingKind::Type(int)));
    }

    #[test]
    fn test_root_scope_is_never_popped() {
        let fx = fixture();
        let mut ctx = Context::new(fx.module.main());
        assert_eq!(ctx.pop_block(), None);
        assert_eq!(ctx.depth(), 1);
        assert_eq!(ctx.block(), fx.module.main());
    }

    #[test]
    fn test_function_scope_sets_base_and_clears_enclosing_type() {
        let mut fx = fixture();
        let mut ctx = Context::new(fx.module.main());
        let class = fx.types.new_class(fx.interner.intern("Point"));
        let body = fx.module.new_block(fx.module.main());
        ctx.add_block(body);
        ctx.set_enclosing_type(Some(class));
        let func = fx.module.new_function(fx.interner.intern("norm"));
        ctx.add_function_block(fx.module.func(func).body, func);
        assert_eq!(ctx.base(), Some(func));
        assert!(!ctx.is_toplevel());
        assert_eq!(ctx.enclosing_type(), None);
        ctx.pop_block();
        assert_eq!(ctx.enclosing_type(), Some(class));
        ctx.pop_block();
        assert_eq!(ctx.enclosing_type(), None);
        assert!(ctx.is_toplevel());
    }

    #[test]
    fn test_globals_are_hidden_from_other_bases() {
        let mut fx = fixture();
        let mut ctx = Context::new(fx.module.main());
        let x = fx.interner.intern("x");
        let var = fx.module.new_var(Some(x), fx.types.int(), None);
        ctx.add(
            x,
            BindingKind::Variable {
                var,
                global: true,
                base: None,
            },
        );
        assert!(ctx.lookup(x).is_some());

        let func = fx.module.new_function(fx.interner.intern("f"));
        ctx.add_function_block(fx.module.func(func).body, func);
        assert!(ctx.lookup(x).is_none());
        assert!(ctx.find(x).is_some());
    }

    #[test]
    fn test_remove_targets_nearest_scope() {
        let mut fx = fixture();
        let mut ctx = Context::new(fx.module.main());
        let x = fx.interner.intern("x");
        let int = fx.types.int();
        let float = fx.types.float();
        ctx.add(x, BindingKind::Type(int));
        ctx.add_block(fx.module.new_block(fx.module.main()));
        ctx.add(x, BindingKind::Type(float));
        let removed = ctx.remove(x).map(|binding| binding.kind);
        assert_eq!(removed, Some(BindingKind::Type(float)));
        assert_eq!(ctx.find(x).map(|binding| binding.kind), Some(BindingKind::Type(int)));
    }

    #[test]
    fn test_flags_default_to_false() {
        let fx = fixture();
        let mut ctx = Context::new(fx.module.main());
        assert!(!ctx.flag("atomic"));
        ctx.set_flag("atomic", true);
        assert!(ctx.flag("atomic"));
    }
}
