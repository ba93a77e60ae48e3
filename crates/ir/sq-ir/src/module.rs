//! Lowered program representation
//!
//! An [`IrModule`] owns every block, variable, value, statement and
//! function produced while lowering one compilation unit. Nodes refer to
//! each other by arena index; nothing is freed before the module is
//! dropped.
//!
//! Compound statements are assembled through node builders: the caller
//! creates the node, asks the module for each child block
//! ([`IrModule::add_cond`], [`IrModule::add_catch`], ...), fills the
//! blocks, and finally pushes the finished node into its parent block.

use crate::func::{Func, FuncFlags, FuncId};
use crate::types::TypeId;
use la_arena::{Arena, Idx};
use sq_intern::Symbol;
use sq_span::FileSpan;

/// Block ID for arena allocation
pub type BlockId = Idx<Block>;
/// Variable ID for arena allocation
pub type VarId = Idx<Var>;
/// Value ID for arena allocation
pub type ValueId = Idx<Value>;
/// Statement ID for arena allocation
pub type StmtId = Idx<Stmt>;

/// Ordered statement list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    /// Statements in source order
    pub stmts: Vec<StmtId>,
    /// Function owning the block; `None` at module level
    pub func: Option<FuncId>,
}

/// Storage slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    /// Source name; `None` for synthesized slots
    pub name: Option<Symbol>,
    /// Type of the stored value
    pub ty: TypeId,
    /// Declared at module level
    pub global: bool,
    /// Function owning the slot
    pub func: Option<FuncId>,
}

/// Typed value expression
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    /// What the value computes
    pub kind: ValueKind,
    /// Result type
    pub ty: TypeId,
}

/// Value kinds
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// Boolean literal
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// Float literal
    Float(f64),
    /// String literal
    Str(String),
    /// Read of a variable
    Var(VarId),
    /// Reference to a function
    Func(FuncId),
    /// Positional field read; `index` is `None` while the receiver type is generic
    Member {
        /// Receiver
        recv: ValueId,
        /// Field name
        name: Symbol,
        /// Field position
        index: Option<u32>,
    },
    /// Operator invocation resolved through the receiver's operator table
    Magic {
        /// Receiver
        recv: ValueId,
        /// Operator name
        op: &'static str,
        /// Arguments
        args: Vec<ValueId>,
    },
    /// Operator invocation on a generic receiver, resolved after specialization
    Deferred {
        /// Receiver
        recv: ValueId,
        /// Operator name
        op: String,
        /// Arguments
        args: Vec<ValueId>,
    },
    /// Call of a function value
    Call {
        /// Callee
        callee: ValueId,
        /// Arguments
        args: Vec<ValueId>,
    },
    /// Method bound to a receiver
    Method {
        /// Receiver
        recv: ValueId,
        /// Method
        func: FuncId,
    },
    /// Construction of an aggregate or class instance
    Construct {
        /// Constructed type
        ty: TypeId,
        /// Field values
        args: Vec<ValueId>,
    },
    /// Tuple
    Tuple(Vec<ValueId>),
}

/// Lowered statement
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// Statement kind
    pub kind: StmtKind,
    /// Source location of the originating statement
    pub span: FileSpan,
}

/// Statement kinds
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// No-op
    Pass,
    /// Loop exit
    Break,
    /// Next loop iteration
    Continue,
    /// Evaluate and discard
    Expr(ValueId),
    /// Variable introduction
    VarDecl {
        /// Declared slot
        var: VarId,
        /// Initial value
        init: Option<ValueId>,
    },
    /// Store into an existing variable
    Assign {
        /// Target slot
        var: VarId,
        /// Stored value
        value: ValueId,
    },
    /// Store into a field
    AssignMember {
        /// Receiver
        recv: ValueId,
        /// Field name
        name: Symbol,
        /// Field position; `None` while the receiver type is generic
        index: Option<u32>,
        /// Stored value
        value: ValueId,
    },
    /// Release of a variable
    Del(VarId),
    /// Print a value
    Print(ValueId),
    /// Assertion
    Assert(ValueId),
    /// Raise an exception
    Throw(ValueId),
    /// Function return
    Return(Option<ValueId>),
    /// Generator yield
    Yield(Option<ValueId>),
    /// Memory prefetch of `target[index]`
    Prefetch {
        /// Indexed collection
        target: ValueId,
        /// Index
        index: ValueId,
    },
    /// `while` loop
    While(WhileNode),
    /// `for` loop
    For(ForNode),
    /// Conditional chain
    If(IfNode),
    /// Exception handling
    Try(TryNode),
    /// Function declaration
    FuncDecl(FuncId),
    /// Class or value-type declaration
    ClassDecl {
        /// Declared type
        ty: TypeId,
        /// Class body
        body: BlockId,
    },
    /// Extension of an existing type
    Extend {
        /// Extended type
        ty: TypeId,
        /// Extension body
        body: BlockId,
    },
}

/// `while` loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhileNode {
    /// Loop condition
    pub cond: ValueId,
    /// Loop body
    pub body: BlockId,
}

/// `for` loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForNode {
    /// Iterated value
    pub iter: ValueId,
    /// Per-iteration variable
    pub var: VarId,
    /// Loop body
    pub body: BlockId,
}

/// Conditional chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IfNode {
    /// Branches in source order
    pub arms: Vec<IfArm>,
}

/// One conditional branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfArm {
    /// Condition; `None` for the terminal `else`
    pub cond: Option<ValueId>,
    /// Branch body
    pub body: BlockId,
}

/// Exception handling construct
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryNode {
    /// Protected body
    pub body: BlockId,
    /// Handlers in source order
    pub catches: Vec<CatchArm>,
    /// `finally` body
    pub finally: Option<BlockId>,
}

/// One exception handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchArm {
    /// Filter type; `None` catches everything
    pub ty: Option<TypeId>,
    /// Variable bound to the caught exception
    pub var: VarId,
    /// Handler body
    pub body: BlockId,
}

/// All lowered nodes of a compilation unit
#[derive(Debug, Clone)]
pub struct IrModule {
    blocks: Arena<Block>,
    vars: Arena<Var>,
    values: Arena<Value>,
    stmts: Arena<Stmt>,
    funcs: Arena<Func>,
    main: BlockId,
}

impl Default for IrModule {
    fn default() -> Self {
        Self::new()
    }
}

impl IrModule {
    /// Empty module with an empty top-level block
    pub fn new() -> Self {
        let mut blocks = Arena::new();
        let main = blocks.alloc(Block::default());
        Self {
            blocks,
            vars: Arena::new(),
            values: Arena::new(),
            stmts: Arena::new(),
            funcs: Arena::new(),
            main,
        }
    }

    /// Top-level block
    pub fn main(&self) -> BlockId {
        self.main
    }

    /// Get a block by ID
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id]
    }

    /// Get a variable by ID
    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id]
    }

    /// Get a value by ID
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id]
    }

    /// Get a statement by ID
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id]
    }

    /// Get a function by ID
    pub fn func(&self, id: FuncId) -> &Func {
        &self.funcs[id]
    }

    /// Get a function by ID for modification
    pub fn func_mut(&mut self, id: FuncId) -> &mut Func {
        &mut self.funcs[id]
    }

    /// All functions in declaration order
    pub fn funcs(&self) -> impl Iterator<Item = (FuncId, &Func)> + '_ {
        self.funcs.iter()
    }

    /// Statements of `block`, in order
    pub fn stmts(&self, block: BlockId) -> impl Iterator<Item = &Stmt> + '_ {
        self.blocks[block].stmts.iter().map(|id| &self.stmts[*id])
    }

    /// Fresh block owned by the same function as `parent`
    pub fn new_block(&mut self, parent: BlockId) -> BlockId {
        let func = self.blocks[parent].func;
        self.blocks.alloc(Block {
            stmts: Vec::new(),
            func,
        })
    }

    /// Fresh variable
    pub fn new_var(&mut self, name: Option<Symbol>, ty: TypeId, func: Option<FuncId>) -> VarId {
        self.vars.alloc(Var {
            name,
            ty,
            global: false,
            func,
        })
    }

    /// Mark `var` as a module-level variable
    pub fn set_global(&mut self, var: VarId) {
        self.vars[var].global = true;
    }

    /// Fresh value
    pub fn new_value(&mut self, kind: ValueKind, ty: TypeId) -> ValueId {
        self.values.alloc(Value { kind, ty })
    }

    /// Append a statement to `block`
    pub fn push(&mut self, block: BlockId, kind: StmtKind, span: FileSpan) -> StmtId {
        let id = self.stmts.alloc(Stmt { kind, span });
        self.blocks[block].stmts.push(id);
        id
    }

    /// `while` node with a fresh body block
    pub fn new_while(&mut self, parent: BlockId, cond: ValueId) -> WhileNode {
        WhileNode {
            cond,
            body: self.new_block(parent),
        }
    }

    /// `for` node with a fresh body block and an iteration variable of `elem`
    pub fn new_for(&mut self, parent: BlockId, iter: ValueId, elem: TypeId) -> ForNode {
        let func = self.blocks[parent].func;
        ForNode {
            iter,
            var: self.new_var(None, elem, func),
            body: self.new_block(parent),
        }
    }

    /// Add a branch to `node`; `cond` of `None` adds the `else` branch
    pub fn add_cond(&mut self, node: &mut IfNode, parent: BlockId, cond: Option<ValueId>) -> BlockId {
        let body = self.new_block(parent);
        node.arms.push(IfArm { cond, body });
        body
    }

    /// `try` node with a fresh protected block
    pub fn new_try(&mut self, parent: BlockId) -> TryNode {
        TryNode {
            body: self.new_block(parent),
            catches: Vec::new(),
            finally: None,
        }
    }

    /// Add a handler to `node`, returning its block and exception variable
    pub fn add_catch(
        &mut self,
        node: &mut TryNode,
        parent: BlockId,
        filter: Option<TypeId>,
        var_ty: TypeId,
    ) -> (BlockId, VarId) {
        let func = self.blocks[parent].func;
        let var = self.new_var(None, var_ty, func);
        let body = self.new_block(parent);
        node.catches.push(CatchArm {
            ty: filter,
            var,
            body,
        });
        (body, var)
    }

    /// `finally` block of `node`, created on first request
    pub fn finally_block(&mut self, node: &mut TryNode, parent: BlockId) -> BlockId {
        if let Some(block) = node.finally {
            return block;
        }
        let block = self.new_block(parent);
        node.finally = Some(block);
        block
    }

    /// Declare a function with an empty body block
    pub fn new_function(&mut self, name: Symbol) -> FuncId {
        let body = self.blocks.alloc(Block::default());
        let func = self.funcs.alloc(Func {
            name,
            params: Vec::new(),
            generics: Vec::new(),
            ret: None,
            attributes: Vec::new(),
            enclosing: None,
            method_of: None,
            body,
            flags: FuncFlags::default(),
            builtin: false,
        });
        self.blocks[body].func = Some(func);
        func
    }

    /// Rename a variable after it is bound to a source name
    pub fn name_var(&mut self, var: VarId, name: Symbol) {
        self.vars[var].name = Some(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sq_intern::Interner;

    #[test]
    fn test_child_blocks_inherit_owner() {
        let mut interner = Interner::new();
        let mut module = IrModule::new();
        let func = module.new_function(interner.intern("f"));
        let body = module.func(func).body;
        assert_eq!(module.block(body).func, Some(func));
        let mut node = IfNode::default();
        let arm = module.add_cond(&mut node, body, None);
        assert_eq!(module.block(arm).func, Some(func));
        assert_eq!(module.block(module.main()).func, None);
    }

    #[test]
    fn test_push_appends_in_order() {
        let mut module = IrModule::new();
        let main = module.main();
        let first = module.push(main, StmtKind::Pass, FileSpan::default());
        let second = module.push(main, StmtKind::Break, FileSpan::default());
        assert_eq!(module.block(main).stmts, vec![first, second]);
    }

    #[test]
    fn test_finally_block_is_created_once() {
        let mut module = IrModule::new();
        let main = module.main();
        let mut node = module.new_try(main);
        let first = module.finally_block(&mut node, main);
        let second = module.finally_block(&mut node, main);
        assert_eq!(first, second);
        assert_ne!(first, node.body);
    }
}
