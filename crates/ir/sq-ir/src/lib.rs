//! Types and lowered program representation
//!
//! This crate holds everything the lowering stage produces: the type
//! registry with its operator and field tables, function entities, and the
//! arena-backed module of blocks, variables, values and statements.

pub mod func;
pub mod inst;
pub mod module;
pub mod pretty;
pub mod types;

pub use func::{Func, FuncFlags, FuncId, FuncParam};
pub use inst::{ArithOp, CmpOp, Inst, InstBuffer, InstBuilder, Reg};
pub use module::{
    Block, BlockId, CatchArm, ForNode, IfArm, IfNode, IrModule, Stmt, StmtId, StmtKind, TryNode,
    Value, ValueId, ValueKind, Var, VarId, WhileNode,
};
pub use types::{
    ClassType, Field, GenericType, MagicEntry, MagicTable, RecordType, Substitution, Type,
    TypeError, TypeId, TypeKind, TypeRegistry, ARRAY_LEN, ARRAY_PTR,
};
