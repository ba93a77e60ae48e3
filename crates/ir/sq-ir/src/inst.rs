//! Instruction-level builder used by operator-table callbacks
//!
//! Operator bodies are synthesized against the [`InstBuilder`] trait so the
//! type system never depends on a concrete backend. [`InstBuffer`] is the
//! in-tree implementation: it records the instruction stream, which is
//! what later stages consume and what tests inspect.

use crate::types::TypeId;

/// Virtual register produced by an instruction
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub struct Reg(pub u32);

/// Integer/float arithmetic
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum ArithOp {
    /// Addition
    Add,
    /// Subtraction
    Sub,
    /// Multiplication
    Mul,
}

/// Comparison producing a bool
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum CmpOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Less than
    Lt,
    /// Greater than
    Gt,
}

/// Recorded instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    /// Integer constant
    ConstInt {
        /// Destination
        dst: Reg,
        /// Value
        value: i64,
    },
    /// Float constant
    ConstFloat {
        /// Destination
        dst: Reg,
        /// Value
        value: f64,
    },
    /// Null value of a pointer-like type
    Null {
        /// Destination
        dst: Reg,
        /// Type of the null
        ty: TypeId,
    },
    /// Undefined aggregate, filled by `Insert`
    Undef {
        /// Destination
        dst: Reg,
        /// Aggregate type
        ty: TypeId,
    },
    /// Positional field read
    Extract {
        /// Destination
        dst: Reg,
        /// Aggregate
        agg: Reg,
        /// Field position
        index: u32,
    },
    /// Positional field write producing a new aggregate
    Insert {
        /// Destination
        dst: Reg,
        /// Aggregate
        agg: Reg,
        /// Field position
        index: u32,
        /// New field value
        value: Reg,
    },
    /// Arithmetic
    Arith {
        /// Destination
        dst: Reg,
        /// Operator
        op: ArithOp,
        /// Left operand
        lhs: Reg,
        /// Right operand
        rhs: Reg,
    },
    /// Comparison
    Cmp {
        /// Destination
        dst: Reg,
        /// Operator
        op: CmpOp,
        /// Left operand
        lhs: Reg,
        /// Right operand
        rhs: Reg,
    },
    /// Element pointer arithmetic
    Gep {
        /// Destination
        dst: Reg,
        /// Base pointer
        ptr: Reg,
        /// Element offset
        offset: Reg,
    },
    /// Memory read
    Load {
        /// Destination
        dst: Reg,
        /// Address
        ptr: Reg,
    },
    /// Memory write
    Store {
        /// Stored value
        value: Reg,
        /// Address
        ptr: Reg,
    },
    /// Heap allocation of `bytes` bytes
    Alloc {
        /// Destination
        dst: Reg,
        /// Byte count
        bytes: Reg,
        /// Memory holds no references and need not be scanned
        atomic: bool,
    },
    /// Bulk byte copy
    MemCpy {
        /// Destination address
        dst: Reg,
        /// Source address
        src: Reg,
        /// Byte count
        bytes: Reg,
    },
}

/// Low-level builder interface consumed by operator callbacks
pub trait InstBuilder {
    /// Integer constant
    fn const_int(&mut self, value: i64) -> Reg;
    /// Float constant
    fn const_float(&mut self, value: f64) -> Reg;
    /// Null pointer/reference of `ty`
    fn null(&mut self, ty: TypeId) -> Reg;
    /// Undefined aggregate of `ty`
    fn undef(&mut self, ty: TypeId) -> Reg;
    /// Read field `index` of `agg`
    fn extract(&mut self, agg: Reg, index: u32) -> Reg;
    /// Replace field `index` of `agg`
    fn insert(&mut self, agg: Reg, index: u32, value: Reg) -> Reg;
    /// Arithmetic
    fn arith(&mut self, op: ArithOp, lhs: Reg, rhs: Reg) -> Reg;
    /// Comparison
    fn cmp(&mut self, op: CmpOp, lhs: Reg, rhs: Reg) -> Reg;
    /// Address of element `offset` past `ptr`
    fn gep(&mut self, ptr: Reg, offset: Reg) -> Reg;
    /// Load through `ptr`
    fn load(&mut self, ptr: Reg) -> Reg;
    /// Store `value` through `ptr`
    fn store(&mut self, value: Reg, ptr: Reg);
    /// Allocate `bytes` bytes; `atomic` selects the non-scanning allocator
    fn alloc(&mut self, bytes: Reg, atomic: bool) -> Reg;
    /// Copy `bytes` bytes from `src` to `dst`
    fn memcpy(&mut self, dst: Reg, src: Reg, bytes: Reg);
}

/// Recording [`InstBuilder`]
#[derive(Debug, Default, Clone)]
pub struct InstBuffer {
    insts: Vec<Inst>,
    next_reg: u32,
}

impl InstBuffer {
    /// Empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh register for an incoming value (operator receiver/arguments)
    pub fn param(&mut self) -> Reg {
        self.fresh()
    }

    /// Recorded instructions in emission order
    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }

    /// Recorded allocations
    pub fn allocations(&self) -> impl Iterator<Item = &Inst> {
        self.insts
            .iter()
            .filter(|inst| matches!(inst, Inst::Alloc { .. }))
    }

    fn fresh(&mut self) -> Reg {
        let reg = Reg(self.next_reg);
        self.next_reg += 1;
        reg
    }

    fn emit(&mut self, make: impl FnOnce(Reg) -> Inst) -> Reg {
        let dst = self.fresh();
        self.insts.push(make(dst));
        dst
    }
}

impl InstBuilder for InstBuffer {
    fn const_int(&mut self, value: i64) -> Reg {
        self.emit(|dst| Inst::ConstInt { dst, value })
    }

    fn const_float(&mut self, value: f64) -> Reg {
        self.emit(|dst| Inst::ConstFloat { dst, value })
    }

    fn null(&mut self, ty: TypeId) -> Reg {
        self.emit(|dst| Inst::Null { dst, ty })
    }

    fn undef(&mut self, ty: TypeId) -> Reg {
        self.emit(|dst| Inst::Undef { dst, ty })
    }

    fn extract(&mut self, agg: Reg, index: u32) -> Reg {
        self.emit(|dst| Inst::Extract { dst, agg, index })
    }

    fn insert(&mut self, agg: Reg, index: u32, value: Reg) -> Reg {
        self.emit(|dst| Inst::Insert {
            dst,
            agg,
            index,
            value,
        })
    }

    fn arith(&mut self, op: ArithOp, lhs: Reg, rhs: Reg) -> Reg {
        self.emit(|dst| Inst::Arith { dst, op, lhs, rhs })
    }

    fn cmp(&mut self, op: CmpOp, lhs: Reg, rhs: Reg) -> Reg {
        self.emit(|dst| Inst::Cmp { dst, op, lhs, rhs })
    }

    fn gep(&mut self, ptr: Reg, offset: Reg) -> Reg {
        self.emit(|dst| Inst::Gep { dst, ptr, offset })
    }

    fn load(&mut self, ptr: Reg) -> Reg {
        self.emit(|dst| Inst::Load { dst, ptr })
    }

    fn store(&mut self, value: Reg, ptr: Reg) {
        self.insts.push(Inst::Store { value, ptr });
    }

    fn alloc(&mut self, bytes: Reg, atomic: bool) -> Reg {
        self.emit(|dst| Inst::Alloc { dst, bytes, atomic })
    }

    fn memcpy(&mut self, dst: Reg, src: Reg, bytes: Reg) {
        self.insts.push(Inst::MemCpy { dst, src, bytes });
    }
}
