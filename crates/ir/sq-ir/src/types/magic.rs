//! Operator ("magic") tables
//!
//! Every concrete type maps `(operator name, parameter types)` to a
//! code-generation callback and a return type. Tables are built the first
//! time a type's operators are requested and cached by [`TypeId`]; a
//! specialized class gets its own table built from its substituted types.

use super::{TypeId, TypeKind, TypeRegistry, ARRAY_LEN, ARRAY_PTR};
use crate::inst::{ArithOp, CmpOp, InstBuilder, Reg};
use std::fmt;
use std::rc::Rc;

/// Code-generation callback: receiver register and argument registers in,
/// result register out (`None` for `void` operators)
pub type MagicFn = fn(&MagicCx<'_>, &mut dyn InstBuilder, Reg, &[Reg]) -> Option<Reg>;

/// What a callback may inspect while emitting code
#[derive(Debug, Clone, Copy)]
pub struct MagicCx<'reg> {
    /// Registry owning `self_ty`
    pub types: &'reg TypeRegistry,
    /// Type the operator is defined on
    pub self_ty: TypeId,
}

/// One operator
#[derive(Clone)]
pub struct MagicEntry {
    /// Operator name (`__add__`, `__getitem__`, ...)
    pub name: &'static str,
    /// Parameter types, receiver excluded
    pub params: Vec<TypeId>,
    /// Result type
    pub ret: TypeId,
    /// Code generator
    pub codegen: MagicFn,
}

impl fmt::Debug for MagicEntry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MagicEntry")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("ret", &self.ret)
            .finish_non_exhaustive()
    }
}

impl MagicEntry {
    fn new(name: &'static str, params: Vec<TypeId>, ret: TypeId, codegen: MagicFn) -> Self {
        Self {
            name,
            params,
            ret,
            codegen,
        }
    }

    /// Emit the operator body for receiver `this` of type `self_ty`
    pub fn emit(
        &self,
        types: &TypeRegistry,
        self_ty: TypeId,
        builder: &mut dyn InstBuilder,
        this: Reg,
        args: &[Reg],
    ) -> Option<Reg> {
        (self.codegen)(&MagicCx { types, self_ty }, builder, this, args)
    }
}

/// Operator table of one type
#[derive(Debug, Clone, Default)]
pub struct MagicTable {
    entries: Vec<MagicEntry>,
}

impl MagicTable {
    /// Operator `name` accepting `args`
    ///
    /// Generic argument types match any parameter; they are resolved when
    /// the caller is specialized.
    pub fn find(&self, types: &TypeRegistry, name: &str, args: &[TypeId]) -> Option<&MagicEntry> {
        self.entries.iter().find(|entry| {
            entry.name == name
                && entry.params.len() == args.len()
                && entry
                    .params
                    .iter()
                    .zip(args)
                    .all(|(param, arg)| types.is(*param, *arg) || types.is_generic(*arg))
        })
    }

    /// Whether any overload of `name` exists
    pub fn has(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| entry.name == name)
    }

    /// All entries
    pub fn entries(&self) -> &[MagicEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TypeRegistry {
    /// Operator table of `ty`, built on first request
    pub fn init_ops(&mut self, ty: TypeId) -> Rc<MagicTable> {
        if let Some(table) = self.magic.get(&ty) {
            return Rc::clone(table);
        }
        let table = Rc::new(self.build_ops(ty));
        tracing::debug!(?ty, operators = table.len(), "built operator table");
        self.magic.insert(ty, Rc::clone(&table));
        table
    }

    /// Whether the operator table of `ty` has been built
    pub fn ops_initialized(&self, ty: TypeId) -> bool {
        self.magic.contains_key(&ty)
    }

    /// Look up operator `name` on `ty` for argument types `args`
    pub fn find_magic(&mut self, ty: TypeId, name: &str, args: &[TypeId]) -> Option<MagicEntry> {
        let table = self.init_ops(ty);
        table.find(self, name, args).cloned()
    }

    /// Emit the zero value of `ty`
    ///
    /// Arrays default to a null data pointer with length 0; classes and
    /// pointers to null; scalars to zero.
    pub fn emit_default(&self, ty: TypeId, builder: &mut dyn InstBuilder) -> Reg {
        match self.kind(ty) {
            TypeKind::Array { base } => {
                let ptr = self.fields(ty).get(ARRAY_PTR as usize).map_or(*base, |field| field.ty);
                let value = builder.undef(ty);
                let data = builder.null(ptr);
                let len = builder.const_int(0);
                let value = builder.insert(value, ARRAY_PTR, data);
                builder.insert(value, ARRAY_LEN, len)
            }
            TypeKind::Float => builder.const_float(0.0),
            TypeKind::Bool | TypeKind::Byte | TypeKind::Int => builder.const_int(0),
            TypeKind::Ptr { .. } | TypeKind::Class(_) | TypeKind::Gen { .. } | TypeKind::Func { .. } => {
                builder.null(ty)
            }
            TypeKind::Void | TypeKind::Str | TypeKind::Record(_) | TypeKind::Generic(_) => {
                builder.undef(ty)
            }
        }
    }

    fn build_ops(&mut self, ty: TypeId) -> MagicTable {
        let int = self.int();
        let bool = self.bool();
        let void = self.void();
        let entries = match self.kind(ty).clone() {
            TypeKind::Int => {
                let mut entries = numeric_ops(int, bool);
                entries.push(MagicEntry::new("__bool__", vec![], bool, |_, builder, this, _| {
                    let zero = builder.const_int(0);
                    Some(builder.cmp(CmpOp::Ne, this, zero))
                }));
                entries
            }
            TypeKind::Float => {
                let float = self.float();
                let mut entries = numeric_ops(float, bool);
                entries.push(MagicEntry::new("__bool__", vec![], bool, |_, builder, this, _| {
                    let zero = builder.const_float(0.0);
                    Some(builder.cmp(CmpOp::Ne, this, zero))
                }));
                entries
            }
            TypeKind::Bool => vec![
                MagicEntry::new("__eq__", vec![bool], bool, |_, builder, this, args| {
                    Some(builder.cmp(CmpOp::Eq, this, *args.first()?))
                }),
                MagicEntry::new("__ne__", vec![bool], bool, |_, builder, this, args| {
                    Some(builder.cmp(CmpOp::Ne, this, *args.first()?))
                }),
                MagicEntry::new("__bool__", vec![], bool, |_, _, this, _| Some(this)),
            ],
            TypeKind::Str => vec![MagicEntry::new("__len__", vec![], int, |_, builder, this, _| {
                Some(builder.extract(this, 0))
            })],
            TypeKind::Ptr { base } => vec![
                MagicEntry::new("__getitem__", vec![int], base, |_, builder, this, args| {
                    let slot = builder.gep(this, *args.first()?);
                    Some(builder.load(slot))
                }),
                MagicEntry::new("__setitem__", vec![int, base], void, |_, builder, this, args| {
                    let slot = builder.gep(this, *args.first()?);
                    builder.store(*args.get(1)?, slot);
                    None
                }),
                MagicEntry::new("__add__", vec![int], ty, |_, builder, this, args| {
                    Some(builder.gep(this, *args.first()?))
                }),
            ],
            TypeKind::Array { base } => {
                let ptr = self.ptr(base);
                array_ops(ty, base, ptr, int, bool, void)
            }
            TypeKind::Record(record) => {
                let params = record.fields.iter().map(|field| field.ty).collect();
                vec![MagicEntry::new("__init__", params, ty, |cx, builder, _, args| {
                    Some(build_aggregate(builder, cx.self_ty, args))
                })]
            }
            TypeKind::Class(class) => {
                let params = class
                    .contents
                    .map(|contents| self.fields(contents).iter().map(|field| field.ty).collect())
                    .unwrap_or_default();
                vec![
                    MagicEntry::new("__init__", params, ty, |cx, builder, _, args| {
                        let contents = class_contents(cx)?;
                        let bytes = builder.const_int(cx.types.size_of(contents) as i64);
                        let object = builder.alloc(bytes, cx.types.is_atomic(contents));
                        let value = build_aggregate(builder, contents, args);
                        builder.store(value, object);
                        Some(object)
                    }),
                    MagicEntry::new("__bool__", vec![], bool, |cx, builder, this, _| {
                        let null = builder.null(cx.self_ty);
                        Some(builder.cmp(CmpOp::Ne, this, null))
                    }),
                ]
            }
            TypeKind::Void
            | TypeKind::Byte
            | TypeKind::Gen { .. }
            | TypeKind::Func { .. }
            | TypeKind::Generic(_) => Vec::new(),
        };
        MagicTable { entries }
    }
}

fn numeric_ops(ty: TypeId, bool: TypeId) -> Vec<MagicEntry> {
    vec![
        MagicEntry::new("__add__", vec![ty], ty, |_, builder, this, args| {
            Some(builder.arith(ArithOp::Add, this, *args.first()?))
        }),
        MagicEntry::new("__sub__", vec![ty], ty, |_, builder, this, args| {
            Some(builder.arith(ArithOp::Sub, this, *args.first()?))
        }),
        MagicEntry::new("__mul__", vec![ty], ty, |_, builder, this, args| {
            Some(builder.arith(ArithOp::Mul, this, *args.first()?))
        }),
        MagicEntry::new("__lt__", vec![ty], bool, |_, builder, this, args| {
            Some(builder.cmp(CmpOp::Lt, this, *args.first()?))
        }),
        MagicEntry::new("__gt__", vec![ty], bool, |_, builder, this, args| {
            Some(builder.cmp(CmpOp::Gt, this, *args.first()?))
        }),
        MagicEntry::new("__eq__", vec![ty], bool, |_, builder, this, args| {
            Some(builder.cmp(CmpOp::Eq, this, *args.first()?))
        }),
        MagicEntry::new("__ne__", vec![ty], bool, |_, builder, this, args| {
            Some(builder.cmp(CmpOp::Ne, this, *args.first()?))
        }),
    ]
}

fn array_ops(
    ty: TypeId,
    base: TypeId,
    ptr: TypeId,
    int: TypeId,
    bool: TypeId,
    void: TypeId,
) -> Vec<MagicEntry> {
    vec![
        MagicEntry::new("__init__", vec![int], ty, |cx, builder, _, args| {
            let len = *args.first()?;
            let elem = element(cx)?;
            let bytes = byte_count(cx, builder, elem, len);
            let data = builder.alloc(bytes, cx.types.is_atomic(elem));
            Some(make_array(cx, builder, data, len))
        }),
        MagicEntry::new("__init__", vec![ptr, int], ty, |cx, builder, _, args| {
            Some(make_array(cx, builder, *args.first()?, *args.get(1)?))
        }),
        MagicEntry::new("__copy__", vec![], ty, |cx, builder, this, _| {
            let elem = element(cx)?;
            let data = builder.extract(this, ARRAY_PTR);
            let len = builder.extract(this, ARRAY_LEN);
            let bytes = byte_count(cx, builder, elem, len);
            let copy = builder.alloc(bytes, cx.types.is_atomic(elem));
            builder.memcpy(copy, data, bytes);
            Some(make_array(cx, builder, copy, len))
        }),
        MagicEntry::new("__len__", vec![], int, |_, builder, this, _| {
            Some(builder.extract(this, ARRAY_LEN))
        }),
        MagicEntry::new("__bool__", vec![], bool, |_, builder, this, _| {
            let len = builder.extract(this, ARRAY_LEN);
            let zero = builder.const_int(0);
            Some(builder.cmp(CmpOp::Ne, len, zero))
        }),
        MagicEntry::new("__getitem__", vec![int], base, |_, builder, this, args| {
            let data = builder.extract(this, ARRAY_PTR);
            let slot = builder.gep(data, *args.first()?);
            Some(builder.load(slot))
        }),
        MagicEntry::new("__slice__", vec![int, int], ty, |cx, builder, this, args| {
            let (lo, hi) = (*args.first()?, *args.get(1)?);
            let data = builder.extract(this, ARRAY_PTR);
            let start = builder.gep(data, lo);
            let len = builder.arith(ArithOp::Sub, hi, lo);
            Some(make_array(cx, builder, start, len))
        }),
        MagicEntry::new("__slice_left__", vec![int], ty, |cx, builder, this, args| {
            let data = builder.extract(this, ARRAY_PTR);
            Some(make_array(cx, builder, data, *args.first()?))
        }),
        MagicEntry::new("__slice_right__", vec![int], ty, |cx, builder, this, args| {
            let lo = *args.first()?;
            let data = builder.extract(this, ARRAY_PTR);
            let total = builder.extract(this, ARRAY_LEN);
            let start = builder.gep(data, lo);
            let len = builder.arith(ArithOp::Sub, total, lo);
            Some(make_array(cx, builder, start, len))
        }),
        MagicEntry::new("__setitem__", vec![int, base], void, |_, builder, this, args| {
            let data = builder.extract(this, ARRAY_PTR);
            let slot = builder.gep(data, *args.first()?);
            builder.store(*args.get(1)?, slot);
            None
        }),
    ]
}

fn element(cx: &MagicCx<'_>) -> Option<TypeId> {
    match cx.types.kind(cx.self_ty) {
        TypeKind::Array { base } => Some(*base),
        _ => None,
    }
}

fn class_contents(cx: &MagicCx<'_>) -> Option<TypeId> {
    match cx.types.kind(cx.self_ty) {
        TypeKind::Class(class) => class.contents,
        _ => None,
    }
}

/// `len * sizeof(elem)`, computed at run time
fn byte_count(cx: &MagicCx<'_>, builder: &mut dyn InstBuilder, elem: TypeId, len: Reg) -> Reg {
    let elem_size = builder.const_int(cx.types.size_of(elem) as i64);
    builder.arith(ArithOp::Mul, len, elem_size)
}

fn make_array(cx: &MagicCx<'_>, builder: &mut dyn InstBuilder, data: Reg, len: Reg) -> Reg {
    let value = builder.undef(cx.self_ty);
    let value = builder.insert(value, ARRAY_PTR, data);
    builder.insert(value, ARRAY_LEN, len)
}

fn build_aggregate(builder: &mut dyn InstBuilder, ty: TypeId, fields: &[Reg]) -> Reg {
    let value = builder.undef(ty);
    fields
        .iter()
        .enumerate()
        .fold(value, |agg, (index, field)| builder.insert(agg, index as u32, *field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inst::{Inst, InstBuffer};
    use sq_intern::Interner;

    fn emit(types: &mut TypeRegistry, ty: TypeId, name: &str, args: &[TypeId]) -> InstBuffer {
        let entry = types.find_magic(ty, name, args).unwrap();
        let mut buffer = InstBuffer::new();
        let this = buffer.param();
        let regs: Vec<Reg> = args.iter().map(|_| buffer.param()).collect();
        entry.emit(types, ty, &mut buffer, this, &regs);
        buffer
    }

    #[test]
    fn test_table_is_built_once() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::new(&mut interner);
        let int = types.int();
        assert!(!types.ops_initialized(int));
        let first = types.init_ops(int);
        let second = types.init_ops(int);
        assert!(Rc::ptr_eq(&first, &second));
        assert!(types.ops_initialized(int));
    }

    #[test]
    fn test_slices_alias_and_never_allocate() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::new(&mut interner);
        let int = types.int();
        let arr = types.array(int);
        for (name, args) in [
            ("__slice__", vec![int, int]),
            ("__slice_left__", vec![int]),
            ("__slice_right__", vec![int]),
        ] {
            let buffer = emit(&mut types, arr, name, &args);
            assert_eq!(buffer.allocations().count(), 0, "{name} allocated");
            assert!(!buffer.insts().iter().any(|inst| matches!(inst, Inst::MemCpy { .. })));
        }
    }

    #[test]
    fn test_copy_allocates_element_size_times_length() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::new(&mut interner);
        let float = types.float();
        let arr = types.array(float);
        let buffer = emit(&mut types, arr, "__copy__", &[]);
        let allocs: Vec<&Inst> = buffer.allocations().collect();
        assert_eq!(allocs.len(), 1);
        let Inst::Alloc { bytes, atomic, .. } = allocs[0] else {
            panic!("expected an allocation");
        };
        assert!(*atomic);
        let size = buffer.insts().iter().find_map(|inst| match inst {
            Inst::Arith {
                dst,
                op: ArithOp::Mul,
                rhs,
                ..
            } if dst == bytes => Some(*rhs),
            _ => None,
        });
        let size = size.unwrap();
        assert!(buffer
            .insts()
            .contains(&Inst::ConstInt { dst: size, value: 8 }));
        assert!(buffer.insts().iter().any(|inst| matches!(inst, Inst::MemCpy { .. })));
    }

    #[test]
    fn test_copy_of_reference_elements_uses_scanning_allocator() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::new(&mut interner);
        let str = types.str();
        let arr = types.array(str);
        let buffer = emit(&mut types, arr, "__copy__", &[]);
        assert!(buffer
            .allocations()
            .all(|inst| matches!(inst, Inst::Alloc { atomic: false, .. })));
    }

    #[test]
    fn test_array_default_is_null_and_empty() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::new(&mut interner);
        let int = types.int();
        let arr = types.array(int);
        let ptr = types.ptr(int);
        let mut buffer = InstBuffer::new();
        types.emit_default(arr, &mut buffer);
        assert!(buffer.insts().contains(&Inst::Null { dst: Reg(1), ty: ptr }));
        assert!(buffer.insts().contains(&Inst::ConstInt { dst: Reg(2), value: 0 }));
        assert_eq!(buffer.allocations().count(), 0);
    }

    #[test]
    fn test_lookup_matches_parameter_types() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::new(&mut interner);
        let int = types.int();
        let float = types.float();
        assert!(types.find_magic(int, "__add__", &[int]).is_some());
        assert!(types.find_magic(int, "__add__", &[float]).is_none());
        let placeholder = types.new_generic(interner.intern("T"));
        assert!(types.find_magic(int, "__add__", &[placeholder]).is_some());
    }
}
