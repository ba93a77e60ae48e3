//! Type representation
//!
//! All types of a compilation live in one [`TypeRegistry`] arena and are
//! referred to by [`TypeId`]. Structural types (pointers, arrays,
//! generators, function types) are hash-consed; aggregates and generic
//! placeholders are allocated fresh at declaration and identified by name.
//!
//! Each concrete type gets an operator table (see [`magic`]) built on first
//! use, and aggregates expose an ordered field table whose positions match
//! physical storage order.

mod layout;
pub mod magic;
mod specialize;

pub use magic::{MagicCx, MagicEntry, MagicFn, MagicTable};
pub use specialize::Substitution;

use crate::FuncId;
use indexmap::IndexMap;
use la_arena::{Arena, Idx};
use rustc_hash::FxHashMap;
use sq_intern::{Interner, Symbol};
use std::rc::Rc;

/// Type ID for arena allocation
pub type TypeId = Idx<Type>;

/// Position of the length field in an array value
pub const ARRAY_LEN: u32 = 0;
/// Position of the data pointer in an array value
pub const ARRAY_PTR: u32 = 1;

/// A type in the type system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    /// Type kind
    pub kind: TypeKind,
}

/// Kind of type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// No value
    Void,
    /// Boolean
    Bool,
    /// 8-bit integer
    Byte,
    /// 64-bit integer
    Int,
    /// 64-bit float
    Float,
    /// String (length, data pointer)
    Str,
    /// Raw pointer
    Ptr {
        /// Pointee
        base: TypeId,
    },
    /// Array view (length, data pointer)
    Array {
        /// Element type
        base: TypeId,
    },
    /// Generator yielding `base`
    Gen {
        /// Yielded type
        base: TypeId,
    },
    /// Function type
    Func {
        /// Parameter types
        params: Vec<TypeId>,
        /// Return type
        ret: TypeId,
    },
    /// Value aggregate
    Record(RecordType),
    /// Reference aggregate (class)
    Class(ClassType),
    /// Generic placeholder
    Generic(GenericType),
}

/// Value-aggregate layout
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordType {
    /// Declared name; `None` for storage records generated for classes
    pub name: Option<Symbol>,
    /// Fields in storage order
    pub fields: Vec<Field>,
}

/// One aggregate field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field {
    /// Field name
    pub name: Symbol,
    /// Field type
    pub ty: TypeId,
}

/// Reference-aggregate description
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassType {
    /// Declared name
    pub name: Symbol,
    /// Generic slots; `None` until set at declaration
    pub generics: Option<Vec<TypeId>>,
    /// Storage record
    pub contents: Option<TypeId>,
    /// Unspecialized class this one was derived from
    pub template: Option<TypeId>,
}

/// Named generic placeholder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenericType {
    /// Placeholder name
    pub name: Symbol,
}

/// Errors raised by type construction and specialization
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// Wrong number of generic arguments
    #[error("expected {expected} generic argument(s), found {found}")]
    GenericArity {
        /// Declared arity
        expected: usize,
        /// Supplied count
        found: usize,
    },
    /// Generic slots may only be set once
    #[error("generic parameters are already set")]
    GenericsAlreadySet,
    /// Operation needs a value aggregate
    #[error("not a value type")]
    NotARecord,
    /// Operation needs a class
    #[error("not a class type")]
    NotAClass,
}

/// Pre-interned names used by built-in field tables
#[derive(Debug, Clone, Copy)]
struct WellKnown {
    len: Symbol,
    ptr: Symbol,
}

/// Arena of all types in a compilation
#[derive(Debug)]
pub struct TypeRegistry {
    arena: Arena<Type>,
    interned: FxHashMap<TypeKind, TypeId>,
    methods: FxHashMap<TypeId, IndexMap<Symbol, FuncId>>,
    magic: FxHashMap<TypeId, Rc<MagicTable>>,
    specializations: FxHashMap<(TypeId, Vec<TypeId>), TypeId>,
    names: WellKnown,
    pointer_width: u32,
    void: TypeId,
    bool: TypeId,
    byte: TypeId,
    int: TypeId,
    float: TypeId,
    str: TypeId,
}

impl TypeRegistry {
    /// Create a registry with 8-byte pointers
    pub fn new(interner: &mut Interner) -> Self {
        Self::with_pointer_width(interner, 8)
    }

    /// Create a registry for a target with `pointer_width`-byte pointers
    pub fn with_pointer_width(interner: &mut Interner, pointer_width: u32) -> Self {
        let mut arena = Arena::new();
        let mut interned = FxHashMap::default();
        let mut prim = |kind: TypeKind| {
            let id = arena.alloc(Type { kind: kind.clone() });
            interned.insert(kind, id);
            id
        };
        let void = prim(TypeKind::Void);
        let bool = prim(TypeKind::Bool);
        let byte = prim(TypeKind::Byte);
        let int = prim(TypeKind::Int);
        let float = prim(TypeKind::Float);
        let str = prim(TypeKind::Str);
        Self {
            arena,
            interned,
            methods: FxHashMap::default(),
            magic: FxHashMap::default(),
            specializations: FxHashMap::default(),
            names: WellKnown {
                len: interner.intern("len"),
                ptr: interner.intern("ptr"),
            },
            pointer_width: pointer_width.max(1).next_power_of_two(),
            void,
            bool,
            byte,
            int,
            float,
            str,
        }
    }

    /// Get a type by ID
    pub fn get(&self, id: TypeId) -> &Type {
        &self.arena[id]
    }

    /// Kind of a type
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.arena[id].kind
    }

    /// Bytes per pointer on the target
    pub fn pointer_width(&self) -> u32 {
        self.pointer_width
    }

    /// `void`
    pub fn void(&self) -> TypeId {
        self.void
    }

    /// `bool`
    pub fn bool(&self) -> TypeId {
        self.bool
    }

    /// `byte`
    pub fn byte(&self) -> TypeId {
        self.byte
    }

    /// `int`
    pub fn int(&self) -> TypeId {
        self.int
    }

    /// `float`
    pub fn float(&self) -> TypeId {
        self.float
    }

    /// `str`
    pub fn str(&self) -> TypeId {
        self.str
    }

    fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.interned.get(&kind) {
            return id;
        }
        let id = self.arena.alloc(Type { kind: kind.clone() });
        self.interned.insert(kind, id);
        id
    }

    /// `ptr[base]`
    pub fn ptr(&mut self, base: TypeId) -> TypeId {
        self.intern(TypeKind::Ptr { base })
    }

    /// `array[base]`
    pub fn array(&mut self, base: TypeId) -> TypeId {
        // The field table of an array refers to `ptr[base]`.
        self.ptr(base);
        self.intern(TypeKind::Array { base })
    }

    /// `gen[base]`
    pub fn generator(&mut self, base: TypeId) -> TypeId {
        self.intern(TypeKind::Gen { base })
    }

    /// Function type
    pub fn func(&mut self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        self.intern(TypeKind::Func { params, ret })
    }

    /// Declare a value aggregate with no fields yet
    pub fn new_record(&mut self, name: Option<Symbol>) -> TypeId {
        self.arena.alloc(Type {
            kind: TypeKind::Record(RecordType {
                name,
                fields: Vec::new(),
            }),
        })
    }

    /// Set the fields of a value aggregate, in storage order
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::NotARecord`] if `ty` is not a value aggregate.
    pub fn set_fields(&mut self, ty: TypeId, fields: Vec<Field>) -> Result<(), TypeError> {
        match &mut self.arena[ty].kind {
            TypeKind::Record(record) => {
                record.fields = fields;
                Ok(())
            }
            _ => Err(TypeError::NotARecord),
        }
    }

    /// Declare a class with no generics or contents yet
    pub fn new_class(&mut self, name: Symbol) -> TypeId {
        self.arena.alloc(Type {
            kind: TypeKind::Class(ClassType {
                name,
                generics: None,
                contents: None,
                template: None,
            }),
        })
    }

    /// Set the generic slots of a class; allowed once
    ///
    /// # Errors
    ///
    /// Fails if `ty` is not a class or its generics were already set.
    pub fn set_generics(&mut self, ty: TypeId, generics: Vec<TypeId>) -> Result<(), TypeError> {
        match &mut self.arena[ty].kind {
            TypeKind::Class(class) if class.generics.is_some() => {
                Err(TypeError::GenericsAlreadySet)
            }
            TypeKind::Class(class) => {
                class.generics = Some(generics);
                Ok(())
            }
            _ => Err(TypeError::NotAClass),
        }
    }

    /// Set the storage record of a class
    ///
    /// # Errors
    ///
    /// Fails if `ty` is not a class or `contents` is not a value aggregate.
    pub fn set_contents(&mut self, ty: TypeId, contents: TypeId) -> Result<(), TypeError> {
        if !matches!(self.kind(contents), TypeKind::Record(_)) {
            return Err(TypeError::NotARecord);
        }
        match &mut self.arena[ty].kind {
            TypeKind::Class(class) => {
                class.contents = Some(contents);
                Ok(())
            }
            _ => Err(TypeError::NotAClass),
        }
    }

    /// Fresh generic placeholder
    pub fn new_generic(&mut self, name: Symbol) -> TypeId {
        self.arena.alloc(Type {
            kind: TypeKind::Generic(GenericType { name }),
        })
    }

    /// Whether `ty` is a generic placeholder
    pub fn is_generic(&self, ty: TypeId) -> bool {
        matches!(self.kind(ty), TypeKind::Generic(_))
    }

    /// Generic slots of a class (empty for every other type)
    pub fn generics(&self, ty: TypeId) -> &[TypeId] {
        match self.kind(ty) {
            TypeKind::Class(class) => class.generics.as_deref().unwrap_or(&[]),
            _ => &[],
        }
    }

    /// Number of generic slots
    pub fn generic_arity(&self, ty: TypeId) -> usize {
        self.generics(ty).len()
    }

    /// Declared name of an aggregate or placeholder
    pub fn name(&self, ty: TypeId) -> Option<Symbol> {
        match self.kind(ty) {
            TypeKind::Record(record) => record.name,
            TypeKind::Class(class) => Some(class.name),
            TypeKind::Generic(generic) => Some(generic.name),
            _ => None,
        }
    }

    /// Ordered field table; positions equal storage order
    pub fn fields(&self, ty: TypeId) -> Vec<Field> {
        match self.kind(ty) {
            TypeKind::Record(record) => record.fields.clone(),
            TypeKind::Class(class) => class
                .contents
                .map(|contents| self.fields(contents))
                .unwrap_or_default(),
            TypeKind::Array { base } => {
                let ptr = self
                    .interned
                    .get(&TypeKind::Ptr { base: *base })
                    .copied()
                    .unwrap_or(self.void);
                vec![
                    Field {
                        name: self.names.len,
                        ty: self.int,
                    },
                    Field {
                        name: self.names.ptr,
                        ty: ptr,
                    },
                ]
            }
            _ => Vec::new(),
        }
    }

    /// Position and type of field `name`
    pub fn field(&self, ty: TypeId, name: Symbol) -> Option<(u32, TypeId)> {
        self.fields(ty)
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == name)
            .map(|(index, field)| (index as u32, field.ty))
    }

    /// Element type produced by iterating over `ty`
    pub fn iter_elem(&self, ty: TypeId) -> Option<TypeId> {
        match self.kind(ty) {
            TypeKind::Array { base } | TypeKind::Gen { base } => Some(*base),
            TypeKind::Str => Some(self.str),
            _ => None,
        }
    }

    /// Register `func` as method `name` of `ty`
    pub fn add_method(&mut self, ty: TypeId, name: Symbol, func: FuncId) {
        tracing::debug!(?ty, ?func, "registering method");
        self.methods.entry(ty).or_default().insert(name, func);
    }

    /// Method `name` of `ty`, falling back to the unspecialized template
    pub fn method(&self, ty: TypeId, name: Symbol) -> Option<FuncId> {
        let own = self
            .methods
            .get(&ty)
            .and_then(|methods| methods.get(&name))
            .copied();
        own.or_else(|| match self.kind(ty) {
            TypeKind::Class(ClassType {
                template: Some(template),
                ..
            }) => self.method(*template, name),
            _ => None,
        })
    }

    /// Methods declared directly on `ty`, in declaration order
    pub fn methods(&self, ty: TypeId) -> impl Iterator<Item = (Symbol, FuncId)> + '_ {
        self.methods
            .get(&ty)
            .into_iter()
            .flat_map(|methods| methods.iter().map(|(name, func)| (*name, *func)))
    }

    /// Structural identity
    ///
    /// Same variant, same declared name for aggregates, and pairwise
    /// identity of every nested type and generic slot.
    pub fn is(&self, lhs: TypeId, rhs: TypeId) -> bool {
        if lhs == rhs {
            return true;
        }
        match (self.kind(lhs), self.kind(rhs)) {
            (TypeKind::Void, TypeKind::Void)
            | (TypeKind::Bool, TypeKind::Bool)
            | (TypeKind::Byte, TypeKind::Byte)
            | (TypeKind::Int, TypeKind::Int)
            | (TypeKind::Float, TypeKind::Float)
            | (TypeKind::Str, TypeKind::Str) => true,
            (TypeKind::Ptr { base: left }, TypeKind::Ptr { base: right })
            | (TypeKind::Array { base: left }, TypeKind::Array { base: right })
            | (TypeKind::Gen { base: left }, TypeKind::Gen { base: right }) => {
                self.is(*left, *right)
            }
            (
                TypeKind::Func {
                    params: left_params,
                    ret: left_ret,
                },
                TypeKind::Func {
                    params: right_params,
                    ret: right_ret,
                },
            ) => self.all_is(left_params, right_params) && self.is(*left_ret, *right_ret),
            (TypeKind::Record(left), TypeKind::Record(right)) => {
                left.name == right.name
                    && left.fields.len() == right.fields.len()
                    && left
                        .fields
                        .iter()
                        .zip(&right.fields)
                        .all(|(lf, rf)| self.is(lf.ty, rf.ty))
            }
            (TypeKind::Class(left), TypeKind::Class(right)) => {
                left.name == right.name && self.all_is(self.generics(lhs), self.generics(rhs))
            }
            _ => false,
        }
    }

    fn all_is(&self, left: &[TypeId], right: &[TypeId]) -> bool {
        left.len() == right.len() && left.iter().zip(right).all(|(l, r)| self.is(*l, *r))
    }

    /// Human-readable rendering
    pub fn display(&self, ty: TypeId, interner: &Interner) -> String {
        match self.kind(ty) {
            TypeKind::Void => "void".to_owned(),
            TypeKind::Bool => "bool".to_owned(),
            TypeKind::Byte => "byte".to_owned(),
            TypeKind::Int => "int".to_owned(),
            TypeKind::Float => "float".to_owned(),
            TypeKind::Str => "str".to_owned(),
            TypeKind::Ptr { base } => format!("ptr[{}]", self.display(*base, interner)),
            TypeKind::Array { base } => format!("array[{}]", self.display(*base, interner)),
            TypeKind::Gen { base } => format!("gen[{}]", self.display(*base, interner)),
            TypeKind::Func { params, ret } => format!(
                "function[{}, {}]",
                self.display_list(params, interner),
                self.display(*ret, interner)
            ),
            TypeKind::Record(RecordType {
                name: Some(name), ..
            }) => interner.resolve(*name).to_owned(),
            TypeKind::Record(RecordType { name: None, fields }) => {
                let types: Vec<TypeId> = fields.iter().map(|field| field.ty).collect();
                format!("({})", self.display_list(&types, interner))
            }
            TypeKind::Class(class) => {
                let name = interner.resolve(class.name);
                match class.generics.as_deref() {
                    Some(generics) if !generics.is_empty() => {
                        format!("{name}[{}]", self.display_list(generics, interner))
                    }
                    _ => name.to_owned(),
                }
            }
            TypeKind::Generic(generic) => interner.resolve(generic.name).to_owned(),
        }
    }

    fn display_list(&self, types: &[TypeId], interner: &Interner) -> String {
        types
            .iter()
            .map(|ty| self.display(*ty, interner))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Interner, TypeRegistry) {
        let mut interner = Interner::new();
        let types = TypeRegistry::new(&mut interner);
        (interner, types)
    }

    fn record(
        interner: &mut Interner,
        types: &mut TypeRegistry,
        name: &str,
        fields: &[(&str, TypeId)],
    ) -> TypeId {
        let ty = types.new_record(Some(interner.intern(name)));
        let fields = fields
            .iter()
            .map(|(field, ty)| Field {
                name: interner.intern(field),
                ty: *ty,
            })
            .collect();
        types.set_fields(ty, fields).unwrap();
        ty
    }

    #[test]
    fn test_structural_types_are_hash_consed() {
        let (_, mut types) = setup();
        let int = types.int();
        assert_eq!(types.array(int), types.array(int));
        assert_ne!(types.array(int), types.ptr(int));
    }

    #[test]
    fn test_is_compares_shape_and_name() {
        let (mut interner, mut types) = setup();
        let int = types.int();
        let float = types.float();
        let point = record(&mut interner, &mut types, "Point", &[("x", int), ("y", int)]);
        let other = record(&mut interner, &mut types, "Point", &[("x", int), ("y", int)]);
        let vec2 = record(&mut interner, &mut types, "Vec2", &[("x", int), ("y", int)]);
        assert!(types.is(point, other));
        assert!(!types.is(point, vec2));
        let ints = types.array(int);
        let floats = types.array(float);
        assert!(!types.is(ints, floats));
    }

    #[test]
    fn test_field_table_preserves_declaration_order() {
        let (mut interner, mut types) = setup();
        let int = types.int();
        let float = types.float();
        let ty = record(
            &mut interner,
            &mut types,
            "Pixel",
            &[("r", int), ("g", float), ("b", int)],
        );
        let names: Vec<&str> = types
            .fields(ty)
            .iter()
            .map(|field| interner.resolve(field.name))
            .collect();
        assert_eq!(names, ["r", "g", "b"]);
        assert_eq!(types.field(ty, interner.intern("g")), Some((1, float)));
    }

    #[test]
    fn test_array_fields_are_len_then_ptr() {
        let (mut interner, mut types) = setup();
        let byte = types.byte();
        let arr = types.array(byte);
        let ptr = types.ptr(byte);
        assert_eq!(types.field(arr, interner.intern("len")), Some((ARRAY_LEN, types.int())));
        assert_eq!(types.field(arr, interner.intern("ptr")), Some((ARRAY_PTR, ptr)));
    }

    #[test]
    fn test_generics_are_set_once() {
        let (mut interner, mut types) = setup();
        let list = types.new_class(interner.intern("List"));
        let param = types.new_generic(interner.intern("T"));
        types.set_generics(list, vec![param]).unwrap();
        assert_eq!(
            types.set_generics(list, vec![param]),
            Err(TypeError::GenericsAlreadySet)
        );
        assert_eq!(types.generic_arity(list), 1);
    }

    #[test]
    fn test_display() {
        let (mut interner, mut types) = setup();
        let int = types.int();
        let arr = types.array(int);
        let list = types.new_class(interner.intern("List"));
        let param = types.new_generic(interner.intern("T"));
        types.set_generics(list, vec![param]).unwrap();
        assert_eq!(types.display(arr, &interner), "array[int]");
        assert_eq!(types.display(list, &interner), "List[T]");
    }
}
