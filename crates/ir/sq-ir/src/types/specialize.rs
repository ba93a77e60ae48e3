//! Generic substitution
//!
//! Specializing a type replaces generic placeholders according to a
//! [`Substitution`], rebuilding every type that transitively mentions one.
//! Specialized classes are memoized on `(template, arguments)` so that
//! recursive classes (`class Node[T]: next: Node[T]`) terminate and every
//! instantiation is created exactly once.

use super::{ClassType, Field, RecordType, Type, TypeError, TypeId, TypeKind, TypeRegistry};
use rustc_hash::FxHashMap;

/// Mapping from generic placeholders to their replacements
pub type Substitution = FxHashMap<TypeId, TypeId>;

impl TypeRegistry {
    /// Apply `subst` to `ty`
    ///
    /// Types that mention no substituted placeholder are returned unchanged.
    pub fn specialize(&mut self, ty: TypeId, subst: &Substitution) -> TypeId {
        if let Some(&replacement) = subst.get(&ty) {
            return replacement;
        }
        match self.kind(ty).clone() {
            TypeKind::Void
            | TypeKind::Bool
            | TypeKind::Byte
            | TypeKind::Int
            | TypeKind::Float
            | TypeKind::Str
            | TypeKind::Generic(_) => ty,
            TypeKind::Ptr { base } => {
                let base = self.specialize(base, subst);
                self.ptr(base)
            }
            TypeKind::Array { base } => {
                let base = self.specialize(base, subst);
                self.array(base)
            }
            TypeKind::Gen { base } => {
                let base = self.specialize(base, subst);
                self.generator(base)
            }
            TypeKind::Func { params, ret } => {
                let params = params
                    .into_iter()
                    .map(|param| self.specialize(param, subst))
                    .collect();
                let ret = self.specialize(ret, subst);
                self.func(params, ret)
            }
            TypeKind::Record(record) => self.specialize_record(ty, record, subst),
            TypeKind::Class(class) => self.specialize_class(ty, class, subst),
        }
    }

    /// Instantiate generic class `class` with `args`
    ///
    /// # Errors
    ///
    /// Fails with [`TypeError::GenericArity`] if the argument count differs
    /// from the declared arity.
    pub fn instantiate(&mut self, class: TypeId, args: &[TypeId]) -> Result<TypeId, TypeError> {
        if !matches!(self.kind(class), TypeKind::Class(_)) {
            return Err(TypeError::NotAClass);
        }
        let generics = self.generics(class).to_vec();
        if generics.len() != args.len() {
            return Err(TypeError::GenericArity {
                expected: generics.len(),
                found: args.len(),
            });
        }
        let subst: Substitution = generics.into_iter().zip(args.iter().copied()).collect();
        Ok(self.specialize(class, &subst))
    }

    /// Unspecialized class `ty` was derived from (itself if not derived)
    pub fn template(&self, ty: TypeId) -> TypeId {
        match self.kind(ty) {
            TypeKind::Class(ClassType {
                template: Some(template),
                ..
            }) => *template,
            _ => ty,
        }
    }

    fn specialize_record(
        &mut self,
        ty: TypeId,
        record: RecordType,
        subst: &Substitution,
    ) -> TypeId {
        let fields: Vec<Field> = record
            .fields
            .iter()
            .map(|field| Field {
                name: field.name,
                ty: self.specialize(field.ty, subst),
            })
            .collect();
        if fields == record.fields {
            return ty;
        }
        self.arena.alloc(Type {
            kind: TypeKind::Record(RecordType {
                name: record.name,
                fields,
            }),
        })
    }

    fn specialize_class(&mut self, ty: TypeId, class: ClassType, subst: &Substitution) -> TypeId {
        let Some(generics) = class.generics else {
            return ty;
        };
        let args: Vec<TypeId> = generics
            .iter()
            .map(|generic| self.specialize(*generic, subst))
            .collect();
        if args == generics {
            return ty;
        }
        let template = class.template.unwrap_or(ty);
        let key = (template, args.clone());
        if let Some(&existing) = self.specializations.get(&key) {
            return existing;
        }

        let specialized = self.arena.alloc(Type {
            kind: TypeKind::Class(ClassType {
                name: class.name,
                generics: Some(args.clone()),
                contents: None,
                template: Some(template),
            }),
        });
        // Registered before the contents so self-references resolve to it.
        self.specializations.insert(key, specialized);
        tracing::debug!(?template, ?specialized, "specialized class");

        if let Some(contents) = class.contents {
            let contents = self.specialize(contents, subst);
            if let TypeKind::Class(class) = &mut self.arena[specialized].kind {
                class.contents = Some(contents);
            }
        }
        specialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sq_intern::Interner;

    fn generic_box(interner: &mut Interner, types: &mut TypeRegistry) -> (TypeId, TypeId) {
        let class = types.new_class(interner.intern("Box"));
        let param = types.new_generic(interner.intern("T"));
        types.set_generics(class, vec![param]).unwrap();
        let storage = types.new_record(None);
        let item = types.array(param);
        types
            .set_fields(
                storage,
                vec![
                    Field {
                        name: interner.intern("items"),
                        ty: item,
                    },
                    Field {
                        name: interner.intern("next"),
                        ty: class,
                    },
                ],
            )
            .unwrap();
        types.set_contents(class, storage).unwrap();
        (class, param)
    }

    #[test]
    fn test_instantiate_substitutes_transitively() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::new(&mut interner);
        let (class, _) = generic_box(&mut interner, &mut types);
        let int = types.int();
        let boxed = types.instantiate(class, &[int]).unwrap();
        assert_ne!(boxed, class);
        assert_eq!(types.template(boxed), class);
        assert_eq!(types.display(boxed, &interner), "Box[int]");

        let items = types.field(boxed, interner.intern("items")).unwrap();
        assert_eq!(items, (0, types.array(int)));
        // The recursive field points back at the specialization itself
        let next = types.field(boxed, interner.intern("next")).unwrap();
        assert_eq!(next, (1, boxed));
    }

    #[test]
    fn test_instantiation_is_memoized() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::new(&mut interner);
        let (class, _) = generic_box(&mut interner, &mut types);
        let float = types.float();
        let first = types.instantiate(class, &[float]).unwrap();
        let second = types.instantiate(class, &[float]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_instantiate_checks_arity() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::new(&mut interner);
        let (class, _) = generic_box(&mut interner, &mut types);
        let int = types.int();
        assert_eq!(
            types.instantiate(class, &[int, int]),
            Err(TypeError::GenericArity {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn test_specialized_class_gets_its_own_operator_table() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::new(&mut interner);
        let (class, _) = generic_box(&mut interner, &mut types);
        let int = types.int();
        let boxed = types.instantiate(class, &[int]).unwrap();
        let array = types.array(int);
        assert!(types.find_magic(boxed, "__init__", &[array, boxed]).is_some());
        assert!(types.ops_initialized(boxed));
        assert!(!types.ops_initialized(class));
    }

    #[test]
    fn test_unrelated_types_are_unchanged() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::new(&mut interner);
        let param = types.new_generic(interner.intern("T"));
        let int = types.int();
        let subst: Substitution = [(param, int)].into_iter().collect();
        let floats = types.array(types.float());
        assert_eq!(types.specialize(floats, &subst), floats);
        let numbers = types.generator(param);
        assert_eq!(types.specialize(numbers, &subst), types.generator(int));
    }
}
