//! Size, alignment and scanning requirements of types

use super::{TypeId, TypeKind, TypeRegistry};

impl TypeRegistry {
    /// Size of a value of `ty` in bytes
    pub fn size_of(&self, ty: TypeId) -> u64 {
        let word = u64::from(self.pointer_width);
        match self.kind(ty) {
            TypeKind::Void => 0,
            TypeKind::Bool | TypeKind::Byte => 1,
            TypeKind::Int | TypeKind::Float => 8,
            // (length, data pointer)
            TypeKind::Str | TypeKind::Array { .. } => align_to(8 + word, word.max(8)),
            TypeKind::Record(record) => {
                let mut size = 0;
                let mut align = 1;
                for field in &record.fields {
                    let field_align = self.align_of(field.ty);
                    size = align_to(size, field_align) + self.size_of(field.ty);
                    align = align.max(field_align);
                }
                align_to(size, align)
            }
            // Classes are heap references; everything else is pointer sized
            TypeKind::Ptr { .. }
            | TypeKind::Gen { .. }
            | TypeKind::Func { .. }
            | TypeKind::Class(_)
            | TypeKind::Generic(_) => word,
        }
    }

    /// Alignment of `ty` in bytes
    pub fn align_of(&self, ty: TypeId) -> u64 {
        let word = u64::from(self.pointer_width);
        match self.kind(ty) {
            TypeKind::Void | TypeKind::Bool | TypeKind::Byte => 1,
            TypeKind::Int | TypeKind::Float => 8,
            TypeKind::Str | TypeKind::Array { .. } => word.max(8),
            TypeKind::Record(record) => record
                .fields
                .iter()
                .map(|field| self.align_of(field.ty))
                .max()
                .unwrap_or(1),
            _ => word,
        }
    }

    /// Whether values of `ty` contain no references
    ///
    /// Atomic memory is allocated with the non-scanning allocator.
    pub fn is_atomic(&self, ty: TypeId) -> bool {
        match self.kind(ty) {
            TypeKind::Void
            | TypeKind::Bool
            | TypeKind::Byte
            | TypeKind::Int
            | TypeKind::Float => true,
            TypeKind::Record(record) => record.fields.iter().all(|field| self.is_atomic(field.ty)),
            _ => false,
        }
    }
}

/// Align offset to the given alignment
fn align_to(offset: u64, align: u64) -> u64 {
    (offset + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use crate::types::{Field, TypeRegistry};
    use sq_intern::Interner;

    #[test]
    fn test_record_layout_is_padded() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::new(&mut interner);
        let rec = types.new_record(Some(interner.intern("Mixed")));
        let fields = vec![
            Field {
                name: interner.intern("flag"),
                ty: types.bool(),
            },
            Field {
                name: interner.intern("count"),
                ty: types.int(),
            },
        ];
        types.set_fields(rec, fields).unwrap();
        assert_eq!(types.size_of(rec), 16);
        assert_eq!(types.align_of(rec), 8);
        assert!(types.is_atomic(rec));
    }

    #[test]
    fn test_references_are_not_atomic() {
        let mut interner = Interner::new();
        let mut types = TypeRegistry::with_pointer_width(&mut interner, 4);
        let int = types.int();
        let ptr = types.ptr(int);
        let arr = types.array(int);
        assert!(!types.is_atomic(ptr));
        assert!(!types.is_atomic(arr));
        assert_eq!(types.size_of(ptr), 4);
        assert_eq!(types.size_of(arr), 16);
        assert_eq!(types.align_of(arr), 8);
    }
}
