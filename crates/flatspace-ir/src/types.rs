//! Type interning.
//!
//! Every type except identified structs is uniqued: constructing the same
//! `TypeData` twice yields the same `TypeRef`, so type equality is ref
//! equality. Identified structs get a fresh ref per creation and may have
//! their body filled in after creation, which is what allows a struct to
//! contain a pointer to itself.

use std::collections::{HashMap, HashSet};

use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;

use crate::refs::TypeRef;
use crate::symbol::Symbol;

// ============================================================================
// TypeData
// ============================================================================

/// Leaf types that never carry an address space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Void,
    Label,
    Metadata,
    Token,
    /// Integer of the given bit width.
    Int(u32),
    Half,
    Float,
    Double,
}

/// Body and identity of a struct type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StructType {
    pub name: Option<Symbol>,
    /// `None` for an opaque (bodiless) identified struct.
    pub body: Option<SmallVec<[TypeRef; 4]>>,
    pub packed: bool,
    /// Literal structs are uniqued by content and cannot be named.
    pub literal: bool,
}

impl StructType {
    /// Field types, empty for opaque structs.
    pub fn fields(&self) -> &[TypeRef] {
        self.body.as_deref().unwrap_or(&[])
    }

    pub fn is_opaque(&self) -> bool {
        self.body.is_none()
    }
}

/// Data for a single type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeData {
    Scalar(ScalarKind),
    /// Opaque pointer; the pointee type lives on loads, stores and GEPs.
    Pointer { addrspace: u32 },
    Function {
        ret: TypeRef,
        params: SmallVec<[TypeRef; 4]>,
        vararg: bool,
    },
    Struct(StructType),
    Array {
        elem: TypeRef,
        len: u64,
    },
    Vector {
        elem: TypeRef,
        len: u32,
        scalable: bool,
    },
}

impl TypeData {
    fn is_identified_struct(&self) -> bool {
        matches!(self, TypeData::Struct(st) if !st.literal)
    }
}

// ============================================================================
// TypeInterner
// ============================================================================

/// Deduplicating type interner plus the table of identified structs.
pub struct TypeInterner {
    types: PrimaryMap<TypeRef, TypeData>,
    dedup: HashMap<TypeData, TypeRef>,
    struct_names: HashMap<Symbol, TypeRef>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self {
            types: PrimaryMap::new(),
            dedup: HashMap::default(),
            struct_names: HashMap::default(),
        }
    }

    /// Intern a type, returning an existing ref if the data matches.
    ///
    /// # Panics
    ///
    /// Panics if `data` describes an identified struct; use `create_struct`.
    pub fn intern(&mut self, data: TypeData) -> TypeRef {
        assert!(
            !data.is_identified_struct(),
            "intern: identified structs must be created with create_struct"
        );
        if let Some(&existing) = self.dedup.get(&data) {
            return existing;
        }
        let r = self.types.push(data.clone());
        self.dedup.insert(data, r);
        r
    }

    /// Look up type data by reference.
    pub fn get(&self, r: TypeRef) -> &TypeData {
        &self.types[r]
    }

    /// Number of types created so far.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    pub fn scalar(&mut self, kind: ScalarKind) -> TypeRef {
        self.intern(TypeData::Scalar(kind))
    }

    pub fn void(&mut self) -> TypeRef {
        self.scalar(ScalarKind::Void)
    }

    pub fn int(&mut self, bits: u32) -> TypeRef {
        self.scalar(ScalarKind::Int(bits))
    }

    /// Pointer into `addrspace`.
    pub fn ptr(&mut self, addrspace: u32) -> TypeRef {
        self.intern(TypeData::Pointer { addrspace })
    }

    pub fn function(
        &mut self,
        ret: TypeRef,
        params: impl IntoIterator<Item = TypeRef>,
        vararg: bool,
    ) -> TypeRef {
        self.intern(TypeData::Function {
            ret,
            params: params.into_iter().collect(),
            vararg,
        })
    }

    pub fn literal_struct(
        &mut self,
        fields: impl IntoIterator<Item = TypeRef>,
        packed: bool,
    ) -> TypeRef {
        self.intern(TypeData::Struct(StructType {
            name: None,
            body: Some(fields.into_iter().collect()),
            packed,
            literal: true,
        }))
    }

    pub fn array(&mut self, elem: TypeRef, len: u64) -> TypeRef {
        self.intern(TypeData::Array { elem, len })
    }

    pub fn vector(&mut self, elem: TypeRef, len: u32, scalable: bool) -> TypeRef {
        self.intern(TypeData::Vector {
            elem,
            len,
            scalable,
        })
    }

    // ========================================================================
    // Identified structs
    // ========================================================================

    /// Create a new opaque identified struct.
    ///
    /// A name that is already taken gets a numeric suffix.
    pub fn create_struct(&mut self, name: Option<Symbol>) -> TypeRef {
        let r = self.types.push(TypeData::Struct(StructType {
            name: None,
            body: None,
            packed: false,
            literal: false,
        }));
        if let Some(name) = name {
            self.set_struct_name(r, name);
        }
        r
    }

    /// Fill in the body of an opaque identified struct.
    ///
    /// # Panics
    ///
    /// Panics if `ty` is not an opaque identified struct.
    pub fn set_struct_body(
        &mut self,
        ty: TypeRef,
        fields: impl IntoIterator<Item = TypeRef>,
        packed: bool,
    ) {
        match &mut self.types[ty] {
            TypeData::Struct(st) if !st.literal && st.body.is_none() => {
                st.body = Some(fields.into_iter().collect());
                st.packed = packed;
            }
            other => panic!("set_struct_body: {ty} is not an opaque identified struct: {other:?}"),
        }
    }

    /// Rename an identified struct, returning the name actually assigned.
    pub fn set_struct_name(&mut self, ty: TypeRef, name: Symbol) -> Symbol {
        let old = match &self.types[ty] {
            TypeData::Struct(st) if !st.literal => st.name,
            other => panic!("set_struct_name: {ty} is not an identified struct: {other:?}"),
        };
        if old == Some(name) {
            return name;
        }
        if let Some(old) = old {
            self.struct_names.remove(&old);
        }
        let name = self.unique_struct_name(name);
        self.struct_names.insert(name, ty);
        if let TypeData::Struct(st) = &mut self.types[ty] {
            st.name = Some(name);
        }
        name
    }

    /// Look up an identified struct by name.
    pub fn named_struct(&self, name: Symbol) -> Option<TypeRef> {
        self.struct_names.get(&name).copied()
    }

    fn unique_struct_name(&self, base: Symbol) -> Symbol {
        if !self.struct_names.contains_key(&base) {
            return base;
        }
        (0u32..)
            .map(|n| base.with_suffix(&format!(".{n}")))
            .find(|candidate| !self.struct_names.contains_key(candidate))
            .expect("unbounded suffix search")
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// The struct description if `ty` is a struct.
    pub fn as_struct(&self, ty: TypeRef) -> Option<&StructType> {
        match &self.types[ty] {
            TypeData::Struct(st) => Some(st),
            _ => None,
        }
    }

    /// Return, params and vararg flag if `ty` is a function type.
    pub fn as_function(&self, ty: TypeRef) -> Option<(TypeRef, &[TypeRef], bool)> {
        match &self.types[ty] {
            TypeData::Function {
                ret,
                params,
                vararg,
            } => Some((*ret, params.as_slice(), *vararg)),
            _ => None,
        }
    }

    pub fn is_void(&self, ty: TypeRef) -> bool {
        matches!(self.types[ty], TypeData::Scalar(ScalarKind::Void))
    }

    /// Address space of a pointer or of the elements of a vector of pointers.
    pub fn pointer_addrspace(&self, ty: TypeRef) -> Option<u32> {
        match &self.types[ty] {
            TypeData::Pointer { addrspace } => Some(*addrspace),
            TypeData::Vector { elem, .. } => self.pointer_addrspace(*elem),
            _ => None,
        }
    }

    /// Structural equality: identified structs compare by body rather than
    /// by identity. Self-referential structs are handled by assuming pairs
    /// currently being compared are equal.
    pub fn structurally_eq(&self, a: TypeRef, b: TypeRef) -> bool {
        self.structurally_eq_in(a, b, &mut HashSet::new())
    }

    fn structurally_eq_in(
        &self,
        a: TypeRef,
        b: TypeRef,
        assumed: &mut HashSet<(TypeRef, TypeRef)>,
    ) -> bool {
        if a == b || !assumed.insert((a, b)) {
            return true;
        }
        match (&self.types[a], &self.types[b]) {
            (TypeData::Scalar(x), TypeData::Scalar(y)) => x == y,
            (TypeData::Pointer { addrspace: xa }, TypeData::Pointer { addrspace: xb }) => xa == xb,
            (
                TypeData::Function {
                    ret: ra,
                    params: pa,
                    vararg: va,
                },
                TypeData::Function {
                    ret: rb,
                    params: pb,
                    vararg: vb,
                },
            ) => {
                va == vb
                    && self.structurally_eq_in(*ra, *rb, assumed)
                    && self.all_structurally_eq(pa, pb, assumed)
            }
            (TypeData::Struct(x), TypeData::Struct(y)) => {
                x.literal == y.literal
                    && x.packed == y.packed
                    && x.body.is_some() == y.body.is_some()
                    && self.all_structurally_eq(x.fields(), y.fields(), assumed)
            }
            (TypeData::Array { elem: ea, len: la }, TypeData::Array { elem: eb, len: lb }) => {
                la == lb && self.structurally_eq_in(*ea, *eb, assumed)
            }
            (
                TypeData::Vector {
                    elem: ea,
                    len: la,
                    scalable: sa,
                },
                TypeData::Vector {
                    elem: eb,
                    len: lb,
                    scalable: sb,
                },
            ) => la == lb && sa == sb && self.structurally_eq_in(*ea, *eb, assumed),
            _ => false,
        }
    }

    fn all_structurally_eq(
        &self,
        xs: &[TypeRef],
        ys: &[TypeRef],
        assumed: &mut HashSet<(TypeRef, TypeRef)>,
    ) -> bool {
        xs.len() == ys.len()
            && xs
                .iter()
                .zip(ys)
                .all(|(&x, &y)| self.structurally_eq_in(x, y, assumed))
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interner_dedups_structural_types() {
        let mut types = TypeInterner::new();
        let i32_ty = types.int(32);
        assert_eq!(types.ptr(3), types.ptr(3));
        assert_ne!(types.ptr(3), types.ptr(0));
        assert_eq!(
            types.literal_struct([i32_ty, i32_ty], false),
            types.literal_struct([i32_ty, i32_ty], false)
        );
        assert_ne!(
            types.literal_struct([i32_ty], false),
            types.literal_struct([i32_ty], true)
        );
    }

    #[test]
    fn identified_structs_are_distinct() {
        let mut types = TypeInterner::new();
        let a = types.create_struct(Some(Symbol::new("Node")));
        let b = types.create_struct(Some(Symbol::new("Node")));
        assert_ne!(a, b);
        assert_eq!(types.as_struct(a).unwrap().name, Some(Symbol::new("Node")));
        assert_eq!(types.as_struct(b).unwrap().name, Some(Symbol::new("Node.0")));
        assert_eq!(types.named_struct(Symbol::new("Node")), Some(a));
    }

    #[test]
    fn renaming_frees_the_old_name() {
        let mut types = TypeInterner::new();
        let a = types.create_struct(Some(Symbol::new("Pair")));
        types.set_struct_name(a, Symbol::new("Pair.old"));
        let b = types.create_struct(Some(Symbol::new("Pair")));
        assert_eq!(types.as_struct(b).unwrap().name, Some(Symbol::new("Pair")));
        assert_eq!(types.named_struct(Symbol::new("Pair.old")), Some(a));
    }

    #[test]
    fn self_referential_struct() {
        let mut types = TypeInterner::new();
        let node = types.create_struct(Some(Symbol::new("List")));
        let void = types.void();
        let visit = types.function(void, [node], false);
        let i64_ty = types.int(64);
        types.set_struct_body(node, [i64_ty, visit], false);
        let st = types.as_struct(node).unwrap();
        assert!(!st.is_opaque());
        assert_eq!(st.fields(), &[i64_ty, visit]);
    }

    #[test]
    #[should_panic(expected = "not an opaque identified struct")]
    fn set_body_twice_panics() {
        let mut types = TypeInterner::new();
        let i8_ty = types.int(8);
        let st = types.create_struct(None);
        types.set_struct_body(st, [i8_ty], false);
        types.set_struct_body(st, [i8_ty], false);
    }

    #[test]
    fn vector_of_pointers_has_addrspace() {
        let mut types = TypeInterner::new();
        let p = types.ptr(7);
        let v = types.vector(p, 4, false);
        let i32_ty = types.int(32);
        assert_eq!(types.pointer_addrspace(v), Some(7));
        assert_eq!(types.pointer_addrspace(i32_ty), None);
    }

    #[test]
    fn structural_equality_ignores_struct_identity() {
        let mut types = TypeInterner::new();
        let i32_ty = types.int(32);
        let p0 = types.ptr(0);
        let p1 = types.ptr(1);
        let void = types.void();
        let a = types.create_struct(Some(Symbol::new("A")));
        let fa = types.function(void, [a, p0], false);
        types.set_struct_body(a, [i32_ty, fa], false);
        let b = types.create_struct(Some(Symbol::new("B")));
        let fb = types.function(void, [b, p0], false);
        types.set_struct_body(b, [i32_ty, fb], false);
        assert!(types.structurally_eq(a, b));

        let c = types.create_struct(None);
        let fc = types.function(void, [c, p1], false);
        types.set_struct_body(c, [i32_ty, fc], false);
        assert!(!types.structurally_eq(a, c));
    }
}
