//! Memoized type rewriting.
//!
//! `AddrspaceTypeRemapper` rebuilds a type with every pointer moved to the
//! address space chosen by a policy. Results are memoized by source type, so
//! repeated references share one destination type and self-referential
//! identified structs terminate: the placeholder for a struct is memoized
//! before its fields are visited.

use std::collections::HashMap;

use flatspace_ir::printer::print_type;
use flatspace_ir::{TypeData, TypeInterner, TypeRef, TypeRemapper};
use smallvec::SmallVec;

use crate::policy::AddrspaceRemap;

/// Suffix given to an identified struct whose name moves to its rewrite.
pub const STALE_SUFFIX: &str = ".old";

pub struct AddrspaceTypeRemapper<'p> {
    policy: &'p dyn AddrspaceRemap,
    mapped: HashMap<TypeRef, TypeRef>,
}

impl<'p> AddrspaceTypeRemapper<'p> {
    pub fn new(policy: &'p dyn AddrspaceRemap) -> Self {
        Self {
            policy,
            mapped: HashMap::new(),
        }
    }

    pub fn policy(&self) -> &'p dyn AddrspaceRemap {
        self.policy
    }

    /// Rewrite `src`, reusing earlier results.
    pub fn rewrite(&mut self, types: &mut TypeInterner, src: TypeRef) -> TypeRef {
        if let Some(&dst) = self.mapped.get(&src) {
            return dst;
        }

        let dst = match types.get(src).clone() {
            TypeData::Pointer { addrspace } => types.ptr(self.policy.remap(addrspace)),
            TypeData::Function {
                ret,
                params,
                vararg,
            } => {
                let params: SmallVec<[TypeRef; 4]> =
                    params.iter().map(|&p| self.rewrite(types, p)).collect();
                let ret = self.rewrite(types, ret);
                types.function(ret, params, vararg)
            }
            TypeData::Struct(st) if st.literal => {
                let fields: SmallVec<[TypeRef; 4]> = st
                    .fields()
                    .iter()
                    .map(|&f| self.rewrite(types, f))
                    .collect();
                types.literal_struct(fields, st.packed)
            }
            TypeData::Struct(st) if st.is_opaque() => src,
            TypeData::Struct(st) => {
                // Fields may point back at this struct; they resolve to the
                // placeholder through the memo.
                let placeholder = types.create_struct(None);
                if let Some(name) = st.name {
                    types.set_struct_name(src, name.with_suffix(STALE_SUFFIX));
                    types.set_struct_name(placeholder, name);
                }
                self.mapped.insert(src, placeholder);

                let fields: SmallVec<[TypeRef; 4]> = st
                    .fields()
                    .iter()
                    .map(|&f| self.rewrite(types, f))
                    .collect();
                types.set_struct_body(placeholder, fields, st.packed);
                placeholder
            }
            TypeData::Array { elem, len } => {
                let elem = self.rewrite(types, elem);
                types.array(elem, len)
            }
            TypeData::Vector {
                elem,
                len,
                scalable,
            } => {
                let elem = self.rewrite(types, elem);
                types.vector(elem, len, scalable)
            }
            TypeData::Scalar(_) => src,
        };

        if dst != src {
            tracing::debug!(
                "remapping type {} -> {}",
                print_type(types, src),
                print_type(types, dst)
            );
        }
        self.mapped.insert(src, dst);
        dst
    }
}

impl TypeRemapper for AddrspaceTypeRemapper<'_> {
    fn remap_type(&mut self, types: &mut TypeInterner, ty: TypeRef) -> TypeRef {
        self.rewrite(types, ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::AddrspacePolicy;
    use flatspace_ir::Symbol;

    #[test]
    fn nested_pointers_are_remapped() {
        let mut types = TypeInterner::new();
        let policy = AddrspacePolicy::collapse_all();
        let mut remapper = AddrspaceTypeRemapper::new(&policy);

        let i32_ty = types.int(32);
        let p3 = types.ptr(3);
        let p0 = types.ptr(0);
        let arr = types.array(p3, 4);
        let vec = types.vector(p3, 2, true);
        let lit = types.literal_struct([i32_ty, arr], true);
        let fn_ty = types.function(p3, [lit, vec], true);

        let out = remapper.rewrite(&mut types, fn_ty);
        let arr0 = types.array(p0, 4);
        let vec0 = types.vector(p0, 2, true);
        let lit0 = types.literal_struct([i32_ty, arr0], true);
        let expected = types.function(p0, [lit0, vec0], true);
        assert_eq!(out, expected);
    }

    #[test]
    fn self_referential_struct_terminates() {
        let mut types = TypeInterner::new();
        let policy = AddrspacePolicy::collapse_all();
        let mut remapper = AddrspaceTypeRemapper::new(&policy);

        // %list = type { i64, ptr addrspace(1), void (%list) }
        let i64_ty = types.int(64);
        let p1 = types.ptr(1);
        let void = types.void();
        let node = types.create_struct(Some(Symbol::new("list")));
        let visit = types.function(void, [node], false);
        types.set_struct_body(node, [i64_ty, p1, visit], false);

        let out = remapper.rewrite(&mut types, node);
        assert_ne!(out, node);
        let st = types.as_struct(out).expect("rewritten struct").clone();
        assert_eq!(st.name, Some(Symbol::new("list")));
        assert_eq!(st.fields()[0], i64_ty);
        assert_eq!(st.fields()[1], types.ptr(0));
        assert_eq!(st.fields()[2], types.function(void, [out], false));

        // The source keeps its body under a stale name.
        assert_eq!(
            types.as_struct(node).and_then(|s| s.name),
            Some(Symbol::new("list.old"))
        );
        assert_eq!(types.named_struct(Symbol::new("list")), Some(out));

        // Memoized: the same source gives the same placeholder.
        assert_eq!(remapper.rewrite(&mut types, node), out);
    }

    #[test]
    fn opaque_and_anonymous_identified_structs() {
        let mut types = TypeInterner::new();
        let policy = AddrspacePolicy::collapse_all();
        let mut remapper = AddrspaceTypeRemapper::new(&policy);

        let opaque = types.create_struct(Some(Symbol::new("handle")));
        assert_eq!(remapper.rewrite(&mut types, opaque), opaque);
        assert_eq!(
            types.as_struct(opaque).and_then(|s| s.name),
            Some(Symbol::new("handle"))
        );

        let p4 = types.ptr(4);
        let anon = types.create_struct(None);
        types.set_struct_body(anon, [p4], true);
        let out = remapper.rewrite(&mut types, anon);
        let st = types.as_struct(out).expect("rewritten struct");
        assert_eq!(st.name, None);
        assert!(st.packed);
        assert!(!st.literal);
    }

    #[test]
    fn reserved_policy_keeps_other_spaces() {
        let mut types = TypeInterner::new();
        let policy = AddrspacePolicy::collapse_reserved(1, 3);
        let mut remapper = AddrspaceTypeRemapper::new(&policy);

        let p2 = types.ptr(2);
        let p7 = types.ptr(7);
        let p0 = types.ptr(0);
        assert_eq!(remapper.rewrite(&mut types, p2), p0);
        assert_eq!(remapper.rewrite(&mut types, p7), p7);
    }

    mod proptests {
        use super::*;
        use flatspace_ir::ScalarKind;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Shape {
            Int(u32),
            Double,
            Ptr(u32),
            Array(Box<Shape>, u64),
            Vector(Box<Shape>, u32),
            Struct(Vec<Shape>),
            Func(Box<Shape>, Vec<Shape>),
            /// Identified struct; `self_ref` appends a `void (%self)` field.
            Named { fields: Vec<Shape>, self_ref: bool },
        }

        fn build(types: &mut TypeInterner, shape: &Shape) -> TypeRef {
            match shape {
                Shape::Int(bits) => types.int(*bits),
                Shape::Double => types.scalar(ScalarKind::Double),
                Shape::Ptr(addrspace) => types.ptr(*addrspace),
                Shape::Array(elem, len) => {
                    let elem = build(types, elem);
                    types.array(elem, *len)
                }
                Shape::Vector(elem, len) => {
                    let elem = build(types, elem);
                    types.vector(elem, *len, false)
                }
                Shape::Struct(fields) => {
                    let fields: Vec<_> = fields.iter().map(|f| build(types, f)).collect();
                    types.literal_struct(fields, false)
                }
                Shape::Func(ret, params) => {
                    let ret = build(types, ret);
                    let params: Vec<_> = params.iter().map(|p| build(types, p)).collect();
                    types.function(ret, params, false)
                }
                Shape::Named { fields, self_ref } => {
                    let st = types.create_struct(Some(Symbol::new("node")));
                    let mut body: Vec<_> = fields.iter().map(|f| build(types, f)).collect();
                    if *self_ref {
                        let void = types.void();
                        body.push(types.function(void, [st], false));
                    }
                    types.set_struct_body(st, body, false);
                    st
                }
            }
        }

        fn only_generic_pointers(
            types: &TypeInterner,
            ty: TypeRef,
            seen: &mut std::collections::HashSet<TypeRef>,
        ) -> bool {
            if !seen.insert(ty) {
                return true;
            }
            match types.get(ty).clone() {
                TypeData::Pointer { addrspace } => addrspace == 0,
                TypeData::Function { ret, params, .. } => {
                    only_generic_pointers(types, ret, seen)
                        && params.iter().all(|&p| only_generic_pointers(types, p, seen))
                }
                TypeData::Struct(st) => st
                    .fields()
                    .iter()
                    .all(|&f| only_generic_pointers(types, f, seen)),
                TypeData::Array { elem, .. } | TypeData::Vector { elem, .. } => {
                    only_generic_pointers(types, elem, seen)
                }
                TypeData::Scalar(_) => true,
            }
        }

        fn arb_shape(with_pointers: bool) -> impl Strategy<Value = Shape> {
            let leaf = if with_pointers {
                prop_oneof![
                    (1u32..=64).prop_map(Shape::Int),
                    Just(Shape::Double),
                    (0u32..12).prop_map(Shape::Ptr),
                ]
                .boxed()
            } else {
                prop_oneof![(1u32..=64).prop_map(Shape::Int), Just(Shape::Double)].boxed()
            };
            leaf.prop_recursive(4, 32, 4, |inner| {
                prop_oneof![
                    (prop::collection::vec(inner.clone(), 0..3), any::<bool>())
                        .prop_map(|(fields, self_ref)| Shape::Named { fields, self_ref }),
                    (inner.clone(), 0u64..8).prop_map(|(e, n)| Shape::Array(Box::new(e), n)),
                    (inner.clone(), 1u32..8).prop_map(|(e, n)| Shape::Vector(Box::new(e), n)),
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Shape::Struct),
                    (inner.clone(), prop::collection::vec(inner, 0..3))
                        .prop_map(|(r, ps)| Shape::Func(Box::new(r), ps)),
                ]
            })
        }

        proptest! {
            /// A pointer's address space is the policy applied to it.
            #[test]
            fn pointer_addrspace_follows_policy(addrspace in 0u32..16, first in 0u32..8, len in 0u32..8) {
                let mut types = TypeInterner::new();
                let policy = AddrspacePolicy::collapse_reserved(first, first + len);
                let mut remapper = AddrspaceTypeRemapper::new(&policy);
                let ptr = types.ptr(addrspace);
                let out = remapper.rewrite(&mut types, ptr);
                prop_assert_eq!(types.pointer_addrspace(out), Some(policy.remap(addrspace)));
            }

            /// Types without pointers come back structurally unchanged;
            /// identified structs are rebuilt but keep their shape.
            #[test]
            fn pointer_free_types_are_unchanged(shape in arb_shape(false)) {
                let mut types = TypeInterner::new();
                let ty = build(&mut types, &shape);
                let policy = AddrspacePolicy::collapse_all();
                let mut remapper = AddrspaceTypeRemapper::new(&policy);
                let out = remapper.rewrite(&mut types, ty);
                prop_assert!(types.structurally_eq(out, ty));
            }

            /// Collapsing everything twice is the same as collapsing once.
            #[test]
            fn collapse_all_is_idempotent(shape in arb_shape(true)) {
                let mut types = TypeInterner::new();
                let ty = build(&mut types, &shape);
                let policy = AddrspacePolicy::collapse_all();
                let once = AddrspaceTypeRemapper::new(&policy).rewrite(&mut types, ty);
                let twice = AddrspaceTypeRemapper::new(&policy).rewrite(&mut types, once);
                prop_assert!(types.structurally_eq(once, twice));
            }

            /// Pointers reachable from the result all sit in the generic space.
            #[test]
            fn collapse_all_leaves_no_other_addrspace(shape in arb_shape(true)) {
                let mut types = TypeInterner::new();
                let ty = build(&mut types, &shape);
                let policy = AddrspacePolicy::collapse_all();
                let out = AddrspaceTypeRemapper::new(&policy).rewrite(&mut types, ty);
                let mut seen = std::collections::HashSet::new();
                prop_assert!(only_generic_pointers(&types, out, &mut seen));
            }
        }
    }
}
