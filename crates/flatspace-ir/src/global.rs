//! Global variables, functions and aliases.

use smallvec::SmallVec;

use crate::refs::{BlockRef, ConstRef, MdRef, TypeRef, ValueRef};
use crate::symbol::Symbol;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Linkage {
    #[default]
    External,
    AvailableExternally,
    LinkOnce,
    LinkOnceOdr,
    Weak,
    WeakOdr,
    Appending,
    Internal,
    Private,
    ExternWeak,
    Common,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ThreadLocalMode {
    #[default]
    NotThreadLocal,
    GeneralDynamic,
    LocalDynamic,
    InitialExec,
    LocalExec,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    #[default]
    Default,
    Hidden,
    Protected,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum UnnamedAddr {
    #[default]
    None,
    Local,
    Global,
}

/// How the linker picks among duplicate definitions in a comdat group.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ComdatSelection {
    #[default]
    Any,
    ExactMatch,
    Largest,
    NoDeduplicate,
    SameSize,
}

/// Attributes shared by every kind of global that carry no types.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GlobalAttrs {
    pub visibility: Visibility,
    pub unnamed_addr: UnnamedAddr,
    pub section: Option<Symbol>,
    pub alignment: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallingConv {
    #[default]
    C,
    Fast,
    Cold,
    Other(u32),
}

// ============================================================================
// Parameter attributes
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Attribute {
    /// Pass a copy of the pointee of the given type.
    ByVal(TypeRef),
    /// Pointer to the return value of the given type.
    StructRet(TypeRef),
    /// Pointer to a read-only value of the given type.
    ByRef(TypeRef),
    NoAlias,
    NoCapture,
    NonNull,
    ReadOnly,
    NoUnwind,
    ZExt,
    SExt,
    Align(u32),
    Dereferenceable(u64),
}

impl Attribute {
    /// The type carried by a type-valued attribute.
    pub fn type_arg(self) -> Option<TypeRef> {
        match self {
            Attribute::ByVal(ty) | Attribute::StructRet(ty) | Attribute::ByRef(ty) => Some(ty),
            _ => None,
        }
    }

    /// The same attribute kind carrying `ty` instead.
    pub fn with_type(self, ty: TypeRef) -> Self {
        match self {
            Attribute::ByVal(_) => Attribute::ByVal(ty),
            Attribute::StructRet(_) => Attribute::StructRet(ty),
            Attribute::ByRef(_) => Attribute::ByRef(ty),
            other => other,
        }
    }
}

pub type AttributeSet = SmallVec<[Attribute; 2]>;

/// Attributes of a function, its return value and each parameter.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeList {
    pub function: AttributeSet,
    pub ret: AttributeSet,
    pub params: Vec<AttributeSet>,
}

impl AttributeList {
    pub fn param(&self, index: usize) -> &[Attribute] {
        self.params.get(index).map(|set| set.as_slice()).unwrap_or(&[])
    }

    pub fn add_param(&mut self, index: usize, attr: Attribute) {
        if self.params.len() <= index {
            self.params.resize_with(index + 1, AttributeSet::new);
        }
        self.params[index].push(attr);
    }

    /// Every attribute set: function, return, then parameters in order.
    pub fn sets(&self) -> impl Iterator<Item = &AttributeSet> {
        [&self.function, &self.ret].into_iter().chain(&self.params)
    }

    /// Rewrite the type of every type-valued attribute.
    pub fn map_types(&self, mut f: impl FnMut(TypeRef) -> TypeRef) -> AttributeList {
        let mut map_set = |set: &AttributeSet| -> AttributeSet {
            set.iter()
                .map(|&attr| match attr.type_arg() {
                    Some(ty) => attr.with_type(f(ty)),
                    None => attr,
                })
                .collect()
        };
        AttributeList {
            function: map_set(&self.function),
            ret: map_set(&self.ret),
            params: self.params.iter().map(&mut map_set).collect(),
        }
    }
}

// ============================================================================
// Intrinsics
// ============================================================================

/// A position in a function signature whose type is part of the mangled name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OverloadSlot {
    Return,
    Param(u32),
}

/// Marks a function as a built-in whose name encodes parts of its signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IntrinsicSig {
    /// Name without type suffixes, e.g. `memcpy`.
    pub base: Symbol,
    pub overloads: SmallVec<[OverloadSlot; 3]>,
}

// ============================================================================
// Global entities
// ============================================================================

#[derive(Clone, Debug)]
pub struct GlobalVarData {
    pub value_ty: TypeRef,
    pub is_constant: bool,
    pub initializer: Option<ConstRef>,
    pub thread_local: ThreadLocalMode,
    pub externally_initialized: bool,
    /// Attached metadata by kind, e.g. `dbg`.
    pub metadata: Vec<(Symbol, MdRef)>,
}

#[derive(Clone, Debug)]
pub struct FunctionData {
    pub ty: TypeRef,
    pub args: Vec<ValueRef>,
    pub blocks: Vec<BlockRef>,
    pub attrs: AttributeList,
    pub cc: CallingConv,
    pub intrinsic: Option<IntrinsicSig>,
}

impl FunctionData {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct AliasData {
    pub value_ty: TypeRef,
    pub aliasee: Option<ConstRef>,
}

#[derive(Clone, Debug)]
pub enum GlobalKind {
    Variable(GlobalVarData),
    Function(FunctionData),
    Alias(AliasData),
}

/// Data for a single global entity.
#[derive(Clone, Debug)]
pub struct GlobalData {
    pub name: Symbol,
    pub linkage: Linkage,
    /// Address space of the pointer that refers to this global.
    pub addrspace: u32,
    pub comdat: Option<Symbol>,
    pub attrs: GlobalAttrs,
    pub kind: GlobalKind,
    /// Set once the global has been removed from its module.
    pub erased: bool,
}

impl GlobalData {
    /// An external, uninitialized global variable.
    pub fn variable(name: Symbol, value_ty: TypeRef, addrspace: u32) -> Self {
        Self::with_kind(
            name,
            addrspace,
            GlobalKind::Variable(GlobalVarData {
                value_ty,
                is_constant: false,
                initializer: None,
                thread_local: ThreadLocalMode::default(),
                externally_initialized: false,
                metadata: Vec::new(),
            }),
        )
    }

    /// An external function declaration of type `ty`.
    pub fn function(name: Symbol, ty: TypeRef, addrspace: u32) -> Self {
        Self::with_kind(
            name,
            addrspace,
            GlobalKind::Function(FunctionData {
                ty,
                args: Vec::new(),
                blocks: Vec::new(),
                attrs: AttributeList::default(),
                cc: CallingConv::default(),
                intrinsic: None,
            }),
        )
    }

    /// An alias of `value_ty`; the aliasee may be filled in later.
    pub fn alias(
        name: Symbol,
        value_ty: TypeRef,
        addrspace: u32,
        aliasee: Option<ConstRef>,
    ) -> Self {
        Self::with_kind(
            name,
            addrspace,
            GlobalKind::Alias(AliasData { value_ty, aliasee }),
        )
    }

    fn with_kind(name: Symbol, addrspace: u32, kind: GlobalKind) -> Self {
        Self {
            name,
            linkage: Linkage::default(),
            addrspace,
            comdat: None,
            attrs: GlobalAttrs::default(),
            kind,
            erased: false,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, GlobalKind::Function(_))
    }

    /// Copy the type-free attributes of `src` into `self`.
    pub fn copy_attributes_from(&mut self, src: &GlobalData) {
        self.linkage = src.linkage;
        self.attrs = src.attrs.clone();
        match (&mut self.kind, &src.kind) {
            (GlobalKind::Variable(dst), GlobalKind::Variable(src)) => {
                dst.is_constant = src.is_constant;
                dst.thread_local = src.thread_local;
                dst.externally_initialized = src.externally_initialized;
            }
            (GlobalKind::Function(dst), GlobalKind::Function(src)) => {
                dst.cc = src.cc;
                dst.intrinsic = src.intrinsic.clone();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeInterner;

    #[test]
    fn map_types_rewrites_only_typed_attributes() {
        let mut types = TypeInterner::new();
        let p1 = types.ptr(1);
        let i32_ty = types.int(32);
        let st = types.literal_struct([p1, i32_ty], false);
        let st0 = {
            let p0 = types.ptr(0);
            types.literal_struct([p0, i32_ty], false)
        };

        let mut attrs = AttributeList::default();
        attrs.add_param(1, Attribute::ByVal(st));
        attrs.add_param(1, Attribute::NonNull);
        attrs.ret.push(Attribute::NoAlias);

        let mapped = attrs.map_types(|ty| if ty == st { st0 } else { ty });
        assert!(mapped.param(0).is_empty());
        assert_eq!(mapped.param(1), &[Attribute::ByVal(st0), Attribute::NonNull]);
        assert_eq!(mapped.ret.as_slice(), &[Attribute::NoAlias]);
    }
}
