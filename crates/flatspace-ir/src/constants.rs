//! Uniqued constants.
//!
//! Constants are immutable and uniqued by `(type, kind)`, so rebuilding a
//! constant with unchanged parts yields the original `ConstRef`.

use std::collections::HashMap;

use cranelift_entity::PrimaryMap;
use smallvec::SmallVec;

use crate::inst::{BinaryOp, CastOp};
use crate::refs::{ConstRef, GlobalRef, TypeRef};

/// Operator of a constant expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstOp {
    Cast(CastOp),
    Binary(BinaryOp),
    /// Pointer offset: `[base, indices..]`.
    GetElementPtr { inbounds: bool },
}

/// An operator applied to constant operands.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstExpr {
    pub op: ConstOp,
    pub operands: SmallVec<[ConstRef; 4]>,
    /// Source element type of a `GetElementPtr`.
    pub source_ty: Option<TypeRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstKind {
    /// Integer bits, truncated to the type's width by the producer.
    Int(u64),
    /// IEEE bits of a floating point value.
    Float(u64),
    /// Null pointer.
    Null,
    Undef,
    Poison,
    /// All-zero value of any type.
    Zero,
    /// Address of a global variable, function or alias.
    Global(GlobalRef),
    /// Struct, array or vector built from element constants.
    Aggregate(SmallVec<[ConstRef; 4]>),
    Expr(ConstExpr),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConstData {
    pub ty: TypeRef,
    pub kind: ConstKind,
}

/// Uniquing constant pool.
pub struct ConstantPool {
    consts: PrimaryMap<ConstRef, ConstData>,
    dedup: HashMap<ConstData, ConstRef>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            consts: PrimaryMap::new(),
            dedup: HashMap::default(),
        }
    }

    /// Intern a constant, returning an existing ref if the data matches.
    pub fn intern(&mut self, data: ConstData) -> ConstRef {
        if let Some(&existing) = self.dedup.get(&data) {
            return existing;
        }
        let r = self.consts.push(data.clone());
        self.dedup.insert(data, r);
        r
    }

    pub fn get(&self, c: ConstRef) -> &ConstData {
        &self.consts[c]
    }

    pub fn ty(&self, c: ConstRef) -> TypeRef {
        self.consts[c].ty
    }

    /// Element constants of an aggregate, or operands of an expression.
    pub fn operands(&self, c: ConstRef) -> &[ConstRef] {
        match &self.consts[c].kind {
            ConstKind::Aggregate(elems) => elems,
            ConstKind::Expr(expr) => &expr.operands,
            _ => &[],
        }
    }

    pub fn int(&mut self, ty: TypeRef, value: u64) -> ConstRef {
        self.intern(ConstData {
            ty,
            kind: ConstKind::Int(value),
        })
    }

    pub fn float(&mut self, ty: TypeRef, value: f64) -> ConstRef {
        self.intern(ConstData {
            ty,
            kind: ConstKind::Float(value.to_bits()),
        })
    }

    pub fn null(&mut self, ty: TypeRef) -> ConstRef {
        self.intern(ConstData {
            ty,
            kind: ConstKind::Null,
        })
    }

    pub fn undef(&mut self, ty: TypeRef) -> ConstRef {
        self.intern(ConstData {
            ty,
            kind: ConstKind::Undef,
        })
    }

    pub fn zero(&mut self, ty: TypeRef) -> ConstRef {
        self.intern(ConstData {
            ty,
            kind: ConstKind::Zero,
        })
    }

    pub fn aggregate(
        &mut self,
        ty: TypeRef,
        elems: impl IntoIterator<Item = ConstRef>,
    ) -> ConstRef {
        self.intern(ConstData {
            ty,
            kind: ConstKind::Aggregate(elems.into_iter().collect()),
        })
    }

    pub fn cast(&mut self, op: CastOp, value: ConstRef, to: TypeRef) -> ConstRef {
        self.intern(ConstData {
            ty: to,
            kind: ConstKind::Expr(ConstExpr {
                op: ConstOp::Cast(op),
                operands: smallvec::smallvec![value],
                source_ty: None,
            }),
        })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: ConstRef, rhs: ConstRef) -> ConstRef {
        let ty = self.ty(lhs);
        self.intern(ConstData {
            ty,
            kind: ConstKind::Expr(ConstExpr {
                op: ConstOp::Binary(op),
                operands: smallvec::smallvec![lhs, rhs],
                source_ty: None,
            }),
        })
    }

    /// Pointer-offset expression; the result has the base's pointer type.
    pub fn gep(
        &mut self,
        source_ty: TypeRef,
        base: ConstRef,
        indices: impl IntoIterator<Item = ConstRef>,
        inbounds: bool,
    ) -> ConstRef {
        let ty = self.ty(base);
        let mut operands: SmallVec<[ConstRef; 4]> = smallvec::smallvec![base];
        operands.extend(indices);
        self.intern(ConstData {
            ty,
            kind: ConstKind::Expr(ConstExpr {
                op: ConstOp::GetElementPtr { inbounds },
                operands,
                source_ty: Some(source_ty),
            }),
        })
    }

    /// Rebuild expression `c` with the same operator over new operands and
    /// a new result type.
    ///
    /// # Panics
    ///
    /// Panics if `c` is not a constant expression.
    pub fn expr_with_operands(
        &mut self,
        c: ConstRef,
        operands: impl IntoIterator<Item = ConstRef>,
        ty: TypeRef,
    ) -> ConstRef {
        let expr = match &self.consts[c].kind {
            ConstKind::Expr(expr) => expr,
            other => panic!("expr_with_operands: {c} is not a constant expression: {other:?}"),
        };
        let rebuilt = ConstExpr {
            op: expr.op,
            operands: operands.into_iter().collect(),
            source_ty: expr.source_ty,
        };
        debug_assert_eq!(
            rebuilt.operands.len(),
            expr.operands.len(),
            "expr_with_operands: operand count mismatch for {c}"
        );
        self.intern(ConstData {
            ty,
            kind: ConstKind::Expr(rebuilt),
        })
    }
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}
