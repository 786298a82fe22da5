//! Instruction opcodes and instruction data.

use cranelift_entity::EntityList;
use smallvec::SmallVec;

use crate::refs::{BlockRef, TypeRef, ValueRef};

/// Two-operand integer arithmetic, shared by instructions and constant expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    And,
    Or,
    Xor,
    Shl,
    LShr,
    AShr,
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::UDiv => "udiv",
            BinaryOp::SDiv => "sdiv",
            BinaryOp::URem => "urem",
            BinaryOp::SRem => "srem",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Xor => "xor",
            BinaryOp::Shl => "shl",
            BinaryOp::LShr => "lshr",
            BinaryOp::AShr => "ashr",
        }
    }
}

/// Single-operand conversions, shared by instructions and constant expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CastOp {
    AddrSpaceCast,
    BitCast,
    PtrToInt,
    IntToPtr,
    Trunc,
    ZExt,
    SExt,
}

impl CastOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastOp::AddrSpaceCast => "addrspacecast",
            CastOp::BitCast => "bitcast",
            CastOp::PtrToInt => "ptrtoint",
            CastOp::IntToPtr => "inttoptr",
            CastOp::Trunc => "trunc",
            CastOp::ZExt => "zext",
            CastOp::SExt => "sext",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IntPredicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntPredicate::Eq => "eq",
            IntPredicate::Ne => "ne",
            IntPredicate::Ugt => "ugt",
            IntPredicate::Uge => "uge",
            IntPredicate::Ult => "ult",
            IntPredicate::Ule => "ule",
            IntPredicate::Sgt => "sgt",
            IntPredicate::Sge => "sge",
            IntPredicate::Slt => "slt",
            IntPredicate::Sle => "sle",
        }
    }
}

/// Instruction kinds.
///
/// Operand layout per opcode:
/// - `Alloca`: none; `type_arg` is the allocated type.
/// - `Load`: `[ptr]`; the result type is the loaded type.
/// - `Store`: `[value, ptr]`.
/// - `GetElementPtr`: `[base, indices..]`; `type_arg` is the source element type.
/// - `Cast`, `Ret` (optional): `[value]`.
/// - `Binary`, `ICmp`: `[lhs, rhs]`.
/// - `Select`: `[cond, then, else]`.
/// - `Phi`: incoming values, paired with `blocks` by index.
/// - `Call`: `[callee, args..]`; `type_arg` is the callee's function type.
/// - `Br`: no operands, `blocks = [dest]`.
/// - `CondBr`: `[cond]`, `blocks = [then, else]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    Alloca,
    Load,
    Store,
    GetElementPtr { inbounds: bool },
    Cast(CastOp),
    Binary(BinaryOp),
    ICmp(IntPredicate),
    Select,
    Phi,
    Call,
    Ret,
    Br,
    CondBr,
    Unreachable,
}

/// Data for a single instruction in the arena.
pub struct InstData {
    pub opcode: Opcode,
    pub operands: EntityList<ValueRef>,
    /// Result type; `void` for instructions that produce nothing.
    pub ty: TypeRef,
    /// Type immediate (allocated type, GEP source element type, callee type).
    pub type_arg: Option<TypeRef>,
    /// Branch targets, or the incoming blocks of a phi.
    pub blocks: SmallVec<[BlockRef; 2]>,
    /// The value produced by this instruction.
    pub result: ValueRef,
    pub parent: Option<BlockRef>,
}
