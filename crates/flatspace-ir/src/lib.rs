//! Flatspace IR crate.
//!
//! An arena-based typed SSA IR (`cranelift-entity`) with address-space aware
//! pointer types. It provides interned types, uniqued constants, metadata,
//! modules of globals, functions and aliases, function bodies with
//! use-chains and RAUW, and the mapping utilities needed to rebuild a module
//! with rewritten types.

// === Entities and storage ===
pub mod constants;
pub mod context;
pub mod global;
pub mod inst;
pub mod metadata;
pub mod module;
pub mod refs;
pub mod symbol;
pub mod types;

// === Construction and rewriting ===
pub mod builder;
pub mod cloning;
pub mod mangle;
pub mod mapper;

// === Inspection ===
pub mod printer;
pub mod validation;

pub use builder::FunctionBuilder;
pub use constants::{ConstData, ConstExpr, ConstKind, ConstOp, ConstantPool};
pub use context::{BlockData, InstBuilder, IrContext, Use, ValueData};
pub use global::{
    AliasData, Attribute, AttributeList, CallingConv, ComdatSelection, FunctionData, GlobalAttrs,
    GlobalData, GlobalKind, GlobalVarData, IntrinsicSig, Linkage, OverloadSlot, ThreadLocalMode,
    UnnamedAddr, Visibility,
};
pub use inst::{BinaryOp, CastOp, InstData, IntPredicate, Opcode};
pub use mapper::{TypeRemapper, ValueMap, ValueMapper, ValueMaterializer};
pub use metadata::{MdNode, MdOperand, MetadataArena};
pub use module::{Module, NamedMetadata};
pub use refs::{BlockRef, ConstRef, GlobalRef, InstRef, MdRef, TypeRef, ValueDef, ValueRef};
pub use symbol::Symbol;
pub use types::{ScalarKind, StructType, TypeData, TypeInterner};
pub use validation::{
    ValidationError, ValidationReport, assert_valid, validate_module,
};
