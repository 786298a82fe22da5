//! Generic value mapping.
//!
//! A `ValueMapper` rewrites references according to a `ValueMap`, optionally
//! rewriting types through a `TypeRemapper` and letting a `ValueMaterializer`
//! build replacements for constant expressions on demand. Results are cached
//! in the map, so each constant and metadata node is visited once per map.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::constants::{ConstData, ConstExpr, ConstKind};
use crate::context::IrContext;
use crate::metadata::MdOperand;
use crate::refs::*;
use crate::types::TypeInterner;

/// Old entity to replacement entity, per entity kind.
#[derive(Default, Debug)]
pub struct ValueMap {
    pub globals: HashMap<GlobalRef, GlobalRef>,
    /// Arguments and instruction results.
    pub values: HashMap<ValueRef, ValueRef>,
    pub blocks: HashMap<BlockRef, BlockRef>,
    pub constants: HashMap<ConstRef, ConstRef>,
    pub metadata: HashMap<MdRef, MdRef>,
}

/// Rewrites types while values are mapped.
pub trait TypeRemapper {
    fn remap_type(&mut self, types: &mut TypeInterner, ty: TypeRef) -> TypeRef;
}

/// Builds the replacement of a constant expression on demand.
///
/// Returning `None` declines, and the mapper falls back to a structural
/// rebuild of the expression.
pub trait ValueMaterializer {
    fn materialize(
        &self,
        mapper: &mut ValueMapper<'_>,
        ctx: &mut IrContext,
        c: ConstRef,
    ) -> Option<ConstRef>;
}

pub struct ValueMapper<'a> {
    vmap: &'a mut ValueMap,
    types: Option<&'a mut dyn TypeRemapper>,
    materializer: Option<&'a dyn ValueMaterializer>,
    reuse_distinct: bool,
}

impl<'a> ValueMapper<'a> {
    pub fn new(vmap: &'a mut ValueMap) -> Self {
        Self {
            vmap,
            types: None,
            materializer: None,
            reuse_distinct: false,
        }
    }

    pub fn with_types(mut self, types: &'a mut dyn TypeRemapper) -> Self {
        self.types = Some(types);
        self
    }

    pub fn with_materializer(mut self, materializer: &'a dyn ValueMaterializer) -> Self {
        self.materializer = Some(materializer);
        self
    }

    /// Mutate distinct metadata nodes in place instead of cloning them.
    pub fn reuse_distinct_metadata(mut self) -> Self {
        self.reuse_distinct = true;
        self
    }

    pub fn vmap(&mut self) -> &mut ValueMap {
        self.vmap
    }

    pub fn remap_type(&mut self, types: &mut TypeInterner, ty: TypeRef) -> TypeRef {
        match self.types.as_deref_mut() {
            Some(remapper) => remapper.remap_type(types, ty),
            None => ty,
        }
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Map an operand value. Locals without an entry are left unchanged.
    pub fn map_value(&mut self, ctx: &mut IrContext, v: ValueRef) -> ValueRef {
        if let Some(&mapped) = self.vmap.values.get(&v) {
            return mapped;
        }
        match ctx.value_def(v) {
            ValueDef::Const(c) => {
                let mapped = self.map_constant(ctx, c);
                if mapped == c {
                    v
                } else {
                    ctx.const_value(mapped)
                }
            }
            ValueDef::Inst(_) | ValueDef::Arg(..) => v,
        }
    }

    pub fn map_constant(&mut self, ctx: &mut IrContext, c: ConstRef) -> ConstRef {
        if let Some(&mapped) = self.vmap.constants.get(&c) {
            return mapped;
        }
        let data = ctx.constants.get(c).clone();
        let mapped = match data.kind {
            ConstKind::Global(g) => match self.vmap.globals.get(&g) {
                Some(&new) => ctx.global_const(new),
                None => c,
            },
            ConstKind::Expr(expr) => {
                let materialized = match self.materializer {
                    Some(materializer) => materializer.materialize(self, ctx, c),
                    None => None,
                };
                match materialized {
                    Some(m) => m,
                    None => self.rebuild_expr(ctx, c, data.ty, expr),
                }
            }
            ConstKind::Aggregate(elems) => {
                let ty = self.remap_type(&mut ctx.types, data.ty);
                let mapped: SmallVec<[ConstRef; 4]> =
                    elems.iter().map(|&e| self.map_constant(ctx, e)).collect();
                if ty == data.ty && mapped == elems {
                    c
                } else {
                    ctx.constants.intern(ConstData {
                        ty,
                        kind: ConstKind::Aggregate(mapped),
                    })
                }
            }
            kind @ (ConstKind::Int(_)
            | ConstKind::Float(_)
            | ConstKind::Null
            | ConstKind::Undef
            | ConstKind::Poison
            | ConstKind::Zero) => {
                let ty = self.remap_type(&mut ctx.types, data.ty);
                if ty == data.ty {
                    c
                } else {
                    ctx.constants.intern(ConstData { ty, kind })
                }
            }
        };
        self.vmap.constants.insert(c, mapped);
        mapped
    }

    /// Rebuild an expression over mapped operands with remapped types.
    fn rebuild_expr(
        &mut self,
        ctx: &mut IrContext,
        c: ConstRef,
        ty: TypeRef,
        expr: ConstExpr,
    ) -> ConstRef {
        let new_ty = self.remap_type(&mut ctx.types, ty);
        let source_ty = expr
            .source_ty
            .map(|source| self.remap_type(&mut ctx.types, source));
        let operands: SmallVec<[ConstRef; 4]> = expr
            .operands
            .iter()
            .map(|&op| self.map_constant(ctx, op))
            .collect();
        if new_ty == ty && source_ty == expr.source_ty && operands == expr.operands {
            return c;
        }
        ctx.constants.intern(ConstData {
            ty: new_ty,
            kind: ConstKind::Expr(ConstExpr {
                op: expr.op,
                operands,
                source_ty,
            }),
        })
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Map a metadata node.
    ///
    /// Uniqued nodes are rebuilt only if an operand changed. Distinct nodes
    /// are cloned, or updated in place with `reuse_distinct_metadata`; the
    /// target is recorded before the operands are visited so cycles through
    /// distinct nodes terminate.
    pub fn map_metadata(&mut self, ctx: &mut IrContext, md: MdRef) -> MdRef {
        if let Some(&mapped) = self.vmap.metadata.get(&md) {
            return mapped;
        }
        let node = ctx.metadata.get(md).clone();
        if node.distinct {
            let target = if self.reuse_distinct {
                md
            } else {
                ctx.metadata.distinct(Vec::new())
            };
            self.vmap.metadata.insert(md, target);
            let operands = self.map_md_operands(ctx, &node.operands);
            ctx.metadata.set_operands(target, operands);
            target
        } else {
            let operands = self.map_md_operands(ctx, &node.operands);
            let mapped = if operands == node.operands {
                md
            } else {
                ctx.metadata.node(operands)
            };
            self.vmap.metadata.insert(md, mapped);
            mapped
        }
    }

    fn map_md_operands(&mut self, ctx: &mut IrContext, operands: &[MdOperand]) -> Vec<MdOperand> {
        operands
            .iter()
            .map(|op| match op {
                MdOperand::Node(n) => MdOperand::Node(self.map_metadata(ctx, *n)),
                MdOperand::Value(c) => MdOperand::Value(self.map_constant(ctx, *c)),
                MdOperand::String(s) => MdOperand::String(s.clone()),
            })
            .collect()
    }

    // ========================================================================
    // Instructions
    // ========================================================================

    /// Remap the operands and block references of an instruction in place.
    pub fn remap_instruction(&mut self, ctx: &mut IrContext, inst: InstRef) {
        let operands: SmallVec<[ValueRef; 8]> = ctx.inst_operands(inst).into();
        for (idx, &v) in operands.iter().enumerate() {
            let mapped = self.map_value(ctx, v);
            ctx.set_operand(inst, idx, mapped);
        }
        let blocks = ctx.inst(inst).blocks.clone();
        let mapped: SmallVec<[BlockRef; 2]> = blocks
            .iter()
            .map(|b| self.vmap.blocks.get(b).copied().unwrap_or(*b))
            .collect();
        if mapped != blocks {
            ctx.set_inst_blocks(inst, mapped);
        }
    }
}
