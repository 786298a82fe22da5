//! Constant-expression materialization during address-space rewriting.

use flatspace_ir::printer::print_const;
use flatspace_ir::{
    CastOp, ConstKind, ConstOp, ConstRef, IrContext, ValueMapper, ValueMaterializer,
};
use smallvec::SmallVec;

/// Rebuilds constant expressions over remapped operands.
///
/// An address-space cast whose operand already lives in the destination
/// address space after remapping folds to the operand. Pointer-offset
/// expressions are declined and left to the mapper's structural rebuild.
#[derive(Clone, Copy, Debug, Default)]
pub struct AddrspaceMaterializer;

impl ValueMaterializer for AddrspaceMaterializer {
    fn materialize(
        &self,
        mapper: &mut ValueMapper<'_>,
        ctx: &mut IrContext,
        c: ConstRef,
    ) -> Option<ConstRef> {
        let data = ctx.constants.get(c).clone();
        let ConstKind::Expr(expr) = data.kind else {
            return None;
        };
        let ty = mapper.remap_type(&mut ctx.types, data.ty);

        let materialized = match expr.op {
            ConstOp::Cast(CastOp::AddrSpaceCast) => {
                let src = mapper.map_constant(ctx, expr.operands[0]);
                let src_ty = ctx.constants.ty(src);
                let src_addrspace = ctx.types.pointer_addrspace(src_ty);
                if src_addrspace.is_none() || src_addrspace != ctx.types.pointer_addrspace(ty) {
                    return None;
                }
                src
            }
            ConstOp::GetElementPtr { .. } => return None,
            ConstOp::Cast(_) | ConstOp::Binary(_) => {
                let operands: SmallVec<[ConstRef; 4]> = expr
                    .operands
                    .iter()
                    .map(|&op| mapper.map_constant(ctx, op))
                    .collect();
                ctx.constants.expr_with_operands(c, operands, ty)
            }
        };

        if materialized != c {
            tracing::debug!(
                "materializing constant {} -> {}",
                print_const(ctx, c),
                print_const(ctx, materialized)
            );
        }
        Some(materialized)
    }
}
