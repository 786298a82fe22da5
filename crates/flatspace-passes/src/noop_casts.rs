//! Removal of address-space casts that no longer change the address space.

use flatspace_ir::{GlobalRef, InstRef, IrContext};

/// Remove every address-space cast in `func` whose source and destination
/// address spaces are equal, redirecting its uses to the operand. Returns
/// whether any cast was removed.
pub fn remove_noop_addrspace_casts(ctx: &mut IrContext, func: GlobalRef) -> bool {
    let mut dead: Vec<InstRef> = Vec::new();
    let mut changed = false;

    for inst in ctx.function_insts(func) {
        if !ctx.is_addrspace_cast(inst) {
            continue;
        }
        // Read the operand now: an earlier removal may have rewired it.
        let operand = ctx.inst_operands(inst)[0];
        let src_addrspace = ctx.types.pointer_addrspace(ctx.value_ty(operand));
        let dst_addrspace = ctx.types.pointer_addrspace(ctx.inst(inst).ty);
        if src_addrspace.is_none() || src_addrspace != dst_addrspace {
            continue;
        }

        tracing::debug!("removing no-op address space cast {inst} in {func}");
        let result = ctx.inst_result(inst);
        ctx.replace_all_uses(result, operand);
        dead.push(inst);
        changed = true;
    }

    for inst in dead {
        ctx.remove_inst_from_block(inst);
        ctx.remove_inst(inst);
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatspace_ir::{FunctionBuilder, GlobalData, Module, Symbol};

    #[test]
    fn same_space_casts_are_removed() {
        let mut ctx = IrContext::new();
        let mut module = Module::new(Symbol::new("m"));
        let p5 = ctx.types.ptr(5);
        let p1 = ctx.types.ptr(1);
        let i32_ty = ctx.types.int(32);
        let fn_ty = ctx.types.function(i32_ty, [p5], false);
        let f = module.add_global(&mut ctx, GlobalData::function(Symbol::new("f"), fn_ty, 0));

        let mut b = FunctionBuilder::new(&mut ctx, f);
        let entry = b.append_block(Some(Symbol::new("entry")));
        b.position_at_end(entry);
        let arg = b.arg(0);
        let same = b.addrspace_cast(arg, 5);
        let chained = b.addrspace_cast(same, 5);
        let other = b.addrspace_cast(chained, 1);
        let loaded = b.load(i32_ty, chained);
        b.ret(Some(loaded));

        assert!(remove_noop_addrspace_casts(&mut ctx, f));

        let insts = ctx.function_insts(f);
        assert_eq!(insts.len(), 3);
        assert_eq!(ctx.inst_result(insts[0]), other);
        assert_eq!(ctx.inst_operands(insts[0]), &[arg]);
        assert_eq!(ctx.inst(insts[0]).ty, p1);
        assert_eq!(ctx.inst_operands(insts[1]), &[arg]);
        assert_eq!(ctx.uses(arg).len(), 2);

        assert!(!remove_noop_addrspace_casts(&mut ctx, f));
    }

    #[test]
    fn cast_feeding_a_load_is_erased() {
        let mut ctx = IrContext::new();
        let mut module = Module::new(Symbol::new("m"));
        let p5 = ctx.types.ptr(5);
        let i32_ty = ctx.types.int(32);
        let fn_ty = ctx.types.function(i32_ty, [p5], false);
        let f = module.add_global(&mut ctx, GlobalData::function(Symbol::new("f"), fn_ty, 0));

        let mut b = FunctionBuilder::new(&mut ctx, f);
        let entry = b.append_block(None);
        b.position_at_end(entry);
        let arg = b.arg(0);
        let cast = b.addrspace_cast(arg, 5);
        let loaded = b.load(i32_ty, cast);
        b.ret(Some(loaded));

        assert!(remove_noop_addrspace_casts(&mut ctx, f));
        let insts = ctx.function_insts(f);
        assert_eq!(insts.len(), 2);
        assert!(insts.iter().all(|&inst| !ctx.is_addrspace_cast(inst)));
        assert_eq!(ctx.inst_operands(insts[0]), &[arg]);
        assert!(!ctx.has_uses(cast));
    }

    #[test]
    fn vector_of_pointers_cast_is_erased() {
        let mut ctx = IrContext::new();
        let mut module = Module::new(Symbol::new("m"));
        let p2 = ctx.types.ptr(2);
        let v = ctx.types.vector(p2, 4, false);
        let fn_ty = ctx.types.function(v, [v], false);
        let f = module.add_global(&mut ctx, GlobalData::function(Symbol::new("f"), fn_ty, 0));

        let mut b = FunctionBuilder::new(&mut ctx, f);
        let entry = b.append_block(None);
        b.position_at_end(entry);
        let arg = b.arg(0);
        let cast = b.addrspace_cast(arg, 2);
        b.ret(Some(cast));

        assert!(remove_noop_addrspace_casts(&mut ctx, f));
        let insts = ctx.function_insts(f);
        assert_eq!(insts.len(), 1);
        assert_eq!(ctx.inst_operands(insts[0]), &[arg]);
    }
}
