//! Whole-module address-space removal.
//!
//! The module is rebuilt in three phases:
//!
//! 1. **Declare**: every global variable, alias and function is renamed out
//!    of the way and a replacement with rewritten types takes its name. The
//!    value map records original → replacement, so every later reference
//!    can be resolved regardless of declaration order.
//! 2. **Define**: initializers, metadata, function bodies and aliasees are
//!    mapped onto the replacements through a [`ValueMapper`] driven by the
//!    [`AddrspaceTypeRemapper`] and [`AddrspaceMaterializer`]. The
//!    originals are stripped as they are copied.
//! 3. **Teardown**: the originals are erased, and intrinsics whose mangled
//!    names encode a changed signature are redirected to their canonical
//!    declarations.

use flatspace_ir::cloning::clone_function_body;
use flatspace_ir::mangle::remangle_intrinsic_function;
use flatspace_ir::{GlobalData, GlobalRef, IrContext, Module, ValueMap, ValueMapper};

use crate::materializer::AddrspaceMaterializer;
use crate::noop_casts::remove_noop_addrspace_casts;
use crate::policy::AddrspaceRemap;
use crate::type_remap::{AddrspaceTypeRemapper, STALE_SUFFIX};

/// Rewrite every type, constant, global, function and alias of `module` so
/// that pointers live in the address spaces chosen by `policy`.
///
/// Globals keep their names. Returns whether the module was changed, which
/// is always the case since every entity is rebuilt.
pub fn remove_addrspaces(
    ctx: &mut IrContext,
    module: &mut Module,
    policy: &dyn AddrspaceRemap,
) -> bool {
    let mut remapper = AddrspaceTypeRemapper::new(policy);
    let materializer = AddrspaceMaterializer;
    let mut vmap = ValueMap::default();
    let mut mapper = ValueMapper::new(&mut vmap)
        .with_types(&mut remapper)
        .with_materializer(&materializer);

    let globals: Vec<GlobalRef> = module.globals().to_vec();
    let aliases: Vec<GlobalRef> = module.aliases().to_vec();
    let functions: Vec<GlobalRef> = module.functions().to_vec();

    tracing::trace!(
        globals = globals.len(),
        aliases = aliases.len(),
        functions = functions.len(),
        "remove_addrspaces: declare"
    );
    for &gv in &globals {
        let value_ty = ctx.global_var(gv).value_ty;
        let value_ty = mapper.remap_type(&mut ctx.types, value_ty);
        let data = GlobalData::variable(ctx.global(gv).name, value_ty, 0);
        declare_replacement(ctx, module, &mut mapper, policy, gv, data);
    }
    for &ga in &aliases {
        let value_ty = ctx.alias(ga).value_ty;
        let value_ty = mapper.remap_type(&mut ctx.types, value_ty);
        let data = GlobalData::alias(ctx.global(ga).name, value_ty, 0, None);
        declare_replacement(ctx, module, &mut mapper, policy, ga, data);
    }
    for &f in &functions {
        let fn_ty = ctx.function(f).ty;
        let fn_ty = mapper.remap_type(&mut ctx.types, fn_ty);
        let data = GlobalData::function(ctx.global(f).name, fn_ty, 0);
        declare_replacement(ctx, module, &mut mapper, policy, f, data);
    }

    tracing::trace!("remove_addrspaces: define");
    for &gv in &globals {
        let new = mapper.vmap().globals[&gv];
        if let Some(init) = ctx.global_var(gv).initializer {
            let mapped = mapper.map_constant(ctx, init);
            ctx.global_var_mut(new).initializer = Some(mapped);
        }
        let attached = ctx.global_var(gv).metadata.clone();
        let mapped = attached
            .into_iter()
            .map(|(kind, md)| (kind, mapper.map_metadata(ctx, md)))
            .collect();
        ctx.global_var_mut(new).metadata = mapped;
        copy_comdat(ctx, module, new, gv);
        ctx.global_var_mut(gv).initializer = None;
    }

    for &f in &functions {
        let new = mapper.vmap().globals[&f];
        tracing::debug!("processing function {}", ctx.global(new).name);

        let old_args = ctx.function(f).args.clone();
        let new_args = ctx.function(new).args.clone();
        for (&old, &arg) in old_args.iter().zip(&new_args) {
            let name = ctx.value_name(old);
            ctx.set_value_name(arg, name);
            mapper.vmap().values.insert(old, arg);
        }

        clone_function_body(ctx, new, f, &mut mapper);

        // byval, sret and byref carry types.
        let attrs = ctx.function(f).attrs.clone();
        let attrs = attrs.map_types(|ty| mapper.remap_type(&mut ctx.types, ty));
        ctx.function_mut(new).attrs = attrs;

        copy_comdat(ctx, module, new, f);
        remove_noop_addrspace_casts(ctx, new);
        ctx.delete_body(f);
    }

    for &ga in &aliases {
        let new = mapper.vmap().globals[&ga];
        if let Some(aliasee) = ctx.alias(ga).aliasee {
            let mapped = mapper.map_constant(ctx, aliasee);
            ctx.alias_mut(new).aliasee = Some(mapped);
        }
        ctx.alias_mut(ga).aliasee = None;
    }

    for nmd in &mut module.named_metadata {
        for md in &mut nmd.operands {
            *md = mapper.map_metadata(ctx, *md);
        }
    }

    tracing::trace!("remove_addrspaces: teardown");
    for &g in globals.iter().chain(&aliases).chain(&functions) {
        module.erase(ctx, g);
    }

    let remaining: Vec<GlobalRef> = module.functions().to_vec();
    for f in remaining {
        if ctx.function(f).intrinsic.is_none() {
            continue;
        }
        if let Some(remangled) = remangle_intrinsic_function(ctx, module, f) {
            module.replace_all_uses_of_global(ctx, f, remangled);
            module.erase(ctx, f);
        }
    }

    true
}

/// Rename `old` with the stale suffix and add `data` under its name, with
/// the remapped address space and `old`'s type-free attributes.
fn declare_replacement(
    ctx: &mut IrContext,
    module: &mut Module,
    mapper: &mut ValueMapper<'_>,
    policy: &dyn AddrspaceRemap,
    old: GlobalRef,
    mut data: GlobalData,
) -> GlobalRef {
    let name = ctx.global(old).name;
    module.set_name(ctx, old, name.with_suffix(STALE_SUFFIX));

    data.addrspace = policy.remap(ctx.global(old).addrspace);
    data.copy_attributes_from(ctx.global(old));
    let new = module.add_global(ctx, data);
    debug_assert_eq!(ctx.global(new).name, name, "replacement must reclaim {name}");
    mapper.vmap().globals.insert(old, new);
    new
}

fn copy_comdat(ctx: &mut IrContext, module: &mut Module, dst: GlobalRef, src: GlobalRef) {
    let Some(comdat) = ctx.global(src).comdat else {
        return;
    };
    let selection = module.comdat_selection(comdat).unwrap_or_default();
    let comdat = module.get_or_insert_comdat(comdat, selection);
    ctx.global_mut(dst).comdat = Some(comdat);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::AddrspacePolicy;
    use flatspace_ir::{FunctionBuilder, Symbol, validate_module};

    #[test]
    fn mutually_referencing_globals() {
        let mut ctx = IrContext::new();
        let mut module = Module::new(Symbol::new("m"));
        let p3 = ctx.types.ptr(3);
        let a = module.add_global(&mut ctx, GlobalData::variable(Symbol::new("a"), p3, 3));
        let b = module.add_global(&mut ctx, GlobalData::variable(Symbol::new("b"), p3, 3));
        let a_c = ctx.global_const(a);
        let b_c = ctx.global_const(b);
        ctx.global_var_mut(a).initializer = Some(b_c);
        ctx.global_var_mut(b).initializer = Some(a_c);

        assert!(remove_addrspaces(
            &mut ctx,
            &mut module,
            &AddrspacePolicy::collapse_all()
        ));

        let new_a = module.get(Symbol::new("a")).expect("a survives");
        let new_b = module.get(Symbol::new("b")).expect("b survives");
        assert_eq!(module.globals(), &[new_a, new_b]);
        let p0 = ctx.types.ptr(0);
        assert_eq!(ctx.global_var(new_a).value_ty, p0);
        assert_eq!(ctx.global(new_a).addrspace, 0);
        let init = ctx.global_var(new_a).initializer.expect("initializer moved");
        assert_eq!(init, ctx.global_const(new_b));
        assert!(ctx.global(a).erased);
        assert!(module.get(Symbol::new("a.old")).is_none());
        assert!(validate_module(&ctx, &module).is_ok());
    }

    #[test]
    fn forward_call_between_functions() {
        let mut ctx = IrContext::new();
        let mut module = Module::new(Symbol::new("m"));
        let p1 = ctx.types.ptr(1);
        let void = ctx.types.void();
        let fn_ty = ctx.types.function(void, [p1], false);
        let caller =
            module.add_global(&mut ctx, GlobalData::function(Symbol::new("caller"), fn_ty, 0));
        let callee =
            module.add_global(&mut ctx, GlobalData::function(Symbol::new("callee"), fn_ty, 0));

        let mut b = FunctionBuilder::new(&mut ctx, caller);
        let entry = b.append_block(None);
        b.position_at_end(entry);
        let arg = b.arg(0);
        let callee_c = b.ctx().global_const(callee);
        let callee_v = b.const_value(callee_c);
        b.call(fn_ty, callee_v, [arg]);
        b.ret(None);

        remove_addrspaces(&mut ctx, &mut module, &AddrspacePolicy::collapse_all());

        let new_caller = module.get(Symbol::new("caller")).expect("caller survives");
        let new_callee = module.get(Symbol::new("callee")).expect("callee survives");
        let p0 = ctx.types.ptr(0);
        let fn0 = ctx.types.function(void, [p0], false);
        assert_eq!(ctx.function(new_caller).ty, fn0);
        assert_eq!(ctx.function(new_callee).ty, fn0);

        let insts = ctx.function_insts(new_caller);
        let call = insts[0];
        assert_eq!(ctx.inst(call).type_arg, Some(fn0));
        let callee_target = ctx.value_const(ctx.inst_operands(call)[0]);
        assert_eq!(callee_target, Some(ctx.global_const(new_callee)));
        assert_eq!(ctx.inst_operands(call)[1], ctx.function(new_caller).args[0]);
        assert!(ctx.function(caller).is_declaration());
        assert!(validate_module(&ctx, &module).is_ok());
    }
}
