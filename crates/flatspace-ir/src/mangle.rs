//! Intrinsic name mangling.
//!
//! An overloaded intrinsic's name is its base name followed by one
//! `.<type>` suffix per overloaded signature slot, e.g.
//! `memcpy.p0.p1.i64`. Changing pointer address spaces changes those
//! suffixes, so rewritten intrinsics have to be renamed.

use std::fmt::{self, Write};

use crate::context::IrContext;
use crate::global::{GlobalData, IntrinsicSig, OverloadSlot};
use crate::module::Module;
use crate::refs::{GlobalRef, TypeRef};
use crate::symbol::Symbol;
use crate::types::{ScalarKind, TypeData, TypeInterner};

/// The mangled suffix for one type.
pub fn mangled_type_str(types: &TypeInterner, ty: TypeRef) -> String {
    let mut out = String::new();
    write_mangled(types, &mut out, ty).expect("fmt::Write to String never fails");
    out
}

fn write_mangled(types: &TypeInterner, f: &mut impl Write, ty: TypeRef) -> fmt::Result {
    match types.get(ty) {
        TypeData::Pointer { addrspace } => write!(f, "p{addrspace}")?,
        TypeData::Array { elem, len } => {
            write!(f, "a{len}")?;
            write_mangled(types, f, *elem)?;
        }
        TypeData::Vector {
            elem,
            len,
            scalable,
        } => {
            if *scalable {
                f.write_str("nx")?;
            }
            write!(f, "v{len}")?;
            write_mangled(types, f, *elem)?;
        }
        TypeData::Struct(st) => match st.name {
            Some(name) if !st.literal => {
                f.write_str("s_")?;
                name.with_str(|s| f.write_str(s))?;
            }
            _ => {
                f.write_str("sl_")?;
                for &field in st.fields() {
                    write_mangled(types, f, field)?;
                }
                f.write_char('s')?;
            }
        },
        TypeData::Function {
            ret,
            params,
            vararg,
        } => {
            f.write_str("f_")?;
            write_mangled(types, f, *ret)?;
            for &param in params {
                write_mangled(types, f, param)?;
            }
            if *vararg {
                f.write_str("vararg")?;
            }
            f.write_char('f')?;
        }
        TypeData::Scalar(kind) => match kind {
            ScalarKind::Void => f.write_str("isVoid")?,
            ScalarKind::Label => f.write_str("label")?,
            ScalarKind::Metadata => f.write_str("Metadata")?,
            ScalarKind::Token => f.write_str("token")?,
            ScalarKind::Int(bits) => write!(f, "i{bits}")?,
            ScalarKind::Half => f.write_str("f16")?,
            ScalarKind::Float => f.write_str("f32")?,
            ScalarKind::Double => f.write_str("f64")?,
        },
    }
    Ok(())
}

/// The canonical name of an intrinsic with signature `sig` and type `fn_ty`.
///
/// # Panics
///
/// Panics if `fn_ty` is not a function type or an overload slot names a
/// parameter that does not exist.
pub fn intrinsic_name(types: &TypeInterner, sig: &IntrinsicSig, fn_ty: TypeRef) -> Symbol {
    let Some((ret, params, _)) = types.as_function(fn_ty) else {
        panic!("intrinsic_name: {fn_ty} is not a function type");
    };
    let mut name = sig.base.with_str(str::to_owned);
    for slot in &sig.overloads {
        let ty = match *slot {
            OverloadSlot::Return => ret,
            OverloadSlot::Param(idx) => params[idx as usize],
        };
        name.push('.');
        write_mangled(types, &mut name, ty).expect("fmt::Write to String never fails");
    }
    Symbol::from_dynamic(&name)
}

/// Find or create the declaration an intrinsic function should be
/// replaced by once its signature no longer matches its name.
///
/// Returns `None` when the name is already canonical or `f` is not an
/// intrinsic. An existing function under the canonical name is reused if
/// it has the same type; otherwise it is renamed out of the way and a new
/// declaration is created. The caller redirects uses and erases `f`.
pub fn remangle_intrinsic_function(
    ctx: &mut IrContext,
    module: &mut Module,
    f: GlobalRef,
) -> Option<GlobalRef> {
    let sig = ctx.function(f).intrinsic.clone()?;
    let fn_ty = ctx.function(f).ty;
    let canonical = intrinsic_name(&ctx.types, &sig, fn_ty);
    if ctx.global(f).name == canonical {
        return None;
    }

    if let Some(existing) = module.get(canonical) {
        let same_type = ctx.global(existing).is_function() && ctx.function(existing).ty == fn_ty;
        if same_type {
            return Some(existing);
        }
        let stale = canonical.with_suffix(".old");
        module.set_name(ctx, existing, stale);
    }

    let mut decl = GlobalData::function(canonical, fn_ty, ctx.global(f).addrspace);
    decl.copy_attributes_from(ctx.global(f));
    let attrs = ctx.function(f).attrs.clone();
    let replacement = module.add_global(ctx, decl);
    ctx.function_mut(replacement).attrs = attrs;
    tracing::debug!(
        "remangled intrinsic {} -> {}",
        ctx.global(f).name,
        canonical
    );
    Some(replacement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn type_suffixes() {
        let mut types = TypeInterner::new();
        let i8_ty = types.int(8);
        let i32_ty = types.int(32);
        let float = types.scalar(ScalarKind::Float);
        let p1 = types.ptr(1);
        let vp = types.vector(p1, 4, false);
        let nxv = types.vector(float, 2, true);
        let arr = types.array(i32_ty, 3);
        let lit = types.literal_struct([i32_ty, p1], false);
        let named = types.create_struct(Some(Symbol::new("pair")));
        let void = types.void();
        let fty = types.function(void, [i32_ty], true);

        assert_eq!(mangled_type_str(&types, i8_ty), "i8");
        assert_eq!(mangled_type_str(&types, p1), "p1");
        assert_eq!(mangled_type_str(&types, vp), "v4p1");
        assert_eq!(mangled_type_str(&types, nxv), "nxv2f32");
        assert_eq!(mangled_type_str(&types, arr), "a3i32");
        assert_eq!(mangled_type_str(&types, lit), "sl_i32p1s");
        assert_eq!(mangled_type_str(&types, named), "s_pair");
        assert_eq!(mangled_type_str(&types, fty), "f_isVoidi32varargf");
    }

    #[test]
    fn name_follows_overload_slots() {
        let mut types = TypeInterner::new();
        let void = types.void();
        let p0 = types.ptr(0);
        let p3 = types.ptr(3);
        let i64_ty = types.int(64);
        let i1 = types.int(1);
        let fn_ty = types.function(void, [p0, p3, i64_ty, i1], false);
        let sig = IntrinsicSig {
            base: Symbol::new("memcpy"),
            overloads: smallvec![
                OverloadSlot::Param(0),
                OverloadSlot::Param(1),
                OverloadSlot::Param(2)
            ],
        };
        assert_eq!(intrinsic_name(&types, &sig, fn_ty), "memcpy.p0.p3.i64");
    }

    #[test]
    fn remangle_reuses_or_displaces_canonical_name() {
        let mut ctx = IrContext::new();
        let mut module = Module::new(Symbol::new("m"));
        let void = ctx.types.void();
        let p0 = ctx.types.ptr(0);
        let i32_ty = ctx.types.int(32);
        let fn_ty = ctx.types.function(void, [p0], false);
        let other_ty = ctx.types.function(i32_ty, [], false);
        let sig = IntrinsicSig {
            base: Symbol::new("prefetch"),
            overloads: smallvec![OverloadSlot::Param(0)],
        };

        let squatter = module.add_global(
            &mut ctx,
            GlobalData::function(Symbol::new("prefetch.p0"), other_ty, 0),
        );
        let stale = module.add_global(
            &mut ctx,
            GlobalData::function(Symbol::new("prefetch.p5"), fn_ty, 0),
        );
        ctx.function_mut(stale).intrinsic = Some(sig.clone());

        let replacement = remangle_intrinsic_function(&mut ctx, &mut module, stale)
            .expect("name is stale");
        assert_ne!(replacement, squatter);
        assert_eq!(ctx.global(replacement).name, "prefetch.p0");
        assert_eq!(ctx.global(squatter).name, "prefetch.p0.old");
        assert_eq!(ctx.function(replacement).intrinsic, Some(sig.clone()));

        // A second stale copy now finds the same-typed declaration.
        let again = module.add_global(
            &mut ctx,
            GlobalData::function(Symbol::new("prefetch.p7"), fn_ty, 0),
        );
        ctx.function_mut(again).intrinsic = Some(sig);
        assert_eq!(
            remangle_intrinsic_function(&mut ctx, &mut module, again),
            Some(replacement)
        );
        assert_eq!(remangle_intrinsic_function(&mut ctx, &mut module, replacement), None);
    }
}
