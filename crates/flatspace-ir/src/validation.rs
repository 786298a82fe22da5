//! Structural validation of a module.
//!
//! Checks the invariants passes rely on and may break while rebuilding a
//! module:
//!
//! 1. **Symbol table**: every listed global is live and is what its name
//!    resolves to.
//! 2. **Global references**: constants only reference live globals of this
//!    module, and a global's address has the pointer type of its address
//!    space.
//! 3. **Signatures**: argument values have the types of the function's
//!    parameters.
//! 4. **Scope**: instruction operands are constants or values defined in
//!    the same function.
//! 5. **Use-chains**: the use-chain of every operand records exactly the
//!    operand slots that refer to it.

use std::collections::HashSet;
use std::fmt;

use crate::constants::ConstKind;
use crate::context::{IrContext, Use};
use crate::metadata::MdOperand;
use crate::module::Module;
use crate::refs::*;
use crate::symbol::Symbol;
use crate::types::TypeData;

// ============================================================================
// Error types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ValidationError {
    #[display("@{name} resolves to {found:?} instead of {global}")]
    SymbolMismatch {
        name: Symbol,
        global: GlobalRef,
        found: Option<GlobalRef>,
    },
    #[display("{global} is listed in the module but has been erased")]
    ErasedInModule { global: GlobalRef },
    #[display("{context} references {global}, which is erased or not in the module")]
    DanglingGlobal { context: String, global: GlobalRef },
    #[display("{constant} addresses {global} with type {ty}, expected a pointer into addrspace({addrspace})")]
    GlobalAddressType {
        constant: ConstRef,
        global: GlobalRef,
        ty: TypeRef,
        addrspace: u32,
    },
    #[display("argument #{index} of @{function} has type {found}, signature says {expected}")]
    ArgumentType {
        function: Symbol,
        index: usize,
        found: TypeRef,
        expected: TypeRef,
    },
    #[display("operand #{index} of {inst} in @{function} uses {value} defined outside the function")]
    OutOfScope {
        function: Symbol,
        inst: InstRef,
        index: usize,
        value: ValueRef,
    },
    #[display("use-chain of {value}: {message}")]
    UseChain { value: ValueRef, message: String },
}

/// Result of validation.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "validation passed");
        }
        writeln!(f, "{} error(s) found:", self.errors.len())?;
        for err in &self.errors {
            writeln!(f, "  - {}", err)?;
        }
        Ok(())
    }
}

// ============================================================================
// Validation
// ============================================================================

struct Validator<'a> {
    ctx: &'a IrContext,
    live: HashSet<GlobalRef>,
    visited_consts: HashSet<ConstRef>,
    visited_md: HashSet<MdRef>,
    errors: Vec<ValidationError>,
}

impl Validator<'_> {
    fn check_const(&mut self, context: &dyn Fn() -> String, c: ConstRef) {
        if !self.visited_consts.insert(c) {
            return;
        }
        let ctx = self.ctx;
        let data = ctx.constants.get(c);
        match &data.kind {
            ConstKind::Global(g) => {
                if !self.live.contains(g) {
                    self.errors.push(ValidationError::DanglingGlobal {
                        context: context(),
                        global: *g,
                    });
                }
                let addrspace = ctx.global(*g).addrspace;
                let ok = matches!(
                    ctx.types.get(data.ty),
                    TypeData::Pointer { addrspace: a } if *a == addrspace
                );
                if !ok {
                    self.errors.push(ValidationError::GlobalAddressType {
                        constant: c,
                        global: *g,
                        ty: data.ty,
                        addrspace,
                    });
                }
            }
            ConstKind::Aggregate(_) | ConstKind::Expr(_) => {
                for &op in ctx.constants.operands(c) {
                    self.check_const(context, op);
                }
            }
            _ => {}
        }
    }

    fn check_md(&mut self, context: &dyn Fn() -> String, md: MdRef) {
        if !self.visited_md.insert(md) {
            return;
        }
        let ctx = self.ctx;
        for op in &ctx.metadata.get(md).operands {
            match op {
                MdOperand::Node(n) => self.check_md(context, *n),
                MdOperand::Value(c) => self.check_const(context, *c),
                MdOperand::String(_) => {}
            }
        }
    }

    fn check_function(&mut self, func: GlobalRef) {
        let ctx = self.ctx;
        let name = ctx.global(func).name;
        let fdata = ctx.function(func);
        if let Some((_, params, _)) = ctx.types.as_function(fdata.ty) {
            for (index, (&arg, &expected)) in fdata.args.iter().zip(params).enumerate() {
                let found = ctx.value_ty(arg);
                if found != expected {
                    self.errors.push(ValidationError::ArgumentType {
                        function: name,
                        index,
                        found,
                        expected,
                    });
                }
            }
        }

        for inst in ctx.function_insts(func) {
            for (index, &v) in ctx.inst_operands(inst).iter().enumerate() {
                match ctx.value_def(v) {
                    ValueDef::Const(c) => {
                        self.check_const(&|| format!("{inst} in @{name}"), c);
                    }
                    ValueDef::Inst(_) | ValueDef::Arg(..) => {
                        if ctx.value_function(v) != Some(func) {
                            self.errors.push(ValidationError::OutOfScope {
                                function: name,
                                inst,
                                index,
                                value: v,
                            });
                        }
                    }
                }
                let expected = Use {
                    user: inst,
                    operand_index: index as u32,
                };
                if !ctx.uses(v).contains(&expected) {
                    self.errors.push(ValidationError::UseChain {
                        value: v,
                        message: format!("missing use by operand #{index} of {inst}"),
                    });
                }
            }
            let result = ctx.inst_result(inst);
            self.check_uses(result);
        }
        for &arg in &fdata.args {
            self.check_uses(arg);
        }
    }

    /// Every recorded use must point at a live operand slot holding `v`.
    fn check_uses(&mut self, v: ValueRef) {
        let ctx = self.ctx;
        for u in ctx.uses(v) {
            let operands = ctx.inst_operands(u.user);
            let holds = operands.get(u.operand_index as usize) == Some(&v);
            if !holds {
                self.errors.push(ValidationError::UseChain {
                    value: v,
                    message: format!(
                        "stale use by operand #{} of {}",
                        u.operand_index, u.user
                    ),
                });
            } else if ctx.inst(u.user).parent.is_none() {
                self.errors.push(ValidationError::UseChain {
                    value: v,
                    message: format!("use by detached instruction {}", u.user),
                });
            }
        }
    }
}

/// Validate a module, collecting every error found.
pub fn validate_module(ctx: &IrContext, module: &Module) -> ValidationReport {
    let all: Vec<GlobalRef> = module
        .globals()
        .iter()
        .chain(module.functions())
        .chain(module.aliases())
        .copied()
        .collect();
    let mut v = Validator {
        ctx,
        live: all.iter().copied().filter(|&g| !ctx.global(g).erased).collect(),
        visited_consts: HashSet::new(),
        visited_md: HashSet::new(),
        errors: Vec::new(),
    };

    for &g in &all {
        let data = ctx.global(g);
        if data.erased {
            v.errors.push(ValidationError::ErasedInModule { global: g });
        }
        let found = module.get(data.name);
        if found != Some(g) {
            v.errors.push(ValidationError::SymbolMismatch {
                name: data.name,
                global: g,
                found,
            });
        }
    }

    for &g in module.globals() {
        let name = ctx.global(g).name;
        let var = ctx.global_var(g);
        let context = || format!("initializer of @{name}");
        if let Some(init) = var.initializer {
            v.check_const(&context, init);
        }
        for &(_, md) in &var.metadata {
            v.check_md(&context, md);
        }
    }
    for &a in module.aliases() {
        let name = ctx.global(a).name;
        if let Some(aliasee) = ctx.alias(a).aliasee {
            v.check_const(&|| format!("aliasee of @{name}"), aliasee);
        }
    }
    for &f in module.functions() {
        v.check_function(f);
    }
    for nmd in &module.named_metadata {
        for &md in &nmd.operands {
            v.check_md(&|| format!("!{}", nmd.name), md);
        }
    }

    ValidationReport { errors: v.errors }
}

/// Validate and panic on any error, in every build profile.
pub fn assert_valid(ctx: &IrContext, module: &Module, pass_name: &str) {
    let report = validate_module(ctx, module);
    if !report.is_ok() {
        panic!("validation failed after `{}`:\n{}", pass_name, report);
    }
}

// ============================================================================
// Tests
// ============================================================================
