//! Pipeline entry points.
//!
//! The passes wrap [`remove_addrspaces`] with the policy from their
//! configuration, optional post-pass validation and the analyses the caller
//! may keep.

use flatspace_ir::{IrContext, Module, assert_valid};
use flatspace_passes::{AddrspaceRemap, remove_addrspaces};

use crate::config::{RemoveAddrspacesConfig, ReservedRange};

/// Which cached analyses survive a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreservedAnalyses {
    /// Nothing changed.
    All,
    /// Block structure and edges are intact; everything else is stale.
    Cfg,
}

/// Collapse every address space into the generic one.
#[derive(Clone, Debug, Default)]
pub struct RemoveAddrspacesPass {
    config: RemoveAddrspacesConfig,
}

impl RemoveAddrspacesPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RemoveAddrspacesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RemoveAddrspacesConfig {
        &self.config
    }

    pub fn run(&self, ctx: &mut IrContext, module: &mut Module) -> PreservedAnalyses {
        let policy = self.config.policy();
        run_with_policy(ctx, module, &policy, self.config.verify)
    }
}

/// Collapse only the reserved range `first..=last` into the generic
/// address space, keeping target address spaces intact.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoveReservedAddrspacesPass {
    pub first: u32,
    pub last: u32,
}

impl RemoveReservedAddrspacesPass {
    pub fn new(first: u32, last: u32) -> Self {
        Self { first, last }
    }

    pub fn run(&self, ctx: &mut IrContext, module: &mut Module) -> PreservedAnalyses {
        let config = RemoveAddrspacesConfig {
            reserved: Some(ReservedRange {
                first: self.first,
                last: self.last,
            }),
            ..Default::default()
        };
        RemoveAddrspacesPass::with_config(config).run(ctx, module)
    }
}

/// Run address-space removal with an arbitrary policy.
///
/// Validation runs when `verify` is set or the crate is built with the
/// `verify-passes` feature; a module that fails it aborts with a panic.
pub fn run_with_policy(
    ctx: &mut IrContext,
    module: &mut Module,
    policy: &dyn AddrspaceRemap,
    verify: bool,
) -> PreservedAnalyses {
    tracing::debug!("running remove-addrspaces on module {}", module.name);
    let modified = remove_addrspaces(ctx, module, policy);
    if verify || cfg!(feature = "verify-passes") {
        assert_valid(ctx, module, "remove-addrspaces");
    }
    if modified {
        PreservedAnalyses::Cfg
    } else {
        PreservedAnalyses::All
    }
}
