//! Address-space removal for flatspace IR.
//!
//! This crate is the pipeline boundary: configuration, the
//! [`RemoveAddrspacesPass`] and [`RemoveReservedAddrspacesPass`] entry
//! points, and the [`PreservedAnalyses`] they report. The IR lives in
//! [`flatspace_ir`]; the rewrite itself in [`flatspace_passes`].

pub mod config;
pub mod pass;

pub use config::{RemoveAddrspacesConfig, ReservedRange};
pub use pass::{
    PreservedAnalyses, RemoveAddrspacesPass, RemoveReservedAddrspacesPass, run_with_policy,
};

pub use flatspace_ir as ir;
pub use flatspace_passes as passes;
