//! Address-space removal over flatspace IR.
//!
//! [`remove_addrspaces`] rebuilds a module so that every pointer type,
//! constant and global lives in the address space chosen by an
//! [`AddrspaceRemap`] policy, folding address-space casts that become
//! no-ops along the way.

pub mod materializer;
pub mod noop_casts;
pub mod policy;
pub mod remove_addrspaces;
pub mod type_remap;

pub use materializer::AddrspaceMaterializer;
pub use noop_casts::remove_noop_addrspace_casts;
pub use policy::{AddrspacePolicy, AddrspaceRemap, GENERIC_ADDRSPACE};
pub use remove_addrspaces::remove_addrspaces;
pub use type_remap::AddrspaceTypeRemapper;
