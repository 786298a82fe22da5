//! Address-space remap policies.
//!
//! A policy is a pure total function from address space to address space.
//! The two standard policies collapse every address space, or only a
//! reserved range of them, into the generic address space. Any
//! `Fn(u32) -> u32` closure is a policy too.

/// The address space pointers collapse into by default.
pub const GENERIC_ADDRSPACE: u32 = 0;

/// Maps a source address space to the one it should be rewritten to.
pub trait AddrspaceRemap {
    fn remap(&self, addrspace: u32) -> u32;
}

impl<F> AddrspaceRemap for F
where
    F: Fn(u32) -> u32,
{
    fn remap(&self, addrspace: u32) -> u32 {
        self(addrspace)
    }
}

/// The standard address-space policies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddrspacePolicy {
    /// Every address space becomes `generic`.
    CollapseAll { generic: u32 },
    /// Address spaces in `first..=last` become `generic`; others are kept.
    CollapseReserved { first: u32, last: u32, generic: u32 },
}

impl AddrspacePolicy {
    pub fn collapse_all() -> Self {
        AddrspacePolicy::CollapseAll {
            generic: GENERIC_ADDRSPACE,
        }
    }

    /// Collapse the inclusive range `first..=last`. An empty range
    /// (`first > last`) collapses nothing.
    pub fn collapse_reserved(first: u32, last: u32) -> Self {
        AddrspacePolicy::CollapseReserved {
            first,
            last,
            generic: GENERIC_ADDRSPACE,
        }
    }

    /// The same policy with a different target address space.
    pub fn with_generic(self, generic: u32) -> Self {
        match self {
            AddrspacePolicy::CollapseAll { .. } => AddrspacePolicy::CollapseAll { generic },
            AddrspacePolicy::CollapseReserved { first, last, .. } => {
                AddrspacePolicy::CollapseReserved {
                    first,
                    last,
                    generic,
                }
            }
        }
    }
}

impl Default for AddrspacePolicy {
    fn default() -> Self {
        Self::collapse_all()
    }
}

impl AddrspaceRemap for AddrspacePolicy {
    fn remap(&self, addrspace: u32) -> u32 {
        match *self {
            AddrspacePolicy::CollapseAll { generic } => generic,
            AddrspacePolicy::CollapseReserved {
                first,
                last,
                generic,
            } => {
                if (first..=last).contains(&addrspace) {
                    generic
                } else {
                    addrspace
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_all_maps_everything_to_generic() {
        let policy = AddrspacePolicy::collapse_all();
        for addrspace in [0, 1, 5, 10, u32::MAX] {
            assert_eq!(policy.remap(addrspace), 0);
        }
        assert_eq!(policy.with_generic(4).remap(7), 4);
    }

    #[test]
    fn collapse_reserved_is_inclusive() {
        let policy = AddrspacePolicy::collapse_reserved(1, 3);
        assert_eq!(policy.remap(0), 0);
        assert_eq!(policy.remap(1), 0);
        assert_eq!(policy.remap(2), 0);
        assert_eq!(policy.remap(3), 0);
        assert_eq!(policy.remap(4), 4);
        assert_eq!(policy.remap(7), 7);
    }

    #[test]
    fn empty_reserved_range_is_identity() {
        let policy = AddrspacePolicy::collapse_reserved(5, 2);
        for addrspace in 0..8 {
            assert_eq!(policy.remap(addrspace), addrspace);
        }
    }

    #[test]
    fn closures_are_policies() {
        let shift = |addrspace: u32| addrspace.saturating_sub(1);
        let policy: &dyn AddrspaceRemap = &shift;
        assert_eq!(policy.remap(3), 2);
        assert_eq!(policy.remap(0), 0);
    }
}
