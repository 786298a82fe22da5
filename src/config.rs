//! Pass configuration.
//!
//! An embedding compiler usually carries the address-space layout in its
//! own configuration, so this is plain serde data that can be loaded from
//! any format and turned into a policy.

use flatspace_passes::{AddrspacePolicy, GENERIC_ADDRSPACE};
use serde::{Deserialize, Serialize};

/// Inclusive range of reserved address spaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedRange {
    pub first: u32,
    pub last: u32,
}

/// Configuration for address-space removal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoveAddrspacesConfig {
    /// Address space pointers collapse into. Default: 0.
    pub generic: u32,
    /// Only collapse this range; `None` collapses everything. Default: `None`.
    pub reserved: Option<ReservedRange>,
    /// Validate the module after the pass and panic on errors. Default: false.
    pub verify: bool,
}

impl Default for RemoveAddrspacesConfig {
    fn default() -> Self {
        Self {
            generic: GENERIC_ADDRSPACE,
            reserved: None,
            verify: false,
        }
    }
}

impl RemoveAddrspacesConfig {
    pub fn policy(&self) -> AddrspacePolicy {
        let policy = match self.reserved {
            Some(ReservedRange { first, last }) => AddrspacePolicy::collapse_reserved(first, last),
            None => AddrspacePolicy::collapse_all(),
        };
        policy.with_generic(self.generic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flatspace_passes::AddrspaceRemap;

    #[test]
    fn default_collapses_everything() {
        let policy = RemoveAddrspacesConfig::default().policy();
        assert_eq!(policy, AddrspacePolicy::collapse_all());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: RemoveAddrspacesConfig =
            serde_json::from_str(r#"{ "reserved": { "first": 10, "last": 13 } }"#)
                .expect("valid config");
        assert_eq!(config.generic, 0);
        assert!(!config.verify);
        let policy = config.policy();
        assert_eq!(policy.remap(11), 0);
        assert_eq!(policy.remap(3), 3);
    }

    #[test]
    fn generic_target_is_configurable() {
        let config = RemoveAddrspacesConfig {
            generic: 4,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).expect("serializable");
        let back: RemoveAddrspacesConfig = serde_json::from_str(&json).expect("round trip");
        assert_eq!(back, config);
        assert_eq!(back.policy().remap(9), 4);
    }
}
