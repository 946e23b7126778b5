//! Operator runtime configuration
//!
//! Settings shared by every bootstrap run: where the generated Ceph config
//! lives and which admin binaries to invoke. The binary fills this from CLI
//! flags and environment variables; tests use [`OperatorConfig::default`].

use std::path::PathBuf;

use crate::{Error, Result};

/// Default directory holding per-cluster Ceph config and keyrings
pub const DEFAULT_CONFIG_DIR: &str = "/var/lib/rook";

/// Default RADOS gateway admin binary
pub const DEFAULT_RGW_ADMIN_BINARY: &str = "radosgw-admin";

/// Default Ceph CLI binary
pub const DEFAULT_CEPH_BINARY: &str = "ceph";

/// Connection settings for the admin binaries
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Root of the generated Ceph configuration (one subdirectory per cluster)
    pub config_dir: PathBuf,
    /// Binary used for realm/zonegroup/zone commands
    pub rgw_admin_binary: String,
    /// Binary used for auth commands
    pub ceph_binary: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_CONFIG_DIR),
            rgw_admin_binary: DEFAULT_RGW_ADMIN_BINARY.to_string(),
            ceph_binary: DEFAULT_CEPH_BINARY.to_string(),
        }
    }
}

impl OperatorConfig {
    /// Reject settings that would produce unusable admin command lines
    pub fn validate(&self) -> Result<()> {
        if self.config_dir.as_os_str().is_empty() {
            return Err(Error::config("config dir must not be empty"));
        }
        if self.rgw_admin_binary.trim().is_empty() {
            return Err(Error::config("rgw admin binary must not be empty"));
        }
        if self.ceph_binary.trim().is_empty() {
            return Err(Error::config("ceph binary must not be empty"));
        }
        Ok(())
    }
}
