//! rook-rgw - bootstrap for the Ceph object store gateway on Kubernetes
//!
//! Turns "no gateway exists" into a running, addressable RADOS gateway with an
//! initialized multi-site topology. Each run:
//!
//! 1. ensures the gateway keyring Secret exists ([`keyring`])
//! 2. ensures the gateway Service exists ([`service`])
//! 3. creates the realm, zone group and zone ([`topology`])
//! 4. submits the gateway Deployment ([`workload`])
//!
//! [`orchestrator::Orchestrator`] sequences the steps. Every step is
//! create-if-absent, so runs can be repeated against a partly provisioned
//! cluster: existing Kubernetes objects are kept, and existing realm, zone
//! group and zone entities are looked up rather than created again.
//!
//! # Modules
//!
//! - [`cluster`] - Gateway descriptor, naming and labels
//! - [`config`] - Admin binary and config dir settings
//! - [`exec`] - Admin command execution
//! - [`store`] - Kubernetes resource store seam
//! - [`placement`] - Pod placement policy
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod cluster;
pub mod config;
pub mod error;
pub mod exec;
pub mod keyring;
pub mod orchestrator;
pub mod placement;
pub mod service;
pub mod store;
pub mod topology;
pub mod workload;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application name; prefix of every instance name and the `app` label
pub const APP_NAME: &str = "rook-ceph-rgw";

/// Port the gateway listens on and the Service exposes
pub const RGW_PORT: u16 = 53390;

/// Host name the gateway serves under
pub const RGW_DNS_NAME: &str = "rook-ceph-rgw";

/// Key of the keyring inside the gateway Secret
pub const KEYRING_KEY: &str = "keyring";
