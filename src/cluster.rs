//! Gateway descriptor and naming
//!
//! An [`ObjectStore`] identifies one gateway instance. Every Kubernetes object
//! and every topology entity the bootstrap creates is named from it, so
//! re-running the bootstrap for the same descriptor targets the same objects.

use std::collections::BTreeMap;

use crate::placement::Placement;
use crate::{Error, Result, APP_NAME};

/// Label key carrying the application name
pub const APP_LABEL: &str = "app";

/// Label key carrying the Ceph cluster (namespace) name
pub const CLUSTER_LABEL: &str = "rook_cluster";

/// Label key carrying the object store name
pub const OBJECT_STORE_LABEL: &str = "rook_object_store";

/// Image repository for the gateway container
pub const IMAGE_REPOSITORY: &str = "rook/rook";

/// Default number of gateway replicas
pub const DEFAULT_REPLICAS: i32 = 2;

/// Derive the instance name for a gateway
///
/// Used as the name of the keyring Secret, the Service, the Deployment and
/// the gateway container.
pub fn instance_name(name: &str) -> String {
    format!("{}-{}", APP_NAME, name)
}

/// Container image for the given version
pub fn make_image(version: &str) -> String {
    format!("{}:{}", IMAGE_REPOSITORY, version)
}

/// One object store gateway instance
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectStore {
    name: String,
    namespace: String,
    version: String,
    replicas: i32,
    placement: Placement,
}

impl ObjectStore {
    /// Create a descriptor with the default replica count
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        version: impl Into<String>,
        placement: Placement,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            version: version.into(),
            replicas: DEFAULT_REPLICAS,
            placement,
        }
    }

    /// Override the replica count
    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.replicas = replicas;
        self
    }

    /// Check the descriptor can produce valid object names
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::config("object store name must not be empty"));
        }
        if !is_dns_label(&instance_name(&self.name)) {
            return Err(Error::config(format!(
                "object store name '{}' does not form a valid DNS label",
                self.name
            )));
        }
        if self.namespace.is_empty() {
            return Err(Error::config("namespace must not be empty"));
        }
        if self.version.is_empty() {
            return Err(Error::config("version must not be empty"));
        }
        if self.replicas < 0 {
            return Err(Error::config(format!(
                "replica count must not be negative, got {}",
                self.replicas
            )));
        }
        Ok(())
    }

    /// Logical gateway name; also the realm, zone group and zone name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace (and Ceph cluster name)
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Desired replica count
    pub fn replicas(&self) -> i32 {
        self.replicas
    }

    /// Placement policy for the gateway pods
    pub fn placement(&self) -> &Placement {
        &self.placement
    }

    /// Name shared by the Secret, Service and Deployment
    pub fn instance_name(&self) -> String {
        instance_name(&self.name)
    }

    /// Labels applied to the Service and pods, also used as the selector
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (APP_LABEL.to_string(), APP_NAME.to_string()),
            (CLUSTER_LABEL.to_string(), self.namespace.clone()),
            (OBJECT_STORE_LABEL.to_string(), self.name.clone()),
        ])
    }

    /// Gateway container image
    pub fn image(&self) -> String {
        make_image(&self.version)
    }
}

/// RFC 1123 label: lowercase alphanumerics and '-', at most 63 characters
fn is_dns_label(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 63
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        && !s.starts_with('-')
        && !s.ends_with('-')
}
