//! Gateway keyring provisioning
//!
//! The gateway authenticates to Ceph with a keyring stored in a Secret named
//! after the instance. The Secret's existence is the idempotency signal: once
//! it exists, later runs read nothing else and write nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use tracing::info;

use crate::cluster::ObjectStore;
use crate::config::OperatorConfig;
use crate::exec::{AdminCommandRunner, CommandExecutor};
use crate::store::{CreateOutcome, ResourceStore};
use crate::topology::decode_leading_json;
use crate::{Error, Result, KEYRING_KEY};

/// Secret type used for all Rook-generated secrets
pub const ROOK_SECRET_TYPE: &str = "kubernetes.io/rook";

/// Ceph identity the gateway runs as
pub const RGW_USERNAME: &str = "client.radosgw.gateway";

/// Capabilities granted to the gateway identity, as (service, caps) pairs
const RGW_CAPS: [(&str, &str); 2] = [("osd", "allow rwx"), ("mon", "allow rw")];

/// Trait for producing new keyring material
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyringGenerator: Send + Sync {
    /// Generate a keyring for the gateway in the cluster in `namespace`
    async fn generate(&self, namespace: &str) -> Result<String>;
}

/// What `ensure_keyring` did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyringOutcome {
    /// A new keyring was generated and stored
    Created,
    /// The keyring Secret was already present; nothing was written
    AlreadyPresent,
}

/// Build the Secret holding the gateway keyring
pub fn make_keyring_secret(store: &ObjectStore, keyring: String) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(store.instance_name()),
            namespace: Some(store.namespace().to_string()),
            ..Default::default()
        },
        string_data: Some(BTreeMap::from([(KEYRING_KEY.to_string(), keyring)])),
        type_: Some(ROOK_SECRET_TYPE.to_string()),
        ..Default::default()
    }
}

/// Ensure the keyring Secret exists, generating the keyring only if absent
pub async fn ensure_keyring(
    store: &dyn ResourceStore,
    generator: &dyn KeyringGenerator,
    object_store: &ObjectStore,
) -> Result<KeyringOutcome> {
    let name = object_store.instance_name();
    let namespace = object_store.namespace();

    let existing = store
        .get_secret(namespace, &name)
        .await
        .map_err(|e| Error::provisioning("secret", &name, format!("failed to get rgw secret: {}", e)))?;
    if existing.is_some() {
        info!(secret = %name, "the rgw keyring was already generated");
        return Ok(KeyringOutcome::AlreadyPresent);
    }

    info!(secret = %name, "generating rgw keyring");
    let keyring = generator.generate(namespace).await.map_err(|e| {
        Error::provisioning("secret", &name, format!("failed to create keyring: {}", e))
    })?;

    let secret = make_keyring_secret(object_store, keyring);
    match store.create_secret(namespace, &secret).await {
        Ok(CreateOutcome::Created(_)) => {
            info!(secret = %name, "stored rgw keyring");
            Ok(KeyringOutcome::Created)
        }
        Ok(CreateOutcome::AlreadyExists) => {
            // Another run stored it between our get and create
            info!(secret = %name, "rgw keyring was stored concurrently");
            Ok(KeyringOutcome::AlreadyPresent)
        }
        Err(e) => Err(Error::provisioning(
            "secret",
            &name,
            format!("failed to save rgw secret: {}", e),
        )),
    }
}

#[derive(Debug, Deserialize)]
struct AuthKey {
    key: String,
}

/// Render a Ceph keyring file for the gateway identity
pub fn render_keyring(key: &str) -> String {
    let mut keyring = format!("[{}]\n\tkey = {}\n", RGW_USERNAME, key);
    // Ceph lists caps mon before osd
    for (service, caps) in RGW_CAPS.iter().rev() {
        keyring.push_str(&format!("\tcaps {} = \"{}\"\n", service, caps));
    }
    keyring
}

/// Generates keyrings with `ceph auth get-or-create-key`
pub struct CephKeyringGenerator {
    executor: Arc<dyn CommandExecutor>,
    config: OperatorConfig,
}

impl CephKeyringGenerator {
    /// Create a generator that runs `ceph` through `executor`
    pub fn new(executor: Arc<dyn CommandExecutor>, config: OperatorConfig) -> Self {
        Self { executor, config }
    }
}

#[async_trait]
impl KeyringGenerator for CephKeyringGenerator {
    async fn generate(&self, namespace: &str) -> Result<String> {
        let runner = AdminCommandRunner::new(self.executor.clone(), &self.config, namespace);

        let mut args = vec!["auth", "get-or-create-key", RGW_USERNAME];
        for (service, caps) in RGW_CAPS {
            args.push(service);
            args.push(caps);
        }
        args.extend(["--format", "json"]);

        let output = runner.run_ceph(&args).await?;
        let auth: AuthKey = decode_leading_json(&output).map_err(|e| {
            Error::provisioning(
                "keyring",
                RGW_USERNAME,
                format!("failed to parse auth key: {}", e),
            )
        })?;
        if auth.key.is_empty() {
            return Err(Error::provisioning(
                "keyring",
                RGW_USERNAME,
                "ceph returned an empty key",
            ));
        }
        Ok(render_keyring(&auth.key))
    }
}
