//! Gateway Deployment
//!
//! Builds the replicated gateway workload and submits it. The environment
//! variable names below are read by the gateway process at startup and must
//! not change.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapKeySelector, ConfigMapVolumeSource, Container, EmptyDirVolumeSource, EnvVar,
    EnvVarSource, KeyToPath, ObjectFieldSelector, PodSpec, PodTemplateSpec, SecretKeySelector,
    Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use tracing::info;

use crate::cluster::ObjectStore;
use crate::store::{CreateOutcome, ResourceStore};
use crate::{Error, Result, APP_NAME, KEYRING_KEY, RGW_DNS_NAME, RGW_PORT};

/// Directory holding the gateway's data and generated config
pub const DATA_DIR: &str = "/var/lib/rook";
/// Volume backing [`DATA_DIR`]
pub const DATA_DIR_VOLUME: &str = "rook-data";

/// ConfigMap and volume carrying user Ceph config overrides
pub const CONFIG_OVERRIDE_NAME: &str = "rook-config-override";
/// Mount point of the config override volume
pub const CONFIG_OVERRIDE_DIR: &str = "/etc/rook/config";
/// Key in the override ConfigMap holding the config
const CONFIG_OVERRIDE_KEY: &str = "config";
/// File name the override is projected to
const CONFIG_OVERRIDE_FILE: &str = "override.conf";

/// Env var carrying the gateway keyring
pub const RGW_KEYRING_ENV: &str = "ROOK_RGW_KEYRING";
/// Env var carrying the pod's private IP
pub const PRIVATE_IP_ENV: &str = "ROOK_PRIVATE_IP";
/// Env var carrying the pod's public IP
pub const PUBLIC_IP_ENV: &str = "ROOK_PUBLIC_IP";
/// Env var carrying the Ceph cluster name
pub const CLUSTER_NAME_ENV: &str = "ROOK_CLUSTER_NAME";
/// Env var carrying the monitor endpoints
pub const MON_ENDPOINTS_ENV: &str = "ROOK_MON_ENDPOINTS";
/// Env var carrying the monitor secret
pub const MON_SECRET_ENV: &str = "ROOK_MON_SECRET";
/// Env var carrying the admin secret
pub const ADMIN_SECRET_ENV: &str = "ROOK_ADMIN_SECRET";
/// Env var carrying the config override path
pub const CONFIG_OVERRIDE_ENV: &str = "ROOK_CEPH_CONFIG_OVERRIDE";

/// ConfigMap published by the monitors with their endpoints
pub const MON_ENDPOINTS_CONFIGMAP: &str = "rook-ceph-mon-endpoints";
const MON_ENDPOINTS_KEY: &str = "data";
/// Secret published by the monitors
pub const MON_SECRET_NAME: &str = "rook-ceph-mon";
const MON_SECRET_KEY: &str = "mon-secret";
const ADMIN_SECRET_KEY: &str = "admin-secret";

/// What `ensure_workload` did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadOutcome {
    /// The Deployment was created
    Created,
    /// A Deployment with the same name already existed and was left alone
    AlreadyExists,
}

fn secret_env(name: &str, secret: &str, key: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                name: secret.to_string(),
                key: key.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn pod_ip_env(name: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value_from: Some(EnvVarSource {
            field_ref: Some(ObjectFieldSelector {
                field_path: "status.podIP".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn value_env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn mon_endpoints_env() -> EnvVar {
    EnvVar {
        name: MON_ENDPOINTS_ENV.to_string(),
        value_from: Some(EnvVarSource {
            config_map_key_ref: Some(ConfigMapKeySelector {
                name: MON_ENDPOINTS_CONFIGMAP.to_string(),
                key: MON_ENDPOINTS_KEY.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn config_override_volume() -> Volume {
    Volume {
        name: CONFIG_OVERRIDE_NAME.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: CONFIG_OVERRIDE_NAME.to_string(),
            items: Some(vec![KeyToPath {
                key: CONFIG_OVERRIDE_KEY.to_string(),
                path: CONFIG_OVERRIDE_FILE.to_string(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Environment of the gateway container
pub fn gateway_env(store: &ObjectStore) -> Vec<EnvVar> {
    vec![
        secret_env(RGW_KEYRING_ENV, &store.instance_name(), KEYRING_KEY),
        pod_ip_env(PRIVATE_IP_ENV),
        pod_ip_env(PUBLIC_IP_ENV),
        value_env(CLUSTER_NAME_ENV, store.namespace()),
        mon_endpoints_env(),
        secret_env(MON_SECRET_ENV, MON_SECRET_NAME, MON_SECRET_KEY),
        secret_env(ADMIN_SECRET_ENV, MON_SECRET_NAME, ADMIN_SECRET_KEY),
        value_env(
            CONFIG_OVERRIDE_ENV,
            format!("{}/{}", CONFIG_OVERRIDE_DIR, CONFIG_OVERRIDE_FILE),
        ),
    ]
}

/// The gateway container
pub fn gateway_container(store: &ObjectStore) -> Container {
    Container {
        name: store.instance_name(),
        image: Some(store.image()),
        args: Some(vec![
            "rgw".to_string(),
            format!("--config-dir={}", DATA_DIR),
            format!("--rgw-name={}", store.name()),
            format!("--rgw-port={}", RGW_PORT),
            format!("--rgw-host={}", RGW_DNS_NAME),
        ]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: DATA_DIR_VOLUME.to_string(),
                mount_path: DATA_DIR.to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: CONFIG_OVERRIDE_NAME.to_string(),
                mount_path: CONFIG_OVERRIDE_DIR.to_string(),
                ..Default::default()
            },
        ]),
        env: Some(gateway_env(store)),
        ..Default::default()
    }
}

/// Build the gateway Deployment
pub fn make_deployment(store: &ObjectStore) -> Deployment {
    let labels = store.labels();

    let mut pod_spec = PodSpec {
        containers: vec![gateway_container(store)],
        restart_policy: Some("Always".to_string()),
        volumes: Some(vec![
            Volume {
                name: DATA_DIR_VOLUME.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            },
            config_override_volume(),
        ]),
        ..Default::default()
    };
    store.placement().apply_to_pod_spec(&mut pod_spec);

    Deployment {
        metadata: ObjectMeta {
            name: Some(store.instance_name()),
            namespace: Some(store.namespace().to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(store.replicas()),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    name: Some(APP_NAME.to_string()),
                    labels: Some(labels),
                    annotations: Some(BTreeMap::new()),
                    ..Default::default()
                }),
                spec: Some(pod_spec),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Ensure the gateway Deployment exists
///
/// An existing Deployment is left untouched; its replica count and pod spec
/// are not reconciled.
pub async fn ensure_workload(
    store: &dyn ResourceStore,
    object_store: &ObjectStore,
) -> Result<WorkloadOutcome> {
    let name = object_store.instance_name();
    let deployment = make_deployment(object_store);

    match store
        .create_deployment(object_store.namespace(), &deployment)
        .await
    {
        Ok(CreateOutcome::Created(_)) => {
            info!(deployment = %name, replicas = object_store.replicas(), "rgw deployment started");
            Ok(WorkloadOutcome::Created)
        }
        Ok(CreateOutcome::AlreadyExists) => {
            info!(deployment = %name, "rgw deployment already exists");
            Ok(WorkloadOutcome::AlreadyExists)
        }
        Err(e) => Err(Error::scheduling(
            &name,
            format!("failed to create rgw deployment: {}", e),
        )),
    }
}
