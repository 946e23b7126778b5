//! Gateway Service
//!
//! Exposes the gateway pods on a cluster-internal address. The address is only
//! known when this run creates the Service; if it already exists the caller
//! gets `None`.

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use tracing::info;

use crate::cluster::ObjectStore;
use crate::store::{CreateOutcome, ResourceStore};
use crate::{Error, Result, RGW_PORT};

/// Build the Service selecting the gateway pods
pub fn make_service(store: &ObjectStore) -> Service {
    let labels = store.labels();
    Service {
        metadata: ObjectMeta {
            name: Some(store.instance_name()),
            namespace: Some(store.namespace().to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some(store.instance_name()),
                port: i32::from(RGW_PORT),
                target_port: Some(IntOrString::Int(i32::from(RGW_PORT))),
                protocol: Some("TCP".to_string()),
                ..Default::default()
            }]),
            selector: Some(labels),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Ensure the gateway Service exists
///
/// Returns the cluster IP assigned to a newly created Service, or `None` when
/// the Service already existed.
pub async fn ensure_service(
    store: &dyn ResourceStore,
    object_store: &ObjectStore,
) -> Result<Option<String>> {
    let name = object_store.instance_name();
    let service = make_service(object_store);

    match store.create_service(object_store.namespace(), &service).await {
        Ok(CreateOutcome::Created(created)) => {
            let cluster_ip = created.spec.and_then(|spec| spec.cluster_ip);
            info!(
                service = %name,
                address = cluster_ip.as_deref().unwrap_or_default(),
                port = RGW_PORT,
                "rgw service running"
            );
            Ok(cluster_ip)
        }
        Ok(CreateOutcome::AlreadyExists) => {
            info!(service = %name, "rgw service already running");
            Ok(None)
        }
        Err(e) => Err(Error::provisioning(
            "service",
            &name,
            format!("failed to create rgw service: {}", e),
        )),
    }
}
