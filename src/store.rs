//! Cluster resource store
//!
//! The Kubernetes operations the bootstrap needs, behind a trait so tests can
//! swap in mocks. Creation results are three-way: `Ok(Created(obj))`,
//! `Ok(AlreadyExists)`, or `Err(StoreError)`. "Already exists" is the
//! idempotency signal callers build on, so it is never reported as an error.

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service};
use kube::api::{Api, PostParams};
use kube::Client;
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

/// HTTP status returned by the API server when a resource already exists
const CONFLICT: u16 = 409;
/// HTTP status returned by the API server when a resource is absent
const NOT_FOUND: u16 = 404;

/// Failure talking to the resource store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The API server rejected the request
    #[error("api error {code} ({reason}): {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Machine-readable reason (e.g., "Forbidden")
        reason: String,
        /// Human-readable message
        message: String,
    },

    /// The request never got an API response (transport, auth, decoding)
    #[error("client error: {0}")]
    Client(String),
}

impl StoreError {
    /// Create an API error with the given status code
    pub fn api(code: u16, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            reason: reason.into(),
            message: message.into(),
        }
    }
}

impl From<kube::Error> for StoreError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(ae) => Self::Api {
                code: ae.code,
                reason: ae.reason,
                message: ae.message,
            },
            other => Self::Client(other.to_string()),
        }
    }
}

/// Result of a create-if-absent request that reached the API server
#[derive(Clone, Debug, PartialEq)]
pub enum CreateOutcome<T> {
    /// The object was created; carries the server's view of it
    Created(T),
    /// An object with the same name was already present
    AlreadyExists,
}

/// Classify a raw create result, folding 409 Conflict into `AlreadyExists`
pub fn classify_create<T>(result: Result<T, kube::Error>) -> Result<CreateOutcome<T>, StoreError> {
    match result {
        Ok(obj) => Ok(CreateOutcome::Created(obj)),
        Err(kube::Error::Api(ae)) if ae.code == CONFLICT => Ok(CreateOutcome::AlreadyExists),
        Err(e) => Err(e.into()),
    }
}

/// Classify a raw get result, folding 404 Not Found into `None`
pub fn classify_get<T>(result: Result<T, kube::Error>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(ae)) if ae.code == NOT_FOUND => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Trait abstracting the Kubernetes operations used during bootstrap
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Get a Secret by namespace and name; `Ok(None)` when it does not exist
    async fn get_secret(&self, namespace: &str, name: &str)
        -> Result<Option<Secret>, StoreError>;

    /// Create a Secret
    async fn create_secret(
        &self,
        namespace: &str,
        secret: &Secret,
    ) -> Result<CreateOutcome<Secret>, StoreError>;

    /// Create a Service
    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<CreateOutcome<Service>, StoreError>;

    /// Create a Deployment
    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<CreateOutcome<Deployment>, StoreError>;
}

/// Resource store backed by the Kubernetes API
pub struct KubeResourceStore {
    client: Client,
}

impl KubeResourceStore {
    /// Create a store wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Secret>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        classify_get(api.get(name).await)
    }

    async fn create_secret(
        &self,
        namespace: &str,
        secret: &Secret,
    ) -> Result<CreateOutcome<Secret>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        classify_create(api.create(&PostParams::default(), secret).await)
    }

    async fn create_service(
        &self,
        namespace: &str,
        service: &Service,
    ) -> Result<CreateOutcome<Service>, StoreError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        classify_create(api.create(&PostParams::default(), service).await)
    }

    async fn create_deployment(
        &self,
        namespace: &str,
        deployment: &Deployment,
    ) -> Result<CreateOutcome<Deployment>, StoreError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        classify_create(api.create(&PostParams::default(), deployment).await)
    }
}
