//! Gateway bootstrap orchestrator
//!
//! Runs the bootstrap steps in a fixed order:
//!
//! ```text
//! Init -> CredentialsReady -> ServiceReady -> TopologyReady -> WorkloadScheduled
//!   \__________________\_______________\_______________\______> Failed
//! ```
//!
//! Each step is create-if-absent, so re-running against a partly provisioned
//! cluster picks up where the last run stopped. Kubernetes objects that exist
//! are left alone, and topology entities that exist have their IDs read back
//! instead of being created. A failed run leaves whatever it created in place;
//! there is no rollback.
//!
//! Every step's error is propagated. In particular a failed service or
//! topology step stops the run before the Deployment is submitted, so a
//! gateway is never scheduled on top of a broken topology.

use std::fmt;
use std::sync::Arc;

use kube::Client;
use tracing::{debug, error, info, instrument, warn};

use crate::cluster::ObjectStore;
use crate::config::OperatorConfig;
use crate::exec::{AdminCommandRunner, CommandExecutor, ProcessExecutor};
use crate::keyring::{ensure_keyring, CephKeyringGenerator, KeyringGenerator, KeyringOutcome};
use crate::service::ensure_service;
use crate::store::{KubeResourceStore, ResourceStore};
use crate::topology::{bootstrap_topology, TopologyIds};
use crate::workload::{ensure_workload, WorkloadOutcome};
use crate::{Error, Result, RGW_PORT};

/// Bootstrap state machine phases
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootstrapPhase {
    /// Nothing has been done yet
    Init,
    /// The keyring Secret exists
    CredentialsReady,
    /// The Service exists
    ServiceReady,
    /// Realm, zone group and zone are created
    TopologyReady,
    /// The Deployment is submitted (terminal success)
    WorkloadScheduled,
    /// A step failed (terminal)
    Failed,
}

impl BootstrapPhase {
    /// The phase reached when the current one's step succeeds
    pub fn next(self) -> BootstrapPhase {
        match self {
            BootstrapPhase::Init => BootstrapPhase::CredentialsReady,
            BootstrapPhase::CredentialsReady => BootstrapPhase::ServiceReady,
            BootstrapPhase::ServiceReady => BootstrapPhase::TopologyReady,
            BootstrapPhase::TopologyReady => BootstrapPhase::WorkloadScheduled,
            BootstrapPhase::WorkloadScheduled => BootstrapPhase::WorkloadScheduled,
            BootstrapPhase::Failed => BootstrapPhase::Failed,
        }
    }

    /// What the step entering this phase does, for error messages
    pub fn action(self) -> &'static str {
        match self {
            BootstrapPhase::Init => "validate object store",
            BootstrapPhase::CredentialsReady => "create rgw keyring",
            BootstrapPhase::ServiceReady => "start rgw service",
            BootstrapPhase::TopologyReady => "bootstrap storage topology",
            BootstrapPhase::WorkloadScheduled => "create rgw deployment",
            BootstrapPhase::Failed => "complete bootstrap",
        }
    }
}

impl fmt::Display for BootstrapPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a successful bootstrap did
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Final phase; always `WorkloadScheduled` for a returned report
    pub phase: BootstrapPhase,
    /// Whether the keyring was generated or already present
    pub keyring: KeyringOutcome,
    /// Service address, when this run created the Service
    pub service_address: Option<String>,
    /// IDs of the created realm, zone group and zone
    pub topology: TopologyIds,
    /// Whether the Deployment was created or already present
    pub workload: WorkloadOutcome,
}

/// Tracks the current phase of one bootstrap run
struct PhaseTracker {
    phase: BootstrapPhase,
}

impl PhaseTracker {
    fn new() -> Self {
        Self {
            phase: BootstrapPhase::Init,
        }
    }

    /// Run the step that moves the machine to the next phase
    fn complete<T>(&mut self, result: Result<T>) -> Result<T> {
        let target = self.phase.next();
        match result {
            Ok(value) => {
                debug!(from = %self.phase, to = %target, "bootstrap phase complete");
                self.phase = target;
                Ok(value)
            }
            Err(e) => {
                error!(phase = %target, error = %e, "rgw bootstrap failed");
                self.phase = BootstrapPhase::Failed;
                Err(Error::in_phase(target, e))
            }
        }
    }
}

/// Sequences keyring, service, topology and workload creation for a gateway
pub struct Orchestrator {
    store: Arc<dyn ResourceStore>,
    keyring: Arc<dyn KeyringGenerator>,
    executor: Arc<dyn CommandExecutor>,
    config: OperatorConfig,
}

impl Orchestrator {
    /// Create an orchestrator from its collaborators
    pub fn new(
        store: Arc<dyn ResourceStore>,
        keyring: Arc<dyn KeyringGenerator>,
        executor: Arc<dyn CommandExecutor>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            store,
            keyring,
            executor,
            config,
        }
    }

    /// Create an orchestrator talking to a real cluster and real admin binaries
    pub fn from_client(client: Client, config: OperatorConfig) -> Self {
        let executor: Arc<dyn CommandExecutor> = Arc::new(ProcessExecutor::new());
        let keyring = Arc::new(CephKeyringGenerator::new(executor.clone(), config.clone()));
        Self::new(
            Arc::new(KubeResourceStore::new(client)),
            keyring,
            executor,
            config,
        )
    }

    /// Bring up the gateway described by `object_store`
    #[instrument(
        name = "rgw_bootstrap",
        skip(self, object_store),
        fields(name = %object_store.name(), namespace = %object_store.namespace())
    )]
    pub async fn start(&self, object_store: &ObjectStore) -> Result<BootstrapReport> {
        info!("start running rgw");
        let mut tracker = PhaseTracker::new();

        let validated = self
            .config
            .validate()
            .and_then(|_| object_store.validate());
        if let Err(e) = validated {
            error!(error = %e, "rgw bootstrap rejected");
            return Err(Error::in_phase(BootstrapPhase::Init, e));
        }

        let keyring = tracker.complete(
            ensure_keyring(self.store.as_ref(), self.keyring.as_ref(), object_store).await,
        )?;

        let service_address =
            tracker.complete(ensure_service(self.store.as_ref(), object_store).await)?;
        if service_address.is_none() {
            // The existing Service's address is not looked up; the zone group
            // and zone get a port-only endpoint on this run.
            warn!("rgw service address unknown, topology endpoints will omit the host");
        }

        let runner =
            AdminCommandRunner::new(self.executor.clone(), &self.config, object_store.namespace());
        let topology = tracker.complete(
            bootstrap_topology(
                &runner,
                object_store.name(),
                service_address.as_deref(),
                RGW_PORT,
            )
            .await,
        )?;

        let workload =
            tracker.complete(ensure_workload(self.store.as_ref(), object_store).await)?;

        info!(workload = ?workload, "rgw bootstrap complete");
        Ok(BootstrapReport {
            phase: tracker.phase,
            keyring,
            service_address,
            topology,
            workload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Secret;
    use mockall::Sequence;

    use crate::exec::{ExecError, MockCommandExecutor};
    use crate::keyring::MockKeyringGenerator;
    use crate::placement::Placement;
    use crate::store::{CreateOutcome, MockResourceStore, StoreError};
    use crate::topology::{ParseFailure, TopologyEntity};

    fn store1() -> ObjectStore {
        ObjectStore::new("store1", "rook-ceph", "v1", Placement::default())
    }

    fn executor_returning_ids() -> MockCommandExecutor {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_combined_output()
            .returning(|_, args| {
                let id = match args[0].as_str() {
                    "realm" => "r1",
                    "zonegroup" => "zg1",
                    _ => "z1",
                };
                Ok(format!("{{\"id\":\"{}\"}}", id))
            });
        executor
    }

    fn orchestrator(
        store: MockResourceStore,
        keyring: MockKeyringGenerator,
        executor: MockCommandExecutor,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(store),
            Arc::new(keyring),
            Arc::new(executor),
            OperatorConfig::default(),
        )
    }

    // ==========================================================================
    // Story: Phase Transitions
    // ==========================================================================

    #[test]
    fn phases_advance_in_fixed_order() {
        let mut phase = BootstrapPhase::Init;
        let mut seen = vec![phase];
        while phase != BootstrapPhase::WorkloadScheduled {
            phase = phase.next();
            seen.push(phase);
        }
        assert_eq!(
            seen,
            vec![
                BootstrapPhase::Init,
                BootstrapPhase::CredentialsReady,
                BootstrapPhase::ServiceReady,
                BootstrapPhase::TopologyReady,
                BootstrapPhase::WorkloadScheduled,
            ]
        );
        assert_eq!(
            BootstrapPhase::WorkloadScheduled.next(),
            BootstrapPhase::WorkloadScheduled
        );
        assert_eq!(BootstrapPhase::Failed.next(), BootstrapPhase::Failed);
    }

    // ==========================================================================
    // Story: Fresh Gateway Bootstrap
    // ==========================================================================

    #[tokio::test]
    async fn fresh_gateway_runs_every_step_in_order() {
        let mut seq = Sequence::new();
        let mut store = MockResourceStore::new();
        store
            .expect_get_secret()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(None));
        store
            .expect_create_secret()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, s| Ok(CreateOutcome::Created(s.clone())));
        store
            .expect_create_service()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, svc| {
                let mut created = svc.clone();
                if let Some(spec) = created.spec.as_mut() {
                    spec.cluster_ip = Some("10.96.0.42".to_string());
                }
                Ok(CreateOutcome::Created(created))
            });
        store
            .expect_create_deployment()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, d| Ok(CreateOutcome::Created(d.clone())));

        let mut keyring = MockKeyringGenerator::new();
        keyring
            .expect_generate()
            .times(1)
            .returning(|_| Ok("keyring".to_string()));

        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_combined_output()
            .times(3)
            .returning(|_, args| {
                assert!(args.contains(&"--rgw-realm=store1".to_string()));
                if args[0] != "realm" {
                    assert!(args.contains(&"--endpoints=10.96.0.42:53390".to_string()));
                }
                Ok(format!("{{\"id\":\"{}-id\"}}", args[0]))
            });

        let report = orchestrator(store, keyring, executor)
            .start(&store1())
            .await
            .unwrap();

        assert_eq!(report.phase, BootstrapPhase::WorkloadScheduled);
        assert_eq!(report.keyring, KeyringOutcome::Created);
        assert_eq!(report.service_address.as_deref(), Some("10.96.0.42"));
        assert_eq!(report.topology.realm_id, "realm-id");
        assert_eq!(report.topology.zone_group_id, "zonegroup-id");
        assert_eq!(report.topology.zone_id, "zone-id");
        assert_eq!(report.workload, WorkloadOutcome::Created);
    }

    // ==========================================================================
    // Story: Re-running Against an Existing Gateway
    // ==========================================================================

    #[tokio::test]
    async fn rerun_tolerates_existing_resources() {
        let mut store = MockResourceStore::new();
        store
            .expect_get_secret()
            .returning(|_, _| Ok(Some(Secret::default())));
        store.expect_create_secret().never();
        store
            .expect_create_service()
            .returning(|_, _| Ok(CreateOutcome::AlreadyExists));
        store
            .expect_create_deployment()
            .returning(|_, _| Ok(CreateOutcome::AlreadyExists));

        let mut keyring = MockKeyringGenerator::new();
        keyring.expect_generate().never();

        let report = orchestrator(store, keyring, executor_returning_ids())
            .start(&store1())
            .await
            .unwrap();

        assert_eq!(report.keyring, KeyringOutcome::AlreadyPresent);
        assert_eq!(report.service_address, None);
        assert_eq!(report.topology.realm_id, "r1");
        assert_eq!(report.workload, WorkloadOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn rerun_over_existing_topology_still_schedules_workload() {
        let mut store = MockResourceStore::new();
        store
            .expect_get_secret()
            .returning(|_, _| Ok(Some(Secret::default())));
        store
            .expect_create_service()
            .returning(|_, _| Ok(CreateOutcome::AlreadyExists));
        store
            .expect_create_deployment()
            .times(1)
            .returning(|_, d| Ok(CreateOutcome::Created(d.clone())));

        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_combined_output()
            .withf(|_, args| args[1] == "create")
            .times(3)
            .returning(|_, _| {
                Err(ExecError::NonZeroExit {
                    code: Some(17),
                    output: "(17) File exists".to_string(),
                })
            });
        executor
            .expect_execute_combined_output()
            .withf(|_, args| args[1] == "get")
            .times(3)
            .returning(|_, args| Ok(format!("{{\"id\":\"{}-id\"}}", args[0])));

        let report = orchestrator(store, MockKeyringGenerator::new(), executor)
            .start(&store1())
            .await
            .unwrap();

        assert_eq!(report.phase, BootstrapPhase::WorkloadScheduled);
        assert_eq!(report.topology.realm_id, "realm-id");
        assert_eq!(report.topology.zone_group_id, "zonegroup-id");
        assert_eq!(report.topology.zone_id, "zone-id");
        assert_eq!(report.workload, WorkloadOutcome::Created);
    }

    // ==========================================================================
    // Story: Failures Stop the Run at the Failing Phase
    // ==========================================================================

    #[tokio::test]
    async fn keyring_failure_stops_before_service() {
        let mut store = MockResourceStore::new();
        store
            .expect_get_secret()
            .returning(|_, _| Err(StoreError::Client("connection refused".to_string())));
        store.expect_create_service().never();
        store.expect_create_deployment().never();

        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_combined_output().never();

        let err = orchestrator(store, MockKeyringGenerator::new(), executor)
            .start(&store1())
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(BootstrapPhase::CredentialsReady));
        assert!(matches!(err.root_cause(), Error::Provisioning { .. }));
        assert!(err.to_string().starts_with("failed to create rgw keyring"));
    }

    #[tokio::test]
    async fn service_failure_stops_before_topology() {
        let mut store = MockResourceStore::new();
        store
            .expect_get_secret()
            .returning(|_, _| Ok(Some(Secret::default())));
        store
            .expect_create_service()
            .returning(|_, _| Err(StoreError::api(500, "InternalError", "etcd timeout")));
        store.expect_create_deployment().never();

        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_combined_output().never();

        let err = orchestrator(store, MockKeyringGenerator::new(), executor)
            .start(&store1())
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(BootstrapPhase::ServiceReady));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn topology_failure_stops_before_workload() {
        let mut store = MockResourceStore::new();
        store
            .expect_get_secret()
            .returning(|_, _| Ok(Some(Secret::default())));
        store
            .expect_create_service()
            .returning(|_, _| Ok(CreateOutcome::AlreadyExists));
        store.expect_create_deployment().never();

        let mut executor = MockCommandExecutor::new();
        executor
            .expect_execute_combined_output()
            .times(1)
            .returning(|_, _| Ok("not json".to_string()));

        let err = orchestrator(store, MockKeyringGenerator::new(), executor)
            .start(&store1())
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(BootstrapPhase::TopologyReady));
        assert!(matches!(
            err.root_cause(),
            Error::TopologyParse {
                entity: TopologyEntity::Realm,
                source: ParseFailure::Malformed(_)
            }
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn admin_command_failure_is_execution_error_in_topology_phase() {
        let mut store = MockResourceStore::new();
        store
            .expect_get_secret()
            .returning(|_, _| Ok(Some(Secret::default())));
        store
            .expect_create_service()
            .returning(|_, _| Ok(CreateOutcome::AlreadyExists));
        store.expect_create_deployment().never();

        let mut executor = MockCommandExecutor::new();
        executor.expect_execute_combined_output().returning(|_, _| {
            Err(ExecError::Launch(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "radosgw-admin not found",
            )))
        });

        let err = orchestrator(store, MockKeyringGenerator::new(), executor)
            .start(&store1())
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(BootstrapPhase::TopologyReady));
        assert!(matches!(err.root_cause(), Error::Execution { .. }));
    }

    #[tokio::test]
    async fn workload_failure_is_scheduling_error() {
        let mut store = MockResourceStore::new();
        store
            .expect_get_secret()
            .returning(|_, _| Ok(Some(Secret::default())));
        store
            .expect_create_service()
            .returning(|_, _| Ok(CreateOutcome::AlreadyExists));
        store
            .expect_create_deployment()
            .returning(|_, _| Err(StoreError::api(403, "Forbidden", "forbidden")));

        let err = orchestrator(store, MockKeyringGenerator::new(), executor_returning_ids())
            .start(&store1())
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(BootstrapPhase::WorkloadScheduled));
        assert!(matches!(err.root_cause(), Error::Scheduling { .. }));
    }

    #[tokio::test]
    async fn invalid_descriptor_is_rejected_before_any_call() {
        let mut store = MockResourceStore::new();
        store.expect_get_secret().never();

        let bad = ObjectStore::new("Bad Name", "rook-ceph", "v1", Placement::default());
        let err = orchestrator(store, MockKeyringGenerator::new(), MockCommandExecutor::new())
            .start(&bad)
            .await
            .unwrap_err();

        assert_eq!(err.phase(), Some(BootstrapPhase::Init));
        assert!(matches!(err.root_cause(), Error::Config { .. }));
    }
}
