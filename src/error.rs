//! Error types for the object store gateway bootstrap
//!
//! Each variant names the component that failed and carries enough context
//! (resource names, the attempted command line) to diagnose a failed run from
//! the logs alone. The orchestrator wraps component errors in
//! [`Error::Bootstrap`] so callers see a single error tagged with the phase
//! that failed.

use thiserror::Error;

use crate::exec::ExecError;
use crate::orchestrator::BootstrapPhase;
use crate::topology::{ParseFailure, TopologyEntity};

/// Main error type for gateway bootstrap operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A credential or service resource could not be read or written
    #[error("provisioning error for {resource} {name}: {message}")]
    Provisioning {
        /// Kind of resource being provisioned (e.g., "secret", "service")
        resource: String,
        /// Name of the resource
        name: String,
        /// Description of what failed
        message: String,
    },

    /// The admin binary could not be launched or exited non-zero
    #[error("failed to run `{command}`: {source}")]
    Execution {
        /// The full command line that was attempted
        command: String,
        /// Underlying process failure
        #[source]
        source: ExecError,
    },

    /// Admin command output did not carry the expected identifier
    #[error("failed to parse {entity} id: {source}")]
    TopologyParse {
        /// Which topology entity was being created
        entity: TopologyEntity,
        /// What was wrong with the output
        #[source]
        source: ParseFailure,
    },

    /// The gateway workload could not be submitted
    #[error("scheduling error for {workload}: {message}")]
    Scheduling {
        /// Name of the workload
        workload: String,
        /// Description of what failed
        message: String,
    },

    /// Invalid configuration or descriptor
    #[error("configuration error: {message}")]
    Config {
        /// Description of what's invalid
        message: String,
    },

    /// A bootstrap phase failed
    #[error("failed to {}: {source}", .phase.action())]
    Bootstrap {
        /// Phase that was being entered when the failure happened
        phase: BootstrapPhase,
        /// The component error
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a provisioning error for a named resource
    pub fn provisioning(
        resource: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Provisioning {
            resource: resource.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create an execution error for the given command line
    pub fn execution(command: impl Into<String>, source: ExecError) -> Self {
        Self::Execution {
            command: command.into(),
            source,
        }
    }

    /// Create a topology parse error
    pub fn topology_parse(entity: TopologyEntity, source: ParseFailure) -> Self {
        Self::TopologyParse { entity, source }
    }

    /// Create a scheduling error for a workload
    pub fn scheduling(workload: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Scheduling {
            workload: workload.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Wrap a component error with the phase that failed
    pub fn in_phase(phase: BootstrapPhase, source: Error) -> Self {
        Self::Bootstrap {
            phase,
            source: Box::new(source),
        }
    }

    /// Get the component error underneath any phase wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Bootstrap { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Get the failed phase if this error came out of the orchestrator
    pub fn phase(&self) -> Option<BootstrapPhase> {
        match self {
            Error::Bootstrap { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// Check whether running the bootstrap again could succeed
    ///
    /// Parse and configuration errors mean the admin tool's output contract or
    /// the descriptor is wrong; repeating the run will not fix either.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Provisioning { .. } => true,
            Error::Execution { .. } => true,
            Error::TopologyParse { .. } => false,
            Error::Scheduling { .. } => true,
            Error::Config { .. } => false,
            Error::Bootstrap { source, .. } => source.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // Story Tests: Error Propagation During Gateway Bootstrap
    // ==========================================================================

    /// Story: provisioning errors name the resource that could not be written
    #[test]
    fn story_provisioning_error_names_resource() {
        let err = Error::provisioning("secret", "rook-ceph-rgw-store1", "forbidden");
        let msg = err.to_string();
        assert!(msg.contains("provisioning error"));
        assert!(msg.contains("secret"));
        assert!(msg.contains("rook-ceph-rgw-store1"));
        assert!(msg.contains("forbidden"));
        assert!(err.is_retryable());
    }

    /// Story: execution errors carry the attempted command line
    #[test]
    fn story_execution_error_includes_command() {
        let err = Error::execution(
            "radosgw-admin realm create --rgw-realm=store1",
            ExecError::NonZeroExit {
                code: Some(22),
                output: "realm already exists".to_string(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("radosgw-admin realm create"));
        assert!(msg.contains("22"));
        assert!(err.is_retryable());
    }

    /// Story: a changed admin output contract is not retryable
    #[test]
    fn story_topology_parse_error_is_permanent() {
        let err = Error::topology_parse(TopologyEntity::ZoneGroup, ParseFailure::MissingId);
        assert!(err.to_string().contains("zonegroup"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn story_scheduling_error_names_workload() {
        let err = Error::scheduling("rook-ceph-rgw-store1", "quota exceeded");
        assert!(err.to_string().contains("rook-ceph-rgw-store1"));
        assert!(err.to_string().contains("quota exceeded"));
    }

    /// Story: the orchestrator wraps component errors with the failing phase
    #[test]
    fn story_bootstrap_wrapper_exposes_phase_and_root_cause() {
        let inner = Error::topology_parse(
            TopologyEntity::Realm,
            ParseFailure::Malformed("expected value at line 1".to_string()),
        );
        let err = Error::in_phase(BootstrapPhase::TopologyReady, inner);

        assert_eq!(err.phase(), Some(BootstrapPhase::TopologyReady));
        assert!(matches!(
            err.root_cause(),
            Error::TopologyParse {
                entity: TopologyEntity::Realm,
                source: ParseFailure::Malformed(_)
            }
        ));
        assert!(err.to_string().contains("bootstrap storage topology"));
        // Retryability follows the wrapped error
        assert!(!err.is_retryable());
    }

    #[test]
    fn config_errors_are_not_retryable() {
        let err = Error::config("replica count must not be negative");
        assert!(err.to_string().contains("configuration error"));
        assert!(!err.is_retryable());
        assert_eq!(err.phase(), None);
    }
}
