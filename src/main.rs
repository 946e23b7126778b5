//! rook-rgw - bring up a Ceph object store gateway

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kube::Client;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rook_rgw::cluster::{ObjectStore, DEFAULT_REPLICAS};
use rook_rgw::config::{OperatorConfig, DEFAULT_CEPH_BINARY, DEFAULT_CONFIG_DIR, DEFAULT_RGW_ADMIN_BINARY};
use rook_rgw::orchestrator::Orchestrator;
use rook_rgw::placement::Placement;
use rook_rgw::service::make_service;
use rook_rgw::workload::make_deployment;

/// rook-rgw - bootstrap for the Ceph object store gateway
#[derive(Parser, Debug)]
#[command(name = "rook-rgw", version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, env = "ROOK_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Provision the keyring, service, topology and deployment for a gateway
    Start(StartArgs),

    /// Print the Service and Deployment manifests without touching the cluster
    Render(ObjectStoreArgs),
}

/// Identifies the gateway
#[derive(Args, Debug)]
struct ObjectStoreArgs {
    /// Object store name; also used for the realm, zone group and zone
    #[arg(long)]
    name: String,

    /// Namespace of the Ceph cluster
    #[arg(long, env = "ROOK_RGW_NAMESPACE", default_value = "rook-ceph")]
    namespace: String,

    /// Rook image version
    #[arg(long = "rook-version", env = "ROOK_VERSION")]
    version: String,

    /// Number of gateway replicas
    #[arg(long, default_value_t = DEFAULT_REPLICAS)]
    replicas: i32,

    /// YAML file with node/pod affinity and tolerations
    #[arg(long)]
    placement_file: Option<PathBuf>,
}

/// Start mode arguments
#[derive(Args, Debug)]
struct StartArgs {
    #[command(flatten)]
    store: ObjectStoreArgs,

    /// Directory holding the generated Ceph config and admin keyring
    #[arg(long, env = "ROOK_CONFIG_DIR", default_value = DEFAULT_CONFIG_DIR)]
    config_dir: PathBuf,

    /// RADOS gateway admin binary
    #[arg(long, env = "ROOK_RGW_ADMIN_BINARY", default_value = DEFAULT_RGW_ADMIN_BINARY)]
    rgw_admin_binary: String,

    /// Ceph CLI binary
    #[arg(long, env = "ROOK_CEPH_BINARY", default_value = DEFAULT_CEPH_BINARY)]
    ceph_binary: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    match cli.command {
        Commands::Start(args) => run_start(args).await,
        Commands::Render(args) => run_render(args).await,
    }
}

/// Build the gateway descriptor from CLI arguments
async fn load_object_store(args: &ObjectStoreArgs) -> anyhow::Result<ObjectStore> {
    let placement = match &args.placement_file {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read placement file {:?}: {}", path, e))?;
            serde_yaml::from_str::<Placement>(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse placement file {:?}: {}", path, e))?
        }
        None => Placement::default(),
    };

    let store = ObjectStore::new(&args.name, &args.namespace, &args.version, placement)
        .with_replicas(args.replicas);
    store.validate()?;
    Ok(store)
}

/// Run the bootstrap against the current cluster
async fn run_start(args: StartArgs) -> anyhow::Result<()> {
    let store = load_object_store(&args.store).await?;
    let config = OperatorConfig {
        config_dir: args.config_dir,
        rgw_admin_binary: args.rgw_admin_binary,
        ceph_binary: args.ceph_binary,
    };
    config.validate()?;

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let report = match Orchestrator::from_client(client, config).start(&store).await {
        Ok(report) => report,
        Err(e) => {
            error!(
                phase = ?e.phase(),
                retryable = e.is_retryable(),
                cause = %e.root_cause(),
                "object store {} bootstrap failed",
                store.name()
            );
            return Err(e.into());
        }
    };
    info!(
        realm = %report.topology.realm_id,
        zonegroup = %report.topology.zone_group_id,
        zone = %report.topology.zone_id,
        keyring = ?report.keyring,
        workload = ?report.workload,
        "object store {} is up",
        store.name()
    );
    Ok(())
}

/// Print the manifests the bootstrap would submit
async fn run_render(args: ObjectStoreArgs) -> anyhow::Result<()> {
    let store = load_object_store(&args).await?;

    let service = serde_yaml::to_string(&make_service(&store))
        .map_err(|e| anyhow::anyhow!("Failed to serialize Service: {}", e))?;
    let deployment = serde_yaml::to_string(&make_deployment(&store))
        .map_err(|e| anyhow::anyhow!("Failed to serialize Deployment: {}", e))?;

    println!("{service}---\n{deployment}");
    Ok(())
}
