//! ofcir operator - pooled CI resource lifecycle management

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ofcir::controller::{error_policy, reconcile, Context, FIELD_MANAGER};
use ofcir::crd::{CIPool, CIResource};
use ofcir::fsm::{CIResourceFsm, FsmConfig};
use ofcir::DEFAULT_RETRY_DELAY;

/// ofcir - drives pooled CI resources through acquisition, leasing and release
#[derive(Parser, Debug)]
#[command(name = "ofcir", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Seconds between re-checks of resources in transient states
    #[arg(
        long,
        env = "OFCIR_RETRY_DELAY_SECS",
        default_value_t = DEFAULT_RETRY_DELAY.as_secs()
    )]
    retry_delay_secs: u64,

    /// Only watch CIResources in this namespace (all namespaces when unset)
    #[arg(long, env = "OFCIR_WATCH_NAMESPACE")]
    namespace: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Installs the CRDs, then watches CIResources and reconciles each one
    /// through the resource state machine.
    Controller,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        println!("{}", crd_manifests()?);
        return Ok(());
    }

    match cli.command {
        Some(Commands::Controller) | None => run_controller(&cli).await,
    }
}

/// Both CRDs as a multi-document YAML stream
fn crd_manifests() -> anyhow::Result<String> {
    let resource = serde_yaml::to_string(&CIResource::crd())
        .map_err(|e| anyhow::anyhow!("Failed to serialize CIResource CRD: {}", e))?;
    let pool = serde_yaml::to_string(&CIPool::crd())
        .map_err(|e| anyhow::anyhow!("Failed to serialize CIPool CRD: {}", e))?;
    Ok(format!("{resource}---\n{pool}"))
}

/// Install or update the CRDs with server-side apply
///
/// Keeps the stored schema in step with the operator version.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    tracing::info!("Installing CIResource CRD...");
    crds.patch(
        "ciresources.ofcir.openshift.io",
        &params,
        &Patch::Apply(&CIResource::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install CIResource CRD: {}", e))?;

    tracing::info!("Installing CIPool CRD...");
    crds.patch(
        "cipools.ofcir.openshift.io",
        &params,
        &Patch::Apply(&CIPool::crd()),
    )
    .await
    .map_err(|e| anyhow::anyhow!("Failed to install CIPool CRD: {}", e))?;

    Ok(())
}

/// Run the CIResource controller until a shutdown signal arrives
async fn run_controller(cli: &Cli) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crds_installed(&client).await?;

    let retry_delay = Duration::from_secs(cli.retry_delay_secs);
    if retry_delay.is_zero() {
        anyhow::bail!("--retry-delay-secs must be greater than zero");
    }
    let fsm = CIResourceFsm::new(FsmConfig { retry_delay });
    let ctx = Arc::new(Context::new(client.clone(), fsm));

    let resources: Api<CIResource> = match cli.namespace.as_deref() {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };

    tracing::info!(
        namespace = cli.namespace.as_deref().unwrap_or("<all>"),
        retry_delay_secs = cli.retry_delay_secs,
        "Starting CIResource controller"
    );

    Controller::new(resources, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| async move {
            match result {
                Ok(action) => {
                    tracing::debug!(?action, "CIResource reconciliation completed");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "CIResource reconciliation error");
                }
            }
        })
        .await;

    tracing::info!("ofcir controller shutting down");
    Ok(())
}
