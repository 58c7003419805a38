//! rancher-turtles operator - imports CAPI clusters into Rancher

use std::sync::Arc;

use clap::Parser;
use kube::CustomResourceExt;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use turtles_common::crd::{CapiCluster, ClusterRegistrationToken, RancherCluster};
use turtles_common::kube_utils;
use turtles_import::Context;
use turtles_operator::config::Cli;
use turtles_operator::controller_runner::build_import_controller;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }

    if cli.crd {
        let crds = [
            serde_yaml::to_string(&CapiCluster::crd()),
            serde_yaml::to_string(&RancherCluster::crd()),
            serde_yaml::to_string(&ClusterRegistrationToken::crd()),
        ]
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{}", crds.join("---\n"));
        return Ok(());
    }

    run_controller(cli).await
}

async fn run_controller(cli: Cli) -> anyhow::Result<()> {
    let client = kube_utils::create_client(cli.kubeconfig.as_deref()).await?;

    let config = cli.import_config();
    if let Some(filter) = &config.watch_filter {
        tracing::info!(watch_filter = %filter, "restricting to labelled clusters");
    }

    let ctx = Arc::new(Context::builder(client.clone()).config(config).build()?);

    tracing::info!("Starting rancher-turtles controllers:");
    build_import_controller(client, ctx, cli.concurrency).await;

    tracing::info!("Controller shut down");
    Ok(())
}
