// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pod_disruptor::config::Config;
use pod_disruptor::disruptors::PodDisruptor;
use pod_disruptor::kubernetes::build_client;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting pod disruptor");

    let config = Config::from_env()?;
    let experiment = &config.experiment;
    info!(
        "Configuration loaded: namespace={}, select={:?}, exclude={:?}",
        experiment.namespace, experiment.select, experiment.exclude
    );

    let client = build_client(config.kubeconfig.as_deref()).await?;

    // Interrupting stops any pending agent injection or fault command
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling pending operations");
            shutdown.cancel();
        }
    });

    let disruptor =
        PodDisruptor::new(client, experiment.selector(), experiment.options(), cancel).await?;
    info!("Agent injected into {:?}", disruptor.targets());

    disruptor
        .inject_faults(&experiment.fault_spec(), experiment.duration())
        .await?;

    info!("Fault injection completed");
    Ok(())
}
