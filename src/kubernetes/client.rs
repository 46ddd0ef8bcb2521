// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Cluster client creation and server version checking

use crate::constants::version::{MIN_MAJOR, MIN_MINOR};
use crate::error::{DisruptorError, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Build a client from the kubeconfig at `kubeconfig`, or infer one
/// (in-cluster, then `KUBECONFIG`, then `~/.kube/config`) when no path is given.
/// The server version is checked before the client is returned.
#[instrument]
pub async fn build_client(kubeconfig: Option<&Path>) -> Result<Client> {
    let client_config = match kubeconfig {
        Some(path) => config_from_kubeconfig_file(path).await?,
        None => KConfig::infer()
            .await
            .map_err(|e| DisruptorError::Kubeconfig(format!("Failed to infer config: {}", e)))?,
    };

    let client = Client::try_from(client_config)
        .map_err(|e| DisruptorError::Kubeconfig(format!("Failed to create client: {}", e)))?;

    check_server_version(&client).await?;
    info!("Connected to Kubernetes cluster");

    Ok(client)
}

async fn config_from_kubeconfig_file(path: &Path) -> Result<KConfig> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        DisruptorError::Kubeconfig(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let kubeconfig: Kubeconfig = serde_yaml::from_str(&raw)
        .map_err(|e| DisruptorError::Kubeconfig(format!("Failed to parse kubeconfig: {}", e)))?;

    KConfig::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| DisruptorError::Kubeconfig(format!("Failed to create config: {}", e)))
}

/// Reject API servers older than the version that supports ephemeral containers
#[instrument(skip(client))]
pub async fn check_server_version(client: &Client) -> Result<()> {
    let info = client.apiserver_version().await?;
    debug!("API server reports version {}.{}", info.major, info.minor);
    check_version(&info.major, &info.minor)
}

/// Compare a `major`/`minor` pair as reported by `/version` against the minimum.
/// Providers append suffixes such as `"27+"` to the minor version, so only the
/// leading digits are considered.
pub fn check_version(major: &str, minor: &str) -> Result<()> {
    let unsupported = || DisruptorError::ClusterVersionUnsupported {
        version: format!("v{}.{}", major, minor),
    };

    let major_num = leading_number(major).ok_or_else(unsupported)?;
    let minor_num = leading_number(minor).ok_or_else(unsupported)?;

    if (major_num, minor_num) < (MIN_MAJOR, MIN_MINOR) {
        return Err(unsupported());
    }
    Ok(())
}

fn leading_number(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
