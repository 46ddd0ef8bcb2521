// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::agent::DEFAULT_IMAGE;
use crate::disruptors::{
    FaultSpec, GrpcDisruptionOptions, GrpcFault, HttpDisruptionOptions, HttpFault, InjectTimeout,
    PodAttributes, PodDisruptorOptions, PodSelector,
};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Runner configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Kubeconfig to use instead of the inferred one
    pub kubeconfig: Option<PathBuf>,
    pub experiment: ExperimentConfig,
}

impl Config {
    /// Load configuration from environment variables. `EXPERIMENT_FILE`, when
    /// set, replaces the individual experiment variables.
    pub fn from_env() -> Result<Self> {
        let kubeconfig = env::var("KUBECONFIG_PATH").ok().map(PathBuf::from);

        let experiment = match env::var("EXPERIMENT_FILE") {
            Ok(path) => ExperimentConfig::from_file(&path)?,
            Err(_) => ExperimentConfig::from_vars(|key| env::var(key).ok())?,
        };

        Ok(Config {
            kubeconfig,
            experiment,
        })
    }
}

/// A single fault experiment: which pods, how to inject, what to do to them
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentConfig {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub select: BTreeMap<String, String>,
    #[serde(default)]
    pub exclude: BTreeMap<String, String>,
    /// Zero uses the default wait, negative skips waiting
    #[serde(default)]
    pub inject_timeout_secs: i64,
    #[serde(default = "default_agent_image")]
    pub agent_image: String,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    pub fault: FaultConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "protocol", rename_all = "lowercase")]
pub enum FaultConfig {
    Http(HttpFaultConfig),
    Grpc(GrpcFaultConfig),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpFaultConfig {
    pub average_delay_ms: u64,
    pub delay_variation_ms: u64,
    pub error_rate: f64,
    pub error_code: u16,
    pub error_body: String,
    pub exclude: Vec<String>,
    pub port: u16,
    pub proxy_port: u16,
    pub iface: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GrpcFaultConfig {
    pub average_delay_ms: u64,
    pub delay_variation_ms: u64,
    pub error_rate: f64,
    pub status_code: i32,
    pub status_message: String,
    pub exclude: Vec<String>,
    pub port: u16,
    pub proxy_port: u16,
    pub iface: String,
}

fn default_agent_image() -> String {
    DEFAULT_IMAGE.to_string()
}

fn default_duration_secs() -> u64 {
    30
}

impl ExperimentConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read experiment file {}", path))?;
        Self::from_yaml(&raw).with_context(|| format!("Invalid experiment file {}", path))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Build an experiment from individual variables resolved through `lookup`
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).unwrap_or_default();

        let exclude = split_list(&var("EXCLUDE"));
        let average_delay_ms = parse_var(&lookup, "AVERAGE_DELAY_MS", 0)?;
        let delay_variation_ms = parse_var(&lookup, "DELAY_VARIATION_MS", 0)?;
        let error_rate = parse_var(&lookup, "ERROR_RATE", 0.0)?;
        let port = parse_var(&lookup, "TARGET_PORT", 0)?;
        let proxy_port = parse_var(&lookup, "PROXY_PORT", 0)?;

        let protocol = lookup("FAULT_PROTOCOL").unwrap_or_else(|| "http".to_string());
        let fault = match protocol.as_str() {
            "http" => FaultConfig::Http(HttpFaultConfig {
                average_delay_ms,
                delay_variation_ms,
                error_rate,
                error_code: parse_var(&lookup, "ERROR_CODE", 0)?,
                exclude,
                port,
                proxy_port,
                ..Default::default()
            }),
            "grpc" => FaultConfig::Grpc(GrpcFaultConfig {
                average_delay_ms,
                delay_variation_ms,
                error_rate,
                status_code: parse_var(&lookup, "ERROR_CODE", 0)?,
                exclude,
                port,
                proxy_port,
                ..Default::default()
            }),
            other => bail!("FAULT_PROTOCOL must be http or grpc, got {}", other),
        };

        Ok(ExperimentConfig {
            namespace: var("TARGET_NAMESPACE"),
            select: parse_labels(&var("SELECT_LABELS")).context("Invalid SELECT_LABELS")?,
            exclude: parse_labels(&var("EXCLUDE_LABELS")).context("Invalid EXCLUDE_LABELS")?,
            inject_timeout_secs: parse_var(&lookup, "INJECT_TIMEOUT_SECS", 0)?,
            agent_image: lookup("AGENT_IMAGE").unwrap_or_else(default_agent_image),
            duration_secs: parse_var(&lookup, "FAULT_DURATION_SECS", default_duration_secs())?,
            fault,
        })
    }

    pub fn selector(&self) -> PodSelector {
        PodSelector {
            namespace: self.namespace.clone(),
            select: PodAttributes {
                labels: self.select.clone(),
            },
            exclude: PodAttributes {
                labels: self.exclude.clone(),
            },
        }
    }

    pub fn options(&self) -> PodDisruptorOptions {
        PodDisruptorOptions {
            inject_timeout: InjectTimeout::from_secs(self.inject_timeout_secs),
            agent_image: self.agent_image.clone(),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn fault_spec(&self) -> FaultSpec {
        match &self.fault {
            FaultConfig::Http(c) => FaultSpec::Http {
                fault: HttpFault {
                    average_delay: Duration::from_millis(c.average_delay_ms),
                    delay_variation: Duration::from_millis(c.delay_variation_ms),
                    error_rate: c.error_rate,
                    error_code: c.error_code,
                    error_body: c.error_body.clone(),
                    exclude: c.exclude.clone(),
                    port: c.port,
                },
                options: HttpDisruptionOptions {
                    proxy_port: c.proxy_port,
                    iface: c.iface.clone(),
                },
            },
            FaultConfig::Grpc(c) => FaultSpec::Grpc {
                fault: GrpcFault {
                    average_delay: Duration::from_millis(c.average_delay_ms),
                    delay_variation: Duration::from_millis(c.delay_variation_ms),
                    error_rate: c.error_rate,
                    status_code: c.status_code,
                    status_message: c.status_message.clone(),
                    exclude: c.exclude.clone(),
                    port: c.port,
                },
                options: GrpcDisruptionOptions {
                    proxy_port: c.proxy_port,
                    iface: c.iface.clone(),
                },
            },
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, raw)),
        _ => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse `key=value` pairs separated by commas
pub fn parse_labels(raw: &str) -> Result<BTreeMap<String, String>> {
    split_list(raw)
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.trim().to_string())),
            _ => bail!("expected key=value, got '{}'", pair),
        })
        .collect()
}
