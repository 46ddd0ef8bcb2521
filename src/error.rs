// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::fmt;
use thiserror::Error;

/// A single pod that failed a fan-out operation, with the reason it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFailure {
    pub pod: String,
    pub reason: String,
}

impl TargetFailure {
    pub fn new(pod: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            pod: pod.into(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pod, self.reason)
    }
}

fn join_failures(failures: &[TargetFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum DisruptorError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Failed to build cluster client: {0}")]
    Kubeconfig(String),

    #[error("Invalid pod selector: {0}")]
    InvalidSelector(String),

    #[error("Unsupported Kubernetes version. Expected >= v1.23 but actual is {version}")]
    ClusterVersionUnsupported { version: String },

    #[error("Agent injection failed for {} pod(s): {}", failures.len(), join_failures(failures))]
    InjectionFailed { failures: Vec<TargetFailure> },

    #[error("Fault command failed for {} pod(s): {}", failures.len(), join_failures(failures))]
    ExecFailed { failures: Vec<TargetFailure> },

    #[error("Invalid fault specification: {0}")]
    InvalidFaultSpec(String),

    #[error("No injected targets in namespace {namespace}")]
    NoTargetsFound { namespace: String },

    #[error("Cancelled during {0}")]
    Cancelled(&'static str),

    #[error("Agent container in pod {pod} is not ready: {reason}")]
    AgentNotReady { pod: String, reason: String },

    #[error("Exec in pod {pod} failed: {reason}")]
    Exec { pod: String, reason: String },
}

impl DisruptorError {
    /// Pods named by an aggregated failure, in the order they were reported.
    pub fn failed_pods(&self) -> Vec<&str> {
        match self {
            DisruptorError::InjectionFailed { failures } | DisruptorError::ExecFailed { failures } => {
                failures.iter().map(|f| f.pod.as_str()).collect()
            }
            DisruptorError::AgentNotReady { pod, .. } | DisruptorError::Exec { pod, .. } => {
                vec![pod.as_str()]
            }
            _ => Vec::new(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DisruptorError>;
