// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Agent controller: injects the disruption agent into target pods and fans
//! fault commands out to the injected agents.

use crate::constants::agent::CONTAINER_NAME;
use crate::constants::inject::{DEFAULT_TIMEOUT, MAX_CONCURRENT_TARGET_OPS};
use crate::disruptors::commands::AgentCommand;
use crate::error::{DisruptorError, Result, TargetFailure};
use crate::kubernetes::PodHelper;
use futures::{stream, StreamExt};
use k8s_openapi::api::core::v1::{Capabilities, EphemeralContainer, SecurityContext};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// How long injection waits for the agent container to start running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InjectTimeout {
    /// Wait up to [`DEFAULT_TIMEOUT`]
    #[default]
    Default,
    Bounded(Duration),
    /// Return once the cluster accepts the container, without waiting for it to run
    NoWait,
}

impl InjectTimeout {
    /// Zero selects the default, a negative value disables waiting
    pub fn from_secs(secs: i64) -> Self {
        match secs {
            0 => InjectTimeout::Default,
            s if s < 0 => InjectTimeout::NoWait,
            s => InjectTimeout::Bounded(Duration::from_secs(s.unsigned_abs())),
        }
    }

    pub fn wait_bound(&self) -> Option<Duration> {
        match self {
            InjectTimeout::Default => Some(DEFAULT_TIMEOUT),
            InjectTimeout::Bounded(d) => Some(*d),
            InjectTimeout::NoWait => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    Pending,
    Injected,
    InjectionFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub state: TargetState,
}

/// Ephemeral container spec for the disruption agent
pub fn agent_container(image: &str) -> EphemeralContainer {
    EphemeralContainer {
        name: CONTAINER_NAME.to_string(),
        image: Some(image.to_string()),
        image_pull_policy: Some("IfNotPresent".to_string()),
        security_context: Some(SecurityContext {
            capabilities: Some(Capabilities {
                add: Some(vec!["NET_ADMIN".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        }),
        // keeps the agent alive between execs
        stdin: Some(true),
        tty: Some(true),
        ..Default::default()
    }
}

/// Drives the disruption agent on a fixed set of pods in one namespace.
pub struct AgentController<H> {
    helper: H,
    targets: Vec<Target>,
    inject_timeout: InjectTimeout,
    image: String,
}

impl<H: PodHelper> AgentController<H> {
    pub fn new(helper: H, targets: Vec<String>, inject_timeout: InjectTimeout, image: &str) -> Self {
        Self {
            helper,
            targets: targets
                .into_iter()
                .map(|name| Target {
                    name,
                    state: TargetState::Pending,
                })
                .collect(),
            inject_timeout,
            image: image.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        self.helper.namespace()
    }

    /// Names of the targets a subsequent [`exec_command`](Self::exec_command) acts on
    pub fn targets(&self) -> Vec<String> {
        self.targets
            .iter()
            .filter(|t| t.state == TargetState::Injected)
            .map(|t| t.name.clone())
            .collect()
    }

    pub fn target_states(&self) -> &[Target] {
        &self.targets
    }

    /// Inject the agent into every pending target. Fails if any target fails,
    /// naming each one. Not safe to call twice.
    #[instrument(skip(self, cancel), fields(namespace = %self.helper.namespace()))]
    pub async fn inject_disruptor_agent(&mut self, cancel: &CancellationToken) -> Result<()> {
        let container = agent_container(&self.image);
        let wait = self.inject_timeout.wait_bound();
        let pending: Vec<String> = self
            .targets
            .iter()
            .filter(|t| t.state == TargetState::Pending)
            .map(|t| t.name.clone())
            .collect();

        info!(
            "Injecting agent into {} pod(s), wait bound {:?}",
            pending.len(),
            wait
        );

        let helper = &self.helper;
        let mut results = fan_out(&pending, "agent injection", cancel, |pod| {
            helper.add_ephemeral_container(pod, &container, wait)
        })
        .await?;

        let mut failures = Vec::new();
        for target in self.targets.iter_mut() {
            match results.remove(&target.name) {
                Some(Ok(())) => {
                    debug!("Agent injected into pod {}", target.name);
                    target.state = TargetState::Injected;
                }
                Some(Err(e)) => {
                    error!("Failed to inject agent into pod {}: {}", target.name, e);
                    target.state = TargetState::InjectionFailed(e.to_string());
                    failures.push(TargetFailure::new(&target.name, e));
                }
                None => {}
            }
        }

        if !failures.is_empty() {
            return Err(DisruptorError::InjectionFailed { failures });
        }

        info!("Agent injected into all {} target pod(s)", pending.len());
        Ok(())
    }

    /// Run `cmd` in the agent of every injected target. Fails if any exec
    /// fails, naming each one; faults already started elsewhere are left running.
    #[instrument(skip(self, cancel), fields(namespace = %self.helper.namespace(), command = %cmd))]
    pub async fn exec_command(&self, cmd: &AgentCommand, cancel: &CancellationToken) -> Result<()> {
        let injected = self.targets();

        let skipped = self.targets.len() - injected.len();
        if skipped > 0 {
            debug!("Skipping {} target(s) without an injected agent", skipped);
        }
        if injected.is_empty() {
            return Err(DisruptorError::NoTargetsFound {
                namespace: self.helper.namespace().to_string(),
            });
        }

        info!("Executing fault command on {} pod(s)", injected.len());

        let helper = &self.helper;
        let mut results = fan_out(&injected, "fault execution", cancel, |pod| {
            helper.exec(pod, CONTAINER_NAME, cmd.args())
        })
        .await?;

        let mut failures = Vec::new();
        for pod in &injected {
            match results.remove(pod) {
                Some(Ok(stdout)) => debug!("Agent in pod {} accepted command: {}", pod, stdout.trim()),
                Some(Err(e)) => {
                    error!("Fault command failed in pod {}: {}", pod, e);
                    failures.push(TargetFailure::new(pod, e));
                }
                None => {}
            }
        }

        if !failures.is_empty() {
            return Err(DisruptorError::ExecFailed { failures });
        }
        Ok(())
    }
}

/// Run `op` for every pod with bounded concurrency and join all results before
/// returning. Cancellation drops every in-flight operation.
async fn fan_out<'a, T, F, Fut>(
    pods: &'a [String],
    stage: &'static str,
    cancel: &CancellationToken,
    op: F,
) -> Result<HashMap<String, Result<T>>>
where
    F: Fn(&'a str) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let all = stream::iter(pods)
        .map(|pod| {
            let fut = op(pod.as_str());
            async move { (pod.clone(), fut.await) }
        })
        .buffer_unordered(MAX_CONCURRENT_TARGET_OPS)
        .collect::<HashMap<_, _>>();

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            warn!("Cancelled during {}, abandoning in-flight operations", stage);
            Err(DisruptorError::Cancelled(stage))
        }
        results = all => Ok(results),
    }
}
