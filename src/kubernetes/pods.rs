// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Namespace-scoped pod operations: listing by label, ephemeral container
//! injection and command execution.

use crate::constants::inject::POLL_INTERVAL;
use crate::error::{DisruptorError, Result};
use k8s_openapi::api::core::v1::{EphemeralContainer, Pod};
use kube::{
    api::{AttachParams, ListParams, Patch, PatchParams},
    runtime::wait::Condition,
    Api, Client, ResourceExt,
};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument};

/// Label criteria for selecting pods
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodFilter {
    /// Labels a pod must carry with exactly these values
    pub select: BTreeMap<String, String>,
    /// Labels that disqualify a pod when present with these values
    pub exclude: BTreeMap<String, String>,
}

impl PodFilter {
    /// Whether a pod with `labels` passes this filter
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let selected = self
            .select
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v));
        let excluded = self
            .exclude
            .iter()
            .any(|(k, v)| labels.get(k) == Some(v));
        selected && !excluded
    }

    /// Server-side label selector for the `select` labels, if any
    pub fn label_selector(&self) -> Option<String> {
        if self.select.is_empty() {
            return None;
        }
        Some(
            self.select
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

/// Pod operations the agent controller depends on, scoped to one namespace.
pub trait PodHelper: Send + Sync {
    fn namespace(&self) -> &str;

    /// Names of the pods that match `filter`, in the order the cluster returns them
    fn list(&self, filter: &PodFilter) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Add `container` to the running pod. With `wait` set, block until the
    /// container is running or the bound elapses.
    fn add_ephemeral_container(
        &self,
        pod: &str,
        container: &EphemeralContainer,
        wait: Option<Duration>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Run `command` in `container` and return its stdout
    fn exec(
        &self,
        pod: &str,
        container: &str,
        command: &[String],
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Condition that holds once the named ephemeral container reports a running state
pub fn is_ephemeral_container_running(container: &str) -> impl Condition<Pod> {
    let container = container.to_string();
    move |obj: Option<&Pod>| {
        obj.and_then(|p| p.status.as_ref())
            .and_then(|s| s.ephemeral_container_statuses.as_ref())
            .is_some_and(|statuses| {
                statuses.iter().any(|cs| {
                    cs.name == container
                        && cs.state.as_ref().is_some_and(|st| st.running.is_some())
                })
            })
    }
}

/// Reason the named ephemeral container terminated, if it did
fn ephemeral_container_terminated(pod: &Pod, container: &str) -> Option<String> {
    pod.status
        .as_ref()
        .and_then(|s| s.ephemeral_container_statuses.as_ref())?
        .iter()
        .find(|cs| cs.name == container)
        .and_then(|cs| cs.state.as_ref())
        .and_then(|st| st.terminated.as_ref())
        .map(|t| {
            t.reason
                .clone()
                .unwrap_or_else(|| format!("exit code {}", t.exit_code))
        })
}

/// [`PodHelper`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubePodHelper {
    pods: Api<Pod>,
    namespace: String,
}

impl KubePodHelper {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            pods: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }

    async fn wait_until_running(&self, pod: &str, container: &str, bound: Duration) -> Result<()> {
        timeout(bound, self.poll_until_running(pod, container))
            .await
            .map_err(|_| DisruptorError::AgentNotReady {
                pod: pod.to_string(),
                reason: format!("not running after {:?}", bound),
            })?
    }

    async fn poll_until_running(&self, pod: &str, container: &str) -> Result<()> {
        let running = is_ephemeral_container_running(container);

        loop {
            let current = self.pods.get(pod).await?;
            if running.matches_object(Some(&current)) {
                return Ok(());
            }
            if let Some(reason) = ephemeral_container_terminated(&current, container) {
                return Err(DisruptorError::AgentNotReady {
                    pod: pod.to_string(),
                    reason: format!("container terminated: {}", reason),
                });
            }
            debug!("Agent container in pod {} not running yet", pod);
            sleep(POLL_INTERVAL).await;
        }
    }
}

impl PodHelper for KubePodHelper {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn list(&self, filter: &PodFilter) -> Result<Vec<String>> {
        let mut lp = ListParams::default();
        if let Some(selector) = filter.label_selector() {
            lp = lp.labels(&selector);
        }

        let pods = self.pods.list(&lp).await?;

        Ok(pods
            .items
            .into_iter()
            .filter(|p| filter.matches(p.labels()))
            .map(|p| p.name_any())
            .collect())
    }

    #[instrument(skip(self, container), fields(namespace = %self.namespace, container = %container.name))]
    async fn add_ephemeral_container(
        &self,
        pod: &str,
        container: &EphemeralContainer,
        wait: Option<Duration>,
    ) -> Result<()> {
        let patch = serde_json::json!({
            "spec": {
                "ephemeralContainers": [container]
            }
        });

        self.pods
            .patch_ephemeral_containers(pod, &PatchParams::default(), &Patch::Strategic(&patch))
            .await?;
        info!("Ephemeral container {} added to pod {}", container.name, pod);

        match wait {
            Some(bound) => self.wait_until_running(pod, &container.name, bound).await,
            None => Ok(()),
        }
    }

    #[instrument(skip(self, command), fields(namespace = %self.namespace))]
    async fn exec(&self, pod: &str, container: &str, command: &[String]) -> Result<String> {
        let exec_error = |reason: String| DisruptorError::Exec {
            pod: pod.to_string(),
            reason,
        };

        let ap = AttachParams::default()
            .container(container)
            .stdout(true)
            .stderr(true);

        let mut attached = self.pods.exec(pod, command.to_vec(), &ap).await?;

        let (stdout, stderr) = tokio::join!(
            read_output(attached.stdout()),
            read_output(attached.stderr())
        );
        let stdout = stdout.map_err(|e| exec_error(format!("reading stdout: {}", e)))?;
        let stderr = stderr.map_err(|e| exec_error(format!("reading stderr: {}", e)))?;

        let status = match attached.take_status() {
            Some(status) => status.await,
            None => None,
        };

        attached
            .join()
            .await
            .map_err(|e| exec_error(e.to_string()))?;

        match status {
            Some(s) if s.status.as_deref() == Some("Success") => Ok(stdout),
            Some(s) => Err(exec_error(format!(
                "{}: {}",
                s.message.unwrap_or_else(|| "command failed".to_string()),
                stderr.trim()
            ))),
            None => Err(exec_error("no exit status reported".to_string())),
        }
    }
}

async fn read_output<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
