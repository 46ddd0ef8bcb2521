// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes API responses and pod operations.

use crate::constants::agent::DEFAULT_IMAGE;
use crate::disruptors::controller::agent_container as agent_container_spec;
use crate::error::{DisruptorError, Result};
use crate::kubernetes::{PodFilter, PodHelper};
use http::{Request, Response};
use k8s_openapi::api::core::v1::EphemeralContainer;
use kube::client::Body;
use kube::Client;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

type ResponseKey = (String, String);

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<ResponseKey, VecDeque<(u16, String)>>>>,
    requests: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, responses: Vec<(u16, String)>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), responses.into());
        self
    }

    /// Add a response for GET requests matching the path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, vec![(status, body.to_string())])
    }

    /// Answer successive GET requests with `responses` in order, repeating the last one
    pub fn on_get_sequence(self, path: &str, responses: Vec<(u16, String)>) -> Self {
        self.on("GET", path, responses)
    }

    /// Add a response for PATCH requests matching the path
    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, vec![(status, body.to_string())])
    }

    /// Handle to the (method, path) of every request received so far
    pub fn recorded(&self) -> Arc<Mutex<Vec<(String, String)>>> {
        self.requests.clone()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let mut responses = self.responses.lock().unwrap();

        let key = (method.to_string(), path.to_string());
        let key = if responses.contains_key(&key) {
            key
        } else {
            // Fall back to a prefix match for paths like /api/v1/namespaces/foo
            responses
                .keys()
                .find(|(m, p)| m == method && path.starts_with(p.as_str()))
                .cloned()?
        };

        let queue = responses.get_mut(&key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        self.requests
            .lock()
            .unwrap()
            .push((method.clone(), path.clone()));
        let response = self.find_response(&method, &path);

        Box::pin(async move {
            let (status, body) = response.unwrap_or_else(|| (404, not_found_json("path", &path)));
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a pod JSON response. `agent_state` is one of `waiting`, `running` or
/// `terminated` and sets the state of the agent's ephemeral container status.
pub fn pod_json(name: &str, agent_state: Option<&str>) -> String {
    pod_value(name, &[], agent_state).to_string()
}

/// Create a pod list JSON response from (name, labels) pairs
pub fn pod_list_json(pods: &[(&str, Vec<(&str, &str)>)]) -> String {
    let items: Vec<_> = pods
        .iter()
        .map(|(name, labels)| pod_value(name, labels, None))
        .collect();

    serde_json::json!({
        "apiVersion": "v1",
        "kind": "PodList",
        "metadata": { "resourceVersion": "1" },
        "items": items
    })
    .to_string()
}

fn pod_value(name: &str, labels: &[(&str, &str)], agent_state: Option<&str>) -> serde_json::Value {
    let labels: BTreeMap<_, _> = labels.iter().cloned().collect();
    let mut pod = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": name,
            "namespace": "ns1",
            "uid": format!("{}-uid", name),
            "labels": labels
        },
        "spec": {
            "containers": [{ "name": "app", "image": "app:latest" }]
        }
    });

    if let Some(state) = agent_state {
        let state = match state {
            "running" => serde_json::json!({ "running": { "startedAt": "2026-01-01T00:00:00Z" } }),
            "terminated" => serde_json::json!({ "terminated": { "exitCode": 1, "reason": "Error" } }),
            _ => serde_json::json!({ "waiting": { "reason": "ContainerCreating" } }),
        };
        pod["status"] = serde_json::json!({
            "phase": "Running",
            "ephemeralContainerStatuses": [{
                "name": "xk6-agent",
                "image": DEFAULT_IMAGE,
                "imageID": "",
                "ready": false,
                "restartCount": 0,
                "state": state
            }]
        });
    }

    pod
}

/// Create a `/version` JSON response
pub fn version_json(major: &str, minor: &str) -> String {
    serde_json::json!({
        "major": major,
        "minor": minor,
        "gitVersion": format!("v{}.{}.0", major, minor),
        "gitCommit": "0000000",
        "gitTreeState": "clean",
        "buildDate": "2026-01-01T00:00:00Z",
        "goVersion": "go1.22.0",
        "compiler": "gc",
        "platform": "linux/amd64"
    })
    .to_string()
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Agent container spec with the default image
pub fn agent_container() -> EphemeralContainer {
    agent_container_spec(DEFAULT_IMAGE)
}

/// A call received by [`FakePodHelper`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Inject {
        pod: String,
        wait: Option<Duration>,
    },
    Exec {
        pod: String,
        container: String,
        command: Vec<String>,
    },
}

/// In-memory [`PodHelper`] with scripted per-pod outcomes.
/// Clones share the call log.
#[derive(Clone)]
pub struct FakePodHelper {
    namespace: String,
    pods: Vec<(String, BTreeMap<String, String>)>,
    inject_failures: HashMap<String, String>,
    never_ready: HashSet<String>,
    exec_failures: HashMap<String, String>,
    agent_startup: Duration,
    hang_exec: bool,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl FakePodHelper {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            pods: Vec::new(),
            inject_failures: HashMap::new(),
            never_ready: HashSet::new(),
            exec_failures: HashMap::new(),
            agent_startup: Duration::ZERO,
            hang_exec: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_pod(mut self, name: &str, labels: &[(&str, &str)]) -> Self {
        let labels = labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.pods.push((name.to_string(), labels));
        self
    }

    /// The cluster rejects the agent container for `pod`
    pub fn fail_inject(mut self, pod: &str, reason: &str) -> Self {
        self.inject_failures.insert(pod.to_string(), reason.to_string());
        self
    }

    /// The agent in `pod` never reaches the running state
    pub fn agent_never_ready(mut self, pod: &str) -> Self {
        self.never_ready.insert(pod.to_string());
        self
    }

    /// Time every agent takes to start running after being added
    pub fn agent_startup(mut self, startup: Duration) -> Self {
        self.agent_startup = startup;
        self
    }

    pub fn fail_exec(mut self, pod: &str, reason: &str) -> Self {
        self.exec_failures.insert(pod.to_string(), reason.to_string());
        self
    }

    /// Exec calls never complete
    pub fn hang_exec(mut self) -> Self {
        self.hang_exec = true;
        self
    }

    pub fn pod_names(&self) -> Vec<String> {
        self.pods.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl PodHelper for FakePodHelper {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn list(&self, filter: &PodFilter) -> Result<Vec<String>> {
        self.record(Call::List);
        Ok(self
            .pods
            .iter()
            .filter(|(_, labels)| filter.matches(labels))
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn add_ephemeral_container(
        &self,
        pod: &str,
        _container: &EphemeralContainer,
        wait: Option<Duration>,
    ) -> Result<()> {
        self.record(Call::Inject {
            pod: pod.to_string(),
            wait,
        });

        if let Some(reason) = self.inject_failures.get(pod) {
            return Err(DisruptorError::AgentNotReady {
                pod: pod.to_string(),
                reason: reason.clone(),
            });
        }

        let Some(bound) = wait else {
            return Ok(());
        };

        let startup = (!self.never_ready.contains(pod)).then_some(self.agent_startup);
        match startup {
            Some(startup) if startup <= bound => {
                if !startup.is_zero() {
                    tokio::time::sleep(startup).await;
                }
                Ok(())
            }
            _ => {
                tokio::time::sleep(bound).await;
                Err(DisruptorError::AgentNotReady {
                    pod: pod.to_string(),
                    reason: format!("not running after {:?}", bound),
                })
            }
        }
    }

    async fn exec(&self, pod: &str, container: &str, command: &[String]) -> Result<String> {
        self.record(Call::Exec {
            pod: pod.to_string(),
            container: container.to_string(),
            command: command.to_vec(),
        });

        if self.hang_exec {
            std::future::pending::<()>().await;
        }

        match self.exec_failures.get(pod) {
            Some(reason) => Err(DisruptorError::Exec {
                pod: pod.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(String::new()),
        }
    }
}
