// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pod disruptor: selects pods, injects the agent and applies protocol faults.

use crate::constants::agent::DEFAULT_IMAGE;
use crate::disruptors::commands::{
    build_grpc_fault_cmd, build_http_fault_cmd, FaultSpec, GrpcDisruptionOptions, GrpcFault,
    HttpDisruptionOptions, HttpFault,
};
use crate::disruptors::controller::{AgentController, InjectTimeout};
use crate::disruptors::selector::{select_targets, PodSelector};
use crate::error::{DisruptorError, Result};
use crate::kubernetes::{KubePodHelper, PodHelper};
use kube::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Options that control the PodDisruptor's behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodDisruptorOptions {
    pub inject_timeout: InjectTimeout,
    pub agent_image: String,
}

impl Default for PodDisruptorOptions {
    fn default() -> Self {
        Self {
            inject_timeout: InjectTimeout::Default,
            agent_image: DEFAULT_IMAGE.to_string(),
        }
    }
}

/// A disruptor bound to the pods matched at construction time, each with the
/// agent already injected.
pub struct PodDisruptor<H = KubePodHelper> {
    controller: AgentController<H>,
    cancel: CancellationToken,
}

impl PodDisruptor<KubePodHelper> {
    /// Create a disruptor for the pods matching `selector`. Returns only once
    /// the agent is injected into every matched pod.
    #[instrument(skip(client, cancel))]
    pub async fn new(
        client: Client,
        selector: PodSelector,
        options: PodDisruptorOptions,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let helper = KubePodHelper::new(client, selector.namespace_or_default());
        Self::with_helper(helper, selector, options, cancel).await
    }
}

impl<H: PodHelper> PodDisruptor<H> {
    /// Same as [`PodDisruptor::new`] with a caller-supplied pod helper. The
    /// helper must be scoped to the selector's (defaulted) namespace.
    pub async fn with_helper(
        helper: H,
        selector: PodSelector,
        options: PodDisruptorOptions,
        cancel: CancellationToken,
    ) -> Result<Self> {
        selector.validate()?;
        if helper.namespace() != selector.namespace_or_default() {
            return Err(DisruptorError::InvalidSelector(format!(
                "selector namespace {} does not match pod helper namespace {}",
                selector.namespace_or_default(),
                helper.namespace()
            )));
        }

        let targets = select_targets(&helper, &selector).await?;

        let mut controller = AgentController::new(
            helper,
            targets,
            options.inject_timeout,
            &options.agent_image,
        );
        controller.inject_disruptor_agent(&cancel).await?;

        Ok(Self { controller, cancel })
    }

    /// Pods the next fault will be applied to
    pub fn targets(&self) -> Vec<String> {
        self.controller.targets()
    }

    /// Inject faults in the HTTP requests served by the targets
    pub async fn inject_http_faults(
        &self,
        fault: &HttpFault,
        duration: Duration,
        options: &HttpDisruptionOptions,
    ) -> Result<()> {
        let cmd = build_http_fault_cmd(fault, duration, options)?;
        self.controller.exec_command(&cmd, &self.cancel).await
    }

    /// Inject faults in the gRPC requests served by the targets
    pub async fn inject_grpc_faults(
        &self,
        fault: &GrpcFault,
        duration: Duration,
        options: &GrpcDisruptionOptions,
    ) -> Result<()> {
        let cmd = build_grpc_fault_cmd(fault, duration, options)?;
        self.controller.exec_command(&cmd, &self.cancel).await
    }

    /// Inject whichever protocol fault `spec` describes
    pub async fn inject_faults(&self, spec: &FaultSpec, duration: Duration) -> Result<()> {
        info!(
            "Injecting {} fault for {:?} into {} pod(s)",
            spec.protocol(),
            duration,
            self.controller.targets().len()
        );
        match spec {
            FaultSpec::Http { fault, options } => {
                self.inject_http_faults(fault, duration, options).await
            }
            FaultSpec::Grpc { fault, options } => {
                self.inject_grpc_faults(fault, duration, options).await
            }
        }
    }
}
