// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Disruption agent container settings
pub mod agent {
    /// Name of the ephemeral container injected into every target pod
    pub const CONTAINER_NAME: &str = "xk6-agent";
    /// Default image for the agent container
    pub const DEFAULT_IMAGE: &str = "ghcr.io/grafana/xk6-disruptor-agent:latest";
    /// Executable invoked inside the agent container for each fault
    pub const BINARY: &str = "xk6-disruptor-agent";
}

/// Injection timing
pub mod inject {
    use std::time::Duration;

    /// Wait bound used when the caller passes a zero inject timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
    /// Interval between readiness checks of the agent container
    pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
    /// Upper bound on concurrent per-target API calls
    pub const MAX_CONCURRENT_TARGET_OPS: usize = 10;
}

/// Minimum supported API server version
pub mod version {
    pub const MIN_MAJOR: u32 = 1;
    pub const MIN_MINOR: u32 = 23;
}

/// Namespace used when a selector leaves it empty
pub const DEFAULT_NAMESPACE: &str = "default";
