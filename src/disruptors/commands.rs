// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Fault specifications and their translation into agent command lines.

use crate::constants::agent::BINARY;
use crate::error::{DisruptorError, Result};
use std::fmt;
use std::time::Duration;

/// Fault applied to HTTP requests served by the target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpFault {
    pub average_delay: Duration,
    pub delay_variation: Duration,
    /// Fraction of requests answered with `error_code`, in [0, 1]
    pub error_rate: f64,
    pub error_code: u16,
    pub error_body: String,
    /// Path prefixes left untouched
    pub exclude: Vec<String>,
    /// Port the target serves on; zero leaves the agent default
    pub port: u16,
}

/// Fault applied to gRPC requests served by the target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrpcFault {
    pub average_delay: Duration,
    pub delay_variation: Duration,
    pub error_rate: f64,
    pub status_code: i32,
    pub status_message: String,
    /// Fully qualified service names left untouched
    pub exclude: Vec<String>,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpDisruptionOptions {
    pub proxy_port: u16,
    pub iface: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrpcDisruptionOptions {
    pub proxy_port: u16,
    pub iface: String,
}

/// A fault together with its protocol-specific disruption options
#[derive(Debug, Clone, PartialEq)]
pub enum FaultSpec {
    Http {
        fault: HttpFault,
        options: HttpDisruptionOptions,
    },
    Grpc {
        fault: GrpcFault,
        options: GrpcDisruptionOptions,
    },
}

impl FaultSpec {
    pub fn protocol(&self) -> &'static str {
        match self {
            FaultSpec::Http { .. } => "http",
            FaultSpec::Grpc { .. } => "grpc",
        }
    }

    /// Build the agent command that applies this fault for `duration`
    pub fn build(&self, duration: Duration) -> Result<AgentCommand> {
        match self {
            FaultSpec::Http { fault, options } => build_http_fault_cmd(fault, duration, options),
            FaultSpec::Grpc { fault, options } => build_grpc_fault_cmd(fault, duration, options),
        }
    }
}

/// Argument vector executed inside the agent container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCommand(Vec<String>);

impl AgentCommand {
    fn new(protocol: &str, duration: Duration) -> Self {
        Self(vec![
            BINARY.to_string(),
            protocol.to_string(),
            "-d".to_string(),
            format_duration(duration),
        ])
    }

    fn arg(&mut self, flag: &str, value: impl ToString) -> &mut Self {
        self.0.push(flag.to_string());
        self.0.push(value.to_string());
        self
    }

    pub fn args(&self) -> &[String] {
        &self.0
    }

    /// Value following `flag`, if present
    pub fn flag(&self, flag: &str) -> Option<&str> {
        self.0
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.0.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for AgentCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// Format a duration with an explicit unit, without losing precision
pub fn format_duration(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        format!("{}s", d.as_secs())
    } else if d.as_nanos() % 1_000_000 == 0 {
        format!("{}ms", d.as_millis())
    } else if d.as_nanos() % 1_000 == 0 {
        format!("{}us", d.as_micros())
    } else {
        format!("{}ns", d.as_nanos())
    }
}

fn validate_common(
    duration: Duration,
    error_rate: f64,
    average_delay: Duration,
    delay_variation: Duration,
    exclude: &[String],
) -> Result<()> {
    if duration.is_zero() {
        return Err(DisruptorError::InvalidFaultSpec(
            "duration must be positive".to_string(),
        ));
    }
    if !error_rate.is_finite() || !(0.0..=1.0).contains(&error_rate) {
        return Err(DisruptorError::InvalidFaultSpec(format!(
            "error rate must be in [0, 1], got {}",
            error_rate
        )));
    }
    if delay_variation > average_delay {
        return Err(DisruptorError::InvalidFaultSpec(format!(
            "delay variation {:?} exceeds average delay {:?}",
            delay_variation, average_delay
        )));
    }
    // the agent receives exclusions as one comma separated value
    if let Some(entry) = exclude.iter().find(|e| e.is_empty() || e.contains(',')) {
        return Err(DisruptorError::InvalidFaultSpec(format!(
            "exclude entry '{}' must be non-empty and cannot contain ','",
            entry
        )));
    }
    Ok(())
}

pub fn build_http_fault_cmd(
    fault: &HttpFault,
    duration: Duration,
    options: &HttpDisruptionOptions,
) -> Result<AgentCommand> {
    validate_common(
        duration,
        fault.error_rate,
        fault.average_delay,
        fault.delay_variation,
        &fault.exclude,
    )?;
    if fault.error_rate > 0.0 && fault.error_code == 0 {
        return Err(DisruptorError::InvalidFaultSpec(
            "error code is required when error rate is set".to_string(),
        ));
    }

    let mut cmd = AgentCommand::new("http", duration);

    if !fault.average_delay.is_zero() {
        cmd.arg("-a", format_duration(fault.average_delay))
            .arg("-v", format_duration(fault.delay_variation));
    }
    if fault.error_rate > 0.0 {
        cmd.arg("-r", fault.error_rate).arg("-e", fault.error_code);
        if !fault.error_body.is_empty() {
            cmd.arg("-b", &fault.error_body);
        }
    }
    if fault.port != 0 {
        cmd.arg("-t", fault.port);
    }
    if !fault.exclude.is_empty() {
        cmd.arg("-x", fault.exclude.join(","));
    }
    if options.proxy_port != 0 {
        cmd.arg("-p", options.proxy_port);
    }
    if !options.iface.is_empty() {
        cmd.arg("-i", &options.iface);
    }

    Ok(cmd)
}

pub fn build_grpc_fault_cmd(
    fault: &GrpcFault,
    duration: Duration,
    options: &GrpcDisruptionOptions,
) -> Result<AgentCommand> {
    validate_common(
        duration,
        fault.error_rate,
        fault.average_delay,
        fault.delay_variation,
        &fault.exclude,
    )?;

    let mut cmd = AgentCommand::new("grpc", duration);

    if !fault.average_delay.is_zero() {
        cmd.arg("-a", format_duration(fault.average_delay))
            .arg("-v", format_duration(fault.delay_variation));
    }
    if fault.error_rate > 0.0 {
        cmd.arg("-r", fault.error_rate).arg("-s", fault.status_code);
        if !fault.status_message.is_empty() {
            cmd.arg("-m", &fault.status_message);
        }
    }
    if fault.port != 0 {
        cmd.arg("-t", fault.port);
    }
    if !fault.exclude.is_empty() {
        cmd.arg("-x", fault.exclude.join(","));
    }
    if options.proxy_port != 0 {
        cmd.arg("-p", options.proxy_port);
    }
    if !options.iface.is_empty() {
        cmd.arg("-i", &options.iface);
    }

    Ok(cmd)
}
