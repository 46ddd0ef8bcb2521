// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Disruptors that inject protocol faults into selected pods.

pub mod commands;
pub mod controller;
pub mod pod;
pub mod selector;

pub use commands::{
    AgentCommand, FaultSpec, GrpcDisruptionOptions, GrpcFault, HttpDisruptionOptions, HttpFault,
};
pub use controller::{AgentController, InjectTimeout, Target, TargetState};
pub use pod::{PodDisruptor, PodDisruptorOptions};
pub use selector::{select_targets, PodAttributes, PodSelector};
