// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes access: client creation, version checks and namespace-scoped pod helpers.

pub mod client;
pub mod pods;

pub use client::{build_client, check_server_version};
pub use pods::{KubePodHelper, PodFilter, PodHelper};
