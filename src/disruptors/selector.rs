// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pod selection by namespace and labels.

use crate::constants::DEFAULT_NAMESPACE;
use crate::error::{DisruptorError, Result};
use crate::kubernetes::{PodFilter, PodHelper};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

/// Attributes a pod must match for being selected or excluded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodAttributes {
    pub labels: BTreeMap<String, String>,
}

impl PodAttributes {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Criteria for selecting the pods to disrupt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PodSelector {
    pub namespace: String,
    pub select: PodAttributes,
    pub exclude: PodAttributes,
}

impl PodSelector {
    /// A fully empty selector would match every pod in the cluster
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() && self.select.is_empty() && self.exclude.is_empty() {
            return Err(DisruptorError::InvalidSelector(
                "namespace, select and exclude attributes in pod selector cannot all be empty"
                    .to_string(),
            ));
        }
        Ok(())
    }

    pub fn namespace_or_default(&self) -> &str {
        if self.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            &self.namespace
        }
    }

    pub fn filter(&self) -> PodFilter {
        PodFilter {
            select: self.select.labels.clone(),
            exclude: self.exclude.labels.clone(),
        }
    }
}

/// Resolve `selector` into target pod names using `helper`, which must be
/// scoped to the selector's (defaulted) namespace. An empty match is not an error.
#[instrument(skip(helper), fields(namespace = %helper.namespace()))]
pub async fn select_targets<H: PodHelper>(helper: &H, selector: &PodSelector) -> Result<Vec<String>> {
    selector.validate()?;

    let targets = helper.list(&selector.filter()).await?;

    if targets.is_empty() {
        warn!("No pods match the selector");
    } else {
        info!("Selected {} target pod(s): {:?}", targets.len(), targets);
    }

    Ok(targets)
}
