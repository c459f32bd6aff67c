use std::collections::BTreeMap;

use moca_core::{compute_rates, fmr_request_version, MocaVersion, NodeMask, RateMatrix};
use serde::Serialize;
use tracing::{debug, warn};

use crate::client::{ClientError, DeviceApi};

/// A node that answered its info query during a scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub node: u8,
    pub version: MocaVersion,
    pub is_nc: bool,
}

/// Everything one scrape learned about a device's coax network.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub device: String,
    pub my_node: u8,
    pub nc_node: u8,
    pub nc_version: MocaVersion,
    pub network_version: MocaVersion,
    pub node_mask: NodeMask,
    pub nodes: Vec<NodeSummary>,
    pub rates: RateMatrix,
}

/// Scrapes one adapter.
pub struct Collector<C> {
    name: String,
    client: C,
}

impl<C: DeviceApi> Collector<C> {
    pub fn new(name: impl Into<String>, client: C) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Only the local info query is fatal. A node whose info or FMR query
    /// fails, or whose payload does not decode, is logged and left out.
    pub async fn scrape(&self) -> Result<DeviceSnapshot, ClientError> {
        let local = self.client.local_info().await?;

        let mut versions = BTreeMap::new();
        for node in local.node_mask.iter() {
            match self.client.node_info(node).await {
                Ok(info) => {
                    versions.insert(node, info.version);
                }
                Err(e) => warn!(device = %self.name, node, error = %e, "Failed to get node info"),
            }
        }

        let nc_version = versions.get(&local.nc_node).copied().unwrap_or_default();
        let mut rates = RateMatrix::new();

        for (&node, &version) in &versions {
            let request_version = fmr_request_version(version, nc_version);
            let words = match self.client.fmr_info(NodeMask::single(node), request_version).await {
                Ok(words) => words,
                Err(e) => {
                    warn!(device = %self.name, node, error = %e, "Failed to get FMR info");
                    continue;
                }
            };

            match compute_rates(
                node,
                &words,
                version,
                nc_version,
                local.network_version,
                local.node_mask,
                &versions,
            ) {
                Ok(row) => {
                    debug!(device = %self.name, node, destinations = row.nper.len(), "Decoded FMR payload");
                    rates.insert(row);
                }
                Err(e) => warn!(
                    device = %self.name,
                    node,
                    words = words.len(),
                    error = %e,
                    "Failed to calculate PHY rates"
                ),
            }
        }

        let nodes = versions
            .iter()
            .map(|(&node, &version)| NodeSummary {
                node,
                version,
                is_nc: node == local.nc_node,
            })
            .collect();

        Ok(DeviceSnapshot {
            device: self.name.clone(),
            my_node: local.my_node,
            nc_node: local.nc_node,
            nc_version,
            network_version: local.network_version,
            node_mask: local.node_mask,
            nodes,
            rates,
        })
    }
}
