use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::client::{DeviceApi, DeviceClient};
use crate::collector::{Collector, DeviceSnapshot};
use crate::config::Config;

/// Result of scraping one device once.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub device: String,
    pub snapshot: Option<DeviceSnapshot>,
    pub duration: Duration,
    /// Failed scrapes of this device since startup, including this one.
    pub errors_total: u64,
}

impl ScrapeOutcome {
    pub fn up(&self) -> bool {
        self.snapshot.is_some()
    }
}

struct DeviceEntry<C> {
    collector: Collector<C>,
    address: String,
    errors_total: AtomicU64,
    last: RwLock<Option<DeviceSnapshot>>,
}

/// One collector per configured device.
pub struct DeviceRegistry<C> {
    devices: Vec<Arc<DeviceEntry<C>>>,
    timeout: Duration,
}

impl DeviceRegistry<DeviceClient> {
    /// Build a client per configured device. Devices whose client cannot be
    /// constructed are logged and left out; at least one must remain.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let timeout = config.timeout();
        let mut registry = Self::new(timeout);
        let total = config.devices.len();

        for (i, device) in config.devices.iter().enumerate() {
            match DeviceClient::new(&device.address, &device.username, &device.password, timeout) {
                Ok(client) => {
                    registry.add(Collector::new(device.name.clone(), client), device.address.clone());
                    info!(
                        index = i + 1,
                        total,
                        device = %device.name,
                        address = %device.address,
                        "Created collector"
                    );
                }
                Err(e) => warn!(device = %device.name, error = %e, "Failed to create collector"),
            }
        }

        if registry.is_empty() {
            anyhow::bail!("no collectors were successfully created");
        }
        Ok(registry)
    }
}

impl<C: DeviceApi + 'static> DeviceRegistry<C> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            devices: Vec::new(),
            timeout,
        }
    }

    pub fn add(&mut self, collector: Collector<C>, address: impl Into<String>) {
        self.devices.push(Arc::new(DeviceEntry {
            collector,
            address: address.into(),
            errors_total: AtomicU64::new(0),
            last: RwLock::new(None),
        }));
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// `(name, address)` of every device, in configuration order.
    pub fn devices(&self) -> Vec<(String, String)> {
        self.devices
            .iter()
            .map(|d| (d.collector.name().to_string(), d.address.clone()))
            .collect()
    }

    /// Scrape every device concurrently, each bounded by the scrape timeout.
    /// Outcomes come back in configuration order.
    pub async fn scrape_all(&self) -> Vec<ScrapeOutcome> {
        let mut tasks = JoinSet::new();
        for (index, entry) in self.devices.iter().enumerate() {
            let entry = Arc::clone(entry);
            let timeout = self.timeout;
            tasks.spawn(async move { (index, scrape_device(&entry, timeout).await) });
        }

        let mut outcomes = Vec::with_capacity(self.devices.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!(error = %e, "Scrape task failed"),
            }
        }
        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Most recent successful snapshot of every device that has one.
    pub async fn last_snapshots(&self) -> Vec<DeviceSnapshot> {
        let mut snapshots = Vec::new();
        for entry in &self.devices {
            if let Some(snapshot) = entry.last.read().await.clone() {
                snapshots.push(snapshot);
            }
        }
        snapshots
    }
}

async fn scrape_device<C: DeviceApi>(entry: &DeviceEntry<C>, timeout: Duration) -> ScrapeOutcome {
    let name = entry.collector.name().to_string();
    let start = Instant::now();

    let snapshot = match tokio::time::timeout(timeout, entry.collector.scrape()).await {
        Ok(Ok(snapshot)) => Some(snapshot),
        Ok(Err(e)) => {
            error!(device = %name, error = %e, "Error collecting metrics");
            None
        }
        Err(_) => {
            error!(device = %name, timeout_secs = timeout.as_secs_f64(), "Scrape timed out");
            None
        }
    };

    let errors_total = if snapshot.is_some() {
        entry.errors_total.load(Ordering::Relaxed)
    } else {
        entry.errors_total.fetch_add(1, Ordering::Relaxed) + 1
    };
    if let Some(snapshot) = &snapshot {
        *entry.last.write().await = Some(snapshot.clone());
    }

    ScrapeOutcome {
        device: name,
        snapshot,
        duration: start.elapsed(),
        errors_total,
    }
}
