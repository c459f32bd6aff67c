//! Prometheus text exposition of scrape outcomes.

use std::fmt::Write;

use crate::registry::ScrapeOutcome;

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Clone, Copy)]
enum Kind {
    Gauge,
    Counter,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Gauge => "gauge",
            Kind::Counter => "counter",
        }
    }
}

/// One metric family: header plus all samples across devices.
struct Family {
    name: &'static str,
    help: &'static str,
    kind: Kind,
    samples: Vec<(Vec<(&'static str, String)>, f64)>,
}

impl Family {
    fn new(name: &'static str, help: &'static str, kind: Kind) -> Self {
        Self {
            name,
            help,
            kind,
            samples: Vec::new(),
        }
    }

    fn push(&mut self, labels: Vec<(&'static str, String)>, value: f64) {
        self.samples.push((labels, value));
    }

    fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", self.name, self.help);
        let _ = writeln!(out, "# TYPE {} {}", self.name, self.kind.as_str());
        for (labels, value) in &self.samples {
            out.push_str(self.name);
            if !labels.is_empty() {
                out.push('{');
                for (i, (key, val)) in labels.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{}=\"{}\"", key, escape_label(val));
                }
                out.push('}');
            }
            let _ = writeln!(out, " {}", value);
        }
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Render every outcome into one exposition document.
pub fn render(outcomes: &[ScrapeOutcome]) -> String {
    let mut nper = Family::new(
        "gocoax_phy_rate_nper_mbps",
        "Normal Packet Error Rate PHY rate in Mbps between nodes",
        Kind::Gauge,
    );
    let mut vlper = Family::new(
        "gocoax_phy_rate_vlper_mbps",
        "Very Low Packet Error Rate PHY rate in Mbps between nodes (MoCA 2.5)",
        Kind::Gauge,
    );
    let mut gcd = Family::new(
        "gocoax_phy_rate_gcd_mbps",
        "Greatest Common Divisor rate in Mbps for node",
        Kind::Gauge,
    );
    let mut node_info = Family::new(
        "gocoax_node_info",
        "Node information with MoCA version",
        Kind::Gauge,
    );
    let mut up = Family::new(
        "gocoax_up",
        "Device is reachable and responding (1=up, 0=down)",
        Kind::Gauge,
    );
    let mut duration = Family::new(
        "gocoax_scrape_duration_seconds",
        "Time taken to scrape device metrics",
        Kind::Gauge,
    );
    let mut errors = Family::new(
        "gocoax_scrape_errors_total",
        "Total number of scrape errors",
        Kind::Counter,
    );

    for outcome in outcomes {
        let device = || ("device", outcome.device.clone());

        if let Some(snapshot) = &outcome.snapshot {
            for node in &snapshot.nodes {
                node_info.push(
                    vec![
                        device(),
                        ("node", node.node.to_string()),
                        ("moca_version", node.version.to_string()),
                        ("is_nc", node.is_nc.to_string()),
                    ],
                    1.0,
                );
            }

            for row in snapshot.rates.rows() {
                let from = row.entry_node.to_string();
                for (dest, rate) in &row.nper {
                    nper.push(
                        vec![device(), ("from_node", from.clone()), ("to_node", dest.to_string())],
                        f64::from(*rate),
                    );
                }
                for (dest, rate) in row.vlper.iter().filter(|(_, &r)| r > 0) {
                    vlper.push(
                        vec![device(), ("from_node", from.clone()), ("to_node", dest.to_string())],
                        f64::from(*rate),
                    );
                }
                if let Some(rate) = row.gcd {
                    gcd.push(vec![device(), ("node", from.clone())], f64::from(rate));
                }
            }
        }

        up.push(vec![device()], if outcome.up() { 1.0 } else { 0.0 });
        duration.push(vec![device()], outcome.duration.as_secs_f64());
        errors.push(vec![device()], outcome.errors_total as f64);
    }

    let mut out = String::new();
    for family in [&nper, &vlper, &gcd, &node_info, &up, &duration, &errors] {
        if !family.samples.is_empty() {
            family.render(&mut out);
        }
    }
    out
}
