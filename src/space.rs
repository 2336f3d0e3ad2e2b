//! Decide whether a folder is breaching its space limits

use std::collections::HashMap;

use tracing::debug;

use crate::thresholds::{Limit, Limits};
use crate::units::Capacity;
use crate::Status;

/// Space figures of one folder, as reported by `folder.get_child_props`
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSample {
    pub used: Capacity,
    pub available: Capacity,
    pub snapshots: Capacity,
}

impl UsageSample {
    /// Build a sample from folder properties
    ///
    /// Properties the appliance did not send count as empty.
    pub fn from_props(props: &HashMap<String, String>) -> UsageSample {
        let prop = |name: &str| Capacity::parse(props.get(name).map_or("", String::as_str));
        UsageSample {
            used: prop("used"),
            available: prop("available"),
            snapshots: prop("usedbysnapshots"),
        }
    }

    fn total(&self) -> f64 {
        self.used.bytes() + self.available.bytes()
    }

    fn percent_of_total(&self, bytes: f64) -> f64 {
        let total = self.total();
        if total > 0.0 {
            bytes / total * 100.0
        } else {
            0.0
        }
    }

    /// Percent of the folder's capacity that is used
    pub fn volume_percent(&self) -> f64 {
        self.percent_of_total(self.used.bytes())
    }

    /// Percent of the folder's capacity held by snapshots
    ///
    /// This is relative to the whole folder, not to some snapshot reserve.
    pub fn snapshot_percent(&self) -> f64 {
        self.percent_of_total(self.snapshots.bytes())
    }
}

/// A breached limit
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub status: Status,
    pub message: String,
}

impl Finding {
    fn new(status: Status, message: String) -> Finding {
        Finding { status, message }
    }
}

/// Snapshot limits trigger when usage reaches the limit
fn snapshot_breached(limit: Limit, sample: &UsageSample) -> bool {
    match limit {
        Limit::Percent(pct) => pct <= sample.snapshot_percent(),
        Limit::Bytes(bytes) => bytes <= sample.snapshots.bytes(),
        Limit::Ignore => false,
    }
}

/// Volume limits compare percentages against used space, but amounts of
/// space against what is still *available*: `10G` means "alert when 10G or
/// less is left".
fn volume_breached(limit: Limit, sample: &UsageSample) -> bool {
    match limit {
        Limit::Percent(pct) => pct <= sample.volume_percent(),
        Limit::Bytes(bytes) => bytes >= sample.available.bytes(),
        Limit::Ignore => false,
    }
}

fn snapshot_finding(status: Status, limit: Limit, name: &str, sample: &UsageSample) -> Finding {
    let message = match limit {
        Limit::Percent(_) => format!(
            "{}: {}% of {} used by snapshots",
            status,
            sample.snapshot_percent() as u64,
            name
        ),
        _ => format!("{}: {} of {} used by snapshots", status, sample.snapshots, name),
    };
    Finding::new(status, message)
}

fn volume_finding(status: Status, limit: Limit, name: &str, sample: &UsageSample) -> Finding {
    let bang = if status == Status::Critical { "!" } else { "" };
    let message = match limit {
        Limit::Percent(_) => format!(
            "{}: {} {}% full{}",
            status,
            name,
            sample.volume_percent() as u64,
            bang
        ),
        _ => format!("{}: {} {} available{}", status, name, sample.available, bang),
    };
    Finding::new(status, message)
}

/// Check one folder against its limits
///
/// Returns at most one snapshot finding followed by at most one volume
/// finding. If both snapshot limits are breached only the critical one is
/// reported; a critical volume breach suppresses the volume warning.
pub fn evaluate(name: &str, sample: &UsageSample, limits: &Limits) -> Vec<Finding> {
    let mut findings = Vec::new();
    debug!(
        folder = name,
        volume_percent = sample.volume_percent(),
        snapshot_percent = sample.snapshot_percent(),
        "evaluating space usage"
    );

    let mut snapshot = None;
    if snapshot_breached(limits.snap_warn, sample) {
        snapshot = Some(snapshot_finding(Status::Warning, limits.snap_warn, name, sample));
    }
    if snapshot_breached(limits.snap_crit, sample) {
        snapshot = Some(snapshot_finding(Status::Critical, limits.snap_crit, name, sample));
    }
    findings.extend(snapshot);

    if volume_breached(limits.vol_crit, sample) {
        findings.push(volume_finding(Status::Critical, limits.vol_crit, name, sample));
    } else if volume_breached(limits.vol_warn, sample) {
        findings.push(volume_finding(Status::Warning, limits.vol_warn, name, sample));
    }

    findings
}
