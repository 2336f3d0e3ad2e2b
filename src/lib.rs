//! Nexenta plugins: strongly typed checks for Nexenta storage appliances
//!
//! The `check-nexenta` binary queries the NMS management API and the
//! appliance's SNMP agent, compares what it finds against the thresholds in
//! its config file, and prints a single Nagios/Sensu compatible line:
//!
//! ```plain
//! finding1<br>finding2|'perf token 1'=1KB 'perf token 2'=2%
//! ```
//!
//! The interesting parts live in the library so they can be tested without
//! an appliance:
//!
//! * [`units`]: capacity strings like `12G` to bytes
//! * [`thresholds`]: the `space_threshold` rule lines and which one applies
//! * [`space`]: deciding if a folder is breaching its limits
//! * [`known_errors`]: rewriting fault severities and descriptions
//! * [`register`]: folding every sub-check into one exit status
//! * [`report`]: the rendered output line
//! * [`checks`]: running the requested checks in order

use std::fmt;
use std::process;
use std::str::FromStr;

pub mod api;
pub mod checks;
pub mod config;
pub mod known_errors;
pub mod register;
pub mod report;
pub mod snmp;
pub mod space;
pub mod thresholds;
pub mod units;

/// The result of a check, as understood by Nagios and Sensu
///
/// Variants are ordered from best to worst, so `max` picks the more
/// alarming of two statuses.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Ok,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    #![cfg_attr(test, allow(dead_code))]
    pub fn exit(self) -> ! {
        process::exit(self.code())
    }

    /// The process exit code for this status
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
            Status::Unknown => 3,
        }
    }

    pub fn str_values() -> [&'static str; 4] {
        ["ok", "warning", "critical", "unknown"]
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
            Status::Unknown => "UNKNOWN",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Status, String> {
        match s.to_lowercase().as_ref() {
            "ok" => Ok(Status::Ok),
            "warning" | "warn" => Ok(Status::Warning),
            "critical" => Ok(Status::Critical),
            "unknown" => Ok(Status::Unknown),
            _ => Err(format!(
                "Unexpected status '{}', expected one of: {}",
                s,
                Status::str_values().join(", ")
            )),
        }
    }
}
