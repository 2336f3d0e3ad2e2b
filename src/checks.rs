//! Run the requested checks against one appliance
//!
//! The checks run in the order they were asked for, so their findings
//! appear in that order too. Each one reports into the same `StatusRegister`
//! and `Report`; any error ends the run without a report.

use std::fmt;
use std::net::ToSocketAddrs;

use derive_more::From;
use itertools::Itertools;
use tracing::{debug, info};

use crate::api::{ApiError, ManagementApi, NexentaApi, Nms, Retry};
use crate::config::{Config, ConfigError, HostConfig};
use crate::known_errors::KnownErrors;
use crate::register::StatusRegister;
use crate::report::Report;
use crate::snmp::{instance, oids, SnmpAgent, SnmpSession};
use crate::space::{evaluate, UsageSample};
use crate::thresholds::{ThresholdError, ThresholdSet};
use crate::Status;

/// The appliance's system pool, checked alongside every folder
pub const SYSPOOL: &str = "syspool";

/// The kinds of check that can be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    SpaceUsage,
    Triggers,
    Extends,
    PerfData,
}

/// What runs when nothing is asked for
pub const DEFAULT_CHECKS: &[CheckKind] = &[CheckKind::SpaceUsage, CheckKind::Triggers];

/// Everything that ends a run early
#[derive(Debug, From)]
pub enum CheckError {
    Config(ConfigError),
    Threshold(ThresholdError),
    Api(ApiError),
    #[from(ignore)]
    Unresolvable(String),
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CheckError::Config(ref e) => write!(f, "{}", e),
            CheckError::Threshold(ref e) => write!(f, "Error in config file: {}", e),
            CheckError::Api(ref e) => write!(f, "{}", e),
            CheckError::Unresolvable(ref host) => write!(f, "No IP address found for {}!", host),
        }
    }
}

/// The first address `host` resolves to
pub fn resolve_address(host: &str) -> Result<String, CheckError> {
    let unresolvable = || CheckError::Unresolvable(host.to_owned());
    let mut addrs = (host, 0).to_socket_addrs().map_err(|_| unresolvable())?;
    addrs
        .next()
        .map(|addr| addr.ip().to_string())
        .ok_or_else(unresolvable)
}

/// Hands out the appliance's transports, creating them on first use
///
/// A check that never needs a transport never fails on its settings.
pub trait Connector {
    type Api: ManagementApi;
    type Snmp: SnmpAgent;

    fn api(&mut self) -> Result<&Self::Api, CheckError>;
    fn snmp(&mut self) -> Result<&mut Self::Snmp, CheckError>;
}

/// Connects to a real appliance
pub struct Live {
    host: HostConfig,
    ip: String,
    api: Option<NexentaApi>,
    snmp: Option<SnmpSession>,
}

impl Live {
    pub fn new(host: HostConfig, ip: String) -> Live {
        Live {
            host,
            ip,
            api: None,
            snmp: None,
        }
    }
}

impl Connector for Live {
    type Api = NexentaApi;
    type Snmp = SnmpSession;

    fn api(&mut self) -> Result<&NexentaApi, CheckError> {
        let api = match self.api.take() {
            Some(api) => api,
            None => NexentaApi::new(&self.host, &self.ip)?,
        };
        Ok(self.api.get_or_insert(api))
    }

    fn snmp(&mut self) -> Result<&mut SnmpSession, CheckError> {
        let snmp = match self.snmp.take() {
            Some(snmp) => snmp,
            None => SnmpSession::new(&self.host, &self.ip)?,
        };
        Ok(self.snmp.get_or_insert(snmp))
    }
}

/// The result of a complete run
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub status: Status,
    pub output: String,
}

/// Run `kinds` (or the default checks) against one appliance
///
/// A kind asked for twice only runs the first time.
pub fn run<C: Connector>(
    host: &HostConfig,
    config: &Config,
    kinds: &[CheckKind],
    connector: &mut C,
    retry: Retry,
) -> Result<Outcome, CheckError> {
    let kinds = if kinds.is_empty() {
        DEFAULT_CHECKS
    } else {
        kinds
    };

    let mut register = StatusRegister::new();
    let mut report = Report::new();
    for &kind in kinds.iter().unique() {
        debug!(check = ?kind, host = host.name(), "running check");
        let found = match kind {
            CheckKind::SpaceUsage => check_space_usage(host, connector, retry, &mut register)?,
            CheckKind::Triggers => check_triggers(host, config, connector, retry, &mut register)?,
            CheckKind::Extends => collect_extends(host, connector, &mut register)?,
            CheckKind::PerfData => collect_perfdata(host, connector, retry)?,
        };
        report.extend(found);
    }

    let status = register.status();
    info!(host = host.name(), %status, "checks finished");
    Ok(Outcome {
        status,
        output: report.render(status),
    })
}

/// Compare every folder, and the system pool, to `space_threshold`
///
/// Does nothing if the host has no thresholds.
pub fn check_space_usage<C: Connector>(
    host: &HostConfig,
    connector: &mut C,
    retry: Retry,
    register: &mut StatusRegister,
) -> Result<Report, CheckError> {
    let mut report = Report::new();
    let thresholds = match host.option("space_threshold") {
        Some(text) if !text.trim().is_empty() => ThresholdSet::parse(text)?,
        _ => {
            debug!(host = host.name(), "no space_threshold, skipping space check");
            return Ok(report);
        }
    };

    let nms = Nms::new(connector.api()?, retry);
    let mut folders = nms.folder_names()?;
    folders.push(SYSPOOL.to_owned());

    for folder in &folders {
        let limits = match thresholds.resolve(folder) {
            Some(limits) => limits,
            None => {
                debug!(folder = %folder, "no threshold applies, skipping");
                continue;
            }
        };
        let sample = UsageSample::from_props(&nms.folder_props(folder)?);
        for finding in evaluate(folder, &sample, &limits) {
            register.propose(finding.status);
            report.push_finding(finding.message);
        }
    }
    Ok(report)
}

/// Report every fault of every fault trigger
///
/// Skipped when `skip_trigger` is on, which keeps both heads of an HA
/// cluster from reporting the same faults.
pub fn check_triggers<C: Connector>(
    host: &HostConfig,
    config: &Config,
    connector: &mut C,
    retry: Retry,
    register: &mut StatusRegister,
) -> Result<Report, CheckError> {
    let mut report = Report::new();
    if host.is_on("skip_trigger") {
        debug!(host = host.name(), "skip_trigger is on");
        return Ok(report);
    }
    let known = KnownErrors::from_catalog(config.known_errors())?;

    let nms = Nms::new(connector.api()?, retry);
    for trigger in nms.trigger_names()? {
        for (id, fault) in nms.trigger_faults(&trigger)? {
            let (severity, description) = known.classify(&fault);
            debug!(trigger = %trigger, fault = %id, severity = %severity, "fault");
            register.propose(if severity == "CRITICAL" {
                Status::Critical
            } else {
                Status::Warning
            });
            report.push_finding(format!("{}:{}: {}", trigger, severity, description));
        }
    }
    Ok(report)
}

/// One line of output from an SNMP extend script
#[derive(Debug, Clone, PartialEq)]
pub enum ExtendLine {
    /// `PERFDATA:<tokens>`
    PerfData(String),
    /// `OUTPUT:<message>`, and the status the message asks for
    Output(String, Option<Status>),
}

impl ExtendLine {
    pub fn parse(line: &str) -> Option<ExtendLine> {
        let tail = |marker: &str| line.split(marker).nth(1).unwrap_or("").to_owned();
        if line.contains("PERFDATA:") {
            Some(ExtendLine::PerfData(tail("PERFDATA:")))
        } else if line.contains("OUTPUT:") {
            let status = if line.contains("CRITICAL") {
                Some(Status::Critical)
            } else if line.contains("WARNING") {
                Some(Status::Warning)
            } else {
                None
            };
            Some(ExtendLine::Output(tail("OUTPUT:"), status))
        } else {
            None
        }
    }
}

/// Collect output and performance data from the appliance's extend scripts
pub fn collect_extends<C: Connector>(
    host: &HostConfig,
    connector: &mut C,
    register: &mut StatusRegister,
) -> Result<Report, CheckError> {
    let mut report = Report::new();
    if !host.is_on("snmp_extend") {
        return Ok(report);
    }
    let lines = match connector.snmp()?.walk(oids::NS_EXTEND_OUT_LINE) {
        Some(lines) => lines,
        None => return Ok(report),
    };
    for (_, line) in lines {
        match ExtendLine::parse(&line) {
            Some(ExtendLine::PerfData(tokens)) => report.push_perfdata(tokens),
            Some(ExtendLine::Output(message, status)) => {
                if let Some(status) = status {
                    register.propose(status);
                }
                report.push_finding(message);
            }
            None => debug!(line = %line, "ignoring extend line"),
        }
    }
    Ok(report)
}

/// Collect CPU, network, folder and memory performance data
///
/// Each source is only asked if the host has settings for it. This never
/// changes the status of the run.
pub fn collect_perfdata<C: Connector>(
    host: &HostConfig,
    connector: &mut C,
    retry: Retry,
) -> Result<Report, CheckError> {
    let mut report = Report::new();
    if host.has_any(&["snmp_user", "snmp_community"]) {
        snmp_perfdata(connector.snmp()?, &mut report);
    }
    if host.has_all(&["api_user", "api_pass"]) {
        api_perfdata(host, &Nms::new(connector.api()?, retry), &mut report)?;
    }
    Ok(report)
}

fn snmp_perfdata<S: SnmpAgent + ?Sized>(snmp: &mut S, report: &mut Report) {
    if let Some(loads) = snmp.walk(oids::HR_PROCESSOR_LOAD) {
        for (cpu, (_, load)) in loads.iter().enumerate() {
            report.push_perfdata(format!("'CPU{} used'={}%", cpu, load));
        }
    }

    let interfaces = match snmp.walk(oids::IF_NAME) {
        Some(interfaces) => interfaces,
        None => return,
    };
    for (index, name) in interfaces {
        let directions = [("in", oids::IF_HC_IN_OCTETS), ("out", oids::IF_HC_OUT_OCTETS)];
        for &(direction, base) in directions.iter() {
            let octets = instance(base, &index)
                .and_then(|oid| snmp.get(&oid))
                .and_then(|value| value.trim().parse::<u128>().ok());
            match octets {
                Some(octets) => report.push_perfdata(format!(
                    "'{} Traffic {}'={}c",
                    name,
                    direction,
                    octets * 8
                )),
                None => debug!(interface = %name, direction, "no traffic counter"),
            }
        }
    }
}

fn api_perfdata<A: ManagementApi + ?Sized>(
    host: &HostConfig,
    nms: &Nms<A>,
    report: &mut Report,
) -> Result<(), CheckError> {
    let mut folders = if host.is_on("skip_folderperf") {
        Vec::new()
    } else {
        nms.folder_names()?
    };
    folders.push(SYSPOOL.to_owned());

    for folder in &folders {
        let props = nms.folder_props(folder)?;
        let sample = UsageSample::from_props(&props);
        report.push_perfdata(format!("'/{} used'={}KB", folder, sample.used.kilobytes()));
        report.push_perfdata(format!("'/{} free'={}KB", folder, sample.available.kilobytes()));
        report.push_perfdata(format!(
            "'/{} snapshots'={}KB",
            folder,
            sample.snapshots.kilobytes()
        ));
        if props.get("compression").map(String::as_str) == Some("on") {
            if let Some(ratio) = props.get("compressratio") {
                let ratio = ratio.trim_end_matches('x');
                report.push_perfdata(format!("'/{} compressratio'={}", folder, ratio));
            }
        }
    }

    let mem = nms.memstat()?;
    report.push_perfdata(format!("'Memory free'={}MB", mem.ram_free));
    report.push_perfdata(format!("'Memory used'={}MB", mem.ram_total - mem.ram_free));
    report.push_perfdata(format!("'Memory paging'={}MB", mem.ram_paging));
    Ok(())
}
