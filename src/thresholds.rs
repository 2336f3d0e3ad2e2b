//! The `space_threshold` rules
//!
//! A host's `space_threshold` option holds one rule per line:
//!
//! ```plain
//! <folder>;<vol-warning>;<vol-critical>[;<snap-warning>;<snap-critical>]
//! ```
//!
//! `<folder>` is a folder name or `DEFAULT`. Each limit is a percentage
//! (`80%`), an amount of space (`10G`) or `IGNORE`. Leaving out the snapshot
//! limits is the same as writing `IGNORE` for both.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::units::convert_space;

/// The target that applies to every folder without a rule of its own
pub const DEFAULT_TARGET: &str = "DEFAULT";

lazy_static! {
    static ref LIMIT: Regex = Regex::new(r"^(\d+(?:\.\d+)?)([%BKMGT])$").unwrap();
}

/// One configured limit
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Limit {
    /// Percent of the folder's total capacity
    Percent(f64),
    /// An amount of space, in bytes
    Bytes(f64),
    /// Never breached
    Ignore,
}

impl Limit {
    /// Parse a limit token
    ///
    /// Tokens that are neither a percentage, an amount of space nor `IGNORE`
    /// become `Ignore`: a typo in a limit switches that limit off, it does not
    /// fail the check.
    pub fn parse(token: &str) -> Limit {
        let caps = match LIMIT.captures(token) {
            Some(caps) => caps,
            None => {
                if token != "IGNORE" {
                    debug!(token = %token, "unrecognised limit, ignoring it");
                }
                return Limit::Ignore;
            }
        };
        // the regex guarantees a parseable number
        let number: f64 = caps[1].parse().unwrap_or(0.0);
        if &caps[2] == "%" {
            Limit::Percent(number)
        } else {
            Limit::Bytes(convert_space(token))
        }
    }
}

/// The four limits that apply to one folder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub vol_warn: Limit,
    pub vol_crit: Limit,
    pub snap_warn: Limit,
    pub snap_crit: Limit,
}

/// One line of `space_threshold`
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub target: String,
    pub limits: Limits,
}

impl ThresholdRule {
    fn parse(line: &str) -> Result<ThresholdRule, ThresholdError> {
        let fields: Vec<&str> = line.split(';').map(str::trim).collect();
        let (snap_warn, snap_crit) = match fields.len() {
            3 => (Limit::Ignore, Limit::Ignore),
            5 => (Limit::parse(fields[3]), Limit::parse(fields[4])),
            count => {
                return Err(ThresholdError::FieldCount {
                    line: line.to_owned(),
                    count,
                })
            }
        };
        Ok(ThresholdRule {
            target: fields[0].to_owned(),
            limits: Limits {
                vol_warn: Limit::parse(fields[1]),
                vol_crit: Limit::parse(fields[2]),
                snap_warn,
                snap_crit,
            },
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ThresholdError {
    /// A rule line without exactly 3 or 5 fields
    FieldCount { line: String, count: usize },
}

impl fmt::Display for ThresholdError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ThresholdError::FieldCount { ref line, count } => write!(
                f,
                "space_threshold line '{}' has {} fields, expected 3 or 5",
                line, count
            ),
        }
    }
}

/// Every rule in a `space_threshold` option, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdSet {
    rules: Vec<ThresholdRule>,
}

impl ThresholdSet {
    /// Parse the whole option, failing on the first malformed line
    pub fn parse(text: &str) -> Result<ThresholdSet, ThresholdError> {
        let rules = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ThresholdRule::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ThresholdSet { rules })
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    /// The limits that apply to `entity`, if any
    ///
    /// A rule for the entity itself beats a `DEFAULT` rule, and of several
    /// rules for the same target the last one wins, so corrections can be
    /// appended to the end of the option. `None` means the entity is not
    /// checked at all.
    pub fn resolve(&self, entity: &str) -> Option<Limits> {
        let mut specific = None;
        let mut default = None;
        for rule in &self.rules {
            if rule.target == entity {
                specific = Some(rule.limits);
            } else if rule.target == DEFAULT_TARGET {
                default = Some(rule.limits);
            }
        }
        specific.or(default)
    }
}
