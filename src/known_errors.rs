//! Rewrite the severity and description of faults the operators already know
//!
//! The `[known_errors]` section maps part of a fault description to a
//! replacement:
//!
//! ```ini
//! [known_errors]
//! disk fail = CRITICAL;Disk failure detected
//! smart = DEFAULT;Check the SMART report
//! DEFAULT = DEFAULT;(see the fault logs)
//! ```
//!
//! A severity of `DEFAULT` keeps the fault's own severity. When nothing
//! matches, the `DEFAULT` entry's description is appended to the original
//! one.

use serde::Deserialize;
use tracing::debug;

use crate::config::ConfigError;

/// The catalog key that catches every unmatched fault
pub const CATCH_ALL: &str = "DEFAULT";

/// A fault as reported by `trigger.get_faults`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Fault {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub description: String,
}

/// The replacement configured for a known error
#[derive(Debug, Clone, PartialEq)]
struct Replacement {
    severity: String,
    description: String,
}

impl Replacement {
    fn parse(key: &str, value: &str) -> Result<Replacement, ConfigError> {
        let fields: Vec<&str> = value.split(';').collect();
        if fields.len() != 2 {
            return Err(ConfigError::KnownError {
                key: key.to_owned(),
                value: value.to_owned(),
            });
        }
        Ok(Replacement {
            severity: fields[0].trim().to_owned(),
            description: fields[1].trim().to_owned(),
        })
    }

    /// The severity to report, given the fault's own
    fn severity(&self, original: &str) -> String {
        if self.severity.eq_ignore_ascii_case(CATCH_ALL) {
            original.to_owned()
        } else {
            self.severity.clone()
        }
    }
}

/// The whole `[known_errors]` catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownErrors {
    /// Lower-cased substrings and their replacements, in file order
    matchers: Vec<(String, Replacement)>,
    catch_all: Option<Replacement>,
}

impl KnownErrors {
    /// Build the catalog, failing on the first entry that isn't
    /// `<severity>;<description>`
    pub fn from_catalog<I>(entries: I) -> Result<KnownErrors, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut known = KnownErrors::default();
        for (key, value) in entries {
            let replacement = Replacement::parse(&key, &value)?;
            if key.eq_ignore_ascii_case(CATCH_ALL) {
                known.catch_all = Some(replacement);
            } else {
                known.matchers.push((key.to_lowercase(), replacement));
            }
        }
        Ok(known)
    }

    /// The `(severity, description)` to report for a fault
    pub fn classify(&self, fault: &Fault) -> (String, String) {
        let lowered = fault.description.to_lowercase();
        if let Some(&(ref key, ref replacement)) = self
            .matchers
            .iter()
            .find(|&&(ref key, _)| lowered.contains(key.as_str()))
        {
            debug!(key = %key, "fault matches a known error");
            return (
                replacement.severity(&fault.severity),
                replacement.description.clone(),
            );
        }
        match self.catch_all {
            Some(ref replacement) => (
                replacement.severity(&fault.severity),
                format!("{} {}", fault.description, replacement.description),
            ),
            None => (fault.severity.clone(), fault.description.clone()),
        }
    }
}
