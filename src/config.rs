//! The check's config file
//!
//! An INI file with one section per appliance, named like the host passed to
//! `-H`, and an optional `[known_errors]` section:
//!
//! ```ini
//! [nexenta01.example.com]
//! api_user = admin
//! api_pass = secret
//! api_ssl = ON
//! snmp_community = public
//! space_threshold = DEFAULT;80%;90%
//!     backups;1T;500G;IGNORE;IGNORE
//!
//! [known_errors]
//! disk fail = CRITICAL;Disk failure detected
//! ```
//!
//! Indented lines continue the previous value. Quotes and backslashes are
//! taken literally, and `;` or `#` only start a comment at the beginning of
//! a line. Option names are case-insensitive.

use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, ParseOption};
use tracing::debug;

/// The file looked for next to the executable when `-f` isn't given
pub const DEFAULT_CONFIG_FILE: &str = "check_nexenta.cfg";

/// The section holding the known error catalog
pub const KNOWN_ERRORS_SECTION: &str = "known_errors";

#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Read { path: String, source: io::Error },
    /// The file is not valid INI
    Parse { path: String, source: ini::ParseError },
    /// A section that must exist doesn't
    MissingSection(String),
    /// A known error that isn't `<severity>;<description>`
    KnownError { key: String, value: String },
    /// Credentials or connection settings are missing or unusable
    Connection(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use self::ConfigError::*;
        match *self {
            Read {
                ref path,
                ref source,
            } => write!(f, "Can not open configuration file: {} ({})", path, source),
            Parse {
                ref path,
                ref source,
            } => write!(f, "Can not parse configuration file {}: {}", path, source),
            MissingSection(ref section) => write!(f, "{} not defined in config file!", section),
            KnownError { ref key, ref value } => write!(
                f,
                "Error in config file at [{}], line: {} = {}",
                KNOWN_ERRORS_SECTION, key, value
            ),
            Connection(ref msg) => write!(f, "{}", msg),
        }
    }
}

/// Where to read the config file from
///
/// With no path, or a bare file name, the file is looked for next to the
/// executable.
pub fn resolve_path(given: Option<&Path>) -> PathBuf {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    match given {
        None => exe_dir.join(DEFAULT_CONFIG_FILE),
        Some(path) if path.parent().map_or(true, |p| p.as_os_str().is_empty()) => {
            exe_dir.join(path)
        }
        Some(path) => path.to_path_buf(),
    }
}

fn parse_options() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        enabled_indented_mutiline_value: true,
        ..ParseOption::default()
    }
}

/// A parsed config file
#[derive(Debug, Clone)]
pub struct Config {
    ini: Ini,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let path_str = path.display().to_string();
        debug!(path = %path_str, "loading config");
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path_str.clone(),
            source,
        })?;
        Config::parse(&path_str, &raw)
    }

    fn parse(path: &str, raw: &str) -> Result<Config, ConfigError> {
        let ini = Ini::load_from_str_opt(raw, parse_options()).map_err(|source| {
            ConfigError::Parse {
                path: path.to_owned(),
                source,
            }
        })?;
        Ok(Config { ini })
    }

    /// Every `(name, value)` of a section in file order, names lower-cased
    fn entries(&self, section: &str) -> Option<Vec<(String, String)>> {
        self.ini.section(Some(section)).map(|props| {
            props
                .iter()
                .map(|(key, value)| (key.to_lowercase(), value.to_owned()))
                .collect()
        })
    }

    /// A single option
    ///
    /// A missing section is an error, a missing key is just `None`.
    pub fn get_option(&self, section: &str, key: &str) -> Result<Option<String>, ConfigError> {
        let host = self.host(section)?;
        Ok(host.option(key).map(str::to_owned))
    }

    /// The settings of one appliance
    pub fn host(&self, name: &str) -> Result<HostConfig, ConfigError> {
        let options = self
            .entries(name)
            .ok_or_else(|| ConfigError::MissingSection(name.to_owned()))?;
        Ok(HostConfig {
            name: name.to_owned(),
            options: options.into_iter().collect(),
        })
    }

    /// The `[known_errors]` entries in file order
    ///
    /// Without the section the catalog is simply empty.
    pub fn known_errors(&self) -> Vec<(String, String)> {
        self.entries(KNOWN_ERRORS_SECTION).unwrap_or_default()
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Config, ConfigError> {
        Config::parse("<string>", raw)
    }
}

/// The options of one appliance's section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    name: String,
    options: BTreeMap<String, String>,
}

impl HostConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Whether a switch like `snmp_extend` is `ON`
    pub fn is_on(&self, key: &str) -> bool {
        self.option(key)
            .map_or(false, |value| value.eq_ignore_ascii_case("ON"))
    }

    /// Whether every one of the options is set to something
    pub fn has_all(&self, keys: &[&str]) -> bool {
        keys.iter().all(|key| self.option(key).map_or(false, |v| !v.is_empty()))
    }

    /// Whether at least one of the options is set to something
    pub fn has_any(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.option(key).map_or(false, |v| !v.is_empty()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = "
; production head
[nexenta01]
api_user = admin
API_PASS = secret
api_port = 2001
snmp_extend = ON
skip_trigger = on
space_threshold = DEFAULT;80%;90%
    vol1;10G;5G;IGNORE;IGNORE

[known_errors]
zebra = WARNING;first in the file
disk fail = CRITICAL;Disk failure detected
DEFAULT = DEFAULT;(see logs)
";

    fn sample() -> Config {
        SAMPLE.parse().unwrap()
    }

    #[test]
    fn reads_host_options() {
        let config = sample();
        assert_eq!(
            config.get_option("nexenta01", "api_user").unwrap(),
            Some("admin".to_owned())
        );
        assert_eq!(
            config.get_option("nexenta01", "api_port").unwrap(),
            Some("2001".to_owned())
        );
        assert_eq!(config.get_option("nexenta01", "snmp_user").unwrap(), None);
    }

    #[test]
    fn option_names_ignore_case() {
        assert_eq!(
            sample().host("nexenta01").unwrap().option("api_pass"),
            Some("secret")
        );
    }

    #[test]
    fn missing_sections_are_errors() {
        match sample().get_option("nexenta02", "api_user") {
            Err(ConfigError::MissingSection(ref s)) => assert_eq!(s, "nexenta02"),
            other => panic!("expected a missing section, got {:?}", other),
        }
        let err = sample().host("nexenta02").unwrap_err();
        assert_eq!(err.to_string(), "nexenta02 not defined in config file!");
    }

    #[test]
    fn switches_accept_any_case() {
        let host = sample().host("nexenta01").unwrap();
        assert!(host.is_on("snmp_extend"));
        assert!(host.is_on("skip_trigger"));
        assert!(!host.is_on("skip_folderperf"));
    }

    #[test]
    fn threshold_block_survives_as_lines() {
        let host = sample().host("nexenta01").unwrap();
        let lines: Vec<&str> = host.option("space_threshold").unwrap().lines().collect();
        assert_eq!(lines, ["DEFAULT;80%;90%", "vol1;10G;5G;IGNORE;IGNORE"]);
    }

    #[test]
    fn known_errors_keep_file_order() {
        let keys: Vec<String> = sample().known_errors().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, ["zebra", "disk fail", "default"]);
    }

    #[test]
    fn known_error_lines_are_read_verbatim() {
        let config: Config = "[nexenta01]\n[known_errors]\ndisk fail = CRITICAL;Disk failure detected\n"
            .parse()
            .unwrap();
        assert_eq!(
            config.known_errors(),
            [(
                "disk fail".to_owned(),
                "CRITICAL;Disk failure detected".to_owned()
            )]
        );
    }

    #[test]
    fn no_known_errors_section_is_an_empty_catalog() {
        let config: Config = "[nexenta01]\napi_user = admin\n".parse().unwrap();
        assert!(config.known_errors().is_empty());
    }

    #[test]
    fn unclosed_sections_are_parse_errors() {
        match "[nexenta01\napi_user = admin\n".parse::<Config>() {
            Err(ConfigError::Parse { .. }) => {}
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn explicit_paths_are_kept() {
        assert_eq!(
            resolve_path(Some(Path::new("/etc/nagios/nexenta.cfg"))),
            PathBuf::from("/etc/nagios/nexenta.cfg")
        );
        let bare = resolve_path(Some(Path::new("nexenta.cfg")));
        assert!(bare.ends_with("nexenta.cfg"));
        assert!(resolve_path(None).ends_with(DEFAULT_CONFIG_FILE));
    }
}
