use std::ffi::OsString;
use std::path::PathBuf;

use structopt::clap::ArgMatches;
use structopt::StructOpt;

use nexenta_plugins::checks::{CheckKind, DEFAULT_CHECKS};

/// Check the health of a Nexenta storage appliance
///
/// Without any check flags, space usage (-D) and fault triggers (-T) are
/// checked. Checks run in the order their flags are given.
#[derive(Debug, StructOpt)]
#[structopt(
    name = "check-nexenta",
    setting = structopt::clap::AppSettings::ColoredHelp
)]
pub(crate) struct Args {
    #[structopt(
        short = "H",
        long = "hostname",
        help = "The appliance to check, as named in the config file"
    )]
    pub hostname: String,
    #[structopt(short = "D", long = "space", help = "Check folder space usage")]
    pub space: bool,
    #[structopt(short = "T", long = "triggers", help = "Report fault trigger faults")]
    pub triggers: bool,
    #[structopt(
        short = "P",
        long = "perfdata",
        help = "Collect CPU, network, folder and memory performance data"
    )]
    pub perfdata: bool,
    #[structopt(
        short = "E",
        long = "extend",
        help = "Collect output of the SNMP extend scripts"
    )]
    pub extend: bool,
    #[structopt(
        short = "f",
        long = "config",
        parse(from_os_str),
        help = "Config file. A bare file name is looked for next to the \
                executable. Default: check_nexenta.cfg"
    )]
    pub config: Option<PathBuf>,
    /// Check flags in command line order
    #[structopt(skip)]
    requested: Vec<CheckKind>,
}

const CHECK_FLAGS: &[(&str, CheckKind)] = &[
    ("space", CheckKind::SpaceUsage),
    ("triggers", CheckKind::Triggers),
    ("perfdata", CheckKind::PerfData),
    ("extend", CheckKind::Extends),
];

impl Args {
    /// Parse the process's arguments, remembering the order of check flags
    pub fn parse() -> Args {
        Args::parse_from(std::env::args_os())
    }

    pub fn parse_from<I>(argv: I) -> Args
    where
        I: IntoIterator,
        I::Item: Into<OsString> + Clone,
    {
        let matches = Args::clap().get_matches_from(argv);
        Args::with_order(&matches)
    }

    fn with_order(matches: &ArgMatches) -> Args {
        let mut args = Args::from_clap(matches);
        let mut seen: Vec<(usize, CheckKind)> = CHECK_FLAGS
            .iter()
            .filter_map(|&(name, kind)| matches.index_of(name).map(|idx| (idx, kind)))
            .collect();
        seen.sort_by_key(|&(idx, _)| idx);
        args.requested = seen.into_iter().map(|(_, kind)| kind).collect();
        args
    }

    /// The checks to run
    pub fn kinds(&self) -> Vec<CheckKind> {
        if self.requested.is_empty() {
            DEFAULT_CHECKS.to_vec()
        } else {
            self.requested.clone()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn build_args(argv: &[&str]) -> Args {
        Args::parse_from(argv.iter().cloned())
    }

    #[test]
    fn hostname_is_required() {
        assert!(Args::from_iter_safe(vec!["check-nexenta"]).is_err());
    }

    #[test]
    fn defaults_to_space_and_triggers() {
        let args = build_args(&["check-nexenta", "-H", "nexenta01"]);
        assert_eq!(args.hostname, "nexenta01");
        assert_eq!(args.config, None);
        assert_eq!(args.kinds(), [CheckKind::SpaceUsage, CheckKind::Triggers]);
    }

    #[test]
    fn flags_select_checks() {
        let args = build_args(&["check-nexenta", "--hostname=nexenta01", "-T"]);
        assert_eq!(args.kinds(), [CheckKind::Triggers]);
        assert!(args.triggers);
    }

    #[test]
    fn checks_follow_the_command_line() {
        let args = build_args(&["check-nexenta", "-H", "nexenta01", "-P", "-E"]);
        assert_eq!(args.kinds(), [CheckKind::PerfData, CheckKind::Extends]);

        let args = build_args(&["check-nexenta", "-E", "-H", "nexenta01", "-T", "-D"]);
        assert_eq!(
            args.kinds(),
            [CheckKind::Extends, CheckKind::Triggers, CheckKind::SpaceUsage]
        );
    }

    #[test]
    fn config_file() {
        let args = build_args(&["check-nexenta", "-H", "n", "-f", "/etc/nexenta.cfg"]);
        assert_eq!(args.config, Some(PathBuf::from("/etc/nexenta.cfg")));
    }
}
