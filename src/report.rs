//! Collect what the checks found and render the plugin's output line

use itertools::Itertools;

use crate::Status;

/// What a healthy run says when nothing else was found
pub const ALL_CLEAR: &str = "Nexenta check OK";

/// Findings and performance data, in the order the checks produced them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    output: Vec<String>,
    perfdata: Vec<String>,
}

impl Report {
    pub fn new() -> Report {
        Report::default()
    }

    pub fn push_finding<S: Into<String>>(&mut self, finding: S) {
        self.output.push(finding.into());
    }

    pub fn push_perfdata<S: Into<String>>(&mut self, token: S) {
        self.perfdata.push(token.into());
    }

    /// Append everything another report collected
    pub fn extend(&mut self, other: Report) {
        self.output.extend(other.output);
        self.perfdata.extend(other.perfdata);
    }

    pub fn findings(&self) -> &[String] {
        &self.output
    }

    pub fn perfdata(&self) -> &[String] {
        &self.perfdata
    }

    /// `finding<br>finding|perf perf`
    ///
    /// An empty, healthy run reports `Nexenta check OK`.
    pub fn render(&self, status: Status) -> String {
        let output = if self.output.is_empty() && status == Status::Ok {
            ALL_CLEAR.to_owned()
        } else {
            self.output.iter().join("<br>")
        };
        if self.perfdata.is_empty() {
            output
        } else {
            format!("{}|{}", output, self.perfdata.iter().join(" "))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn healthy_and_empty_is_all_clear() {
        assert_eq!(Report::new().render(Status::Ok), "Nexenta check OK");
    }

    #[test]
    fn all_clear_only_when_ok() {
        assert_eq!(Report::new().render(Status::Unknown), "");
    }

    #[test]
    fn findings_are_joined_in_order() {
        let mut report = Report::new();
        report.push_finding("WARNING: vol1 80% full");
        report.push_finding("CRITICAL: vol2 95% full!");
        assert_eq!(
            report.render(Status::Critical),
            "WARNING: vol1 80% full<br>CRITICAL: vol2 95% full!"
        );
    }

    #[test]
    fn perfdata_follows_a_pipe() {
        let mut report = Report::new();
        report.push_perfdata("'/vol1 used'=10KB");
        report.push_perfdata("'/vol1 free'=20KB");
        assert_eq!(
            report.render(Status::Ok),
            "Nexenta check OK|'/vol1 used'=10KB '/vol1 free'=20KB"
        );
    }

    #[test]
    fn extend_keeps_both_orders() {
        let mut first = Report::new();
        first.push_finding("a");
        first.push_perfdata("x=1");
        let mut second = Report::new();
        second.push_finding("b");
        second.push_perfdata("y=2");
        first.extend(second);
        assert_eq!(first.findings(), ["a", "b"]);
        assert_eq!(first.perfdata(), ["x=1", "y=2"]);
    }
}
