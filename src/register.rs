//! Fold the statuses of every sub-check into the status of the run

use crate::Status;

/// The worst status seen so far in one run
///
/// Concrete statuses only ever escalate. `Unknown` means "couldn't fully
/// check": it marks an otherwise healthy run, but never hides a warning or
/// critical, and any concrete status found later replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRegister {
    current: Status,
}

impl Default for StatusRegister {
    fn default() -> StatusRegister {
        StatusRegister::new()
    }
}

impl StatusRegister {
    pub fn new() -> StatusRegister {
        StatusRegister {
            current: Status::Ok,
        }
    }

    pub fn propose(&mut self, proposed: Status) {
        let accept = match proposed {
            Status::Unknown => self.current == Status::Ok,
            concrete => concrete > self.current || self.current == Status::Unknown,
        };
        if accept {
            self.current = proposed;
        }
    }

    pub fn status(&self) -> Status {
        self.current
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Status::*;

    fn fold(proposals: &[Status]) -> Status {
        let mut register = StatusRegister::new();
        for &p in proposals {
            register.propose(p);
        }
        register.status()
    }

    #[test]
    fn starts_ok() {
        assert_eq!(fold(&[]), Ok);
    }

    #[test]
    fn keeps_the_worst_concrete_status() {
        assert_eq!(fold(&[Warning, Ok, Critical, Warning]), Critical);
        assert_eq!(fold(&[Ok, Warning, Ok]), Warning);
    }

    #[test]
    fn unknown_alone_is_unknown() {
        assert_eq!(fold(&[Unknown]), Unknown);
        assert_eq!(fold(&[Unknown, Unknown]), Unknown);
    }

    #[test]
    fn unknown_never_hides_a_real_problem() {
        assert_eq!(fold(&[Warning, Unknown]), Warning);
        assert_eq!(fold(&[Critical, Unknown]), Critical);
    }

    #[test]
    fn concrete_results_replace_unknown() {
        assert_eq!(fold(&[Unknown, Warning]), Warning);
        // even a healthy result wins over unknown
        assert_eq!(fold(&[Unknown, Ok]), Ok);
    }
}
