//! Read the appliance's SNMP agent
//!
//! SNMP is best effort: a failed get or walk is reported as missing data,
//! never as an error.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use itertools::Itertools;
use snmp2::{v3, Oid, SyncSession, Value};
use tracing::{debug, warn};

use crate::config::{ConfigError, HostConfig};

/// The port SNMP agents listen on unless told otherwise
pub const DEFAULT_SNMP_PORT: u16 = 161;

const TIMEOUT: Duration = Duration::from_secs(5);

/// OIDs of the MIB objects the checks read
pub mod oids {
    /// NET-SNMP-EXTEND-MIB::nsExtendOutLine
    pub const NS_EXTEND_OUT_LINE: &[u64] = &[1, 3, 6, 1, 4, 1, 8072, 1, 3, 2, 4, 1, 2];
    /// HOST-RESOURCES-MIB::hrProcessorLoad
    pub const HR_PROCESSOR_LOAD: &[u64] = &[1, 3, 6, 1, 2, 1, 25, 3, 3, 1, 2];
    /// IF-MIB::ifName
    pub const IF_NAME: &[u64] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 1];
    /// IF-MIB::ifHCInOctets
    pub const IF_HC_IN_OCTETS: &[u64] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 6];
    /// IF-MIB::ifHCOutOctets
    pub const IF_HC_OUT_OCTETS: &[u64] = &[1, 3, 6, 1, 2, 1, 31, 1, 1, 1, 10];
}

/// An OID with an index appended, e.g. `ifHCInOctets.3`
pub fn instance(base: &[u64], index: &str) -> Option<Vec<u64>> {
    let mut oid = base.to_vec();
    for part in index.split('.') {
        oid.push(part.parse().ok()?);
    }
    Some(oid)
}

/// Something that answers SNMP gets and walks
pub trait SnmpAgent {
    /// The value of a single object
    fn get(&mut self, oid: &[u64]) -> Option<String>;

    /// Every `(index, value)` under a subtree, in agent order
    fn walk(&mut self, oid: &[u64]) -> Option<Vec<(String, String)>>;
}

/// The step of a walk: the object following `oid`, if there is one
type Next = Result<Option<(Vec<u64>, String)>, String>;

/// Walk `base` by repeatedly asking for the next object
///
/// Stops when the agent leaves the subtree, runs out of objects, or stops
/// making progress.
fn walk_with<F>(base: &[u64], mut next: F) -> Result<Vec<(String, String)>, String>
where
    F: FnMut(&[u64]) -> Next,
{
    let mut found = Vec::new();
    let mut current = base.to_vec();
    while let Some((oid, value)) = next(&current[..])? {
        if !oid.starts_with(base) || oid.len() == base.len() || oid <= current {
            break;
        }
        let index = oid[base.len()..].iter().join(".");
        found.push((index, value));
        current = oid;
    }
    Ok(found)
}

/// The text of a scalar value, `None` for exceptions and empty values
fn render(value: &Value) -> Option<String> {
    match *value {
        Value::OctetString(s) => Some(String::from_utf8_lossy(s).into_owned()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Counter32(n) | Value::Unsigned32(n) | Value::Timeticks(n) => Some(n.to_string()),
        Value::Counter64(n) => Some(n.to_string()),
        Value::IpAddress(a) => Some(Ipv4Addr::from(a).to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::ObjectIdentifier(ref oid) => Some(oid.to_string()),
        Value::Null | Value::EndOfMibView | Value::NoSuchObject | Value::NoSuchInstance => None,
        ref other => Some(format!("{:?}", other)),
    }
}

fn to_oid(arcs: &[u64]) -> Result<Oid<'static>, String> {
    Oid::from(arcs).map_err(|e| format!("invalid OID {}: {:?}", arcs.iter().join("."), e))
}

/// An SNMP session with one appliance
///
/// `snmp_user` and `snmp_pass` give an SNMP v3 authNoPriv session with MD5
/// authentication, otherwise `snmp_community` gives a v2c session.
pub struct SnmpSession {
    session: SyncSession,
    /// Whether v3 engine discovery has been done
    ready: bool,
}

impl SnmpSession {
    /// Open a session from the host's `snmp_*` options
    ///
    /// Nothing is sent until the first request.
    pub fn new(host: &HostConfig, ip: &str) -> Result<SnmpSession, ConfigError> {
        let port = match host.option("snmp_port") {
            Some(port) => port.parse::<u16>().map_err(|_| {
                ConfigError::Connection(format!(
                    "Invalid snmp_port '{}' configured for {}",
                    port,
                    host.name()
                ))
            })?,
            None => DEFAULT_SNMP_PORT,
        };
        let ip: IpAddr = ip.parse().map_err(|_| {
            ConfigError::Connection(format!("Invalid address {} for {}", ip, host.name()))
        })?;
        let open_failed = |e: std::io::Error| {
            ConfigError::Connection(format!("Unable to open SNMP session: {}", e))
        };
        let session = match (host.option("snmp_user"), host.option("snmp_pass")) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                debug!(host = host.name(), "SNMP v3 authNoPriv session");
                let security = v3::Security::new(user.as_bytes(), pass.as_bytes())
                    .with_auth(v3::Auth::AuthNoPriv)
                    .with_auth_protocol(v3::AuthProtocol::Md5);
                SyncSession::new_v3((ip, port), Some(TIMEOUT), 0, security).map_err(open_failed)?
            }
            _ => match host.option("snmp_community") {
                Some(community) if !community.is_empty() => {
                    debug!(host = host.name(), "SNMP v2c session");
                    SyncSession::new_v2c((ip, port), community.as_bytes(), Some(TIMEOUT), 0)
                        .map_err(open_failed)?
                }
                _ => {
                    return Err(ConfigError::Connection(format!(
                        "Incorrect SNMP info configured for {}",
                        host.name()
                    )))
                }
            },
        };
        Ok(SnmpSession {
            session,
            ready: false,
        })
    }

    fn ensure_ready(&mut self) -> Result<(), String> {
        if !self.ready {
            self.session
                .init()
                .map_err(|e| format!("SNMP engine discovery failed: {}", e))?;
            self.ready = true;
        }
        Ok(())
    }

    fn get_value(&mut self, oid: &[u64]) -> Result<Option<String>, String> {
        self.ensure_ready()?;
        let oid = to_oid(oid)?;
        let mut pdu = self.session.get(&oid).map_err(|e| e.to_string())?;
        if pdu.error_status != 0 {
            return Ok(None);
        }
        Ok(pdu.varbinds.next().and_then(|(_, value)| render(&value)))
    }

    fn next_after(&mut self, oid: &[u64]) -> Next {
        self.ensure_ready()?;
        let oid = to_oid(oid)?;
        let mut pdu = self.session.getnext(&oid).map_err(|e| e.to_string())?;
        if pdu.error_status != 0 {
            return Ok(None);
        }
        let (name, value) = match pdu.varbinds.next() {
            Some(varbind) => varbind,
            None => return Ok(None),
        };
        let name: Vec<u64> = match name.iter() {
            Some(arcs) => arcs.collect(),
            None => return Err(format!("OID {} does not fit in 64 bits", name)),
        };
        Ok(render(&value).map(|value| (name, value)))
    }
}

impl SnmpAgent for SnmpSession {
    fn get(&mut self, oid: &[u64]) -> Option<String> {
        match self.get_value(oid) {
            Ok(value) => value,
            Err(e) => {
                warn!(oid = %oid.iter().join("."), error = %e, "SNMP get failed");
                None
            }
        }
    }

    fn walk(&mut self, oid: &[u64]) -> Option<Vec<(String, String)>> {
        match walk_with(oid, |current| self.next_after(current)) {
            Ok(found) => {
                debug!(oid = %oid.iter().join("."), found = found.len(), "SNMP walk");
                Some(found)
            }
            Err(e) => {
                warn!(oid = %oid.iter().join("."), error = %e, "SNMP walk failed");
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    use std::collections::BTreeMap;

    use crate::config::Config;

    /// An agent backed by a sorted table of objects
    #[derive(Default)]
    pub(crate) struct TableAgent {
        objects: BTreeMap<Vec<u64>, String>,
    }

    impl TableAgent {
        pub(crate) fn with(mut self, base: &[u64], index: &str, value: &str) -> TableAgent {
            self.objects
                .insert(instance(base, index).unwrap(), value.to_owned());
            self
        }
    }

    impl SnmpAgent for TableAgent {
        fn get(&mut self, oid: &[u64]) -> Option<String> {
            self.objects.get(oid).cloned()
        }

        fn walk(&mut self, oid: &[u64]) -> Option<Vec<(String, String)>> {
            let objects = &self.objects;
            walk_with(oid, |current| {
                Ok(objects
                    .range(current.to_vec()..)
                    .find(|&(k, _)| k.as_slice() > current)
                    .map(|(k, v)| (k.clone(), v.clone())))
            }).ok()
        }
    }

    fn session_for(raw: &str) -> Result<SnmpSession, ConfigError> {
        let config: Config = raw.parse().unwrap();
        SnmpSession::new(&config.host("nexenta01").unwrap(), "127.0.0.1")
    }

    #[test]
    fn walks_only_the_subtree() {
        let mut agent = TableAgent::default()
            .with(oids::IF_NAME, "1", "lo0")
            .with(oids::IF_NAME, "2", "e1000g0")
            .with(oids::IF_HC_IN_OCTETS, "1", "100");
        assert_eq!(
            agent.walk(oids::IF_NAME).unwrap(),
            vec![("1".to_owned(), "lo0".to_owned()), ("2".to_owned(), "e1000g0".to_owned())]
        );
    }

    #[test]
    fn walking_an_empty_subtree_finds_nothing() {
        let mut agent = TableAgent::default().with(oids::IF_NAME, "1", "lo0");
        assert!(agent.walk(oids::HR_PROCESSOR_LOAD).unwrap().is_empty());
    }

    #[test]
    fn walks_stop_when_the_agent_goes_backwards() {
        let base = oids::IF_NAME;
        let mut calls = 0;
        let found = walk_with(base, |_| {
            calls += 1;
            Ok(Some((instance(base, "1").unwrap(), "lo0".to_owned())))
        }).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(calls, 2);
    }

    #[test]
    fn walk_errors_are_reported() {
        assert!(walk_with(oids::IF_NAME, |_| Err("timeout".to_owned())).is_err());
    }

    #[test]
    fn multi_part_indexes_are_joined() {
        let mut agent = TableAgent::default().with(oids::NS_EXTEND_OUT_LINE, "4.97.114.99.1", "x");
        assert_eq!(
            agent.walk(oids::NS_EXTEND_OUT_LINE).unwrap()[0].0,
            "4.97.114.99.1"
        );
    }

    #[test]
    fn instances_append_the_index() {
        assert_eq!(
            instance(&[1, 3, 6], "2.5"),
            Some(vec![1, 3, 6, 2, 5])
        );
        assert_eq!(instance(&[1, 3, 6], "eth0"), None);
    }

    #[test]
    fn exceptions_render_as_missing() {
        assert_eq!(render(&Value::NoSuchInstance), None);
        assert_eq!(render(&Value::NoSuchObject), None);
        assert_eq!(render(&Value::EndOfMibView), None);
        assert_eq!(render(&Value::Null), None);
    }

    #[test]
    fn scalars_render_as_text() {
        assert_eq!(render(&Value::OctetString(b"e1000g0")), Some("e1000g0".to_owned()));
        assert_eq!(render(&Value::Integer(-3)), Some("-3".to_owned()));
        assert_eq!(render(&Value::Counter64(1 << 40)), Some("1099511627776".to_owned()));
        assert_eq!(render(&Value::IpAddress([10, 0, 0, 1])), Some("10.0.0.1".to_owned()));
    }

    #[test]
    fn v3_only_hosts_get_a_session() {
        let session = session_for("[nexenta01]\nsnmp_user = monitor\nsnmp_pass = secret123\n")
            .unwrap();
        assert!(!session.ready);
    }

    #[test]
    fn community_hosts_get_a_session() {
        assert!(session_for("[nexenta01]\nsnmp_community = public\nsnmp_port = 1161\n").is_ok());
    }

    #[test]
    fn half_configured_v3_falls_back_to_the_community() {
        assert!(session_for("[nexenta01]\nsnmp_user = monitor\nsnmp_community = public\n").is_ok());
    }

    #[test]
    fn hosts_without_snmp_are_rejected() {
        let err = session_for("[nexenta01]\nsnmp_user = monitor\n").err().unwrap();
        assert_eq!(err.to_string(), "Incorrect SNMP info configured for nexenta01");
    }

    #[test]
    fn bad_ports_are_rejected() {
        let err = session_for("[nexenta01]\nsnmp_community = public\nsnmp_port = snmp\n")
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "Invalid snmp_port 'snmp' configured for nexenta01"
        );
    }
}
