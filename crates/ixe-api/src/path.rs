//! Object addressing and request rendering.
//!
//! Every object the device exposes lives in a command namespace (`chassis`,
//! `card`, `port`, ...) and is selected by a space separated reference
//! (`"1 2 3"` for a port). [`ObjectPath`] pairs the two, and [`Request`]
//! describes one call against such an object.

use std::fmt;

use ixe_types::{CardAddress, PortAddress};

use crate::tcl::tclquote;

/// Command namespace of a device object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKind {
    /// Login session of the client.
    Session,
    Chassis,
    Card,
    Port,
    /// Stream (traffic) configuration of a port.
    Stream,
    /// Per-port statistics counters.
    Statistics,
    PortGroup,
}

impl ObjectKind {
    /// Returns the namespace used on the wire.
    pub const fn namespace(&self) -> &'static str {
        match self {
            ObjectKind::Session => "session",
            ObjectKind::Chassis => "chassis",
            ObjectKind::Card => "card",
            ObjectKind::Port => "port",
            ObjectKind::Stream => "stream",
            ObjectKind::Statistics => "stat",
            ObjectKind::PortGroup => "portGroup",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

/// Address of one object on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectPath {
    kind: ObjectKind,
    reference: String,
}

impl ObjectPath {
    pub fn new(kind: ObjectKind, reference: impl Into<String>) -> Self {
        Self {
            kind,
            reference: reference.into(),
        }
    }

    /// The client's login session.
    pub fn session() -> Self {
        Self::new(ObjectKind::Session, "")
    }

    /// A chassis, addressed by host name or IP address.
    pub fn chassis(host: &str) -> Self {
        Self::new(ObjectKind::Chassis, host)
    }

    pub fn card(card: CardAddress) -> Self {
        Self::new(ObjectKind::Card, card.tcl_ref())
    }

    pub fn port(port: PortAddress) -> Self {
        Self::new(ObjectKind::Port, port.tcl_ref())
    }

    /// Stream configuration of a port.
    pub fn stream(port: PortAddress) -> Self {
        Self::new(ObjectKind::Stream, port.tcl_ref())
    }

    /// Statistics counters of a port.
    pub fn statistics(port: PortAddress) -> Self {
        Self::new(ObjectKind::Statistics, port.tcl_ref())
    }

    pub fn port_group(id: u32) -> Self {
        Self::new(ObjectKind::PortGroup, id.to_string())
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reference.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{} {}", self.kind, self.reference)
        }
    }
}

/// A single call issued to the device.
///
/// The `Display` form is the command line the call corresponds to; it is
/// used as context in errors and in call logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Read one member of an object.
    Get { path: ObjectPath, member: String },
    /// Write one member of an object.
    Set {
        path: ObjectPath,
        member: String,
        value: String,
    },
    /// Run a stateless command against an object.
    Invoke {
        path: ObjectPath,
        command: String,
        args: Vec<String>,
    },
}

impl Request {
    pub fn get(path: &ObjectPath, member: &str) -> Self {
        Request::Get {
            path: path.clone(),
            member: member.to_string(),
        }
    }

    pub fn set(path: &ObjectPath, member: &str, value: &str) -> Self {
        Request::Set {
            path: path.clone(),
            member: member.to_string(),
            value: value.to_string(),
        }
    }

    pub fn invoke(path: &ObjectPath, command: &str, args: &[String]) -> Self {
        Request::Invoke {
            path: path.clone(),
            command: command.to_string(),
            args: args.to_vec(),
        }
    }

    /// Returns the object this request targets.
    pub fn path(&self) -> &ObjectPath {
        match self {
            Request::Get { path, .. } | Request::Set { path, .. } | Request::Invoke { path, .. } => {
                path
            }
        }
    }

    /// Returns the verb of the request (`cget`, `config` or the command name).
    pub fn verb(&self) -> &str {
        match self {
            Request::Get { .. } => "cget",
            Request::Set { .. } => "config",
            Request::Invoke { command, .. } => command,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = self.path().kind().namespace();
        let reference = self.path().reference();
        match self {
            Request::Get { member, .. } => write!(f, "{} cget {} -{}", ns, reference, member),
            Request::Set { member, value, .. } => {
                write!(f, "{} config {} -{} {}", ns, reference, member, tclquote(value))
            }
            Request::Invoke { command, args, .. } => {
                write!(f, "{} {}", ns, command)?;
                if !reference.is_empty() {
                    write!(f, " {}", reference)?;
                }
                for arg in args {
                    write!(f, " {}", tclquote(arg))?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_object_path_display() {
        assert_eq!(ObjectPath::chassis("10.0.0.5").to_string(), "chassis 10.0.0.5");
        assert_eq!(
            ObjectPath::card(CardAddress::new(1, 4)).to_string(),
            "card 1 4"
        );
        assert_eq!(
            ObjectPath::statistics(PortAddress::new(1, 4, 2)).to_string(),
            "stat 1 4 2"
        );
        assert_eq!(ObjectPath::port_group(7).to_string(), "portGroup 7");
        assert_eq!(ObjectPath::session().to_string(), "session");
    }

    #[test]
    fn test_request_rendering() {
        let port = ObjectPath::port(PortAddress::new(1, 2, 3));
        assert_eq!(Request::get(&port, "owner").to_string(), "port cget 1 2 3 -owner");
        assert_eq!(
            Request::set(&port, "name", "uplink a").to_string(),
            "port config 1 2 3 -name {uplink a}"
        );
        assert_eq!(
            Request::invoke(&port, "takeOwnership", &["force".to_string()]).to_string(),
            "port takeOwnership 1 2 3 force"
        );
        assert_eq!(
            Request::invoke(&ObjectPath::session(), "login", &["alice".to_string()]).to_string(),
            "session login alice"
        );
    }

    #[test]
    fn test_request_accessors() {
        let card = ObjectPath::card(CardAddress::new(1, 1));
        let req = Request::invoke(&card, "get", &[]);
        assert_eq!(req.path(), &card);
        assert_eq!(req.verb(), "get");
        assert_eq!(Request::get(&card, "portCount").verb(), "cget");
    }
}
