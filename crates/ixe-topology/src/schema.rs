//! Attribute schema tables and the generic typed accessor.
//!
//! Each device object exposes a fixed set of members. Instead of resolving
//! them dynamically, every entity declares a static [`Schema`] mapping the
//! Rust-side attribute name to the remote member name, its value type and
//! whether it may be written. [`Attributes`] consumes that table to provide
//! checked `get`/`set` on any object.

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use ixe_api::ObjectPath;
use tracing::debug;

use crate::error::{TopologyError, TopologyResult};
use crate::session::Session;

/// Value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Signed integer.
    Int,
    /// Free-form string.
    Str,
}

/// Declaration of a single attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    /// Rust-side name (snake case).
    pub name: &'static str,
    /// Member name used on the device.
    pub member: &'static str,
    /// Value type.
    pub kind: ValueKind,
    /// True if the device does not accept writes.
    pub read_only: bool,
}

const fn rw(name: &'static str, member: &'static str, kind: ValueKind) -> AttributeSpec {
    AttributeSpec {
        name,
        member,
        kind,
        read_only: false,
    }
}

const fn ro(name: &'static str, member: &'static str, kind: ValueKind) -> AttributeSpec {
    AttributeSpec {
        name,
        member,
        kind,
        read_only: true,
    }
}

/// The attribute table of one entity.
#[derive(Debug)]
pub struct Schema {
    /// Entity name, used in error messages.
    pub object: &'static str,
    /// Declared attributes.
    pub attributes: &'static [AttributeSpec],
}

impl Schema {
    /// Looks up an attribute by its Rust-side name.
    pub fn lookup(&self, name: &str) -> TopologyResult<&'static AttributeSpec> {
        self.attributes
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| TopologyError::UnknownAttribute {
                schema: self.object,
                attribute: name.to_string(),
            })
    }

    /// Iterates over the declared attribute names.
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        self.attributes.iter().map(|spec| spec.name)
    }
}

use ValueKind::{Int, Str};

pub static CHASSIS_SCHEMA: Schema = Schema {
    object: "chassis",
    attributes: &[
        rw("base_ip_address", "baseIpAddress", Str),
        rw("cable_length", "cableLength", Int),
        ro("host_name", "hostName", Str),
        rw("id", "id", Int),
        ro("ip_address", "ipAddress", Str),
        ro("ix_server_version", "ixServerVersion", Str),
        ro("master", "master", Str),
        ro("max_card_count", "maxCardCount", Int),
        rw("name", "name", Str),
        ro("operating_system", "operatingSystem", Int),
        rw("sequence", "sequence", Int),
        ro("type", "type", Int),
        ro("type_name", "typeName", Str),
    ],
};

pub static CARD_SCHEMA: Schema = Schema {
    object: "card",
    attributes: &[
        ro("card_operation_mode", "cardOperationMode", Int),
        rw("clock_rx_rising_edge", "clockRxRisingEdge", Int),
        rw("clock_select", "clockSelect", Int),
        rw("clock_tx_rising_edge", "clockTxRisingEdge", Int),
        ro("fpga_version", "fpgaVersion", Int),
        ro("hw_version", "hwVersion", Int),
        ro("port_count", "portCount", Int),
        ro("serial_number", "serialNumber", Str),
        rw("tx_frequency_deviation", "txFrequencyDeviation", Int),
        ro("type", "type", Int),
        rw("type_name", "typeName", Str),
    ],
};

pub static PORT_SCHEMA: Schema = Schema {
    object: "port",
    attributes: &[
        rw("name", "name", Str),
        ro("owner", "owner", Str),
        ro("type", "type", Int),
        rw("loopback", "loopback", Str),
        rw("flow_control", "flowControl", Str),
        ro("link_state", "linkState", Int),
        rw("port_mode", "portMode", Int),
        rw("transmit_mode", "transmitMode", Str),
        rw("receive_mode", "receiveMode", Int),
    ],
};

pub static STATISTICS_SCHEMA: Schema = Schema {
    object: "stat",
    attributes: &[
        ro("bytes_received", "bytesReceived", Int),
        ro("bytes_sent", "bytesSent", Int),
    ],
};

pub static PORT_GROUP_SCHEMA: Schema = Schema {
    object: "portGroup",
    attributes: &[ro("last_time_stamp", "lastTimeStamp", Int)],
};

/// Checked attribute access for one object.
///
/// Every call checks the session first, so a handle obtained before a
/// disconnect fails with `InvalidHandle` instead of returning stale data.
/// Nothing is cached: each `get` is a device round-trip.
pub struct Attributes<'a> {
    session: &'a Arc<Session>,
    path: ObjectPath,
    schema: &'static Schema,
}

impl<'a> Attributes<'a> {
    pub(crate) fn new(session: &'a Arc<Session>, path: ObjectPath, schema: &'static Schema) -> Self {
        Self {
            session,
            path,
            schema,
        }
    }

    /// Returns the schema backing this accessor.
    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Reads an attribute as the raw device string.
    pub async fn get_raw(&self, name: &str) -> TopologyResult<String> {
        let spec = self.schema.lookup(name)?;
        self.session.ensure_connected(&self.path)?;
        let value = self.session.api().get(&self.path, spec.member).await?;
        debug!(object = %self.path, member = spec.member, value = %value, "Read attribute");
        Ok(value)
    }

    /// Reads an attribute and parses it into `T`.
    pub async fn get<T: FromStr>(&self, name: &str) -> TopologyResult<T> {
        let raw = self.get_raw(name).await?;
        raw.trim()
            .parse::<T>()
            .map_err(|_| TopologyError::InvalidValue {
                object: self.path.to_string(),
                attribute: name.to_string(),
                value: raw,
            })
    }

    /// Writes an attribute.
    ///
    /// Read-only attributes and values that do not match an integer
    /// attribute are rejected before any device call is made.
    pub async fn set(&self, name: &str, value: impl Display) -> TopologyResult<()> {
        let spec = self.schema.lookup(name)?;
        if spec.read_only {
            return Err(TopologyError::ReadOnlyAttribute {
                object: self.path.to_string(),
                attribute: name.to_string(),
            });
        }
        let value = value.to_string();
        if spec.kind == ValueKind::Int && value.trim().parse::<i64>().is_err() {
            return Err(TopologyError::InvalidValue {
                object: self.path.to_string(),
                attribute: name.to_string(),
                value,
            });
        }
        self.session.ensure_connected(&self.path)?;
        self.session.api().set(&self.path, spec.member, &value).await?;
        debug!(object = %self.path, member = spec.member, value = %value, "Wrote attribute");
        Ok(())
    }
}
