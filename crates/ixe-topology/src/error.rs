//! Error types for topology operations.
//!
//! Device errors are carried unchanged so callers can still tell a remote
//! rejection from a transport failure. Discovery converts `NotFound` into
//! absent slots; every other failure aborts the operation and is reported
//! here with the object and command that failed.

use std::io;
use std::path::PathBuf;

use ixe_api::DeviceError;
use ixe_types::PortAddress;
use thiserror::Error;

use crate::card::Card;
use crate::discovery::Slot;

/// Result type alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Errors that can occur while discovering or driving a chassis.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// A device call failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A non-forced reservation hit a port held by another party.
    #[error("Port {port} is already owned by '{owner}'")]
    AlreadyOwned {
        /// The port that could not be reserved.
        port: PortAddress,
        /// The current owner as reported by the device.
        owner: String,
    },

    /// The handle refers to a disconnected chassis or an empty slot.
    #[error("Invalid handle '{object}': {reason}")]
    InvalidHandle {
        /// The object the handle refers to.
        object: String,
        /// Why the handle cannot be used.
        reason: String,
    },

    /// Configuration file suffix is neither `.prt` nor `.str`.
    #[error("Unsupported configuration format '{extension}' for {}", .path.display())]
    UnsupportedConfigFormat {
        /// The rejected file.
        path: PathBuf,
        /// The lower-cased suffix (empty if none).
        extension: String,
    },

    /// Attempt to write a read-only attribute.
    #[error("Attribute '{attribute}' of '{object}' is read-only")]
    ReadOnlyAttribute {
        /// The object addressed.
        object: String,
        /// The attribute name.
        attribute: String,
    },

    /// Attribute name not declared in the object's schema.
    #[error("Unknown attribute '{attribute}' for {schema}")]
    UnknownAttribute {
        /// The schema searched.
        schema: &'static str,
        /// The attribute name.
        attribute: String,
    },

    /// Value could not be converted to or from the attribute's type.
    #[error("Invalid value '{value}' for attribute '{attribute}' of '{object}'")]
    InvalidValue {
        /// The object addressed.
        object: String,
        /// The attribute name.
        attribute: String,
        /// The offending value.
        value: String,
    },

    /// Explicit port group id collides with a live group.
    #[error("Port group id {id} is already in use")]
    PortGroupIdInUse {
        /// The requested id.
        id: u32,
    },

    /// Discovery stopped before the whole chassis was walked.
    #[error(transparent)]
    IncompleteDiscovery(Box<IncompleteDiscovery>),

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Configuration file could not be read.
    #[error("Failed to read configuration file '{}': {source}", .path.display())]
    ConfigIo {
        /// The file that was read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Configuration file is not valid TOML for the expected schema.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Details of a discovery run that hit a fatal error.
///
/// The slots discovered before the failing one are kept in order so the
/// caller can report them, but they are never installed on the chassis.
#[derive(Debug, Error)]
#[error("Discovery of chassis '{host}' stopped at '{failed_object}': {source}")]
pub struct IncompleteDiscovery {
    /// Host of the chassis being discovered.
    pub host: String,
    /// The object whose probe failed.
    pub failed_object: String,
    /// Slots completed before the failure, in slot order.
    pub discovered: Vec<Slot<Card>>,
    /// The fatal error.
    #[source]
    pub source: TopologyError,
}

impl TopologyError {
    /// Creates an invalid handle error.
    pub fn invalid_handle(object: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidHandle {
            object: object.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns the underlying device error, looking through incomplete discovery.
    pub fn device_error(&self) -> Option<&DeviceError> {
        match self {
            TopologyError::Device(e) => Some(e),
            TopologyError::IncompleteDiscovery(inner) => inner.source.device_error(),
            _ => None,
        }
    }

    /// Returns true if a non-forced reservation found the port taken.
    pub fn is_already_owned(&self) -> bool {
        matches!(self, TopologyError::AlreadyOwned { .. })
    }

    /// Returns true if the handle was stale or referred to an empty slot.
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, TopologyError::InvalidHandle { .. })
    }

    /// Returns true if the device rejected a command.
    pub fn is_command_failed(&self) -> bool {
        self.device_error().is_some_and(DeviceError::is_command_failed)
    }

    /// Returns true if the device could not be reached.
    pub fn is_transport_failure(&self) -> bool {
        self.device_error()
            .is_some_and(DeviceError::is_transport_failure)
    }

    /// Returns true if the device did not answer in time.
    pub fn is_timeout(&self) -> bool {
        self.device_error().is_some_and(DeviceError::is_timeout)
    }

    /// Returns the partial result if this is an incomplete discovery.
    pub fn as_incomplete_discovery(&self) -> Option<&IncompleteDiscovery> {
        match self {
            TopologyError::IncompleteDiscovery(inner) => Some(inner),
            _ => None,
        }
    }
}
