//! Common types for chassis/card/port test equipment.
//!
//! This crate provides the identity and state primitives shared by the
//! device API layer and the topology client:
//!
//! - [`CardAddress`] / [`PortAddress`]: composite identities of slots and ports
//! - [`LinkState`]: port link states with the device's numeric codes
//! - [`ChassisType`]: chassis model classification

mod address;
mod chassis;
mod link;

pub use address::{CardAddress, PortAddress};
pub use chassis::ChassisType;
pub use link::LinkState;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid address format: {0}")]
    InvalidAddress(String),

    #[error("invalid link state: {0}")]
    InvalidLinkState(String),

    #[error("invalid chassis type: {0}")]
    InvalidChassisType(String),
}
