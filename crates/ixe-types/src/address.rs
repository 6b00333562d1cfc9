//! Composite identities for cards and ports.
//!
//! A card is addressed by `(chassis, card)` and a port by
//! `(chassis, card, port)`. All indices are 1-based, matching the device.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address of a card slot within a chassis.
///
/// # Examples
///
/// ```
/// use ixe_types::CardAddress;
///
/// let card = CardAddress::new(1, 3);
/// assert_eq!(card.to_string(), "1/3");
/// assert_eq!(card.tcl_ref(), "1 3");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CardAddress {
    pub chassis: u16,
    pub card: u16,
}

impl CardAddress {
    pub const fn new(chassis: u16, card: u16) -> Self {
        Self { chassis, card }
    }

    /// Returns the address of a port on this card.
    pub const fn port(&self, port: u16) -> PortAddress {
        PortAddress::new(self.chassis, self.card, port)
    }

    /// Space separated object reference used on the wire.
    pub fn tcl_ref(&self) -> String {
        format!("{} {}", self.chassis, self.card)
    }
}

impl fmt::Display for CardAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chassis, self.card)
    }
}

impl FromStr for CardAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_indices::<2>(s) {
            Some([chassis, card]) => Ok(Self::new(chassis, card)),
            None => Err(ParseError::InvalidAddress(s.to_string())),
        }
    }
}

/// Address of a port.
///
/// The `Display` form (`chassis/card/port`) is the port's display name. It
/// depends only on the three indices, so it is stable across discovery runs.
///
/// # Examples
///
/// ```
/// use ixe_types::PortAddress;
///
/// let port: PortAddress = "1/2/4".parse().unwrap();
/// assert_eq!(port.card_address().card, 2);
/// assert_eq!(port.tcl_ref(), "1 2 4");
/// assert!("1/2".parse::<PortAddress>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortAddress {
    pub chassis: u16,
    pub card: u16,
    pub port: u16,
}

impl PortAddress {
    pub const fn new(chassis: u16, card: u16, port: u16) -> Self {
        Self {
            chassis,
            card,
            port,
        }
    }

    /// Returns the address of the card hosting this port.
    pub const fn card_address(&self) -> CardAddress {
        CardAddress::new(self.chassis, self.card)
    }

    /// Space separated object reference used on the wire.
    pub fn tcl_ref(&self) -> String {
        format!("{} {} {}", self.chassis, self.card, self.port)
    }
}

impl fmt::Display for PortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.chassis, self.card, self.port)
    }
}

impl FromStr for PortAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_indices::<3>(s) {
            Some([chassis, card, port]) => Ok(Self::new(chassis, card, port)),
            None => Err(ParseError::InvalidAddress(s.to_string())),
        }
    }
}

/// Parses exactly `N` slash separated, non-zero indices.
fn parse_indices<const N: usize>(s: &str) -> Option<[u16; N]> {
    let mut out = [0u16; N];
    let mut parts = s.trim().split('/');
    for slot in out.iter_mut() {
        let value: u16 = parts.next()?.parse().ok()?;
        if value == 0 {
            return None;
        }
        *slot = value;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}
