//! Lab topologies for the simulated device
//!
//! A [`Topology`] describes which slots hold cards, which ports exist on
//! them and the state each port starts in. It can be built in code or
//! loaded from TOML:
//!
//! ```toml
//! host = "lab-chassis-1"
//! max_card_count = 3
//!
//! [[cards]]
//! slot = 1
//! type_name = "10/100/1000 LSM XMVDC16"
//! port_count = 2
//!
//! [[cards.ports]]
//! port = 2
//! owner = "bob"
//! ```

use std::fs;
use std::path::Path;

use ixe_types::{ChassisType, LinkState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixture loading errors
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Failed to read topology file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse topology: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid topology: {0}")]
    Invalid(String),
}

/// A simulated chassis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Host name the chassis answers to
    #[serde(default = "default_host")]
    pub host: String,

    /// Chassis model code
    #[serde(default = "default_chassis_type")]
    pub chassis_type: i32,

    /// Reported IxServer version
    #[serde(default = "default_server_version")]
    pub ix_server_version: String,

    /// Number of slots
    pub max_card_count: u16,

    /// Populated slots
    #[serde(default)]
    pub cards: Vec<SimCard>,
}

/// A card installed in a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimCard {
    /// 1-based slot index
    pub slot: u16,

    #[serde(default = "default_card_type_name")]
    pub type_name: String,

    #[serde(default = "default_hw_version")]
    pub hw_version: i64,

    #[serde(default)]
    pub serial_number: String,

    /// Declared port count
    pub port_count: u16,

    /// Port indices within `1..=port_count` the device reports as missing
    #[serde(default)]
    pub missing_ports: Vec<u16>,

    /// Ports whose state differs from the defaults
    #[serde(default)]
    pub ports: Vec<SimPort>,
}

/// Initial state of a port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimPort {
    /// 1-based port index
    pub port: u16,

    /// Owner login, empty if unowned
    #[serde(default)]
    pub owner: String,

    /// Link state code
    #[serde(default = "default_link_state")]
    pub link_state: i32,

    /// Supported line rates in Mbps
    #[serde(default = "default_line_rates")]
    pub line_rates: Vec<u32>,

    #[serde(default)]
    pub bytes_sent: u64,

    #[serde(default)]
    pub bytes_received: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_chassis_type() -> i32 {
    ChassisType::Ixia400T.code()
}

fn default_server_version() -> String {
    "5.30.450.31".to_string()
}

/// Type name the device reports for a virtual load module.
pub const VIRTUAL_CARD_TYPE: &str = "Virtual Load Module";

fn default_card_type_name() -> String {
    "10/100/1000 LSM XMVDC16".to_string()
}

fn default_hw_version() -> i64 {
    1
}

fn default_link_state() -> i32 {
    LinkState::Up.code()
}

fn default_line_rates() -> Vec<u32> {
    vec![10, 100, 1000]
}

impl Topology {
    /// An empty chassis with `max_card_count` slots
    pub fn new(max_card_count: u16) -> Self {
        Self {
            host: default_host(),
            chassis_type: default_chassis_type(),
            ix_server_version: default_server_version(),
            max_card_count,
            cards: Vec::new(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Installs a card, replacing any card in the same slot
    pub fn with_card(mut self, card: SimCard) -> Self {
        self.cards.retain(|c| c.slot != card.slot);
        self.cards.push(card);
        self.cards.sort_by_key(|c| c.slot);
        self
    }

    /// Parses and validates a TOML topology
    pub fn from_toml_str(content: &str) -> Result<Self, FixtureError> {
        let topology: Self = toml::from_str(content)?;
        topology.validate()?;
        Ok(topology)
    }

    /// Loads a TOML topology file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Checks slot and port indices against the declared counts
    pub fn validate(&self) -> Result<(), FixtureError> {
        let mut seen = Vec::new();
        for card in &self.cards {
            if card.slot == 0 || card.slot > self.max_card_count {
                return Err(FixtureError::Invalid(format!(
                    "card slot {} outside 1..={}",
                    card.slot, self.max_card_count
                )));
            }
            if seen.contains(&card.slot) {
                return Err(FixtureError::Invalid(format!(
                    "slot {} declared twice",
                    card.slot
                )));
            }
            seen.push(card.slot);

            let out_of_range = card
                .missing_ports
                .iter()
                .chain(card.ports.iter().map(|p| &p.port))
                .find(|&&index| index == 0 || index > card.port_count);
            if let Some(index) = out_of_range {
                return Err(FixtureError::Invalid(format!(
                    "port {} outside 1..={} on slot {}",
                    index, card.port_count, card.slot
                )));
            }
        }
        Ok(())
    }

    /// The card in a slot, if populated
    pub fn card(&self, slot: u16) -> Option<&SimCard> {
        self.cards.iter().find(|c| c.slot == slot)
    }

    /// Number of ports the device reports as present
    pub fn present_port_count(&self) -> usize {
        self.cards
            .iter()
            .map(|c| (1..=c.port_count).filter(|&p| c.has_port(p)).count())
            .sum()
    }
}

impl SimCard {
    pub fn new(slot: u16, port_count: u16) -> Self {
        Self {
            slot,
            type_name: default_card_type_name(),
            hw_version: default_hw_version(),
            serial_number: format!("SN-{:04}", slot),
            port_count,
            missing_ports: Vec::new(),
            ports: Vec::new(),
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    pub fn with_missing_port(mut self, port: u16) -> Self {
        self.missing_ports.push(port);
        self
    }

    /// Overrides the initial state of one port
    pub fn with_port(mut self, port: SimPort) -> Self {
        self.ports.retain(|p| p.port != port.port);
        self.ports.push(port);
        self
    }

    /// Returns true if the device reports this port index as present
    pub fn has_port(&self, port: u16) -> bool {
        port >= 1 && port <= self.port_count && !self.missing_ports.contains(&port)
    }

    /// Initial state of a port, defaults if not overridden
    pub fn port_state(&self, port: u16) -> SimPort {
        self.ports
            .iter()
            .find(|p| p.port == port)
            .cloned()
            .unwrap_or_else(|| SimPort::new(port))
    }
}

impl SimPort {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            owner: String::new(),
            link_state: default_link_state(),
            line_rates: default_line_rates(),
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn with_link_state(mut self, state: LinkState) -> Self {
        self.link_state = state.code();
        self
    }

    pub fn with_line_rates(mut self, rates: Vec<u32>) -> Self {
        self.line_rates = rates;
        self
    }

    pub fn with_counters(mut self, bytes_sent: u64, bytes_received: u64) -> Self {
        self.bytes_sent = bytes_sent;
        self.bytes_received = bytes_received;
        self
    }
}

/// Canned topologies
pub mod topologies {
    use super::*;

    /// Three slots: two ports in slot 1, slot 2 empty, one port in slot 3
    pub fn sparse_three_slot() -> Topology {
        Topology::new(3)
            .with_host("sparse-lab")
            .with_card(SimCard::new(1, 2))
            .with_card(SimCard::new(3, 1).with_type_name("10GE LAN XM"))
    }

    /// A fully populated chassis
    pub fn full(max_card_count: u16, ports_per_card: u16) -> Topology {
        (1..=max_card_count).fold(Topology::new(max_card_count), |topology, slot| {
            topology.with_card(SimCard::new(slot, ports_per_card))
        })
    }
}
