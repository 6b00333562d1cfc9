//! Inventory report built from a discovered chassis.

use std::fmt::Write;

use ixe_topology::{Chassis, TopologyResult};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryReport {
    pub host: String,
    pub chassis_id: u16,
    pub chassis_type: String,
    pub max_card_count: u16,
    pub cards: Vec<CardRow>,
    pub ports: Vec<PortRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardRow {
    pub card: String,
    pub type_name: String,
    pub hw_version: i64,
    pub serial_number: String,
    pub port_count: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortRow {
    pub port: String,
    pub owner: String,
    pub link_state: String,
    pub speeds: Vec<u32>,
}

impl InventoryReport {
    /// Reads live port state for every resolved port of a discovered chassis.
    pub async fn collect(chassis: &Chassis) -> TopologyResult<Self> {
        let chassis_type = chassis.chassis_type().await?;

        let cards = chassis
            .cards()
            .map(|card| CardRow {
                card: card.address().to_string(),
                type_name: card.info().type_name.clone(),
                hw_version: card.info().hw_version,
                serial_number: card.info().serial_number.clone(),
                port_count: card.info().port_count,
            })
            .collect();

        let mut ports = Vec::new();
        for (name, port) in chassis.resolve_ports()? {
            ports.push(PortRow {
                port: name,
                owner: port.owner().await?,
                link_state: port.link_state().await?.to_string(),
                speeds: port.supported_speeds().await?,
            });
        }

        Ok(Self {
            host: chassis.host().to_string(),
            chassis_id: chassis.chassis_id(),
            chassis_type: chassis_type.to_string(),
            max_card_count: chassis.max_card_count(),
            cards,
            ports,
        })
    }

    /// Plain-text tables for terminal output.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Chassis {} (id {}): {}, {} slots",
            self.host, self.chassis_id, self.chassis_type, self.max_card_count
        );

        let _ = writeln!(out);
        let _ = writeln!(out, "{:<8} {:<28} {:>5} {:<12}", "CARD", "TYPE", "HW", "SERIAL");
        for card in &self.cards {
            let _ = writeln!(
                out,
                "{:<8} {:<28} {:>5} {:<12}",
                card.card, card.type_name, card.hw_version, card.serial_number
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{:<10} {:<12} {:<16} SPEEDS", "PORT", "OWNER", "LINK");
        for port in &self.ports {
            let owner = if port.owner.is_empty() { "-" } else { &port.owner };
            let speeds = port
                .speeds
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let _ = writeln!(
                out,
                "{:<10} {:<12} {:<16} {}",
                port.port, owner, port.link_state, speeds
            );
        }
        out
    }
}
