//! Cards discovered in chassis slots.

use std::sync::Arc;

use ixe_api::ObjectPath;
use ixe_types::CardAddress;
use tracing::{info, instrument};

use crate::discovery::Slot;
use crate::error::{TopologyError, TopologyResult};
use crate::port::PortHandle;
use crate::schema::{Attributes, CARD_SCHEMA};
use crate::session::Session;

/// Descriptive attributes read once while the card was discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardInfo {
    pub type_name: String,
    pub hw_version: i64,
    pub serial_number: String,
    pub port_count: u16,
}

/// A populated chassis slot.
#[derive(Debug, Clone)]
pub struct Card {
    session: Arc<Session>,
    address: CardAddress,
    info: CardInfo,
    ports: Vec<Slot<PortHandle>>,
}

impl Card {
    pub(crate) fn new(
        session: Arc<Session>,
        address: CardAddress,
        info: CardInfo,
        ports: Vec<Slot<PortHandle>>,
    ) -> Self {
        Self {
            session,
            address,
            info,
            ports,
        }
    }

    pub fn address(&self) -> CardAddress {
        self.address
    }

    pub fn path(&self) -> ObjectPath {
        ObjectPath::card(self.address)
    }

    /// Snapshot taken during discovery. Use the async accessors for live values.
    pub fn info(&self) -> &CardInfo {
        &self.info
    }

    /// Ports in index order; position `i` holds port `i + 1`.
    pub fn ports(&self) -> &[Slot<PortHandle>] {
        &self.ports
    }

    /// Returns the port at a 1-based index.
    pub fn port(&self, index: u16) -> TopologyResult<&PortHandle> {
        let address = self.address.port(index);
        self.session.ensure_connected(&ObjectPath::port(address))?;
        index
            .checked_sub(1)
            .and_then(|i| self.ports.get(usize::from(i)))
            .and_then(Slot::as_populated)
            .ok_or_else(|| TopologyError::invalid_handle(address, "no port at this index"))
    }

    /// Iterates over populated ports in index order.
    pub fn populated_ports(&self) -> impl Iterator<Item = &PortHandle> {
        self.ports.iter().filter_map(Slot::as_populated)
    }

    /// Binds a host NIC to a new port of a virtual load module.
    ///
    /// The port is placed at `port_id`; indices between the last known port
    /// and `port_id` are recorded as absent.
    #[instrument(skip(self), fields(card = %self.address))]
    pub async fn add_vm_port(
        &mut self,
        port_id: u16,
        nic_id: u16,
        mac: &str,
        promiscuous: bool,
        mtu: u32,
        speed: u32,
    ) -> TopologyResult<PortHandle> {
        let address = self.address.port(port_id);
        self.session.ensure_connected(&ObjectPath::port(address))?;
        if port_id == 0 {
            return Err(TopologyError::invalid_handle(address, "ports start at 1"));
        }

        let args = [
            port_id.to_string(),
            nic_id.to_string(),
            u8::from(promiscuous).to_string(),
            mac.to_string(),
            mtu.to_string(),
            speed.to_string(),
        ];
        self.session.invoke(&self.path(), "addVMPort", &args).await?;

        let port = PortHandle::new(Arc::clone(&self.session), address);
        let position = usize::from(port_id - 1);
        while self.ports.len() <= position {
            let index = self.ports.len() as u16 + 1;
            self.ports.push(Slot::Absent { index });
        }
        self.ports[position] = Slot::Populated(port.clone());
        info!(port = %address, nic_id, "Added VM port");
        Ok(port)
    }

    /// Unbinds a port from a virtual load module and leaves its index absent.
    #[instrument(skip(self, port), fields(port = %port.address()))]
    pub async fn remove_vm_port(&mut self, port: &PortHandle) -> TopologyResult<()> {
        let address = port.address();
        if address.card_address() != self.address {
            return Err(TopologyError::invalid_handle(
                address,
                format!("port does not belong to card {}", self.address),
            ));
        }
        self.port(address.port)?;
        self.session
            .invoke(&self.path(), "removeVMPort", &[address.port.to_string()])
            .await?;

        self.ports[usize::from(address.port - 1)] = Slot::Absent {
            index: address.port,
        };
        info!(port = %address, "Removed VM port");
        Ok(())
    }

    pub fn attributes(&self) -> Attributes<'_> {
        Attributes::new(&self.session, self.path(), &CARD_SCHEMA)
    }

    pub async fn type_name(&self) -> TopologyResult<String> {
        self.attributes().get("type_name").await
    }

    pub async fn card_type(&self) -> TopologyResult<i64> {
        self.attributes().get("type").await
    }

    pub async fn hw_version(&self) -> TopologyResult<i64> {
        self.attributes().get("hw_version").await
    }

    pub async fn fpga_version(&self) -> TopologyResult<i64> {
        self.attributes().get("fpga_version").await
    }

    pub async fn serial_number(&self) -> TopologyResult<String> {
        self.attributes().get("serial_number").await
    }

    pub async fn port_count(&self) -> TopologyResult<u16> {
        self.attributes().get("port_count").await
    }

    pub async fn operation_mode(&self) -> TopologyResult<i64> {
        self.attributes().get("card_operation_mode").await
    }
}
