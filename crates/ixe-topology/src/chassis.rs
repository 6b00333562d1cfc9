//! Chassis connection lifecycle and the discovered resource tree.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ixe_api::{DeviceApi, ObjectPath};
use ixe_types::{CardAddress, ChassisType};
use tracing::{error, info, instrument, warn};

use crate::card::Card;
use crate::discovery::{DiscoveryOptions, Prober, Slot};
use crate::error::{TopologyError, TopologyResult};
use crate::port::PortHandle;
use crate::port_group::PortGroup;
use crate::schema::{Attributes, CHASSIS_SCHEMA};
use crate::session::{Session, SessionParams};

/// Connection state of a chassis as seen by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

/// A connected chassis and, once discovered, its card/port tree.
#[derive(Debug)]
pub struct Chassis {
    session: Arc<Session>,
    max_card_count: u16,
    slots: Vec<Slot<Card>>,
    discovered: bool,
}

impl Chassis {
    /// Logs in, adds the chassis and reads its slot count.
    ///
    /// Device errors are returned unchanged, so a transport failure stays
    /// distinguishable from a rejected command.
    #[instrument(skip(api, params), fields(chassis_id = params.chassis_id))]
    pub async fn connect(
        api: Arc<dyn DeviceApi>,
        host: &str,
        params: SessionParams,
    ) -> TopologyResult<Self> {
        let session = Session::new(api, host, params);
        let chassis_path = ObjectPath::chassis(host);

        if let Some(owner) = session.params().owner.as_deref() {
            session
                .api()
                .invoke(&ObjectPath::session(), "login", &[owner.to_string()])
                .await?;
            info!(owner = %owner, "Logged in");
        }

        session.api().invoke(&chassis_path, "add", &[]).await?;
        session.mark_connected();

        let attrs = Attributes::new(&session, chassis_path.clone(), &CHASSIS_SCHEMA);
        let setup = async {
            attrs.set("id", session.chassis_id()).await?;
            attrs.get::<u16>("max_card_count").await
        };
        let max_card_count = match setup.await {
            Ok(count) => count,
            Err(e) => {
                session.mark_disconnected();
                error!(error = %e, "Failed to initialize chassis {}", host);
                match session.api().invoke(&chassis_path, "del", &[]).await {
                    Ok(_) => info!("Removed half-initialized chassis {}", host),
                    Err(del) => warn!(error = %del, "Failed to remove chassis {}", host),
                }
                return Err(e);
            }
        };

        info!(max_card_count, "Connected to chassis {}", host);
        Ok(Self {
            session,
            max_card_count,
            slots: Vec::new(),
            discovered: false,
        })
    }

    /// Discovers cards and ports using the session's discovery options.
    pub async fn discover(&mut self) -> TopologyResult<()> {
        let options = self.session.params().discovery;
        self.discover_with(options).await
    }

    /// Discovers cards and ports, replacing any previous tree.
    ///
    /// The tree is installed only if the whole chassis was walked. On a fatal
    /// error the chassis holds no tree and the partial result is available
    /// from [`TopologyError::as_incomplete_discovery`].
    #[instrument(skip(self), fields(host = %self.session.host()))]
    pub async fn discover_with(&mut self, options: DiscoveryOptions) -> TopologyResult<()> {
        self.session
            .ensure_connected(&ObjectPath::chassis(self.session.host()))?;
        self.slots.clear();
        self.discovered = false;

        let slots = Prober::new(Arc::clone(&self.session), options)
            .discover_chassis(self.max_card_count)
            .await?;

        let populated = slots.iter().filter(|slot| slot.is_populated()).count();
        info!(
            slots = slots.len(),
            populated, "Discovered chassis {}",
            self.session.host()
        );
        self.slots = slots;
        self.discovered = true;
        Ok(())
    }

    /// Removes the chassis from the session and invalidates every handle.
    ///
    /// The session is marked disconnected even if the device rejects the
    /// removal. Disconnecting an already disconnected chassis does nothing.
    #[instrument(skip(self), fields(host = %self.session.host()))]
    pub async fn disconnect(&mut self) -> TopologyResult<()> {
        if !self.session.mark_disconnected() {
            return Ok(());
        }
        self.slots.clear();
        self.discovered = false;

        let path = ObjectPath::chassis(self.session.host());
        match self.session.api().invoke(&path, "del", &[]).await {
            Ok(_) => {
                info!("Disconnected from chassis {}", self.session.host());
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Chassis removal failed, handles are invalidated anyway");
                Err(e.into())
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        if self.session.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    pub fn host(&self) -> &str {
        self.session.host()
    }

    pub fn chassis_id(&self) -> u16 {
        self.session.chassis_id()
    }

    /// Slot count read from the device at connect time.
    pub fn max_card_count(&self) -> u16 {
        self.max_card_count
    }

    pub fn is_discovered(&self) -> bool {
        self.discovered
    }

    pub fn path(&self) -> ObjectPath {
        ObjectPath::chassis(self.session.host())
    }

    /// Slots in index order; position `i` holds slot `i + 1`.
    ///
    /// Empty until a discovery run has completed.
    pub fn slots(&self) -> &[Slot<Card>] {
        &self.slots
    }

    /// Returns the card in a 1-based slot.
    pub fn card(&self, index: u16) -> TopologyResult<&Card> {
        let address = CardAddress::new(self.chassis_id(), index);
        self.session.ensure_connected(&ObjectPath::card(address))?;
        if !self.discovered {
            return Err(TopologyError::invalid_handle(
                address,
                "chassis has not been discovered",
            ));
        }
        index
            .checked_sub(1)
            .and_then(|i| self.slots.get(usize::from(i)))
            .and_then(Slot::as_populated)
            .ok_or_else(|| TopologyError::invalid_handle(address, "no card in this slot"))
    }

    /// Mutable access to the card in a 1-based slot, for VM port management.
    pub fn card_mut(&mut self, index: u16) -> TopologyResult<&mut Card> {
        self.card(index)?;
        let address = CardAddress::new(self.chassis_id(), index);
        self.slots
            .get_mut(usize::from(index - 1))
            .and_then(Slot::as_populated_mut)
            .ok_or_else(|| TopologyError::invalid_handle(address, "no card in this slot"))
    }

    /// Iterates over populated cards in slot order.
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.slots.iter().filter_map(Slot::as_populated)
    }

    /// Flattens the tree into a map from port display name to handle.
    pub fn resolve_ports(&self) -> TopologyResult<BTreeMap<String, PortHandle>> {
        self.session.ensure_connected(&self.path())?;
        if !self.discovered {
            return Err(TopologyError::invalid_handle(
                self.path(),
                "chassis has not been discovered",
            ));
        }
        Ok(self
            .cards()
            .flat_map(Card::populated_ports)
            .map(|port| (port.name(), port.clone()))
            .collect())
    }

    pub fn attributes(&self) -> Attributes<'_> {
        Attributes::new(&self.session, self.path(), &CHASSIS_SCHEMA)
    }

    pub async fn name(&self) -> TopologyResult<String> {
        self.attributes().get_raw("name").await
    }

    pub async fn set_name(&self, name: &str) -> TopologyResult<()> {
        self.attributes().set("name", name).await
    }

    pub async fn type_name(&self) -> TopologyResult<String> {
        self.attributes().get_raw("type_name").await
    }

    pub async fn chassis_type(&self) -> TopologyResult<ChassisType> {
        self.attributes().get("type").await
    }

    pub async fn host_name(&self) -> TopologyResult<String> {
        self.attributes().get_raw("host_name").await
    }

    pub async fn ix_server_version(&self) -> TopologyResult<String> {
        self.attributes().get_raw("ix_server_version").await
    }

    pub async fn ip_address(&self) -> TopologyResult<String> {
        self.attributes().get_raw("ip_address").await
    }

    /// Registers a virtual load module at slot `card_id` and probes it.
    ///
    /// The card is placed in the discovered tree at its slot. A slot index
    /// beyond the current tree is padded with absent markers.
    #[instrument(skip(self), fields(host = %self.session.host()))]
    pub async fn add_virtual_card(
        &mut self,
        card_ip: &str,
        card_id: u16,
        keep_alive: u32,
    ) -> TopologyResult<&Card> {
        let address = CardAddress::new(self.chassis_id(), card_id);
        self.session.ensure_connected(&ObjectPath::card(address))?;
        if !self.discovered {
            return Err(TopologyError::invalid_handle(
                address,
                "chassis has not been discovered",
            ));
        }
        if card_id == 0 {
            return Err(TopologyError::invalid_handle(address, "card slots start at 1"));
        }

        let args = [card_ip.to_string(), card_id.to_string(), keep_alive.to_string()];
        self.session
            .invoke(&self.path(), "addVirtualCard", &args)
            .await?;

        let slot = Prober::new(Arc::clone(&self.session), self.session.params().discovery)
            .discover_slot(address)
            .await?;
        let card = slot.into_populated().ok_or_else(|| {
            TopologyError::invalid_handle(address, "virtual card did not appear after adding")
        })?;
        info!(card = %address, card_ip = %card_ip, "Added virtual card");

        let position = usize::from(card_id - 1);
        while self.slots.len() <= position {
            let index = self.slots.len() as u16 + 1;
            self.slots.push(Slot::Absent { index });
        }
        self.slots[position] = Slot::Populated(card);
        self.card(card_id)
    }

    /// Unregisters a virtual load module and leaves its slot absent.
    #[instrument(skip(self, card), fields(host = %self.session.host(), card = %card.address()))]
    pub async fn remove_virtual_card(&mut self, card: &Card) -> TopologyResult<()> {
        let address = card.address();
        self.card(address.card)?;
        self.session
            .invoke(&self.path(), "removeVMCard", &[address.card.to_string()])
            .await?;

        self.slots[usize::from(address.card - 1)] = Slot::Absent {
            index: address.card,
        };
        info!(card = %address, "Removed virtual card");
        Ok(())
    }

    /// Creates a port group, with an explicit id or the lowest free one.
    pub async fn create_port_group(&self, id: Option<u32>) -> TopologyResult<PortGroup> {
        PortGroup::create(Arc::clone(&self.session), id).await
    }
}
