//! Port groups for synchronized transmit, capture and ownership commands.
//!
//! A group is not part of the chassis tree. It references its member ports
//! by address only, so membership has no effect on discovery or on port
//! ownership.

use std::collections::BTreeSet;
use std::sync::Arc;

use ixe_api::ObjectPath;
use ixe_types::PortAddress;
use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::error::{TopologyError, TopologyResult};
use crate::port::PortHandle;
use crate::schema::{Attributes, PORT_GROUP_SCHEMA};
use crate::session::Session;

/// Allocator for port group ids, owned by a session.
///
/// Automatic ids are the lowest free value starting at 1. Explicit ids
/// are claimed so later automatic allocations skip them.
#[derive(Debug, Default)]
pub struct PortGroupIds {
    in_use: Mutex<BTreeSet<u32>>,
}

impl PortGroupIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves and returns the lowest free id.
    pub fn allocate(&self) -> u32 {
        let mut in_use = self.in_use.lock();
        let id = (1..)
            .find(|candidate| !in_use.contains(candidate))
            .unwrap_or(u32::MAX);
        in_use.insert(id);
        id
    }

    /// Reserves an explicit id.
    pub fn claim(&self, id: u32) -> TopologyResult<()> {
        if self.in_use.lock().insert(id) {
            Ok(())
        } else {
            Err(TopologyError::PortGroupIdInUse { id })
        }
    }

    /// Returns an id to the pool.
    pub fn release(&self, id: u32) {
        self.in_use.lock().remove(&id);
    }

    pub fn is_in_use(&self, id: u32) -> bool {
        self.in_use.lock().contains(&id)
    }
}

/// Group-wide command understood by `portGroup setCommand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCommand {
    StartTransmit,
    StopTransmit,
    StartCapture,
    StopCapture,
    ResetStatistics,
    PauseTransmit,
    StepTransmit,
    TransmitPing,
    TakeOwnership,
    TakeOwnershipForced,
    ClearOwnership,
    ClearOwnershipForced,
}

impl GroupCommand {
    /// Numeric code sent to the device.
    pub const fn code(&self) -> u32 {
        match self {
            GroupCommand::StartTransmit => 7,
            GroupCommand::StopTransmit => 8,
            GroupCommand::StartCapture => 9,
            GroupCommand::StopCapture => 10,
            GroupCommand::ResetStatistics => 13,
            GroupCommand::PauseTransmit => 15,
            GroupCommand::StepTransmit => 16,
            GroupCommand::TransmitPing => 17,
            GroupCommand::TakeOwnership => 40,
            GroupCommand::TakeOwnershipForced => 41,
            GroupCommand::ClearOwnership => 42,
            GroupCommand::ClearOwnershipForced => 43,
        }
    }
}

/// A device-side group of ports.
#[derive(Debug)]
pub struct PortGroup {
    session: Arc<Session>,
    id: u32,
    members: BTreeSet<PortAddress>,
}

impl PortGroup {
    /// Creates the group on the device, allocating an id unless one is given.
    pub(crate) async fn create(session: Arc<Session>, id: Option<u32>) -> TopologyResult<Self> {
        let probe_path = ObjectPath::port_group(id.unwrap_or_default());
        session.ensure_connected(&probe_path)?;

        let id = match id {
            Some(id) => {
                session.port_group_ids().claim(id)?;
                id
            }
            None => session.port_group_ids().allocate(),
        };

        let path = ObjectPath::port_group(id);
        if let Err(e) = session.invoke(&path, "create", &[]).await {
            session.port_group_ids().release(id);
            return Err(e);
        }
        info!(id, "Created port group");

        Ok(Self {
            session,
            id,
            members: BTreeSet::new(),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> ObjectPath {
        ObjectPath::port_group(self.id)
    }

    /// Member ports in address order.
    pub fn members(&self) -> impl Iterator<Item = &PortAddress> {
        self.members.iter()
    }

    pub fn contains(&self, port: &PortAddress) -> bool {
        self.members.contains(port)
    }

    pub fn attributes(&self) -> Attributes<'_> {
        Attributes::new(&self.session, self.path(), &PORT_GROUP_SCHEMA)
    }

    /// Timestamp of the last synchronized operation.
    pub async fn last_time_stamp(&self) -> TopologyResult<i64> {
        self.attributes().get("last_time_stamp").await
    }

    pub async fn add_port(&mut self, port: &PortHandle) -> TopologyResult<()> {
        let address = port.address();
        self.session
            .invoke(&self.path(), "add", &[address.tcl_ref()])
            .await?;
        self.members.insert(address);
        debug!(group = self.id, port = %address, "Added port to group");
        Ok(())
    }

    pub async fn remove_port(&mut self, port: &PortHandle) -> TopologyResult<()> {
        let address = port.address();
        self.session
            .invoke(&self.path(), "del", &[address.tcl_ref()])
            .await?;
        self.members.remove(&address);
        debug!(group = self.id, port = %address, "Removed port from group");
        Ok(())
    }

    /// Issues a group-wide command.
    #[instrument(skip(self), fields(group = self.id))]
    pub async fn set_command(&self, command: GroupCommand) -> TopologyResult<()> {
        self.session
            .invoke(&self.path(), "setCommand", &[command.code().to_string()])
            .await?;
        Ok(())
    }

    pub async fn start_transmit(&self) -> TopologyResult<()> {
        self.set_command(GroupCommand::StartTransmit).await
    }

    pub async fn stop_transmit(&self) -> TopologyResult<()> {
        self.set_command(GroupCommand::StopTransmit).await
    }

    pub async fn start_capture(&self) -> TopologyResult<()> {
        self.set_command(GroupCommand::StartCapture).await
    }

    pub async fn stop_capture(&self) -> TopologyResult<()> {
        self.set_command(GroupCommand::StopCapture).await
    }

    pub async fn reset_statistics(&self) -> TopologyResult<()> {
        self.set_command(GroupCommand::ResetStatistics).await
    }

    pub async fn pause_transmit(&self) -> TopologyResult<()> {
        self.set_command(GroupCommand::PauseTransmit).await
    }

    pub async fn step_transmit(&self) -> TopologyResult<()> {
        self.set_command(GroupCommand::StepTransmit).await
    }

    pub async fn transmit_ping(&self) -> TopologyResult<()> {
        self.set_command(GroupCommand::TransmitPing).await
    }

    pub async fn take_ownership(&self, force: bool) -> TopologyResult<()> {
        if force {
            self.set_command(GroupCommand::TakeOwnershipForced).await
        } else {
            self.set_command(GroupCommand::TakeOwnership).await
        }
    }

    pub async fn clear_ownership(&self, force: bool) -> TopologyResult<()> {
        if force {
            self.set_command(GroupCommand::ClearOwnershipForced).await
        } else {
            self.set_command(GroupCommand::ClearOwnership).await
        }
    }

    /// Destroys the group on the device and frees its id.
    pub async fn destroy(self) -> TopologyResult<()> {
        self.session.invoke(&self.path(), "destroy", &[]).await?;
        self.session.port_group_ids().release(self.id);
        info!(id = self.id, "Destroyed port group");
        Ok(())
    }
}
