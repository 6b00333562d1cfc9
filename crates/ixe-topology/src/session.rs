//! Connection context shared by a chassis and every handle derived from it.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ixe_api::{DeviceApi, ObjectPath, Serialized};
use tracing::debug;

use crate::discovery::DiscoveryOptions;
use crate::error::{TopologyError, TopologyResult};
use crate::port_group::PortGroupIds;

/// Parameters of a chassis session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    /// Numeric chassis id assigned after the chassis is added.
    pub chassis_id: u16,
    /// Login name recorded by the device as the owner of reserved ports.
    pub owner: Option<String>,
    /// Scheduling of discovery probes.
    pub discovery: DiscoveryOptions,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            chassis_id: 1,
            owner: None,
            discovery: DiscoveryOptions::default(),
        }
    }
}

impl SessionParams {
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_chassis_id(mut self, chassis_id: u16) -> Self {
        self.chassis_id = chassis_id;
        self
    }

    pub fn with_discovery(mut self, discovery: DiscoveryOptions) -> Self {
        self.discovery = discovery;
        self
    }
}

/// State shared by a [`Chassis`](crate::Chassis) and its descendants.
///
/// Handles hold an `Arc<Session>`; flipping `connected` to false on
/// disconnect invalidates all of them at once.
pub(crate) struct Session {
    api: Arc<dyn DeviceApi>,
    host: String,
    params: SessionParams,
    connected: AtomicBool,
    port_group_ids: PortGroupIds,
}

impl Session {
    /// Creates a disconnected session.
    ///
    /// Transports that cannot take overlapping calls are wrapped in
    /// [`Serialized`] so discovery may schedule probes concurrently.
    pub(crate) fn new(api: Arc<dyn DeviceApi>, host: &str, params: SessionParams) -> Arc<Self> {
        let api: Arc<dyn DeviceApi> = if api.supports_concurrent_calls() {
            api
        } else {
            debug!(host = %host, "Transport is not reentrant, serializing device calls");
            Arc::new(Serialized::new(api))
        };
        Arc::new(Self {
            api,
            host: host.to_string(),
            params,
            connected: AtomicBool::new(false),
            port_group_ids: PortGroupIds::new(),
        })
    }

    pub(crate) fn api(&self) -> &dyn DeviceApi {
        self.api.as_ref()
    }

    pub(crate) fn host(&self) -> &str {
        &self.host
    }

    pub(crate) fn chassis_id(&self) -> u16 {
        self.params.chassis_id
    }

    pub(crate) fn params(&self) -> &SessionParams {
        &self.params
    }

    pub(crate) fn port_group_ids(&self) -> &PortGroupIds {
        &self.port_group_ids
    }

    /// Returns true if `owner` is this session's login name.
    pub(crate) fn is_own_token(&self, owner: &str) -> bool {
        self.params
            .owner
            .as_deref()
            .is_some_and(|login| login.trim() == owner.trim())
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn mark_connected(&self) {
        self.connected.store(true, Ordering::Release);
    }

    /// Marks the session disconnected; returns true if it was connected.
    pub(crate) fn mark_disconnected(&self) -> bool {
        self.connected.swap(false, Ordering::AcqRel)
    }

    /// Fails with `InvalidHandle` unless the session is connected.
    pub(crate) fn ensure_connected(&self, object: &ObjectPath) -> TopologyResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TopologyError::invalid_handle(
                object,
                format!("chassis '{}' is not connected", self.host),
            ))
        }
    }

    /// Runs a command on behalf of a handle.
    pub(crate) async fn invoke(
        &self,
        path: &ObjectPath,
        command: &str,
        args: &[String],
    ) -> TopologyResult<String> {
        self.ensure_connected(path)?;
        debug!(object = %path, command = %command, "Invoking device command");
        Ok(self.api.invoke(path, command, args).await?)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("chassis_id", &self.params.chassis_id)
            .field("owner", &self.params.owner)
            .field("connected", &self.is_connected())
            .finish()
    }
}
