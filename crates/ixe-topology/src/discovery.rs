//! Exhaustive probe of a chassis' slots and ports.
//!
//! The device has no "list populated slots" query. The only way to learn
//! the inventory is to ask for each index in turn and treat `NotFound` as
//! an empty position. Probes are issued in ascending index order through an
//! ordered, bounded stream: results are consumed strictly by index, so the
//! output ordering and the placement of absent markers do not depend on how
//! many probes are in flight.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use ixe_api::ObjectPath;
use ixe_types::{CardAddress, PortAddress};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::card::{Card, CardInfo};
use crate::error::{IncompleteDiscovery, TopologyError, TopologyResult};
use crate::port::PortHandle;
use crate::schema::{Attributes, CARD_SCHEMA};
use crate::session::Session;

/// Scheduling of discovery probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    /// Upper bound on device requests in flight; 1 probes strictly in order.
    pub max_concurrent_probes: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self::sequential()
    }
}

impl DiscoveryOptions {
    /// One request at a time, in index order.
    pub const fn sequential() -> Self {
        Self {
            max_concurrent_probes: 1,
        }
    }

    /// Up to `limit` requests in flight (at least one).
    pub const fn concurrent(limit: usize) -> Self {
        Self {
            max_concurrent_probes: if limit == 0 { 1 } else { limit },
        }
    }
}

/// One position of an ordered inventory.
///
/// Empty positions are kept as explicit markers so that position
/// `i` always holds index `i + 1`.
#[derive(Debug, Clone)]
pub enum Slot<T> {
    /// Something is installed at this index.
    Populated(T),
    /// Nothing answered at this index.
    Absent {
        /// The 1-based index that was probed.
        index: u16,
    },
}

impl<T> Slot<T> {
    pub fn is_populated(&self) -> bool {
        matches!(self, Slot::Populated(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Slot::Absent { .. })
    }

    /// Returns the populated value, if any.
    pub fn as_populated(&self) -> Option<&T> {
        match self {
            Slot::Populated(value) => Some(value),
            Slot::Absent { .. } => None,
        }
    }

    pub fn as_populated_mut(&mut self) -> Option<&mut T> {
        match self {
            Slot::Populated(value) => Some(value),
            Slot::Absent { .. } => None,
        }
    }

    pub fn into_populated(self) -> Option<T> {
        match self {
            Slot::Populated(value) => Some(value),
            Slot::Absent { .. } => None,
        }
    }
}

/// A probe that failed with something other than `NotFound`.
struct ProbeFailure {
    object: ObjectPath,
    error: TopologyError,
}

impl ProbeFailure {
    fn new(object: ObjectPath, error: TopologyError) -> Self {
        Self { object, error }
    }
}

/// Runs one discovery pass over a connected session.
pub(crate) struct Prober {
    session: Arc<Session>,
    limit: usize,
    permits: Semaphore,
}

impl Prober {
    pub(crate) fn new(session: Arc<Session>, options: DiscoveryOptions) -> Self {
        let limit = options.max_concurrent_probes.max(1);
        Self {
            session,
            limit,
            permits: Semaphore::new(limit),
        }
    }

    /// Walks slots `1..=max_card_count`.
    ///
    /// On a fatal error the stream is dropped, which cancels any probes
    /// still in flight, and the slots completed before the failing index
    /// are returned inside [`IncompleteDiscovery`].
    pub(crate) async fn discover_chassis(&self, max_card_count: u16) -> TopologyResult<Vec<Slot<Card>>> {
        let chassis_id = self.session.chassis_id();
        info!(
            host = %self.session.host(),
            max_card_count,
            max_concurrent_probes = self.limit,
            "Discover chassis"
        );

        let mut probes = stream::iter(1..=max_card_count)
            .map(|index| self.discover_card(CardAddress::new(chassis_id, index)))
            .buffered(self.limit);

        let mut slots = Vec::with_capacity(usize::from(max_card_count));
        while let Some(result) = probes.next().await {
            match result {
                Ok(slot) => slots.push(slot),
                Err(failure) => {
                    drop(probes);
                    warn!(
                        host = %self.session.host(),
                        object = %failure.object,
                        error = %failure.error,
                        discovered = slots.len(),
                        "Discovery aborted"
                    );
                    return Err(TopologyError::IncompleteDiscovery(Box::new(
                        IncompleteDiscovery {
                            host: self.session.host().to_string(),
                            failed_object: failure.object.to_string(),
                            discovered: slots,
                            source: failure.error,
                        },
                    )));
                }
            }
        }

        Ok(slots)
    }

    /// Probes one slot and, if populated, its ports.
    pub(crate) async fn discover_slot(&self, address: CardAddress) -> TopologyResult<Slot<Card>> {
        self.discover_card(address).await.map_err(|failure| {
            warn!(object = %failure.object, error = %failure.error, "Card probe failed");
            failure.error
        })
    }

    async fn discover_card(&self, address: CardAddress) -> Result<Slot<Card>, ProbeFailure> {
        let path = ObjectPath::card(address);
        if !self.probe(&path).await? {
            debug!(card = %address, "Slot is empty");
            return Ok(Slot::Absent {
                index: address.card,
            });
        }

        let info = self
            .read_card_info(&path)
            .await
            .map_err(|error| ProbeFailure::new(path.clone(), error))?;
        info!(card = %address, type_name = %info.type_name, "Adding card");

        let ports = self.discover_ports(address, info.port_count).await?;
        Ok(Slot::Populated(Card::new(
            Arc::clone(&self.session),
            address,
            info,
            ports,
        )))
    }

    async fn discover_ports(
        &self,
        card: CardAddress,
        port_count: u16,
    ) -> Result<Vec<Slot<PortHandle>>, ProbeFailure> {
        let mut probes = stream::iter(1..=port_count)
            .map(|index| self.discover_port(card.port(index)))
            .buffered(self.limit);

        let mut ports = Vec::with_capacity(usize::from(port_count));
        while let Some(result) = probes.next().await {
            ports.push(result?);
        }
        Ok(ports)
    }

    async fn discover_port(&self, address: PortAddress) -> Result<Slot<PortHandle>, ProbeFailure> {
        if self.probe(&ObjectPath::port(address)).await? {
            info!(port = %address, "Adding port");
            Ok(Slot::Populated(PortHandle::new(
                Arc::clone(&self.session),
                address,
            )))
        } else {
            debug!(port = %address, "Port is absent");
            Ok(Slot::Absent {
                index: address.port,
            })
        }
    }

    /// Asks the device for a handle to `path`.
    ///
    /// `Ok(false)` means the device reported `NotFound`; any other error is fatal.
    async fn probe(&self, path: &ObjectPath) -> Result<bool, ProbeFailure> {
        let result = self
            .limited(async {
                self.session.ensure_connected(path)?;
                let reply = self.session.api().invoke(path, "get", &[]).await?;
                Ok::<_, TopologyError>(reply)
            })
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(TopologyError::Device(e)) if e.is_not_found() => Ok(false),
            Err(error) => Err(ProbeFailure::new(path.clone(), error)),
        }
    }

    async fn read_card_info(&self, path: &ObjectPath) -> TopologyResult<CardInfo> {
        let attrs = Attributes::new(&self.session, path.clone(), &CARD_SCHEMA);
        Ok(CardInfo {
            type_name: self.limited(attrs.get::<String>("type_name")).await?,
            hw_version: self.limited(attrs.get::<i64>("hw_version")).await?,
            serial_number: self.limited(attrs.get::<String>("serial_number")).await?,
            port_count: self.limited(attrs.get::<u16>("port_count")).await?,
        })
    }

    /// Runs one device request under the in-flight bound.
    async fn limited<T>(&self, request: impl Future<Output = TopologyResult<T>>) -> TopologyResult<T> {
        let _permit = self.permits.acquire().await.map_err(|_| {
            TopologyError::invalid_handle(self.session.host(), "discovery was cancelled")
        })?;
        request.await
    }
}
