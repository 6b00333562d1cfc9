//! Per-port statistics counters.

use ixe_api::ObjectPath;

use crate::error::TopologyResult;
use crate::port::PortHandle;
use crate::schema::{Attributes, STATISTICS_SCHEMA};

/// Read-only view of a port's counters.
///
/// The view borrows its port, so it cannot outlive the handle it was
/// obtained from, and it shares the port's identity.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsView<'a> {
    port: &'a PortHandle,
}

impl<'a> StatisticsView<'a> {
    pub(crate) fn new(port: &'a PortHandle) -> Self {
        Self { port }
    }

    pub fn port(&self) -> &'a PortHandle {
        self.port
    }

    pub fn path(&self) -> ObjectPath {
        ObjectPath::statistics(self.port.address())
    }

    pub fn attributes(&self) -> Attributes<'a> {
        Attributes::new(self.port.session(), self.path(), &STATISTICS_SCHEMA)
    }

    pub async fn bytes_sent(&self) -> TopologyResult<u64> {
        self.attributes().get("bytes_sent").await
    }

    pub async fn bytes_received(&self) -> TopologyResult<u64> {
        self.attributes().get("bytes_received").await
    }
}
