//! Topology discovery client for chassis/card/port test equipment.
//!
//! A chassis is connected through a [`DeviceApi`](ixe_api::DeviceApi)
//! implementation, then discovered by probing every slot and port index.
//! The result is an ordered tree of [`Slot`]s in which empty positions are
//! explicit markers, so position always maps to index.
//!
//! - [`Chassis`]: connect, discover, disconnect and `resolve_ports`
//! - [`Card`] / [`PortHandle`]: identity-stable handles with live accessors
//! - [`PortHandle::reserve`] / [`PortHandle::release`]: remote port ownership
//! - [`PortGroup`]: synchronized commands over a set of ports
//! - [`Attributes`]: schema-checked typed access to device members
//! - [`ClientConfig`]: TOML client configuration
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ixe_topology::{Chassis, SessionParams, TopologyResult};
//!
//! async fn reserve_all(api: Arc<dyn ixe_api::DeviceApi>) -> TopologyResult<()> {
//!     let params = SessionParams::default().with_owner("alice");
//!     let mut chassis = Chassis::connect(api, "10.0.0.5", params).await?;
//!     chassis.discover().await?;
//!     for (name, port) in chassis.resolve_ports()? {
//!         port.reserve(false).await?;
//!         println!("reserved {}", name);
//!     }
//!     chassis.disconnect().await
//! }
//! ```
//!
//! # Handle validity
//!
//! Every handle shares the chassis session. After
//! [`Chassis::disconnect`] all of them fail with
//! [`TopologyError::InvalidHandle`] instead of returning stale values.

mod card;
mod chassis;
pub mod config;
mod discovery;
pub mod error;
mod port;
mod port_group;
pub mod schema;
mod session;
mod statistics;

pub use card::{Card, CardInfo};
pub use chassis::{Chassis, ConnectionState};
pub use config::ClientConfig;
pub use discovery::{DiscoveryOptions, Slot};
pub use error::{IncompleteDiscovery, TopologyError, TopologyResult};
pub use port::{Ownership, PortHandle};
pub use port_group::{GroupCommand, PortGroup, PortGroupIds};
pub use schema::{AttributeSpec, Attributes, Schema, ValueKind};
pub use session::SessionParams;
pub use statistics::StatisticsView;
