//! Simulated chassis for exercising the topology client
//!
//! Provides:
//! - [`SimulatedDevice`]: an in-memory `DeviceApi` with ownership semantics
//! - Fault injection, per-call latency and an in-flight high-water mark
//! - Lab topology fixtures, loadable from TOML
//! - Call log verification helpers

mod device;
pub mod fixtures;
mod verification;

pub use device::{Fault, SimulatedDevice};
pub use fixtures::{topologies, FixtureError, SimCard, SimPort, Topology, VIRTUAL_CARD_TYPE};
pub use verification::*;
