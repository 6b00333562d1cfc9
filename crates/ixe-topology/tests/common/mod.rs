//! Shared setup for the topology integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use ixe_sim::{SimulatedDevice, Topology};
use ixe_topology::{Chassis, SessionParams};

/// Connects to a simulated device and returns both ends.
pub async fn connect(topology: Topology, params: SessionParams) -> (Arc<SimulatedDevice>, Chassis) {
    connect_device(SimulatedDevice::new(topology), params).await
}

pub async fn connect_device(
    device: SimulatedDevice,
    params: SessionParams,
) -> (Arc<SimulatedDevice>, Chassis) {
    let device = Arc::new(device);
    let host = "lab-chassis";
    let chassis = Chassis::connect(device.clone(), host, params)
        .await
        .expect("connect to simulated chassis");
    (device, chassis)
}

/// Connects and discovers with the session's options.
pub async fn discovered(topology: Topology, params: SessionParams) -> (Arc<SimulatedDevice>, Chassis) {
    let (device, mut chassis) = connect(topology, params).await;
    chassis.discover().await.expect("discover simulated chassis");
    (device, chassis)
}

pub fn alice() -> SessionParams {
    SessionParams::default().with_owner("alice")
}
