//! Discovery scenarios against the simulated chassis.

mod common;

use std::time::Duration;

use ixe_api::ObjectPath;
use ixe_sim::{topologies, Fault, SimCard, SimulatedDevice, Topology};
use ixe_topology::{Card, DiscoveryOptions, SessionParams, Slot, TopologyError};
use ixe_types::{CardAddress, PortAddress};
use pretty_assertions::assert_eq;

fn card_path(slot: u16) -> ObjectPath {
    ObjectPath::card(CardAddress::new(1, slot))
}

fn port_counts<T>(slots: &[Slot<Card>], f: impl Fn(&Card) -> T) -> Vec<Option<T>> {
    slots.iter().map(|slot| slot.as_populated().map(&f)).collect()
}

#[tokio::test]
async fn test_sparse_chassis_keeps_slot_positions() {
    let (_device, chassis) =
        common::discovered(topologies::sparse_three_slot(), SessionParams::default()).await;

    let slots = chassis.slots();
    assert_eq!(slots.len(), 3);
    assert_eq!(
        port_counts(slots, |card| card.ports().len()),
        vec![Some(2), None, Some(1)]
    );
    assert!(matches!(slots[1], Slot::Absent { index: 2 }));

    let ports = chassis.resolve_ports().unwrap();
    assert_eq!(
        ports.keys().cloned().collect::<Vec<_>>(),
        vec!["1/1/1", "1/1/2", "1/3/1"]
    );
    assert_eq!(ports["1/3/1"].address(), PortAddress::new(1, 3, 1));
}

#[tokio::test]
async fn test_card_info_snapshot() {
    let (_device, chassis) =
        common::discovered(topologies::sparse_three_slot(), SessionParams::default()).await;

    let card = chassis.card(3).unwrap();
    assert_eq!(card.address(), CardAddress::new(1, 3));
    assert_eq!(card.info().type_name, "10GE LAN XM");
    assert_eq!(card.info().hw_version, 1);
    assert_eq!(card.info().serial_number, "SN-0003");
    assert_eq!(card.info().port_count, 1);
}

#[tokio::test]
async fn test_absent_and_out_of_range_slots_are_invalid_handles() {
    let (_device, chassis) =
        common::discovered(topologies::sparse_three_slot(), SessionParams::default()).await;

    assert!(chassis.card(2).unwrap_err().is_invalid_handle());
    assert!(chassis.card(0).unwrap_err().is_invalid_handle());
    assert!(chassis.card(4).unwrap_err().is_invalid_handle());
    assert!(chassis.card(1).unwrap().port(3).unwrap_err().is_invalid_handle());
    assert_eq!(chassis.card(1).unwrap().port(2).unwrap().name(), "1/1/2");
}

#[tokio::test]
async fn test_names_are_stable_across_runs() {
    let (_device, mut chassis) =
        common::discovered(topologies::sparse_three_slot(), SessionParams::default()).await;

    let first: Vec<String> = chassis.resolve_ports().unwrap().into_keys().collect();
    chassis.discover().await.unwrap();
    let second: Vec<String> = chassis.resolve_ports().unwrap().into_keys().collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_zero_slot_chassis() {
    let (device, chassis) = common::discovered(Topology::new(0), SessionParams::default()).await;

    assert!(chassis.is_discovered());
    assert!(chassis.slots().is_empty());
    assert!(chassis.resolve_ports().unwrap().is_empty());
    assert_eq!(device.calls().count_invoked("get"), 0);
}

#[tokio::test]
async fn test_missing_port_is_absent_marker() {
    let topology = Topology::new(1).with_card(SimCard::new(1, 3).with_missing_port(2));
    let (_device, chassis) = common::discovered(topology, SessionParams::default()).await;

    let card = chassis.card(1).unwrap();
    let ports = card.ports();
    assert_eq!(ports.len(), 3);
    assert!(ports[0].is_populated());
    assert!(matches!(ports[1], Slot::Absent { index: 2 }));
    assert!(ports[2].is_populated());
    assert_eq!(card.populated_ports().count(), 2);
    assert_eq!(chassis.resolve_ports().unwrap().len(), 2);
}

#[tokio::test]
async fn test_transport_failure_aborts_sequential_discovery() {
    let (device, mut chassis) =
        common::connect(topologies::sparse_three_slot(), SessionParams::default()).await;
    device.inject_fault(card_path(2), Fault::Transport("connection reset".to_string()));

    let err = chassis.discover().await.unwrap_err();
    assert!(err.is_transport_failure());

    let incomplete = err.as_incomplete_discovery().unwrap();
    assert_eq!(incomplete.host, "lab-chassis");
    assert_eq!(incomplete.failed_object, "card 1 2");
    assert_eq!(incomplete.discovered.len(), 1);
    assert_eq!(
        port_counts(&incomplete.discovered, |card| card.ports().len()),
        vec![Some(2)]
    );

    let calls = device.calls();
    assert!(calls.invoked(&card_path(1), "get"));
    calls.assert_untouched(&card_path(3)).unwrap();

    assert!(!chassis.is_discovered());
    assert!(chassis.slots().is_empty());
    assert!(chassis.card(1).unwrap_err().is_invalid_handle());
}

#[tokio::test]
async fn test_resolve_ports_is_invalid_until_discovery_completes() {
    let (device, mut chassis) =
        common::connect(topologies::sparse_three_slot(), SessionParams::default()).await;
    assert!(chassis.resolve_ports().unwrap_err().is_invalid_handle());

    device.inject_fault(card_path(2), Fault::Transport("connection reset".to_string()));
    assert!(chassis.discover().await.is_err());
    assert!(chassis.resolve_ports().unwrap_err().is_invalid_handle());

    device.clear_fault(&card_path(2));
    chassis.discover().await.unwrap();
    assert_eq!(
        chassis.resolve_ports().unwrap().keys().cloned().collect::<Vec<_>>(),
        vec!["1/1/1", "1/1/2", "1/3/1"]
    );
}

#[tokio::test]
async fn test_port_timeout_is_reported_with_object() {
    let (device, mut chassis) =
        common::connect(topologies::sparse_three_slot(), SessionParams::default()).await;
    device.inject_fault(ObjectPath::port(PortAddress::new(1, 1, 2)), Fault::Timeout);

    let err = chassis.discover().await.unwrap_err();
    assert!(err.is_timeout());
    match &err {
        TopologyError::IncompleteDiscovery(inner) => {
            assert_eq!(inner.failed_object, "port 1 1 2");
            assert!(inner.discovered.is_empty());
        }
        other => panic!("Expected IncompleteDiscovery, got {:?}", other),
    }
    device.calls().assert_untouched(&card_path(2)).unwrap();
}

#[tokio::test]
async fn test_concurrent_discovery_preserves_order_and_bound() {
    let topology = Topology::new(8)
        .with_card(SimCard::new(1, 2))
        .with_card(SimCard::new(2, 4).with_missing_port(3))
        .with_card(SimCard::new(5, 1))
        .with_card(SimCard::new(8, 2));
    let device = SimulatedDevice::new(topology)
        .concurrent(true)
        .with_latency(Duration::from_millis(5));
    let params = SessionParams::default().with_discovery(DiscoveryOptions::concurrent(4));
    let (device, mut chassis) = common::connect_device(device, params).await;

    chassis.discover().await.unwrap();

    assert_eq!(
        port_counts(chassis.slots(), |card| card.populated_ports().count()),
        vec![Some(2), Some(3), None, None, Some(1), None, None, Some(2)]
    );
    for (i, slot) in chassis.slots().iter().enumerate() {
        if let Slot::Absent { index } = slot {
            assert_eq!(usize::from(*index), i + 1);
        }
    }
    assert!(device.high_water_mark() >= 2);
    assert!(device.high_water_mark() <= 4);
}

#[tokio::test]
async fn test_concurrent_schedule_on_serial_transport() {
    let device = SimulatedDevice::new(topologies::full(4, 2)).with_latency(Duration::from_millis(2));
    let params = SessionParams::default().with_discovery(DiscoveryOptions::concurrent(8));
    let (device, mut chassis) = common::connect_device(device, params).await;

    chassis.discover().await.unwrap();

    assert_eq!(chassis.resolve_ports().unwrap().len(), 8);
    assert_eq!(device.high_water_mark(), 1);
}

#[tokio::test]
async fn test_concurrent_failure_reports_ordered_prefix() {
    let device = SimulatedDevice::new(topologies::full(6, 1))
        .concurrent(true)
        .with_latency(Duration::from_millis(20));
    device.inject_fault(card_path(3), Fault::Transport("link down".to_string()));
    let params = SessionParams::default().with_discovery(DiscoveryOptions::concurrent(3));
    let (device, mut chassis) = common::connect_device(device, params).await;

    let err = chassis.discover().await.unwrap_err();
    // Probes queued behind the failed slot are cancelled, not left running.
    assert_eq!(device.in_flight(), 0);
    assert!(device.high_water_mark() > 1);
    let incomplete = err.as_incomplete_discovery().unwrap();
    assert_eq!(incomplete.failed_object, "card 1 3");
    let indices: Vec<u16> = incomplete
        .discovered
        .iter()
        .filter_map(Slot::as_populated)
        .map(|card| card.address().card)
        .collect();
    assert_eq!(indices, vec![1, 2]);
    assert!(!chassis.is_discovered());
}

#[tokio::test]
async fn test_discover_with_overrides_session_options() {
    let device = SimulatedDevice::new(topologies::full(3, 1)).concurrent(true);
    let (device, mut chassis) = common::connect_device(device, SessionParams::default()).await;

    chassis
        .discover_with(DiscoveryOptions::sequential())
        .await
        .unwrap();
    assert_eq!(chassis.cards().count(), 3);
    assert_eq!(device.high_water_mark(), 1);
}
