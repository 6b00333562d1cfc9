//! Connect, disconnect and port group lifecycle.

mod common;

use std::sync::Arc;

use ixe_api::ObjectPath;
use ixe_sim::{topologies, Fault, SimulatedDevice};
use ixe_topology::{
    Chassis, ClientConfig, ConnectionState, GroupCommand, SessionParams, TopologyError,
};
use ixe_types::{ChassisType, PortAddress};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_connect_sequence() {
    let (device, chassis) = common::connect(topologies::sparse_three_slot(), common::alice()).await;

    assert_eq!(chassis.state(), ConnectionState::Connected);
    assert_eq!(chassis.host(), "lab-chassis");
    assert_eq!(chassis.chassis_id(), 1);
    assert_eq!(chassis.max_card_count(), 3);
    assert!(!chassis.is_discovered());

    let session = ObjectPath::session();
    let host = ObjectPath::chassis("lab-chassis");
    let calls = device.calls();
    calls
        .assert_order(&[(&session, "login"), (&host, "add")])
        .unwrap();
    assert_eq!(calls.lines()[2], "chassis config lab-chassis -id 1");
    assert_eq!(device.login().as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_connect_transport_failure() {
    let device = SimulatedDevice::new(topologies::sparse_three_slot());
    device.inject_fault(
        ObjectPath::chassis("lab-chassis"),
        Fault::Transport("no route to host".to_string()),
    );
    let err = Chassis::connect(Arc::new(device), "lab-chassis", SessionParams::default())
        .await
        .unwrap_err();
    assert!(err.is_transport_failure());
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn test_chassis_live_attributes() {
    let (_device, chassis) =
        common::connect(topologies::sparse_three_slot(), SessionParams::default()).await;

    assert_eq!(chassis.chassis_type().await.unwrap(), ChassisType::Ixia400T);
    assert_eq!(chassis.type_name().await.unwrap(), "ixia400T");
    assert_eq!(chassis.host_name().await.unwrap(), "lab-chassis");
    assert_eq!(chassis.ix_server_version().await.unwrap(), "5.30.450.31");
    chassis.set_name("bench-a").await.unwrap();
    assert_eq!(chassis.name().await.unwrap(), "bench-a");

    let err = chassis.attributes().set("max_card_count", 4).await.unwrap_err();
    assert!(matches!(err, TopologyError::ReadOnlyAttribute { .. }));
}

#[tokio::test]
async fn test_disconnect_invalidates_every_handle() {
    let (device, mut chassis) =
        common::discovered(topologies::sparse_three_slot(), common::alice()).await;
    let ports = chassis.resolve_ports().unwrap();
    let port = ports["1/1/1"].clone();
    let card = chassis.card(1).unwrap().clone();
    let group = chassis.create_port_group(None).await.unwrap();

    chassis.disconnect().await.unwrap();
    assert_eq!(chassis.state(), ConnectionState::Disconnected);
    assert!(device.chassis_host().is_none());
    device.clear_calls();

    assert!(!port.is_valid());
    assert!(port.owner().await.unwrap_err().is_invalid_handle());
    assert!(port.reserve(false).await.unwrap_err().is_invalid_handle());
    assert!(port.release().await.unwrap_err().is_invalid_handle());
    assert!(port.statistics().bytes_sent().await.unwrap_err().is_invalid_handle());
    assert!(port.load_configuration("a.prt").await.unwrap_err().is_invalid_handle());
    assert!(card.type_name().await.unwrap_err().is_invalid_handle());
    assert!(card.port(1).unwrap_err().is_invalid_handle());
    assert!(group.start_transmit().await.unwrap_err().is_invalid_handle());
    assert!(chassis.card(1).unwrap_err().is_invalid_handle());
    assert!(chassis.resolve_ports().unwrap_err().is_invalid_handle());
    assert!(chassis.discover().await.unwrap_err().is_invalid_handle());
    assert!(chassis.name().await.unwrap_err().is_invalid_handle());
    assert!(chassis.create_port_group(None).await.unwrap_err().is_invalid_handle());

    assert!(device.calls().is_empty());
}

#[tokio::test]
async fn test_disconnect_twice_is_a_no_op() {
    let (device, mut chassis) =
        common::discovered(topologies::sparse_three_slot(), SessionParams::default()).await;

    chassis.disconnect().await.unwrap();
    chassis.disconnect().await.unwrap();
    assert_eq!(device.calls().count_invoked("del"), 1);
}

#[tokio::test]
async fn test_disconnect_failure_still_invalidates() {
    let (device, mut chassis) =
        common::discovered(topologies::sparse_three_slot(), SessionParams::default()).await;
    let port = chassis.resolve_ports().unwrap()["1/3/1"].clone();
    device.inject_fault(ObjectPath::chassis("lab-chassis"), Fault::Timeout);

    let err = chassis.disconnect().await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(chassis.state(), ConnectionState::Disconnected);
    assert!(port.link_state().await.unwrap_err().is_invalid_handle());
}

#[tokio::test]
async fn test_port_group_ids() {
    let (device, chassis) =
        common::discovered(topologies::sparse_three_slot(), SessionParams::default()).await;

    let first = chassis.create_port_group(None).await.unwrap();
    let explicit = chassis.create_port_group(Some(3)).await.unwrap();
    let second = chassis.create_port_group(None).await.unwrap();
    assert_eq!((first.id(), explicit.id(), second.id()), (1, 3, 2));

    match chassis.create_port_group(Some(3)).await {
        Err(TopologyError::PortGroupIdInUse { id }) => assert_eq!(id, 3),
        other => panic!("Expected PortGroupIdInUse, got {:?}", other),
    }

    first.destroy().await.unwrap();
    let reused = chassis.create_port_group(None).await.unwrap();
    assert_eq!(reused.id(), 1);
    assert!(device.port_group_members(1).is_some());
}

#[tokio::test]
async fn test_failed_group_create_frees_id() {
    let (device, chassis) =
        common::discovered(topologies::sparse_three_slot(), SessionParams::default()).await;
    device.inject_fault(
        ObjectPath::port_group(1),
        Fault::CommandFailed("out of groups".to_string()),
    );

    assert!(chassis.create_port_group(None).await.unwrap_err().is_command_failed());
    device.clear_fault(&ObjectPath::port_group(1));
    assert_eq!(chassis.create_port_group(None).await.unwrap().id(), 1);
}

#[tokio::test]
async fn test_port_group_membership_and_commands() {
    let (device, chassis) =
        common::discovered(topologies::sparse_three_slot(), SessionParams::default()).await;
    let ports = chassis.resolve_ports().unwrap();
    let mut group = chassis.create_port_group(None).await.unwrap();

    group.add_port(&ports["1/1/2"]).await.unwrap();
    group.add_port(&ports["1/3/1"]).await.unwrap();
    group.add_port(&ports["1/1/1"]).await.unwrap();
    group.remove_port(&ports["1/1/2"]).await.unwrap();

    let members: Vec<PortAddress> = group.members().copied().collect();
    assert_eq!(members, vec![PortAddress::new(1, 1, 1), PortAddress::new(1, 3, 1)]);
    assert!(group.contains(&PortAddress::new(1, 3, 1)));
    assert_eq!(device.port_group_members(1), Some(members));

    device.clear_calls();
    group.start_transmit().await.unwrap();
    group.stop_capture().await.unwrap();
    group.set_command(GroupCommand::ResetStatistics).await.unwrap();
    assert_eq!(
        device.calls().lines(),
        vec![
            "portGroup setCommand 1 7",
            "portGroup setCommand 1 10",
            "portGroup setCommand 1 13",
        ]
    );
    assert_eq!(group.last_time_stamp().await.unwrap(), 3);

    // Membership does not touch port ownership.
    assert_eq!(ports["1/1/1"].owner().await.unwrap(), "");
}

#[tokio::test]
async fn test_connect_from_config() {
    let config = ClientConfig::from_toml_str(
        r#"
[session]
chassis_id = 2
owner = "carol"

[discovery]
max_concurrent_probes = 4
"#,
    )
    .unwrap();
    let (device, mut chassis) =
        common::connect(topologies::sparse_three_slot(), config.session_params()).await;
    chassis.discover().await.unwrap();

    assert_eq!(chassis.chassis_id(), 2);
    let names: Vec<String> = chassis.resolve_ports().unwrap().into_keys().collect();
    assert_eq!(names, vec!["2/1/1", "2/1/2", "2/3/1"]);

    chassis.card(3).unwrap().port(1).unwrap().reserve(false).await.unwrap();
    assert_eq!(device.owner_of(PortAddress::new(2, 3, 1)), "carol");
}
