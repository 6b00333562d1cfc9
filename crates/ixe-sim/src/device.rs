//! In-memory implementation of the device control API.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use ixe_api::{DeviceApi, DeviceError, DeviceResult, ObjectKind, ObjectPath, Request};
use ixe_types::{CardAddress, ChassisType, PortAddress};
use parking_lot::Mutex;
use tracing::debug;

use crate::fixtures::{SimCard, SimPort, Topology, VIRTUAL_CARD_TYPE};
use crate::verification::CallLog;

/// Failure injected on an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    NotFound,
    CommandFailed(String),
    Transport(String),
    Timeout,
}

impl Fault {
    fn to_error(&self, request: &Request) -> DeviceError {
        match self {
            Fault::NotFound => DeviceError::not_found(request, "injected"),
            Fault::CommandFailed(message) => DeviceError::command_failed(request, message.clone()),
            Fault::Transport(message) => DeviceError::transport(request, message.clone()),
            Fault::Timeout => DeviceError::timeout(request, "no reply from chassis"),
        }
    }
}

/// Ownership setCommand codes understood by port groups.
const TAKE_OWNERSHIP: u32 = 40;
const TAKE_OWNERSHIP_FORCED: u32 = 41;
const CLEAR_OWNERSHIP: u32 = 42;
const CLEAR_OWNERSHIP_FORCED: u32 = 43;
const GROUP_COMMANDS: &[u32] = &[7, 8, 9, 10, 13, 15, 16, 17, 40, 41, 42, 43];

#[derive(Debug)]
struct PortGroupState {
    members: BTreeSet<PortAddress>,
    last_time_stamp: i64,
}

#[derive(Debug)]
struct State {
    topology: Topology,
    chassis_id: u16,
    chassis_host: Option<String>,
    login: Option<String>,
    owners: HashMap<PortAddress, String>,
    written: HashMap<(ObjectPath, String), String>,
    port_groups: BTreeMap<u32, PortGroupState>,
    faults: HashMap<ObjectPath, Fault>,
    calls: Vec<Request>,
    clock: i64,
}

/// Simulated chassis.
///
/// Objects exist only where the topology populates them; anything else
/// answers `NotFound`. Every request is appended to a call log before it is
/// handled, so tests can assert on what was (and was not) asked.
#[derive(Debug)]
pub struct SimulatedDevice {
    state: Mutex<State>,
    latency: Option<Duration>,
    concurrent: bool,
    in_flight: AtomicUsize,
    high_water: AtomicUsize,
}

/// Decrements the in-flight counter when a request completes or is dropped.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SimulatedDevice {
    pub fn new(topology: Topology) -> Self {
        let owners = topology
            .cards
            .iter()
            .flat_map(|card| {
                card.ports
                    .iter()
                    .filter(|p| !p.owner.is_empty())
                    .map(move |p| (PortAddress::new(1, card.slot, p.port), p.owner.clone()))
            })
            .collect();

        Self {
            state: Mutex::new(State {
                topology,
                chassis_id: 1,
                chassis_host: None,
                login: None,
                owners,
                written: HashMap::new(),
                port_groups: BTreeMap::new(),
                faults: HashMap::new(),
                calls: Vec::new(),
                clock: 0,
            }),
            latency: None,
            concurrent: false,
            in_flight: AtomicUsize::new(0),
            high_water: AtomicUsize::new(0),
        }
    }

    /// A chassis with `max_card_count` empty slots.
    pub fn empty(max_card_count: u16) -> Self {
        Self::new(Topology::new(max_card_count))
    }

    /// Declares whether the device accepts overlapping calls.
    pub fn concurrent(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Delays every request by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fails every later request on `path` with `fault`.
    pub fn inject_fault(&self, path: ObjectPath, fault: Fault) {
        self.state.lock().faults.insert(path, fault);
    }

    pub fn clear_fault(&self, path: &ObjectPath) {
        self.state.lock().faults.remove(path);
    }

    /// Changes a port's owner as another client would.
    pub fn set_owner(&self, port: PortAddress, owner: &str) {
        let mut state = self.state.lock();
        if owner.is_empty() {
            state.owners.remove(&port);
        } else {
            state.owners.insert(port, owner.to_string());
        }
    }

    /// Current owner of a port, empty if unowned.
    pub fn owner_of(&self, port: PortAddress) -> String {
        self.state
            .lock()
            .owners
            .get(&port)
            .cloned()
            .unwrap_or_default()
    }

    /// Login name of the current session, if any.
    pub fn login(&self) -> Option<String> {
        self.state.lock().login.clone()
    }

    /// Host added with `chassis add`, if any.
    pub fn chassis_host(&self) -> Option<String> {
        self.state.lock().chassis_host.clone()
    }

    /// Members of a live port group.
    pub fn port_group_members(&self, id: u32) -> Option<Vec<PortAddress>> {
        self.state
            .lock()
            .port_groups
            .get(&id)
            .map(|group| group.members.iter().copied().collect())
    }

    /// Snapshot of every request received so far.
    pub fn calls(&self) -> CallLog {
        CallLog::new(self.state.lock().calls.clone())
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Number of requests currently being served.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of requests that were in flight at once.
    pub fn high_water_mark(&self) -> usize {
        self.high_water.load(Ordering::SeqCst)
    }

    async fn execute(&self, request: Request) -> DeviceResult<String> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.high_water.fetch_max(now, Ordering::SeqCst);
        let _in_flight = InFlight {
            counter: &self.in_flight,
        };

        self.state.lock().calls.push(request.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        debug!(request = %request, "Simulated device call");
        if let Some(fault) = state.faults.get(request.path()) {
            return Err(fault.to_error(&request));
        }
        state.handle(&request)
    }
}

#[async_trait]
impl DeviceApi for SimulatedDevice {
    async fn get(&self, path: &ObjectPath, member: &str) -> DeviceResult<String> {
        self.execute(Request::get(path, member)).await
    }

    async fn set(&self, path: &ObjectPath, member: &str, value: &str) -> DeviceResult<()> {
        self.execute(Request::set(path, member, value)).await.map(drop)
    }

    async fn invoke(
        &self,
        path: &ObjectPath,
        command: &str,
        args: &[String],
    ) -> DeviceResult<String> {
        self.execute(Request::invoke(path, command, args)).await
    }

    fn supports_concurrent_calls(&self) -> bool {
        self.concurrent
    }
}

/// Parses a space separated object reference into `N` indices.
fn parse_ref<const N: usize>(reference: &str) -> Option<[u16; N]> {
    let mut out = [0u16; N];
    let mut parts = reference.split_whitespace();
    for slot in out.iter_mut() {
        *slot = parts.next()?.parse().ok()?;
    }
    parts.next().is_none().then_some(out)
}

fn port_address(reference: &str) -> Option<PortAddress> {
    parse_ref::<3>(reference).map(|[c, s, p]| PortAddress::new(c, s, p))
}

impl State {
    fn card(&self, address: CardAddress) -> Option<&SimCard> {
        if address.chassis != self.chassis_id {
            return None;
        }
        self.topology.card(address.card)
    }

    fn card_mut(&mut self, address: CardAddress) -> Option<&mut SimCard> {
        if address.chassis != self.chassis_id {
            return None;
        }
        self.topology.cards.iter_mut().find(|c| c.slot == address.card)
    }

    fn port_exists(&self, address: PortAddress) -> bool {
        self.card(address.card_address())
            .is_some_and(|card| card.has_port(address.port))
    }

    /// Whether the object addressed by `path` exists.
    fn exists(&self, path: &ObjectPath) -> bool {
        let reference = path.reference();
        match path.kind() {
            ObjectKind::Session => true,
            ObjectKind::Chassis => self.chassis_host.as_deref() == Some(reference),
            ObjectKind::Card => parse_ref::<2>(reference)
                .is_some_and(|[c, s]| self.card(CardAddress::new(c, s)).is_some()),
            ObjectKind::Port | ObjectKind::Stream | ObjectKind::Statistics => {
                port_address(reference).is_some_and(|address| self.port_exists(address))
            }
            ObjectKind::PortGroup => reference
                .parse::<u32>()
                .is_ok_and(|id| self.port_groups.contains_key(&id)),
        }
    }

    fn handle(&mut self, request: &Request) -> DeviceResult<String> {
        match request {
            Request::Get { path, member } => {
                if !self.exists(path) {
                    return Err(DeviceError::not_found(request, "object does not exist"));
                }
                self.read_member(path, member)
                    .ok_or_else(|| DeviceError::command_failed(request, "unknown member"))
            }
            Request::Set {
                path,
                member,
                value,
            } => {
                if !self.exists(path) {
                    return Err(DeviceError::not_found(request, "object does not exist"));
                }
                if path.kind() == ObjectKind::Chassis && member == "id" {
                    self.chassis_id = value
                        .parse()
                        .map_err(|_| DeviceError::command_failed(request, "invalid chassis id"))?;
                }
                self.written
                    .insert((path.clone(), member.clone()), value.clone());
                Ok(String::new())
            }
            Request::Invoke {
                path,
                command,
                args,
            } => self.invoke(request, path, command, args),
        }
    }

    fn read_member(&self, path: &ObjectPath, member: &str) -> Option<String> {
        if let Some(value) = self.written.get(&(path.clone(), member.to_string())) {
            return Some(value.clone());
        }
        let reference = path.reference();
        match path.kind() {
            ObjectKind::Chassis => {
                let chassis_type = ChassisType::from_code(self.topology.chassis_type);
                Some(match member {
                    "maxCardCount" => self.topology.max_card_count.to_string(),
                    "id" => self.chassis_id.to_string(),
                    "type" => chassis_type.code().to_string(),
                    "typeName" => chassis_type.to_string(),
                    "name" | "hostName" | "ipAddress" => reference.to_string(),
                    "ixServerVersion" => self.topology.ix_server_version.clone(),
                    _ => return None,
                })
            }
            ObjectKind::Card => {
                let [c, s] = parse_ref::<2>(reference)?;
                let card = self.card(CardAddress::new(c, s))?;
                Some(match member {
                    "typeName" => card.type_name.clone(),
                    "hwVersion" => card.hw_version.to_string(),
                    "serialNumber" => card.serial_number.clone(),
                    "portCount" => card.port_count.to_string(),
                    "type" | "fpgaVersion" | "cardOperationMode" => "0".to_string(),
                    _ => return None,
                })
            }
            ObjectKind::Port => {
                let address = port_address(reference)?;
                let state = self.card(address.card_address())?.port_state(address.port);
                Some(match member {
                    "owner" => self.owners.get(&address).cloned().unwrap_or_default(),
                    "linkState" => state.link_state.to_string(),
                    "name" => address.to_string(),
                    "type" | "portMode" | "receiveMode" => "0".to_string(),
                    "transmitMode" => "packetStreams".to_string(),
                    "loopback" | "flowControl" => "false".to_string(),
                    _ => return None,
                })
            }
            ObjectKind::Statistics => {
                let address = port_address(reference)?;
                let state = self.card(address.card_address())?.port_state(address.port);
                Some(match member {
                    "bytesSent" => state.bytes_sent.to_string(),
                    "bytesReceived" => state.bytes_received.to_string(),
                    _ => return None,
                })
            }
            ObjectKind::PortGroup => {
                let group = self.port_groups.get(&reference.parse().ok()?)?;
                match member {
                    "lastTimeStamp" => Some(group.last_time_stamp.to_string()),
                    _ => None,
                }
            }
            ObjectKind::Session | ObjectKind::Stream => None,
        }
    }

    fn invoke(
        &mut self,
        request: &Request,
        path: &ObjectPath,
        command: &str,
        args: &[String],
    ) -> DeviceResult<String> {
        match (path.kind(), command) {
            (ObjectKind::Session, "login") => {
                let owner = args
                    .first()
                    .ok_or_else(|| DeviceError::command_failed(request, "missing login name"))?;
                self.login = Some(owner.clone());
                return Ok(String::new());
            }
            (ObjectKind::Session, "logout") => {
                self.login = None;
                return Ok(String::new());
            }
            (ObjectKind::Chassis, "add") => {
                self.chassis_host = Some(path.reference().to_string());
                return Ok(String::new());
            }
            (ObjectKind::PortGroup, "create") => {
                let id: u32 = path
                    .reference()
                    .parse()
                    .map_err(|_| DeviceError::command_failed(request, "invalid group id"))?;
                if self.port_groups.contains_key(&id) {
                    return Err(DeviceError::command_failed(request, "group already exists"));
                }
                self.port_groups.insert(
                    id,
                    PortGroupState {
                        members: BTreeSet::new(),
                        last_time_stamp: 0,
                    },
                );
                return Ok(String::new());
            }
            _ => {}
        }

        if !self.exists(path) {
            return Err(DeviceError::not_found(request, "object does not exist"));
        }

        match (path.kind(), command) {
            (ObjectKind::Chassis, "del") => {
                self.chassis_host = None;
                Ok(String::new())
            }
            (_, "get") => Ok(String::new()),
            (ObjectKind::Chassis, "addVirtualCard") => {
                self.add_virtual_card(request, args)?;
                Ok(String::new())
            }
            (ObjectKind::Chassis, "removeVMCard") => {
                self.remove_virtual_card(request, args)?;
                Ok(String::new())
            }
            (ObjectKind::Card, "addVMPort" | "removeVMPort") => {
                let [c, s] = parse_ref::<2>(path.reference())
                    .ok_or_else(|| DeviceError::not_found(request, "bad card reference"))?;
                let card = CardAddress::new(c, s);
                if command == "addVMPort" {
                    self.add_vm_port(request, card, args)?;
                } else {
                    self.remove_vm_port(request, card, args)?;
                }
                Ok(String::new())
            }
            (ObjectKind::Port, "takeOwnership") => {
                let address = port_address(path.reference())
                    .ok_or_else(|| DeviceError::not_found(request, "bad port reference"))?;
                let force = args.first().is_some_and(|a| a == "force");
                self.take_ownership(request, address, force)?;
                Ok(String::new())
            }
            (ObjectKind::Port, "clearOwnership") => {
                let address = port_address(path.reference())
                    .ok_or_else(|| DeviceError::not_found(request, "bad port reference"))?;
                let force = args.first().is_some_and(|a| a == "force");
                self.clear_ownership(request, address, force)?;
                Ok(String::new())
            }
            (ObjectKind::Port, "getFeature") => {
                let address = port_address(path.reference())
                    .ok_or_else(|| DeviceError::not_found(request, "bad port reference"))?;
                match args.first().map(String::as_str) {
                    Some("ethernetLineRate") => {
                        let state = self
                            .card(address.card_address())
                            .map(|card| card.port_state(address.port))
                            .ok_or_else(|| DeviceError::not_found(request, "no such port"))?;
                        Ok(state
                            .line_rates
                            .iter()
                            .map(u32::to_string)
                            .collect::<Vec<_>>()
                            .join(" "))
                    }
                    _ => Err(DeviceError::command_failed(request, "unknown feature")),
                }
            }
            (ObjectKind::Port, "import" | "export") | (ObjectKind::Stream, "import") => {
                if args.is_empty() {
                    return Err(DeviceError::command_failed(request, "missing file name"));
                }
                Ok(String::new())
            }
            (ObjectKind::Port, "reset" | "write" | "setFactoryDefaults") => Ok(String::new()),
            (ObjectKind::PortGroup, command) => self.port_group_command(request, path, command, args),
            _ => Err(DeviceError::command_failed(request, "invalid command")),
        }
    }

    /// `addVirtualCard <card ip> <card id> <keep alive>`
    fn add_virtual_card(&mut self, request: &Request, args: &[String]) -> DeviceResult<()> {
        let slot: u16 = args
            .get(1)
            .and_then(|a| a.parse().ok())
            .ok_or_else(|| DeviceError::command_failed(request, "invalid card id"))?;
        if slot == 0 || slot > self.topology.max_card_count {
            return Err(DeviceError::command_failed(
                request,
                format!("card id {} outside 1..={}", slot, self.topology.max_card_count),
            ));
        }
        if self.topology.card(slot).is_some() {
            return Err(DeviceError::command_failed(
                request,
                format!("slot {} is occupied", slot),
            ));
        }
        self.topology
            .cards
            .push(SimCard::new(slot, 0).with_type_name(VIRTUAL_CARD_TYPE));
        self.topology.cards.sort_by_key(|c| c.slot);
        Ok(())
    }

    /// `removeVMCard <card id>`
    fn remove_virtual_card(&mut self, request: &Request, args: &[String]) -> DeviceResult<()> {
        let slot: u16 = args
            .first()
            .and_then(|a| a.parse().ok())
            .ok_or_else(|| DeviceError::command_failed(request, "invalid card id"))?;
        match self.topology.card(slot) {
            Some(card) if card.type_name == VIRTUAL_CARD_TYPE => {}
            _ => {
                return Err(DeviceError::command_failed(
                    request,
                    format!("no virtual card in slot {}", slot),
                ))
            }
        }
        let removed = CardAddress::new(self.chassis_id, slot);
        self.topology.cards.retain(|c| c.slot != slot);
        self.owners.retain(|address, _| address.card_address() != removed);
        Ok(())
    }

    /// `addVMPort <port id> <nic id> <promiscuous> <mac> <mtu> <speed>`
    fn add_vm_port(
        &mut self,
        request: &Request,
        address: CardAddress,
        args: &[String],
    ) -> DeviceResult<()> {
        let port: u16 = args
            .first()
            .and_then(|a| a.parse().ok())
            .filter(|&p| p > 0)
            .ok_or_else(|| DeviceError::command_failed(request, "invalid port id"))?;
        let speed: u32 = args
            .get(5)
            .and_then(|a| a.parse().ok())
            .ok_or_else(|| DeviceError::command_failed(request, "invalid speed"))?;
        let card = self
            .card_mut(address)
            .filter(|card| card.type_name == VIRTUAL_CARD_TYPE)
            .ok_or_else(|| DeviceError::command_failed(request, "not a virtual card"))?;
        if card.has_port(port) {
            return Err(DeviceError::command_failed(
                request,
                format!("port {} already exists", port),
            ));
        }

        if port > card.port_count {
            card.missing_ports.extend(card.port_count + 1..port);
            card.port_count = port;
        }
        card.missing_ports.retain(|&p| p != port);
        card.ports.retain(|p| p.port != port);
        card.ports.push(SimPort::new(port).with_line_rates(vec![speed]));
        Ok(())
    }

    /// `removeVMPort <port id>`
    fn remove_vm_port(
        &mut self,
        request: &Request,
        address: CardAddress,
        args: &[String],
    ) -> DeviceResult<()> {
        let port: u16 = args
            .first()
            .and_then(|a| a.parse().ok())
            .ok_or_else(|| DeviceError::command_failed(request, "invalid port id"))?;
        let card = self
            .card_mut(address)
            .filter(|card| card.type_name == VIRTUAL_CARD_TYPE)
            .ok_or_else(|| DeviceError::command_failed(request, "not a virtual card"))?;
        if !card.has_port(port) {
            return Err(DeviceError::command_failed(
                request,
                format!("no port {} on card", port),
            ));
        }
        card.missing_ports.push(port);
        self.owners.remove(&address.port(port));
        Ok(())
    }

    fn take_ownership(
        &mut self,
        request: &Request,
        address: PortAddress,
        force: bool,
    ) -> DeviceResult<()> {
        let login = self
            .login
            .clone()
            .ok_or_else(|| DeviceError::command_failed(request, "not logged in"))?;
        if let Some(owner) = self.owners.get(&address) {
            if *owner != login && !force {
                return Err(DeviceError::command_failed(
                    request,
                    format!("port {} is owned by {}", address, owner),
                ));
            }
        }
        self.owners.insert(address, login);
        Ok(())
    }

    fn clear_ownership(
        &mut self,
        request: &Request,
        address: PortAddress,
        force: bool,
    ) -> DeviceResult<()> {
        let Some(owner) = self.owners.get(&address) else {
            return Ok(());
        };
        if !force && self.login.as_deref() != Some(owner.as_str()) {
            return Err(DeviceError::command_failed(
                request,
                format!("port {} is owned by {}", address, owner),
            ));
        }
        self.owners.remove(&address);
        Ok(())
    }

    fn port_group_command(
        &mut self,
        request: &Request,
        path: &ObjectPath,
        command: &str,
        args: &[String],
    ) -> DeviceResult<String> {
        let id: u32 = path
            .reference()
            .parse()
            .map_err(|_| DeviceError::not_found(request, "invalid group id"))?;

        match command {
            "destroy" => {
                self.port_groups.remove(&id);
                Ok(String::new())
            }
            "add" | "del" => {
                let address = args
                    .first()
                    .and_then(|arg| port_address(arg))
                    .filter(|address| self.port_exists(*address))
                    .ok_or_else(|| DeviceError::command_failed(request, "no such port"))?;
                if let Some(group) = self.port_groups.get_mut(&id) {
                    if command == "add" {
                        group.members.insert(address);
                    } else {
                        group.members.remove(&address);
                    }
                }
                Ok(String::new())
            }
            "setCommand" => {
                let code: u32 = args
                    .first()
                    .and_then(|arg| arg.parse().ok())
                    .filter(|code| GROUP_COMMANDS.contains(code))
                    .ok_or_else(|| DeviceError::command_failed(request, "invalid command code"))?;
                let members: Vec<PortAddress> = self
                    .port_groups
                    .get(&id)
                    .map(|group| group.members.iter().copied().collect())
                    .unwrap_or_default();

                match code {
                    TAKE_OWNERSHIP | TAKE_OWNERSHIP_FORCED => {
                        for address in members {
                            self.take_ownership(request, address, code == TAKE_OWNERSHIP_FORCED)?;
                        }
                    }
                    CLEAR_OWNERSHIP | CLEAR_OWNERSHIP_FORCED => {
                        for address in members {
                            self.clear_ownership(request, address, code == CLEAR_OWNERSHIP_FORCED)?;
                        }
                    }
                    _ => {}
                }

                self.clock += 1;
                let clock = self.clock;
                if let Some(group) = self.port_groups.get_mut(&id) {
                    group.last_time_stamp = clock;
                }
                Ok(String::new())
            }
            _ => Err(DeviceError::command_failed(request, "invalid command")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{topologies, SimPort};
    use pretty_assertions::assert_eq;

    fn port(p: u16) -> ObjectPath {
        ObjectPath::port(PortAddress::new(1, 1, p))
    }

    async fn added(device: &SimulatedDevice) {
        device
            .invoke(&ObjectPath::chassis("lab"), "add", &[])
            .await
            .unwrap();
    }

    #[test]
    fn test_parse_ref() {
        assert_eq!(parse_ref::<2>("1 3"), Some([1, 3]));
        assert_eq!(parse_ref::<2>("1 3 4"), None);
        assert_eq!(parse_ref::<3>("1 x 4"), None);
        assert_eq!(port_address("1 2 3"), Some(PortAddress::new(1, 2, 3)));
    }

    #[tokio::test]
    async fn test_probe_existence() {
        let device = SimulatedDevice::new(topologies::sparse_three_slot());
        added(&device).await;

        let card = |slot| ObjectPath::card(CardAddress::new(1, slot));
        assert!(device.invoke(&card(1), "get", &[]).await.is_ok());
        assert!(device.invoke(&card(2), "get", &[]).await.unwrap_err().is_not_found());
        assert!(device.invoke(&card(4), "get", &[]).await.unwrap_err().is_not_found());
        assert!(device.invoke(&port(3), "get", &[]).await.unwrap_err().is_not_found());
        assert_eq!(device.get(&card(1), "portCount").await.unwrap(), "2");
        assert_eq!(device.calls().len(), 6);
    }

    #[tokio::test]
    async fn test_chassis_must_be_added() {
        let device = SimulatedDevice::new(topologies::sparse_three_slot());
        let chassis = ObjectPath::chassis("lab");
        assert!(device.get(&chassis, "maxCardCount").await.unwrap_err().is_not_found());
        added(&device).await;
        assert_eq!(device.get(&chassis, "maxCardCount").await.unwrap(), "3");
        device.set(&chassis, "name", "bench").await.unwrap();
        assert_eq!(device.get(&chassis, "name").await.unwrap(), "bench");
        assert_eq!(device.chassis_host().as_deref(), Some("lab"));
    }

    #[tokio::test]
    async fn test_ownership_rules() {
        let topology = topologies::sparse_three_slot();
        let device = SimulatedDevice::new(topology);
        added(&device).await;

        let err = device.invoke(&port(1), "takeOwnership", &[]).await.unwrap_err();
        assert!(err.is_command_failed());

        device
            .invoke(&ObjectPath::session(), "login", &["alice".to_string()])
            .await
            .unwrap();
        device.invoke(&port(1), "takeOwnership", &[]).await.unwrap();
        assert_eq!(device.owner_of(PortAddress::new(1, 1, 1)), "alice");

        device.set_owner(PortAddress::new(1, 1, 2), "bob");
        let err = device.invoke(&port(2), "takeOwnership", &[]).await.unwrap_err();
        assert!(err.is_command_failed());
        assert!(device.invoke(&port(2), "clearOwnership", &[]).await.is_err());

        device
            .invoke(&port(2), "takeOwnership", &["force".to_string()])
            .await
            .unwrap();
        assert_eq!(device.owner_of(PortAddress::new(1, 1, 2)), "alice");
        device.invoke(&port(2), "clearOwnership", &[]).await.unwrap();
        assert_eq!(device.owner_of(PortAddress::new(1, 1, 2)), "");
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let device = SimulatedDevice::new(topologies::sparse_three_slot());
        added(&device).await;
        let card = ObjectPath::card(CardAddress::new(1, 2));
        device.inject_fault(card.clone(), Fault::Timeout);

        let err = device.invoke(&card, "get", &[]).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.command(), "card get 1 2");

        device.clear_fault(&card);
        assert!(device.invoke(&card, "get", &[]).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_line_rates_and_counters() {
        let topology = Topology::new(1).with_card(
            SimCard::new(1, 1).with_port(
                SimPort::new(1)
                    .with_line_rates(vec![10000, 40000])
                    .with_counters(64, 128),
            ),
        );
        let device = SimulatedDevice::new(topology);
        added(&device).await;

        let reply = device
            .invoke(&port(1), "getFeature", &["ethernetLineRate".to_string()])
            .await
            .unwrap();
        assert_eq!(reply, "10000 40000");
        let stat = ObjectPath::statistics(PortAddress::new(1, 1, 1));
        assert_eq!(device.get(&stat, "bytesSent").await.unwrap(), "64");
        assert_eq!(device.get(&stat, "bytesReceived").await.unwrap(), "128");
    }

    #[tokio::test]
    async fn test_port_group_ownership_codes() {
        let device = SimulatedDevice::new(topologies::sparse_three_slot());
        added(&device).await;
        device
            .invoke(&ObjectPath::session(), "login", &["alice".to_string()])
            .await
            .unwrap();

        let group = ObjectPath::port_group(1);
        device.invoke(&group, "create", &[]).await.unwrap();
        assert!(device.invoke(&group, "create", &[]).await.is_err());
        device.invoke(&group, "add", &["1 1 1".to_string()]).await.unwrap();
        device.invoke(&group, "add", &["1 3 1".to_string()]).await.unwrap();
        assert!(device.invoke(&group, "add", &["1 2 1".to_string()]).await.is_err());

        device.invoke(&group, "setCommand", &["40".to_string()]).await.unwrap();
        assert_eq!(device.owner_of(PortAddress::new(1, 3, 1)), "alice");
        assert_eq!(device.get(&group, "lastTimeStamp").await.unwrap(), "1");

        device.invoke(&group, "setCommand", &["42".to_string()]).await.unwrap();
        assert_eq!(device.owner_of(PortAddress::new(1, 1, 1)), "");
        assert!(device.invoke(&group, "setCommand", &["99".to_string()]).await.is_err());

        device.invoke(&group, "destroy", &[]).await.unwrap();
        assert!(device.port_group_members(1).is_none());
        assert!(device.invoke(&group, "add", &["1 1 1".to_string()]).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_virtual_card_and_vm_ports() {
        let device = SimulatedDevice::new(topologies::sparse_three_slot());
        added(&device).await;
        let chassis = ObjectPath::chassis("lab");
        let card = ObjectPath::card(CardAddress::new(1, 2));
        let args = |v: &[&str]| v.iter().map(|a| a.to_string()).collect::<Vec<_>>();

        device
            .invoke(&chassis, "addVirtualCard", &args(&["10.0.0.5", "2", "300"]))
            .await
            .unwrap();
        assert_eq!(device.get(&card, "typeName").await.unwrap(), VIRTUAL_CARD_TYPE);
        assert_eq!(device.get(&card, "portCount").await.unwrap(), "0");
        let err = device
            .invoke(&chassis, "addVirtualCard", &args(&["10.0.0.5", "1", "300"]))
            .await
            .unwrap_err();
        assert!(err.is_command_failed());

        let vm_port = |nic: &str| args(&["3", nic, "0", "00:11:22:33:44:55", "1500", "1000"]);
        device.invoke(&card, "addVMPort", &vm_port("1")).await.unwrap();
        assert!(device.invoke(&card, "addVMPort", &vm_port("2")).await.is_err());
        assert_eq!(device.get(&card, "portCount").await.unwrap(), "3");
        let port = |p| ObjectPath::port(PortAddress::new(1, 2, p));
        assert!(device.invoke(&port(3), "get", &[]).await.is_ok());
        assert!(device.invoke(&port(1), "get", &[]).await.unwrap_err().is_not_found());

        device.invoke(&card, "removeVMPort", &args(&["3"])).await.unwrap();
        assert!(device.invoke(&port(3), "get", &[]).await.unwrap_err().is_not_found());

        let physical = ObjectPath::card(CardAddress::new(1, 1));
        assert!(device.invoke(&physical, "addVMPort", &vm_port("1")).await.is_err());
        assert!(device.invoke(&chassis, "removeVMCard", &args(&["1"])).await.is_err());
        device.invoke(&chassis, "removeVMCard", &args(&["2"])).await.unwrap();
        assert!(device.invoke(&card, "get", &[]).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_in_flight_drops_with_cancelled_request() {
        let device = SimulatedDevice::empty(1).with_latency(Duration::from_millis(50));
        let session = ObjectPath::session();
        let call = device.invoke(&session, "logout", &[]);
        let timed_out = tokio::time::timeout(Duration::from_millis(5), call).await;
        assert!(timed_out.is_err());
        assert_eq!(device.in_flight(), 0);
        assert_eq!(device.high_water_mark(), 1);
    }

    #[tokio::test]
    async fn test_high_water_mark() {
        let device = SimulatedDevice::empty(2)
            .concurrent(true)
            .with_latency(Duration::from_millis(10));
        let session = ObjectPath::session();
        let a = device.invoke(&session, "logout", &[]);
        let b = device.invoke(&session, "logout", &[]);
        let (a, b) = tokio::join!(a, b);
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(device.high_water_mark(), 2);
        assert!(device.supports_concurrent_calls());
    }
}
