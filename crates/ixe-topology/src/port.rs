//! Port handles: live attributes, ownership and configuration loading.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use ixe_api::ObjectPath;
use ixe_types::{LinkState, PortAddress};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::error::{TopologyError, TopologyResult};
use crate::schema::{Attributes, PORT_SCHEMA};
use crate::session::Session;
use crate::statistics::StatisticsView;

/// Feature queried for the list of supported line rates.
const LINE_RATE_FEATURE: &str = "ethernetLineRate";

static SPEED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("Invalid regex pattern"));

/// Who holds a port, as seen from this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    Unowned,
    OwnedByThisSession,
    /// Held by another login (the device's owner string).
    OwnedByOther(String),
}

/// Handle to a discovered port.
///
/// The handle carries only identity. Every accessor is a device round
/// trip and fails with `InvalidHandle` once the chassis is disconnected.
#[derive(Debug, Clone)]
pub struct PortHandle {
    session: Arc<Session>,
    address: PortAddress,
}

impl PortHandle {
    pub(crate) fn new(session: Arc<Session>, address: PortAddress) -> Self {
        Self { session, address }
    }

    pub fn address(&self) -> PortAddress {
        self.address
    }

    /// Stable display name derived from the port's identity.
    pub fn name(&self) -> String {
        self.address.to_string()
    }

    pub fn path(&self) -> ObjectPath {
        ObjectPath::port(self.address)
    }

    /// Returns false once the owning chassis has been disconnected.
    pub fn is_valid(&self) -> bool {
        self.session.is_connected()
    }

    pub(crate) fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn attributes(&self) -> Attributes<'_> {
        Attributes::new(&self.session, self.path(), &PORT_SCHEMA)
    }

    /// Read-only counters of this port.
    pub fn statistics(&self) -> StatisticsView<'_> {
        StatisticsView::new(self)
    }

    /// The `name` member configured on the device.
    pub async fn port_name(&self) -> TopologyResult<String> {
        self.attributes().get_raw("name").await
    }

    pub async fn set_port_name(&self, name: &str) -> TopologyResult<()> {
        self.attributes().set("name", name).await
    }

    /// Current owner string, empty if unowned.
    pub async fn owner(&self) -> TopologyResult<String> {
        Ok(self.attributes().get_raw("owner").await?.trim().to_string())
    }

    /// Re-reads the owner and classifies it against this session's login.
    pub async fn ownership(&self) -> TopologyResult<Ownership> {
        let owner = self.owner().await?;
        Ok(if owner.is_empty() {
            Ownership::Unowned
        } else if self.session.is_own_token(&owner) {
            Ownership::OwnedByThisSession
        } else {
            Ownership::OwnedByOther(owner)
        })
    }

    pub async fn link_state(&self) -> TopologyResult<LinkState> {
        self.attributes().get("link_state").await
    }

    pub async fn port_type(&self) -> TopologyResult<i64> {
        self.attributes().get("type").await
    }

    pub async fn port_mode(&self) -> TopologyResult<i64> {
        self.attributes().get("port_mode").await
    }

    pub async fn set_port_mode(&self, mode: i64) -> TopologyResult<()> {
        self.attributes().set("port_mode", mode).await
    }

    pub async fn transmit_mode(&self) -> TopologyResult<String> {
        self.attributes().get_raw("transmit_mode").await
    }

    pub async fn set_transmit_mode(&self, mode: &str) -> TopologyResult<()> {
        self.attributes().set("transmit_mode", mode).await
    }

    /// Capture/receive mode bit mask.
    pub async fn receive_mode(&self) -> TopologyResult<i64> {
        self.attributes().get("receive_mode").await
    }

    pub async fn set_receive_mode(&self, mode: i64) -> TopologyResult<()> {
        self.attributes().set("receive_mode", mode).await
    }

    pub async fn loopback(&self) -> TopologyResult<String> {
        self.attributes().get_raw("loopback").await
    }

    pub async fn set_loopback(&self, mode: &str) -> TopologyResult<()> {
        self.attributes().set("loopback", mode).await
    }

    pub async fn flow_control(&self) -> TopologyResult<String> {
        self.attributes().get_raw("flow_control").await
    }

    pub async fn set_flow_control(&self, mode: &str) -> TopologyResult<()> {
        self.attributes().set("flow_control", mode).await
    }

    /// Line rates the port supports, in Mbps.
    pub async fn supported_speeds(&self) -> TopologyResult<Vec<u32>> {
        let reply = self
            .invoke("getFeature", &[LINE_RATE_FEATURE.to_string()])
            .await?;
        Ok(parse_speeds(&reply))
    }

    /// Takes ownership of the port on the device.
    ///
    /// Without `force`, a port held by another login yields
    /// [`TopologyError::AlreadyOwned`]. With `force` the previous owner is
    /// displaced and any device error is returned unchanged.
    #[instrument(skip(self), fields(port = %self.address))]
    pub async fn reserve(&self, force: bool) -> TopologyResult<()> {
        let args = if force {
            vec!["force".to_string()]
        } else {
            Vec::new()
        };
        match self.invoke("takeOwnership", &args).await {
            Ok(_) => {
                info!("Reserved port {}", self.address);
                Ok(())
            }
            Err(TopologyError::Device(e)) if !force && e.is_command_failed() => {
                // The device reports every rejection the same way; the
                // current owner tells a conflict apart from other failures.
                match self.owner().await {
                    Ok(owner) if !owner.is_empty() && !self.session.is_own_token(&owner) => {
                        warn!(owner = %owner, "Port {} is owned by another party", self.address);
                        Err(TopologyError::AlreadyOwned {
                            port: self.address,
                            owner,
                        })
                    }
                    _ => Err(TopologyError::Device(e)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Clears ownership of the port.
    #[instrument(skip(self), fields(port = %self.address))]
    pub async fn release(&self) -> TopologyResult<()> {
        self.invoke("clearOwnership", &[]).await?;
        info!("Released port {}", self.address);
        Ok(())
    }

    /// Loads a port (`.prt`) or stream (`.str`) configuration file.
    ///
    /// A stream file replaces the port's traffic, so the port is reset
    /// first. Either way the configuration is committed with `write`.
    #[instrument(skip(self, path), fields(port = %self.address))]
    pub async fn load_configuration(&self, path: impl AsRef<Path>) -> TopologyResult<()> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(OsStr::to_str)
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let file = path.to_string_lossy().into_owned();

        match extension.as_str() {
            "prt" => {
                self.invoke("import", &[file]).await?;
            }
            "str" => {
                self.reset().await?;
                self.session
                    .invoke(&ObjectPath::stream(self.address), "import", &[file])
                    .await?;
            }
            _ => {
                return Err(TopologyError::UnsupportedConfigFormat {
                    path: path.to_path_buf(),
                    extension: if extension.is_empty() {
                        extension
                    } else {
                        format!(".{}", extension)
                    },
                });
            }
        }

        self.write().await?;
        info!(file = %path.display(), "Loaded configuration into port {}", self.address);
        Ok(())
    }

    pub async fn reset(&self) -> TopologyResult<()> {
        self.invoke("reset", &[]).await.map(drop)
    }

    /// Commits pending configuration to the hardware.
    pub async fn write(&self) -> TopologyResult<()> {
        self.invoke("write", &[]).await.map(drop)
    }

    pub async fn set_factory_defaults(&self) -> TopologyResult<()> {
        self.invoke("setFactoryDefaults", &[]).await.map(drop)
    }

    /// Exports the port configuration to a file on the device host.
    pub async fn export(&self, path: impl AsRef<Path>) -> TopologyResult<()> {
        let file = path.as_ref().to_string_lossy().into_owned();
        self.invoke("export", &[file]).await.map(drop)
    }

    async fn invoke(&self, command: &str, args: &[String]) -> TopologyResult<String> {
        self.session.invoke(&self.path(), command, args).await
    }
}

/// Extracts every integer from a line rate feature reply.
fn parse_speeds(reply: &str) -> Vec<u32> {
    SPEED_RE
        .find_iter(reply)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_speeds() {
        assert_eq!(parse_speeds("10 100 1000"), vec![10, 100, 1000]);
        assert_eq!(
            parse_speeds("{ethernetLineRate10000 ethernetLineRate40000}"),
            vec![10000, 40000]
        );
        assert!(parse_speeds("").is_empty());
        assert!(parse_speeds("none").is_empty());
    }

    #[test]
    fn test_parse_speeds_skips_overflow() {
        assert_eq!(parse_speeds("99999999999 100"), vec![100]);
    }
}
