//! Port link state.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Link state of a port as reported by the device.
///
/// Codes the device documents are mapped to named variants. Any other
/// code is kept verbatim in [`LinkState::Other`] so no information is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkState {
    Down,
    Up,
    Loopback,
    MiiWrite,
    RestartAuto,
    AutoNegotiating,
    MiiFail,
    NoTransceiver,
    InvalidAddress,
    ReadLinkPartner,
    NoLinkPartner,
    RestartAutoEnd,
    FpgaDownloadFailed,
    LossOfFrame,
    LossOfSignal,
    /// Code not known to this crate.
    Other(i32),
}

impl LinkState {
    /// Maps a raw device code to a link state.
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => LinkState::Down,
            1 => LinkState::Up,
            2 => LinkState::Loopback,
            3 => LinkState::MiiWrite,
            4 => LinkState::RestartAuto,
            5 => LinkState::AutoNegotiating,
            6 => LinkState::MiiFail,
            7 => LinkState::NoTransceiver,
            8 => LinkState::InvalidAddress,
            9 => LinkState::ReadLinkPartner,
            10 => LinkState::NoLinkPartner,
            11 => LinkState::RestartAutoEnd,
            12 => LinkState::FpgaDownloadFailed,
            24 => LinkState::LossOfFrame,
            25 => LinkState::LossOfSignal,
            other => LinkState::Other(other),
        }
    }

    /// Returns the raw device code.
    pub const fn code(&self) -> i32 {
        match self {
            LinkState::Down => 0,
            LinkState::Up => 1,
            LinkState::Loopback => 2,
            LinkState::MiiWrite => 3,
            LinkState::RestartAuto => 4,
            LinkState::AutoNegotiating => 5,
            LinkState::MiiFail => 6,
            LinkState::NoTransceiver => 7,
            LinkState::InvalidAddress => 8,
            LinkState::ReadLinkPartner => 9,
            LinkState::NoLinkPartner => 10,
            LinkState::RestartAutoEnd => 11,
            LinkState::FpgaDownloadFailed => 12,
            LinkState::LossOfFrame => 24,
            LinkState::LossOfSignal => 25,
            LinkState::Other(code) => *code,
        }
    }

    /// Returns true if the link is up (including internal loopback).
    pub const fn is_up(&self) -> bool {
        matches!(self, LinkState::Up | LinkState::Loopback)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::Down => "DOWN",
            LinkState::Up => "UP",
            LinkState::Loopback => "LOOPBACK",
            LinkState::MiiWrite => "MII_WRITE",
            LinkState::RestartAuto => "RESTART_AUTO",
            LinkState::AutoNegotiating => "AUTO_NEGOTIATING",
            LinkState::MiiFail => "MII_FAIL",
            LinkState::NoTransceiver => "NO_TRANSCEIVER",
            LinkState::InvalidAddress => "INVALID_ADDRESS",
            LinkState::ReadLinkPartner => "READ_LINK_PARTNER",
            LinkState::NoLinkPartner => "NO_LINK_PARTNER",
            LinkState::RestartAutoEnd => "RESTART_AUTO_END",
            LinkState::FpgaDownloadFailed => "FPGA_DOWNLOAD_FAILED",
            LinkState::LossOfFrame => "LOSS_OF_FRAME",
            LinkState::LossOfSignal => "LOSS_OF_SIGNAL",
            LinkState::Other(code) => return write!(f, "{}", code),
        };
        write!(f, "{}", s)
    }
}

/// Parses the raw numeric code returned by the device.
impl FromStr for LinkState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i32>()
            .map(LinkState::from_code)
            .map_err(|_| ParseError::InvalidLinkState(s.to_string()))
    }
}
