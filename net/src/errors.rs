// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The error results used by this library.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NetError {
    #[error("invalid string representation of mac address: {0}")]
    InvalidMac(String),

    #[error("Invalid [{0}] value.")]
    InvalidAddress(String),

    #[error("Mask length {0} is invalid")]
    InvalidMaskLength(u8),

    #[error("Invalid vlan id {0}")]
    InvalidVid(u16),

    #[error("Truncated {0} header")]
    Truncated(&'static str),

    #[error("Unsupported ethertype 0x{0:04x}")]
    UnsupportedEtherType(u16),

    #[error("Unsupported ARP packet")]
    UnsupportedArp,

    #[error("Failed to build {0} frame")]
    FrameBuild(&'static str),
}
