// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The error results used by this library.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OfError {
    #[error("Unsupported OpenFlow version 0x{0:02x}")]
    UnsupportedVersion(u8),
}
