// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The error results used by this library.

use net::NetError;
use openflow::OfError;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RouterError {
    /// A semantically invalid mutation; the message is surfaced verbatim in
    /// the REST command result.
    #[error("{0}")]
    CommandFailure(String),

    #[error(transparent)]
    Net(#[from] NetError),

    #[error(transparent)]
    Of(#[from] OfError),

    #[error("Invalid vlan id {0}")]
    InvalidVlanId(u32),

    #[error("Invalid parameter.")]
    InvalidParameter,
}
