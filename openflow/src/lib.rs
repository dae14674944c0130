// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Version-abstracted OpenFlow rule synthesis and request/reply coordination.
//!
//! The wire codec and switch-session management live outside this crate; they
//! reach us through the [`datapath::Datapath`] trait and hand back events as
//! [`datapath::PacketInMsg`] / [`datapath::StatsReplyMsg`] values.

pub mod cookie;
pub mod datapath;
mod errors;
pub mod flow;
pub mod ofctl;
pub mod priority;
pub mod stats;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod version;

// re-exports
pub use cookie::Cookie;
pub use errors::OfError;
pub use ofctl::{OfCtl, ofctl_for};
pub use stats::{OFP_REPLY_TIMER, Waiters};
pub use version::OfVersion;
