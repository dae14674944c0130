// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Supported OpenFlow protocol versions.

use crate::errors::OfError;

/// Wire value of `OFP_VERSION` for the versions this controller speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum OfVersion {
    V1_0 = 0x01,
    V1_2 = 0x03,
    V1_3 = 0x04,
}

/// More-fragments flag on OF1.0/1.2 stats replies (`OFPSF_REPLY_MORE`).
pub const OFPSF_REPLY_MORE: u16 = 0x0001;
/// More-fragments flag on OF1.3 multipart replies (`OFPMPF_REPLY_MORE`).
pub const OFPMPF_REPLY_MORE: u16 = 0x0001;

impl OfVersion {
    /// Map the wire `OFP_VERSION` octet.
    pub fn from_wire(raw: u8) -> Result<OfVersion, OfError> {
        match raw {
            0x01 => Ok(OfVersion::V1_0),
            0x03 => Ok(OfVersion::V1_2),
            0x04 => Ok(OfVersion::V1_3),
            other => Err(OfError::UnsupportedVersion(other)),
        }
    }

    /// Whether a stats/multipart reply with `flags` announces further fragments.
    #[must_use]
    pub fn stats_reply_has_more(self, flags: u16) -> bool {
        match self {
            OfVersion::V1_3 => flags & OFPMPF_REPLY_MORE != 0,
            OfVersion::V1_0 | OfVersion::V1_2 => flags & OFPSF_REPLY_MORE != 0,
        }
    }
}

impl core::fmt::Display for OfVersion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            OfVersion::V1_0 => write!(f, "1.0"),
            OfVersion::V1_2 => write!(f, "1.2"),
            OfVersion::V1_3 => write!(f, "1.3"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_wire() {
        assert_eq!(OfVersion::from_wire(0x01), Ok(OfVersion::V1_0));
        assert_eq!(OfVersion::from_wire(0x03), Ok(OfVersion::V1_2));
        assert_eq!(OfVersion::from_wire(0x04), Ok(OfVersion::V1_3));
        assert_eq!(
            OfVersion::from_wire(0x02),
            Err(OfError::UnsupportedVersion(0x02))
        );
    }

    #[test]
    fn test_reply_more_flag() {
        assert!(OfVersion::V1_3.stats_reply_has_more(OFPMPF_REPLY_MORE));
        assert!(OfVersion::V1_0.stats_reply_has_more(OFPSF_REPLY_MORE));
        assert!(!OfVersion::V1_2.stats_reply_has_more(0));
    }
}
