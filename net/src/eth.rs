// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Mac address type and ethertype constants.

use crate::errors::NetError;
use std::fmt::Display;
use std::str::FromStr;

/// Ethertype of IPv4.
pub const ETH_TYPE_IP: u16 = 0x0800;
/// Ethertype of ARP.
pub const ETH_TYPE_ARP: u16 = 0x0806;
/// Ethertype of the 802.1Q shim.
pub const ETH_TYPE_8021Q: u16 = 0x8100;

/// A [MAC Address] type.
///
/// `Mac` is a transparent wrapper around `[u8; 6]` which provides a
/// small collection of methods and type safety.
///
/// [MAC Address]: https://en.wikipedia.org/wiki/MAC_address
#[repr(transparent)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub struct Mac(pub [u8; 6]);

impl Mac {
    /// The broadcast `Mac`.
    pub const BROADCAST: Mac = Mac([u8::MAX; 6]);
    /// The zero `Mac`, used as the don't-care target in ARP requests.
    pub const ZERO: Mac = Mac([0; 6]);

    /// Returns true iff the binary representation of the [`Mac`] is exclusively ones.
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self == &Mac::BROADCAST
    }

    /// Returns true iff the binary representation of the [`Mac`] is exclusively zeros.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Mac::ZERO
    }

    /// Returns true iff the least significant bit of the first octet is one.
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }
}

impl Default for Mac {
    fn default() -> Self {
        Mac::ZERO
    }
}

impl From<[u8; 6]> for Mac {
    fn from(value: [u8; 6]) -> Self {
        Mac(value)
    }
}

impl From<Mac> for [u8; 6] {
    fn from(value: Mac) -> Self {
        value.0
    }
}

impl AsRef<[u8; 6]> for Mac {
    fn as_ref(&self) -> &[u8; 6] {
        &self.0
    }
}

impl FromStr for Mac {
    type Err = NetError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut count = 0;
        for part in value.split(':') {
            if count == 6 || part.len() != 2 {
                return Err(NetError::InvalidMac(value.to_string()));
            }
            octets[count] = u8::from_str_radix(part, 16)
                .map_err(|_| NetError::InvalidMac(value.to_string()))?;
            count += 1;
        }
        if count != 6 {
            return Err(NetError::InvalidMac(value.to_string()));
        }
        Ok(Mac(octets))
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_parse_and_format() {
        let mac: Mac = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(mac, Mac([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]));
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_mac_parse_rejects_malformed() {
        assert!("aa:bb:cc:dd:ee".parse::<Mac>().is_err());
        assert!("aa:bb:cc:dd:ee:ff:00".parse::<Mac>().is_err());
        assert!("aa:bb:cc:dd:ee:fg".parse::<Mac>().is_err());
        assert!("aabb:cc:dd:ee:ff".parse::<Mac>().is_err());
    }

    #[test]
    fn test_mac_display_parse_round_trip() {
        bolero::check!().with_type().for_each(|octets: &[u8; 6]| {
            let mac = Mac(*octets);
            assert_eq!(mac.to_string().parse::<Mac>().unwrap(), mac);
        });
    }

    #[test]
    fn test_mac_classification() {
        assert!(Mac::BROADCAST.is_broadcast());
        assert!(Mac::BROADCAST.is_multicast());
        assert!(Mac::ZERO.is_zero());
        assert!(!Mac([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]).is_multicast());
    }
}
