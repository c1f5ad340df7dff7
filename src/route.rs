//! BGP route
//!
//! These structures do not contain information about the address family of
//! the route as they correspond to BGP's NLRI fields. To determine the address
//! family, the caller must know the context (BGP.nlri, MP_REACH_NLRI, etc).

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::capability::Afi;
use crate::CorruptKind;
use bytes::{Buf, BufMut, Bytes};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ops::Deref;

/// Compute the number of prefix octets from the prefix length
const fn n_prefix_octets(prefix_len: u8) -> usize {
    (prefix_len as usize).div_ceil(8)
}

/// Copy the significant octets of an address, clearing the host bits
fn masked_octets(octets: &[u8], prefix_len: u8) -> Bytes {
    let n = n_prefix_octets(prefix_len);
    let mut prefix = octets[..n].to_vec();
    let rem = prefix_len % 8;
    if rem != 0 {
        if let Some(last) = prefix.last_mut() {
            *last &= 0xff << (8 - rem);
        }
    }
    Bytes::from(prefix)
}

/// BGP route CIDR blocks
///
/// Corresponding to a compact representation of a u8 prefix length and the
/// minimum number of octets to represent the prefix.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Prefix {
    pub prefix_len: u8,
    pub prefix: Bytes,
}

impl Prefix {
    /// Expand into an address of the given family
    #[must_use]
    pub fn to_addr(&self, afi: Afi) -> IpAddr {
        match afi {
            Afi::Ipv4 => {
                let mut octets = [0; 4];
                octets[..self.prefix.len().min(4)]
                    .copy_from_slice(&self.prefix[..self.prefix.len().min(4)]);
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            Afi::Ipv6 => {
                let mut octets = [0; 16];
                octets[..self.prefix.len().min(16)]
                    .copy_from_slice(&self.prefix[..self.prefix.len().min(16)]);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
        }
    }

    /// Format as CIDR for the given family
    #[must_use]
    pub fn display(&self, afi: Afi) -> String {
        format!("{}/{}", self.to_addr(afi), self.prefix_len)
    }
}

impl From<(Ipv4Addr, u8)> for Prefix {
    fn from((addr, prefix_len): (Ipv4Addr, u8)) -> Self {
        let prefix_len = prefix_len.min(32);
        Self {
            prefix_len,
            prefix: masked_octets(&addr.octets(), prefix_len),
        }
    }
}

impl From<(Ipv6Addr, u8)> for Prefix {
    fn from((addr, prefix_len): (Ipv6Addr, u8)) -> Self {
        let prefix_len = prefix_len.min(128);
        Self {
            prefix_len,
            prefix: masked_octets(&addr.octets(), prefix_len),
        }
    }
}

/// BGP routes
///
/// Corresponding to a compact list of CIDR blocks without a length field.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Routes(pub Vec<Prefix>);

impl Routes {
    /// Decode the whole buffer as a list of prefixes of one family.
    ///
    /// # Errors
    /// `InvalidNetworkField` if a prefix is too long for the family or runs
    /// past the end of the buffer.
    pub fn decode(src: &mut Bytes, afi: Afi) -> Result<Self, CorruptKind> {
        let mut routes = Vec::new();
        while src.has_remaining() {
            let prefix_len = src.get_u8();
            if prefix_len > afi.max_prefix_len() {
                return Err(CorruptKind::InvalidNetworkField);
            }
            let n_prefix_octets = n_prefix_octets(prefix_len);
            if src.remaining() < n_prefix_octets {
                return Err(CorruptKind::InvalidNetworkField);
            }
            let prefix = src.split_to(n_prefix_octets);
            routes.push(Prefix { prefix_len, prefix });
        }
        Ok(Self(routes))
    }

    /// Returns the number of bytes written.
    pub fn encode(&self, dst: &mut bytes::BytesMut) -> usize {
        for route in &self.0 {
            dst.put_u8(route.prefix_len);
            dst.put_slice(&route.prefix);
        }
        self.encoded_len()
    }

    #[must_use]
    pub fn encoded_len(&self) -> usize {
        self.0.iter().map(|r| 1 + r.prefix.len()).sum()
    }

    /// Format as a comma-separated CIDR list
    #[must_use]
    pub fn display(&self, afi: Afi) -> String {
        self.0
            .iter()
            .map(|r| r.display(afi))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Deref for Routes {
    type Target = Vec<Prefix>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<I, T> From<I> for Routes
where
    I: IntoIterator<Item = T>,
    T: Into<Prefix>,
{
    fn from(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
