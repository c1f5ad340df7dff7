//! BGP attribute encoding and decoding

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::CorruptKind;
use bytes::{Buf, BufMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// BGP packet component with a fixed length or containing a length field
pub trait Component {
    /// Decode the component from a buffer.
    ///
    /// # Errors
    /// Returns the reason the bytes could not be decoded.
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, CorruptKind>
    where
        Self: Sized;

    /// Encode the component into a buffer.
    ///
    /// Returns the number of bytes written.
    fn to_bytes(&self, dst: &mut bytes::BytesMut) -> usize;

    /// Find out the length of the component, preferably without encoding it.
    fn encoded_len(&self) -> usize;
}

/// Width of AS numbers in AS_PATH and AGGREGATOR on the wire
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AsWidth {
    Two,
    Four,
}

impl AsWidth {
    /// Number of octets taken by one AS number
    #[must_use]
    pub const fn octets(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Four => 4,
        }
    }
}

/// What is known about the peer a message is exchanged with
///
/// Only the 4-byte AS number capability changes how attributes look on the
/// wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerCxt {
    pub four_byte_asn: bool,
}

impl PeerCxt {
    /// A peer that did not negotiate 4-byte AS numbers
    #[must_use]
    pub const fn legacy() -> Self {
        Self {
            four_byte_asn: false,
        }
    }

    /// A peer that negotiated 4-byte AS numbers
    #[must_use]
    pub const fn four_byte() -> Self {
        Self {
            four_byte_asn: true,
        }
    }

    /// Context for the canonical encoding shared by every peer
    #[must_use]
    pub const fn canonical() -> Self {
        Self::four_byte()
    }

    #[must_use]
    pub const fn as_width(self) -> AsWidth {
        if self.four_byte_asn {
            AsWidth::Four
        } else {
            AsWidth::Two
        }
    }
}

impl Default for PeerCxt {
    fn default() -> Self {
        Self::canonical()
    }
}

impl Component for Ipv4Addr {
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, CorruptKind> {
        let octets = src.try_get_u32()?;
        Ok(Self::from(octets))
    }

    fn to_bytes(&self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u32((*self).into());
        4
    }

    fn encoded_len(&self) -> usize {
        4
    }
}

impl Component for Ipv6Addr {
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, CorruptKind> {
        if src.remaining() < 16 {
            return Err(CorruptKind::TruncatedAttribute);
        }
        let mut octets = [0; 16];
        src.copy_to_slice(&mut octets);
        Ok(Self::from(octets))
    }

    fn to_bytes(&self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_slice(&self.octets());
        16
    }

    fn encoded_len(&self) -> usize {
        16
    }
}

impl Component for IpAddr {
    /// Takes the whole buffer, which must be exactly 4 or 16 bytes long
    fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, CorruptKind> {
        match src.remaining() {
            4 => Ok(Self::V4(Ipv4Addr::from_bytes(src)?)),
            16 => Ok(Self::V6(Ipv6Addr::from_bytes(src)?)),
            _ => Err(CorruptKind::TruncatedAttribute),
        }
    }

    fn to_bytes(&self, dst: &mut bytes::BytesMut) -> usize {
        match self {
            Self::V4(addr) => addr.to_bytes(dst),
            Self::V6(addr) => addr.to_bytes(dst),
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Self::V4(addr) => addr.encoded_len(),
            Self::V6(addr) => addr.encoded_len(),
        }
    }
}

macro_rules! impl_component_for_intn {
    ($typ:ty, $getter:ident, $putter:ident, $n:expr) => {
        impl Component for $typ {
            fn from_bytes(src: &mut bytes::Bytes) -> Result<Self, CorruptKind> {
                Ok(src.$getter()?)
            }

            fn to_bytes(&self, dst: &mut bytes::BytesMut) -> usize {
                dst.$putter(*self);
                $n
            }

            fn encoded_len(&self) -> usize {
                $n
            }
        }
    };
}

impl_component_for_intn!(u8, try_get_u8, put_u8, 1);
impl_component_for_intn!(u16, try_get_u16, put_u16, 2);
impl_component_for_intn!(u32, try_get_u32, put_u32, 4);
