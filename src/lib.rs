//! BGP path attributes
//!
//! Turns the path attribute block of a BGP UPDATE message into typed,
//! validated attributes, encodes them back for a given peer, and lets the
//! routes that carry identical attribute lists share one interned copy.
//!
//! Structs here intends to represent the data instead of the on-wire format.

// SPDX-License-Identifier: AGPL-3.0-or-later

pub mod as4;
pub mod asn;
pub mod aspath;
pub mod attr_list;
pub mod attribute;
pub mod capability;
mod endec;
pub mod manager;
pub mod mpnlri;
pub mod route;
pub mod update;

pub use asn::AsNumber;
pub use aspath::{AsPath, AsSegment, SegmentKind};
pub use attr_list::PathAttributeList;
pub use attribute::{AttrType, Data, Flags, Origin, PathAttribute};
pub use endec::{AsWidth, Component, PeerCxt};
pub use manager::{AttrHandle, AttributeManager};
pub use update::Update;

use bytes::{Buf, BufMut, Bytes};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use std::net::IpAddr;

/// ASN for AS4
pub const AS_TRANS: u16 = 23456;

/// Errors of this crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    CorruptMessage(#[from] CorruptMessage),
    #[error("invalid AS path {0:?}")]
    InvalidAsPath(String),
    #[error("invalid AS number {0:?}")]
    InvalidAsNumber(String),
}

/// A received UPDATE could not be decoded
///
/// `data` echoes the raw bytes of the offending attribute (flags, type,
/// length and value) so that it can be returned to the peer in a
/// NOTIFICATION message.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("corrupt message: {kind}")]
pub struct CorruptMessage {
    pub kind: CorruptKind,
    pub data: Bytes,
}

/// Reasons for a [`CorruptMessage`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CorruptKind {
    #[error("unknown ORIGIN value {0}")]
    UnknownOriginValue(u8),
    #[error("unknown AS path segment type {0}")]
    UnknownSegmentType(u8),
    #[error("flags {flags:#04x} not allowed for attribute type {attr_type}")]
    BadFlags { attr_type: u8, flags: u8 },
    #[error("malformed AS path")]
    MalformedAsPath,
    #[error("invalid NEXT_HOP {0}")]
    InvalidNextHop(IpAddr),
    #[error("attribute truncated")]
    TruncatedAttribute,
    #[error("bad length for attribute type {0}")]
    BadAttributeLength(u8),
    #[error("malformed attribute list")]
    MalformedAttributeList,
    #[error("unrecognized well-known attribute type {0}")]
    UnrecognizedWellKnown(u8),
    #[error("missing well-known attribute type {0}")]
    MissingWellKnown(u8),
    #[error("malformed multiprotocol NLRI")]
    MalformedMpNlri,
    #[error("invalid network field")]
    InvalidNetworkField,
}

impl From<bytes::TryGetError> for CorruptKind {
    fn from(_: bytes::TryGetError) -> Self {
        Self::TruncatedAttribute
    }
}

impl CorruptKind {
    /// The UPDATE message error subcode reported for this error
    #[must_use]
    pub const fn subcode(self) -> UpdateMessageErrorSubcode {
        match self {
            Self::UnknownOriginValue(_) => UpdateMessageErrorSubcode::InvalidOriginAttribute,
            Self::UnknownSegmentType(_) | Self::MalformedAsPath => {
                UpdateMessageErrorSubcode::MalformedAsPath
            }
            Self::BadFlags { .. } => UpdateMessageErrorSubcode::AttributeFlagsError,
            Self::InvalidNextHop(_) => UpdateMessageErrorSubcode::InvalidNextHopAttribute,
            Self::TruncatedAttribute | Self::BadAttributeLength(_) => {
                UpdateMessageErrorSubcode::AttributeLengthError
            }
            Self::MalformedAttributeList => UpdateMessageErrorSubcode::MalformedAttributeList,
            Self::UnrecognizedWellKnown(_) => {
                UpdateMessageErrorSubcode::UnrecognizedWellKnownAttribute
            }
            Self::MissingWellKnown(_) => UpdateMessageErrorSubcode::MissingWellKnownAttribute,
            Self::MalformedMpNlri => UpdateMessageErrorSubcode::OptionalAttributeError,
            Self::InvalidNetworkField => UpdateMessageErrorSubcode::InvalidNetworkField,
        }
    }
}

impl CorruptMessage {
    #[must_use]
    pub const fn new(kind: CorruptKind, data: Bytes) -> Self {
        Self { kind, data }
    }

    /// An error without an attribute to echo
    #[must_use]
    pub const fn bare(kind: CorruptKind) -> Self {
        Self::new(kind, Bytes::new())
    }

    /// Build the NOTIFICATION sent to the peer for this error
    #[must_use]
    pub fn notification(&self) -> Notification {
        Notification::new(
            NotificationErrorCode::UpdateMessageError,
            self.kind.subcode() as u8,
            self.data.clone(),
        )
    }
}

/// BGP notification message
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub error_code: NotificationErrorCode,
    pub error_subcode: u8,
    pub data: Bytes,
}

impl Component for Notification {
    fn from_bytes(src: &mut Bytes) -> Result<Self, CorruptKind> {
        let error_code = src.try_get_u8()?;
        let error_subcode = src.try_get_u8()?;
        let data = src.copy_to_bytes(src.remaining());
        Ok(Self {
            // Not an attribute error, but there is no better way to reject it here
            error_code: NotificationErrorCode::from_u8(error_code)
                .ok_or(CorruptKind::MalformedAttributeList)?,
            error_subcode,
            data,
        })
    }

    fn to_bytes(&self, dst: &mut bytes::BytesMut) -> usize {
        (self.error_code as u8).to_bytes(dst);
        self.error_subcode.to_bytes(dst);
        dst.put_slice(&self.data);
        self.encoded_len()
    }

    fn encoded_len(&self) -> usize {
        2 + self.data.len()
    }
}

impl Notification {
    /// Create a new BGP notification message
    #[must_use]
    pub const fn new(error_code: NotificationErrorCode, error_subcode: u8, data: Bytes) -> Self {
        Self {
            error_code,
            error_subcode,
            data,
        }
    }
}

/// Notification error codes
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum NotificationErrorCode {
    MessageHeaderError = 1,
    OpenMessageError = 2,
    UpdateMessageError = 3,
    HoldTimerExpired = 4,
    FiniteStateMachineError = 5,
    Cease = 6,
}

/// Notification error subcodes for `UpdateMessageError`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Primitive)]
#[repr(u8)]
pub enum UpdateMessageErrorSubcode {
    MalformedAttributeList = 1,
    UnrecognizedWellKnownAttribute = 2,
    MissingWellKnownAttribute = 3,
    AttributeFlagsError = 4,
    AttributeLengthError = 5,
    InvalidOriginAttribute = 6,
    AsRoutingLoop = 7,
    InvalidNextHopAttribute = 8,
    OptionalAttributeError = 9,
    InvalidNetworkField = 10,
    MalformedAsPath = 11,
}

#[cfg(test)]
const fn convert_one_hex_digit(c: u8) -> u8 {
    if c.is_ascii_digit() {
        c - b'0'
    } else if c.is_ascii_lowercase() {
        c - b'a' + 10
    } else if c.is_ascii_uppercase() {
        c - b'A' + 10
    } else {
        panic!("invalid hex character");
    }
}

#[cfg(test)]
#[must_use]
pub fn hex_to_bytes(hex: &str) -> Bytes {
    // Skip these characters on octet boundary
    const SKIP: &[u8] = b" \t\n\r:.";
    let hex = hex.as_bytes();
    let mut octets = bytes::BytesMut::with_capacity(hex.len() / 2);
    let mut i = 0;
    while i < hex.len() {
        let c = hex[i];
        if SKIP.contains(&c) {
            i += 1;
            continue;
        }
        let hi = convert_one_hex_digit(c) << 4;
        assert!(i + 1 < hex.len(), "odd number of hex digits");
        let lo = convert_one_hex_digit(hex[i + 1]);
        octets.put_u8(hi | lo);
        i += 2;
    }
    octets.freeze()
}

/// Route log output of the crate into the test harness
#[cfg(test)]
pub fn init_test_logger() {
    // Several tests race to install it; only the first one wins.
    let _ = simplelog::TestLogger::init(log::LevelFilter::Trace, simplelog::Config::default());
}
