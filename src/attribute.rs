//! BGP path attributes (RFC 4271 Section 4.3 and 5)

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::asn::AsNumber;
use crate::aspath::AsPath;
use crate::endec::{AsWidth, Component, PeerCxt};
use crate::mpnlri::{MpReachNlri, MpUnreachNlri};
use crate::{CorruptKind, CorruptMessage, Error};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// BGP path attribute flags
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Flags(pub u8);

impl Flags {
    pub const OPTIONAL: u8 = 0x80;
    pub const TRANSITIVE: u8 = 0x40;
    pub const PARTIAL: u8 = 0x20;
    pub const EXTENDED: u8 = 0x10;

    /// Transitive, well-known, complete
    pub const WELL_KNOWN: Self = Self(Self::TRANSITIVE);
    /// Optional, non-transitive
    pub const OPTIONAL_NON_TRANSITIVE: Self = Self(Self::OPTIONAL);
    /// Optional, transitive, complete
    pub const OPTIONAL_TRANSITIVE: Self = Self(Self::OPTIONAL | Self::TRANSITIVE);

    /// Check if the attribute is optional
    #[must_use]
    pub const fn is_optional(self) -> bool {
        self.0 & Self::OPTIONAL != 0
    }

    /// Check if the attribute is transitive
    #[must_use]
    pub const fn is_transitive(self) -> bool {
        self.0 & Self::TRANSITIVE != 0
    }

    /// Check if the attribute is partial
    #[must_use]
    pub const fn is_partial(self) -> bool {
        self.0 & Self::PARTIAL != 0
    }

    /// Check if the attribute is extended length
    #[must_use]
    pub const fn is_extended_length(self) -> bool {
        self.0 & Self::EXTENDED != 0
    }

    /// The optional and transitive bits, which define the attribute category
    #[must_use]
    pub const fn category(self) -> Self {
        Self(self.0 & (Self::OPTIONAL | Self::TRANSITIVE))
    }
}

/// BGP path attribute type codes
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Primitive)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AttrType {
    Origin = 1,
    AsPath = 2,
    NextHop = 3,
    MultiExitDisc = 4,
    LocalPref = 5,
    AtomicAggregate = 6,
    Aggregator = 7,
    Communities = 8,
    OriginatorId = 9,
    ClusterList = 10,
    MpReachNlri = 14,
    MpUnreachNlri = 15,
    As4Path = 17,
    As4Aggregator = 18,
}

impl AttrType {
    /// The optional and transitive bits this attribute must carry
    #[must_use]
    pub const fn required_flags(self) -> Flags {
        match self {
            // Well-known
            Self::Origin
            | Self::AsPath
            | Self::NextHop
            | Self::LocalPref
            | Self::AtomicAggregate => Flags::WELL_KNOWN,
            // Optional non-transitive
            Self::MultiExitDisc
            | Self::OriginatorId
            | Self::ClusterList
            | Self::MpReachNlri
            | Self::MpUnreachNlri => Flags::OPTIONAL_NON_TRANSITIVE,
            // Optional transitive
            Self::Aggregator | Self::Communities | Self::As4Path | Self::As4Aggregator => {
                Flags::OPTIONAL_TRANSITIVE
            }
        }
    }

    /// Mandatory in every UPDATE carrying NLRI
    #[must_use]
    pub const fn is_mandatory(self) -> bool {
        matches!(self, Self::Origin | Self::AsPath | Self::NextHop)
    }
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Origin => "ORIGIN",
            Self::AsPath => "AS_PATH",
            Self::NextHop => "NEXT_HOP",
            Self::MultiExitDisc => "MULTI_EXIT_DISC",
            Self::LocalPref => "LOCAL_PREF",
            Self::AtomicAggregate => "ATOMIC_AGGREGATE",
            Self::Aggregator => "AGGREGATOR",
            Self::Communities => "COMMUNITY",
            Self::OriginatorId => "ORIGINATOR_ID",
            Self::ClusterList => "CLUSTER_LIST",
            Self::MpReachNlri => "MP_REACH_NLRI",
            Self::MpUnreachNlri => "MP_UNREACH_NLRI",
            Self::As4Path => "AS4_PATH",
            Self::As4Aggregator => "AS4_AGGREGATOR",
        })
    }
}

/// BGP origin
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Primitive)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Origin {
    Igp = 0,
    Egp = 1,
    Incomplete = 2,
}

impl Component for Origin {
    fn from_bytes(src: &mut Bytes) -> Result<Self, CorruptKind> {
        let value = src.try_get_u8()?;
        Self::from_u8(value).ok_or(CorruptKind::UnknownOriginValue(value))
    }

    fn to_bytes(&self, dst: &mut BytesMut) -> usize {
        dst.put_u8(*self as u8);
        self.encoded_len()
    }

    fn encoded_len(&self) -> usize {
        1
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Igp => "IGP",
            Self::Egp => "EGP",
            Self::Incomplete => "INCOMPLETE",
        })
    }
}

/// BGP aggregator (RFC 4271 Section 5.1.7, RFC 6793 Section 3)
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aggregator {
    pub asn: AsNumber,
    pub speaker: Ipv4Addr,
}

impl Aggregator {
    #[must_use]
    pub const fn wire_size(width: AsWidth) -> usize {
        width.octets() + 4
    }

    fn decode(src: &mut Bytes, width: AsWidth) -> Result<Self, CorruptKind> {
        let asn = match width {
            AsWidth::Two => AsNumber::from(src.try_get_u16()?),
            AsWidth::Four => AsNumber::from(src.try_get_u32()?),
        };
        let speaker = Ipv4Addr::from_bytes(src)?;
        Ok(Self { asn, speaker })
    }

    fn encode(&self, dst: &mut BytesMut, width: AsWidth) -> usize {
        match width {
            AsWidth::Two => dst.put_u16(self.asn.to_u16_or_trans()),
            AsWidth::Four => dst.put_u32(self.asn.value()),
        }
        self.speaker.to_bytes(dst);
        Self::wire_size(width)
    }
}

impl fmt::Display for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AS{} {}", self.asn, self.speaker)
    }
}

/// BGP communities (RFC 1997)
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Communities(pub Vec<u32>);

impl Communities {
    pub const NO_EXPORT: u32 = 0xffff_ff01;
    pub const NO_ADVERTISE: u32 = 0xffff_ff02;
    pub const NO_EXPORT_SUBCONFED: u32 = 0xffff_ff03;

    #[must_use]
    pub fn contains(&self, community: u32) -> bool {
        self.0.contains(&community)
    }

    /// Add a community unless it is already present
    pub fn insert(&mut self, community: u32) {
        if !self.contains(community) {
            self.0.push(community);
        }
    }
}

impl fmt::Display for Communities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, community) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match *community {
                Self::NO_EXPORT => f.write_str("NO_EXPORT")?,
                Self::NO_ADVERTISE => f.write_str("NO_ADVERTISE")?,
                Self::NO_EXPORT_SUBCONFED => f.write_str("NO_EXPORT_SUBCONFED")?,
                c => write!(f, "{}:{}", c >> 16, c & 0xffff)?,
            }
        }
        Ok(())
    }
}

/// Route reflection CLUSTER_LIST (RFC 4456 Section 8)
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClusterList(pub Vec<Ipv4Addr>);

impl ClusterList {
    /// Add the local cluster ID when reflecting a route
    pub fn prepend(&mut self, cluster_id: Ipv4Addr) {
        self.0.insert(0, cluster_id);
    }

    #[must_use]
    pub fn contains(&self, cluster_id: Ipv4Addr) -> bool {
        self.0.contains(&cluster_id)
    }
}

/// BGP path attribute data
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Data {
    Origin(Origin),
    AsPath(AsPath),
    /// BGP next hop (RFC 4271 Section 5.1.3); IPv6 is only kept in memory
    NextHop(IpAddr),
    MultiExitDisc(u32),
    LocalPref(u32),
    AtomicAggregate,
    Aggregator(Aggregator),
    Communities(Communities),
    OriginatorId(Ipv4Addr),
    ClusterList(ClusterList),
    MpReachNlri(MpReachNlri),
    MpUnreachNlri(MpUnreachNlri),
    As4Path(AsPath),
    As4Aggregator(Aggregator),
    /// Type code and payload of an attribute this crate does not know
    Unknown(u8, Bytes),
}

impl Data {
    #[must_use]
    pub const fn attr_type(&self) -> Option<AttrType> {
        Some(match self {
            Self::Origin(_) => AttrType::Origin,
            Self::AsPath(_) => AttrType::AsPath,
            Self::NextHop(_) => AttrType::NextHop,
            Self::MultiExitDisc(_) => AttrType::MultiExitDisc,
            Self::LocalPref(_) => AttrType::LocalPref,
            Self::AtomicAggregate => AttrType::AtomicAggregate,
            Self::Aggregator(_) => AttrType::Aggregator,
            Self::Communities(_) => AttrType::Communities,
            Self::OriginatorId(_) => AttrType::OriginatorId,
            Self::ClusterList(_) => AttrType::ClusterList,
            Self::MpReachNlri(_) => AttrType::MpReachNlri,
            Self::MpUnreachNlri(_) => AttrType::MpUnreachNlri,
            Self::As4Path(_) => AttrType::As4Path,
            Self::As4Aggregator(_) => AttrType::As4Aggregator,
            Self::Unknown(_, _) => return None,
        })
    }

    #[must_use]
    pub const fn type_code(&self) -> u8 {
        match (self.attr_type(), self) {
            (Some(attr_type), _) => attr_type as u8,
            (None, Self::Unknown(type_code, _)) => *type_code,
            // `attr_type` is only `None` for `Unknown`
            (None, _) => 0,
        }
    }

    /// Length of the payload when encoded for a peer
    fn payload_len(&self, cxt: &PeerCxt) -> usize {
        match self {
            Self::Origin(origin) => origin.encoded_len(),
            Self::AsPath(as_path) => as_path.wire_size(cxt.as_width()),
            Self::NextHop(next_hop) => next_hop.encoded_len(),
            Self::MultiExitDisc(_) | Self::LocalPref(_) | Self::OriginatorId(_) => 4,
            Self::AtomicAggregate => 0,
            Self::Aggregator(_) => Aggregator::wire_size(cxt.as_width()),
            Self::Communities(communities) => 4 * communities.0.len(),
            Self::ClusterList(cluster_list) => 4 * cluster_list.0.len(),
            Self::MpReachNlri(mp_reach_nlri) => mp_reach_nlri.encoded_len(),
            Self::MpUnreachNlri(mp_unreach_nlri) => mp_unreach_nlri.encoded_len(),
            Self::As4Path(as_path) => as_path.wire_size(AsWidth::Four),
            Self::As4Aggregator(_) => Aggregator::wire_size(AsWidth::Four),
            Self::Unknown(_, data) => data.len(),
        }
    }

    fn encode_payload(&self, dst: &mut BytesMut, cxt: &PeerCxt) -> usize {
        match self {
            Self::Origin(origin) => origin.to_bytes(dst),
            Self::AsPath(as_path) => as_path.encode(dst, cxt.as_width()),
            Self::NextHop(next_hop) => next_hop.to_bytes(dst),
            Self::MultiExitDisc(value) | Self::LocalPref(value) => value.to_bytes(dst),
            Self::AtomicAggregate => 0,
            Self::Aggregator(agg) => agg.encode(dst, cxt.as_width()),
            Self::Communities(communities) => {
                communities.0.iter().map(|c| c.to_bytes(dst)).sum()
            }
            Self::OriginatorId(id) => id.to_bytes(dst),
            Self::ClusterList(cluster_list) => {
                cluster_list.0.iter().map(|id| id.to_bytes(dst)).sum()
            }
            Self::MpReachNlri(mp_reach_nlri) => mp_reach_nlri.to_bytes(dst),
            Self::MpUnreachNlri(mp_unreach_nlri) => mp_unreach_nlri.to_bytes(dst),
            Self::As4Path(as_path) => as_path.encode(dst, AsWidth::Four),
            Self::As4Aggregator(agg) => agg.encode(dst, AsWidth::Four),
            Self::Unknown(_, data) => {
                dst.put_slice(data);
                data.len()
            }
        }
    }
}

/// Fail unless the payload has exactly `len` bytes
fn expect_len(src: &Bytes, len: usize, type_code: u8) -> Result<(), CorruptKind> {
    if src.remaining() == len {
        Ok(())
    } else {
        Err(CorruptKind::BadAttributeLength(type_code))
    }
}

/// Fail unless the payload is a list of 4-byte values
fn expect_multiple_of_4(src: &Bytes, type_code: u8) -> Result<(), CorruptKind> {
    if src.remaining() % 4 == 0 {
        Ok(())
    } else {
        Err(CorruptKind::BadAttributeLength(type_code))
    }
}

/// NEXT_HOP must be a usable unicast address
fn check_next_hop(next_hop: IpAddr) -> Result<(), CorruptKind> {
    let valid = match next_hop {
        IpAddr::V4(addr) => !(addr.is_unspecified() || addr.octets()[0] >= 224),
        IpAddr::V6(addr) => !(addr.is_unspecified() || addr.is_multicast()),
    };
    if valid {
        Ok(())
    } else {
        Err(CorruptKind::InvalidNextHop(next_hop))
    }
}

/// BGP path attribute
///
/// The flags always carry the optional and transitive bits defined for the
/// attribute type. The extended length bit is chosen on encode.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathAttribute {
    flags: Flags,
    data: Data,
}

impl PathAttribute {
    /// Create an attribute with the flags its type requires
    ///
    /// `Data::Unknown` gets optional transitive flags; use
    /// [`PathAttribute::unknown`] to choose them.
    #[must_use]
    pub fn new(data: Data) -> Self {
        let flags = data
            .attr_type()
            .map_or(Flags::OPTIONAL_TRANSITIVE, AttrType::required_flags);
        Self { flags, data }
    }

    /// An attribute of a type this crate does not interpret
    #[must_use]
    pub const fn unknown(flags: Flags, type_code: u8, data: Bytes) -> Self {
        Self {
            flags: Flags(flags.0 & !Flags::EXTENDED),
            data: Data::Unknown(type_code, data),
        }
    }

    #[must_use]
    pub const fn flags(&self) -> Flags {
        self.flags
    }

    #[must_use]
    pub const fn data(&self) -> &Data {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> Data {
        self.data
    }

    #[must_use]
    pub const fn type_code(&self) -> u8 {
        self.data.type_code()
    }

    #[must_use]
    pub const fn attr_type(&self) -> Option<AttrType> {
        self.data.attr_type()
    }

    /// Mark an optional transitive attribute as partial
    pub fn set_partial(&mut self) {
        if self.flags.is_optional() && self.flags.is_transitive() {
            self.flags.0 |= Flags::PARTIAL;
        }
    }

    /// Decode one attribute from the start of `buf`.
    ///
    /// Returns the attribute and the number of bytes it took.
    ///
    /// # Errors
    /// [`Error::CorruptMessage`] if the attribute is truncated, has the
    /// wrong flags or an invalid payload.
    pub fn create(buf: &[u8], cxt: &PeerCxt) -> Result<(Self, usize), Error> {
        let mut src = Bytes::copy_from_slice(buf);
        let attr = Self::from_bytes(&mut src, cxt)?;
        Ok((attr, buf.len() - src.len()))
    }

    /// Decode one attribute, advancing `src` past it.
    ///
    /// # Errors
    /// Returns the reason together with the raw bytes of the attribute.
    pub fn from_bytes(src: &mut Bytes, cxt: &PeerCxt) -> Result<Self, CorruptMessage> {
        let start = src.clone();
        let truncated = || CorruptMessage::new(CorruptKind::TruncatedAttribute, start.clone());
        if src.remaining() < 3 {
            return Err(truncated());
        }
        let flags = Flags(src.get_u8());
        let type_code = src.get_u8();
        let (header_len, len) = if flags.is_extended_length() {
            let len = src.try_get_u16().map_err(|_| truncated())?;
            (4, usize::from(len))
        } else {
            (3, usize::from(src.get_u8()))
        };
        if src.remaining() < len {
            return Err(truncated());
        }
        let raw = start.slice(..header_len + len);
        let mut payload = src.split_to(len);
        log::trace!("Decoding path attribute type {type_code} flags {:#04x} length {len}", flags.0);
        let data = Self::decode_payload(flags, type_code, &mut payload, cxt)
            .map_err(|kind| CorruptMessage::new(kind, raw))?;
        let mut stored = flags.0 & (Flags::OPTIONAL | Flags::TRANSITIVE | Flags::PARTIAL);
        if !(flags.is_optional() && flags.is_transitive()) {
            stored &= !Flags::PARTIAL;
        }
        Ok(Self {
            flags: Flags(stored),
            data,
        })
    }

    fn decode_payload(
        flags: Flags,
        type_code: u8,
        src: &mut Bytes,
        cxt: &PeerCxt,
    ) -> Result<Data, CorruptKind> {
        let Some(attr_type) = AttrType::from_u8(type_code) else {
            return Ok(Data::Unknown(type_code, std::mem::take(src)));
        };
        if flags.category() != attr_type.required_flags() {
            return Err(CorruptKind::BadFlags {
                attr_type: type_code,
                flags: flags.0,
            });
        }
        let data = match attr_type {
            AttrType::Origin => {
                expect_len(src, 1, type_code)?;
                Data::Origin(Origin::from_bytes(src)?)
            }
            AttrType::AsPath => Data::AsPath(AsPath::decode(src, cxt.as_width())?),
            AttrType::NextHop => {
                if src.remaining() != 4 && src.remaining() != 16 {
                    return Err(CorruptKind::BadAttributeLength(type_code));
                }
                let next_hop = IpAddr::from_bytes(src)?;
                check_next_hop(next_hop)?;
                Data::NextHop(next_hop)
            }
            AttrType::MultiExitDisc => {
                expect_len(src, 4, type_code)?;
                Data::MultiExitDisc(u32::from_bytes(src)?)
            }
            AttrType::LocalPref => {
                expect_len(src, 4, type_code)?;
                Data::LocalPref(u32::from_bytes(src)?)
            }
            AttrType::AtomicAggregate => {
                expect_len(src, 0, type_code)?;
                Data::AtomicAggregate
            }
            AttrType::Aggregator => {
                let width = cxt.as_width();
                expect_len(src, Aggregator::wire_size(width), type_code)?;
                Data::Aggregator(Aggregator::decode(src, width)?)
            }
            AttrType::Communities => {
                expect_multiple_of_4(src, type_code)?;
                let mut communities = Vec::with_capacity(src.remaining() / 4);
                while src.has_remaining() {
                    communities.push(u32::from_bytes(src)?);
                }
                Data::Communities(Communities(communities))
            }
            AttrType::OriginatorId => {
                expect_len(src, 4, type_code)?;
                Data::OriginatorId(Ipv4Addr::from_bytes(src)?)
            }
            AttrType::ClusterList => {
                expect_multiple_of_4(src, type_code)?;
                let mut ids = Vec::with_capacity(src.remaining() / 4);
                while src.has_remaining() {
                    ids.push(Ipv4Addr::from_bytes(src)?);
                }
                Data::ClusterList(ClusterList(ids))
            }
            AttrType::MpReachNlri => Data::MpReachNlri(MpReachNlri::from_bytes(src)?),
            AttrType::MpUnreachNlri => Data::MpUnreachNlri(MpUnreachNlri::from_bytes(src)?),
            AttrType::As4Path => {
                let mut as_path = AsPath::decode(src, AsWidth::Four)?;
                // RFC 6793 Section 6: confederation segments are not allowed here
                as_path.remove_confed_segments();
                Data::As4Path(as_path)
            }
            AttrType::As4Aggregator => {
                expect_len(src, Aggregator::wire_size(AsWidth::Four), type_code)?;
                Data::As4Aggregator(Aggregator::decode(src, AsWidth::Four)?)
            }
        };
        Ok(data)
    }

    /// Encode the attribute for a peer.
    ///
    /// The payload is always generated from the typed value. Returns the
    /// number of bytes written.
    ///
    /// # Panics
    /// If the payload is longer than 65535 bytes for this peer. Decoded
    /// attribute lists are checked against that on reception.
    pub fn encode(&self, dst: &mut BytesMut, cxt: &PeerCxt) -> usize {
        let payload_len = self.data.payload_len(cxt);
        let extended = payload_len > 255;
        let mut flags = self.flags.0 & !Flags::EXTENDED;
        if extended {
            flags |= Flags::EXTENDED;
        }
        dst.put_u8(flags);
        dst.put_u8(self.type_code());
        let header_len = if extended {
            dst.put_u16(u16::try_from(payload_len).expect("Path attribute length overflow"));
            4
        } else {
            dst.put_u8(u8::try_from(payload_len).expect("Path attribute length overflow"));
            3
        };
        let written = self.data.encode_payload(dst, cxt);
        debug_assert_eq!(written, payload_len);
        header_len + written
    }

    /// Encode with 4-byte AS numbers and a four-octet length field
    ///
    /// Not a wire format: the result only identifies the attribute, so it
    /// must not be limited by the two-octet length of the wire header.
    pub fn encode_canonical(&self, dst: &mut BytesMut) -> usize {
        let cxt = PeerCxt::canonical();
        let payload_len = self.data.payload_len(&cxt);
        dst.put_u8(self.flags.0 & !Flags::EXTENDED);
        dst.put_u8(self.type_code());
        dst.put_u32(u32::try_from(payload_len).expect("Path attribute length overflow"));
        let written = self.data.encode_payload(dst, &cxt);
        debug_assert_eq!(written, payload_len);
        6 + written
    }

    /// Find out the encoded length for a peer without encoding
    #[must_use]
    pub fn encoded_len(&self, cxt: &PeerCxt) -> usize {
        let payload_len = self.data.payload_len(cxt);
        payload_len + if payload_len > 255 { 4 } else { 3 }
    }

    /// Sort NEXT_HOP before every other type
    fn sort_key(&self) -> (bool, u8) {
        (self.attr_type() != Some(AttrType::NextHop), self.type_code())
    }
}

impl From<Data> for PathAttribute {
    fn from(data: Data) -> Self {
        Self::new(data)
    }
}

/// NEXT_HOP first, then by type code, then by value
impl Ord for PathAttribute {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.data.cmp(&other.data))
            .then_with(|| self.flags.cmp(&other.flags))
    }
}

impl PartialOrd for PathAttribute {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PathAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(attr_type) = self.attr_type() {
            write!(f, "{attr_type}")?;
        }
        match &self.data {
            Data::Origin(origin) => write!(f, " {origin}"),
            Data::AsPath(as_path) | Data::As4Path(as_path) => write!(f, " {as_path}"),
            Data::NextHop(next_hop) => write!(f, " {next_hop}"),
            Data::MultiExitDisc(value) | Data::LocalPref(value) => write!(f, " {value}"),
            Data::AtomicAggregate => Ok(()),
            Data::Aggregator(agg) | Data::As4Aggregator(agg) => write!(f, " {agg}"),
            Data::Communities(communities) => write!(f, " {communities}"),
            Data::OriginatorId(id) => write!(f, " {id}"),
            Data::ClusterList(cluster_list) => {
                for id in &cluster_list.0 {
                    write!(f, " {id}")?;
                }
                Ok(())
            }
            Data::MpReachNlri(mp_reach_nlri) => write!(f, " {mp_reach_nlri}"),
            Data::MpUnreachNlri(mp_unreach_nlri) => write!(f, " {mp_unreach_nlri}"),
            Data::Unknown(type_code, data) => write!(
                f,
                "UNKNOWN type {type_code} flags {:#04x} length {}",
                self.flags.0,
                data.len()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aspath::{AsSegment, SegmentKind};
    use crate::capability::{Afi, Safi};
    use crate::hex_to_bytes;
    use crate::mpnlri::MpNextHop;
    use crate::route::Routes;
    use crate::UpdateMessageErrorSubcode;

    const LEGACY: PeerCxt = PeerCxt::legacy();
    const FOUR: PeerCxt = PeerCxt::four_byte();

    fn decode(hex: &str, cxt: &PeerCxt) -> Result<PathAttribute, CorruptMessage> {
        PathAttribute::from_bytes(&mut hex_to_bytes(hex), cxt)
    }

    fn encode(attr: &PathAttribute, cxt: &PeerCxt) -> Bytes {
        let mut buf = BytesMut::new();
        let len = attr.encode(&mut buf, cxt);
        assert_eq!(len, buf.len());
        assert_eq!(len, attr.encoded_len(cxt));
        buf.freeze()
    }

    fn kind_of(hex: &str, cxt: &PeerCxt) -> CorruptKind {
        decode(hex, cxt).unwrap_err().kind
    }

    #[test]
    fn test_origin() {
        let attr = PathAttribute::new(Data::Origin(Origin::Igp));
        let bytes = encode(&attr, &FOUR);
        assert_eq!(bytes, hex_to_bytes("40 01 01 00"));
        let decoded = decode("40 01 01 00", &FOUR).unwrap();
        assert_eq!(decoded.data(), &Data::Origin(Origin::Igp));
        assert_eq!(decoded, attr);
        assert_eq!(decoded.to_string(), "ORIGIN IGP");
    }

    #[test]
    fn test_create_reports_consumed() {
        let buf = hex_to_bytes("40 01 01 02 40 03 04 ac1706a5");
        let (attr, used) = PathAttribute::create(&buf, &FOUR).unwrap();
        assert_eq!(used, 4);
        assert_eq!(attr.data(), &Data::Origin(Origin::Incomplete));
        let (attr, used) = PathAttribute::create(&buf[used..], &FOUR).unwrap();
        assert_eq!(used, 7);
        assert_eq!(
            attr.data(),
            &Data::NextHop(IpAddr::V4(Ipv4Addr::new(172, 23, 6, 165)))
        );
    }

    #[test]
    fn test_as2_aspath() {
        let attr = decode("40 0204 0201 fd7d", &LEGACY).unwrap();
        assert_eq!(
            attr,
            PathAttribute::new(Data::AsPath(AsPath::from_sequence([0xfd7d_u32])))
        );
        assert_eq!(encode(&attr, &LEGACY), hex_to_bytes("40 0204 0201 fd7d"));
        assert_eq!(
            encode(&attr, &FOUR),
            hex_to_bytes("40 0206 0201 0000fd7d")
        );
    }

    #[test]
    fn test_as4_aspath() {
        let attr = decode("40 02 0e 0203 fcde39d1 fcde3880 fcde3122", &FOUR).unwrap();
        let Data::AsPath(as_path) = attr.data() else {
            panic!("not an AS path: {attr:?}");
        };
        assert_eq!(as_path.path_length(), 3);
        assert_eq!(
            encode(&attr, &LEGACY),
            hex_to_bytes("40 02 08 0203 5ba0 5ba0 5ba0")
        );
    }

    #[test]
    fn test_as4_path_drops_confed() {
        let attr = decode("c0 11 10 0301 0000fde9 0202 fcde39d1 fcde3880", &LEGACY).unwrap();
        let Data::As4Path(as_path) = attr.data() else {
            panic!("not an AS4 path: {attr:?}");
        };
        assert_eq!(as_path.num_segments(), 1);
        assert_eq!(as_path.path_length(), 2);
    }

    #[test]
    fn test_bad_flags() {
        assert_eq!(
            kind_of("c0 01 01 00", &FOUR),
            CorruptKind::BadFlags {
                attr_type: 1,
                flags: 0xc0
            }
        );
        assert_eq!(
            kind_of("c0 04 04 00000064", &FOUR),
            CorruptKind::BadFlags {
                attr_type: 4,
                flags: 0xc0
            }
        );
        assert_eq!(
            kind_of("40 08 04 fbff0004", &FOUR),
            CorruptKind::BadFlags {
                attr_type: 8,
                flags: 0x40
            }
        );
        let err = decode("80 02 04 0201 fd7d", &LEGACY).unwrap_err();
        assert_eq!(err.data, hex_to_bytes("80 02 04 0201 fd7d"));
        assert_eq!(
            err.notification().error_subcode,
            UpdateMessageErrorSubcode::AttributeFlagsError as u8
        );
    }

    #[test]
    fn test_payload_errors() {
        assert_eq!(kind_of("40 01 01 03", &FOUR), CorruptKind::UnknownOriginValue(3));
        assert_eq!(kind_of("40 01 02 0000", &FOUR), CorruptKind::BadAttributeLength(1));
        assert_eq!(kind_of("40 01 05 00", &FOUR), CorruptKind::TruncatedAttribute);
        assert_eq!(kind_of("40 01", &FOUR), CorruptKind::TruncatedAttribute);
        assert_eq!(kind_of("50 01 00", &FOUR), CorruptKind::TruncatedAttribute);
        assert_eq!(kind_of("40 02 04 0501 fd7d", &LEGACY), CorruptKind::UnknownSegmentType(5));
        assert_eq!(kind_of("40 02 04 0202 fd7d", &LEGACY), CorruptKind::MalformedAsPath);
        assert_eq!(kind_of("40 03 03 0a0000", &FOUR), CorruptKind::BadAttributeLength(3));
        assert_eq!(kind_of("40 05 02 0064", &FOUR), CorruptKind::BadAttributeLength(5));
        assert_eq!(kind_of("40 06 01 00", &FOUR), CorruptKind::BadAttributeLength(6));
        assert_eq!(kind_of("c0 07 06 fde9 c0000201", &FOUR), CorruptKind::BadAttributeLength(7));
        assert_eq!(kind_of("c0 08 03 000001", &FOUR), CorruptKind::BadAttributeLength(8));
        assert_eq!(kind_of("80 0a 06 0a000001 0a00", &FOUR), CorruptKind::BadAttributeLength(10));
    }

    #[test]
    fn test_invalid_next_hop() {
        for (hex, addr) in [
            ("40 03 04 00000000", "0.0.0.0"),
            ("40 03 04 e0000001", "224.0.0.1"),
            ("40 03 04 ffffffff", "255.255.255.255"),
            ("40 03 10 ff020000000000000000000000000001", "ff02::1"),
        ] {
            let err = decode(hex, &FOUR).unwrap_err();
            assert_eq!(
                err.kind,
                CorruptKind::InvalidNextHop(addr.parse().unwrap())
            );
            assert_eq!(err.data, hex_to_bytes(hex));
        }
    }

    #[test]
    fn test_next_hop_v6_in_memory() {
        let attr = PathAttribute::new(Data::NextHop("2001:db8::1".parse().unwrap()));
        let bytes = encode(&attr, &FOUR);
        assert_eq!(bytes.len(), 3 + 16);
        assert_eq!(PathAttribute::from_bytes(&mut bytes.clone(), &FOUR).unwrap(), attr);
    }

    #[test]
    fn test_communities() {
        let attr = PathAttribute::new(Data::Communities(Communities(vec![57, 58, 59])));
        let bytes = encode(&attr, &FOUR);
        assert_eq!(bytes.len(), 15);
        assert_eq!(bytes[0], 0xc0);
        assert_eq!(bytes, hex_to_bytes("c0 08 0c 00000039 0000003a 0000003b"));

        let attr = decode("c0 08 0c fbff0004 fbff0018 ffffff01", &FOUR).unwrap();
        let Data::Communities(communities) = attr.data() else {
            panic!("not communities: {attr:?}");
        };
        assert!(communities.contains(Communities::NO_EXPORT));
        assert_eq!(attr.to_string(), "COMMUNITY 64511:4 64511:24 NO_EXPORT");
    }

    #[test]
    fn test_aggregator_width() {
        let agg = Aggregator {
            asn: AsNumber::new(4_200_000_000),
            speaker: Ipv4Addr::new(192, 0, 2, 1),
        };
        let attr = PathAttribute::new(Data::Aggregator(agg));
        assert_eq!(
            encode(&attr, &LEGACY),
            hex_to_bytes("c0 07 06 5ba0 c0000201")
        );
        assert_eq!(
            encode(&attr, &FOUR),
            hex_to_bytes("c0 07 08 fa56ea00 c0000201")
        );
        let decoded = decode("c0 07 08 fa56ea00 c0000201", &FOUR).unwrap();
        assert_eq!(decoded, attr);
        let as4 = decode("c0 12 08 fa56ea00 c0000201", &LEGACY).unwrap();
        assert_eq!(as4.data(), &Data::As4Aggregator(agg));
        assert_eq!(as4.to_string(), "AS4_AGGREGATOR AS4200000000 192.0.2.1");
    }

    #[test]
    fn test_unknown_preserved() {
        let hex = "e0 20 18
            fcde3880 00000064 00000035
            fcde3880 00000065 0000040c";
        let attr = decode(hex, &FOUR).unwrap();
        assert_eq!(attr.type_code(), 32);
        assert_eq!(attr.attr_type(), None);
        assert!(attr.flags().is_partial());
        assert_eq!(encode(&attr, &FOUR), hex_to_bytes(hex));
        assert_eq!(attr.to_string(), "UNKNOWN type 32 flags 0xe0 length 24");
    }

    #[test]
    fn test_extended_length() {
        let attr = PathAttribute::unknown(Flags::OPTIONAL_TRANSITIVE, 99, Bytes::from(vec![7; 300]));
        let bytes = encode(&attr, &FOUR);
        assert_eq!(&bytes[..4], &[0xd0, 99, 0x01, 0x2c]);
        let decoded = decode_bytes(bytes);
        assert_eq!(decoded, attr);
        assert!(!decoded.flags().is_extended_length());

        // Extended length on the wire is not kept for short payloads
        let attr = decode("90 0e 0009 0001 01 04 c0000201 00", &FOUR).unwrap();
        assert_eq!(attr.flags(), Flags::OPTIONAL_NON_TRANSITIVE);
        assert_eq!(
            encode(&attr, &FOUR),
            hex_to_bytes("80 0e 09 0001 01 04 c0000201 00")
        );
    }

    #[test]
    fn test_canonical_encoding() {
        let attr = decode("40 02 04 0201 fd7d", &LEGACY).unwrap();
        let mut buf = BytesMut::new();
        assert_eq!(attr.encode_canonical(&mut buf), 12);
        assert_eq!(buf.freeze(), hex_to_bytes("40 02 00000006 0201 0000fd7d"));

        // Longer than any wire attribute can be
        let path = AsPath::from_sequence((0..17_000_u32).map(|i| 4_200_000_000 + i));
        let attr = PathAttribute::new(Data::AsPath(path));
        let mut buf = BytesMut::new();
        let len = attr.encode_canonical(&mut buf);
        assert_eq!(len, buf.len());
        assert_eq!(&buf[..6], &[0x40, 0x02, 0x00, 0x01, 0x0a, 0x26]);
    }

    fn decode_bytes(mut bytes: Bytes) -> PathAttribute {
        PathAttribute::from_bytes(&mut bytes, &FOUR).unwrap()
    }

    #[test]
    fn test_partial_only_for_optional_transitive() {
        let attr = decode("60 01 01 00", &FOUR).unwrap();
        assert_eq!(attr.flags(), Flags::WELL_KNOWN);
        let attr = decode("e0 08 04 fbff0004", &FOUR).unwrap();
        assert!(attr.flags().is_partial());
        let mut attr = PathAttribute::new(Data::MultiExitDisc(5));
        attr.set_partial();
        assert!(!attr.flags().is_partial());
    }

    #[test]
    fn test_round_trip() {
        let mut as_path: AsPath = "65001,{65002,65003}".parse().unwrap();
        as_path.prepend_segment(AsSegment::with_members(SegmentKind::ConfedSequence, [65100_u32]));
        let attrs = [
            Data::Origin(Origin::Egp),
            Data::AsPath(as_path),
            Data::NextHop(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 254))),
            Data::MultiExitDisc(10),
            Data::LocalPref(200),
            Data::AtomicAggregate,
            Data::OriginatorId(Ipv4Addr::new(10, 0, 0, 1)),
            Data::ClusterList(ClusterList(vec![Ipv4Addr::new(10, 0, 0, 2)])),
            Data::MpReachNlri(MpReachNlri {
                afi: Afi::Ipv6,
                safi: Safi::Unicast,
                next_hop: MpNextHop::Single("2001:db8::1".parse().unwrap()),
                nlri: Routes::from([("2001:db8:1::".parse::<std::net::Ipv6Addr>().unwrap(), 48_u8)]),
            }),
            Data::MpUnreachNlri(MpUnreachNlri {
                afi: Afi::Ipv4,
                safi: Safi::Unicast,
                withdrawn_routes: Routes::from([(Ipv4Addr::new(10, 1, 0, 0), 16_u8)]),
            }),
            Data::As4Path(AsPath::from_sequence([4_200_000_000_u32])),
        ];
        for data in attrs {
            let attr = PathAttribute::new(data);
            for cxt in [LEGACY, FOUR] {
                let decoded = decode_bytes_with(encode(&attr, &cxt), &cxt);
                assert_eq!(decoded, attr, "{attr}");
            }
        }
    }

    fn decode_bytes_with(mut bytes: Bytes, cxt: &PeerCxt) -> PathAttribute {
        PathAttribute::from_bytes(&mut bytes, cxt).unwrap()
    }

    #[test]
    fn test_next_hop_sorts_first() {
        let origin = PathAttribute::new(Data::Origin(Origin::Igp));
        let next_hop = PathAttribute::new(Data::NextHop(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))));
        let med = PathAttribute::new(Data::MultiExitDisc(1));
        let mut sorted = vec![med.clone(), origin.clone(), next_hop.clone()];
        sorted.sort();
        assert_eq!(sorted, vec![next_hop, origin, med]);
        assert!(
            PathAttribute::new(Data::MultiExitDisc(1)) < PathAttribute::new(Data::MultiExitDisc(2))
        );
    }
}
