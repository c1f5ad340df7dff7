//! The path attributes of one route
//!
//! A [`PathAttributeList`] holds at most one attribute per type. Its
//! canonical encoding (every attribute in type order, 4-byte AS numbers) is
//! what equality, hashing and interning are based on.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::as4;
use crate::asn::AsNumber;
use crate::aspath::AsPath;
use crate::attribute::{Aggregator, AttrType, ClusterList, Communities, Data, Origin, PathAttribute};
use crate::endec::PeerCxt;
use crate::mpnlri::{MpReachNlri, MpUnreachNlri};
use crate::{CorruptKind, CorruptMessage};
use bytes::{Buf, Bytes, BytesMut};
use md5::{Digest, Md5};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, Ipv4Addr};

/// BGP path attributes of a route
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathAttributeList {
    attributes: BTreeMap<u8, PathAttribute>,
    /// Cached canonical encoding, cleared on every change
    #[cfg_attr(feature = "impl-serde", serde(skip))]
    canonical: Option<Bytes>,
    /// Cached MD5 of `canonical`
    #[cfg_attr(feature = "impl-serde", serde(skip))]
    digest: Option<[u8; 16]>,
}

fn md5_of(bytes: &[u8]) -> [u8; 16] {
    let mut digest = [0; 16];
    digest.copy_from_slice(&Md5::digest(bytes));
    digest
}

impl PathAttributeList {
    /// Create a list with the three mandatory attributes
    #[must_use]
    pub fn new(next_hop: IpAddr, as_path: AsPath, origin: Origin) -> Self {
        let mut list = Self::default();
        list.add(PathAttribute::new(Data::NextHop(next_hop)));
        list.add(PathAttribute::new(Data::AsPath(as_path)));
        list.add(PathAttribute::new(Data::Origin(origin)));
        list
    }

    /// Add an attribute, replacing any attribute of the same type
    pub fn add(&mut self, attr: PathAttribute) {
        self.replace(attr);
    }

    /// Add an attribute and return the one of the same type it replaced
    pub fn replace(&mut self, attr: PathAttribute) -> Option<PathAttribute> {
        self.invalidate();
        self.attributes.insert(attr.type_code(), attr)
    }

    pub fn remove(&mut self, type_code: u8) -> Option<PathAttribute> {
        let removed = self.attributes.remove(&type_code);
        if removed.is_some() {
            self.invalidate();
        }
        removed
    }

    fn invalidate(&mut self) {
        self.canonical = None;
        self.digest = None;
    }

    #[must_use]
    pub fn get(&self, type_code: u8) -> Option<&PathAttribute> {
        self.attributes.get(&type_code)
    }

    #[must_use]
    pub fn contains(&self, type_code: u8) -> bool {
        self.attributes.contains_key(&type_code)
    }

    /// Iterate in type order
    pub fn iter(&self) -> impl Iterator<Item = &PathAttribute> + '_ {
        self.attributes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    fn data_of(&self, attr_type: AttrType) -> Option<&Data> {
        self.get(attr_type as u8).map(PathAttribute::data)
    }

    #[must_use]
    pub fn next_hop(&self) -> Option<IpAddr> {
        match self.data_of(AttrType::NextHop) {
            Some(Data::NextHop(next_hop)) => Some(*next_hop),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_path(&self) -> Option<&AsPath> {
        match self.data_of(AttrType::AsPath) {
            Some(Data::AsPath(as_path)) => Some(as_path),
            _ => None,
        }
    }

    #[must_use]
    pub fn origin(&self) -> Option<Origin> {
        match self.data_of(AttrType::Origin) {
            Some(Data::Origin(origin)) => Some(*origin),
            _ => None,
        }
    }

    #[must_use]
    pub fn med(&self) -> Option<u32> {
        match self.data_of(AttrType::MultiExitDisc) {
            Some(Data::MultiExitDisc(med)) => Some(*med),
            _ => None,
        }
    }

    #[must_use]
    pub fn local_pref(&self) -> Option<u32> {
        match self.data_of(AttrType::LocalPref) {
            Some(Data::LocalPref(local_pref)) => Some(*local_pref),
            _ => None,
        }
    }

    #[must_use]
    pub fn atomic_aggregate(&self) -> bool {
        self.contains(AttrType::AtomicAggregate as u8)
    }

    #[must_use]
    pub fn aggregator(&self) -> Option<&Aggregator> {
        match self.data_of(AttrType::Aggregator) {
            Some(Data::Aggregator(agg)) => Some(agg),
            _ => None,
        }
    }

    #[must_use]
    pub fn communities(&self) -> Option<&Communities> {
        match self.data_of(AttrType::Communities) {
            Some(Data::Communities(communities)) => Some(communities),
            _ => None,
        }
    }

    #[must_use]
    pub fn originator_id(&self) -> Option<Ipv4Addr> {
        match self.data_of(AttrType::OriginatorId) {
            Some(Data::OriginatorId(id)) => Some(*id),
            _ => None,
        }
    }

    #[must_use]
    pub fn cluster_list(&self) -> Option<&ClusterList> {
        match self.data_of(AttrType::ClusterList) {
            Some(Data::ClusterList(cluster_list)) => Some(cluster_list),
            _ => None,
        }
    }

    #[must_use]
    pub fn mp_reach(&self) -> Option<&MpReachNlri> {
        match self.data_of(AttrType::MpReachNlri) {
            Some(Data::MpReachNlri(mp_reach_nlri)) => Some(mp_reach_nlri),
            _ => None,
        }
    }

    #[must_use]
    pub fn mp_unreach(&self) -> Option<&MpUnreachNlri> {
        match self.data_of(AttrType::MpUnreachNlri) {
            Some(Data::MpUnreachNlri(mp_unreach_nlri)) => Some(mp_unreach_nlri),
            _ => None,
        }
    }

    #[must_use]
    pub fn as4_path(&self) -> Option<&AsPath> {
        match self.data_of(AttrType::As4Path) {
            Some(Data::As4Path(as_path)) => Some(as_path),
            _ => None,
        }
    }

    #[must_use]
    pub fn as4_aggregator(&self) -> Option<&Aggregator> {
        match self.data_of(AttrType::As4Aggregator) {
            Some(Data::As4Aggregator(agg)) => Some(agg),
            _ => None,
        }
    }

    /// Check if NEXT_HOP, AS_PATH and ORIGIN are all present
    #[must_use]
    pub fn complete(&self) -> bool {
        self.next_hop().is_some() && self.as_path().is_some() && self.origin().is_some()
    }

    /// Check the well-known mandatory attributes of a received UPDATE.
    ///
    /// NEXT_HOP is only required with IPv4 NLRI in the UPDATE itself, and
    /// nothing is required of an UPDATE that only withdraws routes.
    ///
    /// # Errors
    /// `MissingWellKnown` with the missing type code as data.
    pub fn check_mandatory(&self, has_nlri: bool) -> Result<(), CorruptMessage> {
        let required: &[AttrType] = if has_nlri {
            &[AttrType::Origin, AttrType::AsPath, AttrType::NextHop]
        } else if self.mp_reach().is_some() {
            &[AttrType::Origin, AttrType::AsPath]
        } else {
            &[]
        };
        for attr_type in required {
            let type_code = *attr_type as u8;
            if !self.contains(type_code) {
                return Err(CorruptMessage::new(
                    CorruptKind::MissingWellKnown(type_code),
                    Bytes::copy_from_slice(&[type_code]),
                ));
            }
        }
        Ok(())
    }

    /// Decode a whole path attribute block received from a peer.
    ///
    /// Unknown optional attributes are dropped if non-transitive and marked
    /// partial if transitive. AS4_PATH and AS4_AGGREGATOR are folded into
    /// AS_PATH and AGGREGATOR (RFC 6793 Section 4.2.3).
    ///
    /// # Errors
    /// The first attribute that fails to decode, a repeated attribute type,
    /// an unrecognized well-known attribute, or `MalformedAsPath` if the
    /// list would not fit in an UPDATE for a 4-byte peer.
    pub fn decode(src: &mut Bytes, cxt: &PeerCxt) -> Result<Self, CorruptMessage> {
        let mut list = Self::default();
        let mut seen = BTreeSet::new();
        while src.has_remaining() {
            let start = src.clone();
            let mut attr = PathAttribute::from_bytes(src, cxt)?;
            let type_code = attr.type_code();
            if !seen.insert(type_code) {
                return Err(CorruptMessage::bare(CorruptKind::MalformedAttributeList));
            }
            if attr.attr_type().is_none() {
                if !attr.flags().is_optional() {
                    let raw = start.slice(..start.len() - src.len());
                    return Err(CorruptMessage::new(
                        CorruptKind::UnrecognizedWellKnown(type_code),
                        raw,
                    ));
                }
                if !attr.flags().is_transitive() {
                    log::debug!("Dropping unknown non-transitive attribute type {type_code}");
                    continue;
                }
                attr.set_partial();
            }
            list.attributes.insert(type_code, attr);
        }
        list.fold_as4_attributes(cxt);
        list.check_encodable()?;
        Ok(list)
    }

    /// Make sure the list can be sent to peers of either AS width
    ///
    /// An AS_PATH from a legacy peer doubles in size with 4-byte AS numbers.
    fn check_encodable(&self) -> Result<(), CorruptMessage> {
        for cxt in [PeerCxt::legacy(), PeerCxt::four_byte()] {
            let total = self.encoded_len(&cxt);
            if total > usize::from(u16::MAX) {
                log::debug!("Path attributes need {total} bytes for {cxt:?}");
                return Err(CorruptMessage::bare(CorruptKind::MalformedAsPath));
            }
        }
        Ok(())
    }

    fn fold_as4_attributes(&mut self, cxt: &PeerCxt) {
        let as4_path = self.remove(AttrType::As4Path as u8);
        let as4_aggregator = self.remove(AttrType::As4Aggregator as u8);
        if cxt.four_byte_asn {
            if as4_path.is_some() || as4_aggregator.is_some() {
                log::debug!("Discarding AS4 attributes received from a 4-byte AS peer");
            }
            return;
        }
        if let Some(Data::As4Aggregator(as4_agg)) = as4_aggregator.map(PathAttribute::into_data) {
            match self.aggregator() {
                Some(agg) if agg.asn == AsNumber::TRANS => {
                    self.add(PathAttribute::new(Data::Aggregator(as4_agg)));
                }
                Some(agg) => {
                    log::debug!(
                        "AGGREGATOR {agg} does not carry AS_TRANS, ignoring AS4_AGGREGATOR and AS4_PATH"
                    );
                    return;
                }
                None => log::debug!("Ignoring AS4_AGGREGATOR without AGGREGATOR"),
            }
        }
        if let Some(Data::As4Path(as4_path)) = as4_path.map(PathAttribute::into_data) {
            if let Some(as_path) = self.as_path() {
                let merged = as4::merge(&as4_path, as_path);
                log::trace!("Merged AS4_PATH {as4_path} and AS_PATH {as_path} into {merged}");
                self.add(PathAttribute::new(Data::AsPath(merged)));
            }
        }
    }

    /// The attributes sent to a peer, in type order
    fn wire_attributes(&self, cxt: &PeerCxt) -> Vec<Cow<'_, PathAttribute>> {
        let mut attrs: Vec<Cow<'_, PathAttribute>> = self
            .iter()
            .filter(|attr| {
                !matches!(
                    attr.data(),
                    // IPv6 next hops travel in MP_REACH_NLRI
                    Data::NextHop(IpAddr::V6(_)) | Data::As4Path(_) | Data::As4Aggregator(_)
                )
            })
            .map(Cow::Borrowed)
            .collect();
        if !cxt.four_byte_asn {
            if let Some(as_path) = self.as_path().filter(|p| !p.two_byte_compatible()) {
                let mut as4_path = as_path.clone();
                as4_path.remove_confed_segments();
                if !as4_path.is_empty() {
                    attrs.push(Cow::Owned(PathAttribute::new(Data::As4Path(as4_path))));
                }
            }
            if let Some(agg) = self.aggregator().filter(|agg| !agg.asn.is_16bit()) {
                attrs.push(Cow::Owned(PathAttribute::new(Data::As4Aggregator(*agg))));
            }
        }
        attrs.sort_by_key(|attr| attr.type_code());
        attrs
    }

    /// Encode the attributes for a peer. Returns the number of bytes written.
    ///
    /// # Panics
    /// If an attribute does not fit in its length field. Lists returned by
    /// [`decode`](Self::decode) always fit.
    pub fn encode(&self, dst: &mut BytesMut, cxt: &PeerCxt) -> usize {
        self.wire_attributes(cxt)
            .iter()
            .map(|attr| attr.encode(dst, cxt))
            .sum()
    }

    #[must_use]
    pub fn encoded_len(&self, cxt: &PeerCxt) -> usize {
        self.wire_attributes(cxt)
            .iter()
            .map(|attr| attr.encoded_len(cxt))
            .sum()
    }

    /// Encode every attribute in type order with 4-byte AS numbers and
    /// four-octet lengths
    #[must_use]
    pub fn encode_canonical(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for attr in self.iter() {
            attr.encode_canonical(&mut buf);
        }
        buf.freeze()
    }

    /// Compute and cache the canonical encoding and its digest
    pub fn canonicalize(&mut self) {
        if self.canonical.is_none() {
            let canonical = self.encode_canonical();
            self.digest = Some(md5_of(&canonical));
            self.canonical = Some(canonical);
        }
    }

    #[must_use]
    pub const fn is_canonicalized(&self) -> bool {
        self.canonical.is_some()
    }

    /// The canonical encoding, from the cache if [`canonicalize`] was called
    ///
    /// [`canonicalize`]: Self::canonicalize
    #[must_use]
    pub fn canonical_bytes(&self) -> Bytes {
        self.canonical
            .clone()
            .unwrap_or_else(|| self.encode_canonical())
    }

    /// MD5 of the canonical encoding
    #[must_use]
    pub fn content_hash(&self) -> [u8; 16] {
        self.digest
            .unwrap_or_else(|| md5_of(&self.canonical_bytes()))
    }

    /// Feed the canonical encoding into an MD5 context
    pub fn add_hash(&self, ctx: &mut Md5) {
        ctx.update(self.canonical_bytes());
    }
}

/// Compares digests, then the canonical bytes
impl PartialEq for PathAttributeList {
    fn eq(&self, other: &Self) -> bool {
        self.content_hash() == other.content_hash()
            && self.canonical_bytes() == other.canonical_bytes()
    }
}

impl Eq for PathAttributeList {}

impl Hash for PathAttributeList {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_bytes().hash(state);
    }
}

/// Groups lists by next hop, then compares the canonical encodings
impl Ord for PathAttributeList {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.next_hop()
            .cmp(&other.next_hop())
            .then_with(|| self.canonical_bytes().cmp(&other.canonical_bytes()))
    }
}

impl PartialOrd for PathAttributeList {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PathAttributeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attr) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{attr}")?;
        }
        Ok(())
    }
}

impl FromIterator<PathAttribute> for PathAttributeList {
    fn from_iter<T: IntoIterator<Item = PathAttribute>>(iter: T) -> Self {
        let mut list = Self::default();
        for attr in iter {
            list.add(attr);
        }
        list
    }
}
