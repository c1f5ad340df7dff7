//! BGP AS path (RFC 4271 Section 5.1.2, RFC 5065, RFC 6793 Section 4)

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::asn::AsNumber;
use crate::endec::AsWidth;
use crate::{CorruptKind, Error};
use bytes::{Buf, BufMut, Bytes};
use enum_primitive_derive::Primitive;
use num_traits::FromPrimitive;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Maximum number of members in one segment on the wire
const MAX_SEGMENT_MEMBERS: usize = 255;

/// BGP AS path segment type
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Primitive)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum SegmentKind {
    Set = 1,
    Sequence = 2,
    ConfedSequence = 3,
    ConfedSet = 4,
}

impl SegmentKind {
    /// Unordered kinds count as one hop
    #[must_use]
    pub const fn is_set(self) -> bool {
        matches!(self, Self::Set | Self::ConfedSet)
    }

    #[must_use]
    pub const fn is_confed(self) -> bool {
        matches!(self, Self::ConfedSequence | Self::ConfedSet)
    }

    const fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            Self::Set => ("{", "}"),
            Self::Sequence => ("", ""),
            Self::ConfedSequence => ("(", ")"),
            Self::ConfedSet => ("[", "]"),
        }
    }
}

/// BGP AS path segment
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AsSegment {
    pub kind: SegmentKind,
    pub members: VecDeque<AsNumber>,
}

impl AsSegment {
    /// Create an empty segment
    #[must_use]
    pub const fn new(kind: SegmentKind) -> Self {
        Self {
            kind,
            members: VecDeque::new(),
        }
    }

    /// Create a segment from its members
    pub fn with_members<I, T>(kind: SegmentKind, members: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<AsNumber>,
    {
        Self {
            kind,
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    /// Number of hops this segment contributes to the path length
    #[must_use]
    pub fn path_length(&self) -> usize {
        if self.kind.is_set() {
            1
        } else {
            self.members.len()
        }
    }

    /// Number of AS numbers in the segment
    #[must_use]
    pub fn as_size(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn add_as(&mut self, asn: AsNumber) {
        self.members.push_back(asn);
    }

    pub fn prepend_as(&mut self, asn: AsNumber) {
        self.members.push_front(asn);
    }

    #[must_use]
    pub fn contains(&self, asn: AsNumber) -> bool {
        self.members.contains(&asn)
    }

    #[must_use]
    pub fn first_asn(&self) -> Option<AsNumber> {
        self.members.front().copied()
    }

    /// Size on the wire, including the split into 255-member segments
    #[must_use]
    pub fn wire_size(&self, width: AsWidth) -> usize {
        let n_headers = self.members.len().div_ceil(MAX_SEGMENT_MEMBERS);
        n_headers * 2 + self.members.len() * width.octets()
    }

    /// Encode the segment, splitting it if it has more than 255 members.
    ///
    /// Members that do not fit a 2-byte slot are written as `AS_TRANS`.
    /// Returns the number of bytes written.
    pub fn encode(&self, dst: &mut bytes::BytesMut, width: AsWidth) -> usize {
        let members: Vec<AsNumber> = self.members.iter().copied().collect();
        for chunk in members.chunks(MAX_SEGMENT_MEMBERS) {
            dst.put_u8(self.kind as u8);
            dst.put_u8(u8::try_from(chunk.len()).expect("AS segment length overflow"));
            for asn in chunk {
                match width {
                    AsWidth::Two => dst.put_u16(asn.to_u16_or_trans()),
                    AsWidth::Four => dst.put_u32(asn.value()),
                }
            }
        }
        self.wire_size(width)
    }

    /// Decode one segment.
    ///
    /// # Errors
    /// `UnknownSegmentType` for an unknown kind, `MalformedAsPath` for an
    /// empty segment or one longer than the remaining buffer.
    pub fn decode(src: &mut Bytes, width: AsWidth) -> Result<Self, CorruptKind> {
        if src.remaining() < 2 {
            return Err(CorruptKind::MalformedAsPath);
        }
        let kind = src.get_u8();
        let kind = SegmentKind::from_u8(kind).ok_or(CorruptKind::UnknownSegmentType(kind))?;
        let count = usize::from(src.get_u8());
        if count == 0 || src.remaining() < count * width.octets() {
            return Err(CorruptKind::MalformedAsPath);
        }
        let members = (0..count)
            .map(|_| match width {
                AsWidth::Two => AsNumber::from(src.get_u16()),
                AsWidth::Four => AsNumber::from(src.get_u32()),
            })
            .collect();
        Ok(Self { kind, members })
    }
}

/// Compares by length first, then kind, then members
impl Ord for AsSegment {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.members
            .len()
            .cmp(&other.members.len())
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.members.cmp(&other.members))
    }
}

impl PartialOrd for AsSegment {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AsSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = self.kind.delimiters();
        f.write_str(open)?;
        for (i, asn) in self.members.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{asn}")?;
        }
        f.write_str(close)
    }
}

/// BGP AS path
///
/// The total path length is kept up to date on every mutation. Empty
/// segments are never stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "impl-serde",
    serde(from = "Vec<AsSegment>", into = "Vec<AsSegment>")
)]
pub struct AsPath {
    segments: VecDeque<AsSegment>,
    path_len: usize,
}

impl AsPath {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            segments: VecDeque::new(),
            path_len: 0,
        }
    }

    /// A path with a single AS_SEQUENCE
    pub fn from_sequence<I, T>(members: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<AsNumber>,
    {
        let mut path = Self::new();
        path.add_segment(AsSegment::with_members(SegmentKind::Sequence, members));
        path
    }

    pub fn add_segment(&mut self, segment: AsSegment) {
        if segment.is_empty() {
            return;
        }
        self.path_len += segment.path_length();
        self.segments.push_back(segment);
    }

    pub fn prepend_segment(&mut self, segment: AsSegment) {
        if segment.is_empty() {
            return;
        }
        self.path_len += segment.path_length();
        self.segments.push_front(segment);
    }

    /// Prepend an AS number, as done when advertising to an external peer
    pub fn prepend_as(&mut self, asn: AsNumber) {
        self.prepend_into(SegmentKind::Sequence, asn);
    }

    /// Prepend an AS number inside a confederation (RFC 5065 Section 5.3)
    pub fn prepend_confed_as(&mut self, asn: AsNumber) {
        self.prepend_into(SegmentKind::ConfedSequence, asn);
    }

    fn prepend_into(&mut self, kind: SegmentKind, asn: AsNumber) {
        match self.segments.front_mut() {
            Some(first) if first.kind == kind && first.as_size() < MAX_SEGMENT_MEMBERS => {
                first.prepend_as(asn);
                self.path_len += 1;
            }
            _ => self.prepend_segment(AsSegment::with_members(kind, [asn])),
        }
    }

    /// Strip confederation segments before leaving the confederation
    pub fn remove_confed_segments(&mut self) {
        self.segments.retain(|segment| !segment.kind.is_confed());
        self.recompute_length();
    }

    fn recompute_length(&mut self) {
        self.path_len = self.segments.iter().map(AsSegment::path_length).sum();
    }

    #[must_use]
    pub const fn path_length(&self) -> usize {
        self.path_len
    }

    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn segment(&self, index: usize) -> Option<&AsSegment> {
        self.segments.get(index)
    }

    pub fn segments(&self) -> std::collections::vec_deque::Iter<'_, AsSegment> {
        self.segments.iter()
    }

    /// All AS numbers in path order
    pub fn iter_asns(&self) -> impl Iterator<Item = AsNumber> + '_ {
        self.segments
            .iter()
            .flat_map(|segment| segment.members.iter().copied())
    }

    #[must_use]
    pub fn contains(&self, asn: AsNumber) -> bool {
        self.segments.iter().any(|segment| segment.contains(asn))
    }

    /// The neighbouring AS, if the path starts with one
    #[must_use]
    pub fn first_asn(&self) -> Option<AsNumber> {
        self.segments.front().and_then(AsSegment::first_asn)
    }

    /// Check if every member fits a 2-byte slot
    #[must_use]
    pub fn two_byte_compatible(&self) -> bool {
        self.iter_asns().all(AsNumber::is_16bit)
    }

    #[must_use]
    pub fn wire_size(&self, width: AsWidth) -> usize {
        self.segments.iter().map(|s| s.wire_size(width)).sum()
    }

    /// Encode all segments. Returns the number of bytes written.
    pub fn encode(&self, dst: &mut bytes::BytesMut, width: AsWidth) -> usize {
        self.segments.iter().map(|s| s.encode(dst, width)).sum()
    }

    /// Decode the whole buffer as a segment stream.
    ///
    /// # Errors
    /// See [`AsSegment::decode`].
    pub fn decode(src: &mut Bytes, width: AsWidth) -> Result<Self, CorruptKind> {
        let mut path = Self::new();
        while src.has_remaining() {
            path.add_segment(AsSegment::decode(src, width)?);
        }
        Ok(path)
    }

    /// Aggregate two paths (RFC 4271 Section 9.2.2.2)
    ///
    /// The common leading part is kept and every other AS number of both
    /// paths is collected into one trailing AS_SET without duplicates.
    #[must_use]
    pub fn aggregate(&self, other: &Self) -> Self {
        let mut result = Self::new();
        let mut i = 0;
        while i < self.segments.len()
            && i < other.segments.len()
            && self.segments[i] == other.segments[i]
        {
            result.add_segment(self.segments[i].clone());
            i += 1;
        }
        let mut rest = AsSegment::new(SegmentKind::Set);
        let mut collect = |asn: AsNumber| {
            if !rest.contains(asn) {
                rest.add_as(asn);
            }
        };
        // Members of segment `i` already kept as a common leading part
        let mut skip = 0;
        if let (Some(a), Some(b)) = (self.segments.get(i), other.segments.get(i)) {
            if a.kind == b.kind && !a.kind.is_set() {
                let common: Vec<AsNumber> = a
                    .members
                    .iter()
                    .zip(b.members.iter())
                    .take_while(|(x, y)| x == y)
                    .map(|(x, _)| *x)
                    .collect();
                skip = common.len();
                result.add_segment(AsSegment::with_members(a.kind, common));
            }
        }
        for segments in [&self.segments, &other.segments] {
            for (j, segment) in segments.iter().enumerate().skip(i) {
                let start = if j == i { skip } else { 0 };
                segment.members.iter().skip(start).copied().for_each(&mut collect);
            }
        }
        result.add_segment(rest);
        result
    }
}

impl FromIterator<AsSegment> for AsPath {
    fn from_iter<T: IntoIterator<Item = AsSegment>>(iter: T) -> Self {
        let mut path = Self::new();
        for segment in iter {
            path.add_segment(segment);
        }
        path
    }
}

impl From<Vec<AsSegment>> for AsPath {
    fn from(segments: Vec<AsSegment>) -> Self {
        segments.into_iter().collect()
    }
}

impl From<AsPath> for Vec<AsSegment> {
    fn from(path: AsPath) -> Self {
        path.segments.into()
    }
}

impl Ord for AsPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.segments.cmp(&other.segments)
    }
}

impl PartialOrd for AsPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// Parse the text form
///
/// Plain numbers form AS_SEQUENCEs, `{}` encloses an AS_SET, `()` an
/// AS_CONFED_SEQUENCE and `[]` an AS_CONFED_SET. Numbers are separated by
/// commas or whitespace and can be written in asdot.
impl FromStr for AsPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        fn flush(token: &mut String, target: &mut AsSegment, s: &str) -> Result<(), Error> {
            if !token.is_empty() {
                let asn = token
                    .parse::<AsNumber>()
                    .map_err(|_| Error::InvalidAsPath(s.to_string()))?;
                target.add_as(asn);
                token.clear();
            }
            Ok(())
        }

        let invalid = || Error::InvalidAsPath(s.to_string());
        let mut path = Self::new();
        let mut sequence = AsSegment::new(SegmentKind::Sequence);
        // Closing delimiter and the bracketed segment being filled
        let mut bracketed: Option<(char, AsSegment)> = None;
        let mut token = String::new();
        for c in s.chars() {
            let target = match bracketed.as_mut() {
                Some((_, segment)) => segment,
                None => &mut sequence,
            };
            match c {
                '0'..='9' | '.' => token.push(c),
                ',' => flush(&mut token, target, s)?,
                c if c.is_whitespace() => flush(&mut token, target, s)?,
                '{' | '(' | '[' => {
                    if bracketed.is_some() {
                        return Err(invalid());
                    }
                    flush(&mut token, &mut sequence, s)?;
                    path.add_segment(std::mem::replace(
                        &mut sequence,
                        AsSegment::new(SegmentKind::Sequence),
                    ));
                    let (close, kind) = match c {
                        '{' => ('}', SegmentKind::Set),
                        '(' => (')', SegmentKind::ConfedSequence),
                        _ => (']', SegmentKind::ConfedSet),
                    };
                    bracketed = Some((close, AsSegment::new(kind)));
                }
                '}' | ')' | ']' => {
                    flush(&mut token, target, s)?;
                    match bracketed.take() {
                        Some((close, segment)) if close == c && !segment.is_empty() => {
                            path.add_segment(segment);
                        }
                        _ => return Err(invalid()),
                    }
                }
                _ => return Err(invalid()),
            }
        }
        if bracketed.is_some() {
            return Err(invalid());
        }
        flush(&mut token, &mut sequence, s)?;
        path.add_segment(sequence);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hex_to_bytes;
    use bytes::BytesMut;

    fn seg(kind: SegmentKind, members: &[u32]) -> AsSegment {
        AsSegment::with_members(kind, members.iter().copied())
    }

    fn sum_of_segments(path: &AsPath) -> usize {
        path.segments().map(AsSegment::path_length).sum()
    }

    #[test]
    fn test_text_form() {
        let parsed: AsPath = "65008,1,2,{3,4,5},6,{7,8},9".parse().unwrap();
        let mut built = AsPath::new();
        built.add_segment(seg(SegmentKind::Sequence, &[65008, 1, 2]));
        built.add_segment(seg(SegmentKind::Set, &[3, 4, 5]));
        built.add_segment(seg(SegmentKind::Sequence, &[6]));
        built.add_segment(seg(SegmentKind::Set, &[7, 8]));
        built.add_segment(seg(SegmentKind::Sequence, &[9]));
        assert_eq!(parsed, built);
        assert_eq!(parsed.path_length(), 7);
        assert_eq!(parsed.to_string(), "65008,1,2,{3,4,5},6,{7,8},9");
    }

    #[test]
    fn test_text_form_confed() {
        let parsed: AsPath = "(65001 65002) [65003] 1.10 {3}".parse().unwrap();
        assert_eq!(parsed.num_segments(), 4);
        assert_eq!(parsed.segment(0).unwrap().kind, SegmentKind::ConfedSequence);
        assert_eq!(parsed.segment(1).unwrap().kind, SegmentKind::ConfedSet);
        assert_eq!(
            parsed.segment(2).unwrap().first_asn(),
            Some(AsNumber::new(65546))
        );
        assert_eq!(parsed.to_string(), "(65001,65002),[65003],65546,{3}");
        assert_eq!(parsed.to_string().parse::<AsPath>().unwrap(), parsed);
    }

    #[test]
    fn test_text_form_invalid() {
        for text in ["1,{2", "1,}", "{}", "{1,(2)}", "1,x", "1,{2)"] {
            assert!(
                matches!(text.parse::<AsPath>(), Err(Error::InvalidAsPath(_))),
                "{text}"
            );
        }
        assert!("".parse::<AsPath>().unwrap().is_empty());
    }

    #[test]
    fn test_path_length_invariant() {
        let mut path = AsPath::new();
        path.add_segment(seg(SegmentKind::Sequence, &[1, 2, 3]));
        assert_eq!(path.path_length(), sum_of_segments(&path));
        path.add_segment(seg(SegmentKind::Set, &[4, 5]));
        assert_eq!(path.path_length(), 4);
        assert_eq!(path.path_length(), sum_of_segments(&path));
        path.prepend_segment(seg(SegmentKind::ConfedSet, &[6, 7, 8]));
        assert_eq!(path.path_length(), 5);
        path.prepend_as(AsNumber::new(9));
        assert_eq!(path.path_length(), 6);
        assert_eq!(path.path_length(), sum_of_segments(&path));
        path.add_segment(AsSegment::new(SegmentKind::Sequence));
        assert_eq!(path.num_segments(), 4);
        path.remove_confed_segments();
        assert_eq!(path.path_length(), sum_of_segments(&path));
        assert_eq!(path.path_length(), 5);
    }

    #[test]
    fn test_prepend_as() {
        let mut path: AsPath = "2,3".parse().unwrap();
        path.prepend_as(AsNumber::new(1));
        assert_eq!(path.num_segments(), 1);
        assert_eq!(path.to_string(), "1,2,3");

        let mut path: AsPath = "{2,3}".parse().unwrap();
        path.prepend_as(AsNumber::new(1));
        assert_eq!(path.to_string(), "1,{2,3}");
        assert_eq!(path.first_asn(), Some(AsNumber::new(1)));

        let mut path = AsPath::from_sequence(0..255_u32);
        path.prepend_as(AsNumber::new(7));
        assert_eq!(path.num_segments(), 2);
        assert_eq!(path.path_length(), 256);

        let mut path: AsPath = "1".parse().unwrap();
        path.prepend_confed_as(AsNumber::new(65001));
        path.prepend_confed_as(AsNumber::new(65002));
        assert_eq!(path.to_string(), "(65002,65001),1");
    }

    #[test]
    fn test_as2_aspath() {
        let mut src = hex_to_bytes("0201 fd7d");
        let path = AsPath::decode(&mut src, AsWidth::Two).unwrap();
        assert_eq!(path, AsPath::from_sequence([0xfd7d_u32]));
    }

    #[test]
    fn test_as4_aspath() {
        let bytes = hex_to_bytes("0203 fcde39d1 fcde3880 fcde3122");
        let path = AsPath::decode(&mut bytes.clone(), AsWidth::Four).unwrap();
        assert_eq!(
            path,
            AsPath::from_sequence([0xfcde_39d1_u32, 0xfcde_3880, 0xfcde_3122])
        );
        assert!(!path.two_byte_compatible());
        let mut buf = BytesMut::new();
        assert_eq!(path.encode(&mut buf, AsWidth::Four), 14);
        assert_eq!(buf.freeze(), bytes);
    }

    #[test]
    fn test_as_trans_on_two_byte_slots() {
        let path = AsPath::from_sequence([65000_u32, 4_200_000_000]);
        let mut buf = BytesMut::new();
        assert_eq!(path.encode(&mut buf, AsWidth::Two), path.wire_size(AsWidth::Two));
        assert_eq!(buf.freeze(), hex_to_bytes("0202 fde8 5ba0"));
    }

    #[test]
    fn test_bad_segments() {
        let mut src = hex_to_bytes("0501 fd7d");
        assert_eq!(
            AsPath::decode(&mut src, AsWidth::Two),
            Err(CorruptKind::UnknownSegmentType(5))
        );
        let mut src = hex_to_bytes("0203 fd7d fd7e");
        assert_eq!(
            AsPath::decode(&mut src, AsWidth::Two),
            Err(CorruptKind::MalformedAsPath)
        );
        let mut src = hex_to_bytes("0200");
        assert_eq!(
            AsPath::decode(&mut src, AsWidth::Four),
            Err(CorruptKind::MalformedAsPath)
        );
        let mut src = hex_to_bytes("02");
        assert_eq!(
            AsPath::decode(&mut src, AsWidth::Four),
            Err(CorruptKind::MalformedAsPath)
        );
    }

    #[test]
    fn test_long_segment_is_split() {
        let path = AsPath::from_sequence(1..=300_u32);
        assert_eq!(path.wire_size(AsWidth::Four), 2 + 255 * 4 + 2 + 45 * 4);
        let mut buf = BytesMut::new();
        path.encode(&mut buf, AsWidth::Four);
        let decoded = AsPath::decode(&mut buf.freeze(), AsWidth::Four).unwrap();
        assert_eq!(decoded.num_segments(), 2);
        assert_eq!(decoded.path_length(), 300);
        assert!(decoded.iter_asns().eq(path.iter_asns()));
    }

    #[test]
    fn test_segment_ordering() {
        let short = seg(SegmentKind::Sequence, &[9]);
        let long = seg(SegmentKind::Sequence, &[1, 2]);
        let set = seg(SegmentKind::Set, &[1, 2]);
        assert!(short < long);
        assert!(set < long);
        assert!(seg(SegmentKind::Sequence, &[1, 3]) > long);
    }

    #[test]
    fn test_aggregate() {
        let a: AsPath = "1,2,3,4".parse().unwrap();
        let b: AsPath = "1,2,5,{4,6}".parse().unwrap();
        let agg = a.aggregate(&b);
        assert_eq!(agg.to_string(), "1,2,{3,4,5,6}");
        assert_eq!(a.aggregate(&a), a);
        let c: AsPath = "7".parse().unwrap();
        assert_eq!(a.aggregate(&c).to_string(), "{1,2,3,4,7}");
    }

    #[cfg(feature = "impl-serde")]
    #[test]
    fn test_serde_keeps_length() {
        let path: AsPath = "1,{2,3},4".parse().unwrap();
        let segments: Vec<AsSegment> = path.clone().into();
        let rebuilt = AsPath::from(segments);
        assert_eq!(rebuilt, path);
        assert_eq!(rebuilt.path_length(), 3);
    }
}
