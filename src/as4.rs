//! Reconstruct the AS path received from a 2-byte AS speaker (RFC 6793 Section 4.2.3)
//!
//! A NEW BGP speaker sends its 2-byte peers an AS_PATH where every AS number
//! above 65535 is replaced by `AS_TRANS`, and the real 4-byte numbers in an
//! AS4_PATH. OLD speakers along the way prepend to AS_PATH only and pass
//! AS4_PATH through untouched, so the AS4_PATH describes the tail of the
//! AS_PATH and the leading part has to be taken from the AS_PATH.

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::asn::AsNumber;
use crate::aspath::{AsPath, AsSegment, SegmentKind};
use std::collections::VecDeque;

/// Merge an AS4_PATH into the AS_PATH it was received with.
///
/// The result is never shorter than `legacy`. When the two paths cannot be
/// lined up, the AS numbers only found in `legacy` are kept in an AS_SET so
/// that loop detection still sees them.
#[must_use]
pub fn merge(as4: &AsPath, legacy: &AsPath) -> AsPath {
    if as4.path_length() > legacy.path_length() {
        log::debug!("AS4_PATH {as4} is longer than AS_PATH {legacy}, ignoring it");
        return legacy.clone();
    }
    if as4.path_length() == legacy.path_length() {
        return as4.clone();
    }
    let n_as4 = as4.num_segments();
    let n_legacy = legacy.num_segments();
    if n_legacy < n_as4 {
        return patch_up(as4, legacy);
    }
    let mut segments = VecDeque::with_capacity(n_legacy);
    // Line up the tails
    for (seg4, seg2) in as4.segments().rev().zip(legacy.segments().rev()) {
        match seg4.path_length().cmp(&seg2.path_length()) {
            std::cmp::Ordering::Equal => segments.push_front(seg4.clone()),
            std::cmp::Ordering::Less => segments.push_front(pad_segment(seg4, seg2)),
            std::cmp::Ordering::Greater => return patch_up(as4, legacy),
        }
    }
    // Segments added by OLD speakers only
    for seg2 in legacy.segments().take(n_legacy - n_as4).rev() {
        segments.push_front(seg2.clone());
    }
    let mut merged: AsPath = segments.into_iter().collect();
    pad_to_length(&mut merged, legacy.path_length());
    merged
}

/// Check if `seg4` is the tail of `seg2`, where `AS_TRANS` stands for any
/// 4-byte AS number
fn is_tail_of(seg4: &AsSegment, seg2: &AsSegment) -> bool {
    let skip = seg2.as_size() - seg4.as_size();
    seg4.kind == seg2.kind
        && seg4
            .members
            .iter()
            .zip(seg2.members.iter().skip(skip))
            .all(|(a4, a2)| a4 == a2 || (*a2 == AsNumber::TRANS && !a4.is_16bit()))
}

/// Extend `seg4` with what `seg2` (a longer segment) has in addition
fn pad_segment(seg4: &AsSegment, seg2: &AsSegment) -> AsSegment {
    if !seg4.kind.is_set() && seg4.as_size() < seg2.as_size() && is_tail_of(seg4, seg2) {
        let mut padded = seg4.clone();
        let n_leading = seg2.as_size() - seg4.as_size();
        for asn in seg2.members.iter().take(n_leading).rev() {
            padded.prepend_as(*asn);
        }
        return padded;
    }
    let kind = if seg4.kind.is_confed() {
        SegmentKind::ConfedSet
    } else {
        SegmentKind::Set
    };
    let mut padded = AsSegment::with_members(kind, seg4.members.iter().copied());
    for asn in &seg2.members {
        if *asn != AsNumber::TRANS && !padded.contains(*asn) {
            padded.add_as(*asn);
        }
    }
    padded
}

/// Keep the AS4 data and put everything else from the AS_PATH into one
/// leading AS_SET
fn patch_up(as4: &AsPath, legacy: &AsPath) -> AsPath {
    log::warn!("Cannot line up AS4_PATH {as4} with AS_PATH {legacy}, patching up");
    let mut merged = as4.clone();
    let mut missing = AsSegment::new(SegmentKind::Set);
    for asn in legacy.iter_asns() {
        if asn != AsNumber::TRANS && !as4.contains(asn) && !missing.contains(asn) {
            missing.add_as(asn);
        }
    }
    merged.prepend_segment(missing);
    pad_to_length(&mut merged, legacy.path_length());
    merged
}

/// Repeat the first AS number until `path` is as long as `target`
fn pad_to_length(path: &mut AsPath, target: usize) {
    while path.path_length() < target {
        let Some(first) = path.first_asn() else {
            break;
        };
        log::debug!("Padding merged AS path with {first}");
        path.prepend_as(first);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(text: &str) -> AsPath {
        text.parse().unwrap()
    }

    #[test]
    fn test_trans_replaced() {
        crate::init_test_logger();
        let legacy = path("65001,23456,23456");
        let as4 = path("4200000000,4200000001");
        let merged = merge(&as4, &legacy);
        assert_eq!(merged, path("65001,4200000000,4200000001"));
    }

    #[test]
    fn test_equal_length_keeps_as4() {
        let legacy = path("65001,23456,{65002,23456}");
        let as4 = path("65001,4200000000,{65002,4200000001}");
        assert_eq!(merge(&as4, &legacy), as4);
    }

    #[test]
    fn test_longer_as4_ignored() {
        let legacy = path("65001,23456");
        let as4 = path("65001,4200000000,4200000001");
        assert_eq!(merge(&as4, &legacy), legacy);
    }

    #[test]
    fn test_leading_legacy_segments() {
        let legacy = path("65001,{65002,65003},23456");
        let as4 = path("4200000000");
        let merged = merge(&as4, &legacy);
        assert_eq!(merged, path("65001,{65002,65003},4200000000"));
        assert_eq!(merged.path_length(), legacy.path_length());
    }

    #[test]
    fn test_patch_up_with_set() {
        crate::init_test_logger();
        let legacy = path("1,2,3");
        let as4 = path("{4200000000},4200000001");
        let merged = merge(&as4, &legacy);
        assert_eq!(merged, path("{1,2,3},{4200000000},4200000001"));
    }

    #[test]
    fn test_patch_up_with_padding() {
        crate::init_test_logger();
        let legacy = path("23456,23456,23456");
        let as4 = path("{4200000000},4200000001");
        let merged = merge(&as4, &legacy);
        assert_eq!(merged, path("4200000000,{4200000000},4200000001"));
    }

    #[test]
    fn test_mismatched_tail_becomes_set() {
        let legacy = path("1,2,3");
        let as4 = path("5,6");
        let merged = merge(&as4, &legacy);
        assert_eq!(merged, path("5,5,{5,6,1,2,3}"));
    }

    #[test]
    fn test_never_shortens() {
        crate::init_test_logger();
        let cases = [
            ("1,2,3,4", "4200000000"),
            ("1,23456,{3,4},5", "4200000000,{3,4},5"),
            ("{1,2},3", "{4200000000,4200000001},4200000002,4200000003"),
            ("1,2,3", ""),
            ("(65001),1,2", "1"),
            ("1,{2,3},4,5,6", "{7},8"),
        ];
        for (legacy, as4) in cases {
            let legacy = path(legacy);
            let merged = merge(&path(as4), &legacy);
            assert!(
                merged.path_length() >= legacy.path_length(),
                "{merged} shorter than {legacy}"
            );
            assert_eq!(
                merged.path_length(),
                merged.segments().map(AsSegment::path_length).sum::<usize>()
            );
        }
    }
}
