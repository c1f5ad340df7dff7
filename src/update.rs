//! BGP UPDATE message body (RFC 4271 Section 4.3)

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::attr_list::PathAttributeList;
use crate::capability::Afi;
use crate::endec::PeerCxt;
use crate::route::Routes;
use crate::{CorruptKind, CorruptMessage};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

/// BGP UPDATE message without the common header
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Update {
    pub withdrawn_routes: Routes,
    pub path_attributes: PathAttributeList,
    pub nlri: Routes,
}

/// Split off a block prefixed by a two-octet length
fn split_block(src: &mut Bytes) -> Result<Bytes, CorruptMessage> {
    let len = usize::from(
        src.try_get_u16()
            .map_err(|_| CorruptMessage::bare(CorruptKind::MalformedAttributeList))?,
    );
    if src.remaining() < len {
        return Err(CorruptMessage::bare(CorruptKind::MalformedAttributeList));
    }
    Ok(src.split_to(len))
}

impl Update {
    /// Decode an UPDATE body received from a peer.
    ///
    /// # Errors
    /// `MalformedAttributeList` if a length field runs past the body,
    /// `InvalidNetworkField` for a bad prefix, any error of
    /// [`PathAttributeList::decode`], or `MissingWellKnown` if NLRI comes
    /// without the mandatory attributes.
    pub fn decode(body: &mut Bytes, cxt: &PeerCxt) -> Result<Self, CorruptMessage> {
        let mut wdr_buf = split_block(body)?;
        let withdrawn_routes =
            Routes::decode(&mut wdr_buf, Afi::Ipv4).map_err(CorruptMessage::bare)?;
        let mut tpa_buf = split_block(body)?;
        let path_attributes = PathAttributeList::decode(&mut tpa_buf, cxt)?;
        let nlri = Routes::decode(body, Afi::Ipv4).map_err(CorruptMessage::bare)?;
        path_attributes.check_mandatory(!nlri.is_empty())?;
        log::trace!(
            "Decoded UPDATE: {} withdrawn, {} attributes, {} NLRI",
            withdrawn_routes.len(),
            path_attributes.len(),
            nlri.len()
        );
        Ok(Self {
            withdrawn_routes,
            path_attributes,
            nlri,
        })
    }

    /// Encode the body for a peer. Returns the number of bytes written.
    pub fn encode(&self, dst: &mut BytesMut, cxt: &PeerCxt) -> usize {
        let mut len = 0;
        let wdr_len_pos = dst.len();
        dst.put_u16(0); // Placeholder for withdrawn routes length
        let wdr_len = self.withdrawn_routes.encode(dst);
        len += 2 + wdr_len;
        dst[wdr_len_pos..wdr_len_pos + 2].copy_from_slice(
            &(u16::try_from(wdr_len)
                .expect("Withdrawn routes length overflow")
                .to_be_bytes()),
        );
        let tpa_len_pos = dst.len();
        dst.put_u16(0); // Placeholder for total path attributes length
        let tpa_len = self.path_attributes.encode(dst, cxt);
        len += 2 + tpa_len;
        dst[tpa_len_pos..tpa_len_pos + 2].copy_from_slice(
            &(u16::try_from(tpa_len)
                .expect("Total path attributes length overflow")
                .to_be_bytes()),
        );
        len += self.nlri.encode(dst);
        len
    }

    #[must_use]
    pub fn encoded_len(&self, cxt: &PeerCxt) -> usize {
        2 + self.withdrawn_routes.encoded_len()
            + 2
            + self.path_attributes.encoded_len(cxt)
            + self.nlri.encoded_len()
    }
}

impl fmt::Display for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.withdrawn_routes.is_empty() {
            writeln!(f, "Withdrawn: {}", self.withdrawn_routes.display(Afi::Ipv4))?;
        }
        if !self.path_attributes.is_empty() {
            writeln!(f, "{}", self.path_attributes)?;
        }
        if !self.nlri.is_empty() {
            writeln!(f, "NLRI: {}", self.nlri.display(Afi::Ipv4))?;
        }
        Ok(())
    }
}
