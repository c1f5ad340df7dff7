//! Multiprotocol reachable and unreachable NLRI (RFC 4760 Section 3 and 4)

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::capability::{Afi, Safi};
use crate::endec::Component;
use crate::route::Routes;
use crate::CorruptKind;
use bytes::{Buf, BufMut, Bytes};
use num_traits::FromPrimitive;
use std::fmt;
use std::net::{IpAddr, Ipv6Addr};

/// Read the AFI and SAFI in front of both attributes
fn read_family(src: &mut Bytes) -> Result<(Afi, Safi), CorruptKind> {
    if src.remaining() < 3 {
        return Err(CorruptKind::MalformedMpNlri);
    }
    let afi = src.get_u16();
    let afi = Afi::from_u16(afi).ok_or(CorruptKind::MalformedMpNlri)?;
    let safi = src.get_u8();
    let safi = Safi::from_u8(safi).ok_or(CorruptKind::MalformedMpNlri)?;
    Ok((afi, safi))
}

/// BGP MP_REACH_NLRI
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MpReachNlri {
    pub afi: Afi,
    pub safi: Safi,
    pub next_hop: MpNextHop,
    pub nlri: Routes,
}

impl Component for MpReachNlri {
    fn from_bytes(src: &mut Bytes) -> Result<Self, CorruptKind> {
        let (afi, safi) = read_family(src)?;
        let nh_len = usize::from(src.try_get_u8().map_err(|_| CorruptKind::MalformedMpNlri)?);
        if src.remaining() < nh_len + 1 {
            return Err(CorruptKind::MalformedMpNlri);
        }
        let mut nh_src = src.split_to(nh_len);
        let next_hop = MpNextHop::from_bytes(&mut nh_src)?;
        let _ = src.get_u8(); // Reserved
        let nlri = Routes::decode(src, afi).map_err(|_| CorruptKind::MalformedMpNlri)?;
        Ok(Self {
            afi,
            safi,
            next_hop,
            nlri,
        })
    }

    fn to_bytes(&self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u16(self.afi as u16);
        dst.put_u8(self.safi as u8);
        dst.put_u8(
            u8::try_from(self.next_hop.encoded_len())
                .expect("MP_REACH_NLRI next hop length overflow"),
        );
        self.next_hop.to_bytes(dst);
        dst.put_u8(0); // Reserved
        self.nlri.encode(dst);
        self.encoded_len()
    }

    fn encoded_len(&self) -> usize {
        2 + 1 + 1 + self.next_hop.encoded_len() + 1 + self.nlri.encoded_len()
    }
}

impl fmt::Display for MpReachNlri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} next hop {} [{}]",
            self.afi,
            self.safi,
            self.next_hop,
            self.nlri.display(self.afi)
        )
    }
}

/// Next hop for MP_REACH_NLRI
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MpNextHop {
    Single(IpAddr),
    /// Global and link-local IPv6 addresses (RFC 2545 Section 3)
    V6AndLL(Ipv6Addr, Ipv6Addr),
}

impl MpNextHop {
    /// The global address
    #[must_use]
    pub const fn addr(&self) -> IpAddr {
        match self {
            Self::Single(ip) => *ip,
            Self::V6AndLL(global, _) => IpAddr::V6(*global),
        }
    }
}

impl Component for MpNextHop {
    fn from_bytes(src: &mut Bytes) -> Result<Self, CorruptKind> {
        match src.remaining() {
            4 | 16 => Ok(Self::Single(IpAddr::from_bytes(src)?)),
            32 => {
                let v6global = Ipv6Addr::from_bytes(src)?;
                let v6ll = Ipv6Addr::from_bytes(src)?;
                Ok(Self::V6AndLL(v6global, v6ll))
            }
            _ => Err(CorruptKind::MalformedMpNlri),
        }
    }

    fn to_bytes(&self, dst: &mut bytes::BytesMut) -> usize {
        match self {
            Self::Single(ip) => {
                ip.to_bytes(dst);
            }
            Self::V6AndLL(v6global, v6ll) => {
                v6global.to_bytes(dst);
                v6ll.to_bytes(dst);
            }
        };
        self.encoded_len()
    }

    fn encoded_len(&self) -> usize {
        match self {
            Self::Single(IpAddr::V4(_)) => 4,
            Self::Single(IpAddr::V6(_)) => 16,
            Self::V6AndLL(_, _) => 32,
        }
    }
}

impl From<IpAddr> for MpNextHop {
    fn from(ip: IpAddr) -> Self {
        Self::Single(ip)
    }
}

impl fmt::Display for MpNextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(ip) => write!(f, "{ip}"),
            Self::V6AndLL(global, ll) => write!(f, "{global} ({ll})"),
        }
    }
}

/// BGP MP_UNREACH_NLRI
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MpUnreachNlri {
    pub afi: Afi,
    pub safi: Safi,
    pub withdrawn_routes: Routes,
}

impl Component for MpUnreachNlri {
    fn from_bytes(src: &mut Bytes) -> Result<Self, CorruptKind> {
        let (afi, safi) = read_family(src)?;
        let withdrawn_routes =
            Routes::decode(src, afi).map_err(|_| CorruptKind::MalformedMpNlri)?;
        Ok(Self {
            afi,
            safi,
            withdrawn_routes,
        })
    }

    fn to_bytes(&self, dst: &mut bytes::BytesMut) -> usize {
        dst.put_u16(self.afi as u16);
        dst.put_u8(self.safi as u8);
        self.withdrawn_routes.encode(dst);
        self.encoded_len()
    }

    fn encoded_len(&self) -> usize {
        3 + self.withdrawn_routes.encoded_len()
    }
}

impl fmt::Display for MpUnreachNlri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}]",
            self.afi,
            self.safi,
            self.withdrawn_routes.display(self.afi)
        )
    }
}
