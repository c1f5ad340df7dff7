//! Autonomous system numbers (RFC 6793, RFC 5396)

// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::{Error, AS_TRANS};
use std::fmt;
use std::str::FromStr;

/// A 4-byte AS number
///
/// 2-byte AS numbers are the same values below 65536.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "impl-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "impl-serde", serde(transparent))]
pub struct AsNumber(u32);

impl AsNumber {
    /// Placeholder for AS numbers that do not fit in 2 bytes
    pub const TRANS: Self = Self(AS_TRANS as u32);

    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Check if the number fits in a 2-byte AS slot
    #[must_use]
    pub const fn is_16bit(self) -> bool {
        self.0 <= 0xffff
    }

    /// The value written into a 2-byte slot, `AS_TRANS` if it does not fit
    #[must_use]
    pub const fn to_u16_or_trans(self) -> u16 {
        if self.is_16bit() {
            self.0 as u16
        } else {
            AS_TRANS
        }
    }

    /// Format as "asdot" (RFC 5396)
    #[must_use]
    pub fn to_asdot(self) -> String {
        if self.is_16bit() {
            self.0.to_string()
        } else {
            format!("{}.{}", self.0 >> 16, self.0 & 0xffff)
        }
    }
}

impl From<u32> for AsNumber {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<u16> for AsNumber {
    fn from(value: u16) -> Self {
        Self(u32::from(value))
    }
}

impl From<AsNumber> for u32 {
    fn from(asn: AsNumber) -> Self {
        asn.0
    }
}

/// Formats as "asplain"
impl fmt::Display for AsNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses both "asplain" and "asdot"
impl FromStr for AsNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidAsNumber(s.to_string());
        let s_trim = s.trim();
        if let Some((high, low)) = s_trim.split_once('.') {
            let high: u16 = high.parse().map_err(|_| invalid())?;
            let low: u16 = low.parse().map_err(|_| invalid())?;
            Ok(Self((u32::from(high) << 16) | u32::from(low)))
        } else {
            s_trim.parse().map(Self).map_err(|_| invalid())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_16bit() {
        assert!(AsNumber::new(65535).is_16bit());
        assert!(!AsNumber::new(65536).is_16bit());
        assert_eq!(AsNumber::new(64512).to_u16_or_trans(), 64512);
        assert_eq!(AsNumber::new(4_200_000_000).to_u16_or_trans(), AS_TRANS);
    }

    #[test]
    fn test_asdot() {
        let asn = AsNumber::new(65536 + 10);
        assert_eq!(asn.to_asdot(), "1.10");
        assert_eq!(asn.to_string(), "65546");
        assert_eq!(AsNumber::new(65000).to_asdot(), "65000");
        assert_eq!("1.10".parse::<AsNumber>().unwrap(), asn);
        assert_eq!("65546".parse::<AsNumber>().unwrap(), asn);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(matches!(
            "".parse::<AsNumber>(),
            Err(Error::InvalidAsNumber(_))
        ));
        assert!("4294967296".parse::<AsNumber>().is_err());
        assert!("65536.1".parse::<AsNumber>().is_err());
        assert!("a.b".parse::<AsNumber>().is_err());
    }
}
