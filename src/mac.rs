//! Hardware address type shared by the station sequencer and ESP-NOW.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// 6-byte radio hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Raw address bytes, in transmission order
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for MacAddress {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let octets: [u8; 6] = bytes
            .try_into()
            .map_err(|_| {
                Error::General(format!("MAC address must be 6 bytes, got {}", bytes.len()))
            })?;
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}", a, b, c, d, e, g)
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    /// Accepts `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`, either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::ConfigError(format!("invalid MAC address '{}'", s));

        let mut octets = [0u8; 6];
        let mut parts = s.trim().split(|c: char| c == ':' || c == '-');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self(octets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_upper_case_colon_separated() {
        let mac = MacAddress([0xd8, 0x13, 0x2a, 0x7f, 0xab, 0x24]);
        assert_eq!(mac.to_string(), "D8:13:2A:7F:AB:24");
    }

    #[test]
    fn parses_both_separators() {
        let expected = MacAddress([0xd8, 0x13, 0x2a, 0x7f, 0xab, 0x24]);
        assert_eq!("d8:13:2a:7f:ab:24".parse::<MacAddress>().unwrap(), expected);
        assert_eq!("D8-13-2A-7F-AB-24".parse::<MacAddress>().unwrap(), expected);
    }

    #[test]
    fn rejects_malformed_addresses() {
        for input in [
            "",
            "d8:13:2a:7f:ab",
            "d8:13:2a:7f:ab:24:00",
            "d8:13:2a:7f:ab:zz",
            "d813:2a:7f:ab:24",
            "+1:02:03:04:05:06",
        ] {
            assert!(input.parse::<MacAddress>().is_err(), "accepted {:?}", input);
        }
    }

    #[test]
    fn slice_conversion_checks_length() {
        assert!(MacAddress::try_from(&[1u8, 2, 3][..]).is_err());
        let mac = MacAddress::try_from(&[1u8, 2, 3, 4, 5, 6][..]).unwrap();
        assert_eq!(mac.octets(), [1, 2, 3, 4, 5, 6]);
    }
}
