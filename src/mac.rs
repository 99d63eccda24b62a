/// MAC address and OUI prefix types.
///
/// Addresses arrive from the scanner as raw bytes and from the edit layer as
/// text in whatever notation the user typed. Both end up as [`MacAddress`];
/// the canonical rendering is `AA:BB:CC:DD:EE:FF`.
use core::fmt;
use core::str::FromStr;

use heapless::String;

/// Maximum length for MAC address strings ("AA:BB:CC:DD:EE:FF")
pub type MacString = String<18>;

/// A 24-bit Organizationally Unique Identifier, the first three octets of a MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OuiPrefix(u32);

impl OuiPrefix {
    /// Build a prefix from an integer. Bits above 24 are discarded.
    pub const fn new(value: u32) -> Self {
        Self(value & 0x00FF_FFFF)
    }

    pub const fn from_bytes(bytes: [u8; 3]) -> Self {
        Self(((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32)
    }

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for OuiPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}",
            (self.0 >> 16) & 0xFF,
            (self.0 >> 8) & 0xFF,
            self.0 & 0xFF
        )
    }
}

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

/// Returned when text does not contain exactly twelve hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidMac;

impl MacAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub const fn oui(&self) -> OuiPrefix {
        OuiPrefix::from_bytes([self.0[0], self.0[1], self.0[2]])
    }

    /// Parse a MAC in colon, dash or bare-hex notation, either case.
    ///
    /// Whitespace around the address is ignored. Any other character, or a
    /// digit count other than twelve, is rejected.
    pub fn parse(text: &str) -> Result<Self, InvalidMac> {
        let mut bytes = [0u8; 6];
        let mut digits = 0usize;

        for c in text.trim().chars() {
            match c {
                ':' | '-' => continue,
                _ => {
                    let nibble = c.to_digit(16).ok_or(InvalidMac)? as u8;
                    if digits >= 12 {
                        return Err(InvalidMac);
                    }
                    let byte = &mut bytes[digits / 2];
                    *byte = (*byte << 4) | nibble;
                    digits += 1;
                }
            }
        }

        if digits == 12 {
            Ok(Self(bytes))
        } else {
            Err(InvalidMac)
        }
    }

    /// Canonical uppercase, colon-separated rendering.
    pub fn to_mac_string(&self) -> MacString {
        let mut buf = MacString::new();
        format_mac(&self.0, &mut buf);
        buf
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl FromStr for MacAddress {
    type Err = InvalidMac;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// Format a 6-byte MAC address into "AA:BB:CC:DD:EE:FF" string
pub fn format_mac(mac: &[u8; 6], buf: &mut MacString) {
    use core::fmt::Write;
    buf.clear();
    let _ = write!(
        buf,
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
}
