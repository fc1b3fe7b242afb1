use crate::TransportError;
use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;
use time::OffsetDateTime;

/// 48-bit Bluetooth device address
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 6] {
        self.0
    }

    /// Lowercase hex without separators, e.g. `d4e5f6a1b2c3`.
    pub fn compact(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for MacAddress {
    type Err = TransportError;

    /// Accepts `AA:BB:CC:DD:EE:FF`, `aa-bb-cc-dd-ee-ff` or `aabbccddeeff`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s
            .trim()
            .chars()
            .filter(|c| *c != ':' && *c != '-')
            .collect();
        if hex.len() != 12 {
            return Err(TransportError::InvalidAddress(s.to_string()));
        }
        let mut out = [0u8; 6];
        for (i, slot) in out.iter_mut().enumerate() {
            let pair = hex
                .get(i * 2..i * 2 + 2)
                .ok_or_else(|| TransportError::InvalidAddress(s.to_string()))?;
            *slot = u8::from_str_radix(pair, 16)
                .map_err(|_| TransportError::InvalidAddress(s.to_string()))?;
        }
        Ok(Self(out))
    }
}

/// One received advertising report.
#[derive(Clone, Debug, PartialEq)]
pub struct Advertisement {
    pub address: MacAddress,
    pub name: Option<String>,
    pub rssi: Option<i16>,
    /// Manufacturer specific data, keyed by company identifier, with the identifier stripped.
    pub manufacturer_data: BTreeMap<u16, Vec<u8>>,
    pub timestamp: Option<Timestamp>,
}

impl Advertisement {
    pub fn new(address: MacAddress, name: Option<&str>) -> Self {
        Self {
            address,
            name: name.map(str::to_string),
            rssi: None,
            manufacturer_data: BTreeMap::new(),
            timestamp: None,
        }
    }

    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    pub fn with_manufacturer_data(mut self, company_id: u16, data: &[u8]) -> Self {
        self.manufacturer_data.insert(company_id, data.to_vec());
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timestamp(pub OffsetDateTime);

#[derive(Clone, Debug)]
pub struct AdapterInfo {
    pub name: String,
    pub address: String,
    pub driver: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_address() -> anyhow::Result<()> {
        let mac: MacAddress = "D4:E5:F6:A1:B2:C3".parse()?;
        assert_eq!(mac.compact(), "d4e5f6a1b2c3");
        assert_eq!(mac.to_string(), "D4:E5:F6:A1:B2:C3");

        let same: MacAddress = "d4e5f6a1b2c3".parse()?;
        assert_eq!(mac, same);
        Ok(())
    }

    #[test]
    fn test_reject_bad_address() {
        assert!("D4:E5:F6".parse::<MacAddress>().is_err());
        assert!("ZZ:E5:F6:A1:B2:C3".parse::<MacAddress>().is_err());
    }
}
