use crate::{AdapterInfo, Advertisement, MacAddress, Result, Scanner, Timestamp, TransportError};
use std::time::Duration;
use time::OffsetDateTime;

/// A simple in-process mock scanner. Each scanner instance is independent and
/// returns the same canned advertisements on every scan.
pub struct MockScanner {
    adapter: String,
    frames: Vec<Advertisement>,
}

impl MockScanner {
    /// Replace the canned advertisements.
    pub fn with_frames(mut self, frames: Vec<Advertisement>) -> Self {
        self.frames = frames;
        self
    }
}

impl Scanner for MockScanner {
    fn open(adapter: &str) -> Result<Self> {
        if !Self::list()?.iter().any(|a| a.name == adapter) {
            return Err(TransportError::AdapterNotFound(adapter.to_string()));
        }
        Ok(Self {
            adapter: adapter.to_string(),
            frames: default_frames(),
        })
    }

    fn list() -> Result<Vec<AdapterInfo>> {
        Ok(vec![AdapterInfo {
            name: "mock0".to_string(),
            address: "00:00:00:00:00:00".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn scan(&mut self, _timeout: Duration) -> Result<Vec<Advertisement>> {
        tracing::debug!(adapter = %self.adapter, n = self.frames.len(), "mock scan");
        let now = Timestamp(OffsetDateTime::now_utc());
        Ok(self
            .frames
            .iter()
            .cloned()
            .map(|mut adv| {
                adv.timestamp = Some(now);
                adv
            })
            .collect())
    }
}

fn default_frames() -> Vec<Advertisement> {
    vec![
        // Teltonika EYE sensor: temperature, humidity, magnet, movement, angles, battery
        Advertisement::new(MacAddress::new([0x7c, 0xd9, 0xf4, 0x11, 0x2a, 0x05]), Some("P T EN"))
            .with_rssi(-67)
            .with_manufacturer_data(
                0x089A,
                &[0x01, 0xB7, 0x08, 0xB4, 0x12, 0x0C, 0xCB, 0x0B, 0xFF, 0xC7, 0x67],
            ),
        // Ruuvi RAWv2
        Advertisement::new(MacAddress::new([0xcb, 0xb8, 0x33, 0x4c, 0x88, 0x4f]), Some("Ruuvi 884F"))
            .with_rssi(-81)
            .with_manufacturer_data(
                0x0499,
                &[
                    0x05, 0x12, 0xFC, 0x53, 0x94, 0xC3, 0x7C, 0x00, 0x04, 0xFF, 0xFC, 0x04, 0x0C,
                    0xAC, 0x36, 0x42, 0x00, 0xCD, 0xCB, 0xB8, 0x33, 0x4C, 0x88, 0x4F,
                ],
            ),
        // Unknown vendor, exercises the ignore path
        Advertisement::new(MacAddress::new([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]), None)
            .with_rssi(-90)
            .with_manufacturer_data(0xFFFF, &[0xDE, 0xAD]),
    ]
}
