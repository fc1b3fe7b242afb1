use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct SensorMetrics {
    pub adverts_seen: IntCounter,
    pub payloads_decoded: IntCounter,
    pub fields_dropped: IntCounter,
    pub devices_known: IntGauge,
    pub devices_ignored: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub sensors: SensorMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let sensors = SensorMetrics {
            adverts_seen: IntCounter::new("ble_adverts_seen", "Advertisements received")?,
            payloads_decoded: IntCounter::new(
                "ble_payloads_decoded",
                "Manufacturer payloads decoded",
            )?,
            fields_dropped: IntCounter::new(
                "ble_fields_dropped",
                "Fields that failed to decode",
            )?,
            devices_known: IntGauge::new("ble_devices_known", "Devices with a decoder")?,
            devices_ignored: IntGauge::new("ble_devices_ignored", "Devices ignored by address")?,
        };
        registry.register(Box::new(sensors.adverts_seen.clone()))?;
        registry.register(Box::new(sensors.payloads_decoded.clone()))?;
        registry.register(Box::new(sensors.fields_dropped.clone()))?;
        registry.register(Box::new(sensors.devices_known.clone()))?;
        registry.register(Box::new(sensors.devices_ignored.clone()))?;
        Ok(Self { registry, sensors })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_text() {
        let metrics = MetricsHub::new().unwrap();
        metrics.sensors.adverts_seen.inc_by(3);
        metrics.sensors.devices_known.set(2);
        let text = metrics.encode_text();
        assert!(text.contains("ble_adverts_seen 3"));
        assert!(text.contains("ble_devices_known 2"));
    }
}
