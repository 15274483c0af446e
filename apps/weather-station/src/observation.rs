use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Averaged readings of one window, as published to the broker.
///
/// Serialized as `{"deviceId": .., "timestamp": .., "temperature": .., "humidity": ..}` with
/// an RFC 3339 timestamp, temperature in °F and humidity in %rH.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
}

impl Observation {
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_payload(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_payload_keys() {
        let observation = Observation {
            device_id: "RaspberryPi4_WeatherStation".to_string(),
            timestamp: Utc.with_ymd_and_hms(2021, 3, 14, 15, 9, 26).unwrap(),
            temperature: 68.0,
            humidity: 50.0,
        };
        let value: serde_json::Value =
            serde_json::from_slice(&observation.to_payload().unwrap()).unwrap();
        assert_eq!(
            serde_json::json!({
                "deviceId": "RaspberryPi4_WeatherStation",
                "timestamp": "2021-03-14T15:09:26Z",
                "temperature": 68.0,
                "humidity": 50.0,
            }),
            value
        );
    }
}
