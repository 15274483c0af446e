//! Station configuration, read from a TOML file.
//!
//! Every key has a default, so an empty file (or no file at all) yields a station that
//! publishes to `localhost:8883` with credentials from `/var/project/certs`.

use crate::AppConfig;
use embassy_time::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use weather_device::clients::mqtt::queue::{DropBehavior, QueueLimit};
use weather_device::clients::mqtt::{Credentials, MqttConfig};
use weather_device::domain::led::matrix::Rotation;
use weather_device::domain::temperature::Calibration;
use weather_device::traits::transport::QoS;

use crate::aggregator::MAX_WINDOW_SIZE;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub device: DeviceConfig,
    pub endpoint: EndpointConfig,
    pub credentials: CredentialsConfig,
    pub topics: TopicsConfig,
    pub queue: QueueConfig,
    pub timeouts: TimeoutsConfig,
    pub sampling: SamplingConfig,
    pub display: DisplayConfig,
    pub app: BehaviorConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeviceConfig {
    /// MQTT client id, also reported as `deviceId` in every observation.
    pub client_id: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            client_id: "RaspberryPi4_WeatherStation".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8883,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CredentialsConfig {
    pub directory: PathBuf,
    /// File name prefix of the device key and certificate.
    pub prefix: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/var/project/certs"),
            prefix: "device".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopicsConfig {
    pub subscribe: String,
    pub publish: String,
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            subscribe: "output/weather_station".to_string(),
            publish: "input/weather_station".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// `-1` unbounded, `0` disabled, otherwise the maximum number of queued messages.
    pub offline_queue_size: i64,
    pub drop_behavior: DropBehavior,
    /// Messages per second sent when draining after a reconnect.
    pub draining_frequency: f32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            offline_queue_size: -1,
            drop_behavior: DropBehavior::Oldest,
            draining_frequency: 5.0,
        }
    }
}

/// All values in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsConfig {
    pub connect_disconnect: u64,
    pub operation: u64,
    pub keep_alive: u64,
    pub reconnect_base: u64,
    pub reconnect_max: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            connect_disconnect: 10,
            operation: 5,
            keep_alive: 30,
            reconnect_base: 1,
            reconnect_max: 32,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SamplingConfig {
    /// Seconds between two samples.
    pub tick_interval: f32,
    pub window_size: usize,
    /// Added to every temperature after conversion to Fahrenheit.
    pub calibration_offset: f32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            tick_interval: 2.0,
            window_size: 15,
            calibration_offset: 0.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Clockwise rotation in degrees.
    pub rotation: u16,
    /// Framebuffer device; looked up by name when unset.
    pub device: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BehaviorConfig {
    /// Stop instead of queueing offline when the first connection attempt fails.
    pub abort_on_connect_failure: bool,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path.as_ref()) {
            Err(ConfigError::Io { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                log::info!("No configuration at {:?}, using defaults", path.as_ref());
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid<T: Into<String>>(reason: T) -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(reason.into()))
        }

        let client_id = &self.device.client_id;
        if client_id.trim().is_empty() || client_id.starts_with(' ') {
            return invalid("device.client_id must not be empty or start with a space");
        }
        if self.endpoint.host.trim().is_empty() {
            return invalid("endpoint.host must not be empty");
        }
        if self.topics.publish.is_empty() || self.topics.subscribe.is_empty() {
            return invalid("topics.publish and topics.subscribe must not be empty");
        }
        if self.topics.publish.contains(|c: char| c == '+' || c == '#') {
            return invalid("topics.publish must not contain wildcards");
        }
        QueueLimit::try_from(self.queue.offline_queue_size)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if !self.queue.draining_frequency.is_finite() {
            return invalid("queue.draining_frequency must be a number");
        }
        if self.timeouts.connect_disconnect == 0 || self.timeouts.operation == 0 {
            return invalid("timeouts must be at least one second");
        }
        if self.timeouts.keep_alive == 0 {
            return invalid("timeouts.keep_alive must be at least one second");
        }
        if self.timeouts.reconnect_base == 0
            || self.timeouts.reconnect_max < self.timeouts.reconnect_base
        {
            return invalid("timeouts.reconnect_base must be between one second and reconnect_max");
        }
        if !(self.sampling.tick_interval.is_finite() && self.sampling.tick_interval > 0.0) {
            return invalid("sampling.tick_interval must be positive");
        }
        if !(1..=MAX_WINDOW_SIZE).contains(&self.sampling.window_size) {
            return invalid(format!(
                "sampling.window_size must be between 1 and {}",
                MAX_WINDOW_SIZE
            ));
        }
        if !self.sampling.calibration_offset.is_finite() {
            return invalid("sampling.calibration_offset must be a number");
        }
        Rotation::try_from(self.display.rotation)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }

    pub fn rotation(&self) -> Rotation {
        Rotation::try_from(self.display.rotation).unwrap_or_default()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::from_directory(&self.credentials.directory, &self.credentials.prefix)
    }

    /// Transport settings. Expects a validated configuration.
    pub fn mqtt(&self) -> MqttConfig {
        let mut mqtt = MqttConfig::new(
            self.device.client_id.as_str(),
            self.endpoint.host.as_str(),
            self.endpoint.port,
            self.credentials(),
        );
        mqtt.queue_limit =
            QueueLimit::try_from(self.queue.offline_queue_size).unwrap_or_default();
        mqtt.drop_behavior = self.queue.drop_behavior;
        mqtt.draining_frequency = self.queue.draining_frequency;
        mqtt.connect_timeout = std::time::Duration::from_secs(self.timeouts.connect_disconnect);
        mqtt.operation_timeout = std::time::Duration::from_secs(self.timeouts.operation);
        mqtt.keep_alive = std::time::Duration::from_secs(self.timeouts.keep_alive);
        mqtt.reconnect_base = std::time::Duration::from_secs(self.timeouts.reconnect_base);
        mqtt.reconnect_max = std::time::Duration::from_secs(self.timeouts.reconnect_max);
        mqtt
    }

    /// Main loop settings. Expects a validated configuration.
    pub fn app(&self) -> AppConfig {
        AppConfig {
            device_id: self.device.client_id.clone(),
            publish_topic: self.topics.publish.clone(),
            subscribe_topic: self.topics.subscribe.clone(),
            publish_qos: QoS::AtMostOnce,
            subscribe_qos: QoS::AtMostOnce,
            tick_interval: Duration::from_millis((self.sampling.tick_interval * 1000.0) as u64),
            window_size: self.sampling.window_size,
            calibration: Calibration::new(self.sampling.calibration_offset),
            abort_on_connect_failure: self.app.abort_on_connect_failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(Config::default(), config);
        config.validate().unwrap();

        assert_eq!(8883, config.endpoint.port);
        assert_eq!(-1, config.queue.offline_queue_size);
        assert_eq!(15, config.sampling.window_size);
        assert_eq!(Duration::from_secs(2), config.app().tick_interval);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [endpoint]
            host = "abc123-ats.iot.us-east-1.amazonaws.com"

            [queue]
            offline_queue_size = 100
            drop_behavior = "newest"

            [sampling]
            tick_interval = 0.5
            calibration_offset = -3.5
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!("abc123-ats.iot.us-east-1.amazonaws.com", config.endpoint.host);
        assert_eq!(8883, config.endpoint.port);
        let mqtt = config.mqtt();
        assert_eq!(DropBehavior::Newest, mqtt.drop_behavior);
        assert!(matches!(mqtt.queue_limit, QueueLimit::Bounded(n) if n.get() == 100));
        let app = config.app();
        assert_eq!(Duration::from_millis(500), app.tick_interval);
        assert_eq!(-3.5, app.calibration.offset());
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(matches!(
            Config::from_toml("[endpoint]\nhostname = \"x\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.sampling.window_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.sampling.window_size = MAX_WINDOW_SIZE + 1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.display.rotation = 45;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.queue.offline_queue_size = -2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.device.client_id = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_default() {
        let path = std::env::temp_dir().join("weather-station-does-not-exist.toml");
        assert_eq!(Config::default(), Config::load_or_default(&path).unwrap());
        assert!(matches!(Config::load(&path), Err(ConfigError::Io { .. })));
    }
}
