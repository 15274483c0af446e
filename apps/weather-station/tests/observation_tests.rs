mod tests {
    use chrono::{DateTime, Utc};
    use weather_device::domain::temperature::{Calibration, Celsius, Temperature};
    use weather_device::domain::SensorAcquisition;
    use weather_station::aggregator::SamplingAggregator;
    use weather_station::config::Config;
    use weather_station::observation::Observation;

    #[test]
    fn test_constant_window() {
        let calibration = Calibration::default();
        let mut aggregator = SamplingAggregator::new("RaspberryPi4_WeatherStation", 15).unwrap();
        for _ in 0..15 {
            let reading = SensorAcquisition::new(Temperature::<Celsius>::new(20.0), 50.0);
            aggregator.record_sample(reading.calibrated(&calibration)).unwrap();
        }
        assert!(aggregator.is_window_full());

        let observation = aggregator.compute_average_and_reset().unwrap();
        assert_eq!(68.0, observation.temperature);
        assert_eq!(50.0, observation.humidity);
        assert_eq!(0, aggregator.len());
    }

    #[test]
    fn test_payload_round_trip() {
        let mut aggregator = SamplingAggregator::new("RaspberryPi4_WeatherStation", 2).unwrap();
        for (t, h) in [(21.3, 40.7), (22.9, 41.1)] {
            let reading = SensorAcquisition::new(Temperature::<Celsius>::new(t), h);
            aggregator.record_sample(reading.calibrated(&Calibration::default())).unwrap();
        }
        let observation = aggregator.compute_average_and_reset().unwrap();

        let payload = observation.to_payload().unwrap();
        let parsed = Observation::from_payload(&payload).unwrap();
        assert_eq!(observation.device_id, parsed.device_id);
        assert_eq!(observation.temperature, parsed.temperature);
        assert_eq!(observation.humidity, parsed.humidity);
        assert_eq!(observation.timestamp, parsed.timestamp);

        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        let timestamp = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
        assert!(timestamp.parse::<DateTime<Utc>>().is_ok());
    }

    #[test]
    fn test_sample_configuration() {
        let text = std::fs::read_to_string(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/weather-station.toml"
        ))
        .unwrap();
        let config = Config::from_toml(&text).unwrap();
        config.validate().unwrap();
        assert_eq!(15, config.sampling.window_size);
        assert_eq!(
            std::path::PathBuf::from("/var/project/certs/device-certificate.pem.crt"),
            config.credentials().certificate
        );
    }
}
