//! A weather station that samples temperature and humidity, publishes the average of every
//! window of samples to an MQTT broker and shows the outcome on an LED matrix.

pub mod aggregator;
pub mod config;
pub mod indicator;
pub mod observation;

use aggregator::{SamplingAggregator, WindowError};
use config::ConfigError;
use core::fmt::Debug;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};
use futures::FutureExt;
use indicator::StatusIndicator;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use weather_device::domain::led::status::{Status, MATRIX_SIZE};
use weather_device::domain::temperature::{Calibration, Celsius};
use weather_device::domain::SensorAcquisition;
use weather_device::traits::led::LedMatrix;
use weather_device::traits::sensors::humidity::HumiditySensor;
use weather_device::traits::sensors::temperature::TemperatureSensor;
use weather_device::traits::transport::{
    Delivery, InboundMessage, MessageHandler, QoS, Transport, TransportError,
};

/// Raised to stop [`App::run`].
pub type ShutdownSignal = Signal<CriticalSectionRawMutex, ()>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("unable to connect: {0}")]
    Connection(#[source] TransportError),
    #[error(transparent)]
    Window(#[from] WindowError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    Sampling,
    Publishing,
    Success,
    Failure,
    ShuttingDown,
    Terminated,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Reported as `deviceId` in every observation.
    pub device_id: String,
    pub publish_topic: String,
    pub subscribe_topic: String,
    pub publish_qos: QoS,
    pub subscribe_qos: QoS,
    pub tick_interval: Duration,
    pub window_size: usize,
    pub calibration: Calibration,
    pub abort_on_connect_failure: bool,
}

/// Handler logging every inbound message.
pub fn log_handler() -> MessageHandler {
    Arc::new(|message: InboundMessage| {
        log::info!("Topic: {}", message.topic);
        log::info!("Payload: {}", message.payload_str());
    })
}

pub struct App<S, M, T>
where
    S: TemperatureSensor<Celsius> + HumiditySensor,
    M: LedMatrix<MATRIX_SIZE>,
    T: Transport,
{
    config: AppConfig,
    sensor: S,
    indicator: StatusIndicator<M>,
    transport: T,
    aggregator: SamplingAggregator,
    handler: MessageHandler,
    state: State,
}

impl<S, M, T> App<S, M, T>
where
    S: TemperatureSensor<Celsius> + HumiditySensor,
    <S as TemperatureSensor<Celsius>>::Error: Debug,
    <S as HumiditySensor>::Error: Debug,
    M: LedMatrix<MATRIX_SIZE>,
    M::Error: Debug,
    T: Transport,
{
    pub fn new(config: AppConfig, sensor: S, matrix: M, transport: T) -> Result<Self, Error> {
        let aggregator = SamplingAggregator::new(config.device_id.as_str(), config.window_size)?;
        Ok(Self {
            config,
            sensor,
            indicator: StatusIndicator::new(matrix),
            transport,
            aggregator,
            handler: log_handler(),
            state: State::Idle,
        })
    }

    /// Replaces the handler invoked for messages on the subscribe topic.
    pub fn with_handler(mut self, handler: MessageHandler) -> Self {
        self.handler = handler;
        self
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn aggregator(&self) -> &SamplingAggregator {
        &self.aggregator
    }

    pub fn status(&self) -> Option<Status> {
        self.indicator.current()
    }

    /// Samples and publishes until `shutdown` is raised, then clears the display and
    /// disconnects. The cleanup runs on every exit path, errors and panics included; a panic
    /// resumes once the cleanup is done.
    pub async fn run(&mut self, shutdown: &ShutdownSignal) -> Result<(), Error> {
        let result = match AssertUnwindSafe(self.serve(shutdown)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                log::error!("Stopping after a panic");
                self.shutdown().await;
                std::panic::resume_unwind(panic);
            }
        };
        if let Err(e) = &result {
            log::error!("Stopping: {}", e);
        }
        self.shutdown().await;
        result
    }

    async fn serve(&mut self, shutdown: &ShutdownSignal) -> Result<(), Error> {
        log::info!("Starting weather station {}", self.config.device_id);
        self.enter(State::Idle);
        self.show(Status::Idle);

        let connected = match select(self.transport.connect(), shutdown.wait()).await {
            Either::First(result) => result,
            Either::Second(()) => {
                log::info!("Shutdown requested while connecting");
                return Ok(());
            }
        };
        match connected {
            Ok(()) => log::info!("Connection established"),
            // a configuration problem never heals by retrying in the background
            Err(e) if self.config.abort_on_connect_failure || !e.is_retryable() => {
                return Err(Error::Connection(e))
            }
            Err(e) => log::warn!("Unable to connect, publishing offline: {}", e),
        }

        let subscribe = self.transport.subscribe(
            &self.config.subscribe_topic,
            self.config.subscribe_qos,
            self.handler.clone(),
        );
        match select(subscribe, shutdown.wait()).await {
            Either::First(Ok(())) => {}
            Either::First(Err(e)) => log::warn!(
                "Unable to subscribe to {}: {}",
                self.config.subscribe_topic,
                e
            ),
            Either::Second(()) => {
                log::info!("Shutdown requested while subscribing");
                return Ok(());
            }
        }

        loop {
            if self.aggregator.is_empty() {
                self.show(Status::Idle);
            }
            self.enter(State::Sampling);
            self.sample().await?;

            if self.aggregator.is_window_full() {
                self.publish().await?;
            }

            if let Either::Second(()) =
                select(Timer::after(self.config.tick_interval), shutdown.wait()).await
            {
                log::info!("Shutdown requested");
                return Ok(());
            }
        }
    }

    async fn sample(&mut self) -> Result<(), Error> {
        let temperature = match self.sensor.temperature().await {
            Ok(temperature) => temperature,
            Err(e) => {
                log::warn!("Unable to read temperature: {:?}", e);
                return Ok(());
            }
        };
        let humidity = match self.sensor.relative_humidity().await {
            Ok(humidity) => humidity,
            Err(e) => {
                log::warn!("Unable to read humidity: {:?}", e);
                return Ok(());
            }
        };
        let reading =
            SensorAcquisition::new(temperature, humidity).calibrated(&self.config.calibration);
        log::debug!("Sample {}: {:?}", self.aggregator.len() + 1, reading);
        self.aggregator.record_sample(reading)?;
        Ok(())
    }

    async fn publish(&mut self) -> Result<(), Error> {
        self.enter(State::Publishing);
        let observation = self.aggregator.compute_average_and_reset()?;

        let delivered = match observation.to_payload() {
            Ok(payload) => {
                log::info!("Payload: {}", String::from_utf8_lossy(&payload));
                match self
                    .transport
                    .publish(&self.config.publish_topic, &payload, self.config.publish_qos)
                    .await
                {
                    Ok(Delivery::Sent) => true,
                    Ok(Delivery::Queued) => {
                        log::info!("Not connected, observation queued");
                        true
                    }
                    Err(e) => {
                        log::warn!("Unable to publish observation: {}", e);
                        false
                    }
                }
            }
            Err(e) => {
                log::error!("Unable to serialize observation: {}", e);
                false
            }
        };

        if delivered {
            self.enter(State::Success);
            self.show(Status::Success);
        } else {
            self.enter(State::Failure);
            self.show(Status::Failure);
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        if matches!(self.state, State::ShuttingDown | State::Terminated) {
            return;
        }
        self.enter(State::ShuttingDown);
        if let Err(e) = self.indicator.clear() {
            log::warn!("Unable to clear display: {:?}", e);
        }
        if let Err(e) = self.transport.disconnect().await {
            log::warn!("Unable to disconnect: {}", e);
        }
        self.enter(State::Terminated);
        log::info!("Weather station stopped");
    }

    fn show(&mut self, status: Status) {
        if let Err(e) = self.indicator.show(status) {
            log::warn!("Unable to show {:?} status: {:?}", status, e);
        }
    }

    fn enter(&mut self, state: State) {
        if self.state != state {
            log::debug!("{:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}
