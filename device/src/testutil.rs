//! Scripted stand-ins for sensors, LED matrices and transports, for testing applications
//! without hardware or a broker.
//!
//! The matrix and transport doubles are cheap to clone and clones share the same record, so a
//! test can hand one clone to the code under test and inspect the other afterwards.

use crate::clients::mqtt::topic;
use crate::domain::led::matrix::Frame;
use crate::domain::temperature::{Celsius, Temperature};
use crate::traits::led::LedMatrix;
use crate::traits::sensors::humidity::HumiditySensor;
use crate::traits::sensors::temperature::TemperatureSensor;
use crate::traits::transport::{
    Delivery, InboundMessage, MessageHandler, QoS, Transport, TransportError,
};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A signal the test doubles can raise to stop the code under test.
pub type TestSignal = Signal<CriticalSectionRawMutex, ()>;

/// Error returned by scripted test doubles.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("scripted failure")]
pub struct TestError;

/// Raises `signal` once `remaining` reaches zero.
struct Trigger {
    remaining: usize,
    signal: &'static TestSignal,
}

impl Trigger {
    fn tick(trigger: &mut Option<Trigger>) {
        if let Some(t) = trigger {
            t.remaining = t.remaining.saturating_sub(1);
            if t.remaining == 0 {
                t.signal.signal(());
                *trigger = None;
            }
        }
    }
}

/// A sensor returning a scripted sequence of `(temperature °C, humidity %)` readings.
///
/// Each temperature read advances the script; the humidity read that follows returns the
/// humidity of the same entry. Once the script is exhausted the last reading repeats.
pub struct ScriptedSensor {
    script: VecDeque<Result<(f32, f32), TestError>>,
    current: Result<(f32, f32), TestError>,
    reads: usize,
    trigger: Option<Trigger>,
}

impl ScriptedSensor {
    pub fn new<I: IntoIterator<Item = (f32, f32)>>(readings: I) -> Self {
        Self::scripted(readings.into_iter().map(Ok))
    }

    /// A script that may contain read failures.
    pub fn scripted<I: IntoIterator<Item = Result<(f32, f32), TestError>>>(script: I) -> Self {
        Self {
            script: script.into_iter().collect(),
            current: Err(TestError),
            reads: 0,
            trigger: None,
        }
    }

    /// Always returns the same reading.
    pub fn constant(temperature: f32, humidity: f32) -> Self {
        Self::new([(temperature, humidity)])
    }

    /// Raises `signal` after `reads` temperature reads.
    pub fn shutdown_after(mut self, reads: usize, signal: &'static TestSignal) -> Self {
        self.trigger = Some(Trigger {
            remaining: reads,
            signal,
        });
        self
    }

    /// Number of temperature reads so far.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl TemperatureSensor<Celsius> for ScriptedSensor {
    type Error = TestError;

    async fn temperature(&mut self) -> Result<Temperature<Celsius>, Self::Error> {
        if let Some(next) = self.script.pop_front() {
            self.current = next;
        }
        self.reads += 1;
        Trigger::tick(&mut self.trigger);
        self.current.map(|(t, _)| Temperature::new(t))
    }
}

impl HumiditySensor for ScriptedSensor {
    type Error = TestError;

    async fn relative_humidity(&mut self) -> Result<f32, Self::Error> {
        self.current.map(|(_, h)| h)
    }
}

/// Something that happened to a [`TestMatrix`].
#[derive(Clone, Debug, PartialEq)]
pub enum MatrixEvent<const SIZE: usize> {
    Render(Frame<SIZE>),
    Clear,
}

#[derive(Default)]
struct MatrixRecord<const SIZE: usize> {
    events: Vec<MatrixEvent<SIZE>>,
    failing: bool,
}

/// A matrix recording every frame rendered on it.
#[derive(Clone, Default)]
pub struct TestMatrix<const SIZE: usize> {
    record: Rc<RefCell<MatrixRecord<SIZE>>>,
}

impl<const SIZE: usize> TestMatrix<SIZE> {
    pub fn new() -> Self {
        Self {
            record: Rc::new(RefCell::new(MatrixRecord {
                events: Vec::new(),
                failing: false,
            })),
        }
    }

    /// Makes every following render and clear fail.
    pub fn set_failing(&self, failing: bool) {
        self.record.borrow_mut().failing = failing;
    }

    pub fn events(&self) -> Vec<MatrixEvent<SIZE>> {
        self.record.borrow().events.clone()
    }

    /// Frames rendered so far, in order.
    pub fn frames(&self) -> Vec<Frame<SIZE>> {
        self.record
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                MatrixEvent::Render(frame) => Some(frame.clone()),
                MatrixEvent::Clear => None,
            })
            .collect()
    }

    pub fn clears(&self) -> usize {
        self.record
            .borrow()
            .events
            .iter()
            .filter(|e| matches!(e, MatrixEvent::Clear))
            .count()
    }

    pub fn last(&self) -> Option<MatrixEvent<SIZE>> {
        self.record.borrow().events.last().cloned()
    }

    fn record(&self, event: MatrixEvent<SIZE>) -> Result<(), TestError> {
        let mut record = self.record.borrow_mut();
        if record.failing {
            return Err(TestError);
        }
        record.events.push(event);
        Ok(())
    }
}

impl<const SIZE: usize> LedMatrix<SIZE> for TestMatrix<SIZE> {
    type Error = TestError;

    fn render(&mut self, frame: &Frame<SIZE>) -> Result<(), Self::Error> {
        self.record(MatrixEvent::Render(frame.clone()))
    }

    fn clear(&mut self) -> Result<(), Self::Error> {
        self.record(MatrixEvent::Clear)
    }
}

/// A message handed to [`TestTransport::publish`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

impl Published {
    pub fn payload_str(&self) -> &str {
        core::str::from_utf8(&self.payload).unwrap_or("<binary>")
    }
}

#[derive(Default)]
struct TransportRecord {
    connect_results: VecDeque<Result<(), TransportError>>,
    publish_results: VecDeque<Result<Delivery, TransportError>>,
    connected: bool,
    connects: usize,
    disconnects: usize,
    published: Vec<Published>,
    subscriptions: Vec<(String, QoS, MessageHandler)>,
    trigger: Option<Trigger>,
    stall_connect: Option<&'static TestSignal>,
}

/// A transport that records calls and answers from scripted results.
///
/// Without scripted results every connect succeeds and every publish is sent.
#[derive(Clone, Default)]
pub struct TestTransport {
    record: Rc<RefCell<TransportRecord>>,
}

impl TestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer to the next connect call.
    pub fn push_connect_result(&self, result: Result<(), TransportError>) {
        self.record.borrow_mut().connect_results.push_back(result);
    }

    /// Answer to the next publish call.
    pub fn push_publish_result(&self, result: Result<Delivery, TransportError>) {
        self.record.borrow_mut().publish_results.push_back(result);
    }

    /// Makes the next connect call raise `signal` and then never complete, like a broker that
    /// does not answer.
    pub fn stall_connect(&self, signal: &'static TestSignal) {
        self.record.borrow_mut().stall_connect = Some(signal);
    }

    /// Raises `signal` after `publishes` publish calls.
    pub fn shutdown_after(&self, publishes: usize, signal: &'static TestSignal) {
        self.record.borrow_mut().trigger = Some(Trigger {
            remaining: publishes,
            signal,
        });
    }

    pub fn published(&self) -> Vec<Published> {
        self.record.borrow().published.clone()
    }

    pub fn connects(&self) -> usize {
        self.record.borrow().connects
    }

    pub fn disconnects(&self) -> usize {
        self.record.borrow().disconnects
    }

    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.record
            .borrow()
            .subscriptions
            .iter()
            .map(|(filter, qos, _)| (filter.clone(), *qos))
            .collect()
    }

    /// Hands a message to every handler subscribed to a matching filter.
    pub fn deliver(&self, topic_name: &str, payload: &[u8]) -> usize {
        let handlers: Vec<MessageHandler> = self
            .record
            .borrow()
            .subscriptions
            .iter()
            .filter(|(filter, _, _)| topic::matches(filter, topic_name))
            .map(|(_, _, handler)| handler.clone())
            .collect();
        for handler in handlers.iter() {
            handler(InboundMessage::new(topic_name, payload));
        }
        handlers.len()
    }
}

impl Transport for TestTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        let stall = {
            let mut record = self.record.borrow_mut();
            record.connects += 1;
            record.stall_connect.take()
        };
        if let Some(signal) = stall {
            signal.signal(());
            core::future::pending::<()>().await;
        }

        let mut record = self.record.borrow_mut();
        let result = record.connect_results.pop_front().unwrap_or(Ok(()));
        record.connected = result.is_ok();
        result
    }

    async fn subscribe(
        &mut self,
        topic: &str,
        qos: QoS,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        self.record
            .borrow_mut()
            .subscriptions
            .push((topic.to_string(), qos, handler));
        Ok(())
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
    ) -> Result<Delivery, TransportError> {
        let mut record = self.record.borrow_mut();
        record.published.push(Published {
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
        });
        Trigger::tick(&mut record.trigger);
        let connected = record.connected;
        record.publish_results.pop_front().unwrap_or(if connected {
            Ok(Delivery::Sent)
        } else {
            Ok(Delivery::Queued)
        })
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let mut record = self.record.borrow_mut();
        record.disconnects += 1;
        record.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.record.borrow().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_scripted_sensor_repeats_last() {
        let mut sensor = ScriptedSensor::scripted([Ok((20.0, 40.0)), Err(TestError), Ok((21.0, 41.0))]);
        assert_eq!(20.0, block_on(sensor.temperature()).unwrap().raw_value());
        assert_eq!(40.0, block_on(sensor.relative_humidity()).unwrap());
        assert!(block_on(sensor.temperature()).is_err());
        assert_eq!(21.0, block_on(sensor.temperature()).unwrap().raw_value());
        assert_eq!(21.0, block_on(sensor.temperature()).unwrap().raw_value());
        assert_eq!(41.0, block_on(sensor.relative_humidity()).unwrap());
        assert_eq!(4, sensor.reads());
    }

    #[test]
    fn test_sensor_trigger() {
        static SIGNAL: TestSignal = Signal::new();
        let mut sensor = ScriptedSensor::constant(20.0, 40.0).shutdown_after(2, &SIGNAL);
        block_on(sensor.temperature()).unwrap();
        assert!(!SIGNAL.signaled());
        block_on(sensor.temperature()).unwrap();
        assert!(SIGNAL.signaled());
    }

    #[test]
    fn test_transport_delivers_to_matching_handlers() {
        let transport = TestTransport::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler: MessageHandler = Arc::new(move |_: InboundMessage| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let mut client = transport.clone();
        block_on(client.subscribe("output/+", QoS::AtLeastOnce, handler)).unwrap();
        assert_eq!(1, transport.deliver("output/weather_station", b"hello"));
        assert_eq!(0, transport.deliver("input/weather_station", b"hello"));
        assert_eq!(1, calls.load(Ordering::SeqCst));
    }

    #[test]
    fn test_transport_scripted_results() {
        let transport = TestTransport::new();
        transport.push_connect_result(Err(TransportError::Timeout("connect")));
        let mut client = transport.clone();

        assert!(block_on(client.connect()).is_err());
        assert_eq!(
            Delivery::Queued,
            block_on(client.publish("t", b"1", QoS::AtMostOnce)).unwrap()
        );
        block_on(client.connect()).unwrap();
        assert_eq!(
            Delivery::Sent,
            block_on(client.publish("t", b"2", QoS::AtMostOnce)).unwrap()
        );
        assert_eq!(2, transport.connects());
        assert_eq!("2", transport.published()[1].payload_str());
    }
}
