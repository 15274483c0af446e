//! MQTT over mutual TLS, as spoken by AWS IoT Core and similar brokers.
//!
//! The client owns a background dispatch task, spawned on a tokio runtime, that drives the
//! connection. It reconnects with exponential backoff when the link drops, restores
//! subscriptions when the broker did not keep the session, and drains messages that were
//! published while offline.

pub mod ack;
pub mod queue;
pub mod topic;

use ack::{AckSignal, Acknowledgements, Packet};
use crate::traits::transport::{
    Delivery, InboundMessage, MessageHandler, QoS, Transport, TransportError,
};
use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::with_timeout;
use queue::{drain_interval, DropBehavior, OfflineQueue, OutboundMessage, QueueLimit};
use rumqttc::{
    AsyncClient, ClientError, ConnectionError, Event, EventLoop, Incoming, MqttOptions, Outgoing,
    SubscribeReasonCode, TlsConfiguration,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Capacity of the request channel between the client handle and its event loop.
const REQUEST_CAPACITY: usize = 64;

/// Pause before a drained message is handed over again when the request channel is full.
const DRAIN_RETRY: Duration = Duration::from_millis(100);

/// ALPN protocol that lets AWS IoT Core accept MQTT on port 443.
const AWS_IOT_ALPN: &[u8] = b"x-amzn-mqtt-ca";

/// File locations of the certificates and key used for mutual TLS.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub root_ca: PathBuf,
    pub private_key: PathBuf,
    pub certificate: PathBuf,
}

impl Credentials {
    /// Credentials laid out as `root-ca.pem`, `<prefix>-private.pem.key` and
    /// `<prefix>-certificate.pem.crt` in `directory`.
    pub fn from_directory<P: AsRef<Path>>(directory: P, prefix: &str) -> Self {
        let directory = directory.as_ref();
        Self {
            root_ca: directory.join("root-ca.pem"),
            private_key: directory.join(format!("{}-private.pem.key", prefix)),
            certificate: directory.join(format!("{}-certificate.pem.crt", prefix)),
        }
    }

    fn load(&self) -> Result<TlsMaterial, TransportError> {
        Ok(TlsMaterial {
            ca: read(&self.root_ca)?,
            key: read(&self.private_key)?,
            certificate: read(&self.certificate)?,
        })
    }
}

struct TlsMaterial {
    ca: Vec<u8>,
    key: Vec<u8>,
    certificate: Vec<u8>,
}

fn read(path: &Path) -> Result<Vec<u8>, TransportError> {
    std::fs::read(path).map_err(|source| TransportError::Credentials {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Clone, Debug)]
pub struct MqttConfig {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub credentials: Credentials,
    pub queue_limit: QueueLimit,
    pub drop_behavior: DropBehavior,
    /// Queued messages sent per second after a reconnect.
    pub draining_frequency: f32,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    pub keep_alive: Duration,
    pub reconnect_base: Duration,
    pub reconnect_max: Duration,
}

impl MqttConfig {
    pub fn new<C: Into<String>, H: Into<String>>(
        client_id: C,
        host: H,
        port: u16,
        credentials: Credentials,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            host: host.into(),
            port,
            credentials,
            queue_limit: QueueLimit::Unbounded,
            drop_behavior: DropBehavior::Oldest,
            draining_frequency: 5.0,
            connect_timeout: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(5),
            keep_alive: Duration::from_secs(30),
            reconnect_base: Duration::from_secs(1),
            reconnect_max: Duration::from_secs(32),
        }
    }

    fn options(&self) -> Result<MqttOptions, TransportError> {
        if self.client_id.is_empty() || self.client_id.starts_with(' ') {
            return Err(TransportError::InvalidClientId(self.client_id.clone()));
        }
        let tls = self.credentials.load()?;
        let alpn = (self.port == 443).then(|| vec![AWS_IOT_ALPN.to_vec()]);

        let mut options = MqttOptions::new(self.client_id.as_str(), self.host.as_str(), self.port);
        options
            .set_keep_alive(self.keep_alive)
            .set_clean_session(true)
            .set_transport(rumqttc::Transport::Tls(TlsConfiguration::Simple {
                ca: tls.ca,
                alpn,
                client_auth: Some((tls.certificate, tls.key)),
            }));
        Ok(options)
    }
}

fn ticks(duration: Duration) -> embassy_time::Duration {
    embassy_time::Duration::from_micros(duration.as_micros() as u64)
}

fn mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
    }
}

struct Subscription {
    filter: String,
    qos: QoS,
    handler: MessageHandler,
}

/// State shared between the client handle and its dispatch task.
struct Shared {
    connected: AtomicBool,
    closing: AtomicBool,
    draining: AtomicBool,
    close: Notify,
    connack: Signal<CriticalSectionRawMutex, Result<(), String>>,
    acks: Mutex<CriticalSectionRawMutex, RefCell<Acknowledgements>>,
    queue: Mutex<CriticalSectionRawMutex, RefCell<OfflineQueue>>,
    subscriptions: Mutex<CriticalSectionRawMutex, RefCell<Vec<Subscription>>>,
}

impl Shared {
    fn new(queue: OfflineQueue) -> Self {
        Self {
            connected: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            close: Notify::new(),
            connack: Signal::new(),
            acks: Mutex::new(RefCell::new(Acknowledgements::default())),
            queue: Mutex::new(RefCell::new(queue)),
            subscriptions: Mutex::new(RefCell::new(Vec::new())),
        }
    }

    fn handlers_for(&self, topic: &str) -> Vec<MessageHandler> {
        self.subscriptions.lock(|subscriptions| {
            subscriptions
                .borrow()
                .iter()
                .filter(|s| topic::matches(&s.filter, topic))
                .map(|s| s.handler.clone())
                .collect()
        })
    }

    fn queue_is_empty(&self) -> bool {
        self.queue.lock(|queue| queue.borrow().is_empty())
    }

    /// Hands a publish to the client and records it in channel order.
    fn publish(
        &self,
        client: &AsyncClient,
        message: &OutboundMessage,
        waiter: Option<Arc<AckSignal>>,
    ) -> Result<(), ClientError> {
        self.acks.lock(|acks| {
            client.try_publish(
                message.topic.as_str(),
                mqtt_qos(message.qos),
                false,
                message.payload.clone(),
            )?;
            acks.borrow_mut().requested(Packet::Publish, waiter);
            Ok(())
        })
    }

    /// Hands a subscribe to the client and records it in channel order.
    fn subscribe(
        &self,
        client: &AsyncClient,
        filter: &str,
        qos: QoS,
        waiter: Option<Arc<AckSignal>>,
    ) -> Result<(), ClientError> {
        self.acks.lock(|acks| {
            client.try_subscribe(filter, mqtt_qos(qos))?;
            acks.borrow_mut().requested(Packet::Subscribe, waiter);
            Ok(())
        })
    }

    fn with_acks<R>(&self, f: impl FnOnce(&mut Acknowledgements) -> R) -> R {
        self.acks.lock(|acks| f(&mut acks.borrow_mut()))
    }
}

struct Session {
    client: AsyncClient,
    dispatch: JoinHandle<()>,
}

pub struct MqttClient {
    config: MqttConfig,
    runtime: Handle,
    shared: Arc<Shared>,
    session: Option<Session>,
}

impl MqttClient {
    /// Creates a disconnected client whose background work runs on `runtime`.
    pub fn new(config: MqttConfig, runtime: Handle) -> Self {
        let queue = OfflineQueue::new(config.queue_limit, config.drop_behavior);
        Self {
            config,
            runtime,
            shared: Arc::new(Shared::new(queue)),
            session: None,
        }
    }

    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    /// Messages waiting in the offline queue.
    pub fn queued_messages(&self) -> usize {
        self.shared.queue.lock(|queue| queue.borrow().len())
    }

    /// Messages lost to the offline queue limit.
    pub fn dropped_messages(&self) -> u64 {
        self.shared.queue.lock(|queue| queue.borrow().dropped())
    }

    pub fn subscriptions(&self) -> usize {
        self.shared
            .subscriptions
            .lock(|subscriptions| subscriptions.borrow().len())
    }

    fn enqueue(&self, message: OutboundMessage) -> Result<Delivery, TransportError> {
        log::debug!("Queueing message for {} while offline", message.topic);
        self.shared
            .queue
            .lock(|queue| queue.borrow_mut().push(message))?;
        Ok(Delivery::Queued)
    }

    fn start(&mut self) -> Result<(), TransportError> {
        let options = self.config.options()?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        self.shared.closing.store(false, Ordering::SeqCst);
        self.shared.with_acks(|acks| acks.clear());
        let dispatch = self.runtime.spawn(dispatch(
            eventloop,
            client.clone(),
            self.shared.clone(),
            Backoff::new(self.config.reconnect_base, self.config.reconnect_max),
            drain_interval(self.config.draining_frequency),
        ));
        self.session = Some(Session { client, dispatch });
        Ok(())
    }
}

impl Transport for MqttClient {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.is_connected() {
            return Ok(());
        }
        self.shared.connack.reset();
        if self.session.is_none() {
            log::info!(
                "Connecting to {}:{} as {}",
                self.config.host,
                self.config.port,
                self.config.client_id
            );
            self.start()?;
        }

        match with_timeout(ticks(self.config.connect_timeout), self.shared.connack.wait()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(TransportError::Rejected(reason)),
            Err(_) => Err(TransportError::Timeout("connect")),
        }
    }

    async fn subscribe(
        &mut self,
        topic: &str,
        qos: QoS,
        handler: MessageHandler,
    ) -> Result<(), TransportError> {
        self.shared.subscriptions.lock(|subscriptions| {
            let mut subscriptions = subscriptions.borrow_mut();
            subscriptions.retain(|s| s.filter != topic);
            subscriptions.push(Subscription {
                filter: topic.to_string(),
                qos,
                handler,
            });
        });

        let session = match &self.session {
            Some(session) if self.is_connected() => session,
            _ => {
                log::info!("Subscription to {} deferred until connected", topic);
                return Ok(());
            }
        };

        let waiter = Arc::new(AckSignal::new());
        self.shared
            .subscribe(&session.client, topic, qos, Some(waiter.clone()))
            .map_err(|e| TransportError::Client(e.to_string()))?;
        match with_timeout(ticks(self.config.operation_timeout), waiter.wait()).await {
            Ok(Ok(())) => {
                log::info!("Subscribed to {}", topic);
                Ok(())
            }
            Ok(Err(reason)) => Err(TransportError::Rejected(reason)),
            Err(_) => Err(TransportError::Timeout("subscribe")),
        }
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
    ) -> Result<Delivery, TransportError> {
        if !topic::is_valid_name(topic) {
            return Err(TransportError::Client(format!("invalid topic name {:?}", topic)));
        }
        let message = OutboundMessage::new(topic, payload, qos);
        let session = match &self.session {
            // Queued messages go out first
            Some(session) if self.is_connected() && self.shared.queue_is_empty() => session,
            _ => return self.enqueue(message),
        };

        let waiter = (qos == QoS::AtLeastOnce).then(|| Arc::new(AckSignal::new()));
        self.shared
            .publish(&session.client, &message, waiter.clone())
            .map_err(|e| TransportError::Client(e.to_string()))?;

        if let Some(waiter) = waiter {
            match with_timeout(ticks(self.config.operation_timeout), waiter.wait()).await {
                Ok(Ok(())) => {}
                Ok(Err(reason)) => return Err(TransportError::Rejected(reason)),
                Err(_) => return Err(TransportError::Timeout("publish")),
            }
        }
        Ok(Delivery::Sent)
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        log::info!("Disconnecting from {}", self.config.host);
        self.shared.closing.store(true, Ordering::SeqCst);
        self.shared.close.notify_one();

        if self.is_connected() {
            if let Err(e) = session.client.try_disconnect() {
                log::debug!("Disconnect request not delivered: {}", e);
            }
        }

        let timeout = ticks(self.config.connect_timeout);
        let result = match with_timeout(timeout, &mut session.dispatch).await {
            Ok(_) => Ok(()),
            Err(_) => {
                session.dispatch.abort();
                Err(TransportError::Timeout("disconnect"))
            }
        };
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.with_acks(|acks| acks.clear());
        result
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.dispatch.abort();
        }
    }
}

struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            current: base,
        }
    }

    fn next(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.base;
    }
}

async fn dispatch(
    mut eventloop: EventLoop,
    client: AsyncClient,
    shared: Arc<Shared>,
    mut backoff: Backoff,
    drain_every: Option<Duration>,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                log::info!("Connected (session present: {})", ack.session_present);
                shared.connected.store(true, Ordering::SeqCst);
                backoff.reset();
                shared.connack.signal(Ok(()));
                if !ack.session_present {
                    resubscribe(&client, &shared);
                }
                if !shared.queue_is_empty() {
                    tokio::spawn(drain(client.clone(), shared.clone(), drain_every));
                }
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                let message = InboundMessage::new(publish.topic, publish.payload.to_vec());
                let handlers = shared.handlers_for(&message.topic);
                if handlers.is_empty() {
                    log::debug!("No handler for message on {}", message.topic);
                }
                for handler in handlers {
                    handler(message.clone());
                }
            }
            Ok(Event::Incoming(Incoming::SubAck(ack))) => {
                let rejected = ack
                    .return_codes
                    .iter()
                    .any(|code| matches!(code, SubscribeReasonCode::Failure));
                let result = if rejected {
                    Err(format!("subscription {} refused", ack.pkid))
                } else {
                    Ok(())
                };
                shared.with_acks(|acks| acks.acknowledged(Packet::Subscribe, ack.pkid, result));
            }
            Ok(Event::Incoming(Incoming::PubAck(ack))) => {
                shared.with_acks(|acks| acks.acknowledged(Packet::Publish, ack.pkid, Ok(())))
            }
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => {
                shared.with_acks(|acks| acks.sent(Packet::Publish, pkid))
            }
            Ok(Event::Outgoing(Outgoing::Subscribe(pkid))) => {
                shared.with_acks(|acks| acks.sent(Packet::Subscribe, pkid))
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                log::debug!("Disconnect sent");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                shared.connected.store(false, Ordering::SeqCst);
                if shared.closing.load(Ordering::SeqCst) {
                    break;
                }
                let reason = match &e {
                    ConnectionError::ConnectionRefused(code) => format!("refused: {:?}", code),
                    other => other.to_string(),
                };
                shared.connack.signal(Err(reason));

                let delay = backoff.next();
                log::warn!("Connection lost: {}. Retrying in {:?}", e, delay);
                if tokio::time::timeout(delay, shared.close.notified())
                    .await
                    .is_ok()
                {
                    break;
                }
            }
        }
    }
    shared.connected.store(false, Ordering::SeqCst);
    log::debug!("Dispatch stopped");
}

fn resubscribe(client: &AsyncClient, shared: &Shared) {
    shared.subscriptions.lock(|subscriptions| {
        for subscription in subscriptions.borrow().iter() {
            log::info!("Subscribing to {}", subscription.filter);
            if let Err(e) = shared.subscribe(client, &subscription.filter, subscription.qos, None) {
                log::warn!("Unable to subscribe to {}: {}", subscription.filter, e);
            }
        }
    });
}

/// Sends queued messages in order, pausing `every` between two of them.
async fn drain(client: AsyncClient, shared: Arc<Shared>, every: Option<Duration>) {
    if shared.draining.swap(true, Ordering::SeqCst) {
        return;
    }
    let mut sent = 0usize;
    loop {
        while shared.connected.load(Ordering::SeqCst) {
            let Some(message) = shared.queue.lock(|queue| queue.borrow_mut().pop()) else {
                break;
            };
            if let Err(e) = shared.publish(&client, &message, None) {
                log::debug!("Unable to drain message for {}: {}", message.topic, e);
                shared.queue.lock(|queue| queue.borrow_mut().requeue(message));
                tokio::time::sleep(DRAIN_RETRY).await;
                continue;
            }
            sent += 1;
            if let Some(every) = every {
                tokio::time::sleep(every).await;
            }
        }
        shared.draining.store(false, Ordering::SeqCst);

        // a publish may have queued behind us after the last pop
        if shared.queue_is_empty()
            || !shared.connected.load(Ordering::SeqCst)
            || shared.draining.swap(true, Ordering::SeqCst)
        {
            break;
        }
    }
    if sent > 0 {
        log::info!("Drained {} queued message(s)", sent);
    }
}
