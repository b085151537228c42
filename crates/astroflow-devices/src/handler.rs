/*!
 * INDI device protocol handler.
 *
 * The handler is the single entry point for decoded inbound messages. It
 * classifies drivers, merges vector state into devices, parks messages for
 * devices that are not registered yet and publishes every resulting
 * [`DeviceEvent`] to the registered listeners.
 *
 * Routing state lives behind one mutex, so `handle`, `retry_pending` and
 * `close` are atomic relative to each other. Events are published after the
 * state lock is released but while a reentrant dispatch gate is held, so
 * listeners observe events in state-change order and may call the read
 * accessors without deadlocking. A listener may also call `handle` or
 * `close`: events produced by such nested calls are queued behind the batch
 * being delivered and published by the outermost call.
 */
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use parking_lot::ReentrantMutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use astroflow_core::config::{Config, HandlerConfig};
use astroflow_core::error::Error as CoreError;
use astroflow_core::event::{EventDispatcher, SharedListener};
use astroflow_core::logging::operation_span;

use crate::device::{format_message, Device, DeviceKind, Result};
use crate::event::DeviceEvent;
use crate::protocol::{DelProperty, Message, DRIVER_INFO};
use crate::registry::{DeviceRegistry, DriverTable, Registration};
use crate::reorder::ReorderingQueue;
use crate::sender::MessageSender;

/// Routing state guarded by the handler lock
#[derive(Debug)]
struct HandlerState {
    registry: DeviceRegistry,
    queue: ReorderingQueue,
    closed: bool,
}

impl HandlerState {
    fn route(&mut self, message: Message, events: &mut Vec<DeviceEvent>) {
        if self.registry.is_rejected(message.device()) {
            trace!(device = %message.device(), "Dropping message for rejected device");
            return;
        }

        let message = match message {
            Message::Message(text) => {
                let device = match text.device.as_str() {
                    "" => None,
                    name => self.registry.find_by_name(name),
                };
                events.push(match device {
                    Some(device) => device.record_message(&text),
                    None => DeviceEvent::MessageReceived {
                        device: None,
                        text: format_message(&text),
                    },
                });
                return;
            }
            other => other,
        };

        if message.device().is_empty() {
            debug!(vector = ?message.vector_name(), "Dropping message without device name");
            return;
        }

        match message {
            Message::DelProperty(del) => self.delete(del, events),
            Message::DefVector(def) if def.name == DRIVER_INFO => self.driver_info(Message::DefVector(def), events),
            other => match self.registry.find_by_name(other.device()) {
                Some(device) => merge(&device, &other, events),
                None => self.queue.offer(other),
            },
        }
    }

    fn driver_info(&mut self, message: Message, events: &mut Vec<DeviceEvent>) {
        let Message::DefVector(def) = &message else {
            return;
        };
        match self.registry.on_driver_info(def) {
            Registration::Rejected { .. } => {
                let purged = self.queue.purge(&def.device);
                if purged > 0 {
                    debug!(device = %def.device, purged, "Purged queued messages for rejected device");
                }
            }
            Registration::Registered { device, events: attached } => {
                let registered = !attached.is_empty();
                events.extend(attached);
                merge(&device, &message, events);
                if registered {
                    let queued = self.queue.drain_device(device.name());
                    if !queued.is_empty() {
                        debug!(device = %device.name(), count = queued.len(), "Replaying queued messages");
                    }
                    for queued in &queued {
                        merge(&device, queued, events);
                    }
                }
            }
        }
    }

    fn delete(&mut self, del: DelProperty, events: &mut Vec<DeviceEvent>) {
        let Some(device) = self.registry.find_by_name(&del.device) else {
            debug!(device = %del.device, vector = %del.name, "Ignoring delete for unknown device");
            return;
        };
        if del.is_whole_device() {
            if let Some(detached) = self.registry.unregister(&device) {
                events.extend(detached);
            }
        } else if let Some(deleted) = device.remove_property(&del.name) {
            events.push(deleted);
        }
    }

    fn retry(&mut self, events: &mut Vec<DeviceEvent>) {
        for pending in self.queue.take_all() {
            let name = pending.message.device();
            if self.registry.is_rejected(name) {
                continue;
            }
            match self.registry.find_by_name(name) {
                Some(device) => merge(&device, &pending.message, events),
                None => {
                    self.queue.requeue(pending);
                }
            }
        }
    }
}

/// Merge a vector message into a known device. A fresh connection triggers a
/// `GetProperties` request for the device.
fn merge(device: &Arc<Device>, message: &Message, events: &mut Vec<DeviceEvent>) {
    let merged = match message {
        Message::DefVector(def) => device.apply_def(def),
        Message::SetVector(set) => device.apply_set(set),
        _ => return,
    };
    let connected = merged
        .iter()
        .any(|e| matches!(e, DeviceEvent::Connected { .. }));
    events.extend(merged);

    if connected {
        if let Err(e) = device.get_properties(None) {
            warn!(device = %device.name(), error = %e, "Failed to request properties");
        }
    }
}

/// Events waiting for delivery on the thread holding the dispatch gate
#[derive(Debug, Default)]
struct Outbox {
    events: VecDeque<DeviceEvent>,
    delivering: bool,
}

/// Client-side handler of the INDI device protocol
#[derive(Debug)]
pub struct DeviceProtocolHandler {
    state: Mutex<HandlerState>,
    gate: ReentrantMutex<RefCell<Outbox>>,
    dispatcher: EventDispatcher<DeviceEvent>,
    config: HandlerConfig,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceProtocolHandler {
    /// Create a handler with default settings and driver table
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self::with_drivers(sender, HandlerConfig::default(), DriverTable::default())
    }

    /// Create a handler from the application configuration
    pub fn with_config(sender: Arc<dyn MessageSender>, config: &Config) -> Result<Self> {
        config.handler.validate()?;
        let drivers = DriverTable::from_config(&config.drivers)?;
        Ok(Self::with_drivers(sender, config.handler.clone(), drivers))
    }

    /// Create a handler with explicit settings and driver table
    pub fn with_drivers(sender: Arc<dyn MessageSender>, config: HandlerConfig, drivers: DriverTable) -> Self {
        let registry = DeviceRegistry::new(drivers, sender, config.message_log_capacity);
        Self {
            state: Mutex::new(HandlerState {
                registry,
                queue: ReorderingQueue::new(config.retry_ceiling),
                closed: false,
            }),
            gate: ReentrantMutex::new(RefCell::new(Outbox::default())),
            dispatcher: EventDispatcher::new(),
            config,
            reader: Mutex::new(None),
        }
    }

    /// Handler settings
    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, HandlerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `events` and, unless a call further up this thread's stack is
    /// already delivering, publish everything queued in order.
    fn publish(&self, outbox: &RefCell<Outbox>, events: Vec<DeviceEvent>) {
        {
            let mut outbox = outbox.borrow_mut();
            outbox.events.extend(events);
            if outbox.delivering {
                return;
            }
            outbox.delivering = true;
        }

        loop {
            let next = outbox.borrow_mut().events.pop_front();
            let Some(event) = next else {
                break;
            };
            trace!(event = event.event_type(), device = ?event.device_name(), "Publishing event");
            self.dispatcher.publish(&event);
        }

        outbox.borrow_mut().delivering = false;
    }

    /// Run one step under the state lock and publish the events it produced
    fn dispatch(&self, step: impl FnOnce(&mut HandlerState, &mut Vec<DeviceEvent>)) {
        let gate = self.gate.lock();
        let mut events = Vec::new();
        {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            step(&mut state, &mut events);
        }
        self.publish(&gate, events);
    }

    /// Handle one inbound message. Does nothing once the handler is closed.
    pub fn handle(&self, message: Message) {
        let span = operation_span(message.message_type(), message.device());
        let _entered = span.enter();
        self.dispatch(|state, events| state.route(message, events));
    }

    /// Retry every queued message once
    pub fn retry_pending(&self) {
        self.dispatch(|state, events| state.retry(events));
    }

    /// Start a reader task that handles messages from `inbound` and retries
    /// queued messages on the configured interval. Must be called within a
    /// tokio runtime.
    pub fn start(self: &Arc<Self>, mut inbound: mpsc::Receiver<Message>) -> Result<()> {
        if self.is_closed() {
            return Err(CoreError::other("protocol handler is closed").into());
        }
        let mut reader = self
            .reader
            .lock()
            .map_err(|_| CoreError::other("Failed to acquire lock on reader task"))?;
        if reader.is_some() {
            return Err(CoreError::other("protocol handler already started").into());
        }

        let handler: Weak<Self> = Arc::downgrade(self);
        let period = self.config.retry_interval();

        *reader = Some(tokio::spawn(async move {
            let mut retry = tokio::time::interval(period);
            retry.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    message = inbound.recv() => {
                        let Some(message) = message else {
                            debug!("Inbound channel closed, stopping reader");
                            break;
                        };
                        let Some(handler) = handler.upgrade() else { break };
                        handler.handle(message);
                    }
                    _ = retry.tick() => {
                        let Some(handler) = handler.upgrade() else { break };
                        if handler.pending_messages() > 0 {
                            handler.retry_pending();
                        }
                    }
                }
            }
        }));

        info!("Protocol handler started");
        Ok(())
    }

    /// Create the inbound channel, sized from the handler settings, and start
    /// the reader task on its receiving end.
    pub fn start_inbound(self: &Arc<Self>) -> Result<mpsc::Sender<Message>> {
        let (tx, rx) = mpsc::channel(self.config.inbound_capacity.max(1));
        self.start(rx)?;
        Ok(tx)
    }

    /// Stop the reader task, tear down every device and drop queued
    /// messages. Later calls to [`handle`](Self::handle) do nothing.
    pub fn close(&self) {
        let gate = self.gate.lock();

        if let Some(reader) = self.reader.lock().unwrap_or_else(PoisonError::into_inner).take() {
            reader.abort();
        }

        let events = {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            state.closed = true;
            state.queue.clear();
            state.registry.clear()
        };

        info!(detached = events.len(), "Protocol handler closed");
        self.publish(&gate, events);
    }

    /// Whether [`close`](Self::close) has been called
    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// Register a listener. Returns `false` if it was already registered.
    pub fn register_event_handler(&self, listener: SharedListener<DeviceEvent>) -> Result<bool> {
        Ok(self.dispatcher.register(listener)?)
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn unregister_event_handler(&self, listener: &SharedListener<DeviceEvent>) -> Result<bool> {
        Ok(self.dispatcher.unregister(listener)?)
    }

    /// Device by name
    pub fn device(&self, name: &str) -> Option<Arc<Device>> {
        self.lock_state().registry.find_by_name(name)
    }

    /// Every registered device
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.lock_state().registry.devices()
    }

    fn devices_of(&self, kind: DeviceKind) -> Vec<Arc<Device>> {
        self.lock_state().registry.devices_of(kind)
    }

    /// Devices acting as cameras
    pub fn cameras(&self) -> Vec<Arc<Device>> {
        self.devices_of(DeviceKind::Camera)
    }

    /// Devices acting as mounts
    pub fn mounts(&self) -> Vec<Arc<Device>> {
        self.devices_of(DeviceKind::Mount)
    }

    /// Devices acting as focusers
    pub fn focusers(&self) -> Vec<Arc<Device>> {
        self.devices_of(DeviceKind::Focuser)
    }

    /// Devices acting as filter wheels
    pub fn filter_wheels(&self) -> Vec<Arc<Device>> {
        self.devices_of(DeviceKind::FilterWheel)
    }

    /// Devices acting as rotators
    pub fn rotators(&self) -> Vec<Arc<Device>> {
        self.devices_of(DeviceKind::Rotator)
    }

    /// Devices acting as GPS receivers
    pub fn gps(&self) -> Vec<Arc<Device>> {
        self.devices_of(DeviceKind::Gps)
    }

    /// Devices that can pulse guide
    pub fn guide_outputs(&self) -> Vec<Arc<Device>> {
        self.devices_of(DeviceKind::GuideOutput)
    }

    /// Devices that report a temperature
    pub fn thermometers(&self) -> Vec<Arc<Device>> {
        self.devices_of(DeviceKind::Thermometer)
    }

    /// Number of messages waiting for their device
    pub fn pending_messages(&self) -> usize {
        self.lock_state().queue.len()
    }
}

impl Drop for DeviceProtocolHandler {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            reader.abort();
        }
    }
}
