//! GATT Peripheral Module
//!
//! Owns the color service, the advertising lifecycle and the subscriber set.
//!
//! ```text
//!            start (PoweredOn)            registered
//!   Idle ─────────────────────▶ Registering ──────────▶ Advertising
//!    ▲                                                     │
//!    └──────────── stop / adapter leaves PoweredOn ────────┘
//! ```
//!
//! Every mutation commits fully before its [`AppEvent`] is published.

use crate::domain::adapter_state::{AdapterMonitor, AdapterState};
use crate::domain::color::{ColorCodec, ColorValue};
use crate::domain::errors::{DecodeError, PeripheralError, SendError, TransportError};
use crate::domain::models::{
    AppEvent, MessageSeverity, PeripheralSnapshot, PeripheralState, StatusMessage,
};
use crate::domain::settings::PeripheralIdentity;
use crate::infrastructure::bluetooth::adapter::PeripheralAdapter;
use crate::infrastructure::bluetooth::dispatcher::{
    NotificationDispatcher, NotifyTarget, SendReport,
};
use crate::infrastructure::bluetooth::gatt::{
    AdvertisementData, CharacteristicDescriptor, ServiceDescriptor,
};
use crate::infrastructure::bluetooth::protocol::{AttStatus, CentralId, RequestId};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of a write request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Success,
    /// Value did not decode; the stored value is unchanged
    WriteRejected(DecodeError),
    /// Not the color characteristic; left to the caller's default policy
    NotHandled,
}

impl WriteResult {
    /// ATT status to answer the requesting central with
    pub fn att_status(&self) -> AttStatus {
        match self {
            Self::Success => AttStatus::Success,
            Self::WriteRejected(DecodeError::InvalidLength(_)) => {
                AttStatus::InvalidAttributeValueLength
            }
            Self::WriteRejected(DecodeError::InvalidHex(_)) => AttStatus::UnlikelyError,
            Self::NotHandled => AttStatus::InvalidHandle,
        }
    }
}

pub struct GattPeripheral<A: PeripheralAdapter> {
    identity: PeripheralIdentity,
    adapter: A,
    adapter_state: AdapterMonitor,
    state: PeripheralState,
    service: Option<ServiceDescriptor>,
    subscribers: HashSet<CentralId>,
    current_color: Option<ColorValue>,
    dispatcher: NotificationDispatcher,
    event_sender: mpsc::UnboundedSender<AppEvent>,
}

impl<A: PeripheralAdapter> GattPeripheral<A> {
    pub fn new(
        identity: PeripheralIdentity,
        adapter: A,
        event_sender: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self::with_dispatcher(identity, adapter, event_sender, NotificationDispatcher::new())
    }

    pub fn with_dispatcher(
        identity: PeripheralIdentity,
        adapter: A,
        event_sender: mpsc::UnboundedSender<AppEvent>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            identity,
            adapter,
            adapter_state: AdapterMonitor::new(),
            state: PeripheralState::Idle,
            service: None,
            subscribers: HashSet::new(),
            current_color: None,
            dispatcher,
            event_sender,
        }
    }

    pub fn identity(&self) -> &PeripheralIdentity {
        &self.identity
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_state(&self) -> AdapterState {
        self.adapter_state.current()
    }

    pub fn state(&self) -> PeripheralState {
        self.state
    }

    pub fn is_advertising(&self) -> bool {
        self.state == PeripheralState::Advertising
    }

    pub fn is_registered(&self) -> bool {
        self.service.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn current_color(&self) -> Option<ColorValue> {
        self.current_color
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Stored value of the color characteristic
    pub fn cached_value(&self) -> Option<&[u8]> {
        self.service
            .as_ref()?
            .characteristic(self.identity.characteristic_id)?
            .cached_value
            .as_deref()
    }

    pub fn snapshot(&self) -> PeripheralSnapshot {
        PeripheralSnapshot {
            adapter_state: self.adapter_state(),
            state: self.state,
            advertising: self.is_advertising(),
            registered: self.is_registered(),
            subscriber_count: self.subscribers.len(),
            current_color: self.current_color,
        }
    }

    /// Whether `id` is the registered color characteristic
    pub fn is_color_characteristic(&self, id: Uuid) -> bool {
        self.service.is_some() && id == self.identity.characteristic_id
    }

    /// Apply a power state reported by the platform
    pub fn on_adapter_state(&mut self, state: AdapterState) {
        let Some(previous) = self.adapter_state.apply(state) else {
            return;
        };
        info!("Adapter state: {} -> {}", previous, state);

        // The platform drops published services and advertising once the
        // radio leaves PoweredOn
        let was_advertising = self.is_advertising();
        let had_subscribers = !self.subscribers.is_empty();
        if !state.is_powered_on() {
            self.state = PeripheralState::Idle;
            self.service = None;
            self.subscribers.clear();
        }

        self.publish(AppEvent::AdapterStateChanged(state));
        if was_advertising && !self.is_advertising() {
            self.publish(AppEvent::AdvertisingChanged(false));
        }
        if had_subscribers && self.subscribers.is_empty() {
            self.publish(AppEvent::SubscribersChanged(0));
        }

        let severity = match state {
            AdapterState::PoweredOn => MessageSeverity::Info,
            AdapterState::Unknown | AdapterState::Resetting => MessageSeverity::Warning,
            _ => MessageSeverity::Error,
        };
        self.send_log(state.description(), severity);
    }

    /// Register the color service (once per power cycle) and start advertising
    pub fn start_advertising(&mut self) -> Result<(), PeripheralError> {
        let adapter_state = self.adapter_state();
        if !adapter_state.is_powered_on() {
            warn!("Cannot advertise, adapter is {}", adapter_state);
            self.send_log(
                "Bluetooth is not powered on. Please enable Bluetooth.",
                MessageSeverity::Error,
            );
            return Err(PeripheralError::AdapterNotReady(adapter_state));
        }

        if self.is_advertising() {
            debug!("Already advertising");
            return Ok(());
        }

        let newly_registered = if self.service.is_none() {
            self.state = PeripheralState::Registering;
            // A re-registration after a power cycle carries the last committed value
            let mut characteristic =
                CharacteristicDescriptor::read_write_notify(self.identity.characteristic_id);
            characteristic.cached_value = self.current_color.map(ColorCodec::encode);
            let service = ServiceDescriptor::primary(self.identity.service_id, vec![characteristic]);
            if let Err(e) = self.adapter.add_service(&service) {
                self.state = PeripheralState::Idle;
                return Err(self.platform_failure("Service registration failed", e));
            }
            info!("Registered service {}", service.service_id);
            self.service = Some(service);
            true
        } else {
            false
        };

        let advertisement = AdvertisementData {
            service_uuids: vec![self.identity.service_id],
            local_name: self.identity.local_name.clone(),
        };
        if let Err(e) = self.adapter.start_advertising(&advertisement) {
            if newly_registered {
                self.adapter.remove_service(self.identity.service_id);
                self.service = None;
            }
            self.state = PeripheralState::Idle;
            return Err(self.platform_failure("Advertising failed", e));
        }

        self.state = PeripheralState::Advertising;
        info!("Advertising as {:?}", self.identity.local_name);
        self.publish(AppEvent::AdvertisingChanged(true));
        self.send_log("Advertising started successfully!", MessageSeverity::Success);
        Ok(())
    }

    /// Stop advertising; registration and subscribers are kept
    pub fn stop_advertising(&mut self) {
        self.adapter.stop_advertising();
        let was_advertising = self.is_advertising();
        self.state = PeripheralState::Idle;

        if was_advertising {
            info!("Advertising stopped");
            self.publish(AppEvent::AdvertisingChanged(false));
            self.send_log("Advertising stopped", MessageSeverity::Info);
        }
    }

    /// Answer a read with a freshly generated random color
    ///
    /// Returns `None` for characteristics this peripheral does not own.
    pub fn handle_read_request(&mut self, characteristic_id: Uuid) -> Option<Vec<u8>> {
        if !self.is_color_characteristic(characteristic_id) {
            debug!("Ignoring read of {}", characteristic_id);
            return None;
        }
        let color = ColorCodec::random_color();
        debug!("Read request answered with {}", color);
        Some(self.commit(color))
    }

    /// Decode and store a written color
    pub fn handle_write_request(&mut self, characteristic_id: Uuid, value: &[u8]) -> WriteResult {
        if !self.is_color_characteristic(characteristic_id) {
            debug!("Ignoring write to {}", characteristic_id);
            return WriteResult::NotHandled;
        }

        match ColorCodec::decode(value) {
            Ok(color) => {
                info!("Received hex color code from central: {}", color);
                self.commit(color);
                WriteResult::Success
            }
            Err(e) => {
                warn!("Invalid hex color code received: {}", e);
                self.send_log(
                    format!("Rejected color write: {}", e),
                    MessageSeverity::Warning,
                );
                WriteResult::WriteRejected(e)
            }
        }
    }

    pub fn on_subscribe(&mut self, central: CentralId, characteristic_id: Uuid) {
        if !self.is_color_characteristic(characteristic_id) {
            return;
        }
        info!("Central {} subscribed to {}", central, characteristic_id);
        if self.subscribers.insert(central) {
            self.publish(AppEvent::SubscribersChanged(self.subscribers.len()));
        }
    }

    pub fn on_unsubscribe(&mut self, central: &CentralId, characteristic_id: Uuid) {
        if !self.is_color_characteristic(characteristic_id) {
            return;
        }
        info!("Central {} unsubscribed from {}", central, characteristic_id);
        if self.subscribers.remove(central) {
            self.publish(AppEvent::SubscribersChanged(self.subscribers.len()));
        }
    }

    /// Notify subscribers of `color`, committing it once the transport accepts it
    pub fn send_value(&mut self, color: ColorValue) -> Result<SendReport, SendError> {
        let target = NotifyTarget {
            adapter_state: self.adapter_state(),
            characteristic_id: self
                .service
                .as_ref()
                .map(|_| self.identity.characteristic_id),
            subscribers: self.subscribers.iter().cloned().collect(),
        };

        match self.dispatcher.send_value(&mut self.adapter, &target, color) {
            Ok(report) => {
                self.commit(color);
                info!(
                    "Notification sent successfully: {} ({} centrals)",
                    color, report.recipients
                );
                Ok(report)
            }
            Err(e) => {
                let severity = match e {
                    SendError::TransportBusy => MessageSeverity::Warning,
                    _ => MessageSeverity::Error,
                };
                self.send_log(format!("Failed to send notification: {}", e), severity);
                Err(e)
            }
        }
    }

    pub fn send_random_color(&mut self) -> Result<SendReport, SendError> {
        self.send_value(ColorCodec::random_color())
    }

    /// Answer an ATT request through the platform
    pub fn respond(&mut self, request: RequestId, status: AttStatus, value: Option<Vec<u8>>) {
        debug!("Answering request {:?} with ATT status 0x{:02X}", request, status.code());
        self.adapter.respond(request, status, value);
    }

    /// Replace the stored value and publish the new color
    fn commit(&mut self, color: ColorValue) -> Vec<u8> {
        let encoded = ColorCodec::encode(color);
        let characteristic_id = self.identity.characteristic_id;
        if let Some(characteristic) = self
            .service
            .as_mut()
            .and_then(|s| s.characteristic_mut(characteristic_id))
        {
            characteristic.cached_value = Some(encoded.clone());
        }
        self.current_color = Some(color);
        self.publish(AppEvent::ColorChanged(color));
        encoded
    }

    fn platform_failure(&self, context: &str, err: TransportError) -> PeripheralError {
        error!("{}: {}", context, err);
        self.send_log(format!("{}: {}", context, err), MessageSeverity::Error);
        PeripheralError::Platform(err.to_string())
    }

    fn publish(&self, event: AppEvent) {
        let _ = self.event_sender.send(event);
    }

    fn send_log(&self, message: impl Into<String>, severity: MessageSeverity) {
        self.publish(AppEvent::LogMessage(StatusMessage::new(message, severity)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::PeripheralConfig;
    use crate::infrastructure::bluetooth::adapter::SimulatedAdapter;

    fn peripheral() -> (
        GattPeripheral<SimulatedAdapter>,
        SimulatedAdapter,
        mpsc::UnboundedReceiver<AppEvent>,
    ) {
        let identity = PeripheralConfig::default().validate().unwrap();
        let adapter = SimulatedAdapter::new();
        let (tx, rx) = mpsc::unbounded_channel();
        (GattPeripheral::new(identity, adapter.clone(), tx), adapter, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<AppEvent>) -> Vec<AppEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_start_requires_powered_on() {
        let (mut peripheral, adapter, _rx) = peripheral();

        for state in [
            AdapterState::Unknown,
            AdapterState::PoweredOff,
            AdapterState::Unauthorized,
            AdapterState::Unsupported,
            AdapterState::Resetting,
        ] {
            peripheral.on_adapter_state(state);
            assert_eq!(
                peripheral.start_advertising(),
                Err(PeripheralError::AdapterNotReady(state))
            );
            assert!(!peripheral.is_advertising());
        }
        assert_eq!(adapter.service_count(), 0);
        assert!(!adapter.is_advertising());
    }

    #[test]
    fn test_start_is_idempotent() {
        let (mut peripheral, adapter, _rx) = peripheral();
        peripheral.on_adapter_state(AdapterState::PoweredOn);

        peripheral.start_advertising().unwrap();
        peripheral.start_advertising().unwrap();

        assert!(peripheral.is_advertising());
        let log = adapter.log();
        assert_eq!(log.services.len(), 1);
        assert_eq!(log.services[0].characteristics.len(), 1);
        let advertisement = log.advertisement.as_ref().unwrap();
        assert_eq!(advertisement.local_name, "Color Peripheral");
        assert_eq!(
            advertisement.service_uuids,
            vec![peripheral.identity().service_id]
        );
    }

    #[test]
    fn test_restart_after_stop_does_not_reregister() {
        let (mut peripheral, adapter, _rx) = peripheral();
        peripheral.on_adapter_state(AdapterState::PoweredOn);

        peripheral.start_advertising().unwrap();
        peripheral.stop_advertising();
        assert!(!adapter.is_advertising());
        assert!(peripheral.is_registered());

        peripheral.start_advertising().unwrap();
        assert_eq!(adapter.service_count(), 1);
        assert!(adapter.is_advertising());
    }

    #[test]
    fn test_registration_failure_rolls_back() {
        let (mut peripheral, adapter, _rx) = peripheral();
        peripheral.on_adapter_state(AdapterState::PoweredOn);
        adapter.set_fail_registration(true);

        assert!(matches!(
            peripheral.start_advertising(),
            Err(PeripheralError::Platform(_))
        ));
        assert_eq!(peripheral.state(), PeripheralState::Idle);
        assert!(!peripheral.is_registered());

        adapter.set_fail_registration(false);
        peripheral.start_advertising().unwrap();
        assert!(peripheral.is_advertising());
    }

    #[test]
    fn test_write_then_bad_write_keeps_value() {
        let (mut peripheral, _adapter, mut rx) = peripheral();
        peripheral.on_adapter_state(AdapterState::PoweredOn);
        peripheral.start_advertising().unwrap();
        let color_id = peripheral.identity().characteristic_id;
        drain(&mut rx);

        assert_eq!(
            peripheral.handle_write_request(color_id, b"#00FF00"),
            WriteResult::Success
        );
        assert_eq!(peripheral.cached_value(), Some(&b"00FF00"[..]));
        assert_eq!(
            drain(&mut rx),
            vec![AppEvent::ColorChanged(ColorValue::new(0, 255, 0))]
        );

        let result = peripheral.handle_write_request(color_id, b"zzzzzz");
        assert!(matches!(
            result,
            WriteResult::WriteRejected(DecodeError::InvalidHex(_))
        ));
        assert_eq!(result.att_status(), AttStatus::UnlikelyError);
        assert_eq!(peripheral.cached_value(), Some(&b"00FF00"[..]));
        assert_eq!(
            peripheral.current_color(),
            Some(ColorValue::new(0, 255, 0))
        );
    }

    #[test]
    fn test_requests_for_other_characteristics_are_not_handled() {
        let (mut peripheral, _adapter, _rx) = peripheral();
        peripheral.on_adapter_state(AdapterState::PoweredOn);
        let color_id = peripheral.identity().characteristic_id;

        // Not registered yet
        assert_eq!(peripheral.handle_read_request(color_id), None);
        assert_eq!(
            peripheral.handle_write_request(color_id, b"000000"),
            WriteResult::NotHandled
        );

        peripheral.start_advertising().unwrap();
        let other = Uuid::from_u128(42);
        assert_eq!(peripheral.handle_read_request(other), None);
        assert_eq!(
            peripheral.handle_write_request(other, b"000000"),
            WriteResult::NotHandled
        );
        assert_eq!(peripheral.cached_value(), None);
    }

    #[test]
    fn test_read_generates_fresh_value() {
        let (mut peripheral, _adapter, _rx) = peripheral();
        peripheral.on_adapter_state(AdapterState::PoweredOn);
        peripheral.start_advertising().unwrap();
        let color_id = peripheral.identity().characteristic_id;
        peripheral.handle_write_request(color_id, b"123456");

        for _ in 0..16 {
            let value = peripheral.handle_read_request(color_id).unwrap();
            assert_eq!(value.len(), 6);
            assert!(value
                .iter()
                .all(|b| b.is_ascii_hexdigit() && !b.is_ascii_lowercase()));
            assert_eq!(peripheral.cached_value(), Some(value.as_slice()));
        }
    }

    #[test]
    fn test_subscriptions() {
        let (mut peripheral, _adapter, _rx) = peripheral();
        peripheral.on_adapter_state(AdapterState::PoweredOn);
        peripheral.start_advertising().unwrap();
        let color_id = peripheral.identity().characteristic_id;

        peripheral.on_subscribe(CentralId::from("a"), color_id);
        peripheral.on_subscribe(CentralId::from("a"), color_id);
        peripheral.on_subscribe(CentralId::from("b"), color_id);
        peripheral.on_subscribe(CentralId::from("c"), Uuid::from_u128(7));
        assert_eq!(peripheral.subscriber_count(), 2);

        peripheral.on_unsubscribe(&CentralId::from("a"), color_id);
        peripheral.on_unsubscribe(&CentralId::from("zz"), color_id);
        assert_eq!(peripheral.subscriber_count(), 1);

        // Stopping leaves subscribers to the link layer
        peripheral.stop_advertising();
        assert_eq!(peripheral.subscriber_count(), 1);
    }

    #[test]
    fn test_send_commits_only_accepted_values() {
        let (mut peripheral, adapter, _rx) = peripheral();
        let color = ColorValue::new(1, 2, 3);
        assert_eq!(peripheral.send_value(color), Err(SendError::NotReady));

        peripheral.on_adapter_state(AdapterState::PoweredOn);
        assert_eq!(peripheral.send_value(color), Err(SendError::NotReady));

        peripheral.start_advertising().unwrap();
        let color_id = peripheral.identity().characteristic_id;
        peripheral.on_subscribe(CentralId::from("a"), color_id);

        adapter.set_busy(true);
        assert_eq!(peripheral.send_value(color), Err(SendError::TransportBusy));
        assert_eq!(peripheral.cached_value(), None);

        adapter.set_busy(false);
        let report = peripheral.send_value(color).unwrap();
        assert_eq!(report.recipients, 1);
        assert_eq!(peripheral.cached_value(), Some(&b"010203"[..]));
        assert_eq!(adapter.notifications()[0].value, b"010203");
    }

    #[test]
    fn test_oversized_payload_rejected_before_transport() {
        let identity = PeripheralConfig::default().validate().unwrap();
        let adapter = SimulatedAdapter::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut peripheral = GattPeripheral::with_dispatcher(
            identity,
            adapter.clone(),
            tx,
            NotificationDispatcher::with_max_payload(4),
        );
        peripheral.on_adapter_state(AdapterState::PoweredOn);
        peripheral.start_advertising().unwrap();
        let color_id = peripheral.identity().characteristic_id;
        peripheral.on_subscribe(CentralId::from("a"), color_id);

        assert_eq!(
            peripheral.send_value(ColorValue::new(0, 0, 0)),
            Err(SendError::PayloadTooLarge { len: 6, max: 4 })
        );
        assert_eq!(adapter.update_attempts(), 0);
    }

    #[test]
    fn test_power_loss_resets_lifecycle() {
        let (mut peripheral, _adapter, mut rx) = peripheral();
        peripheral.on_adapter_state(AdapterState::PoweredOn);
        peripheral.start_advertising().unwrap();
        let color_id = peripheral.identity().characteristic_id;
        peripheral.on_subscribe(CentralId::from("a"), color_id);
        drain(&mut rx);

        peripheral.on_adapter_state(AdapterState::PoweredOff);

        let snapshot = peripheral.snapshot();
        assert_eq!(snapshot.state, PeripheralState::Idle);
        assert!(!snapshot.advertising);
        assert!(!snapshot.registered);
        assert_eq!(snapshot.subscriber_count, 0);

        let events = drain(&mut rx);
        assert_eq!(
            &events[..3],
            &[
                AppEvent::AdapterStateChanged(AdapterState::PoweredOff),
                AppEvent::AdvertisingChanged(false),
                AppEvent::SubscribersChanged(0),
            ]
        );
    }

    #[test]
    fn test_reregistration_keeps_committed_value() {
        let (mut peripheral, adapter, _rx) = peripheral();
        peripheral.on_adapter_state(AdapterState::PoweredOn);
        peripheral.start_advertising().unwrap();
        let color_id = peripheral.identity().characteristic_id;
        peripheral.handle_write_request(color_id, b"#00FF00");

        peripheral.on_adapter_state(AdapterState::PoweredOff);
        peripheral.on_adapter_state(AdapterState::PoweredOn);
        peripheral.start_advertising().unwrap();

        let green = ColorValue::new(0, 255, 0);
        assert_eq!(peripheral.current_color(), Some(green));
        assert_eq!(peripheral.cached_value(), Some(&b"00FF00"[..]));
        assert_eq!(
            peripheral.cached_value().map(<[u8]>::to_vec),
            peripheral.current_color().map(ColorCodec::encode)
        );
        // The platform receives the seeded value with the service
        let log = adapter.log();
        assert_eq!(
            log.services[0].characteristics[0].cached_value.as_deref(),
            Some(&b"00FF00"[..])
        );
    }
}
