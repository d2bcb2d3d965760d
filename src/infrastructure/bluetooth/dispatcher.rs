//! Notification Dispatcher
//!
//! Fans a color value out to the subscribed centrals. Delivery is
//! best-effort and at most once: a busy transport is reported to the caller,
//! never retried or queued here.

use crate::domain::adapter_state::AdapterState;
use crate::domain::color::{ColorCodec, ColorValue, MTU_FLOOR};
use crate::domain::errors::SendError;
use crate::infrastructure::bluetooth::adapter::PeripheralAdapter;
use crate::infrastructure::bluetooth::protocol::CentralId;
use tracing::{debug, warn};
use uuid::Uuid;

/// Peripheral state the dispatcher needs at send time
#[derive(Debug, Clone)]
pub struct NotifyTarget {
    pub adapter_state: AdapterState,
    /// Registered characteristic, if any
    pub characteristic_id: Option<Uuid>,
    /// Subscriber snapshot
    pub subscribers: Vec<CentralId>,
}

/// Outcome of a successful send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    pub color: ColorValue,
    pub recipients: usize,
}

#[derive(Debug)]
pub struct NotificationDispatcher {
    max_payload: usize,
    sent: u64,
    busy: u64,
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::with_max_payload(MTU_FLOOR)
    }

    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            max_payload,
            sent: 0,
            busy: 0,
        }
    }

    /// Notifications accepted by the transport so far
    pub fn sent_count(&self) -> u64 {
        self.sent
    }

    /// Sends rejected with a busy transport so far
    pub fn busy_count(&self) -> u64 {
        self.busy
    }

    /// Encode `color` and notify every subscriber in `target`
    pub fn send_value<A: PeripheralAdapter + ?Sized>(
        &mut self,
        adapter: &mut A,
        target: &NotifyTarget,
        color: ColorValue,
    ) -> Result<SendReport, SendError> {
        let payload = ColorCodec::encode(color);
        let recipients = self.send_payload(adapter, target, &payload)?;
        Ok(SendReport { color, recipients })
    }

    /// Notify an already encoded payload.
    ///
    /// Size is checked before readiness so an oversized payload never
    /// reaches the transport.
    pub fn send_payload<A: PeripheralAdapter + ?Sized>(
        &mut self,
        adapter: &mut A,
        target: &NotifyTarget,
        payload: &[u8],
    ) -> Result<usize, SendError> {
        if payload.len() > self.max_payload {
            warn!(
                "Data exceeds MTU size ({} > {} bytes)",
                payload.len(),
                self.max_payload
            );
            return Err(SendError::PayloadTooLarge {
                len: payload.len(),
                max: self.max_payload,
            });
        }

        if !target.adapter_state.is_powered_on() {
            warn!("Adapter is {}, cannot notify", target.adapter_state);
            return Err(SendError::NotReady);
        }
        let Some(characteristic_id) = target.characteristic_id else {
            warn!("Color characteristic not initialized");
            return Err(SendError::NotReady);
        };

        if target.subscribers.is_empty() {
            debug!("No subscribers, value kept locally");
            return Ok(0);
        }

        match adapter.update_value(characteristic_id, payload, &target.subscribers) {
            Ok(()) => {
                self.sent += 1;
                Ok(target.subscribers.len())
            }
            Err(err) => {
                let err = SendError::from(err);
                if err == SendError::TransportBusy {
                    self.busy += 1;
                }
                warn!("Failed to send notification: {}", err);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::adapter::SimulatedAdapter;

    fn ready_target(subscribers: &[&str]) -> NotifyTarget {
        NotifyTarget {
            adapter_state: AdapterState::PoweredOn,
            characteristic_id: Some(Uuid::from_u128(0x2A37)),
            subscribers: subscribers.iter().map(|s| CentralId::from(*s)).collect(),
        }
    }

    #[test]
    fn test_oversized_payload_never_reaches_transport() {
        let mut adapter = SimulatedAdapter::new();
        let mut dispatcher = NotificationDispatcher::new();

        let result = dispatcher.send_payload(&mut adapter, &ready_target(&["a"]), &[b'0'; 21]);

        assert_eq!(
            result,
            Err(SendError::PayloadTooLarge { len: 21, max: 20 })
        );
        assert_eq!(adapter.update_attempts(), 0);
    }

    #[test]
    fn test_payload_at_floor_is_sent() {
        let mut adapter = SimulatedAdapter::new();
        let mut dispatcher = NotificationDispatcher::new();

        let sent = dispatcher
            .send_payload(&mut adapter, &ready_target(&["a"]), &[b'0'; 20])
            .unwrap();

        assert_eq!(sent, 1);
        assert_eq!(adapter.notifications().len(), 1);
    }

    #[test]
    fn test_not_ready_without_power_or_characteristic() {
        let mut adapter = SimulatedAdapter::new();
        let mut dispatcher = NotificationDispatcher::new();
        let color = ColorValue::new(1, 2, 3);

        let mut target = ready_target(&["a"]);
        target.adapter_state = AdapterState::PoweredOff;
        assert_eq!(
            dispatcher.send_value(&mut adapter, &target, color),
            Err(SendError::NotReady)
        );

        let mut target = ready_target(&["a"]);
        target.characteristic_id = None;
        assert_eq!(
            dispatcher.send_value(&mut adapter, &target, color),
            Err(SendError::NotReady)
        );
        assert_eq!(adapter.update_attempts(), 0);
    }

    #[test]
    fn test_busy_transport_is_not_retried() {
        let mut adapter = SimulatedAdapter::new();
        adapter.set_busy(true);
        let mut dispatcher = NotificationDispatcher::new();

        let result = dispatcher.send_value(
            &mut adapter,
            &ready_target(&["a", "b"]),
            ColorValue::new(9, 9, 9),
        );

        assert_eq!(result, Err(SendError::TransportBusy));
        assert_eq!(adapter.update_attempts(), 1);
        assert_eq!(dispatcher.busy_count(), 1);
        assert!(adapter.notifications().is_empty());
    }

    #[test]
    fn test_fan_out_to_snapshot() {
        let mut adapter = SimulatedAdapter::new();
        let mut dispatcher = NotificationDispatcher::new();

        let report = dispatcher
            .send_value(
                &mut adapter,
                &ready_target(&["a", "b"]),
                ColorValue::new(0xAB, 0xCD, 0xEF),
            )
            .unwrap();

        assert_eq!(report.recipients, 2);
        let sent = adapter.notifications();
        assert_eq!(sent[0].value, b"ABCDEF");
        assert_eq!(sent[0].recipients.len(), 2);
        assert_eq!(dispatcher.sent_count(), 1);
    }

    #[test]
    fn test_no_subscribers_skips_transport() {
        let mut adapter = SimulatedAdapter::new();
        let mut dispatcher = NotificationDispatcher::new();

        let report = dispatcher
            .send_value(&mut adapter, &ready_target(&[]), ColorValue::new(0, 0, 0))
            .unwrap();

        assert_eq!(report.recipients, 0);
        assert_eq!(adapter.update_attempts(), 0);
    }
}
