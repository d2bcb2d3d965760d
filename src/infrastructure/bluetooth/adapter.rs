//! Platform Adapter Module
//!
//! The seam between the peripheral core and a platform Bluetooth stack.
//! Outbound calls go through [`PeripheralAdapter`]; everything the platform
//! reports comes back as an [`AdapterEvent`] on the service's input queue.

use crate::domain::adapter_state::AdapterState;
use crate::domain::errors::TransportError;
use crate::infrastructure::bluetooth::gatt::{AdvertisementData, ServiceDescriptor};
use crate::infrastructure::bluetooth::protocol::{AttRequest, AttStatus, CentralId, RequestId};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, trace};
use uuid::Uuid;

/// Calls the peripheral makes into the platform stack.
///
/// Calls must not block; results of long-running platform work arrive later
/// as [`AdapterEvent`]s.
pub trait PeripheralAdapter: Send {
    /// Publish a service and its characteristics
    fn add_service(&mut self, service: &ServiceDescriptor) -> Result<(), TransportError>;

    /// Withdraw a previously published service
    fn remove_service(&mut self, service_id: Uuid);

    fn start_advertising(&mut self, data: &AdvertisementData) -> Result<(), TransportError>;

    fn stop_advertising(&mut self);

    /// Notify `subscribers` of a new characteristic value.
    /// Returns [`TransportError::Busy`] when the transmit queue is full.
    fn update_value(
        &mut self,
        characteristic_id: Uuid,
        value: &[u8],
        subscribers: &[CentralId],
    ) -> Result<(), TransportError>;

    /// Answer an ATT read or write request
    fn respond(&mut self, request: RequestId, status: AttStatus, value: Option<Vec<u8>>);
}

/// Events delivered by the platform stack
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    StateChanged(AdapterState),
    ReadRequest(AttRequest),
    WriteRequest { request: AttRequest, value: Vec<u8> },
    Subscribed { central: CentralId, characteristic_id: Uuid },
    Unsubscribed { central: CentralId, characteristic_id: Uuid },
    /// Transmit queue has room again after a busy update
    ReadyToUpdateSubscribers,
}

/// A notification accepted by the simulated transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub characteristic_id: Uuid,
    pub value: Vec<u8>,
    pub recipients: Vec<CentralId>,
}

/// A response recorded by the simulated transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentResponse {
    pub request: RequestId,
    pub status: AttStatus,
    pub value: Option<Vec<u8>>,
}

/// Everything the simulated stack has been asked to do
#[derive(Debug, Default)]
pub struct SimulatedLog {
    pub services: Vec<ServiceDescriptor>,
    pub advertisement: Option<AdvertisementData>,
    pub notifications: Vec<SentNotification>,
    pub responses: Vec<SentResponse>,
    /// Number of `update_value` calls, including rejected ones
    pub update_attempts: usize,
    pub busy: bool,
    pub fail_registration: bool,
}

/// In-memory platform stack used by the console front end and tests.
///
/// Clones share the same log, so a test can keep one handle while the
/// peripheral owns another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedAdapter {
    log: Arc<Mutex<SimulatedLog>>,
}

impl SimulatedAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, SimulatedLog> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make subsequent notifications fail with a busy transport
    pub fn set_busy(&self, busy: bool) {
        self.log().busy = busy;
    }

    /// Make subsequent service registrations fail
    pub fn set_fail_registration(&self, fail: bool) {
        self.log().fail_registration = fail;
    }

    pub fn is_advertising(&self) -> bool {
        self.log().advertisement.is_some()
    }

    pub fn service_count(&self) -> usize {
        self.log().services.len()
    }

    pub fn notifications(&self) -> Vec<SentNotification> {
        self.log().notifications.clone()
    }

    pub fn responses(&self) -> Vec<SentResponse> {
        self.log().responses.clone()
    }

    pub fn update_attempts(&self) -> usize {
        self.log().update_attempts
    }
}

impl PeripheralAdapter for SimulatedAdapter {
    fn add_service(&mut self, service: &ServiceDescriptor) -> Result<(), TransportError> {
        let mut log = self.log();
        if log.fail_registration {
            return Err(TransportError::Failed("service registration refused".into()));
        }
        debug!("Simulated stack: adding service {}", service.service_id);
        log.services.retain(|s| s.service_id != service.service_id);
        log.services.push(service.clone());
        Ok(())
    }

    fn remove_service(&mut self, service_id: Uuid) {
        debug!("Simulated stack: removing service {}", service_id);
        self.log().services.retain(|s| s.service_id != service_id);
    }

    fn start_advertising(&mut self, data: &AdvertisementData) -> Result<(), TransportError> {
        debug!("Simulated stack: advertising as {:?}", data.local_name);
        self.log().advertisement = Some(data.clone());
        Ok(())
    }

    fn stop_advertising(&mut self) {
        self.log().advertisement = None;
    }

    fn update_value(
        &mut self,
        characteristic_id: Uuid,
        value: &[u8],
        subscribers: &[CentralId],
    ) -> Result<(), TransportError> {
        let mut log = self.log();
        log.update_attempts += 1;
        if log.busy {
            return Err(TransportError::Busy);
        }
        trace!("Simulated stack: notify {:?} to {} centrals", value, subscribers.len());
        log.notifications.push(SentNotification {
            characteristic_id,
            value: value.to_vec(),
            recipients: subscribers.to_vec(),
        });
        Ok(())
    }

    fn respond(&mut self, request: RequestId, status: AttStatus, value: Option<Vec<u8>>) {
        self.log().responses.push(SentResponse {
            request,
            status,
            value,
        });
    }
}
