//! Peripheral Service Module
//!
//! The serialized event loop: platform events and application commands share
//! one queue and are handled one at a time against the [`GattPeripheral`].

use crate::domain::models::{AppEvent, PeripheralCommand};
use crate::infrastructure::bluetooth::adapter::{AdapterEvent, PeripheralAdapter};
use crate::infrastructure::bluetooth::peripheral::GattPeripheral;
use crate::infrastructure::bluetooth::protocol::{read_at_offset, AttRequest, AttStatus};
use std::ops::ControlFlow;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Everything the loop consumes
#[derive(Debug, Clone, PartialEq)]
pub enum PeripheralInput {
    Adapter(AdapterEvent),
    Command(PeripheralCommand),
}

impl From<AdapterEvent> for PeripheralInput {
    fn from(event: AdapterEvent) -> Self {
        Self::Adapter(event)
    }
}

impl From<PeripheralCommand> for PeripheralInput {
    fn from(command: PeripheralCommand) -> Self {
        Self::Command(command)
    }
}

pub struct PeripheralService<A: PeripheralAdapter> {
    peripheral: GattPeripheral<A>,
    event_sender: mpsc::UnboundedSender<AppEvent>,
}

impl<A: PeripheralAdapter> PeripheralService<A> {
    /// `event_sender` must be the sender the peripheral publishes on
    pub fn new(
        peripheral: GattPeripheral<A>,
        event_sender: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            peripheral,
            event_sender,
        }
    }

    pub fn peripheral(&self) -> &GattPeripheral<A> {
        &self.peripheral
    }

    /// Consume inputs until shutdown or until every sender is gone.
    /// Returns the peripheral for inspection.
    pub async fn run(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<PeripheralInput>,
    ) -> GattPeripheral<A> {
        info!("Peripheral service started");
        while let Some(input) = inputs.recv().await {
            if self.handle(input).is_break() {
                break;
            }
        }
        info!("Peripheral service stopped");
        self.peripheral
    }

    /// Handle a single input to completion
    pub fn handle(&mut self, input: PeripheralInput) -> ControlFlow<()> {
        match input {
            PeripheralInput::Adapter(event) => {
                self.handle_adapter_event(event);
                ControlFlow::Continue(())
            }
            PeripheralInput::Command(command) => self.handle_command(command),
        }
    }

    fn handle_adapter_event(&mut self, event: AdapterEvent) {
        match event {
            AdapterEvent::StateChanged(state) => self.peripheral.on_adapter_state(state),
            AdapterEvent::ReadRequest(request) => self.handle_read(request),
            AdapterEvent::WriteRequest { request, value } => self.handle_write(request, &value),
            AdapterEvent::Subscribed {
                central,
                characteristic_id,
            } => self.peripheral.on_subscribe(central, characteristic_id),
            AdapterEvent::Unsubscribed {
                central,
                characteristic_id,
            } => self.peripheral.on_unsubscribe(&central, characteristic_id),
            AdapterEvent::ReadyToUpdateSubscribers => {
                debug!("Transport ready for more notifications");
                let _ = self.event_sender.send(AppEvent::TransportReady);
            }
        }
    }

    fn handle_read(&mut self, request: AttRequest) {
        debug!(
            "Someone reading me {} (offset {})",
            request.characteristic_id, request.offset
        );
        let (status, value) = match self.peripheral.handle_read_request(request.characteristic_id)
        {
            Some(value) => match read_at_offset(&value, request.offset) {
                Ok(slice) => (AttStatus::Success, Some(slice)),
                Err(status) => (status, None),
            },
            None => (AttStatus::InvalidHandle, None),
        };
        self.peripheral.respond(request.id, status, value);
    }

    fn handle_write(&mut self, request: AttRequest, value: &[u8]) {
        // The value is a single short attribute; partial writes are not supported
        if request.offset != 0
            && self
                .peripheral
                .is_color_characteristic(request.characteristic_id)
        {
            warn!("Rejecting write at offset {}", request.offset);
            self.peripheral
                .respond(request.id, AttStatus::InvalidOffset, None);
            return;
        }

        let result = self
            .peripheral
            .handle_write_request(request.characteristic_id, value);
        self.peripheral.respond(request.id, result.att_status(), None);
    }

    fn handle_command(&mut self, command: PeripheralCommand) -> ControlFlow<()> {
        match command {
            PeripheralCommand::StartAdvertising => {
                if let Err(e) = self.peripheral.start_advertising() {
                    error!("Failed to start advertising: {}", e);
                }
            }
            PeripheralCommand::StopAdvertising => self.peripheral.stop_advertising(),
            PeripheralCommand::SendValue(color) => {
                if let Err(e) = self.peripheral.send_value(color) {
                    warn!("Send of {} failed: {}", color, e);
                }
            }
            PeripheralCommand::SendRandomColor => {
                if let Err(e) = self.peripheral.send_random_color() {
                    warn!("Random color send failed: {}", e);
                }
            }
            PeripheralCommand::Shutdown => {
                if self.peripheral.is_advertising() {
                    self.peripheral.stop_advertising();
                }
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }
}
