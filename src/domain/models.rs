use crate::domain::adapter_state::AdapterState;
use crate::domain::color::ColorValue;

/// Advertising lifecycle of the peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeripheralState {
    #[default]
    Idle,
    Registering,
    Advertising,
}

/// Consistent view of the peripheral between two mutations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralSnapshot {
    pub adapter_state: AdapterState,
    pub state: PeripheralState,
    pub advertising: bool,
    pub registered: bool,
    pub subscriber_count: usize,
    pub current_color: Option<ColorValue>,
}

/// Events published to display layers
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    ColorChanged(ColorValue),
    AdvertisingChanged(bool),
    AdapterStateChanged(AdapterState),
    SubscribersChanged(usize),
    /// The transport drained its queue; a busy send may be retried
    TransportReady,
    LogMessage(StatusMessage),
}

/// Commands issued by the application layer
#[derive(Debug, Clone, PartialEq)]
pub enum PeripheralCommand {
    StartAdvertising,
    StopAdvertising,
    SendValue(ColorValue),
    SendRandomColor,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}
