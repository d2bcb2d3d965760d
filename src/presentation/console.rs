//! Console front end
//!
//! Reads commands from stdin, drives the peripheral service against the
//! simulated stack and renders published events. Lines that describe
//! central activity (`read`, `write`, `subscribe`, `power`) are injected as
//! platform events, the rest are application commands.

use crate::domain::adapter_state::AdapterState;
use crate::domain::color::ColorValue;
use crate::domain::models::{AppEvent, MessageSeverity, PeripheralCommand, StatusMessage};
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::protocol::{AttRequest, CentralId, RequestId};
use crate::infrastructure::bluetooth::{
    AdapterEvent, GattPeripheral, PeripheralInput, PeripheralService, SimulatedAdapter,
};
use anyhow::Context;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

pub const HELP: &str = "\
Commands:
  power <on|off|resetting|unauthorized|unsupported|unknown>
  start | stop                 advertising
  send <hex> | random          notify subscribers
  read [offset]                simulate a central read
  write <hex>                  simulate a central write
  subscribe <central>          simulate a subscription
  unsubscribe <central>
  busy <on|off>                simulate transport backpressure
  status | help | quit";

/// Central used when a command does not name one
const DEFAULT_CENTRAL: &str = "console";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    Input(PeripheralInput),
    SetBusy(bool),
    Status,
    Help,
    Quit,
}

/// Turns console lines into actions
pub struct CommandParser {
    characteristic_id: Uuid,
    next_request: u64,
}

impl CommandParser {
    pub fn new(characteristic_id: Uuid) -> Self {
        Self {
            characteristic_id,
            next_request: 1,
        }
    }

    /// Parse one line; blank lines yield `None`
    pub fn parse(&mut self, line: &str) -> anyhow::Result<Option<ConsoleAction>> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let argument = words.next();

        let action: ConsoleAction = match command.to_lowercase().as_str() {
            "power" => {
                let state: AdapterState = required(argument, "power <state>")?.parse()?;
                AdapterEvent::StateChanged(state).into()
            }
            "start" => PeripheralCommand::StartAdvertising.into(),
            "stop" => PeripheralCommand::StopAdvertising.into(),
            "send" => {
                let color: ColorValue = required(argument, "send <hex>")?
                    .parse()
                    .context("Invalid color")?;
                PeripheralCommand::SendValue(color).into()
            }
            "random" => PeripheralCommand::SendRandomColor.into(),
            "read" => {
                let offset = match argument {
                    Some(offset) => offset.parse::<usize>().context("Invalid offset")?,
                    None => 0,
                };
                AdapterEvent::ReadRequest(self.request(offset)).into()
            }
            "write" => {
                // Raw bytes on purpose: invalid values exercise the rejection path
                let value = required(argument, "write <hex>")?.as_bytes().to_vec();
                AdapterEvent::WriteRequest {
                    request: self.request(0),
                    value,
                }
                .into()
            }
            "subscribe" => AdapterEvent::Subscribed {
                central: CentralId::from(argument.unwrap_or(DEFAULT_CENTRAL)),
                characteristic_id: self.characteristic_id,
            }
            .into(),
            "unsubscribe" => AdapterEvent::Unsubscribed {
                central: CentralId::from(argument.unwrap_or(DEFAULT_CENTRAL)),
                characteristic_id: self.characteristic_id,
            }
            .into(),
            "busy" => match required(argument, "busy <on|off>")? {
                "on" => ConsoleAction::SetBusy(true),
                "off" => ConsoleAction::SetBusy(false),
                other => anyhow::bail!("Expected on or off, got {:?}", other),
            },
            "status" => ConsoleAction::Status,
            "help" | "?" => ConsoleAction::Help,
            "quit" | "exit" => ConsoleAction::Quit,
            other => anyhow::bail!("Unknown command {:?}, try help", other),
        };
        Ok(Some(action))
    }

    fn request(&mut self, offset: usize) -> AttRequest {
        let id = RequestId(self.next_request);
        self.next_request += 1;
        AttRequest {
            id,
            central: CentralId::from(DEFAULT_CENTRAL),
            characteristic_id: self.characteristic_id,
            offset,
        }
    }
}

impl From<AdapterEvent> for ConsoleAction {
    fn from(event: AdapterEvent) -> Self {
        Self::Input(event.into())
    }
}

impl From<PeripheralCommand> for ConsoleAction {
    fn from(command: PeripheralCommand) -> Self {
        Self::Input(command.into())
    }
}

fn required<'a>(argument: Option<&'a str>, usage: &str) -> anyhow::Result<&'a str> {
    argument.ok_or_else(|| anyhow::anyhow!("Usage: {}", usage))
}

/// What a display layer knows, built only from published events
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsoleView {
    pub adapter_state: AdapterState,
    pub advertising: bool,
    pub subscribers: usize,
    pub color: Option<ColorValue>,
    pub status_message: Option<StatusMessage>,
}

impl ConsoleView {
    pub fn apply(&mut self, event: &AppEvent) {
        match event {
            AppEvent::ColorChanged(color) => self.color = Some(*color),
            AppEvent::AdvertisingChanged(advertising) => self.advertising = *advertising,
            AppEvent::AdapterStateChanged(state) => self.adapter_state = *state,
            AppEvent::SubscribersChanged(count) => self.subscribers = *count,
            AppEvent::TransportReady => {}
            AppEvent::LogMessage(message) => self.status_message = Some(message.clone()),
        }
    }

    pub fn summary(&self) -> String {
        let color = self
            .color
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".to_string());
        format!(
            "adapter: {} | advertising: {} | subscribers: {} | color: {}",
            self.adapter_state, self.advertising, self.subscribers, color
        )
    }
}

pub fn render_event(event: &AppEvent) -> String {
    match event {
        AppEvent::ColorChanged(color) => format!("color -> {}", color),
        AppEvent::AdvertisingChanged(true) => "advertising: on".to_string(),
        AppEvent::AdvertisingChanged(false) => "advertising: off".to_string(),
        AppEvent::AdapterStateChanged(state) => format!("adapter: {}", state),
        AppEvent::SubscribersChanged(count) => format!("subscribers: {}", count),
        AppEvent::TransportReady => "transport ready, retry is possible".to_string(),
        AppEvent::LogMessage(message) => {
            let tag = match message.severity {
                MessageSeverity::Info => "info",
                MessageSeverity::Success => "ok",
                MessageSeverity::Warning => "warn",
                MessageSeverity::Error => "error",
            };
            format!("[{}] {}", tag, message.message)
        }
    }
}

/// Apply and render whatever is still queued, e.g. after shutdown
fn drain_rendered(
    view: &mut ConsoleView,
    events: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Vec<String> {
    let mut rendered = Vec::new();
    while let Ok(event) = events.try_recv() {
        view.apply(&event);
        rendered.push(render_event(&event));
    }
    rendered
}

/// Run the console against the simulated stack until `quit` or end of input
pub async fn run(settings: &Settings) -> anyhow::Result<()> {
    let identity = settings
        .peripheral
        .validate()
        .context("Invalid peripheral configuration")?;
    info!(
        "Service {} / characteristic {} as {:?}",
        identity.service_id, identity.characteristic_id, identity.local_name
    );

    let adapter = SimulatedAdapter::new();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let (input_tx, input_rx) = mpsc::unbounded_channel::<PeripheralInput>();

    let mut parser = CommandParser::new(identity.characteristic_id);
    let peripheral = GattPeripheral::new(identity, adapter.clone(), event_tx.clone());
    let service = tokio::spawn(PeripheralService::new(peripheral, event_tx).run(input_rx));

    // The simulated platform reports power shortly after start-up
    let _ = input_tx.send(AdapterEvent::StateChanged(AdapterState::PoweredOn).into());

    let streamer = (settings.notify_interval_ms > 0).then(|| {
        let input_tx = input_tx.clone();
        let period = Duration::from_millis(settings.notify_interval_ms);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                if input_tx.send(PeripheralCommand::SendRandomColor.into()).is_err() {
                    break;
                }
            }
        })
    });

    println!("{}", HELP);
    let mut view = ConsoleView::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    debug!("End of input");
                    break;
                };
                match parser.parse(&line) {
                    Ok(Some(ConsoleAction::Input(input))) => {
                        if input_tx.send(input).is_err() {
                            break;
                        }
                    }
                    Ok(Some(ConsoleAction::SetBusy(busy))) => {
                        adapter.set_busy(busy);
                        println!("transport busy: {}", busy);
                    }
                    Ok(Some(ConsoleAction::Status)) => println!("{}", view.summary()),
                    Ok(Some(ConsoleAction::Help)) => println!("{}", HELP),
                    Ok(Some(ConsoleAction::Quit)) => break,
                    Ok(None) => {}
                    Err(e) => println!("{:#}", e),
                }
            }
            Some(event) = event_rx.recv() => {
                view.apply(&event);
                println!("{}", render_event(&event));
            }
        }
    }

    if let Some(streamer) = streamer {
        streamer.abort();
    }
    let _ = input_tx.send(PeripheralCommand::Shutdown.into());
    let peripheral = service.await.context("Peripheral service task failed")?;
    for line in drain_rendered(&mut view, &mut event_rx) {
        println!("{}", line);
    }
    info!(
        "Shut down after {} notifications ({} busy)",
        peripheral.dispatcher().sent_count(),
        peripheral.dispatcher().busy_count()
    );
    Ok(())
}
