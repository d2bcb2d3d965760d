//! Adapter power state as reported by the platform Bluetooth stack.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    #[default]
    Unknown,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
    Resetting,
}

impl AdapterState {
    pub fn is_powered_on(self) -> bool {
        self == AdapterState::PoweredOn
    }

    /// Human-readable explanation shown to the user
    pub fn description(self) -> &'static str {
        match self {
            Self::Unknown => "Bluetooth state is unknown",
            Self::Unsupported => "Bluetooth LE is not supported on this device",
            Self::Unauthorized => "Bluetooth use is not authorized",
            Self::PoweredOff => "Bluetooth is powered off",
            Self::PoweredOn => "Bluetooth is powered on",
            Self::Resetting => "Bluetooth is resetting",
        }
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Unsupported => "unsupported",
            Self::Unauthorized => "unauthorized",
            Self::PoweredOff => "powered off",
            Self::PoweredOn => "powered on",
            Self::Resetting => "resetting",
        };
        f.write_str(name)
    }
}

impl FromStr for AdapterState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "unknown" => Ok(Self::Unknown),
            "unsupported" => Ok(Self::Unsupported),
            "unauthorized" => Ok(Self::Unauthorized),
            "off" | "poweredoff" => Ok(Self::PoweredOff),
            "on" | "poweredon" => Ok(Self::PoweredOn),
            "resetting" | "reset" => Ok(Self::Resetting),
            other => Err(anyhow::anyhow!("Unknown adapter state: {}", other)),
        }
    }
}

/// Tracks the adapter state; only platform events move it
#[derive(Debug, Default)]
pub struct AdapterMonitor {
    current: AdapterState,
}

impl AdapterMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> AdapterState {
        self.current
    }

    pub fn is_ready(&self) -> bool {
        self.current.is_powered_on()
    }

    /// Record a platform state change, returning the previous state if it differs
    pub(crate) fn apply(&mut self, state: AdapterState) -> Option<AdapterState> {
        if self.current == state {
            return None;
        }
        let previous = std::mem::replace(&mut self.current, state);
        Some(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_starts_unknown() {
        let monitor = AdapterMonitor::new();
        assert_eq!(monitor.current(), AdapterState::Unknown);
        assert!(!monitor.is_ready());
    }

    #[test]
    fn test_apply_reports_transitions_only() {
        let mut monitor = AdapterMonitor::new();
        assert_eq!(
            monitor.apply(AdapterState::PoweredOn),
            Some(AdapterState::Unknown)
        );
        assert!(monitor.is_ready());
        assert_eq!(monitor.apply(AdapterState::PoweredOn), None);
        assert_eq!(
            monitor.apply(AdapterState::Resetting),
            Some(AdapterState::PoweredOn)
        );
        assert!(!monitor.is_ready());
    }

    #[test]
    fn test_parse_state_names() {
        assert_eq!("on".parse::<AdapterState>().unwrap(), AdapterState::PoweredOn);
        assert_eq!(
            "powered_off".parse::<AdapterState>().unwrap(),
            AdapterState::PoweredOff
        );
        assert!("sideways".parse::<AdapterState>().is_err());
    }
}
