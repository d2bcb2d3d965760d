//! Color Peripheral
//!
//! Platform-independent core of a BLE GATT peripheral that publishes one
//! read/write/notify characteristic carrying an RGB color as six hex digits.
//!
//! - [`domain`] - color codec, adapter state, settings and events
//! - [`infrastructure`] - GATT peripheral, notification dispatch, logging
//! - [`presentation`] - console front end over the simulated stack

pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::color::{ColorCodec, ColorValue};
pub use infrastructure::bluetooth::{GattPeripheral, PeripheralService};
