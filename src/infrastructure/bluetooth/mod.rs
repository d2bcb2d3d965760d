//! Bluetooth Module
//!
//! Publishes a single read/write/notify color characteristic as a BLE
//! GATT peripheral.
//!
//! ## Architecture
//!
//! ```text
//!   platform events ──┐            ┌── application commands
//!                     ▼            ▼
//!            ┌─────────────────────────────┐
//!            │      PeripheralService      │  one serialized loop
//!            └──────────────┬──────────────┘
//!                           ▼
//!            ┌─────────────────────────────┐
//!            │       GattPeripheral        │──▶ AppEvent observers
//!            │ - advertising lifecycle     │
//!            │ - read/write handling       │
//!            │ - subscriber set            │
//!            └──────┬───────────────┬──────┘
//!                   ▼               ▼
//!          ┌──────────────┐  ┌────────────────────────┐
//!          │  ColorCodec  │  │ NotificationDispatcher │
//!          └──────────────┘  └───────────┬────────────┘
//!                                        ▼
//!                            PeripheralAdapter (platform)
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - UUIDs, limits and ATT result codes
//! - [`gatt`] - Service and characteristic descriptors
//! - [`adapter`] - Platform seam and the in-memory simulated stack
//! - [`dispatcher`] - Notification fan-out
//! - [`peripheral`] - GATT peripheral state machine
//! - [`service`] - Event loop

pub mod adapter;
pub mod dispatcher;
pub mod gatt;
pub mod peripheral;
pub mod protocol;
pub mod service;

// Re-export main types for convenience
pub use adapter::{AdapterEvent, PeripheralAdapter, SimulatedAdapter};
pub use peripheral::{GattPeripheral, WriteResult};
pub use service::{PeripheralInput, PeripheralService};
