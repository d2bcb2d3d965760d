pub mod adapter_state;
pub mod color;
pub mod errors;
pub mod models;
pub mod settings;
