//! Name resolution and execution of light operations.

pub mod controller;
pub mod registry;

pub use controller::{ControlOutcome, DeviceController};
pub use registry::DeviceRegistry;
