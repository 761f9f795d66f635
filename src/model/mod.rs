pub mod device;

// Re-export commonly used types at the model level.
pub use device::{
    brightness_percent, BridgeInventory, LightId, LightState, RawGroup, RawLight, MAX_BRIGHTNESS,
};
