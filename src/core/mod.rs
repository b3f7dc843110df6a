//! Core types, constants and the beacon registry

pub mod types;
pub mod constants;
pub mod registry;

pub use types::*;
pub use constants::*;
pub use registry::BeaconRegistry;
