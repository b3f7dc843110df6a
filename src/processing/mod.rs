//! Update decoding and distance state

pub mod parser;
pub mod store;

pub use parser::UpdateMessage;
pub use store::{DistanceSnapshot, DistanceStore, SharedDistanceStore};
