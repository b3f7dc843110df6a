//! Error kinds and their handling disposition

pub mod error;

pub use error::{
    Disposition, EngineError, EngineResult, GeometryFault, MessageFault, StartupError,
};
