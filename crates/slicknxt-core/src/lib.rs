pub mod config;
pub mod error;
pub mod event;
pub mod port;
pub mod types;

pub use config::AppConfig;
pub use error::{ConstructionError, CycleError, InputError, Result, SlickError};
pub use event::EventBus;
pub use port::{compatible, PortDirection, PortType, PortValue};
pub use types::*;
