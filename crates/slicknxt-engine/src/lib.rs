pub mod device;
pub mod engine;
pub mod executor;
pub mod graph;
pub mod nodes;
pub mod registry;
pub mod scheduler;

pub use device::{LoggingMotorDriver, MotorCommand, MotorDriver};
pub use engine::{Engine, EngineHandle};
pub use executor::{FaultTransition, FlowExecutor, TickReport};
pub use graph::Graph;
pub use registry::NodeKind;
