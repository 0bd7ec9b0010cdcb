use std::collections::HashMap;

use tracing::info;

use crate::registry::MotorPort;

/// Motor state produced by one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct MotorCommand {
    pub node_id: String,
    pub port: MotorPort,
    pub on: bool,
    pub forward: bool,
    /// 0..=100
    pub speed: f64,
}

impl MotorCommand {
    /// Signed power: positive forward, negative reverse, zero when off.
    pub fn power(&self) -> f64 {
        match (self.on, self.forward) {
            (false, _) => 0.0,
            (true, true) => self.speed,
            (true, false) => -self.speed,
        }
    }
}

/// Sink for motor outputs. Called from the engine task after every tick,
/// so implementations must not block.
pub trait MotorDriver: Send + 'static {
    fn name(&self) -> &str;

    /// Apply the latest command for one motor.
    fn drive(&mut self, command: &MotorCommand);

    /// Halt every motor, e.g. when evaluation stops.
    fn stop_all(&mut self);
}

/// Driver without hardware: logs each change of motor power.
#[derive(Debug, Default)]
pub struct LoggingMotorDriver {
    last: HashMap<MotorPort, f64>,
}

impl LoggingMotorDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last power logged for a port.
    pub fn power(&self, port: MotorPort) -> Option<f64> {
        self.last.get(&port).copied()
    }
}

impl MotorDriver for LoggingMotorDriver {
    fn name(&self) -> &str {
        "logging"
    }

    fn drive(&mut self, command: &MotorCommand) {
        let power = command.power();
        if self.last.insert(command.port, power) != Some(power) {
            info!(
                node = %command.node_id,
                port = %command.port,
                power,
                "Motor command"
            );
        }
    }

    fn stop_all(&mut self) {
        if self.last.values().any(|p| *p != 0.0) {
            info!("All motors stopped");
        }
        self.last.clear();
    }
}
