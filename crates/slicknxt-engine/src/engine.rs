use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use slicknxt_core::config::EngineConfig;
use slicknxt_core::error::{ConstructionError, Result, SlickError};
use slicknxt_core::event::EventBus;
use slicknxt_core::types::{
    EdgeDescription, EngineEvent, FlowDescription, FlowStatus, InputEvent, NodeDescription,
    RunState, TickSnapshot,
};

use crate::device::MotorDriver;
use crate::executor::{FaultTransition, FlowExecutor};

const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<T>;

/// A control request, applied by the engine task between ticks.
enum Command {
    ReplaceFlow {
        flow: FlowDescription,
        respond: Reply<std::result::Result<(), ConstructionError>>,
    },
    AddNode {
        node: NodeDescription,
        respond: Reply<std::result::Result<(), ConstructionError>>,
    },
    AddEdge {
        edge: EdgeDescription,
        respond: Reply<std::result::Result<String, ConstructionError>>,
    },
    RemoveNode {
        id: String,
        respond: Reply<std::result::Result<(), ConstructionError>>,
    },
    RemoveEdge {
        id: String,
        respond: Reply<std::result::Result<(), ConstructionError>>,
    },
    Start { respond: Reply<RunState> },
    Stop { respond: Reply<RunState> },
    Status { respond: Reply<FlowStatus> },
    Describe { respond: Reply<FlowDescription> },
    Snapshot { respond: Reply<Option<Arc<TickSnapshot>>> },
}

/// Owns the executor and drives it at a fixed rate on a single task.
pub struct Engine {
    executor: FlowExecutor,
    commands: mpsc::Receiver<Command>,
    inputs: mpsc::Receiver<InputEvent>,
    event_bus: Arc<EventBus>,
    driver: Box<dyn MotorDriver>,
    tick_interval: Duration,
    cancel: CancellationToken,
}

/// Cloneable access to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    inputs: mpsc::Sender<InputEvent>,
    event_bus: Arc<EventBus>,
}

impl Engine {
    pub fn new(
        config: &EngineConfig,
        event_bus: Arc<EventBus>,
        driver: Box<dyn MotorDriver>,
        cancel: CancellationToken,
    ) -> (Self, EngineHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (input_tx, input_rx) = mpsc::channel(config.input_queue_capacity.max(1));
        let tick_interval = config.tick_interval();

        let engine = Self {
            executor: FlowExecutor::new(tick_interval),
            commands: cmd_rx,
            inputs: input_rx,
            event_bus: event_bus.clone(),
            driver,
            tick_interval,
            cancel,
        };
        let handle = EngineHandle {
            commands: cmd_tx,
            inputs: input_tx,
            event_bus,
        };
        (engine, handle)
    }

    /// Run until cancelled or every handle is dropped.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            driver = self.driver.name(),
            "Engine started"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Engine shutting down");
                    break;
                }
                Some(cmd) = self.commands.recv() => self.handle_command(cmd),
                // while running, inputs stay in the bounded queue until the next tick
                Some(event) = self.inputs.recv(), if !self.executor.is_running() => {
                    self.apply_stopped_input(event)
                }
                _ = ticker.tick(), if self.executor.is_running() => self.run_tick(),
                else => break,
            }
        }

        self.driver.stop_all();
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::ReplaceFlow { flow, respond } => {
                let was_faulted = self.executor.fault().is_some();
                let result = self.executor.replace_flow(&flow);
                if result.is_ok() {
                    self.driver.stop_all();
                    if was_faulted {
                        self.event_bus.publish(EngineEvent::FaultCleared);
                    }
                    let graph = self.executor.graph();
                    self.event_bus.publish(EngineEvent::FlowLoaded {
                        nodes: graph.node_count(),
                        edges: graph.edge_count(),
                    });
                }
                let _ = respond.send(result);
            }
            Command::AddNode { node, respond } => {
                let _ = respond.send(self.executor.add_node(node));
            }
            Command::AddEdge { edge, respond } => {
                let _ = respond.send(self.executor.add_edge(edge));
            }
            Command::RemoveNode { id, respond } => {
                let _ = respond.send(self.executor.remove_node(&id));
            }
            Command::RemoveEdge { id, respond } => {
                let _ = respond.send(self.executor.remove_edge(&id));
            }
            Command::Start { respond } => {
                if self.executor.start() {
                    self.publish_state();
                }
                let _ = respond.send(self.executor.run_state());
            }
            Command::Stop { respond } => {
                if self.executor.stop() {
                    self.driver.stop_all();
                    self.publish_state();
                }
                let _ = respond.send(self.executor.run_state());
            }
            Command::Status { respond } => {
                let _ = respond.send(self.executor.status());
            }
            Command::Describe { respond } => {
                let _ = respond.send(self.executor.describe());
            }
            Command::Snapshot { respond } => {
                let _ = respond.send(self.executor.last_snapshot());
            }
        }
    }

    /// Nothing is evaluating while stopped, so inputs apply at once.
    fn apply_stopped_input(&mut self, event: InputEvent) {
        if let Err(e) = self.executor.apply_input(&event) {
            warn!(node = %event.node_id, port = %event.port_name, error = %e, "Input dropped");
            self.event_bus.publish(EngineEvent::InputRejected {
                event,
                reason: e.to_string(),
            });
        }
    }

    fn run_tick(&mut self) {
        while let Ok(event) = self.inputs.try_recv() {
            self.executor.queue_input(event);
        }
        trace!(inputs = self.executor.pending_inputs(), "Inputs drained");
        let report = self.executor.tick();

        for (event, err) in report.rejected {
            self.event_bus.publish(EngineEvent::InputRejected {
                event,
                reason: err.to_string(),
            });
        }
        if report.fault == FaultTransition::Cleared {
            self.event_bus.publish(EngineEvent::FaultCleared);
        }

        match report.outcome {
            Ok(snapshot) => {
                for command in self.executor.motor_commands() {
                    self.driver.drive(&command);
                }
                self.event_bus.publish(EngineEvent::Snapshot(snapshot));
            }
            Err(error) => {
                if report.fault == FaultTransition::Raised {
                    self.driver.stop_all();
                    self.event_bus.publish(EngineEvent::Fault { error });
                }
            }
        }
    }

    fn publish_state(&self) {
        self.event_bus.publish(EngineEvent::StateChanged {
            state: self.executor.run_state(),
        });
    }
}

impl EngineHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SlickError::EngineUnavailable)?;
        rx.await.map_err(|_| SlickError::EngineUnavailable)
    }

    /// Replace the whole flow. On error the running flow is untouched.
    pub async fn replace_flow(&self, flow: FlowDescription) -> Result<()> {
        self.request(|respond| Command::ReplaceFlow { flow, respond })
            .await?
            .map_err(Into::into)
    }

    pub async fn add_node(&self, node: NodeDescription) -> Result<()> {
        self.request(|respond| Command::AddNode { node, respond })
            .await?
            .map_err(Into::into)
    }

    /// Returns the id of the new edge.
    pub async fn add_edge(&self, edge: EdgeDescription) -> Result<String> {
        self.request(|respond| Command::AddEdge { edge, respond })
            .await?
            .map_err(Into::into)
    }

    pub async fn remove_node(&self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        self.request(|respond| Command::RemoveNode { id, respond })
            .await?
            .map_err(Into::into)
    }

    pub async fn remove_edge(&self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        self.request(|respond| Command::RemoveEdge { id, respond })
            .await?
            .map_err(Into::into)
    }

    pub async fn start(&self) -> Result<RunState> {
        self.request(|respond| Command::Start { respond }).await
    }

    pub async fn stop(&self) -> Result<RunState> {
        self.request(|respond| Command::Stop { respond }).await
    }

    pub async fn status(&self) -> Result<FlowStatus> {
        self.request(|respond| Command::Status { respond }).await
    }

    pub async fn describe(&self) -> Result<FlowDescription> {
        self.request(|respond| Command::Describe { respond }).await
    }

    pub async fn latest_snapshot(&self) -> Result<Option<Arc<TickSnapshot>>> {
        self.request(|respond| Command::Snapshot { respond }).await
    }

    /// Queue an external input without waiting. A full queue drops it.
    pub fn submit_input(&self, event: InputEvent) -> Result<()> {
        match self.inputs.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(node = %event.node_id, port = %event.port_name, "Input queue full, event dropped");
                Err(SlickError::InputQueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SlickError::EngineUnavailable),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        debug!(subscribers = self.event_bus.subscriber_count() + 1, "New engine subscriber");
        self.event_bus.subscribe()
    }
}
