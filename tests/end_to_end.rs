use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use slicknxt_core::config::EngineConfig;
use slicknxt_core::event::EventBus;
use slicknxt_core::port::PortValue;
use slicknxt_core::types::{
    AuxDisplay, EdgeDescription, EngineEvent, FlowDescription, InputEvent, NodeDescription,
    RunState,
};
use slicknxt_engine::registry::MotorPort;
use slicknxt_engine::{Engine, FlowExecutor, MotorCommand, MotorDriver};

const DT: Duration = Duration::from_millis(100);

fn demo_flow() -> FlowDescription {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("flows/demo.json");
    let text = std::fs::read_to_string(path).expect("read demo flow");
    serde_json::from_str(&text).expect("parse demo flow")
}

#[test]
fn test_switch_and_comparator_light_the_display() {
    let mut ex = FlowExecutor::with_flow(DT, &demo_flow()).expect("build demo flow");
    ex.start();
    let snap = ex.tick().outcome.expect("acyclic");

    assert_eq!(snap.tick, 0);
    assert_eq!(snap.output("cmp", "output"), Some(PortValue::Bool(true)));
    assert_eq!(snap.output("and", "output"), Some(PortValue::Bool(true)));
    assert_eq!(
        snap.aux("lamp"),
        Some(&AuxDisplay::Display {
            value: Some(PortValue::Bool(true))
        })
    );
    assert_eq!(snap.output("motorA", "speed"), Some(PortValue::Number(60.0)));

    let motors = ex.motor_commands();
    assert_eq!(motors.len(), 1);
    assert_eq!(motors[0].port, MotorPort::A);
    assert_eq!(motors[0].power(), 60.0);
}

#[test]
fn test_turning_the_dial_below_threshold_stops_the_motor() {
    let mut ex = FlowExecutor::with_flow(DT, &demo_flow()).expect("build demo flow");
    ex.start();
    ex.tick();

    ex.queue_input(InputEvent::new("dial", "value", 30));
    let snap = ex.tick().outcome.expect("acyclic");
    assert_eq!(snap.output("and", "output"), Some(PortValue::Bool(false)));
    assert_eq!(ex.motor_commands()[0].power(), 0.0);

    // the override shows up in the described flow
    let desc = ex.describe();
    let dial = desc.nodes.iter().find(|n| n.id == "dial").expect("dial node");
    assert_eq!(dial.data["value"], json!(30.0));
}

#[test]
fn test_cycle_pauses_evaluation_and_keeps_snapshot() {
    let mut ex = FlowExecutor::with_flow(DT, &demo_flow()).expect("build demo flow");
    ex.start();
    let before = ex.tick().outcome.expect("acyclic");

    ex.add_node(NodeDescription::new("n1", "notNode")).unwrap();
    ex.add_node(NodeDescription::new("n2", "notNode")).unwrap();
    ex.add_edge(EdgeDescription::connect("n1", "output", "n2", "input"))
        .unwrap();
    let back = ex
        .add_edge(EdgeDescription::connect("n2", "output", "n1", "input"))
        .unwrap();

    let report = ex.tick();
    let err = report.outcome.unwrap_err();
    assert!(err.nodes.contains(&"n1".to_string()));
    assert_eq!(ex.last_snapshot().as_deref(), Some(before.as_ref()));

    ex.remove_edge(&back).unwrap();
    let after = ex.tick().outcome.expect("cycle removed");
    assert_eq!(after.tick, before.tick + 1);
}

#[test]
fn test_second_motor_on_same_port_is_rejected() {
    let mut ex = FlowExecutor::with_flow(DT, &demo_flow()).expect("build demo flow");
    let err = ex
        .add_node(NodeDescription::new("motorA2", "motorNode").with("port", json!("a")))
        .unwrap_err();
    assert_eq!(err.kind(), "device_already_bound");
}

/// Records every motor command handed to it.
#[derive(Clone, Default)]
struct RecordingDriver {
    commands: Arc<Mutex<Vec<MotorCommand>>>,
    stops: Arc<Mutex<usize>>,
}

impl MotorDriver for RecordingDriver {
    fn name(&self) -> &str {
        "recording"
    }

    fn drive(&mut self, command: &MotorCommand) {
        self.commands.lock().unwrap().push(command.clone());
    }

    fn stop_all(&mut self) {
        *self.stops.lock().unwrap() += 1;
    }
}

async fn wait_for<F>(rx: &mut broadcast::Receiver<EngineEvent>, mut pred: F) -> EngineEvent
where
    F: FnMut(&EngineEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(ev) if pred(&ev) => return ev,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn test_engine_drives_motors_and_streams_snapshots() {
    let config = EngineConfig {
        tick_rate_hz: 100.0,
        ..EngineConfig::default()
    };
    let driver = RecordingDriver::default();
    let cancel = CancellationToken::new();
    let (engine, handle) = Engine::new(
        &config,
        Arc::new(EventBus::new(config.event_capacity)),
        Box::new(driver.clone()),
        cancel.clone(),
    );
    let task = tokio::spawn(engine.run());
    let mut rx = handle.subscribe();

    handle.replace_flow(demo_flow()).await.unwrap();
    assert_eq!(handle.start().await.unwrap(), RunState::Running);

    let ev = wait_for(&mut rx, |e| matches!(e, EngineEvent::Snapshot(_))).await;
    let EngineEvent::Snapshot(snap) = ev else { unreachable!() };
    assert_eq!(snap.output("and", "output"), Some(PortValue::Bool(true)));

    handle
        .submit_input(InputEvent::new("sw", "value", false))
        .unwrap();
    wait_for(&mut rx, |e| {
        matches!(e, EngineEvent::Snapshot(s)
            if s.output("and", "output") == Some(PortValue::Bool(false)))
    })
    .await;

    assert_eq!(handle.stop().await.unwrap(), RunState::Stopped);
    let status = handle.status().await.unwrap();
    assert_eq!(status.state, RunState::Stopped);
    assert_eq!(status.nodes, 8);
    assert!(status.tick >= 2);

    cancel.cancel();
    task.await.unwrap();

    let commands = driver.commands.lock().unwrap();
    assert!(commands.iter().any(|c| c.power() == 60.0));
    assert!(commands.iter().any(|c| c.power() == 0.0));
    assert!(*driver.stops.lock().unwrap() >= 1);
}
