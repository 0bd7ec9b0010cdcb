use std::collections::VecDeque;

use slicknxt_core::port::PortValue;

use super::{Computed, Inputs, NodeState, TickContext, TIME_EPSILON};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PulsePhase {
    #[default]
    Off,
    On,
}

impl PulsePhase {
    fn flipped(self) -> Self {
        match self {
            PulsePhase::Off => PulsePhase::On,
            PulsePhase::On => PulsePhase::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PulseState {
    pub phase: PulsePhase,
    /// Seconds spent in the current phase.
    pub elapsed: f64,
    /// Set once `enable` has been seen true; cleared when disabled.
    pub armed: bool,
}

pub(super) fn pulse(inputs: &Inputs, state: NodeState, ctx: &TickContext) -> Computed {
    let prior = match state {
        NodeState::Pulse(s) => s,
        _ => PulseState::default(),
    };

    let next = if !inputs.bool("enable") {
        PulseState::default()
    } else if !prior.armed {
        PulseState {
            phase: PulsePhase::On,
            elapsed: 0.0,
            armed: true,
        }
    } else {
        advance(prior, ctx.dt, inputs.num("onDuration"), inputs.num("offDuration"))
    };

    Computed {
        outputs: vec![("output", Some(PortValue::Bool(next.phase == PulsePhase::On)))],
        state: NodeState::Pulse(next),
        aux: None,
    }
}

fn advance(mut state: PulseState, dt: f64, on: f64, off: f64) -> PulseState {
    state.elapsed += dt;
    loop {
        let (duration, other) = match state.phase {
            PulsePhase::On => (on, off),
            PulsePhase::Off => (off, on),
        };
        if duration <= TIME_EPSILON {
            // a zero-length phase flips once per tick
            state.phase = state.phase.flipped();
            state.elapsed = 0.0;
            break;
        }
        if state.elapsed + TIME_EPSILON < duration {
            break;
        }
        let period = duration + other;
        if other > TIME_EPSILON && state.elapsed >= period {
            // whole periods land back in the same phase
            state.elapsed %= period;
            continue;
        }
        state.phase = state.phase.flipped();
        state.elapsed = (state.elapsed - duration).max(0.0);
    }
    state
}

/// Time-stamped samples of a delay timer, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DelayState {
    pub buffer: VecDeque<(f64, PortValue)>,
}

pub(super) fn delay(inputs: &Inputs, state: NodeState, ctx: &TickContext) -> Computed {
    let mut state = match state {
        NodeState::Delay(s) => s,
        _ => DelayState::default(),
    };

    if let Some(value) = inputs.value("input") {
        state.buffer.push_back((ctx.now, value));
    }

    let cutoff = ctx.now - inputs.num("delay").max(0.0) + TIME_EPSILON;
    let due = state
        .buffer
        .iter()
        .rposition(|(ts, _)| *ts <= cutoff);

    let output = match due {
        Some(idx) => {
            state.buffer.drain(..idx);
            state.buffer.front().map(|(_, v)| *v)
        }
        None => None,
    };

    Computed {
        outputs: vec![("output", output)],
        state: NodeState::Delay(state),
        aux: None,
    }
}
