use std::collections::VecDeque;

use slicknxt_core::port::PortValue;
use slicknxt_core::types::{AuxDisplay, Sample, SignalKind};

use super::{Computed, Inputs, NodeState, TickContext, TIME_EPSILON};

/// Samples kept by a history display.
pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryState {
    pub samples: VecDeque<Sample>,
    pub signal: SignalKind,
}

/// Number and Bool displays: no outputs, the input is shown as-is.
pub(super) fn readout(inputs: &Inputs) -> Computed {
    Computed {
        outputs: Vec::new(),
        state: NodeState::Stateless,
        aux: Some(AuxDisplay::Display {
            value: inputs.value("value"),
        }),
    }
}

pub(super) fn history(inputs: &Inputs, state: NodeState, ctx: &TickContext) -> Computed {
    let mut state = match state {
        NodeState::History(s) => s,
        _ => HistoryState::default(),
    };

    let current = inputs.value("value");
    if let Some(value) = current {
        let rate = inputs.num("sampleRate").max(0.0);
        let due = match state.samples.back() {
            Some(last) => ctx.now - last.t + TIME_EPSILON >= rate,
            None => true,
        };
        if due {
            state.samples.push_back(Sample { t: ctx.now, value });
            while state.samples.len() > HISTORY_CAPACITY {
                state.samples.pop_front();
            }
            state.signal = match value {
                PortValue::Bool(_) => SignalKind::Boolean,
                PortValue::Number(_) => SignalKind::Numeric,
            };
        }
    }

    let aux = AuxDisplay::History {
        signal: state.signal,
        current,
        samples: state.samples.iter().copied().collect(),
    };

    Computed {
        outputs: Vec::new(),
        state: NodeState::History(state),
        aux: Some(aux),
    }
}
