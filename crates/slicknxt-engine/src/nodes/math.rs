use slicknxt_core::port::PortValue;

use super::{Computed, Inputs, NodeState, TickContext};

/// Integrator accumulator bound, both directions.
const INTEGRATOR_LIMIT: f64 = 1000.0;

fn num_out(value: f64) -> Computed {
    Computed::stateless(vec![("output", Some(PortValue::Number(value)))])
}

pub(super) fn add(inputs: &Inputs) -> Computed {
    num_out(inputs.num("a") + inputs.num("b"))
}

pub(super) fn subtract(inputs: &Inputs) -> Computed {
    num_out(inputs.num("a") - inputs.num("b"))
}

/// `min(max(input, min), max)`. With `min > max` the upper bound wins.
pub(super) fn cap(inputs: &Inputs) -> Computed {
    num_out(inputs.num("input").max(inputs.num("min")).min(inputs.num("max")))
}

pub(super) fn p_controller(inputs: &Inputs) -> Computed {
    let output = if inputs.bool("enabled") {
        inputs.num("pGain") * (inputs.num("setpoint") - inputs.num("currentValue"))
    } else {
        0.0
    };
    num_out(output)
}

pub(super) fn integrator(inputs: &Inputs, state: NodeState, ctx: &TickContext) -> Computed {
    let prior = match state {
        NodeState::Integrator { accumulator } => accumulator,
        _ => 0.0,
    };

    let accumulator = if inputs.bool("reset") {
        0.0
    } else if inputs.bool("enabled") {
        (prior + inputs.num("input") * ctx.dt)
            .max(-INTEGRATOR_LIMIT)
            .min(INTEGRATOR_LIMIT)
    } else {
        prior
    };

    Computed {
        outputs: vec![("output", Some(PortValue::Number(accumulator)))],
        state: NodeState::Integrator { accumulator },
        aux: None,
    }
}
