use slicknxt_core::port::PortValue;

use super::{Computed, Inputs};

pub(super) fn dial(inputs: &Inputs) -> Computed {
    Computed::stateless(vec![("value", Some(PortValue::Number(inputs.num("value"))))])
}

pub(super) fn switch(inputs: &Inputs) -> Computed {
    Computed::stateless(vec![("value", Some(PortValue::Bool(inputs.bool("value"))))])
}

/// Motor outputs mirror its resolved inputs, speed limited to 0..=100.
pub(super) fn motor(inputs: &Inputs) -> Computed {
    let speed = inputs.num("speed").max(0.0).min(100.0);
    Computed::stateless(vec![
        ("onOff", Some(PortValue::Bool(inputs.bool("onOff")))),
        ("forward", Some(PortValue::Bool(inputs.bool("forward")))),
        ("speed", Some(PortValue::Number(speed))),
    ])
}
