use slicknxt_core::port::PortValue;

use super::{Computed, Inputs};
use crate::registry::NodeConfig;

fn bool_out(value: bool) -> Computed {
    Computed::stateless(vec![("output", Some(PortValue::Bool(value)))])
}

pub(super) fn and(inputs: &Inputs) -> Computed {
    bool_out(inputs.bool("a") && inputs.bool("b"))
}

pub(super) fn or(inputs: &Inputs) -> Computed {
    bool_out(inputs.bool("a") || inputs.bool("b"))
}

pub(super) fn xor(inputs: &Inputs) -> Computed {
    bool_out(inputs.bool("a") ^ inputs.bool("b"))
}

pub(super) fn not(inputs: &Inputs) -> Computed {
    bool_out(!inputs.bool("input"))
}

/// `b` falls back to the configured threshold when nothing feeds it.
pub(super) fn comparator(inputs: &Inputs, config: &NodeConfig) -> Computed {
    let a = inputs.num("a");
    let b = inputs
        .num_opt("b")
        .unwrap_or_else(|| inputs.num("threshold"));
    bool_out(config.compare_mode().apply(a, b))
}

/// Passes `signal` through while enabled, otherwise emits an absent value.
pub(super) fn bool_gate(inputs: &Inputs) -> Computed {
    let output = if inputs.bool("enable") {
        inputs.value("signal")
    } else {
        None
    };
    Computed::stateless(vec![("output", output)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeKind;

    fn ab(a: bool, b: bool) -> Inputs {
        [("a", a), ("b", b)].into_iter().collect()
    }

    #[test]
    fn test_truth_tables() {
        for (a, b) in [(false, false), (false, true), (true, false), (true, true)] {
            assert_eq!(and(&ab(a, b)).output("output"), Some(PortValue::Bool(a && b)));
            assert_eq!(or(&ab(a, b)).output("output"), Some(PortValue::Bool(a || b)));
            assert_eq!(xor(&ab(a, b)).output("output"), Some(PortValue::Bool(a != b)));
        }
        assert_eq!(not(&Inputs::new()).output("output"), Some(PortValue::Bool(true)));
    }

    #[test]
    fn test_absent_inputs_read_false() {
        assert_eq!(or(&Inputs::new()).output("output"), Some(PortValue::Bool(false)));
    }

    #[test]
    fn test_comparator_uses_threshold_for_missing_b() {
        let mut config = NodeConfig::defaults(NodeKind::Comparator);
        config.settings = crate::registry::Settings::Comparator {
            mode: crate::registry::CompareMode::Greater,
        };
        let mut inputs: Inputs = [("a", 60.0), ("threshold", 50.0)].into_iter().collect();
        assert_eq!(comparator(&inputs, &config).output("output"), Some(PortValue::Bool(true)));

        inputs.set("b", Some(PortValue::Number(70.0)));
        assert_eq!(comparator(&inputs, &config).output("output"), Some(PortValue::Bool(false)));
    }

    #[test]
    fn test_bool_gate_emits_absent_when_disabled() {
        let mut inputs: Inputs = [("signal", PortValue::Number(4.0)), ("enable", PortValue::Bool(true))]
            .into_iter()
            .collect();
        assert_eq!(bool_gate(&inputs).output("output"), Some(PortValue::Number(4.0)));

        inputs.set("enable", Some(PortValue::Bool(false)));
        let out = bool_gate(&inputs);
        assert_eq!(out.outputs, vec![("output", None)]);
    }
}
