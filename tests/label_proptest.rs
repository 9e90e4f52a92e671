//! Property-based tests for label rules
//!
//! Label rules are persistent values: deriving a new rule never changes one handed out
//! before. Composed rules render both sides joined by the separator, dropping it when either
//! side renders empty.

use mdg_core::mdg::labels::{LabelRule, NumberFormat};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Next,
    Sub,
    Reset,
}

fn apply(rule: &LabelRule, op: Op) -> LabelRule {
    match op {
        Op::Next => rule.next(),
        Op::Sub => rule.sub(),
        Op::Reset => rule.reset(),
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Next),
        1 => Just(Op::Sub),
        1 => Just(Op::Reset),
    ]
}

/// Valid number formats
fn format_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("1."),
        Just("A-1."),
        Just("a"),
        Just("1.i"),
        Just("I-a"),
        Just("1a"),
        Just("V.1"),
    ]
}

/// Rules of every plain kind
fn rule_strategy() -> impl Strategy<Value = LabelRule> {
    prop_oneof![
        (0usize..3).prop_map(|l| LabelRule::numbered("test", Some(l))),
        (0usize..3).prop_map(|l| LabelRule::void("test", Some(l))),
        (format_strategy(), 0usize..3).prop_map(|(f, l)| {
            LabelRule::free_form("test", NumberFormat::parse(f).unwrap(), Some(l))
        }),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 0..12)
}

#[cfg(test)]
mod proptest_tests {
    use super::*;

    proptest! {
        #[test]
        fn test_derived_rules_leave_earlier_values_untouched(
            rule in rule_strategy(),
            before in ops_strategy(),
            after in ops_strategy(),
        ) {
            let held = before.iter().fold(rule, |r, op| apply(&r, *op));
            let (name, id, level) = (held.name(), held.id(), held.level());

            let derived = after.iter().fold(held.clone(), |r, op| apply(&r, *op));
            let _ = derived.next().sub().next();

            prop_assert_eq!(held.name(), name);
            prop_assert_eq!(held.id(), id);
            prop_assert_eq!(held.level(), level);
        }

        #[test]
        fn test_sub_starts_child_counter_at_zero(rule in rule_strategy(), steps in 1usize..20) {
            let advanced = (0..steps).fold(rule, |r, _| r.next());
            let child = advanced.sub();
            prop_assert_eq!(child.level(), advanced.level().map(|l| l + 1));
            let (child_id, advanced_id) = (child.id(), advanced.id());
            let next_child_id = child.next().id();
            prop_assert_eq!(child_id.id(), format!("{}-0", advanced_id.id()));
            prop_assert_eq!(next_child_id.id(), format!("{}-1", advanced_id.id()));
        }

        #[test]
        fn test_compose_name(
            base in rule_strategy(),
            current in rule_strategy(),
            base_steps in 0usize..5,
            current_steps in 0usize..5,
            separator in "[-~.]",
        ) {
            let base = (0..base_steps).fold(base, |r, _| r.next());
            let current = (0..current_steps).fold(current, |r, _| r.next());
            let composed = LabelRule::compose(base.clone(), &separator, current.clone());

            let (b, c) = (base.name(), current.name());
            let expected = match (b.is_empty(), c.is_empty()) {
                (false, false) => format!("{}{}{}", b, separator, c),
                (true, _) => c,
                (false, true) => b,
            };
            prop_assert_eq!(composed.name(), expected);
            let composed_id = composed.id();
            prop_assert_eq!(
                composed_id.id(),
                format!("{}-{}", base.id().id(), current.id().id())
            );
        }

        #[test]
        fn test_compose_steps_only_current(base in rule_strategy(), steps in 1usize..10) {
            let base = base.next();
            let composed = (0..steps).fold(
                LabelRule::compose(base.clone(), "-", LabelRule::numbered("test", None)),
                |r, _| r.next(),
            );
            let expected = if base.name().is_empty() {
                steps.to_string()
            } else {
                format!("{}-{}", base.name(), steps)
            };
            prop_assert_eq!(composed.name(), expected);
        }
    }
}
