#![no_main]
use arbitrary::Arbitrary;
use iam_engine::iam::{CidrRange, Condition, ConditionOperator, KeySnapshot, PatternMatcher};
use libfuzzer_sys::fuzz_target;

const OPERATORS: [ConditionOperator; 18] = [
    ConditionOperator::StringEquals,
    ConditionOperator::StringNotEquals,
    ConditionOperator::StringEqualsIgnoreCase,
    ConditionOperator::StringNotEqualsIgnoreCase,
    ConditionOperator::StringLike,
    ConditionOperator::StringNotLike,
    ConditionOperator::NumericEquals,
    ConditionOperator::NumericNotEquals,
    ConditionOperator::NumericLessThan,
    ConditionOperator::NumericLessThanEquals,
    ConditionOperator::NumericGreaterThan,
    ConditionOperator::NumericGreaterThanEquals,
    ConditionOperator::DateEquals,
    ConditionOperator::DateLessThan,
    ConditionOperator::DateGreaterThan,
    ConditionOperator::Bool,
    ConditionOperator::IpAddress,
    ConditionOperator::NotIpAddress,
];

#[derive(Arbitrary, Debug)]
struct Input {
    operator: u8,
    expected: Vec<String>,
    actual: Option<String>,
}

fuzz_target!(|input: Input| {
    let operator = OPERATORS[usize::from(input.operator) % OPERATORS.len()];
    let condition = Condition::new(operator, "fuzz:key", input.expected.iter().cloned());
    let matcher = PatternMatcher::new(4);

    let snapshot = match &input.actual {
        Some(actual) => KeySnapshot::new().with("fuzz:key", actual.as_str()),
        None => KeySnapshot::new(),
    };

    let holds = condition.evaluate(&snapshot, &matcher);
    if input.actual.is_none() {
        assert!(!holds, "condition held without its key");
    }

    for expected in &input.expected {
        if let Some(range) = CidrRange::parse(expected) {
            if let Some(addr) = input.actual.as_deref().and_then(|a| a.trim().parse().ok()) {
                let _ = range.contains(addr);
            }
        }
    }
});
