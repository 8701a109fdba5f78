#![no_main]
use arbitrary::Arbitrary;
use iam_engine::iam::{CaseSensitivity, PatternMatcher, ResourceAccount, ResourcePattern};
use iam_engine::QualifiedName;
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
struct Input {
    pattern: String,
    value: String,
    ignore_case: bool,
}

fuzz_target!(|input: Input| {
    let matcher = PatternMatcher::new(4);
    let case = if input.ignore_case {
        CaseSensitivity::Insensitive
    } else {
        CaseSensitivity::Sensitive
    };

    let first = matcher.matches(&input.pattern, &input.value, case);
    // Cached and uncached answers must agree
    assert_eq!(first, matcher.matches(&input.pattern, &input.value, case));
    matcher.clear_cache();
    assert_eq!(first, matcher.matches(&input.pattern, &input.value, case));

    if !input.pattern.contains(['*', '?']) && case == CaseSensitivity::Sensitive {
        assert_eq!(first, input.pattern == input.value);
    }

    let resource = ResourcePattern::parse(&input.pattern);
    let resource_type = QualifiedName::parse(&input.value).ok();
    let any_account = resource.matches(&matcher, &ResourceAccount::Unowned, resource_type.as_ref(), &input.value);
    let owned = resource.matches(
        &matcher,
        &ResourceAccount::account("000000000001"),
        resource_type.as_ref(),
        &input.value,
    );
    // Naming an account can only narrow a pattern, never widen it
    if any_account {
        assert!(owned);
    }
});
