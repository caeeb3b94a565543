//! Unit tests for component errors.

use rstest::rstest;

use super::*;

#[rstest]
#[case(ComponentError::unavailable("ib", "no adapters"), true)]
#[case(ComponentError::NoViableComponent { category: Category::Transport }, false)]
#[case(ComponentError::operation("tcp", "enable", "socket closed"), false)]
fn only_unavailability_is_ignorable(#[case] error: ComponentError, #[case] expected: bool) {
    assert_eq!(error.is_ignorable(), expected);
}

#[test]
fn messages_name_the_category() {
    let error = ComponentError::NoViableComponent {
        category: Category::MemoryPool,
    };
    assert_eq!(error.to_string(), "no viable memory-pool component");
}

#[test]
fn operation_errors_name_the_hook() {
    let error = ComponentError::operation("tcp", "add_procs", "peer unreachable");
    assert_eq!(
        error.to_string(),
        "component 'tcp' failed during add_procs: peer unreachable"
    );
}
