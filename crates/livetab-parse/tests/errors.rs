use livetab_parse::{NoReferences, ParserStatusCode, TokenMapper, compile};

#[test]
fn errors_carry_code_position_and_message() {
    let m = TokenMapper::syntax_only();
    let err = compile("1 + (2 * 3", &m, &NoReferences).unwrap_err();
    assert_eq!(err.code, ParserStatusCode::ParenMismatch);
    assert_eq!(err.position, 10);
    assert_eq!(err.to_string(), "ParenMismatch at position 10: missing ')'");

    let err = compile("1 + unknown", &m, &NoReferences).unwrap_err();
    assert_eq!(err.code, ParserStatusCode::InvalidOperand);
    assert_eq!(err.position, 4);
}

#[test]
fn syntax_only_mapper_handles_the_core_surface() {
    let m = TokenMapper::syntax_only();
    for ok in [
        "1 + 2 * 3",
        "-(1 - 2) ^ 2 % 7",
        "true && !false || not null",
        "'a' = \"a\"",
        "1 >= 2 and 3 <= 4 or 5 != 6",
    ] {
        assert!(compile(ok, &m, &NoReferences).is_ok(), "{ok}");
    }
}
