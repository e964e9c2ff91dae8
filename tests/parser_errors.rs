// Additional parser error path tests
// These systematically test unhappy paths to improve coverage

use simal_core::analyze;

#[test]
fn test_parser_error_missing_closing_brace() {
    let source = "system { key: 123";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail with missing }}");
}

#[test]
fn test_parser_error_missing_closing_bracket() {
    let source = "system { arr: [a, b, c }";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail with missing ]");
}

#[test]
fn test_parser_error_missing_colon() {
    let source = "system { key 123 }";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail with missing :");
}

#[test]
fn test_parser_error_missing_root() {
    let source = "key: value";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail without system root");
}

#[test]
fn test_parser_error_empty_input() {
    let result = analyze("", "test.simal");
    assert!(result.is_err(), "Should fail on empty input");
}

#[test]
fn test_parser_error_system_without_brace() {
    let source = "system";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail without an opening brace");
}

#[test]
fn test_parser_error_duplicate_key_in_service() {
    let source = "system { service s { a: 1\n a: 2 } }";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail with duplicate key");
}

#[test]
fn test_parser_error_duplicate_key_in_component() {
    let source = "system { s: { components: [ db X { e: 1\n e: 2 } ] } }";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail with duplicate key");
}

#[test]
fn test_parser_error_duplicate_endpoint_attr() {
    let source = "system { s: { endpoints: [ GET /x -> str [auth: true, auth: false] ] } }";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail with duplicate endpoint attr");
}

#[test]
fn test_parser_error_service_block_in_components() {
    let source = "system { s: { components: [ service X { } ] } }";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should reject `service` as a component kind");
}

#[test]
fn test_parser_error_method_missing_params() {
    let source = "system { s: { methods: [ broken -> string ] } }";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail without a parameter list");
}

#[test]
fn test_parser_error_method_unclosed_params() {
    let source = "system { s: { methods: [ broken(x int -> string ] } }";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail with unclosed parameter list");
}

#[test]
fn test_parser_error_trailing_annotation_in_list() {
    let source = "system { xs: [ a, @ORPHAN ] }";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail with trailing annotation");
}

#[test]
fn test_parser_error_trailing_annotation_in_map() {
    let source = "system { m: { a: 1\n @ORPHAN } }";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail with trailing annotation");
}

#[test]
fn test_parser_error_unclosed_annotation() {
    let source = "system { @BROKEN(a, b\n x: 1 }";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail with unclosed annotation args");
}

#[test]
fn test_parser_error_content_after_root() {
    let source = "system { }\nleftover: 1";
    let result = analyze(source, "test.simal");
    assert!(result.is_err(), "Should fail with content after the root");
}

#[test]
fn test_error_mentions_line_and_column() {
    let source = "system {\n  a: 1\n  a: 2\n}";
    let err = analyze(source, "test.simal").unwrap_err();
    let message = format!("{err}");
    assert!(
        message.contains("line 3"),
        "expected line info in: {message}"
    );
}
