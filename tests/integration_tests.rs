// Integration tests for simal-core using test fixtures
use simal_core::analyze;
use std::fs;
use std::path::PathBuf;

fn get_test_file_path(subdir: &str, filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join(subdir)
        .join(filename)
}

fn read_test_file(subdir: &str, filename: &str) -> String {
    let path = get_test_file_path(subdir, filename);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("Failed to read test file: {:?}", path))
}

// Tests for valid SiMAL files that should parse and lower successfully
mod ok_tests {
    use super::*;

    #[test]
    fn test_minimal() {
        let source = read_test_file("ok", "minimal.simal");
        let result = analyze(&source, "minimal.simal");
        assert!(
            result.is_ok(),
            "Should parse successfully: {:?}",
            result.err()
        );

        let json = result.unwrap().to_json();
        assert!(json.is_ok(), "Should serialize to JSON");
    }

    #[test]
    fn test_inline() {
        let source = read_test_file("ok", "inline.simal");
        let result = analyze(&source, "inline.simal");
        assert!(
            result.is_ok(),
            "Should parse successfully: {:?}",
            result.err()
        );

        let analysis = result.unwrap();
        assert_eq!(analysis.system.services.len(), 1);
        assert_eq!(analysis.system.services[0].name, "s");
    }

    #[test]
    fn test_blog_platform() {
        let source = read_test_file("ok", "blog_platform.simal");
        let result = analyze(&source, "blog_platform.simal");
        assert!(
            result.is_ok(),
            "Should parse successfully: {:?}",
            result.err()
        );

        let analysis = result.unwrap();
        assert_eq!(analysis.system.services.len(), 2);
        assert_eq!(analysis.system.services[0].name, "users");
        assert_eq!(analysis.system.services[1].name, "posts");
        assert_eq!(analysis.system.services[0].annotations.len(), 2);
    }

    #[test]
    fn test_blog_platform_lowers_to_all_forms() {
        let source = read_test_file("ok", "blog_platform.simal");
        let analysis = analyze(&source, "blog_platform.simal").unwrap();

        assert!(analysis.to_json().is_ok());
        assert!(analysis.to_simple_json().is_ok());
        assert!(analysis.to_max_simple_json().is_ok());
        assert!(analysis.to_yaml().is_ok());
    }

    #[test]
    fn test_heredoc_notes() {
        let source = read_test_file("ok", "heredoc_notes.simal");
        let result = analyze(&source, "heredoc_notes.simal");
        assert!(
            result.is_ok(),
            "Should parse successfully: {:?}",
            result.err()
        );

        let simple = result.unwrap().to_simple_value(false);
        assert_eq!(simple["motd"], "line one\n  line two");
        assert_eq!(simple["selector"], "meta[name=csrf-token]");
        assert_eq!(simple["notes"], "these lines are raw\nand stay together");
    }
}

// Tests for invalid SiMAL files that should produce errors
mod bad_tests {
    use super::*;

    #[test]
    fn test_missing_system() {
        let source = read_test_file("bad", "missing_system.simal");
        let result = analyze(&source, "missing_system.simal");
        assert!(result.is_err(), "Should fail without a system root");
    }

    #[test]
    fn test_unterminated_string() {
        let source = read_test_file("bad", "unterminated_string.simal");
        let result = analyze(&source, "unterminated_string.simal");
        assert!(result.is_err(), "Should fail with unterminated string");
    }

    #[test]
    fn test_unterminated_heredoc() {
        let source = read_test_file("bad", "unterminated_heredoc.simal");
        let result = analyze(&source, "unterminated_heredoc.simal");
        assert!(result.is_err(), "Should fail with unterminated heredoc");
    }

    #[test]
    fn test_duplicate_key() {
        let source = read_test_file("bad", "duplicate_key.simal");
        let result = analyze(&source, "duplicate_key.simal");
        assert!(result.is_err(), "Should fail with duplicate attribute key");
    }

    #[test]
    fn test_unclosed_brace() {
        let source = read_test_file("bad", "unclosed_brace.simal");
        let result = analyze(&source, "unclosed_brace.simal");
        assert!(result.is_err(), "Should fail with unclosed brace");
    }

    #[test]
    fn test_field_missing_colon() {
        let source = read_test_file("bad", "field_missing_colon.simal");
        let result = analyze(&source, "field_missing_colon.simal");
        assert!(result.is_err(), "Should fail with field missing colon");
    }

    #[test]
    fn test_trailing_annotation() {
        let source = read_test_file("bad", "trailing_annotation.simal");
        let result = analyze(&source, "trailing_annotation.simal");
        assert!(result.is_err(), "Should fail with trailing annotation");
    }

    #[test]
    fn test_endpoint_missing_arrow() {
        let source = read_test_file("bad", "endpoint_missing_arrow.simal");
        let result = analyze(&source, "endpoint_missing_arrow.simal");
        assert!(result.is_err(), "Should fail with endpoint missing arrow");
    }

    #[test]
    fn test_method_missing_arrow() {
        let source = read_test_file("bad", "method_missing_arrow.simal");
        let result = analyze(&source, "method_missing_arrow.simal");
        assert!(result.is_err(), "Should fail with method missing arrow");
    }
}
