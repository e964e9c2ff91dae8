use crate::ast::System;
use crate::convert::{system_from_json, system_to_json, system_to_simple_json};
use crate::endpoint::enrich_system;
use crate::error::{ConvertError, SimalError};
use crate::parser::Parser;
use serde_json::Value as Json;

/// The result of successfully analyzing a SiMAL source.
///
/// Holds the enriched [`System`] and provides the JSON/YAML lowerings.
/// Each lowering is a pure function over the AST; the same `Analysis` may
/// be lowered repeatedly and shared freely across threads.
#[derive(Debug)]
pub struct Analysis {
    pub system: System,
}

impl Analysis {
    /// The full, `__type__`-tagged JSON value (round-trippable).
    #[must_use]
    pub fn to_value(&self) -> Json {
        system_to_json(&self.system)
    }

    /// The full JSON form as a pretty-printed string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_value())
    }

    /// The flattened simple JSON value; `max_simple` collapses method and
    /// endpoint signatures into `def` strings where possible.
    #[must_use]
    pub fn to_simple_value(&self, max_simple: bool) -> Json {
        system_to_simple_json(&self.system, max_simple)
    }

    /// The simple JSON form as a pretty-printed string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_simple_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_simple_value(false))
    }

    /// The max-simple JSON form as a pretty-printed string.
    ///
    /// # Errors
    /// Returns a `serde_json::Error` if serialization fails.
    pub fn to_max_simple_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_simple_value(true))
    }

    /// The full JSON form rendered as YAML.
    ///
    /// # Errors
    /// Returns a `serde_yaml::Error` if serialization fails.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.to_value())
    }

    /// Reconstructs an analysis from a previously emitted full JSON value.
    ///
    /// # Errors
    /// Fails when the value does not follow the tagged layout.
    pub fn from_value(value: &Json) -> Result<Analysis, ConvertError> {
        Ok(Analysis {
            system: system_from_json(value)?,
        })
    }
}

/// Parses and enriches a SiMAL source string.
///
/// This is the primary entry point: it tokenizes, parses the `system`
/// block into an AST, and runs endpoint enrichment. `file_name` is only
/// used for error reporting.
///
/// # Errors
///
/// Returns a [`SimalError`] when tokenizing or parsing fails; no partial
/// AST is produced. Endpoint enrichment never fails.
pub fn analyze(source: &str, file_name: &str) -> Result<Analysis, SimalError> {
    let mut parser = Parser::new_with_name(source, file_name)?;
    let mut system = parser.parse_system()?;
    enrich_system(&mut system);
    Ok(Analysis { system })
}

#[cfg(test)]
mod tests {
    use crate::analyze;
    use serde_json::json;

    #[test]
    fn test_analyze_to_simple_json() {
        let source = r#"
        system {
            type: monolith
            mail: { driver: smtp, port: 587 }
            service web {
                langs: [php]
            }
        }
        "#;

        let expected = json!({
            "type": "monolith",
            "mail": {"driver": "smtp", "port": "587"},
            "services": [{"name": "web", "langs": ["php"]}],
        });

        let analysis = analyze(source, "test.simal").unwrap();
        let rendered = analysis.to_simple_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_analyze_full_json_has_type_tags() {
        let analysis = analyze("system { a: 1 }", "test.simal").unwrap();
        let value = analysis.to_value();

        assert_eq!(value["__type__"], "System");
        assert_eq!(value["attributes"][0]["__type__"], "Attribute");
    }

    #[test]
    fn test_analyze_to_yaml() {
        let analysis = analyze("system { a: 1 }", "test.simal").unwrap();
        let yaml = analysis.to_yaml().unwrap();

        assert!(yaml.contains("__type__: System"));
    }

    #[test]
    fn test_analysis_from_value_round_trips() {
        let analysis = analyze(
            "system { service s { endpoints_meta: x } }",
            "test.simal",
        )
        .unwrap();
        let rebuilt = crate::Analysis::from_value(&analysis.to_value()).unwrap();

        assert_eq!(rebuilt.system, analysis.system);
    }

    #[test]
    fn test_analyze_error_reports_position() {
        let err = analyze("system { a: \"unterminated }", "broken.simal").unwrap_err();
        let message = format!("{err}");

        assert!(message.contains("line 1"), "message was: {message}");
    }
}
