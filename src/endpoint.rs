//! Endpoint signature enrichment.
//!
//! Takes the raw request/response strings the parser stored on each
//! [`Endpoint`] and attempts a structural parse into a [`Shape`] tree:
//! named objects (`User{...}`), anonymous objects (`{...}` / `JSON{...}`),
//! tuples (`(name: T, ...)`), and primitives, with a trailing `?` marking
//! the shape optional. From the parsed shapes the flat `inputs`/`outputs`
//! lists are derived; HTTP path placeholders contribute `str` inputs.
//!
//! Enrichment is deliberately non-fatal: any imbalance or stray token in a
//! signature leaves that endpoint with its raw strings and no derived IO.

use crate::ast::{
    Endpoint, EndpointInput, EndpointOutput, EndpointStyle, Shape, ShapeField, System, TypeExpr,
    Value,
};
use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("valid placeholder regex"));
static OPEN_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([<\[])\s+").expect("valid bracket regex"));
static CLOSE_WS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([>\]])").expect("valid bracket regex"));

/// Walks the whole tree and enriches every endpoint in place.
pub fn enrich_system(system: &mut System) {
    for attr in &mut system.attributes {
        enrich_value(&mut attr.value);
    }
    for service in &mut system.services {
        for attr in &mut service.attributes {
            enrich_value(&mut attr.value);
        }
    }
}

fn enrich_value(value: &mut Value) {
    match value {
        Value::Endpoint(ep) => enrich_endpoint(ep),
        Value::Map(entries) => {
            for entry in entries {
                enrich_value(&mut entry.value);
            }
        }
        Value::List(items) => {
            for item in items {
                enrich_value(item);
            }
        }
        Value::Block(block) => {
            for attr in &mut block.attributes {
                enrich_value(&mut attr.value);
            }
        }
        Value::Method(method) => {
            for attr in &mut method.attributes {
                enrich_value(&mut attr.value);
            }
        }
        Value::Annotated(attr) => enrich_value(&mut attr.value),
        Value::Scalar(_) | Value::Field(_) => {}
    }
}

/// Parses the request/response signatures of one endpoint and derives its
/// `inputs` and `outputs`. Path placeholders come first; a request body
/// field shadows a placeholder of the same name.
pub fn enrich_endpoint(ep: &mut Endpoint) {
    ep.request_shape = try_parse_signature(&ep.request);
    ep.response_shape = try_parse_signature(&ep.response);

    let body: Vec<EndpointInput> = ep
        .request_shape
        .as_ref()
        .map(shape_params)
        .unwrap_or_default()
        .into_iter()
        .map(|(name, ty, _)| EndpointInput { name, ty })
        .collect();

    let mut inputs: Vec<EndpointInput> = Vec::new();
    if ep.style == EndpointStyle::Http {
        inputs.extend(path_placeholders(&ep.path));
        inputs.retain(|p| !body.iter().any(|b| b.name == p.name));
    }
    inputs.extend(body);
    ep.inputs = inputs;

    ep.outputs = ep
        .response_shape
        .as_ref()
        .map(shape_params)
        .unwrap_or_default()
        .into_iter()
        .map(|(name, ty, optional)| EndpointOutput { name, ty, optional })
        .collect();
}

/// Attempts the structural parse; `None` keeps the raw string authoritative.
pub fn try_parse_signature(sig: &str) -> Option<Shape> {
    let sig = sig.trim();
    if sig.is_empty() {
        return None;
    }
    SigParser::new(sig).parse_signature().ok()
}

/// Every `{name}` segment of an HTTP path becomes a `str` input.
fn path_placeholders(path: &str) -> Vec<EndpointInput> {
    PLACEHOLDER_RE
        .captures_iter(path)
        .map(|cap| EndpointInput {
            name: cap[1].to_string(),
            ty: "str".to_string(),
        })
        .collect()
}

/// Flattens an object or tuple shape into `(name, type, optional)` rows.
/// Primitive shapes contribute nothing.
fn shape_params(shape: &Shape) -> Vec<(String, String, bool)> {
    let fields = match shape {
        Shape::Tuple(params) => params,
        Shape::Type(t) => match &t.fields {
            Some(fields) => fields,
            None => return Vec::new(),
        },
    };
    fields
        .iter()
        .map(|f| (f.name.clone(), f.ty.base.clone(), f.ty.optional))
        .collect()
}

struct SigError;

/// Character-level parser for endpoint signatures. Inputs are short; the
/// whole text must be consumed or the parse fails.
struct SigParser {
    chars: Vec<char>,
    i: usize,
}

impl SigParser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            i: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.i).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.i += 1;
        }
        ch
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.i += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.i >= self.chars.len()
    }

    fn parse_ident(&mut self) -> Result<String, SigError> {
        self.skip_ws();
        let start = self.i;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '_')
        {
            self.i += 1;
        }
        if self.i == start {
            return Err(SigError);
        }
        Ok(self.chars[start..self.i].iter().collect())
    }

    /// Top-level entry: a tuple when the text starts with `(`, otherwise a
    /// single type expression covering the whole input.
    fn parse_signature(&mut self) -> Result<Shape, SigError> {
        self.skip_ws();
        if self.peek() == Some('(') {
            return self.parse_tuple();
        }
        let t = self.parse_type_expr()?;
        self.skip_ws();
        if !self.at_end() {
            return Err(SigError);
        }
        Ok(Shape::Type(t))
    }

    fn parse_tuple(&mut self) -> Result<Shape, SigError> {
        if self.advance() != Some('(') {
            return Err(SigError);
        }
        let params = self.parse_param_list()?;
        self.skip_ws();
        if self.advance() != Some(')') {
            return Err(SigError);
        }
        self.skip_ws();
        if !self.at_end() {
            return Err(SigError);
        }
        Ok(Shape::Tuple(params))
    }

    fn parse_param_list(&mut self) -> Result<Vec<ShapeField>, SigError> {
        let mut params = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(')') | None => break,
                _ => {}
            }
            params.push(self.parse_param()?);
            self.skip_ws();
            if self.peek() == Some(',') {
                self.advance();
            }
        }
        Ok(params)
    }

    /// `name: TypeExpr` or the bare `name Type` form.
    fn parse_param(&mut self) -> Result<ShapeField, SigError> {
        let name = self.parse_ident()?;
        self.skip_ws();
        if self.peek() == Some(':') {
            self.advance();
            let ty = self.parse_type_expr()?;
            return Ok(ShapeField { name, ty });
        }
        let base = self.parse_ident()?;
        Ok(ShapeField {
            name,
            ty: TypeExpr {
                base,
                fields: None,
                optional: false,
            },
        })
    }

    /// `Base [<...> | [...]]* [{fields}] [?]`; a leading `{` is an
    /// anonymous object with an empty base.
    fn parse_type_expr(&mut self) -> Result<TypeExpr, SigError> {
        self.skip_ws();

        let mut base = if self.peek() == Some('{') {
            String::new()
        } else {
            let mut name = self.parse_ident()?;
            loop {
                self.skip_ws();
                match self.peek() {
                    Some('<') => name.push_str(&self.parse_balanced('<', '>')?),
                    Some('[') => name.push_str(&self.parse_balanced('[', ']')?),
                    _ => break,
                }
            }
            name
        };
        base = compact_bracket_ws(&base);

        self.skip_ws();
        let fields = if self.peek() == Some('{') {
            let f = self.parse_object_fields()?;
            self.skip_ws();
            Some(f)
        } else {
            None
        };

        let mut optional = false;
        if self.peek() == Some('?') {
            self.advance();
            optional = true;
        }

        Ok(TypeExpr {
            base,
            fields,
            optional,
        })
    }

    fn parse_balanced(&mut self, open: char, close: char) -> Result<String, SigError> {
        let start = self.i;
        let mut depth = 0usize;
        while let Some(ch) = self.advance() {
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(self.chars[start..self.i].iter().collect());
                }
            }
        }
        Err(SigError)
    }

    /// `{ name: TypeExpr | name Type[?] , ... }`
    fn parse_object_fields(&mut self) -> Result<Vec<ShapeField>, SigError> {
        if self.advance() != Some('{') {
            return Err(SigError);
        }
        let mut fields = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some('}') => {
                    self.advance();
                    break;
                }
                None => return Err(SigError),
                _ => {}
            }

            let name = self.parse_ident()?;
            self.skip_ws();
            let ty = if self.peek() == Some(':') {
                self.advance();
                self.parse_type_expr()?
            } else {
                let base = self.parse_ident()?;
                self.skip_ws();
                let mut optional = false;
                if self.peek() == Some('?') {
                    self.advance();
                    optional = true;
                }
                TypeExpr {
                    base,
                    fields: None,
                    optional,
                }
            };
            fields.push(ShapeField { name, ty });

            self.skip_ws();
            if self.peek() == Some(',') {
                self.advance();
            }
        }
        Ok(fields)
    }
}

/// `map < int, Todo >` normalizes to `map<int, Todo>`; spaces after commas
/// are kept.
fn compact_bracket_ws(s: &str) -> String {
    let s = OPEN_WS_RE.replace_all(s, "$1");
    CLOSE_WS_RE.replace_all(&s, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep_http(path: &str, request: &str, response: &str) -> Endpoint {
        Endpoint {
            style: EndpointStyle::Http,
            method: "GET".to_string(),
            path: path.to_string(),
            request: request.to_string(),
            response: response.to_string(),
            raw: String::new(),
            attributes: Vec::new(),
            annotations: Vec::new(),
            request_shape: None,
            response_shape: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    #[test]
    fn test_primitive_signature() {
        let shape = try_parse_signature("str?").unwrap();
        match shape {
            Shape::Type(t) => {
                assert_eq!(t.base, "str");
                assert!(t.optional);
                assert!(t.fields.is_none());
            }
            Shape::Tuple(_) => panic!("expected a type"),
        }
    }

    #[test]
    fn test_named_object_signature() {
        let shape = try_parse_signature("User{name: str, email: str, verified: bool}?").unwrap();
        match shape {
            Shape::Type(t) => {
                assert_eq!(t.base, "User");
                assert!(t.optional);
                let fields = t.fields.unwrap();
                assert_eq!(fields.len(), 3);
                assert_eq!(fields[0].name, "name");
                assert_eq!(fields[2].ty.base, "bool");
            }
            Shape::Tuple(_) => panic!("expected a type"),
        }
    }

    #[test]
    fn test_anonymous_object_signature() {
        let shape = try_parse_signature("{id: str, force: bool?}").unwrap();
        match shape {
            Shape::Type(t) => {
                assert_eq!(t.base, "");
                let fields = t.fields.unwrap();
                assert_eq!(fields[1].name, "force");
                assert!(fields[1].ty.optional);
            }
            Shape::Tuple(_) => panic!("expected a type"),
        }
    }

    #[test]
    fn test_tuple_signature() {
        let shape = try_parse_signature("(user: User{id: str}?, error: str?)").unwrap();
        match shape {
            Shape::Tuple(params) => {
                assert_eq!(params.len(), 2);
                assert_eq!(params[0].name, "user");
                assert_eq!(params[0].ty.base, "User");
                assert!(params[0].ty.optional);
                assert_eq!(params[1].ty.base, "str");
            }
            Shape::Type(_) => panic!("expected a tuple"),
        }
    }

    #[test]
    fn test_go_style_object_fields() {
        let shape = try_parse_signature("GetUserRequest{uuid str}").unwrap();
        match shape {
            Shape::Type(t) => {
                let fields = t.fields.unwrap();
                assert_eq!(fields[0].name, "uuid");
                assert_eq!(fields[0].ty.base, "str");
            }
            Shape::Tuple(_) => panic!("expected a type"),
        }
    }

    #[test]
    fn test_generic_suffix_folds_into_base() {
        let shape = try_parse_signature("map< int, Todo >?").unwrap();
        match shape {
            Shape::Type(t) => {
                assert_eq!(t.base, "map<int, Todo>");
                assert!(t.optional);
            }
            Shape::Tuple(_) => panic!("expected a type"),
        }
    }

    #[test]
    fn test_unbalanced_signature_fails() {
        assert!(try_parse_signature("JSON{uuid: str").is_none());
        assert!(try_parse_signature("(a: str").is_none());
        assert!(try_parse_signature("User{x: str} trailing").is_none());
        assert!(try_parse_signature("").is_none());
    }

    #[test]
    fn test_http_enrichment_with_placeholders_and_optionals() {
        let mut ep = ep_http(
            "/api/comments/{id}",
            "",
            "JSON{comments: list?, error: str?}",
        );
        enrich_endpoint(&mut ep);

        assert_eq!(ep.inputs.len(), 1);
        assert_eq!(ep.inputs[0].name, "id");
        assert_eq!(ep.inputs[0].ty, "str");

        assert_eq!(ep.outputs.len(), 2);
        assert_eq!(ep.outputs[0].name, "comments");
        assert_eq!(ep.outputs[0].ty, "list");
        assert!(ep.outputs[0].optional);
        assert_eq!(ep.outputs[1].name, "error");
        assert!(ep.outputs[1].optional);
    }

    #[test]
    fn test_body_field_shadows_placeholder() {
        let mut ep = ep_http("/users/{id}", "JSON{id: UUID, name: str}", "JSON{ok: bool}");
        enrich_endpoint(&mut ep);

        assert_eq!(ep.inputs.len(), 2);
        assert_eq!(ep.inputs[0].name, "id");
        assert_eq!(ep.inputs[0].ty, "UUID");
        assert_eq!(ep.inputs[1].name, "name");
    }

    #[test]
    fn test_placeholders_precede_body_fields() {
        let mut ep = ep_http("/posts/{slug}", "JSON{title: str}", "str");
        enrich_endpoint(&mut ep);

        assert_eq!(ep.inputs.len(), 2);
        assert_eq!(ep.inputs[0].name, "slug");
        assert_eq!(ep.inputs[0].ty, "str");
        assert_eq!(ep.inputs[1].name, "title");
        // primitive responses carry no flattened outputs
        assert!(ep.outputs.is_empty());
    }

    #[test]
    fn test_failed_parse_keeps_raw_strings() {
        let mut ep = ep_http("/x", "JSON{broken", "also broken {");
        enrich_endpoint(&mut ep);

        assert!(ep.request_shape.is_none());
        assert!(ep.response_shape.is_none());
        assert!(ep.inputs.is_empty());
        assert!(ep.outputs.is_empty());
        assert_eq!(ep.request, "JSON{broken");
    }

    #[test]
    fn test_grpc_enrichment() {
        let mut ep = Endpoint {
            style: EndpointStyle::Grpc,
            method: "GetUser".to_string(),
            path: String::new(),
            request: "GetUserRequest{uuid str}".to_string(),
            response: "(user: User?, error: str?)".to_string(),
            raw: String::new(),
            attributes: Vec::new(),
            annotations: Vec::new(),
            request_shape: None,
            response_shape: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        enrich_endpoint(&mut ep);

        assert_eq!(ep.inputs.len(), 1);
        assert_eq!(ep.inputs[0].name, "uuid");
        assert_eq!(ep.outputs.len(), 2);
        assert_eq!(ep.outputs[0].name, "user");
        assert!(ep.outputs[0].optional);
    }
}
