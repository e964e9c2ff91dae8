//! JSON lowerings for the SiMAL AST.
//!
//! Two independent, pure lowerings over a parsed [`System`]:
//!
//! - **Full JSON** (`system_to_json` / `system_from_json`): every AST node
//!   becomes a mapping with a `__type__` discriminator, ordered containers
//!   become arrays of `{key, value, annotations?}` entries, and the result
//!   round-trips back into a structurally equal AST.
//! - **Simple JSON** (`system_to_simple_json`): a flattened, lossy form for
//!   prompt consumption, with an optional max-simple mode that compresses
//!   method and endpoint signatures into single `def` strings.

use crate::ast::{
    Annotation, Attribute, Block, Endpoint, EndpointStyle, Field, MapEntry, Method, Service,
    System, Value, Visibility,
};
use crate::endpoint::enrich_system;
use crate::error::ConvertError;
use regex::Regex;
use serde_json::{json, Map as JsonMap, Value as Json};
use std::sync::LazyLock;

static BRACKET_ATTRS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]").expect("valid bracket regex"));

// === Full JSON ===

/// Lowers a system into the `__type__`-tagged, round-trippable JSON form.
pub fn system_to_json(system: &System) -> Json {
    json!({
        "__type__": "System",
        "attributes": attrs_to_json(&system.attributes),
        "services": system.services.iter().map(service_to_json).collect::<Vec<_>>(),
    })
}

fn service_to_json(service: &Service) -> Json {
    json!({
        "__type__": "Service",
        "name": service.name,
        "annotations": anns_to_json(&service.annotations),
        "attributes": attrs_to_json(&service.attributes),
    })
}

fn block_to_json(block: &Block) -> Json {
    json!({
        "__type__": "Block",
        "kind": block.kind,
        "name": block.name,
        "annotations": anns_to_json(&block.annotations),
        "attributes": attrs_to_json(&block.attributes),
    })
}

fn anns_to_json(anns: &[Annotation]) -> Json {
    Json::Array(
        anns.iter()
            .map(|a| {
                json!({
                    "__type__": "Annotation",
                    "name": a.name,
                    "args": a.args,
                })
            })
            .collect(),
    )
}

fn attrs_to_json(attrs: &[Attribute]) -> Json {
    Json::Array(attrs.iter().map(attr_to_json).collect())
}

fn attr_to_json(attr: &Attribute) -> Json {
    json!({
        "__type__": "Attribute",
        "key": attr.key,
        "value": value_to_json(&attr.value),
        "annotations": anns_to_json(&attr.annotations),
    })
}

fn field_to_json(field: &Field) -> Json {
    json!({
        "__type__": "Field",
        "visibility": field.visibility.as_str(),
        "name": field.name,
        "type": field.ty,
        "annotations": anns_to_json(&field.annotations),
    })
}

fn method_to_json(method: &Method) -> Json {
    json!({
        "__type__": "Method",
        "visibility": method.visibility.as_str(),
        "name": method.name,
        "params": method.params,
        "returns": method.returns,
        "annotations": anns_to_json(&method.annotations),
        "attributes": attrs_to_json(&method.attributes),
    })
}

fn endpoint_to_json(ep: &Endpoint) -> Json {
    // derived shapes and IO lists are recomputed on the way back in
    json!({
        "__type__": "Endpoint",
        "style": ep.style.as_str(),
        "method": ep.method,
        "path": ep.path,
        "request": ep.request,
        "response": ep.response,
        "raw": ep.raw,
        "annotations": anns_to_json(&ep.annotations),
        "attributes": ep.attributes.iter()
            .map(|(k, v)| json!({"key": k, "value": v}))
            .collect::<Vec<_>>(),
    })
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::Scalar(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => {
            let entries: Vec<Json> = entries
                .iter()
                .map(|e| {
                    let mut obj = JsonMap::new();
                    obj.insert("key".to_string(), Json::String(e.key.clone()));
                    obj.insert("value".to_string(), value_to_json(&e.value));
                    if !e.annotations.is_empty() {
                        obj.insert("annotations".to_string(), anns_to_json(&e.annotations));
                    }
                    Json::Object(obj)
                })
                .collect();
            json!({
                "__type__": "Map",
                "entries": entries,
            })
        }
        Value::Block(b) => block_to_json(b),
        Value::Field(f) => field_to_json(f),
        Value::Method(m) => method_to_json(m),
        Value::Endpoint(e) => endpoint_to_json(e),
        Value::Annotated(attr) => attr_to_json(attr),
    }
}

// === Full JSON, reverse pass ===

/// Rebuilds a system from its full-JSON form and re-runs endpoint
/// enrichment, yielding an AST structurally equal to the original.
///
/// # Errors
///
/// Fails when the JSON does not follow the tagged layout.
pub fn system_from_json(data: &Json) -> Result<System, ConvertError> {
    let obj = expect_tagged(data, "System")?;

    let mut system = System {
        attributes: attrs_from_json(obj.get("attributes"))?,
        services: Vec::new(),
    };

    for svc in expect_array(obj.get("services"), "services")? {
        let svc_obj = expect_tagged(svc, "Service")?;
        system.services.push(Service {
            name: expect_str(svc_obj.get("name"), "service name")?,
            annotations: anns_from_json(svc_obj.get("annotations"))?,
            attributes: attrs_from_json(svc_obj.get("attributes"))?,
        });
    }

    enrich_system(&mut system);
    Ok(system)
}

fn expect_tagged<'a>(data: &'a Json, tag: &str) -> Result<&'a JsonMap<String, Json>, ConvertError> {
    let obj = data
        .as_object()
        .ok_or_else(|| ConvertError::Malformed(format!("expected a `{tag}` object")))?;
    match obj.get("__type__").and_then(Json::as_str) {
        Some(t) if t == tag => Ok(obj),
        other => Err(ConvertError::Malformed(format!(
            "expected __type__ `{tag}`, found {other:?}"
        ))),
    }
}

fn expect_array<'a>(data: Option<&'a Json>, what: &str) -> Result<&'a Vec<Json>, ConvertError> {
    data.and_then(Json::as_array)
        .ok_or_else(|| ConvertError::Malformed(format!("expected `{what}` to be an array")))
}

fn expect_str(data: Option<&Json>, what: &str) -> Result<String, ConvertError> {
    data.and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| ConvertError::Malformed(format!("expected `{what}` to be a string")))
}

fn opt_str(data: Option<&Json>) -> String {
    data.and_then(Json::as_str).unwrap_or_default().to_string()
}

fn anns_from_json(data: Option<&Json>) -> Result<Vec<Annotation>, ConvertError> {
    let Some(data) = data else {
        return Ok(Vec::new());
    };
    let mut anns = Vec::new();
    for item in expect_array(Some(data), "annotations")? {
        let obj = expect_tagged(item, "Annotation")?;
        let args = match obj.get("args") {
            Some(Json::Array(items)) => items
                .iter()
                .map(|a| {
                    a.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| ConvertError::Malformed("annotation args must be strings".into()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            _ => Vec::new(),
        };
        anns.push(Annotation {
            name: expect_str(obj.get("name"), "annotation name")?,
            args,
        });
    }
    Ok(anns)
}

fn attrs_from_json(data: Option<&Json>) -> Result<Vec<Attribute>, ConvertError> {
    let Some(data) = data else {
        return Ok(Vec::new());
    };
    let mut attrs = Vec::new();
    for item in expect_array(Some(data), "attributes")? {
        attrs.push(attr_from_json(item)?);
    }
    Ok(attrs)
}

fn attr_from_json(data: &Json) -> Result<Attribute, ConvertError> {
    let obj = expect_tagged(data, "Attribute")?;
    Ok(Attribute {
        key: expect_str(obj.get("key"), "attribute key")?,
        value: value_from_json(
            obj.get("value")
                .ok_or_else(|| ConvertError::Malformed("attribute without value".into()))?,
        )?,
        annotations: anns_from_json(obj.get("annotations"))?,
    })
}

fn visibility_from_str(s: &str) -> Result<Visibility, ConvertError> {
    match s {
        "public" => Ok(Visibility::Public),
        "private" => Ok(Visibility::Private),
        "protected" => Ok(Visibility::Protected),
        "none" => Ok(Visibility::None),
        other => Err(ConvertError::Malformed(format!(
            "unknown visibility `{other}`"
        ))),
    }
}

fn value_from_json(data: &Json) -> Result<Value, ConvertError> {
    match data {
        Json::String(s) => Ok(Value::Scalar(s.clone())),
        Json::Array(items) => Ok(Value::List(
            items
                .iter()
                .map(value_from_json)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Json::Object(obj) => {
            let tag = obj
                .get("__type__")
                .and_then(Json::as_str)
                .ok_or_else(|| ConvertError::Malformed("value object without __type__".into()))?;
            match tag {
                "Map" => {
                    let mut entries = Vec::new();
                    for entry in expect_array(obj.get("entries"), "map entries")? {
                        let e = entry.as_object().ok_or_else(|| {
                            ConvertError::Malformed("map entry must be an object".into())
                        })?;
                        entries.push(MapEntry {
                            key: expect_str(e.get("key"), "map entry key")?,
                            value: value_from_json(e.get("value").ok_or_else(|| {
                                ConvertError::Malformed("map entry without value".into())
                            })?)?,
                            annotations: anns_from_json(e.get("annotations"))?,
                        });
                    }
                    Ok(Value::Map(entries))
                }
                "Attribute" => Ok(Value::Annotated(Box::new(attr_from_json(data)?))),
                "Block" => {
                    let b = expect_tagged(data, "Block")?;
                    Ok(Value::Block(Block {
                        kind: expect_str(b.get("kind"), "block kind")?,
                        name: expect_str(b.get("name"), "block name")?,
                        annotations: anns_from_json(b.get("annotations"))?,
                        attributes: attrs_from_json(b.get("attributes"))?,
                    }))
                }
                "Field" => Ok(Value::Field(Field {
                    visibility: visibility_from_str(&expect_str(
                        obj.get("visibility"),
                        "field visibility",
                    )?)?,
                    name: expect_str(obj.get("name"), "field name")?,
                    ty: opt_str(obj.get("type")),
                    annotations: anns_from_json(obj.get("annotations"))?,
                })),
                "Method" => Ok(Value::Method(Method {
                    visibility: visibility_from_str(&expect_str(
                        obj.get("visibility"),
                        "method visibility",
                    )?)?,
                    name: expect_str(obj.get("name"), "method name")?,
                    params: opt_str(obj.get("params")),
                    returns: opt_str(obj.get("returns")),
                    annotations: anns_from_json(obj.get("annotations"))?,
                    attributes: attrs_from_json(obj.get("attributes"))?,
                })),
                "Endpoint" => {
                    let style = match obj.get("style").and_then(Json::as_str) {
                        Some("http") => EndpointStyle::Http,
                        Some("grpc") => EndpointStyle::Grpc,
                        other => {
                            return Err(ConvertError::Malformed(format!(
                                "unknown endpoint style {other:?}"
                            )))
                        }
                    };
                    let mut attributes = Vec::new();
                    if let Some(Json::Array(items)) = obj.get("attributes") {
                        for item in items {
                            let e = item.as_object().ok_or_else(|| {
                                ConvertError::Malformed("endpoint attribute must be an object".into())
                            })?;
                            attributes.push((
                                expect_str(e.get("key"), "endpoint attribute key")?,
                                opt_str(e.get("value")),
                            ));
                        }
                    }
                    Ok(Value::Endpoint(Endpoint {
                        style,
                        method: opt_str(obj.get("method")),
                        path: opt_str(obj.get("path")),
                        request: opt_str(obj.get("request")),
                        response: opt_str(obj.get("response")),
                        raw: opt_str(obj.get("raw")),
                        attributes,
                        annotations: anns_from_json(obj.get("annotations"))?,
                        request_shape: None,
                        response_shape: None,
                        inputs: Vec::new(),
                        outputs: Vec::new(),
                    }))
                }
                other => Err(ConvertError::Malformed(format!(
                    "unexpected __type__ `{other}` in value position"
                ))),
            }
        }
        other => Err(ConvertError::Malformed(format!(
            "unexpected JSON value {other} in value position"
        ))),
    }
}

// === Simple JSON ===

/// Lowers a system into the flattened, prompt-oriented JSON form. With
/// `max_simple`, methods and endpoints collapse to `def` strings whenever
/// nothing beyond the signature exists.
pub fn system_to_simple_json(system: &System, max_simple: bool) -> Json {
    let mut out = JsonMap::new();
    insert_simple_attrs(&mut out, &system.attributes, max_simple);
    out.insert(
        "services".to_string(),
        Json::Array(
            system
                .services
                .iter()
                .map(|s| service_to_simple(s, max_simple))
                .collect(),
        ),
    );
    Json::Object(out)
}

fn service_to_simple(service: &Service, max_simple: bool) -> Json {
    let mut out = JsonMap::new();
    out.insert("name".to_string(), Json::String(service.name.clone()));
    if !service.annotations.is_empty() {
        out.insert(
            "annotations".to_string(),
            anns_to_simple(&service.annotations),
        );
    }
    insert_simple_attrs(&mut out, &service.attributes, max_simple);
    Json::Object(out)
}

fn block_to_simple(block: &Block, max_simple: bool) -> Json {
    let mut out = JsonMap::new();
    out.insert("kind".to_string(), Json::String(block.kind.clone()));
    out.insert("name".to_string(), Json::String(block.name.clone()));
    if !block.annotations.is_empty() {
        out.insert("annotations".to_string(), anns_to_simple(&block.annotations));
    }
    insert_simple_attrs(&mut out, &block.attributes, max_simple);
    Json::Object(out)
}

fn annotation_to_simple(a: &Annotation) -> String {
    if a.args.is_empty() {
        a.name.clone()
    } else {
        format!("{}({})", a.name, a.args.join(", "))
    }
}

fn anns_to_simple(anns: &[Annotation]) -> Json {
    Json::Array(
        anns.iter()
            .map(|a| Json::String(annotation_to_simple(a)))
            .collect(),
    )
}

/// Attributes flatten to `key: value`; annotated attributes keep their
/// annotations under a `{value, annotations}` wrapper.
fn insert_simple_attrs(out: &mut JsonMap<String, Json>, attrs: &[Attribute], max_simple: bool) {
    for attr in attrs {
        let value = value_to_simple(&attr.value, max_simple);
        if attr.annotations.is_empty() {
            out.insert(attr.key.clone(), value);
        } else {
            out.insert(
                attr.key.clone(),
                json!({
                    "value": value,
                    "annotations": anns_to_simple(&attr.annotations),
                }),
            );
        }
    }
}

fn value_to_simple(value: &Value, max_simple: bool) -> Json {
    match value {
        Value::Scalar(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(|v| value_to_simple(v, max_simple))
                .collect(),
        ),
        Value::Map(entries) => {
            let mut out = JsonMap::new();
            for entry in entries {
                let value = value_to_simple(&entry.value, max_simple);
                if entry.annotations.is_empty() {
                    out.insert(entry.key.clone(), value);
                } else {
                    out.insert(
                        entry.key.clone(),
                        json!({
                            "value": value,
                            "annotations": anns_to_simple(&entry.annotations),
                        }),
                    );
                }
            }
            Json::Object(out)
        }
        Value::Block(b) => block_to_simple(b, max_simple),
        Value::Field(f) => field_to_simple(f),
        Value::Method(m) => method_to_simple(m, max_simple),
        Value::Endpoint(e) => endpoint_to_simple(e, max_simple),
        Value::Annotated(attr) => json!({
            "value": value_to_simple(&attr.value, max_simple),
            "annotations": anns_to_simple(&attr.annotations),
        }),
    }
}

fn field_to_simple(field: &Field) -> Json {
    let mut out = JsonMap::new();
    out.insert(
        "visibility".to_string(),
        Json::String(field.visibility.as_str().to_string()),
    );
    out.insert("name".to_string(), Json::String(field.name.clone()));
    out.insert("type".to_string(), Json::String(field.ty.clone()));
    if !field.annotations.is_empty() {
        out.insert("annotations".to_string(), anns_to_simple(&field.annotations));
    }
    Json::Object(out)
}

fn method_signature(method: &Method) -> String {
    format!(
        "{}{}({}) -> {}",
        method.visibility.marker(),
        method.name,
        method.params,
        method.returns
    )
    .trim()
    .to_string()
}

fn method_to_simple(method: &Method, max_simple: bool) -> Json {
    if !max_simple {
        let mut out = JsonMap::new();
        out.insert(
            "visibility".to_string(),
            Json::String(method.visibility.as_str().to_string()),
        );
        out.insert("name".to_string(), Json::String(method.name.clone()));
        out.insert("params".to_string(), Json::String(method.params.clone()));
        out.insert("returns".to_string(), Json::String(method.returns.clone()));
        if !method.attributes.is_empty() {
            let mut attrs = JsonMap::new();
            insert_simple_attrs(&mut attrs, &method.attributes, max_simple);
            out.insert("attributes".to_string(), Json::Object(attrs));
        }
        if !method.annotations.is_empty() {
            out.insert(
                "annotations".to_string(),
                anns_to_simple(&method.annotations),
            );
        }
        return Json::Object(out);
    }

    let sig = method_signature(method);
    if method.attributes.is_empty() && method.annotations.is_empty() {
        return Json::String(sig);
    }
    let mut out = JsonMap::new();
    out.insert("def".to_string(), Json::String(sig));
    insert_simple_attrs(&mut out, &method.attributes, max_simple);
    if !method.annotations.is_empty() {
        out.insert(
            "annotations".to_string(),
            anns_to_simple(&method.annotations),
        );
    }
    Json::Object(out)
}

/// The compact one-line definition of an endpoint. The reconstructed raw
/// line is preferred; the assembled fallback is less faithful.
fn endpoint_signature(ep: &Endpoint) -> String {
    if !ep.raw.is_empty() {
        return ep.raw.trim().trim_end_matches(',').to_string();
    }

    let mut parts: Vec<String> = Vec::new();
    match ep.style {
        EndpointStyle::Http => {
            parts.push(ep.method.clone());
            if !ep.path.is_empty() {
                parts.push(ep.path.clone());
            }
            if !ep.request.is_empty() {
                parts.push(ep.request.clone());
            }
        }
        EndpointStyle::Grpc => {
            parts.push(format!("{}({})", ep.method, ep.request));
        }
    }
    if !ep.response.is_empty() {
        parts.push("->".to_string());
        parts.push(ep.response.clone());
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

/// Keys already spelled inside a `[...]` section of the definition string;
/// those are not duplicated as sibling fields in max-simple form.
fn bracket_attr_keys(definition: &str) -> Vec<String> {
    let mut keys = Vec::new();
    for caps in BRACKET_ATTRS_RE.captures_iter(definition) {
        for part in caps[1].split(',') {
            let key = part.split(':').next().unwrap_or("").trim();
            if !key.is_empty() {
                keys.push(key.to_string());
            }
        }
    }
    keys
}

fn endpoint_to_simple(ep: &Endpoint, max_simple: bool) -> Json {
    if max_simple {
        let definition = endpoint_signature(ep);
        let mut out = JsonMap::new();
        out.insert("def".to_string(), Json::String(definition.clone()));

        let covered = bracket_attr_keys(&definition);
        for (key, value) in &ep.attributes {
            if !covered.contains(key) {
                out.insert(key.clone(), Json::String(value.clone()));
            }
        }
        if !ep.annotations.is_empty() {
            out.insert("annotations".to_string(), anns_to_simple(&ep.annotations));
        }

        if out.len() == 1 {
            return Json::String(definition);
        }
        return Json::Object(out);
    }

    let mut out = JsonMap::new();
    out.insert(
        "style".to_string(),
        Json::String(ep.style.as_str().to_string()),
    );
    out.insert("method".to_string(), Json::String(ep.method.clone()));
    if !ep.path.is_empty() {
        out.insert("path".to_string(), Json::String(ep.path.clone()));
    }
    out.insert("request".to_string(), Json::String(ep.request.clone()));
    out.insert("response".to_string(), Json::String(ep.response.clone()));
    if !ep.inputs.is_empty() {
        out.insert(
            "inputs".to_string(),
            serde_json::to_value(&ep.inputs).expect("inputs serialize"),
        );
    }
    if !ep.outputs.is_empty() {
        out.insert(
            "outputs".to_string(),
            serde_json::to_value(&ep.outputs).expect("outputs serialize"),
        );
    }
    if !ep.attributes.is_empty() {
        let mut attrs = JsonMap::new();
        for (key, value) in &ep.attributes {
            attrs.insert(key.clone(), Json::String(value.clone()));
        }
        out.insert("attributes".to_string(), Json::Object(attrs));
    }
    if !ep.annotations.is_empty() {
        out.insert("annotations".to_string(), anns_to_simple(&ep.annotations));
    }
    Json::Object(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::analyze;

    fn analyze_ok(source: &str) -> crate::api::Analysis {
        analyze(source, "test.simal").expect("source should parse")
    }

    #[test]
    fn test_simple_scenario_inline_system() {
        let analysis = analyze_ok("system { type: microservices  service s { langs: [go] } }");
        let simple = system_to_simple_json(&analysis.system, false);

        assert_eq!(simple["type"], "microservices");
        assert_eq!(simple["services"][0]["name"], "s");
        assert_eq!(simple["services"][0]["langs"], json!(["go"]));
    }

    #[test]
    fn test_simple_scenario_map_values_stay_strings() {
        let analysis = analyze_ok("system { mail: { driver: smtp, port: 587 } }");
        let simple = system_to_simple_json(&analysis.system, false);

        assert_eq!(simple["mail"], json!({"driver": "smtp", "port": "587"}));
    }

    #[test]
    fn test_simple_scenario_components() {
        let analysis = analyze_ok(
            "system { service u { components: [ database UserRepo { engine: postgres-12 } cache S { engine: redis-6 } ] } }",
        );
        let simple = system_to_simple_json(&analysis.system, false);

        let comps = &simple["services"][0]["components"];
        assert_eq!(
            comps[0],
            json!({"kind": "database", "name": "UserRepo", "engine": "postgres-12"})
        );
        assert_eq!(
            comps[1],
            json!({"kind": "cache", "name": "S", "engine": "redis-6"})
        );
    }

    #[test]
    fn test_simple_scenario_method() {
        let analysis = analyze_ok(
            "system { s: { methods: [ +GetUser(uuid string) -> User { description: x } ] } }",
        );
        let simple = system_to_simple_json(&analysis.system, false);

        assert_eq!(
            simple["s"]["methods"][0],
            json!({
                "visibility": "public",
                "name": "GetUser",
                "params": "uuid string",
                "returns": "User",
                "attributes": {"description": "x"},
            })
        );
    }

    #[test]
    fn test_simple_scenario_endpoint() {
        let analysis = analyze_ok(
            "system { s: { endpoints: [\n GET /api/comments/{id} -> JSON{comments: list?, error: str?} [auth:false]\n] } }",
        );
        let simple = system_to_simple_json(&analysis.system, false);

        let ep = &simple["s"]["endpoints"][0];
        assert_eq!(ep["style"], "http");
        assert_eq!(ep["method"], "GET");
        assert_eq!(ep["path"], "/api/comments/{id}");
        assert_eq!(ep["inputs"], json!([{"name": "id", "type": "str"}]));
        assert_eq!(
            ep["outputs"],
            json!([
                {"name": "comments", "type": "list", "optional": true},
                {"name": "error", "type": "str", "optional": true},
            ])
        );
        assert_eq!(ep["attributes"], json!({"auth": "false"}));
    }

    #[test]
    fn test_simple_scenario_fields() {
        let analysis = analyze_ok(
            "system { s: { fields: [ +ID: UUID  -PasswordHash: string  #Internal: JSON  Flex: any string type ] } }",
        );
        let simple = system_to_simple_json(&analysis.system, false);

        assert_eq!(
            simple["s"]["fields"],
            json!([
                {"visibility": "public", "name": "ID", "type": "UUID"},
                {"visibility": "private", "name": "PasswordHash", "type": "string"},
                {"visibility": "protected", "name": "Internal", "type": "JSON"},
                {"visibility": "none", "name": "Flex", "type": "any string type"},
            ])
        );
    }

    #[test]
    fn test_simple_annotated_attribute_keeps_annotations() {
        let analysis = analyze_ok("system { @SINCE(2.0) flag: on }");
        let simple = system_to_simple_json(&analysis.system, false);

        assert_eq!(
            simple["flag"],
            json!({"value": "on", "annotations": ["SINCE(2.0)"]})
        );
    }

    #[test]
    fn test_full_json_order_preservation() {
        let analysis = analyze_ok("system { zeta: 1\n alpha: 2\n mid: 3 }");
        let full = system_to_json(&analysis.system);

        let keys: Vec<&str> = full["attributes"]
            .as_array()
            .unwrap()
            .iter()
            .map(|a| a["key"].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_full_json_annotation_locality() {
        let analysis = analyze_ok("system { plain: 1\n @TAGGED marked: 2\n after: 3 }");
        let full = system_to_json(&analysis.system);

        let attrs = full["attributes"].as_array().unwrap();
        assert_eq!(attrs[0]["annotations"], json!([]));
        assert_eq!(attrs[1]["annotations"][0]["name"], "TAGGED");
        assert_eq!(attrs[2]["annotations"], json!([]));
    }

    #[test]
    fn test_full_json_round_trip() {
        let source = r#"system {
  type: microservices
  mail: { driver: smtp, port: 587 }
  notes: {
    raw only line
  }

  @PATH(services/users)
  service users {
    langs: [go, rust]
    api: [
      {
        protocol: http
        endpoints: [
          GET /api/users/{id} -> JSON{user: str?, error: str?} [auth: true]
          POST /api/users JSON{name: str} -> JSON{id: str}
        ]
      }
      @DELETED { legacy: yes }
    ]
    components: [
      database UserRepo { engine: postgres-12 }
    ]
    fields: [ +ID: UUID, -Secret: string ]
    methods: [ +GetUser(uuid string) -> User { description: lookup } ]
  }
}"#;
        let analysis = analyze_ok(source);
        let full = system_to_json(&analysis.system);
        let rebuilt = system_from_json(&full).expect("round trip should succeed");

        assert_eq!(rebuilt, analysis.system);
    }

    #[test]
    fn test_round_trip_distinguishes_empty_map_and_list() {
        let analysis = analyze_ok("system { empty_map: { }\n empty_list: [ ] }");
        let full = system_to_json(&analysis.system);
        let rebuilt = system_from_json(&full).expect("round trip should succeed");

        assert_eq!(rebuilt, analysis.system);
        assert!(matches!(rebuilt.attributes[0].value, Value::Map(ref e) if e.is_empty()));
        assert!(matches!(rebuilt.attributes[1].value, Value::List(ref i) if i.is_empty()));
    }

    #[test]
    fn test_system_from_json_rejects_wrong_tag() {
        let err = system_from_json(&json!({"__type__": "Service"}));
        assert!(err.is_err());
    }

    #[test]
    fn test_max_simple_method_collapses_to_def_string() {
        let analysis = analyze_ok("system { s: { methods: [ +GetUser(uuid string) -> User ] } }");
        let simple = system_to_simple_json(&analysis.system, true);

        assert_eq!(simple["s"]["methods"][0], json!("+GetUser(uuid string) -> User"));
    }

    #[test]
    fn test_max_simple_method_keeps_extra_attributes() {
        let analysis = analyze_ok(
            "system { s: { methods: [ +GetUser(uuid string) -> User { description: lookup } ] } }",
        );
        let simple = system_to_simple_json(&analysis.system, true);

        assert_eq!(
            simple["s"]["methods"][0],
            json!({"def": "+GetUser(uuid string) -> User", "description": "lookup"})
        );
    }

    #[test]
    fn test_max_simple_endpoint_def_keeps_bracket_attrs_inline() {
        let analysis = analyze_ok(
            "system { s: { endpoints: [\n GET /api/comments/{id} -> JSON{error: str?} [auth:false]\n] } }",
        );
        let simple = system_to_simple_json(&analysis.system, true);

        // `auth` already lives inside the [...] of the def string
        assert_eq!(
            simple["s"]["endpoints"][0],
            json!("GET /api/comments/{id} -> JSON{error: str?} [auth:false]")
        );
    }

    #[test]
    fn test_raw_only_map_lowers_to_string_everywhere() {
        let analysis = analyze_ok("system { notes: {\n line one\n line two\n} }");
        let simple = system_to_simple_json(&analysis.system, false);
        let full = system_to_json(&analysis.system);

        assert_eq!(simple["notes"], json!("line one\nline two"));
        assert_eq!(full["attributes"][0]["value"], json!("line one\nline two"));
    }
}
