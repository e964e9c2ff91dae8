use serde::Serialize;

/// Root of a parsed SiMAL file. Exactly one per file; holds the top-level
/// attributes and the declared services in source order.
#[derive(Debug, PartialEq, Clone)]
pub struct System {
    pub attributes: Vec<Attribute>,
    pub services: Vec<Service>,
}

/// A `service name { ... }` declaration inside the system body.
#[derive(Debug, PartialEq, Clone)]
pub struct Service {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub annotations: Vec<Annotation>,
}

/// A generic `kind Name { ... }` component. Only produced inside
/// `components: [ ... ]` lists; the kind can never be `service`.
#[derive(Debug, PartialEq, Clone)]
pub struct Block {
    pub kind: String,
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub annotations: Vec<Annotation>,
}

/// A `key: value` pair. Declaration order within a container is preserved
/// by the surrounding `Vec`; keys are unique within one container.
#[derive(Debug, PartialEq, Clone)]
pub struct Attribute {
    pub key: String,
    pub value: Value,
    pub annotations: Vec<Annotation>,
}

/// An `@Name` or `@Name(arg, ...)` marker attached to the node that
/// follows it.
#[derive(Debug, PartialEq, Clone)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<String>,
}

/// UML-style visibility marker on fields and methods.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Visibility {
    Public,
    Private,
    Protected,
    None,
}

impl Visibility {
    /// Maps the source marker (`+`, `-`, `#`) to a visibility.
    pub fn from_marker(marker: &str) -> Option<Visibility> {
        match marker {
            "+" => Some(Visibility::Public),
            "-" => Some(Visibility::Private),
            "#" => Some(Visibility::Protected),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
            Visibility::None => "none",
        }
    }

    /// The source marker this visibility was written as; empty for `None`.
    pub fn marker(self) -> &'static str {
        match self {
            Visibility::Public => "+",
            Visibility::Private => "-",
            Visibility::Protected => "#",
            Visibility::None => "",
        }
    }
}

/// One item of a `fields: [ ... ]` list.
#[derive(Debug, PartialEq, Clone)]
pub struct Field {
    pub visibility: Visibility,
    pub name: String,
    pub ty: String,
    pub annotations: Vec<Annotation>,
}

/// One item of a `methods: [ ... ]` list. `params` and `returns` keep the
/// raw signature text; an optional `{ ... }` body becomes `attributes`.
#[derive(Debug, PartialEq, Clone)]
pub struct Method {
    pub visibility: Visibility,
    pub name: String,
    pub params: String,
    pub returns: String,
    pub attributes: Vec<Attribute>,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EndpointStyle {
    Http,
    Grpc,
}

impl EndpointStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointStyle::Http => "http",
            EndpointStyle::Grpc => "grpc",
        }
    }
}

/// One item of an `endpoints: [ ... ]` list.
///
/// `method` is the HTTP verb for `http` endpoints and the rpc name for
/// `grpc` ones; `path` is empty for rpc. `request`/`response` keep the raw
/// signature text; the `*_shape` fields and `inputs`/`outputs` are filled
/// by enrichment when the signatures parse structurally.
#[derive(Debug, PartialEq, Clone)]
pub struct Endpoint {
    pub style: EndpointStyle,
    pub method: String,
    pub path: String,
    pub request: String,
    pub response: String,
    /// The full original line, reconstructed from token adjacency.
    pub raw: String,
    /// Trailing `[k: v, ...]` metadata.
    pub attributes: Vec<(String, String)>,
    pub annotations: Vec<Annotation>,
    pub request_shape: Option<Shape>,
    pub response_shape: Option<Shape>,
    pub inputs: Vec<EndpointInput>,
    pub outputs: Vec<EndpointOutput>,
}

/// Any value an attribute, map entry, or list item can hold.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Scalar(String),
    Map(Vec<MapEntry>),
    List(Vec<Value>),
    Block(Block),
    Field(Field),
    Method(Method),
    Endpoint(Endpoint),
    /// An annotated map inside a list, wrapped so the annotations survive.
    /// The wrapping attribute has an empty key.
    Annotated(Box<Attribute>),
}

/// One entry of an ordered map value.
#[derive(Debug, PartialEq, Clone)]
pub struct MapEntry {
    pub key: String,
    pub value: Value,
    pub annotations: Vec<Annotation>,
}

/// A structurally parsed endpoint signature.
#[derive(Debug, PartialEq, Clone)]
pub enum Shape {
    /// `str`, `User{...}`, `JSON{...}`, `{...}` (anonymous has empty base).
    Type(TypeExpr),
    /// `(name: T, ...)`
    Tuple(Vec<ShapeField>),
}

#[derive(Debug, PartialEq, Clone)]
pub struct TypeExpr {
    pub base: String,
    pub fields: Option<Vec<ShapeField>>,
    pub optional: bool,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ShapeField {
    pub name: String,
    pub ty: TypeExpr,
}

/// Derived endpoint input, flattened for the simple JSON form.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct EndpointInput {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// Derived endpoint output.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct EndpointOutput {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub optional: bool,
}
