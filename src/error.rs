use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum SimalError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parser(#[from] ParserError),
}

/// Raised while converting tagged JSON back into an AST.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("malformed tagged JSON: {0}")]
    Malformed(String),
}

/// Position info produced by the lexer before a `NamedSource` exists.
/// `Parser::new` attaches the source and turns this into a `ParserError`.
#[derive(Debug, Clone)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub offset: usize,
    pub len: usize,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone)]
pub enum LexErrorKind {
    UnterminatedString,
    UnterminatedHeredoc { label: String },
}

#[derive(Error, Debug, Diagnostic)]
pub enum ParserError {
    #[error("Unterminated string literal at line {line}, column {col}")]
    #[diagnostic(
        code(simal::lexer::unterminated_string),
        help("The quote that opens a string must be matched before end of file.")
    )]
    UnterminatedString {
        #[source_code]
        src: NamedSource<String>,
        #[label("string starts here and never closes")]
        span: SourceSpan,
        line: usize,
        col: usize,
    },

    #[error("Unterminated heredoc <<{label} at line {line}, column {col}")]
    #[diagnostic(
        code(simal::lexer::unterminated_heredoc),
        help("A heredoc ends at a line whose content equals its label.")
    )]
    UnterminatedHeredoc {
        #[source_code]
        src: NamedSource<String>,
        #[label("no closing `{label}` line before end of file")]
        span: SourceSpan,
        label: String,
        line: usize,
        col: usize,
    },

    #[error("Expected `system {{ ... }}` at start of file")]
    #[diagnostic(
        code(simal::parser::missing_system_root),
        help("Every SiMAL file is a single `system {{ ... }}` block.")
    )]
    MissingSystemRoot {
        #[source_code]
        src: NamedSource<String>,
        #[label("expected the `system` keyword here")]
        span: SourceSpan,
    },

    #[error("Unexpected token at line {line}, column {col}")]
    #[diagnostic(
        code(simal::parser::unexpected_token),
        help("The parser found a token it did not expect in this position.")
    )]
    UnexpectedToken {
        #[source_code]
        src: NamedSource<String>,
        #[label("Expected {expected}, but found this")]
        span: SourceSpan,
        expected: String,
        line: usize,
        col: usize,
    },

    #[error("Unexpected end of file")]
    #[diagnostic(
        code(simal::parser::unexpected_eof),
        help("The file ended while a block, list, or annotation was still open.")
    )]
    UnexpectedEof {
        #[source_code]
        src: NamedSource<String>,
        #[label("File ended unexpectedly here")]
        span: SourceSpan,
    },

    #[error("Duplicate attribute key `{key}` at line {line}, column {col}")]
    #[diagnostic(
        code(simal::parser::duplicate_key),
        help("Attribute keys must be unique within one container.")
    )]
    DuplicateKey {
        #[source_code]
        src: NamedSource<String>,
        #[label("`{key}` was already declared in this container")]
        span: SourceSpan,
        key: String,
        line: usize,
        col: usize,
    },

    #[error("Annotations with no node to attach to, at line {line}, column {col}")]
    #[diagnostic(
        code(simal::parser::trailing_annotations),
        help("An annotation binds to the next attribute, service, or list item.")
    )]
    TrailingAnnotations {
        #[source_code]
        src: NamedSource<String>,
        #[label("these annotations precede the end of the container")]
        span: SourceSpan,
        line: usize,
        col: usize,
    },

    #[error("Unclosed argument list for annotation @{name}")]
    #[diagnostic(
        code(simal::parser::unclosed_annotation),
        help("Annotation arguments must close on the same line: @name(a, b).")
    )]
    UnclosedAnnotation {
        #[source_code]
        src: NamedSource<String>,
        #[label("`(` opened here is never closed")]
        span: SourceSpan,
        name: String,
    },

    #[error("Field `{name}` is missing `:` before its type, at line {line}, column {col}")]
    #[diagnostic(
        code(simal::parser::field_missing_colon),
        help("Fields are written `name: type`, optionally prefixed by +, - or #.")
    )]
    FieldMissingColon {
        #[source_code]
        src: NamedSource<String>,
        #[label("expected `:` after the field name")]
        span: SourceSpan,
        name: String,
        line: usize,
        col: usize,
    },

    #[error("Endpoint line has no `->` at line {line}, column {col}")]
    #[diagnostic(
        code(simal::parser::endpoint_missing_arrow),
        help("Endpoints separate request from response with `->`.")
    )]
    EndpointMissingArrow {
        #[source_code]
        src: NamedSource<String>,
        #[label("this endpoint never reaches a `->`")]
        span: SourceSpan,
        line: usize,
        col: usize,
    },
}
