//! Recursive descent parser for SiMAL.
//!
//! The parser consumes the token stream produced by [`Lexer`], keeps the
//! `Newline` tokens (they are significant separators), and builds the typed
//! AST rooted at [`System`]. List parsing is context sensitive: the
//! surrounding attribute key selects the grammar for `components`,
//! `fields`, `methods` and `endpoints` items; every other list falls back
//! to maps and scalars.

use crate::ast::{
    Annotation, Attribute, Block, Endpoint, EndpointStyle, Field, MapEntry, Method, Service,
    System, Value, Visibility,
};
use crate::error::{LexError, LexErrorKind, ParserError, SimalError};
use crate::lexer::{Lexer, Token, TokenType};
use miette::NamedSource;
use std::sync::Arc;

const HTTP_VERBS: [&str; 7] = ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Where a scalar is being collected; the system body additionally stops
/// before a `service name {` sequence so one-line systems parse.
#[derive(Clone, Copy, PartialEq)]
enum ScalarCtx {
    SystemBody,
    Body,
    MapEntry,
}

/// A recursive descent parser over a fully lexed SiMAL source.
#[derive(Debug)]
pub struct Parser<'a> {
    source: Arc<NamedSource<String>>,
    tokens: Vec<Token>,
    position: usize,
    source_text: &'a str,
}

impl<'a> Parser<'a> {
    /// Tokenizes `source_text` and prepares a parser over it.
    ///
    /// # Errors
    ///
    /// Tokenizer failures (unterminated string or heredoc) surface here.
    pub fn new(source_text: &'a str) -> Result<Self, SimalError> {
        Self::new_with_name(source_text, "source.simal")
    }

    pub fn new_with_name(source_text: &'a str, file_name: &str) -> Result<Self, SimalError> {
        let source = Arc::new(NamedSource::new(file_name, source_text.to_string()));
        let tokens = Lexer::new(source_text)
            .lex()
            .map_err(|e| lex_to_parse_error(&source, e))?;

        Ok(Self {
            source,
            tokens,
            position: 0,
            source_text,
        })
    }

    // === Main parsing methods ===

    /// System ::= "system" "{" { Annotation | Service | Attribute } "}"
    pub fn parse_system(&mut self) -> Result<System, SimalError> {
        self.skip_newlines();

        let opens_system = matches!(&self.peek(0).ttype, TokenType::Ident(s) if s == "system")
            && self.peek(1).ttype == TokenType::LBrace;
        if !opens_system {
            let tok = self.peek(0).clone();
            return Err(ParserError::MissingSystemRoot {
                src: self.src(),
                span: self.token_span(&tok),
            }
            .into());
        }
        self.advance(); // `system`
        self.advance(); // `{`

        let mut attributes: Vec<Attribute> = Vec::new();
        let mut services: Vec<Service> = Vec::new();

        loop {
            self.skip_separators();
            match self.peek(0).ttype {
                TokenType::RBrace => break,
                TokenType::Eof => return self.err_unexpected("`}` closing the system body"),
                _ => {}
            }

            let ann_start = self.peek(0).clone();
            let annotations = self.parse_annotations()?;
            self.skip_newlines();

            if matches!(self.peek(0).ttype, TokenType::RBrace | TokenType::Eof) {
                if !annotations.is_empty() {
                    return Err(self.trailing_annotations(&ann_start));
                }
                continue;
            }

            if self.at_service_decl() {
                services.push(self.parse_service(annotations)?);
            } else {
                self.parse_attribute_into(&mut attributes, annotations, ScalarCtx::SystemBody)?;
            }
        }

        self.advance(); // `}`
        self.skip_newlines();
        if self.peek(0).ttype != TokenType::Eof {
            return self.err_unexpected("end of file after the closing `}`");
        }

        Ok(System {
            attributes,
            services,
        })
    }

    /// Service ::= "service" Ident "{" { Annotation | Attribute } "}"
    fn parse_service(&mut self, annotations: Vec<Annotation>) -> Result<Service, SimalError> {
        self.advance(); // `service`
        let name = self.eat_ident("a service name")?;
        self.expect(TokenType::LBrace, "`{` opening the service body")?;
        let attributes = self.parse_attribute_body()?;

        Ok(Service {
            name,
            attributes,
            annotations,
        })
    }

    /// Parses `{`-delimited attribute bodies (services, component blocks,
    /// method bodies). The opening brace is already consumed; the closing
    /// brace is consumed here.
    fn parse_attribute_body(&mut self) -> Result<Vec<Attribute>, SimalError> {
        let mut attrs: Vec<Attribute> = Vec::new();
        loop {
            self.skip_separators();
            match self.peek(0).ttype {
                TokenType::RBrace => break,
                TokenType::Eof => return self.err_unexpected("`}` closing this block"),
                _ => {}
            }

            let ann_start = self.peek(0).clone();
            let annotations = self.parse_annotations()?;
            self.skip_newlines();

            if matches!(self.peek(0).ttype, TokenType::RBrace | TokenType::Eof) {
                if !annotations.is_empty() {
                    return Err(self.trailing_annotations(&ann_start));
                }
                continue;
            }

            self.parse_attribute_into(&mut attrs, annotations, ScalarCtx::Body)?;
        }
        self.advance(); // `}`
        Ok(attrs)
    }

    /// Attribute ::= Key ":" Value
    fn parse_attribute_into(
        &mut self,
        attrs: &mut Vec<Attribute>,
        annotations: Vec<Annotation>,
        ctx: ScalarCtx,
    ) -> Result<(), SimalError> {
        let key_tok = self.peek(0).clone();
        let key = self.eat_ident("an attribute key")?;
        if attrs.iter().any(|a| a.key == key) {
            return Err(self.duplicate_key(&key_tok, &key));
        }
        self.expect(TokenType::Colon, "`:` after the attribute key")?;
        self.skip_newlines();

        let value = self.parse_value(&key, ctx)?;
        self.skip_newlines();
        attrs.push(Attribute {
            key,
            value,
            annotations,
        });
        Ok(())
    }

    /// Dispatches on the token after `key:`.
    fn parse_value(&mut self, key: &str, ctx: ScalarCtx) -> Result<Value, SimalError> {
        match &self.peek(0).ttype {
            TokenType::LBrace => self.parse_map(),
            TokenType::LBracket => self.parse_list(key),
            TokenType::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(Value::Scalar(s))
            }
            _ => Ok(Value::Scalar(self.collect_scalar(ctx))),
        }
    }

    // === Annotations ===

    /// Annotations ::= { "@" Ident [ "(" Args ")" ] }
    fn parse_annotations(&mut self) -> Result<Vec<Annotation>, SimalError> {
        let mut anns = Vec::new();
        self.skip_newlines();

        while self.peek(0).ttype == TokenType::At
            && matches!(self.peek(1).ttype, TokenType::Ident(_))
        {
            let at_tok = self.peek(0).clone();
            self.advance(); // `@`
            let name = self.eat_ident("an annotation name")?;

            let mut args = Vec::new();
            if self.peek(0).ttype == TokenType::LParen {
                self.advance();
                args = self.parse_annotation_args(&name, &at_tok)?;
            }

            self.skip_newlines();
            anns.push(Annotation { name, args });
        }

        Ok(anns)
    }

    /// Splits annotation arguments on top-level commas. Nesting respects
    /// `(){}[]`; quoted arguments keep their quotes.
    fn parse_annotation_args(
        &mut self,
        name: &str,
        at_tok: &Token,
    ) -> Result<Vec<String>, SimalError> {
        let mut groups: Vec<Vec<String>> = vec![Vec::new()];
        let mut parens = 1usize;
        let mut brackets = 0usize;
        let mut braces = 0usize;

        loop {
            let tok = self.peek(0).clone();
            match &tok.ttype {
                TokenType::Eof | TokenType::Newline => {
                    return Err(ParserError::UnclosedAnnotation {
                        src: self.src(),
                        span: self.token_span(at_tok),
                        name: name.to_string(),
                    }
                    .into());
                }
                TokenType::RParen if parens == 1 => {
                    self.advance();
                    break;
                }
                TokenType::Comma if parens == 1 && brackets == 0 && braces == 0 => {
                    groups.push(Vec::new());
                    self.advance();
                    continue;
                }
                _ => {}
            }

            match &tok.ttype {
                TokenType::LParen => parens += 1,
                TokenType::RParen => parens -= 1,
                TokenType::LBracket => brackets += 1,
                TokenType::RBracket if brackets > 0 => brackets -= 1,
                TokenType::LBrace => braces += 1,
                TokenType::RBrace if braces > 0 => braces -= 1,
                _ => {}
            }

            let text = match &tok.ttype {
                TokenType::String(s) => format!("\"{s}\""),
                other => other.text().to_string(),
            };
            groups.last_mut().expect("group list is never empty").push(text);
            self.advance();
        }

        Ok(groups
            .into_iter()
            .map(|g| g.join(" ").trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }

    // === Maps and lists ===

    /// Map ::= "{" { Entry | RawLine } "}"
    ///
    /// Entries are `key: value` with an ident or quoted-string key; any
    /// other line is captured as raw text under the synthetic `__raw__`
    /// key. A map whose entries are raw-only collapses to the raw lines
    /// joined by newlines.
    fn parse_map(&mut self) -> Result<Value, SimalError> {
        self.expect(TokenType::LBrace, "`{`")?;
        let mut entries: Vec<MapEntry> = Vec::new();
        let mut raw_idx: Option<usize> = None;

        loop {
            self.skip_separators();
            match self.peek(0).ttype {
                TokenType::RBrace => break,
                TokenType::Eof => return self.err_unexpected("`}` closing this map"),
                _ => {}
            }

            let ann_start = self.peek(0).clone();
            let annotations = self.parse_annotations()?;
            self.skip_newlines();

            if matches!(self.peek(0).ttype, TokenType::RBrace | TokenType::Eof) {
                if !annotations.is_empty() {
                    return Err(self.trailing_annotations(&ann_start));
                }
                continue;
            }

            let keyish = matches!(
                self.peek(0).ttype,
                TokenType::Ident(_) | TokenType::String(_)
            );
            if keyish && self.peek(1).ttype == TokenType::Colon {
                let key_tok = self.peek(0).clone();
                let key = key_tok.ttype.text().to_string();
                self.advance(); // key
                if entries.iter().any(|e| e.key == key) {
                    return Err(self.duplicate_key(&key_tok, &key));
                }
                self.advance(); // `:`
                self.skip_newlines();
                let value = self.parse_value(&key, ScalarCtx::MapEntry)?;
                entries.push(MapEntry {
                    key,
                    value,
                    annotations,
                });
            } else {
                // Raw line; annotations cannot attach to it and are dropped.
                let line = self.collect_raw_line();
                if !line.is_empty() {
                    match raw_idx {
                        Some(i) => {
                            if let Value::List(items) = &mut entries[i].value {
                                items.push(Value::Scalar(line));
                            }
                        }
                        None => {
                            entries.push(MapEntry {
                                key: "__raw__".to_string(),
                                value: Value::List(vec![Value::Scalar(line)]),
                                annotations: Vec::new(),
                            });
                            raw_idx = Some(entries.len() - 1);
                        }
                    }
                }
            }
        }
        self.advance(); // `}`

        if entries.len() == 1 && raw_idx == Some(0) {
            if let Value::List(items) = &entries[0].value {
                let lines: Vec<&str> = items
                    .iter()
                    .filter_map(|v| match v {
                        Value::Scalar(s) => Some(s.as_str()),
                        _ => None,
                    })
                    .collect();
                return Ok(Value::Scalar(lines.join("\n")));
            }
        }

        Ok(Value::Map(entries))
    }

    /// List ::= "[" { Item } "]", with items split on top-level commas or
    /// newlines. The surrounding attribute key selects the item grammar.
    fn parse_list(&mut self, context: &str) -> Result<Value, SimalError> {
        self.expect(TokenType::LBracket, "`[`")?;
        let mut items: Vec<Value> = Vec::new();

        loop {
            self.skip_separators();
            match self.peek(0).ttype {
                TokenType::RBracket => break,
                TokenType::Eof => return self.err_unexpected("`]` closing this list"),
                _ => {}
            }

            let ann_start = self.peek(0).clone();
            let annotations = self.parse_annotations()?;
            self.skip_newlines();

            if matches!(self.peek(0).ttype, TokenType::RBracket | TokenType::Eof) {
                if !annotations.is_empty() {
                    return Err(self.trailing_annotations(&ann_start));
                }
                continue;
            }

            if context == "methods" {
                items.push(Value::Method(self.parse_method(annotations)?));
            } else if context == "fields" {
                items.push(Value::Field(self.parse_field(annotations)?));
            } else if context == "endpoints" {
                let line = self.collect_endpoint_tokens();
                if !line.is_empty() {
                    items.push(Value::Endpoint(self.parse_endpoint_tokens(&line, annotations)?));
                }
            } else if context == "components" && self.at_component_decl() {
                if matches!(&self.peek(0).ttype, TokenType::Ident(s) if s == "service") {
                    return self.err_unexpected("a component kind other than `service`");
                }
                let kind = self.eat_ident("a component kind")?;
                items.push(Value::Block(self.parse_component_block(kind, annotations)?));
            } else if self.peek(0).ttype == TokenType::LBrace {
                let map = self.parse_map()?;
                if annotations.is_empty() {
                    items.push(map);
                } else {
                    items.push(Value::Annotated(Box::new(Attribute {
                        key: String::new(),
                        value: map,
                        annotations,
                    })));
                }
            } else {
                let scalar = self.collect_list_scalar();
                if !scalar.is_empty() {
                    items.push(Value::Scalar(scalar));
                }
            }

            if self.peek(0).ttype == TokenType::Comma {
                self.advance();
            }
            self.skip_newlines();
        }

        self.advance(); // `]`
        Ok(Value::List(items))
    }

    /// ComponentBlock ::= Ident Ident "{" { Attribute } "}"
    /// The kind identifier is already consumed by the caller.
    fn parse_component_block(
        &mut self,
        kind: String,
        annotations: Vec<Annotation>,
    ) -> Result<Block, SimalError> {
        let name = self.eat_ident("a component name")?;
        self.expect(TokenType::LBrace, "`{` opening the component body")?;
        let attributes = self.parse_attribute_body()?;

        Ok(Block {
            kind,
            name,
            attributes,
            annotations,
        })
    }

    /// Field ::= [ "+" | "-" | "#" ] Ident ":" TypeText
    fn parse_field(&mut self, annotations: Vec<Annotation>) -> Result<Field, SimalError> {
        self.skip_newlines();

        let mut visibility = Visibility::None;
        if let TokenType::Ident(s) = &self.peek(0).ttype {
            if let Some(v) = Visibility::from_marker(s) {
                visibility = v;
                self.advance();
            }
        }

        let name = self.eat_ident("a field name")?;

        if self.peek(0).ttype != TokenType::Colon {
            let tok = self.peek(0).clone();
            return Err(ParserError::FieldMissingColon {
                src: self.src(),
                span: self.token_span(&tok),
                name,
                line: tok.line,
                col: tok.col,
            }
            .into());
        }
        self.advance(); // `:`

        let ty = self.collect_field_type();

        Ok(Field {
            visibility,
            name,
            ty,
            annotations,
        })
    }

    /// Method ::= [ Visibility ] Ident "(" Params ")" "->" Returns [ "{" Body "}" ]
    fn parse_method(&mut self, annotations: Vec<Annotation>) -> Result<Method, SimalError> {
        self.skip_newlines();

        let mut visibility = Visibility::None;
        if let TokenType::Ident(s) = &self.peek(0).ttype {
            if let Some(v) = Visibility::from_marker(s) {
                visibility = v;
                self.advance();
            }
        }

        let name = self.eat_ident("a method name")?;
        self.expect(TokenType::LParen, "`(` opening the parameter list")?;
        let params = self.collect_paren_text()?;

        self.skip_newlines();
        self.expect(TokenType::Arrow, "`->` before the return type")?;
        self.skip_newlines();

        let returns = self.collect_method_returns();

        self.skip_newlines();
        let attributes = if self.peek(0).ttype == TokenType::LBrace {
            self.advance();
            self.parse_attribute_body()?
        } else {
            Vec::new()
        };

        Ok(Method {
            visibility,
            name,
            params,
            returns,
            attributes,
            annotations,
        })
    }

    // === Endpoint parsing ===

    /// Collects the tokens of one endpoint line. Commas and newlines inside
    /// `()`, `{}` or `[]` do not end the line; a top-level `]` belongs to
    /// the enclosing endpoints list and is left unconsumed.
    fn collect_endpoint_tokens(&mut self) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut depth = 0usize;

        loop {
            let tok = self.peek(0).clone();
            match tok.ttype {
                TokenType::Eof => break,
                TokenType::LBracket | TokenType::LParen | TokenType::LBrace => depth += 1,
                TokenType::RBracket | TokenType::RParen | TokenType::RBrace => {
                    if depth > 0 {
                        depth -= 1;
                    } else if tok.ttype == TokenType::RBracket {
                        break;
                    }
                }
                TokenType::Comma | TokenType::Newline => {
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            tokens.push(tok);
            self.advance();
        }

        tokens
    }

    /// Interprets one collected endpoint line as HTTP or RPC style.
    fn parse_endpoint_tokens(
        &self,
        tokens: &[Token],
        annotations: Vec<Annotation>,
    ) -> Result<Endpoint, SimalError> {
        let raw = compact_tokens(tokens);
        let anchor = tokens.first().cloned().unwrap_or_else(|| self.peek(0).clone());
        let mut p = 0usize;
        skip_slice_newlines(tokens, &mut p);

        let is_http = matches!(
            tokens.get(p).map(|t| &t.ttype),
            Some(TokenType::Ident(s)) if HTTP_VERBS.contains(&s.as_str())
        );

        if is_http {
            let method = tokens[p].ttype.text().to_string();
            p += 1;
            skip_slice_newlines(tokens, &mut p);

            // Split path from request signature: the request begins at the
            // first `JSON` tag or at a `{` that is detached from the path
            // text (placeholder braces are glued to it).
            let mut path_toks: Vec<Token> = Vec::new();
            let mut body_toks: Vec<Token> = Vec::new();
            let mut seen_body = false;
            let mut found_arrow = false;

            while p < tokens.len() {
                let t = &tokens[p];
                if t.ttype == TokenType::Arrow {
                    found_arrow = true;
                    p += 1;
                    break;
                }

                if !seen_body {
                    let starts_body = match &t.ttype {
                        TokenType::Ident(s) if s == "JSON" => true,
                        TokenType::LBrace => !is_adjacent(path_toks.last(), t),
                        _ => false,
                    };
                    if starts_body {
                        seen_body = true;
                    }
                }

                if seen_body {
                    body_toks.push(t.clone());
                } else {
                    path_toks.push(t.clone());
                }
                p += 1;
            }

            if !found_arrow {
                return Err(self.endpoint_missing_arrow(&anchor));
            }

            let path = compact_tokens(&path_toks);
            let request = compact_tokens(&body_toks);

            skip_slice_newlines(tokens, &mut p);
            let mut resp_toks: Vec<Token> = Vec::new();
            while p < tokens.len() && tokens[p].ttype != TokenType::LBracket {
                resp_toks.push(tokens[p].clone());
                p += 1;
            }
            let response = compact_tokens(&resp_toks);

            let attributes = self.parse_endpoint_attrs(tokens, &mut p, &anchor)?;

            return Ok(Endpoint {
                style: EndpointStyle::Http,
                method,
                path,
                request,
                response,
                raw,
                attributes,
                annotations,
                request_shape: None,
                response_shape: None,
                inputs: Vec::new(),
                outputs: Vec::new(),
            });
        }

        // RPC style: Name ( Request ) -> Response [ Attrs ]
        let method = match tokens.get(p).map(|t| &t.ttype) {
            Some(TokenType::Ident(s)) => s.clone(),
            _ => return self.err_unexpected_at(&anchor, "an endpoint definition"),
        };
        p += 1;
        skip_slice_newlines(tokens, &mut p);

        let mut request = String::new();
        if tokens.get(p).map(|t| &t.ttype) == Some(&TokenType::LParen) {
            p += 1;
            let inner = collect_slice_group(tokens, &mut p, TokenType::LParen, TokenType::RParen);
            request = compact_tokens(&inner);
        }

        skip_slice_newlines(tokens, &mut p);
        if tokens.get(p).map(|t| &t.ttype) == Some(&TokenType::Arrow) {
            p += 1;
        } else {
            return Err(self.endpoint_missing_arrow(&anchor));
        }
        skip_slice_newlines(tokens, &mut p);

        let response;
        if tokens.get(p).map(|t| &t.ttype) == Some(&TokenType::LParen) {
            p += 1;
            let inner = collect_slice_group(tokens, &mut p, TokenType::LParen, TokenType::RParen);
            response = format!("({})", compact_tokens(&inner));
        } else {
            let mut resp_toks: Vec<Token> = Vec::new();
            while p < tokens.len() && tokens[p].ttype != TokenType::LBracket {
                resp_toks.push(tokens[p].clone());
                p += 1;
            }
            response = compact_tokens(&resp_toks);
        }

        let attributes = self.parse_endpoint_attrs(tokens, &mut p, &anchor)?;

        Ok(Endpoint {
            style: EndpointStyle::Grpc,
            method,
            path: String::new(),
            request,
            response,
            raw,
            attributes,
            annotations,
            request_shape: None,
            response_shape: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        })
    }

    /// Parses the optional trailing `[k: v, ...]` block of an endpoint.
    fn parse_endpoint_attrs(
        &self,
        tokens: &[Token],
        p: &mut usize,
        anchor: &Token,
    ) -> Result<Vec<(String, String)>, SimalError> {
        skip_slice_newlines(tokens, p);
        if tokens.get(*p).map(|t| &t.ttype) != Some(&TokenType::LBracket) {
            return Ok(Vec::new());
        }
        *p += 1;

        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut key_parts: Vec<String> = Vec::new();
        let mut val_parts: Vec<String> = Vec::new();
        let mut reading_key = true;

        let mut flush = |attrs: &mut Vec<(String, String)>,
                         key_parts: &mut Vec<String>,
                         val_parts: &mut Vec<String>|
         -> Option<String> {
            let key = key_parts.join(" ").trim().to_string();
            let val = val_parts.join(" ").trim().to_string();
            key_parts.clear();
            val_parts.clear();
            if key.is_empty() {
                return None;
            }
            if attrs.iter().any(|(k, _)| *k == key) {
                return Some(key);
            }
            attrs.push((key, val));
            None
        };

        while *p < tokens.len() && tokens[*p].ttype != TokenType::RBracket {
            let t = &tokens[*p];
            *p += 1;
            match &t.ttype {
                TokenType::Colon if reading_key => reading_key = false,
                TokenType::Comma => {
                    if let Some(dup) = flush(&mut attrs, &mut key_parts, &mut val_parts) {
                        return Err(self.duplicate_key(anchor, &dup));
                    }
                    reading_key = true;
                }
                TokenType::Newline => {}
                other => {
                    let part = other.text().to_string();
                    if reading_key {
                        key_parts.push(part);
                    } else {
                        val_parts.push(part);
                    }
                }
            }
        }
        if *p < tokens.len() {
            *p += 1; // `]`
        }
        if let Some(dup) = flush(&mut attrs, &mut key_parts, &mut val_parts) {
            return Err(self.duplicate_key(anchor, &dup));
        }

        Ok(attrs)
    }

    // === Scalar collection ===

    /// Collects scalar tokens up to the nearest top-level terminator and
    /// re-joins their texts with single spaces. Content whose exact
    /// formatting matters must be quoted or put in a heredoc.
    fn collect_scalar(&mut self, ctx: ScalarCtx) -> String {
        let stop_at_comma = ctx == ScalarCtx::MapEntry;
        let mut parts: Vec<String> = Vec::new();
        let mut depth = NestDepth::default();

        loop {
            let tok = self.peek(0);
            let at_top = depth.at_top();
            match &tok.ttype {
                TokenType::Eof => break,
                TokenType::Newline if at_top => break,
                TokenType::RBrace if at_top => break,
                TokenType::RBracket if at_top => break,
                TokenType::Comma if at_top && stop_at_comma => break,
                _ => {}
            }
            if at_top && ctx == ScalarCtx::SystemBody && self.at_service_decl() {
                break;
            }

            depth.track(&tok.ttype);
            parts.push(tok.ttype.text().to_string());
            self.advance();
        }

        parts.join(" ").trim().to_string()
    }

    /// Raw map lines run to the end of the line or the closing brace.
    fn collect_raw_line(&mut self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut depth = NestDepth::default();

        loop {
            let tok = self.peek(0);
            let at_top = depth.at_top();
            match &tok.ttype {
                TokenType::Eof => break,
                TokenType::Newline if at_top => break,
                TokenType::RBrace if at_top => break,
                _ => {}
            }

            depth.track(&tok.ttype);
            parts.push(tok.ttype.text().to_string());
            self.advance();
        }

        parts.join(" ").trim().to_string()
    }

    /// Generic list items stop at a top-level comma, newline, or the list's
    /// closing bracket.
    fn collect_list_scalar(&mut self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut depth = NestDepth::default();

        loop {
            let tok = self.peek(0);
            let at_top = depth.at_top();
            match &tok.ttype {
                TokenType::Eof => break,
                TokenType::Comma | TokenType::Newline if at_top => break,
                TokenType::RBracket if at_top => break,
                _ => {}
            }

            depth.track(&tok.ttype);
            parts.push(tok.ttype.text().to_string());
            self.advance();
        }

        parts.join(" ").trim().to_string()
    }

    /// A field's type text ends at a separator or where the next field
    /// visibly begins (`[marker] name :`), so whole fields lists can sit on
    /// one line.
    fn collect_field_type(&mut self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut depth = NestDepth::default();

        loop {
            let tok = self.peek(0);
            let at_top = depth.at_top();
            match &tok.ttype {
                TokenType::Eof => break,
                TokenType::Comma | TokenType::Newline if at_top => break,
                TokenType::RBracket if at_top => break,
                _ => {}
            }
            if at_top && !parts.is_empty() && self.at_field_boundary() {
                break;
            }

            depth.track(&tok.ttype);
            parts.push(tok.ttype.text().to_string());
            self.advance();
        }

        parts.join(" ").trim().to_string()
    }

    /// Method return text stops before a body brace or a separator.
    fn collect_method_returns(&mut self) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut depth = NestDepth::default();

        loop {
            let tok = self.peek(0);
            let at_top = depth.at_top();
            match &tok.ttype {
                TokenType::Eof => break,
                TokenType::LBrace if at_top => break,
                TokenType::Comma | TokenType::Newline if at_top => break,
                TokenType::RBracket if at_top => break,
                _ => {}
            }

            depth.track(&tok.ttype);
            parts.push(tok.ttype.text().to_string());
            self.advance();
        }

        parts.join(" ").trim().to_string()
    }

    /// Collects text up to the `)` matching an already-consumed `(`.
    fn collect_paren_text(&mut self) -> Result<String, SimalError> {
        let mut parts: Vec<String> = Vec::new();
        let mut depth = 1usize;

        loop {
            let tok = self.peek(0).clone();
            match &tok.ttype {
                TokenType::Eof => return self.err_unexpected("`)` closing the parameter list"),
                TokenType::LParen => depth += 1,
                TokenType::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        break;
                    }
                }
                TokenType::Newline => {
                    self.advance();
                    continue;
                }
                _ => {}
            }
            parts.push(tok.ttype.text().to_string());
            self.advance();
        }

        Ok(parts.join(" ").trim().to_string())
    }

    // === Lookahead helpers ===

    fn at_service_decl(&self) -> bool {
        matches!(&self.peek(0).ttype, TokenType::Ident(s) if s == "service")
            && matches!(self.peek(1).ttype, TokenType::Ident(_))
            && self.peek(2).ttype == TokenType::LBrace
    }

    fn at_component_decl(&self) -> bool {
        matches!(self.peek(0).ttype, TokenType::Ident(_))
            && matches!(self.peek(1).ttype, TokenType::Ident(_))
            && self.peek(2).ttype == TokenType::LBrace
    }

    /// True when the upcoming tokens look like the start of the next field:
    /// `name :` or `marker name :`.
    fn at_field_boundary(&self) -> bool {
        match &self.peek(0).ttype {
            TokenType::Ident(s) if Visibility::from_marker(s).is_some() => {
                matches!(self.peek(1).ttype, TokenType::Ident(_))
                    && self.peek(2).ttype == TokenType::Colon
            }
            TokenType::Ident(_) => self.peek(1).ttype == TokenType::Colon,
            _ => false,
        }
    }

    // === Token stream helpers ===

    fn peek(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.position + offset)
            .unwrap_or_else(|| self.tokens.last().expect("token stream ends with Eof"))
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: TokenType, what: &str) -> Result<(), SimalError> {
        if std::mem::discriminant(&self.peek(0).ttype) == std::mem::discriminant(&expected) {
            self.advance();
            Ok(())
        } else {
            self.err_unexpected(what)
        }
    }

    fn eat_ident(&mut self, what: &str) -> Result<String, SimalError> {
        match &self.peek(0).ttype {
            TokenType::Ident(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => self.err_unexpected(what),
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek(0).ttype == TokenType::Newline {
            self.advance();
        }
    }

    /// Skips newlines and stray commas between container entries; both
    /// separators are optional and interchangeable.
    fn skip_separators(&mut self) {
        while matches!(self.peek(0).ttype, TokenType::Newline | TokenType::Comma) {
            self.advance();
        }
    }

    // === Error helpers ===

    fn src(&self) -> NamedSource<String> {
        (*self.source).clone()
    }

    fn token_span(&self, tok: &Token) -> miette::SourceSpan {
        let start = tok.pos_start.min(self.source_text.len());
        let len = tok
            .pos_end
            .saturating_sub(tok.pos_start)
            .max(1)
            .min(self.source_text.len() - start);
        (start, len).into()
    }

    fn err_unexpected<T>(&self, expected: &str) -> Result<T, SimalError> {
        let tok = self.peek(0).clone();
        self.err_unexpected_at(&tok, expected)
    }

    fn err_unexpected_at<T>(&self, tok: &Token, expected: &str) -> Result<T, SimalError> {
        if tok.ttype == TokenType::Eof {
            let pos = self.source_text.len().saturating_sub(1);
            return Err(ParserError::UnexpectedEof {
                src: self.src(),
                span: (pos, 0).into(),
            }
            .into());
        }
        Err(ParserError::UnexpectedToken {
            src: self.src(),
            span: self.token_span(tok),
            expected: expected.to_string(),
            line: tok.line,
            col: tok.col,
        }
        .into())
    }

    fn duplicate_key(&self, tok: &Token, key: &str) -> SimalError {
        ParserError::DuplicateKey {
            src: self.src(),
            span: self.token_span(tok),
            key: key.to_string(),
            line: tok.line,
            col: tok.col,
        }
        .into()
    }

    fn trailing_annotations(&self, tok: &Token) -> SimalError {
        ParserError::TrailingAnnotations {
            src: self.src(),
            span: self.token_span(tok),
            line: tok.line,
            col: tok.col,
        }
        .into()
    }

    fn endpoint_missing_arrow(&self, tok: &Token) -> SimalError {
        ParserError::EndpointMissingArrow {
            src: self.src(),
            span: self.token_span(tok),
            line: tok.line,
            col: tok.col,
        }
        .into()
    }
}

/// Nesting depths tracked while collecting scalar text. Angle brackets
/// arrive as `Ident("<")` / `Ident(">")`, so generic types like
/// `map<str, int>` survive top-level comma stops.
#[derive(Default)]
struct NestDepth {
    brackets: usize,
    parens: usize,
    braces: usize,
    angles: usize,
}

impl NestDepth {
    fn at_top(&self) -> bool {
        self.brackets == 0 && self.parens == 0 && self.braces == 0 && self.angles == 0
    }

    fn track(&mut self, ttype: &TokenType) {
        match ttype {
            TokenType::LBracket => self.brackets += 1,
            TokenType::RBracket if self.brackets > 0 => self.brackets -= 1,
            TokenType::LParen => self.parens += 1,
            TokenType::RParen if self.parens > 0 => self.parens -= 1,
            TokenType::LBrace => self.braces += 1,
            TokenType::RBrace if self.braces > 0 => self.braces -= 1,
            TokenType::Ident(s) if s == "<" => self.angles += 1,
            TokenType::Ident(s) if s == ">" && self.angles > 0 => self.angles -= 1,
            _ => {}
        }
    }
}

fn lex_to_parse_error(source: &Arc<NamedSource<String>>, err: LexError) -> SimalError {
    let src = (**source).clone();
    let span: miette::SourceSpan = (err.offset, err.len).into();
    match err.kind {
        LexErrorKind::UnterminatedString => ParserError::UnterminatedString {
            src,
            span,
            line: err.line,
            col: err.col,
        }
        .into(),
        LexErrorKind::UnterminatedHeredoc { label } => ParserError::UnterminatedHeredoc {
            src,
            span,
            label,
            line: err.line,
            col: err.col,
        }
        .into(),
    }
}

/// Joins token texts back into compact source text. Tokens that were
/// adjacent in the source (byte spans touching) join without a space, so
/// `/api/comments/{id}` and `JSON{error: str?}` reconstruct byte-exact.
pub(crate) fn compact_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev_end: Option<usize> = None;
    let mut first = true;

    for tok in tokens {
        if tok.ttype == TokenType::Newline {
            prev_end = None;
            continue;
        }
        let text = tok.ttype.text();
        if !first && prev_end != Some(tok.pos_start) {
            out.push(' ');
        }
        out.push_str(text);
        prev_end = Some(tok.pos_end);
        first = false;
    }

    out.trim().to_string()
}

fn is_adjacent(prev: Option<&Token>, tok: &Token) -> bool {
    prev.is_some_and(|p| p.pos_end == tok.pos_start)
}

fn skip_slice_newlines(tokens: &[Token], p: &mut usize) {
    while tokens.get(*p).map(|t| &t.ttype) == Some(&TokenType::Newline) {
        *p += 1;
    }
}

/// Collects the tokens between an already-consumed opener and its matching
/// closer within a token slice; the closer is consumed.
fn collect_slice_group(
    tokens: &[Token],
    p: &mut usize,
    opener: TokenType,
    closer: TokenType,
) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::new();
    let mut depth = 1usize;

    while *p < tokens.len() {
        let t = &tokens[*p];
        *p += 1;
        if t.ttype == opener {
            depth += 1;
        } else if t.ttype == closer {
            depth -= 1;
            if depth == 0 {
                break;
            }
        }
        out.push(t.clone());
    }

    out
}
