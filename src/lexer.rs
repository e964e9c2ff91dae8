//! # SiMAL Lexer (Tokenizer)
//!
//! Converts raw SiMAL source into a sequence of [`Token`]s. The lexer is a
//! hand-written, stateful scanner that walks the input character by
//! character and recognizes:
//!
//! - **Punctuation:** braces `{}`, brackets `[]`, parens `()`, `:`, `,`, `@`.
//! - **The arrow** `->`, always a single two-character token.
//! - **Strings:** quoted (`"..."` / `'...'`, taken verbatim, no escapes)
//!   and heredocs (`<<LABEL` ... `LABEL`, dedented).
//! - **Identifiers:** greedy runs starting with a letter or underscore and
//!   continuing with letters, digits, or `_ . / - '`. Bare digit runs and
//!   any otherwise-unrecognized character also come back as `Ident`s, so
//!   the parser can reconstruct scalar text from arbitrary input.
//! - **Newlines:** a run of line breaks (blank lines included) collapses
//!   into a single `Newline` token; spaces and tabs produce nothing.
//!
//! Each token carries its byte span and its 1-based line/column, which the
//! parser uses both for error reporting and for byte-exact reconstruction
//! of endpoint lines.

use crate::error::{LexError, LexErrorKind};

/// The different kinds of tokens the lexer can produce.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenType {
    /// End of input. Returned repeatedly once the source is exhausted.
    Eof,
    /// One or more consecutive line breaks.
    Newline,
    /// An identifier or any other bare run of text.
    Ident(String),
    /// A quoted string or heredoc body, delimiters removed.
    String(String),
    /// `{`
    LBrace,
    /// `}`
    RBrace,
    /// `[`
    LBracket,
    /// `]`
    RBracket,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `@`
    At,
    /// `->`
    Arrow,
}

impl TokenType {
    /// The textual form used when scalars are re-joined from tokens.
    pub fn text(&self) -> &str {
        match self {
            TokenType::Eof => "",
            TokenType::Newline => "\n",
            TokenType::Ident(s) | TokenType::String(s) => s,
            TokenType::LBrace => "{",
            TokenType::RBrace => "}",
            TokenType::LBracket => "[",
            TokenType::RBracket => "]",
            TokenType::LParen => "(",
            TokenType::RParen => ")",
            TokenType::Colon => ":",
            TokenType::Comma => ",",
            TokenType::At => "@",
            TokenType::Arrow => "->",
        }
    }
}

/// A single lexical token with its byte span and source position.
#[derive(Debug, Clone)]
pub struct Token {
    pub ttype: TokenType,
    /// 0-based starting byte position in the source.
    pub pos_start: usize,
    /// 0-based ending byte position (exclusive).
    pub pos_end: usize,
    /// 1-based line of the first character.
    pub line: usize,
    /// 1-based column of the first character.
    pub col: usize,
}

impl Token {
    #[must_use]
    pub fn new(ttype: TokenType, pos_start: usize, pos_end: usize, line: usize, col: usize) -> Token {
        Token {
            ttype,
            pos_start,
            pos_end,
            line,
            col,
        }
    }
}

/// Characters that may continue an identifier after its leading letter.
fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-' | '\'')
}

/// A lexer for SiMAL source text.
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    position: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().peekable(),
            position: 0,
            line: 1,
            col: 1,
        }
    }

    /// Tokenizes the entire input, including the final [`TokenType::Eof`].
    ///
    /// # Errors
    ///
    /// Returns a [`LexError`] for an unterminated quoted string or heredoc.
    pub fn lex(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.ttype == TokenType::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        Ok(tokens)
    }

    /// Scans and returns the next token from the input stream.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_blanks();

        let start_pos = self.position;
        let start_line = self.line;
        let start_col = self.col;

        let ttype = if let Some(char) = self.advance() {
            match char {
                '\n' => self.read_newline_run(),
                '{' => TokenType::LBrace,
                '}' => TokenType::RBrace,
                '[' => TokenType::LBracket,
                ']' => TokenType::RBracket,
                '(' => TokenType::LParen,
                ')' => TokenType::RParen,
                ':' => TokenType::Colon,
                ',' => TokenType::Comma,
                '@' => TokenType::At,

                '-' => {
                    if self.peek() == Some(&'>') {
                        self.advance();
                        TokenType::Arrow
                    } else {
                        TokenType::Ident("-".to_string())
                    }
                }
                '<' => {
                    if self.peek() == Some(&'<') && self.heredoc_label_follows() {
                        self.advance(); // second '<'
                        self.read_heredoc(start_pos, start_line, start_col)?
                    } else {
                        TokenType::Ident("<".to_string())
                    }
                }
                quote @ ('"' | '\'') => self.read_string(quote, start_pos, start_line, start_col)?,
                c if c.is_ascii_alphabetic() || c == '_' => self.read_identifier(c),
                c if c.is_ascii_digit() => self.read_bare_run(c),

                other => TokenType::Ident(other.to_string()),
            }
        } else {
            TokenType::Eof
        };

        Ok(Token::new(ttype, start_pos, self.position, start_line, start_col))
    }

    fn advance(&mut self) -> Option<char> {
        let char = self.chars.next();
        if let Some(c) = char {
            self.position += c.len_utf8();
            if c == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        char
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn skip_blanks(&mut self) {
        while let Some(c) = self.peek() {
            if matches!(c, ' ' | '\t' | '\r') {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Collapses the current line break plus any following blank lines into
    /// a single `Newline`. The first `\n` has already been consumed.
    fn read_newline_run(&mut self) -> TokenType {
        loop {
            self.skip_blanks();
            if self.peek() == Some(&'\n') {
                self.advance();
            } else {
                break;
            }
        }
        TokenType::Newline
    }

    /// True when the character after the second `<` can start an identifier,
    /// i.e. `<<LABEL` really is a heredoc opener.
    fn heredoc_label_follows(&self) -> bool {
        self.input[self.position..]
            .chars()
            .nth(1)
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
    }

    fn read_string(
        &mut self,
        quote: char,
        start_pos: usize,
        start_line: usize,
        start_col: usize,
    ) -> Result<TokenType, LexError> {
        let mut value = String::new();
        loop {
            match self.advance() {
                Some(c) if c == quote => return Ok(TokenType::String(value)),
                Some(c) => value.push(c),
                None => {
                    return Err(LexError {
                        kind: LexErrorKind::UnterminatedString,
                        offset: start_pos,
                        len: 1,
                        line: start_line,
                        col: start_col,
                    })
                }
            }
        }
    }

    /// Reads a `<<LABEL` heredoc. Both `<` are already consumed. Collects
    /// lines up to (not including) a line whose trimmed content equals the
    /// label, drops blank edge lines, and removes the minimum shared
    /// leading-whitespace width from the rest.
    fn read_heredoc(
        &mut self,
        start_pos: usize,
        start_line: usize,
        start_col: usize,
    ) -> Result<TokenType, LexError> {
        let mut label = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(*c) {
                label.push(*c);
                self.advance();
            } else {
                break;
            }
        }

        // The remainder of the opener line is discarded.
        while let Some(c) = self.peek() {
            if *c == '\n' {
                break;
            }
            self.advance();
        }
        self.advance(); // the newline itself, if any

        let mut lines: Vec<String> = Vec::new();
        let mut closed = false;
        while self.peek().is_some() {
            let mut line = String::new();
            while let Some(c) = self.peek() {
                if *c == '\n' {
                    break;
                }
                line.push(*c);
                self.advance();
            }
            let at_eof = self.peek().is_none();
            self.advance(); // consume the newline, no-op at EOF

            if line.trim() == label {
                closed = true;
                break;
            }
            lines.push(line);
            if at_eof {
                break;
            }
        }

        if !closed {
            return Err(LexError {
                kind: LexErrorKind::UnterminatedHeredoc { label },
                offset: start_pos,
                len: self.position.saturating_sub(start_pos).max(1),
                line: start_line,
                col: start_col,
            });
        }

        while lines.first().is_some_and(|l| l.trim().is_empty()) {
            lines.remove(0);
        }
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }

        let indent = lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
            .min()
            .unwrap_or(0);

        let dedented: Vec<String> = lines
            .iter()
            .map(|l| {
                if l.chars().count() >= indent {
                    l.chars().skip(indent).collect()
                } else {
                    String::new()
                }
            })
            .collect();

        Ok(TokenType::String(dedented.join("\n")))
    }

    fn read_identifier(&mut self, first_char: char) -> TokenType {
        let mut ident = String::new();
        ident.push(first_char);

        while let Some(c) = self.peek() {
            if is_ident_continue(*c) {
                ident.push(*c);
                self.advance();
            } else {
                break;
            }
        }

        TokenType::Ident(ident)
    }

    /// Bare runs that start with a digit (`587`, `postgres` versions, IP
    /// fragments) are consumed up to whitespace or structural punctuation.
    fn read_bare_run(&mut self, first_char: char) -> TokenType {
        let mut run = String::new();
        run.push(first_char);

        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '{' | '}' | '[' | ']' | '(' | ')' | ':' | ',') {
                break;
            }
            run.push(*c);
            self.advance();
        }

        TokenType::Ident(run)
    }
}
