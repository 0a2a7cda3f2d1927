use crate::error::{Error, Result};
use std::fmt;

/// Token categories produced by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal markup outside of `{{ }}` and `{% %}`
    Html,
    Keyword,
    Identifier,
    String,
    Number,
    Symbol,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            line,
            column,
        }
    }

    pub fn is(&self, kind: TokenKind, value: &str) -> bool {
        self.kind == kind && self.value == value
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} '{}' at {}:{}",
            self.kind, self.value, self.line, self.column
        )
    }
}

pub const KEYWORDS: &[&str] = &["in", "and", "or", "not", "true", "false", "nil", "none"];

// Longest first so that "==" wins over "=".
const SYMBOLS: &[&str] = &[
    "{{", "}}", "{%", "%}", "==", "!=", "<>", "<=", ">=", "&&", "||", "(", ")", "[", "]", "+",
    "-", "*", "/", "^", ",", ".", "!", "|", ":", "=", "<", ">",
];

/// Lexer for template source
pub struct Lexer<'a> {
    name: &'a str,
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    /// Closing delimiter while inside `{{ }}` or `{% %}`
    closing: Option<&'static str>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(name: &'a str, input: &str) -> Self {
        Self {
            name,
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            closing: None,
            tokens: Vec::new(),
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    /// Advance to the next character
    fn advance(&mut self) {
        if self.current_char() == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.position += 1;
    }

    fn advance_by(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn starts_with(&self, pattern: &str) -> bool {
        let mut i = self.position;
        for ch in pattern.chars() {
            if self.input.get(i) != Some(&ch) {
                return false;
            }
            i += 1;
        }
        true
    }

    fn error(&self, line: usize, column: usize, msg: impl Into<String>) -> Error {
        Error::syntax_at(self.name, line, column, msg)
    }

    fn push(&mut self, kind: TokenKind, value: String, line: usize, column: usize) {
        self.tokens.push(Token::new(kind, value, line, column));
    }

    /// Tokenize the entire input
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        while self.current_char().is_some() {
            match self.closing {
                None => self.lex_markup()?,
                Some(closing) => self.lex_tag_content(closing)?,
            }
        }

        if let Some(closing) = self.closing {
            return Err(self.error(
                self.line,
                self.column,
                format!("Unexpected end of template, expected '{}'", closing),
            ));
        }

        Ok(self.tokens)
    }

    /// Lex literal markup, comments and opening delimiters
    fn lex_markup(&mut self) -> Result<()> {
        let (line, column) = (self.line, self.column);

        if self.starts_with("{#") {
            self.advance_by(2);
            while !self.starts_with("#}") {
                if self.current_char().is_none() {
                    return Err(self.error(line, column, "Unterminated comment"));
                }
                self.advance();
            }
            self.advance_by(2);
            return Ok(());
        }

        for (open, close) in [("{{", "}}"), ("{%", "%}")] {
            if self.starts_with(open) {
                self.advance_by(2);
                self.push(TokenKind::Symbol, open.to_string(), line, column);
                self.closing = Some(close);
                return Ok(());
            }
        }

        let mut text = String::new();
        while let Some(ch) = self.current_char() {
            if self.starts_with("{{") || self.starts_with("{%") || self.starts_with("{#") {
                break;
            }
            text.push(ch);
            self.advance();
        }
        self.push(TokenKind::Html, text, line, column);
        Ok(())
    }

    /// Lex one token inside `{{ }}` / `{% %}`
    fn lex_tag_content(&mut self, closing: &'static str) -> Result<()> {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }

        let (line, column) = (self.line, self.column);
        let ch = match self.current_char() {
            Some(ch) => ch,
            None => return Ok(()),
        };

        if self.starts_with(closing) {
            self.advance_by(2);
            self.push(TokenKind::Symbol, closing.to_string(), line, column);
            self.closing = None;
            return Ok(());
        }

        if ch.is_alphabetic() || ch == '_' {
            let ident = self.read_while(|c| c.is_alphanumeric() || c == '_');
            let kind = if KEYWORDS.contains(&ident.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            self.push(kind, ident, line, column);
            return Ok(());
        }

        if ch.is_ascii_digit() {
            let mut number = self.read_while(|c| c.is_ascii_digit());
            if self.current_char() == Some('.') && self.peek().is_some_and(|c| c.is_ascii_digit())
            {
                self.advance();
                number.push('.');
                number.push_str(&self.read_while(|c| c.is_ascii_digit()));
            }
            self.push(TokenKind::Number, number, line, column);
            return Ok(());
        }

        if ch == '"' || ch == '\'' {
            let s = self.read_string(ch, line, column)?;
            self.push(TokenKind::String, s, line, column);
            return Ok(());
        }

        for symbol in SYMBOLS {
            if self.starts_with(symbol) {
                self.advance_by(symbol.chars().count());
                self.push(TokenKind::Symbol, symbol.to_string(), line, column);
                return Ok(());
            }
        }

        Err(self.error(line, column, format!("Unexpected character '{}'", ch)))
    }

    fn read_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if !pred(ch) {
                break;
            }
            result.push(ch);
            self.advance();
        }
        result
    }

    fn read_string(&mut self, quote: char, line: usize, column: usize) -> Result<String> {
        self.advance(); // opening quote
        let mut result = String::new();

        loop {
            match self.current_char() {
                None => return Err(self.error(line, column, "Unterminated string literal")),
                Some(ch) if ch == quote => {
                    self.advance();
                    return Ok(result);
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some(other) => {
                            return Err(self.error(
                                self.line,
                                self.column,
                                format!("Unknown escape sequence '\\{}'", other),
                            ))
                        }
                        None => {
                            return Err(self.error(line, column, "Unterminated string literal"))
                        }
                    };
                    result.push(escaped);
                    self.advance();
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }
    }
}

/// Tokenize `input`, reporting errors against template `name`
pub fn tokenize(name: &str, input: &str) -> Result<Vec<Token>> {
    Lexer::new(name, input).tokenize()
}
