//! Document parser
//!
//! A cursor over a token slice. The document parser turns the whole token
//! stream into nodes and hands the tokens between a tag name and its `%}` to
//! the registered tag parser as a second, scoped `Parser`.

mod expression;

use crate::ast::Node;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind};
use crate::loader;
use crate::template::{Template, TemplateTree};
use indexmap::IndexMap;
use std::sync::Arc;

pub struct Parser<'a> {
    engine: &'a Engine,
    template: &'a str,
    tokens: &'a [Token],
    position: usize,
    /// Tag name token when this parser is scoped to a tag's arguments
    tag: Option<&'a Token>,
    /// Names of the templates currently being compiled, outermost first
    loading: &'a [String],
    blocks: IndexMap<String, Vec<Node>>,
    parent: Option<Arc<TemplateTree>>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(
        engine: &'a Engine,
        template: &'a str,
        tokens: &'a [Token],
        loading: &'a [String],
    ) -> Self {
        Self {
            engine,
            template,
            tokens,
            position: 0,
            tag: None,
            loading,
            blocks: IndexMap::new(),
            parent: None,
        }
    }

    /// Parser scoped to the arguments of `tag`
    fn scoped(&self, tokens: &'a [Token], tag: &'a Token) -> Parser<'a> {
        Parser {
            engine: self.engine,
            template: self.template,
            tokens,
            position: 0,
            tag: Some(tag),
            loading: self.loading,
            blocks: IndexMap::new(),
            parent: None,
        }
    }

    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    /// Name of the template being parsed
    pub fn template_name(&self) -> &'a str {
        self.template
    }

    /// Name of the tag whose arguments this parser covers
    pub fn tag_name(&self) -> Option<&'a str> {
        self.tag.map(|t| t.value.as_str())
    }

    pub fn tag_token(&self) -> Option<&'a Token> {
        self.tag
    }

    // Cursor primitives

    pub fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.position)
    }

    /// Token at absolute index `i`
    pub fn get(&self, i: usize) -> Option<&'a Token> {
        self.tokens.get(i)
    }

    /// Current token if it has the given kind and value; does not consume
    pub fn peek(&self, kind: TokenKind, value: &str) -> Option<&'a Token> {
        self.peek_n(0, kind, value)
    }

    /// Token `shift` positions ahead if it has the given kind and value
    pub fn peek_n(&self, shift: usize, kind: TokenKind, value: &str) -> Option<&'a Token> {
        self.get(self.position + shift).filter(|t| t.is(kind, value))
    }

    pub fn peek_type(&self, kind: TokenKind) -> Option<&'a Token> {
        self.current().filter(|t| t.kind == kind)
    }

    /// Consume and return the current token if it matches kind and value
    pub fn match_token(&mut self, kind: TokenKind, value: &str) -> Option<&'a Token> {
        let token = self.peek(kind, value)?;
        self.consume();
        Some(token)
    }

    pub fn match_symbol(&mut self, value: &str) -> Option<&'a Token> {
        self.match_token(TokenKind::Symbol, value)
    }

    pub fn match_keyword(&mut self, value: &str) -> Option<&'a Token> {
        self.match_token(TokenKind::Keyword, value)
    }

    /// Consume and return the current token if it has the given kind
    pub fn match_type(&mut self, kind: TokenKind) -> Option<&'a Token> {
        let token = self.peek_type(kind)?;
        self.consume();
        Some(token)
    }

    /// Consume the current token if it has `kind` and one of `values`
    pub fn match_one(&mut self, kind: TokenKind, values: &[&str]) -> Option<&'a Token> {
        let token = self
            .current()
            .filter(|t| t.kind == kind && values.contains(&t.value.as_str()))?;
        self.consume();
        Some(token)
    }

    pub fn consume(&mut self) {
        self.consume_n(1);
    }

    pub fn consume_n(&mut self, n: usize) {
        self.position = (self.position + n).min(self.tokens.len());
    }

    /// Number of tokens not yet consumed
    pub fn remaining(&self) -> usize {
        self.tokens.len() - self.position
    }

    /// Total number of tokens this parser covers
    pub fn count(&self) -> usize {
        self.tokens.len()
    }

    /// Syntax error positioned at the current token (or the closest one available)
    pub fn error(&self, msg: impl Into<String>) -> Error {
        match self.current().or_else(|| self.tokens.last()).or(self.tag) {
            Some(token) => Error::syntax(self.template, token, msg),
            None => Error::syntax_at(self.template, 1, 1, msg),
        }
    }

    pub fn error_at(&self, token: &Token, msg: impl Into<String>) -> Error {
        Error::syntax(self.template, token, msg)
    }

    // Document level

    /// Parse the remaining tokens into a node list
    pub fn parse_document(&mut self) -> Result<Vec<Node>> {
        let mut nodes = Vec::new();
        while self.remaining() > 0 {
            nodes.push(self.parse_document_element()?);
        }
        Ok(nodes)
    }

    fn parse_document_element(&mut self) -> Result<Node> {
        let token = match self.current() {
            Some(token) => token,
            None => return Err(self.error("Unexpected end of template")),
        };

        match token.kind {
            TokenKind::Html => {
                self.consume();
                Ok(Node::Html(token.value.clone()))
            }
            TokenKind::Symbol if token.value == "{{" => self.parse_output_element(),
            TokenKind::Symbol if token.value == "{%" => self.parse_tag_element(),
            _ => Err(self.error_at(token, format!("Unexpected token '{}'", token.value))),
        }
    }

    fn parse_output_element(&mut self) -> Result<Node> {
        self.consume(); // {{
        if self.peek(TokenKind::Symbol, "}}").is_some() {
            return Err(self.error("Expected an expression inside '{{ }}'"));
        }
        let expr = self.parse_expression()?;
        if self.match_symbol("}}").is_none() {
            return Err(self.error("'}}' expected"));
        }
        Ok(Node::Output(expr))
    }

    fn parse_tag_element(&mut self) -> Result<Node> {
        self.consume(); // {%
        let tokens = self.tokens;

        let name = match self.current() {
            Some(token) if token.kind == TokenKind::Identifier => token,
            Some(token) => return Err(self.error_at(token, "Tag name must be an identifier")),
            None => return Err(self.error("Tag name expected after '{%'")),
        };
        self.consume();

        let start = self.position;
        let end = self.find_tag_end()?;
        self.position = end + 1;

        let engine = self.engine;
        let parse_fn = match engine.tags().get(&name.value) {
            Some(parse_fn) => parse_fn,
            None if is_closing_tag(&name.value) => {
                return Err(self.error_at(
                    name,
                    format!("Unexpected end tag '{}' without a matching opening tag", name.value),
                ))
            }
            None => {
                return Err(Error::registry(format!(
                    "Tag '{}' does not exist (template '{}', line {}, column {})",
                    name.value, self.template, name.line, name.column
                )))
            }
        };

        log::trace!(
            "Parsing tag '{}' in '{}' at {}:{}",
            name.value,
            self.template,
            name.line,
            name.column
        );

        let mut args = self.scoped(&tokens[start..end], name);
        let node = parse_fn(self, name, &mut args)?;

        if args.remaining() > 0 {
            return Err(args.error(format!(
                "Tag '{}' got unexpected arguments",
                name.value
            )));
        }

        Ok(Node::Tag(node))
    }

    /// Index of the `%}` closing the tag that starts at the cursor
    fn find_tag_end(&self) -> Result<usize> {
        self.tokens[self.position..]
            .iter()
            .position(|t| t.is(TokenKind::Symbol, "%}"))
            .map(|offset| self.position + offset)
            .ok_or_else(|| self.error("'%}' expected"))
    }

    /// Parse nodes until one of the tags in `names` is reached
    ///
    /// Returns the wrapped nodes and a parser over the end tag's arguments;
    /// `tag_name()` on that parser tells which end tag was found.
    pub fn wrap_until_tag(&mut self, names: &[&str]) -> Result<(Vec<Node>, Parser<'a>)> {
        let tokens = self.tokens;
        let mut nodes = Vec::new();

        while self.remaining() > 0 {
            if self.peek(TokenKind::Symbol, "{%").is_some() {
                if let Some(name) = self.get(self.position + 1) {
                    if name.kind == TokenKind::Identifier && names.contains(&name.value.as_str())
                    {
                        self.consume_n(2);
                        let start = self.position;
                        let end = self.find_tag_end()?;
                        self.position = end + 1;
                        return Ok((nodes, self.scoped(&tokens[start..end], name)));
                    }
                }
            }
            nodes.push(self.parse_document_element()?);
        }

        Err(self.error(format!(
            "Unexpected end of template, expected tag {}",
            names.join(" or ")
        )))
    }

    // Template level state filled by tags

    /// Register a block body under `name`; names are unique per template
    pub fn define_block(&mut self, name: &Token, body: Vec<Node>) -> Result<()> {
        if self.blocks.contains_key(&name.value) {
            return Err(self.error_at(
                name,
                format!("Block named '{}' already defined", name.value),
            ));
        }
        self.blocks.insert(name.value.clone(), body);
        Ok(())
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    pub fn set_parent(&mut self, parent: Template) {
        self.parent = Some(parent.into_tree());
    }

    /// Compile the template `path`, resolved against this template's directory
    pub fn compile_relative(&self, path: &str) -> Result<Template> {
        let resolved = loader::resolve_relative(self.template, path);
        log::trace!("Resolving '{}' from '{}' as '{}'", path, self.template, resolved);
        self.engine.compile_nested(&resolved, self.loading)
    }

    pub(crate) fn into_parts(self) -> (IndexMap<String, Vec<Node>>, Option<Arc<TemplateTree>>) {
        (self.blocks, self.parent)
    }
}

/// End and continuation markers only valid inside their opening tag's body
fn is_closing_tag(name: &str) -> bool {
    name.starts_with("end") || matches!(name, "elif" | "else" | "empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::lexer::tokenize;

    #[test]
    fn test_cursor_primitives() {
        let engine = Engine::new();
        let tokens = tokenize("test", "{{ a + 1 }}").unwrap();
        let mut parser = Parser::new(&engine, "test", &tokens, &[]);

        assert_eq!(parser.count(), 5);
        assert!(parser.peek(TokenKind::Symbol, "{{").is_some());
        assert!(parser.match_symbol("}}").is_none());
        assert!(parser.match_symbol("{{").is_some());
        assert_eq!(parser.match_type(TokenKind::Identifier).unwrap().value, "a");
        assert!(parser.peek_n(1, TokenKind::Number, "1").is_some());
        assert!(parser.match_one(TokenKind::Symbol, &["-", "+"]).is_some());
        parser.consume_n(10);
        assert_eq!(parser.remaining(), 0);
        assert!(parser.current().is_none());
    }

    #[test]
    fn test_parse_document_nodes() {
        let engine = Engine::new();
        let tokens = tokenize("test", "Hello {{ name }}!").unwrap();
        let mut parser = Parser::new(&engine, "test", &tokens, &[]);
        let nodes = parser.parse_document().unwrap();

        assert_eq!(nodes.len(), 3);
        assert!(matches!(&nodes[0], Node::Html(s) if s == "Hello "));
        assert!(matches!(&nodes[1], Node::Output(_)));
        assert!(matches!(&nodes[2], Node::Html(s) if s == "!"));
    }

    #[test]
    fn test_wrap_until_tag() {
        let engine = Engine::new();
        let tokens = tokenize("test", "a{{ x }}b{% endthing extra %}rest").unwrap();
        let mut parser = Parser::new(&engine, "test", &tokens, &[]);

        let (nodes, mut args) = parser.wrap_until_tag(&["endthing"]).unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(args.tag_name(), Some("endthing"));
        assert_eq!(args.count(), 1);
        assert_eq!(args.match_type(TokenKind::Identifier).unwrap().value, "extra");
        assert!(matches!(parser.current(), Some(t) if t.value == "rest"));
    }

    #[test]
    fn test_wrap_until_tag_eof() {
        let engine = Engine::new();
        let tokens = tokenize("test", "no end here").unwrap();
        let mut parser = Parser::new(&engine, "test", &tokens, &[]);
        assert!(matches!(
            parser.wrap_until_tag(&["endblock"]),
            Err(Error::Syntax { .. })
        ));
    }

    #[test]
    fn test_unknown_tag_is_registry_error() {
        let engine = Engine::new();
        let tokens = tokenize("test", "\n  {% frobnicate 1 %}").unwrap();
        let mut parser = Parser::new(&engine, "test", &tokens, &[]);

        match parser.parse_document() {
            Err(Error::Registry(msg)) => {
                assert!(msg.contains("frobnicate"));
                assert!(msg.contains("line 2"));
            }
            other => panic!("Expected registry error, got {:?}", other),
        }
    }

    #[test]
    fn test_unmatched_end_tags_are_syntax_errors() {
        let engine = Engine::new();
        for source in [
            "a{% endblock %}",
            "a{% endif %}",
            "a{% endfor %}",
            "a{% empty %}",
            "a{% else %}",
            "a{% elif x %}",
            "{% for x in y %}{% endif %}{% endfor %}",
            "{% block a %}{% endfor %}{% endblock %}",
        ] {
            match engine.compile("test", source) {
                Err(Error::Syntax { message, .. }) => {
                    assert!(message.contains("Unexpected end tag"), "{}: {}", source, message)
                }
                other => panic!("{} should be a syntax error, got {:?}", source, other),
            }
        }
    }

    #[test]
    fn test_output_errors() {
        let engine = Engine::new();
        for source in ["{{ }}", "{{ a b }}", "{% 'if' %}"] {
            let tokens = tokenize("test", source).unwrap();
            let mut parser = Parser::new(&engine, "test", &tokens, &[]);
            assert!(
                matches!(parser.parse_document(), Err(Error::Syntax { .. })),
                "{} should fail",
                source
            );
        }
    }

    #[test]
    fn test_error_position_falls_back_to_tag() {
        let engine = Engine::new();
        let tokens = tokenize("test", "{% endblock %}").unwrap();
        let tag = &tokens[1];
        let parser = Parser::new(&engine, "test", &tokens, &[]).scoped(&tokens[2..2], tag);

        match parser.error("missing") {
            Error::Syntax { line, column, .. } => assert_eq!((line, column), (1, 4)),
            other => panic!("Expected syntax error, got {:?}", other),
        }
    }
}
