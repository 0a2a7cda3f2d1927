//! `{% include "file" [with key=expr, ...] [only] %}`
//!
//! A string literal filename is compiled together with the including
//! template. Any other expression is evaluated, loaded and compiled each
//! time the tag renders.

use crate::ast::{IncludeNode, IncludeSource, TagNode};
use crate::error::Result;
use crate::lexer::{Token, TokenKind};
use crate::parser::Parser;

pub fn parse(doc: &mut Parser<'_>, _start: &Token, args: &mut Parser<'_>) -> Result<TagNode> {
    let source = match args.match_type(TokenKind::String) {
        Some(filename) => IncludeSource::Static(doc.compile_relative(&filename.value)?.into_tree()),
        None => {
            if args.remaining() == 0 {
                return Err(args.error("Tag 'include' requires a template filename"));
            }
            IncludeSource::Deferred(args.parse_expression()?)
        }
    };

    let mut with = Vec::new();
    if args.match_token(TokenKind::Identifier, "with").is_some() {
        while args.remaining() > 0 {
            // `only` closes the list unless it is used as a key
            if args.peek(TokenKind::Identifier, "only").is_some()
                && args.peek_n(1, TokenKind::Symbol, "=").is_none()
            {
                break;
            }

            let key = args
                .match_type(TokenKind::Identifier)
                .ok_or_else(|| args.error("Expected an identifier in 'with' list"))?;
            if args.match_symbol("=").is_none() {
                return Err(args.error("Expected '=' after identifier in 'with' list"));
            }
            let value = args.parse_expression()?;
            with.push((key.value.clone(), value));

            args.match_symbol(",");
        }

        if with.is_empty() {
            return Err(args.error("Tag 'include' expects at least one pair after 'with'"));
        }
    }

    let only = args.match_token(TokenKind::Identifier, "only").is_some();

    if args.remaining() > 0 {
        return Err(args.error(if only {
            "'only' must be the last argument of 'include'"
        } else {
            "Malformed 'include' arguments, only 'with' and 'only' are allowed"
        }));
    }

    Ok(TagNode::Include(IncludeNode {
        origin: doc.template_name().to_string(),
        source,
        with,
        only,
    }))
}
