//! `{% for item in items %}...{% empty %}...{% endfor %}`
//! and `{% for key, value in map %}`

use super::expect_no_args;
use crate::ast::{ForNode, TagNode};
use crate::error::Result;
use crate::lexer::{Token, TokenKind};
use crate::parser::Parser;

pub fn parse(doc: &mut Parser<'_>, _start: &Token, args: &mut Parser<'_>) -> Result<TagNode> {
    let key = args
        .match_type(TokenKind::Identifier)
        .ok_or_else(|| args.error("Expected a loop variable as first argument of 'for'"))?;

    let value = if args.match_symbol(",").is_some() {
        let value = args
            .match_type(TokenKind::Identifier)
            .ok_or_else(|| args.error("Expected a second loop variable after ','"))?;
        Some(value.value.clone())
    } else {
        None
    };

    if args.match_keyword("in").is_none() {
        return Err(args.error("Expected keyword 'in' in 'for'"));
    }
    if args.remaining() == 0 {
        return Err(args.error("Expected an expression after 'in'"));
    }
    let iterable = args.parse_expression()?;
    if args.remaining() > 0 {
        return Err(args.error("Malformed 'for' arguments"));
    }

    let (body, end) = doc.wrap_until_tag(&["empty", "endfor"])?;
    expect_no_args(&end)?;

    let empty = if end.tag_name() == Some("empty") {
        let (body, end) = doc.wrap_until_tag(&["endfor"])?;
        expect_no_args(&end)?;
        Some(body)
    } else {
        None
    };

    Ok(TagNode::For(ForNode {
        key: key.value.clone(),
        value,
        iterable,
        body,
        empty,
    }))
}
