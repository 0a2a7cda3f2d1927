//! `{% extends "parent.html" %}`

use crate::ast::TagNode;
use crate::error::Result;
use crate::lexer::{Token, TokenKind};
use crate::parser::Parser;

pub fn parse(doc: &mut Parser<'_>, start: &Token, args: &mut Parser<'_>) -> Result<TagNode> {
    if doc.has_parent() {
        return Err(doc.error_at(start, "This template already has a parent"));
    }

    let filename = args
        .match_type(TokenKind::String)
        .ok_or_else(|| args.error("Tag 'extends' requires a template filename as string"))?;
    if args.remaining() > 0 {
        return Err(args.error("Tag 'extends' only takes one argument"));
    }

    let parent = doc.compile_relative(&filename.value)?;
    doc.set_parent(parent);

    Ok(TagNode::Extends)
}
