//! `{% if expr %}...{% elif expr %}...{% else %}...{% endif %}`

use super::expect_no_args;
use crate::ast::{IfNode, TagNode};
use crate::error::Result;
use crate::lexer::Token;
use crate::parser::Parser;

pub fn parse(doc: &mut Parser<'_>, _start: &Token, args: &mut Parser<'_>) -> Result<TagNode> {
    if args.count() == 0 {
        return Err(args.error("Tag 'if' requires a condition"));
    }
    let mut condition = args.parse_expression()?;
    if args.remaining() > 0 {
        return Err(args.error("Tag 'if' takes a single expression"));
    }

    let mut branches = Vec::new();
    let mut otherwise = None;

    loop {
        let (body, mut end) = doc.wrap_until_tag(&["elif", "else", "endif"])?;
        branches.push((condition, body));

        match end.tag_name() {
            Some("elif") => {
                if end.count() == 0 {
                    return Err(end.error("Tag 'elif' requires a condition"));
                }
                condition = end.parse_expression()?;
                if end.remaining() > 0 {
                    return Err(end.error("Tag 'elif' takes a single expression"));
                }
            }
            Some("else") => {
                expect_no_args(&end)?;
                let (body, end) = doc.wrap_until_tag(&["endif"])?;
                expect_no_args(&end)?;
                otherwise = Some(body);
                break;
            }
            _ => {
                expect_no_args(&end)?;
                break;
            }
        }
    }

    Ok(TagNode::If(IfNode {
        branches,
        otherwise,
    }))
}
