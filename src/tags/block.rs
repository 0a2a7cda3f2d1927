//! `{% block name %}...{% endblock [name] %}`

use crate::ast::TagNode;
use crate::error::Result;
use crate::lexer::{Token, TokenKind};
use crate::parser::Parser;

pub fn parse(doc: &mut Parser<'_>, _start: &Token, args: &mut Parser<'_>) -> Result<TagNode> {
    let name = args
        .match_type(TokenKind::Identifier)
        .ok_or_else(|| args.error("Tag 'block' requires an identifier"))?;
    if args.remaining() > 0 {
        return Err(args.error("Tag 'block' takes only one argument (an identifier)"));
    }

    let (body, mut end_args) = doc.wrap_until_tag(&["endblock"])?;

    if end_args.count() > 0 {
        match end_args.match_type(TokenKind::Identifier) {
            Some(end_name) if end_name.value == name.value => {}
            Some(end_name) => {
                return Err(end_args.error_at(
                    end_name,
                    format!(
                        "Name for 'endblock' must equal the block's name ('{}' != '{}')",
                        name.value, end_name.value
                    ),
                ))
            }
            None => return Err(end_args.error("Name for 'endblock' must be an identifier")),
        }
        if end_args.remaining() > 0 {
            return Err(end_args.error("Either no or only one argument (identifier) allowed for 'endblock'"));
        }
    }

    doc.define_block(name, body)?;

    Ok(TagNode::Block {
        name: name.value.clone(),
    })
}

#[cfg(test)]
mod tests {
    use crate::context;
    use crate::engine::Engine;
    use crate::error::Error;

    #[test]
    fn test_block_renders_own_body() {
        let engine = Engine::new();
        let template = engine
            .compile("page", "<{% block title %}Hi {{ who }}{% endblock title %}>")
            .unwrap();
        assert_eq!(template.render(&context! { "who" => "you" }).unwrap(), "<Hi you>");
        assert_eq!(template.block_names(), vec!["title"]);
    }

    #[test]
    fn test_nested_blocks() {
        let engine = Engine::new();
        let template = engine
            .compile(
                "page",
                "{% block outer %}[{% block inner %}in{% endblock %}]{% endblock %}",
            )
            .unwrap();
        assert_eq!(template.render(&context! {}).unwrap(), "[in]");
        assert_eq!(template.block_names(), vec!["inner", "outer"]);
    }

    #[test]
    fn test_block_errors() {
        let engine = Engine::new();
        let cases = [
            "{% block %}{% endblock %}",
            "{% block a b %}{% endblock %}",
            "{% block a %}{% endblock b %}",
            "{% block a %}{% endblock a b %}",
            "{% block a %}{% endblock 'a' %}",
            "{% block a %}x{% endblock %}{% block a %}y{% endblock %}",
            "{% block a %}never closed",
        ];
        for source in cases {
            match engine.compile("page", source) {
                Err(Error::Syntax { .. }) => {}
                other => panic!("{} should be a syntax error, got {:?}", source, other),
            }
        }
    }
}
