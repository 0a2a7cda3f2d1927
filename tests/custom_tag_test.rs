use tessera::ast::Expr;
use tessera::lexer::TokenKind;
use tessera::prelude::*;
use tessera::{Node, Token};

/// `{% set name = expr %}`
#[derive(Debug)]
struct SetTag {
    name: String,
    value: Expr,
}

impl CustomTag for SetTag {
    fn execute(&self, renderer: &mut Renderer<'_>) -> Result<()> {
        let value = renderer.evaluate(&self.value)?;
        renderer.context_mut().insert(self.name.clone(), value);
        Ok(())
    }
}

fn parse_set(_doc: &mut Parser<'_>, _tag: &Token, args: &mut Parser<'_>) -> Result<TagNode> {
    let name = args
        .match_type(TokenKind::Identifier)
        .ok_or_else(|| args.error("Tag 'set' expects a variable name"))?;
    if args.match_symbol("=").is_none() {
        return Err(args.error("Tag 'set' expects '=' after the variable name"));
    }
    let value = args.parse_expression()?;

    Ok(TagNode::Custom(std::sync::Arc::new(SetTag {
        name: name.value.clone(),
        value,
    })))
}

/// `{% repeat n %}...{% endrepeat %}`
#[derive(Debug)]
struct RepeatTag {
    times: Expr,
    body: Vec<Node>,
}

impl CustomTag for RepeatTag {
    fn execute(&self, renderer: &mut Renderer<'_>) -> Result<()> {
        let times = renderer.evaluate(&self.times)?.integer();
        for _ in 0..times.max(0) {
            renderer.render_nodes(&self.body)?;
        }
        Ok(())
    }
}

fn parse_repeat(doc: &mut Parser<'_>, _tag: &Token, args: &mut Parser<'_>) -> Result<TagNode> {
    let times = args.parse_expression()?;
    let (body, end) = doc.wrap_until_tag(&["endrepeat"])?;
    if end.remaining() > 0 {
        return Err(end.error("Tag 'endrepeat' takes no arguments"));
    }

    Ok(TagNode::Custom(std::sync::Arc::new(RepeatTag { times, body })))
}

fn engine() -> Engine {
    let mut builder = EngineBuilder::new();
    builder
        .register_tag("set", parse_set)
        .unwrap()
        .register_tag("repeat", parse_repeat)
        .unwrap();
    builder.build()
}

#[test]
fn test_custom_tag_mutates_context() {
    let template = engine()
        .compile("t", "{% set total = price * qty %}{{ total }}")
        .unwrap();
    assert_eq!(
        template.render(&context! { "price" => 3, "qty" => 4 }).unwrap(),
        "12"
    );
}

#[test]
fn test_custom_tag_with_body() {
    let template = engine()
        .compile("t", "{% repeat n %}[{{ x }}]{% endrepeat %}")
        .unwrap();
    assert_eq!(
        template.render(&context! { "n" => 3, "x" => "a" }).unwrap(),
        "[a][a][a]"
    );
    assert_eq!(template.render(&context! { "n" => -1 }).unwrap(), "");
}

#[test]
fn test_custom_tags_inside_builtin_tags() {
    let template = engine()
        .compile(
            "t",
            "{% for i in items %}{% repeat i %}*{% endrepeat %};{% endfor %}",
        )
        .unwrap();
    assert_eq!(
        template.render(&context! { "items" => vec![1, 2] }).unwrap(),
        "*;**;"
    );
}

#[test]
fn test_custom_tag_errors() {
    let engine = engine();
    assert!(engine.compile("t", "{% set = 1 %}").is_err());
    assert!(engine.compile("t", "{% repeat 2 %}never closed").is_err());
    assert!(matches!(
        engine.compile("t", "{% set a = 1 extra %}"),
        Err(Error::Syntax { .. })
    ));
}

#[test]
fn test_unknown_and_duplicate_tags() {
    assert!(matches!(
        Engine::new().compile("t", "{% set a = 1 %}"),
        Err(Error::Registry(_))
    ));

    let mut builder = EngineBuilder::new();
    assert!(matches!(
        builder.register_tag("for", parse_set),
        Err(Error::Registry(_))
    ));
}
