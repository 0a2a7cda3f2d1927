use tessera::{context, Engine, EngineBuilder, Error, MemoryLoader};

fn engine() -> Engine {
    let loader = MemoryLoader::new()
        .with(
            "base.html",
            "<title>{% block title %}Site{% endblock %}</title>\
             <main>{% block content %}{% endblock %}</main>\
             <footer>{% block footer %}(c) {{ year }}{% endblock footer %}</footer>",
        )
        .with(
            "layouts/page.html",
            "{% extends '../base.html' %}\
             {% block title %}Page{% endblock %}\
             {% block content %}<article>{% block body %}empty{% endblock %}</article>{% endblock %}",
        )
        .with(
            "pages/about.html",
            "{% extends '/layouts/page.html' %}ignored text\
             {% block body %}About {{ name }}{% endblock %}",
        );
    EngineBuilder::new().loader(loader).build()
}

#[test]
fn test_single_level_inheritance() {
    let engine = engine();
    let template = engine.compile_file("layouts/page.html").unwrap();
    assert_eq!(
        template.render(&context! { "year" => 2024 }).unwrap(),
        "<title>Page</title><main><article>empty</article></main><footer>(c) 2024</footer>"
    );
}

#[test]
fn test_multi_level_inheritance_uses_most_derived_block() {
    let engine = engine();
    let template = engine.compile_file("pages/about.html").unwrap();

    let ancestry = template.ancestry();
    let names: Vec<&str> = ancestry.iter().map(|t| t.name()).collect();
    assert_eq!(names, vec!["base.html", "layouts/page.html", "pages/about.html"]);

    assert_eq!(
        template
            .render(&context! { "year" => 2024, "name" => "us" })
            .unwrap(),
        "<title>Page</title><main><article>About us</article></main><footer>(c) 2024</footer>"
    );
}

#[test]
fn test_child_content_outside_blocks_is_not_rendered() {
    let engine = engine();
    let output = engine
        .compile_file("pages/about.html")
        .unwrap()
        .render(&context! {})
        .unwrap();
    assert!(!output.contains("ignored text"));
}

#[test]
fn test_block_definitions_are_unique() {
    let err = Engine::new()
        .compile("dup.html", "{% block a %}{% endblock %}{% block a %}{% endblock %}")
        .unwrap_err();
    assert!(matches!(err, Error::Syntax { .. }));
}

#[test]
fn test_endblock_name_must_match() {
    let err = Engine::new()
        .compile("bad.html", "{% block a %}x{% endblock b %}")
        .unwrap_err();
    assert!(err.is_syntax_error());
}

#[test]
fn test_extends_twice_is_rejected() {
    let loader = MemoryLoader::new().with("base.html", "base");
    let engine = EngineBuilder::new().loader(loader).build();
    let err = engine
        .compile("child.html", "{% extends 'base.html' %}{% extends 'base.html' %}")
        .unwrap_err();
    assert!(err.is_syntax_error());
}

#[test]
fn test_missing_parent_is_resolution_error() {
    let engine = EngineBuilder::new().loader(MemoryLoader::new()).build();
    let err = engine
        .compile("child.html", "{% extends 'nowhere.html' %}")
        .unwrap_err();
    assert!(matches!(err.root_cause(), Error::Resolution(_)));
}

#[test]
fn test_blocks_can_be_rendered_from_descendants() {
    let engine = Engine::new();
    let base = engine
        .compile("base", "[{% block a %}base{% endblock %}]")
        .unwrap();
    let child = engine
        .compile("child", "{% block a %}child {{ v }}{% endblock %}")
        .unwrap();
    assert_eq!(
        base.render_with_descendants(&[child], &context! { "v" => 1 })
            .unwrap(),
        "[child 1]"
    );
}
