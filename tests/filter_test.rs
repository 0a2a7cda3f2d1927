use chrono::{TimeZone, Utc};
use serde_json::json;
use tessera::{context, Context, Engine, EngineBuilder, Error, Value};

fn render(source: &str, ctx: &Context) -> String {
    Engine::new()
        .compile("filters.html", source)
        .expect("Failed to compile template")
        .render(ctx)
        .expect("Failed to render template")
}

#[test]
fn test_filter_chains() {
    let ctx = context! { "name" => "  ada lovelace " };
    assert_eq!(render("{{ name|title|cut:' ' }}", &ctx), "AdaLovelace");
    assert_eq!(render("{{ name|wordcount|add:1 }}", &ctx), "3");
    assert_eq!(render("{{ name|upper|truncatechars:6 }}", &ctx), "  A...");
}

#[test]
fn test_filter_arguments_from_context() {
    let ctx = context! { "items" => vec!["a", "b", "c"], "sep" => " / ", "n" => 2 };
    assert_eq!(render("{{ items|join:sep }}", &ctx), "a / b / c");
    assert_eq!(render("{{ items|length_is:3 }}", &ctx), "True");
    assert_eq!(render("{{ 'abcdef'|truncatechars:n }}", &ctx), "ab");
}

#[test]
fn test_escaping_is_explicit() {
    let ctx = context! { "html" => "<b>\"hi\"</b>" };
    assert_eq!(render("{{ html }}", &ctx), "<b>\"hi\"</b>");
    assert_eq!(render("{{ html|escape }}", &ctx), "&lt;b&gt;&quot;hi&quot;&lt;/b&gt;");
    assert_eq!(render("{{ html|e }}", &ctx), "&lt;b&gt;&quot;hi&quot;&lt;/b&gt;");
    assert_eq!(render("{{ html|safe }}", &ctx), "<b>\"hi\"</b>");
    assert_eq!(render("{{ html|striptags }}", &ctx), "\"hi\"");
}

#[test]
fn test_filters_inside_control_flow() {
    let ctx = Context::from_json(json!({"users": ["amy", "bob"]})).unwrap();
    assert_eq!(
        render(
            "{% for u in users %}{{ u|capfirst }}{% if not forloop.last %}, {% endif %}{% endfor %}",
            &ctx
        ),
        "Amy, Bob"
    );
    assert_eq!(
        render("{% if users|length > 1 %}{{ users|length }} user{{ users|length|pluralize }}{% endif %}", &ctx),
        "2 users"
    );
}

#[test]
fn test_default_filters() {
    let ctx = context! { "empty" => "", "zero" => 0 };
    assert_eq!(render("{{ empty|default:'n/a' }}", &ctx), "n/a");
    assert_eq!(render("{{ missing|default_if_none:'none' }}", &ctx), "none");
    assert_eq!(render("{{ zero|default_if_none:'none' }}", &ctx), "0");
    assert_eq!(render("{{ missing|yesno:'on,off,unknown' }}", &ctx), "unknown");
}

#[test]
fn test_date_filter_with_time_values() {
    let moment = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 58).unwrap();
    let ctx = context! { "now" => moment };
    assert_eq!(render("{{ now|date }}", &ctx), "2023-12-31");
    assert_eq!(render("{{ now|date:'%d/%m' }} {{ now|time:'%H:%M' }}", &ctx), "31/12 23:59");

    let err = Engine::new()
        .compile("t", "{{ 'yesterday'|date }}")
        .unwrap()
        .render(&context! {})
        .unwrap_err();
    assert!(matches!(err, Error::Type(_)));
}

#[test]
fn test_custom_filters() {
    let mut builder = EngineBuilder::new();
    builder
        .register_filter("repeat", |value, times| {
            let n = usize::try_from(times.integer()).unwrap_or(0);
            Ok(Value::from(value.to_string().repeat(n)))
        })
        .unwrap()
        .register_filter("fail", |_, _| Err(Error::type_error("always fails")))
        .unwrap();
    let engine = builder.build();

    let template = engine.compile("t", "{{ 'ab'|repeat:3|upper }}").unwrap();
    assert_eq!(template.render(&context! {}).unwrap(), "ABABAB");

    let template = engine.compile("t", "{{ 1|fail }}").unwrap();
    assert!(matches!(template.render(&context! {}), Err(Error::Type(_))));
}

#[test]
fn test_unknown_filter_fails_at_render() {
    let template = Engine::new().compile("t", "{% if false %}{{ x|nope }}{% endif %}").unwrap();
    assert_eq!(template.render(&context! {}).unwrap(), "");

    let template = Engine::new().compile("t", "{{ x|nope }}").unwrap();
    assert!(matches!(template.render(&context! {}), Err(Error::Registry(_))));
}

#[test]
fn test_empty_engine_has_no_filters() {
    let engine = EngineBuilder::empty().build();
    let template = engine.compile("t", "{{ 'x'|upper }}").unwrap();
    assert!(matches!(template.render(&context! {}), Err(Error::Registry(_))));
}
