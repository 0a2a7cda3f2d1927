use crate::ast::TagNode;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::filters::FilterRegistry;
use crate::lexer::{self, Token};
use crate::loader::{FileSystemLoader, TemplateLoader};
use crate::parser::Parser;
use crate::tags::TagRegistry;
use crate::template::{Template, TemplateTree};
use crate::value::Value;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Compiled trees by resolved name
///
/// Entries hold no engine handle, so a cache never keeps its engine alive.
struct TemplateCache {
    templates: RwLock<HashMap<String, Arc<TemplateTree>>>,
    enabled: bool,
}

impl TemplateCache {
    fn new(enabled: bool) -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
            enabled,
        }
    }

    fn get(&self, name: &str) -> Option<Arc<TemplateTree>> {
        if !self.enabled {
            return None;
        }
        match self.templates.read() {
            Ok(cache) => cache.get(name).cloned(),
            Err(_) => {
                log::warn!("Template cache lock poisoned, compiling '{}' uncached", name);
                None
            }
        }
    }

    fn insert(&self, name: &str, tree: &Arc<TemplateTree>) {
        if !self.enabled {
            return;
        }
        match self.templates.write() {
            Ok(mut cache) => {
                log::debug!("Caching template '{}'", name);
                cache.insert(name.to_string(), Arc::clone(tree));
            }
            Err(_) => log::warn!("Template cache lock poisoned, not caching '{}'", name),
        }
    }

    fn clear(&self) {
        if let Ok(mut cache) = self.templates.write() {
            cache.clear();
        }
    }

    fn len(&self) -> usize {
        self.templates.read().map(|cache| cache.len()).unwrap_or(0)
    }
}

/// Collects tags, filters, loader and settings for an [`Engine`]
pub struct EngineBuilder {
    config: EngineConfig,
    tags: TagRegistry,
    filters: FilterRegistry,
    loader: Option<Box<dyn TemplateLoader>>,
}

impl EngineBuilder {
    /// Builder with the core tags and the built-in filter library
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            tags: TagRegistry::with_builtins(),
            filters: FilterRegistry::with_builtins(),
            loader: None,
        }
    }

    /// Builder with the core tags and no filters
    pub fn empty() -> Self {
        Self {
            filters: FilterRegistry::new(),
            ..Self::new()
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Loader used by `compile_file`, `extends` and `include`
    ///
    /// Defaults to a `FileSystemLoader` rooted at `config.directory`.
    pub fn loader(mut self, loader: impl TemplateLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    /// Register a tag parser under `name`
    pub fn register_tag<F>(&mut self, name: &str, parser: F) -> Result<&mut Self>
    where
        F: Fn(&mut Parser<'_>, &Token, &mut Parser<'_>) -> Result<TagNode> + Send + Sync + 'static,
    {
        self.tags.register(name, Arc::new(parser))?;
        Ok(self)
    }

    /// Register a filter under `name`
    pub fn register_filter<F>(&mut self, name: &str, filter: F) -> Result<&mut Self>
    where
        F: Fn(&Value, &Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.filters.register(name, Arc::new(filter))?;
        Ok(self)
    }

    pub fn build(self) -> Engine {
        let loader = self
            .loader
            .unwrap_or_else(|| {
                Box::new(FileSystemLoader::new(&self.config.directory)) as Box<dyn TemplateLoader>
            });

        log::debug!(
            "Template engine built with {} tags and {} filters",
            self.tags.names().len(),
            self.filters.names().len()
        );

        Engine {
            inner: Arc::new(EngineInner {
                cache: TemplateCache::new(self.config.cache_enabled),
                config: self.config,
                tags: self.tags,
                filters: self.filters,
                loader,
            }),
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiles templates; shared, immutable registries and loader
///
/// Cloning is cheap. Templates handed out keep their engine alive; the
/// engine's own cache does not.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    tags: TagRegistry,
    filters: FilterRegistry,
    loader: Box<dyn TemplateLoader>,
    cache: TemplateCache,
}

impl Engine {
    /// Engine with default settings, core tags and built-in filters
    pub fn new() -> Self {
        EngineBuilder::new().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        EngineBuilder::new().config(config).build()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.inner.tags
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.inner.filters
    }

    pub fn loader(&self) -> &dyn TemplateLoader {
        self.inner.loader.as_ref()
    }

    /// Compile `source` under `name`
    ///
    /// `name` identifies the template in errors and anchors relative
    /// `extends`/`include` paths. The result is never cached.
    pub fn compile(&self, name: &str, source: &str) -> Result<Template> {
        self.compile_source(name, source, &[])
    }

    /// Load `path` through the loader and compile it
    pub fn compile_file(&self, path: &str) -> Result<Template> {
        let name = self.with_extension(path);
        self.load_template(&name)
    }

    /// Load and compile template `name`, going through the cache when enabled
    pub fn load_template(&self, name: &str) -> Result<Template> {
        self.compile_nested(name, &[])
    }

    /// Compile `name` as a dependency of the templates in `loading`
    pub(crate) fn compile_nested(&self, name: &str, loading: &[String]) -> Result<Template> {
        if loading.iter().any(|loaded| loaded == name) {
            let mut cycle: Vec<&str> = loading.iter().map(String::as_str).collect();
            cycle.push(name);
            return Err(Error::resolution(format!(
                "Circular template reference: {}",
                cycle.join(" -> ")
            )));
        }

        if let Some(tree) = self.inner.cache.get(name) {
            log::debug!("Template cache hit for '{}'", name);
            return Ok(Template::from_tree(tree, self.clone()));
        }

        let source = self.inner.loader.load(name)?;
        let template = self.compile_source(name, &source, loading)?;
        self.inner.cache.insert(name, template.tree());
        Ok(template)
    }

    fn compile_source(&self, name: &str, source: &str, loading: &[String]) -> Result<Template> {
        let mut stack = loading.to_vec();
        stack.push(name.to_string());

        let tokens = lexer::tokenize(name, source)?;
        let mut parser = Parser::new(self, name, &tokens, &stack);
        let nodes = parser.parse_document()?;
        let (blocks, parent) = parser.into_parts();

        log::debug!(
            "Compiled template '{}' ({} tokens, {} nodes, {} blocks)",
            name,
            tokens.len(),
            nodes.len(),
            blocks.len()
        );

        let tree = TemplateTree::new(name.to_string(), nodes, blocks, parent);
        Ok(Template::from_tree(Arc::new(tree), self.clone()))
    }

    fn with_extension(&self, path: &str) -> String {
        let extension = self.inner.config.extension.trim_start_matches('.');
        if extension.is_empty() || Path::new(path).extension().is_some() {
            path.to_string()
        } else {
            format!("{}.{}", path, extension)
        }
    }

    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Number of cached templates
    pub fn cached_templates(&self) -> usize {
        self.inner.cache.len()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.inner.config)
            .field("tags", &self.inner.tags)
            .field("filters", &self.inner.filters)
            .field("cached_templates", &self.cached_templates())
            .finish()
    }
}

static DEFAULT_ENGINE: Lazy<Engine> = Lazy::new(|| {
    let config = EngineConfig::from_env().unwrap_or_else(|e| {
        log::warn!("Ignoring template environment overrides: {}", e);
        EngineConfig::default()
    });
    EngineBuilder::new().config(config).build()
});

/// Process-wide engine with the built-in tags and filters
///
/// Settings come from `TESSERA_*` environment variables on first use.
pub fn default_engine() -> &'static Engine {
    &DEFAULT_ENGINE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use crate::loader::MemoryLoader;

    #[test]
    fn test_compile_and_render() {
        let engine = Engine::new();
        let template = engine.compile("hello", "Hello {{ name }}!").unwrap();
        assert_eq!(template.name(), "hello");
        assert_eq!(
            template.render(&context! { "name" => "World" }).unwrap(),
            "Hello World!"
        );
    }

    #[test]
    fn test_builder_registration() {
        let mut builder = EngineBuilder::empty();
        builder
            .register_filter("shout", |v, _| Ok(Value::from(format!("{}!", v))))
            .unwrap();
        assert!(matches!(
            builder.register_filter("shout", |v, _| Ok(v.clone())),
            Err(Error::Registry(_))
        ));
        assert!(matches!(
            builder.register_tag("block", |_, _, _| Ok(TagNode::Extends)),
            Err(Error::Registry(_))
        ));

        let engine = builder.build();
        assert!(engine.filters().get("upper").is_none());
        let template = engine.compile("t", "{{ 'hey'|shout }}").unwrap();
        assert_eq!(template.render(&context! {}).unwrap(), "hey!");
    }

    #[test]
    fn test_compile_file_with_extension_and_cache() {
        let loader = MemoryLoader::new().with("pages/home.html", "home");
        let config = EngineConfig {
            cache_enabled: true,
            extension: "html".into(),
            ..EngineConfig::default()
        };
        let engine = EngineBuilder::new().config(config).loader(loader).build();

        let first = engine.compile_file("pages/home").unwrap();
        assert_eq!(first.name(), "pages/home.html");
        assert_eq!(engine.cached_templates(), 1);

        let second = engine.compile_file("pages/home.html").unwrap();
        assert_eq!(second.render(&context! {}).unwrap(), "home");

        engine.clear_cache();
        assert_eq!(engine.cached_templates(), 0);
    }

    #[test]
    fn test_cached_templates_do_not_keep_engine_alive() {
        let loader = MemoryLoader::new()
            .with("base.html", "{% block a %}{% endblock %}")
            .with("page.html", "{% extends 'base.html' %}{% block a %}{% include 'part.html' %}{% endblock %}")
            .with("part.html", "part");
        let config = EngineConfig {
            cache_enabled: true,
            ..EngineConfig::default()
        };
        let engine = EngineBuilder::new().config(config).loader(loader).build();
        let weak = Arc::downgrade(&engine.inner);

        let template = engine.compile_file("page.html").unwrap();
        assert_eq!(engine.cached_templates(), 3);
        drop(engine);

        // A handed out template still renders through its engine
        assert_eq!(template.render(&context! {}).unwrap(), "part");
        assert!(weak.upgrade().is_some());

        drop(template);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_cache_disabled_by_default() {
        let loader = MemoryLoader::new().with("a.html", "a");
        let engine = EngineBuilder::new().loader(loader).build();
        engine.compile_file("a.html").unwrap();
        assert_eq!(engine.cached_templates(), 0);
    }

    #[test]
    fn test_circular_references() {
        let loader = MemoryLoader::new()
            .with("a.html", "{% include 'b.html' %}")
            .with("b.html", "{% include 'a.html' %}")
            .with("self.html", "{% extends 'self.html' %}");
        let engine = EngineBuilder::new().loader(loader).build();

        match engine.compile_file("a.html") {
            Err(Error::Resolution(msg)) => assert!(msg.contains("a.html -> b.html -> a.html")),
            other => panic!("Expected circular reference error, got {:?}", other),
        }
        assert!(matches!(
            engine.compile_file("self.html"),
            Err(Error::Resolution(_))
        ));
    }

    #[test]
    fn test_default_engine_is_shared() {
        let a = default_engine() as *const Engine;
        let b = default_engine() as *const Engine;
        assert_eq!(a, b);
        assert!(default_engine().filters().get("upper").is_some());
    }
}
