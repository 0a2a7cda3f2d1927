use crate::ast::Node;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::renderer::Renderer;
use crate::value::Value;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Variable bindings for a render
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: IndexMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `key`, returning the previous value if any
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.vars.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.vars.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.vars.iter()
    }

    /// Build a context from a JSON object; `null` gives an empty context
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            serde_json::Value::Null => Ok(Self::new()),
            other => Err(Error::type_error(format!(
                "Context must be built from a JSON object, got {}",
                Value::from(other).type_name()
            ))),
        }
    }

    /// Build a context from any value serializing to a map
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Self::from_json(serde_json::to_value(value)?)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = Context::new();
        context.extend(iter);
        context
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Context {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl From<IndexMap<String, Value>> for Context {
    fn from(vars: IndexMap<String, Value>) -> Self {
        Self { vars }
    }
}

impl<'a> IntoIterator for &'a Context {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

/// Build a [`Context`] from `key => value` pairs
///
/// ```
/// let ctx = tessera::context! { "name" => "World", "count" => 3 };
/// assert_eq!(ctx.len(), 2);
/// ```
#[macro_export]
macro_rules! context {
    () => {
        $crate::Context::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut context = $crate::Context::new();
        $( context.insert($key, $value); )+
        context
    }};
}

/// Compiled document shared by every handle to a template
///
/// Trees carry no engine handle, so the engine cache, parent links and
/// static includes never keep an engine alive.
pub struct TemplateTree {
    name: String,
    nodes: Vec<Node>,
    blocks: IndexMap<String, Vec<Node>>,
    parent: Option<Arc<TemplateTree>>,
}

impl TemplateTree {
    pub(crate) fn new(
        name: String,
        nodes: Vec<Node>,
        blocks: IndexMap<String, Vec<Node>>,
        parent: Option<Arc<TemplateTree>>,
    ) -> Self {
        Self {
            name,
            nodes,
            blocks,
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn block(&self, name: &str) -> Option<&[Node]> {
        self.blocks.get(name).map(Vec::as_slice)
    }

    pub fn block_names(&self) -> Vec<&str> {
        self.blocks.keys().map(String::as_str).collect()
    }

    pub fn parent(&self) -> Option<&Arc<TemplateTree>> {
        self.parent.as_ref()
    }

    /// `tree` and its `extends` ancestors, root ancestor first
    pub(crate) fn ancestry(tree: &Arc<TemplateTree>) -> Vec<Arc<TemplateTree>> {
        let mut chain = vec![Arc::clone(tree)];
        let mut current = tree;
        while let Some(parent) = current.parent() {
            chain.push(Arc::clone(parent));
            current = parent;
        }
        chain.reverse();
        chain
    }
}

impl fmt::Debug for TemplateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateTree")
            .field("name", &self.name)
            .field("nodes", &self.nodes.len())
            .field("blocks", &self.block_names())
            .field("parent", &self.parent().map(|p| p.name()))
            .finish()
    }
}

/// A compiled template bound to the engine that renders it
///
/// Cloning is cheap; clones share the same compiled tree.
#[derive(Clone)]
pub struct Template {
    tree: Arc<TemplateTree>,
    engine: Engine,
}

impl Template {
    pub(crate) fn from_tree(tree: Arc<TemplateTree>, engine: Engine) -> Self {
        Self { tree, engine }
    }

    pub(crate) fn tree(&self) -> &Arc<TemplateTree> {
        &self.tree
    }

    pub(crate) fn into_tree(self) -> Arc<TemplateTree> {
        self.tree
    }

    /// Name the template was compiled under; its directory anchors relative includes
    pub fn name(&self) -> &str {
        self.tree.name()
    }

    pub fn nodes(&self) -> &[Node] {
        self.tree.nodes()
    }

    pub fn block(&self, name: &str) -> Option<&[Node]> {
        self.tree.block(name)
    }

    /// Names of the blocks this template defines, in definition order
    pub fn block_names(&self) -> Vec<&str> {
        self.tree.block_names()
    }

    pub fn parent(&self) -> Option<Template> {
        self.tree
            .parent()
            .map(|parent| Template::from_tree(Arc::clone(parent), self.engine.clone()))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// This template and its `extends` ancestors, root ancestor first
    pub fn ancestry(&self) -> Vec<Template> {
        TemplateTree::ancestry(&self.tree)
            .into_iter()
            .map(|tree| Template::from_tree(tree, self.engine.clone()))
            .collect()
    }

    /// Render against `context`
    pub fn render(&self, context: &Context) -> Result<String> {
        self.render_nested(context.clone(), 0)
    }

    /// Render with `descendants` (base-most first) overriding this template's blocks
    ///
    /// The root ancestor's document is executed; each block renders the body
    /// from the most derived template that defines it.
    pub fn render_with_descendants(
        &self,
        descendants: &[Template],
        context: &Context,
    ) -> Result<String> {
        let mut chain = TemplateTree::ancestry(&self.tree);
        chain.extend(descendants.iter().map(|t| Arc::clone(&t.tree)));
        Renderer::new(&self.engine, chain, context.clone(), 0).run()
    }

    pub(crate) fn render_nested(&self, context: Context, depth: usize) -> Result<String> {
        Renderer::new(&self.engine, TemplateTree::ancestry(&self.tree), context, depth).run()
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("name", &self.name())
            .field("nodes", &self.nodes().len())
            .field("blocks", &self.block_names())
            .field("parent", &self.tree.parent().map(|p| p.name()))
            .finish()
    }
}
