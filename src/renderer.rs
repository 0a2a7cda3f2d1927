//! Tree-walking renderer
//!
//! A `Renderer` is created per render. It owns the variable bindings, the
//! block resolution chain (base template first, most derived last) and the
//! output buffer.

use crate::ast::{
    BinaryOp, Expr, ForNode, IfNode, IncludeNode, IncludeSource, Node, PathPart, TagNode,
    UnaryOp, Variable,
};
use crate::engine::Engine;
use crate::error::{Error, ErrorContext, OptionExt, Result};
use crate::loader;
use crate::template::{Context, Template, TemplateTree};
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;

pub struct Renderer<'t> {
    engine: &'t Engine,
    chain: Vec<Arc<TemplateTree>>,
    context: Context,
    depth: usize,
    output: String,
}

impl<'t> Renderer<'t> {
    pub(crate) fn new(
        engine: &'t Engine,
        chain: Vec<Arc<TemplateTree>>,
        context: Context,
        depth: usize,
    ) -> Self {
        Self {
            engine,
            chain,
            context,
            depth,
            output: String::new(),
        }
    }

    /// Execute the base template of the chain and return the output
    pub(crate) fn run(mut self) -> Result<String> {
        let root = self
            .chain
            .first()
            .cloned()
            .or_unresolved("Cannot render an empty template chain")?;
        self.render_nodes(root.nodes())?;
        Ok(self.output)
    }

    pub fn engine(&self) -> &'t Engine {
        self.engine
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Current include nesting, 0 for the template being rendered
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn write(&mut self, text: &str) {
        self.output.push_str(text);
    }

    pub fn render_nodes(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            self.render_node(node)?;
        }
        Ok(())
    }

    fn render_node(&mut self, node: &Node) -> Result<()> {
        match node {
            Node::Html(text) => self.write(text),
            Node::Output(expr) => {
                let value = self.evaluate(expr)?;
                self.write(&value.to_string());
            }
            Node::Tag(tag) => self.render_tag(tag)?,
        }
        Ok(())
    }

    fn render_tag(&mut self, tag: &TagNode) -> Result<()> {
        match tag {
            TagNode::Block { name } => self.render_block(name),
            TagNode::Extends => Ok(()),
            TagNode::Include(node) => self.render_include(node),
            TagNode::If(node) => self.render_if(node),
            TagNode::For(node) => self.render_for(node),
            TagNode::Custom(custom) => custom.execute(self),
        }
    }

    /// Render the most derived definition of block `name`
    fn render_block(&mut self, name: &str) -> Result<()> {
        let template = self
            .chain
            .iter()
            .rev()
            .find(|template| template.block(name).is_some())
            .cloned();
        let body = template
            .as_deref()
            .and_then(|template| template.block(name))
            .ok_or_else(|| {
                Error::resolution(format!(
                    "Block '{}' not found in template chain [{}]",
                    name,
                    self.chain
                        .iter()
                        .map(|t| t.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?;
        self.render_nodes(body)
    }

    fn render_include(&mut self, node: &IncludeNode) -> Result<()> {
        let depth = self.depth + 1;
        let max_depth = self.engine.config().max_include_depth;

        let template = match &node.source {
            IncludeSource::Static(tree) => {
                Template::from_tree(Arc::clone(tree), self.engine.clone())
            }
            IncludeSource::Deferred(expr) => {
                let filename = self.evaluate(expr)?.to_string();
                if filename.is_empty() {
                    return Err(Error::resolution(format!(
                        "Filename for 'include' in '{}' evaluated to an empty string",
                        node.origin
                    )));
                }
                let resolved = loader::resolve_relative(&node.origin, &filename);
                log::trace!("Deferred include of '{}' from '{}'", resolved, node.origin);
                if depth > max_depth {
                    return Err(Error::resolution(format!(
                        "Maximum include depth of {} exceeded while including '{}'",
                        max_depth, resolved
                    )));
                }
                self.engine
                    .load_template(&resolved)
                    .with_context(|| format!("Including '{}' from '{}'", resolved, node.origin))?
            }
        };

        if depth > max_depth {
            return Err(Error::resolution(format!(
                "Maximum include depth of {} exceeded while including '{}'",
                max_depth,
                template.name()
            )));
        }

        let mut context = if node.only {
            Context::new()
        } else {
            self.context.clone()
        };
        for (key, expr) in &node.with {
            context.insert(key.clone(), self.evaluate(expr)?);
        }

        let output = template.render_nested(context, depth)?;
        self.write(&output);
        Ok(())
    }

    fn render_if(&mut self, node: &IfNode) -> Result<()> {
        for (condition, body) in &node.branches {
            if self.evaluate(condition)?.is_true() {
                return self.render_nodes(body);
            }
        }
        match &node.otherwise {
            Some(body) => self.render_nodes(body),
            None => Ok(()),
        }
    }

    fn render_for(&mut self, node: &ForNode) -> Result<()> {
        let iterable = self.evaluate(&node.iterable)?;
        let iterates_map = iterable.is_map();

        // (index or map key, item or map value)
        let items: Vec<(Value, Value)> = match iterable {
            Value::Nil => Vec::new(),
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| (Value::from(i), item))
                .collect(),
            Value::Map(map) => map
                .into_iter()
                .map(|(key, value)| (Value::String(key), value))
                .collect(),
            Value::String(s) => s
                .chars()
                .enumerate()
                .map(|(i, c)| (Value::from(i), Value::from(c)))
                .collect(),
            other => {
                return Err(Error::type_error(format!(
                    "Cannot iterate over a value of type {}",
                    other.type_name()
                )))
            }
        };

        if items.is_empty() {
            if let Some(empty) = &node.empty {
                self.render_nodes(empty)?;
            }
            return Ok(());
        }

        let mut names = vec![node.key.clone()];
        names.extend(node.value.clone());
        names.push("forloop".to_string());
        let saved: Vec<(String, Option<Value>)> = names
            .into_iter()
            .map(|name| {
                let previous = self.context.get(&name).cloned();
                (name, previous)
            })
            .collect();

        let len = items.len();
        let mut result = Ok(());
        for (i, (key, item)) in items.into_iter().enumerate() {
            match &node.value {
                Some(value_name) => {
                    self.context.insert(node.key.clone(), key);
                    self.context.insert(value_name.clone(), item);
                }
                None if iterates_map => {
                    self.context.insert(node.key.clone(), key);
                }
                None => {
                    self.context.insert(node.key.clone(), item);
                }
            }
            self.context.insert("forloop".to_string(), forloop(i, len));

            result = self.render_nodes(&node.body);
            if result.is_err() {
                break;
            }
        }

        for (name, previous) in saved {
            match previous {
                Some(value) => {
                    self.context.insert(name, value);
                }
                None => {
                    self.context.remove(&name);
                }
            }
        }

        result
    }

    // Expressions

    /// Evaluate an expression against the current bindings
    pub fn evaluate(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(variable) => Ok(self.resolve_variable(variable)),
            Expr::Filtered { base, filters } => {
                let mut value = self.evaluate(base)?;
                for call in filters {
                    let param = match &call.arg {
                        Some(arg) => self.evaluate(arg)?,
                        None => Value::Nil,
                    };
                    let filter = self.engine.filters().get(&call.name).ok_or_else(|| {
                        Error::registry(format!(
                            "Filter '{}' does not exist (line {}, column {})",
                            call.name, call.token.line, call.token.column
                        ))
                    })?;
                    value = filter(&value, &param)?;
                }
                Ok(value)
            }
            Expr::Unary { op, operand } => {
                let value = self.evaluate(operand)?;
                Ok(match op {
                    UnaryOp::Not => value.negate(),
                    UnaryOp::Negative => value.negative(),
                    UnaryOp::Positive => value,
                })
            }
            Expr::Binary {
                left, op, right, ..
            } => {
                // Both sides are always evaluated, `and`/`or` included
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(apply_binary(*op, &left, &right))
            }
        }
    }

    fn resolve_variable(&self, variable: &Variable) -> Value {
        let mut parts = variable.parts.iter();
        let mut current = match parts.next() {
            Some(PathPart::Key(name)) => self.context.get(name).cloned().unwrap_or_default(),
            _ => return Value::Nil,
        };

        for part in parts {
            current = match part {
                PathPart::Key(key) => current.get(key),
                PathPart::Index(index) => current.index(*index),
            };
            if current.is_nil() {
                break;
            }
        }

        current
    }
}

fn apply_binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Or => Value::Bool(left.is_true() || right.is_true()),
        BinaryOp::And => Value::Bool(left.is_true() && right.is_true()),
        BinaryOp::Equal => Value::Bool(left.equal_value_to(right)),
        BinaryOp::NotEqual => Value::Bool(!left.equal_value_to(right)),
        BinaryOp::Less => Value::Bool(left.integer() < right.integer()),
        BinaryOp::LessEqual => Value::Bool(left.integer() <= right.integer()),
        BinaryOp::Greater => Value::Bool(left.integer() > right.integer()),
        BinaryOp::GreaterEqual => Value::Bool(left.integer() >= right.integer()),
        BinaryOp::In => Value::Bool(right.contains(left)),
        BinaryOp::Add => Value::Integer(left.integer().wrapping_add(right.integer())),
        BinaryOp::Subtract => Value::Integer(left.integer().wrapping_sub(right.integer())),
        BinaryOp::Multiply => Value::Integer(left.integer().wrapping_mul(right.integer())),
        BinaryOp::Power => Value::Float(left.float().powf(right.float())),
    }
}

fn forloop(index: usize, len: usize) -> Value {
    let mut map = IndexMap::new();
    map.insert("counter".to_string(), Value::from(index + 1));
    map.insert("counter0".to_string(), Value::from(index));
    map.insert("revcounter".to_string(), Value::from(len - index));
    map.insert("revcounter0".to_string(), Value::from(len - index - 1));
    map.insert("first".to_string(), Value::Bool(index == 0));
    map.insert("last".to_string(), Value::Bool(index + 1 == len));
    Value::Map(map)
}
