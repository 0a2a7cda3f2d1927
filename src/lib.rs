//! Tessera - a Django-syntax template engine
//!
//! Tessera compiles text templates into a tree once and renders them many
//! times against a [`Context`]:
//! - `{{ expression|filter:arg }}` output with a small expression language
//! - `block`/`extends` inheritance, `include` with `with`/`only`
//! - `if`/`elif`/`else` and `for ... empty` control flow
//! - user-registered tags and filters through [`EngineBuilder`]
//!
//! ```
//! use tessera::{context, Engine};
//!
//! let engine = Engine::new();
//! let template = engine.compile("hello.html", "Hello {{ name|upper }}!").unwrap();
//! assert_eq!(template.render(&context! { "name" => "world" }).unwrap(), "Hello WORLD!");
//! ```

// Enforce error handling best practices
#![cfg_attr(
    not(test),
    warn(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::unimplemented,
        clippy::todo,
    )
)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used,))]

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod filters;
pub mod lexer;
pub mod loader;
pub mod parser;
pub mod renderer;
pub mod security;
pub mod tags;
pub mod template;
pub mod value;

// Re-export main types for public API
pub use ast::{Expr, Node, TagNode};
pub use config::EngineConfig;
pub use engine::{default_engine, Engine, EngineBuilder};
pub use error::{Error, ErrorChain, ErrorContext, Result};
pub use filters::{FilterFn, FilterRegistry};
pub use lexer::{Token, TokenKind};
pub use loader::{FileSystemLoader, MemoryLoader, TemplateLoader};
pub use parser::Parser;
pub use renderer::Renderer;
pub use tags::{CustomTag, TagParser, TagRegistry};
pub use template::{Context, Template, TemplateTree};
pub use value::Value;

/// Compile `source` with the process-wide [`default_engine`]
pub fn compile(name: &str, source: &str) -> Result<Template> {
    default_engine().compile(name, source)
}

/// Load and compile `path` with the process-wide [`default_engine`]
pub fn compile_file(path: &str) -> Result<Template> {
    default_engine().compile_file(path)
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::context;
    pub use crate::{
        Context, CustomTag, Engine, EngineBuilder, EngineConfig, Error, Parser, Renderer,
        Result, TagNode, Template, Value,
    };
    pub use serde_json::json;
}
