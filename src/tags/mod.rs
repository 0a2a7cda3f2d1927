//! Tag registry and the built-in tags
//!
//! A tag parser receives the document parser (to wrap bodies and register
//! blocks), the tag name token and a parser scoped to the tag's arguments.
//! It must consume every argument token.

pub mod block;
pub mod conditional;
pub mod extends;
pub mod include;
pub mod loops;

use crate::ast::TagNode;
use crate::error::{Error, Result};
use crate::lexer::Token;
use crate::parser::Parser;
use crate::renderer::Renderer;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Signature of a tag parser
pub type TagParser =
    Arc<dyn Fn(&mut Parser<'_>, &Token, &mut Parser<'_>) -> Result<TagNode> + Send + Sync>;

/// Executable node for tags registered by embedders
pub trait CustomTag: fmt::Debug + Send + Sync {
    fn execute(&self, renderer: &mut Renderer<'_>) -> Result<()>;
}

/// Name → tag parser lookup, read-only once the engine is built
#[derive(Clone, Default)]
pub struct TagRegistry {
    tags: HashMap<String, TagParser>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the core document tags
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, TagParser); 5] = [
            ("block", Arc::new(block::parse)),
            ("extends", Arc::new(extends::parse)),
            ("include", Arc::new(include::parse)),
            ("if", Arc::new(conditional::parse)),
            ("for", Arc::new(loops::parse)),
        ];
        for (name, parser) in builtins {
            registry.tags.insert(name.to_string(), parser);
        }
        registry
    }

    /// Register a tag parser; names can only be registered once
    pub fn register(&mut self, name: &str, parser: TagParser) -> Result<()> {
        if self.tags.contains_key(name) {
            return Err(Error::registry(format!(
                "Tag with name '{}' is already registered",
                name
            )));
        }
        log::debug!("Registered tag '{}'", name);
        self.tags.insert(name.to_string(), parser);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TagParser> {
        self.tags.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tags.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagRegistry")
            .field("tags", &self.names())
            .finish()
    }
}

/// Fail unless the end tag parser `args` is empty
pub(crate) fn expect_no_args(args: &Parser<'_>) -> Result<()> {
    if args.count() > 0 {
        return Err(args.error(format!(
            "Tag '{}' does not take any argument",
            args.tag_name().unwrap_or_default()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = TagRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["block", "extends", "for", "if", "include"]
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = TagRegistry::with_builtins();
        let result = registry.register("block", Arc::new(block::parse));
        assert!(matches!(result, Err(Error::Registry(_))));
        fn noop(_: &mut Parser<'_>, _: &Token, _: &mut Parser<'_>) -> Result<TagNode> {
            Ok(TagNode::Extends)
        }
        assert!(registry.register("noop", Arc::new(noop)).is_ok());
        assert!(registry.contains("noop"));
    }
}
