//! Error context and chaining utilities
//!
//! Include and extends resolution wrap inner failures with the name of the
//! template being processed, so a failure deep in a chain still says where
//! it came from.

use super::Error;
use std::fmt;

/// Trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to the error
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Into<String>;

    /// Add context with lazy evaluation
    fn with_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ErrorContext<T> for Result<T, Error> {
    fn context<C>(self, context: C) -> Result<T, Error>
    where
        C: Into<String>,
    {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T, Error>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

/// Flattened view of a context chain
pub struct ErrorChain<'a> {
    error: &'a Error,
    chain: Vec<String>,
}

impl<'a> ErrorChain<'a> {
    pub fn new(error: &'a Error) -> Self {
        let mut chain = Vec::new();
        let mut current = error;
        loop {
            chain.push(current.to_string());
            match current {
                Error::WithContext { source, .. } => current = source,
                _ => break,
            }
        }
        Self { error, chain }
    }

    pub fn chain(&self) -> &[String] {
        &self.chain
    }

    pub fn root_cause(&self) -> &Error {
        self.error.root_cause()
    }

    /// Format the error chain for logging
    pub fn format_for_log(&self) -> String {
        self.chain.join(" -> ")
    }
}

impl<'a> fmt::Display for ErrorChain<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.chain.len() == 1 {
            return write!(f, "{}", self.chain[0]);
        }
        write!(f, "{}\n\nCaused by:", self.chain[0])?;
        for (i, msg) in self.chain[1..].iter().enumerate() {
            write!(f, "\n  {}. {}", i + 1, msg)?;
        }
        Ok(())
    }
}

/// Extension trait for Option types
pub trait OptionExt<T> {
    /// Convert None into a resolution error
    fn or_unresolved<C>(self, context: C) -> Result<T, Error>
    where
        C: Into<String>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_unresolved<C>(self, context: C) -> Result<T, Error>
    where
        C: Into<String>,
    {
        self.ok_or_else(|| Error::resolution(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_formatting() {
        let err: Result<(), Error> = Err(Error::resolution("file 'nav.html' not found"));
        let err = err
            .context("including 'nav.html'")
            .context("rendering 'index.html'")
            .unwrap_err();

        let chain = ErrorChain::new(&err);
        assert_eq!(chain.chain().len(), 3);
        assert_eq!(
            chain.format_for_log(),
            "rendering 'index.html' -> including 'nav.html' -> Resolution error: file 'nav.html' not found"
        );
        assert!(chain.to_string().contains("Caused by:"));
        assert!(matches!(chain.root_cause(), Error::Resolution(_)));
    }

    #[test]
    fn test_option_ext() {
        let missing: Option<u8> = None;
        let err = missing.or_unresolved("block 'footer' not found").unwrap_err();
        assert_eq!(err.error_code(), "E_RESOLUTION");
        assert_eq!(Some(1).or_unresolved("unused").unwrap(), 1);
    }
}
