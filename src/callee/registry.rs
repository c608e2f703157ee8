//! Function registry for the responder.
//!
//! Maps function names to async handlers taking the call argument and
//! returning either the value to send back or an error description.
//!
//! # Example
//!
//! ```
//! use beatwire::callee::HandlerRegistry;
//!
//! let mut registry = HandlerRegistry::new();
//! registry.register("shout", |arg: String| async move { Ok(arg.to_uppercase()) });
//!
//! assert!(registry.contains("shout"));
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Result type for handler functions: the value, or an error description.
pub type HandlerResult = std::result::Result<String, String>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for handler functions.
pub trait Handler: Send + Sync + 'static {
    /// Run the function with the call argument.
    fn call(&self, argument: String) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, argument: String) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(argument))
    }
}

/// Registry mapping function names to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in `echo` function.
    pub fn with_echo() -> Self {
        let mut registry = Self::new();
        registry.register("echo", |argument: String| async move { Ok(argument) });
        registry
    }

    /// Register a function, replacing any handler with the same name.
    ///
    /// Names starting with `_` are internal and can never be called remotely.
    pub fn register<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        if self.handlers.insert(name.to_string(), Box::new(handler)).is_some() {
            tracing::debug!("Replaced handler for {:?}", name);
        }
    }

    /// Get a handler by name.
    pub fn get(&self, name: &str) -> Option<&dyn Handler> {
        self.handlers.get(name).map(|h| h.as_ref())
    }

    /// Check if a function is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered function names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no functions are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Call `name` with `argument`.
    ///
    /// Internal (`_`-prefixed) and unknown names are rejected with a
    /// description of why.
    pub async fn dispatch(&self, name: &str, argument: String) -> HandlerResult {
        if name.starts_with('_') {
            return Err(format!("cannot call internal function {:?}", name));
        }

        let handler = self
            .get(name)
            .ok_or_else(|| format!("unknown function {:?}", name))?;

        handler.call(argument).await
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_function() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());

        registry.register("upper", |arg: String| async move { Ok(arg.to_uppercase()) });

        assert!(registry.contains("upper"));
        assert!(registry.get("upper").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_with_echo() {
        let registry = HandlerRegistry::with_echo();
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[tokio::test]
    async fn test_dispatch_echo() {
        let registry = HandlerRegistry::with_echo();
        let result = registry.dispatch("echo", "Hello".to_string()).await;
        assert_eq!(result, Ok("Hello".to_string()));
    }

    #[tokio::test]
    async fn test_dispatch_handler_error() {
        let mut registry = HandlerRegistry::new();
        registry.register("fail", |_: String| async { Err("no luck".to_string()) });

        let result = registry.dispatch("fail", String::new()).await;
        assert_eq!(result, Err("no luck".to_string()));
    }

    #[tokio::test]
    async fn test_dispatch_unknown_function() {
        let registry = HandlerRegistry::with_echo();
        let err = registry.dispatch("missing", String::new()).await.unwrap_err();
        assert!(err.contains("unknown function"));
    }

    #[tokio::test]
    async fn test_dispatch_internal_function_rejected() {
        let mut registry = HandlerRegistry::new();
        registry.register("_secret", |_: String| async { Ok("leaked".to_string()) });

        let err = registry.dispatch("_secret", String::new()).await.unwrap_err();
        assert!(err.contains("internal"));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = HandlerRegistry::with_echo();
        registry.register("echo", |_: String| async { Ok("fixed".to_string()) });
        assert_eq!(registry.len(), 1);
    }
}
