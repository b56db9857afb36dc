//! Thread-safe function registry using DashMap.
//!
//! Maps each configured function to its handler. Handlers are shared out as
//! `Arc`s so an invocation never holds a registry shard lock while it runs.

use std::sync::Arc;

use dashmap::DashMap;

use crate::accounting::Introspector;
use crate::config::{Config, FunctionConfig};
use crate::error::{FdLeakError, FdLeakResult};
use crate::handler::InvocationHandler;
use crate::transport::ClientFactory;
use crate::types::FunctionId;

/// Entry in the function registry.
#[derive(Debug)]
pub struct FunctionEntry {
    /// Function configuration.
    pub config: FunctionConfig,
    /// Handler serving the function's invocations.
    pub handler: Arc<InvocationHandler>,
}

impl FunctionEntry {
    /// Create a new function entry, building its handler with a fresh
    /// invocation context.
    pub fn new(
        config: FunctionConfig,
        introspector: Arc<dyn Introspector>,
        factory: Arc<dyn ClientFactory>,
    ) -> FdLeakResult<Self> {
        let handler = InvocationHandler::from_config(&config, introspector, factory)?;
        Ok(Self {
            config,
            handler: Arc::new(handler),
        })
    }
}

/// Thread-safe registry for managing functions.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: DashMap<FunctionId, FunctionEntry>,
}

impl FunctionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            functions: DashMap::new(),
        }
    }

    /// Build a registry holding every configured function.
    pub fn from_config(
        config: &Config,
        introspector: Arc<dyn Introspector>,
        factory: Arc<dyn ClientFactory>,
    ) -> FdLeakResult<Self> {
        let registry = Self::new();
        for function in &config.functions {
            registry.register(
                function.clone(),
                Arc::clone(&introspector),
                Arc::clone(&factory),
            )?;
        }
        Ok(registry)
    }

    /// Register a new function.
    /// Returns FunctionAlreadyExists if the id is taken.
    pub fn register(
        &self,
        config: FunctionConfig,
        introspector: Arc<dyn Introspector>,
        factory: Arc<dyn ClientFactory>,
    ) -> FdLeakResult<Arc<InvocationHandler>> {
        let id = config.id.clone();

        // Check for duplicate - fail fast
        if self.functions.contains_key(&id) {
            return Err(FdLeakError::FunctionAlreadyExists(id));
        }

        let entry = FunctionEntry::new(config, introspector, factory)?;
        let handler = Arc::clone(&entry.handler);

        tracing::debug!(
            function_id = %id,
            invocation_id = %handler.context().id(),
            policy = %entry.config.policy,
            "Registered function"
        );

        self.functions.insert(id, entry);
        Ok(handler)
    }

    /// Unregister a function.
    pub fn unregister(&self, id: &FunctionId) -> FdLeakResult<FunctionEntry> {
        self.functions
            .remove(id)
            .map(|(_, entry)| entry)
            .ok_or_else(|| FdLeakError::FunctionNotFound(id.clone()))
    }

    /// Get the handler for a function.
    pub fn handler(&self, id: &FunctionId) -> FdLeakResult<Arc<InvocationHandler>> {
        self.functions
            .get(id)
            .map(|entry| Arc::clone(&entry.handler))
            .ok_or_else(|| FdLeakError::FunctionNotFound(id.clone()))
    }

    /// Get the configuration for a function.
    pub fn get_config(&self, id: &FunctionId) -> FdLeakResult<FunctionConfig> {
        self.functions
            .get(id)
            .map(|entry| entry.config.clone())
            .ok_or_else(|| FdLeakError::FunctionNotFound(id.clone()))
    }

    /// Check if a function exists.
    pub fn contains(&self, id: &FunctionId) -> bool {
        self.functions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// All function IDs, sorted.
    pub fn function_ids(&self) -> Vec<FunctionId> {
        let mut ids: Vec<_> = self.functions.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::ProcfsIntrospector;
    use crate::policy::PolicyKind;
    use crate::transport::ReqwestClientFactory;
    use crate::types::TargetUrl;
    use std::time::Duration;

    fn make_config(name: &str, policy: PolicyKind) -> FunctionConfig {
        FunctionConfig {
            id: FunctionId::new(name).unwrap(),
            policy,
            targets: vec![TargetUrl::new("https://www.google.com/").unwrap()],
        }
    }

    fn deps() -> (Arc<dyn Introspector>, Arc<dyn ClientFactory>) {
        (
            Arc::new(ProcfsIntrospector::new()),
            Arc::new(ReqwestClientFactory::new(Duration::from_secs(5))),
        )
    }

    #[test]
    fn test_register_and_get() {
        let registry = FunctionRegistry::new();
        let (introspector, factory) = deps();
        let config = make_config("test-func", PolicyKind::Scoped);
        let id = config.id.clone();

        let handler = registry.register(config, introspector, factory).unwrap();
        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);
        assert!(Arc::ptr_eq(&handler, &registry.handler(&id).unwrap()));
        assert_eq!(registry.get_config(&id).unwrap().policy, PolicyKind::Scoped);
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = FunctionRegistry::new();
        let (introspector, factory) = deps();

        registry
            .register(
                make_config("test-func", PolicyKind::Leaking),
                Arc::clone(&introspector),
                Arc::clone(&factory),
            )
            .unwrap();
        let err = registry
            .register(
                make_config("test-func", PolicyKind::Scoped),
                introspector,
                factory,
            )
            .unwrap_err();
        assert!(matches!(err, FdLeakError::FunctionAlreadyExists(_)));
    }

    #[test]
    fn test_unregister() {
        let registry = FunctionRegistry::new();
        let (introspector, factory) = deps();
        let config = make_config("test-func", PolicyKind::Leaking);
        let id = config.id.clone();

        registry.register(config, introspector, factory).unwrap();
        let entry = registry.unregister(&id).unwrap();
        assert_eq!(entry.config.id, id);
        assert!(registry.is_empty());
        assert!(matches!(
            registry.handler(&id),
            Err(FdLeakError::FunctionNotFound(_))
        ));
        assert!(registry.unregister(&id).is_err());
    }

    #[test]
    fn test_each_handler_has_its_own_context() {
        let registry = FunctionRegistry::new();
        let (introspector, factory) = deps();

        for name in ["func-b", "func-a"] {
            registry
                .register(
                    make_config(name, PolicyKind::Leaking),
                    Arc::clone(&introspector),
                    Arc::clone(&factory),
                )
                .unwrap();
        }

        let ids = registry.function_ids();
        assert_eq!(ids[0].as_str(), "func-a");
        assert_eq!(ids[1].as_str(), "func-b");

        let a = registry.handler(&ids[0]).unwrap();
        let b = registry.handler(&ids[1]).unwrap();
        assert_ne!(a.context().id(), b.context().id());
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let registry = Arc::new(FunctionRegistry::new());

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    let (introspector, factory) = deps();
                    let config = make_config(&format!("func-{}", i), PolicyKind::Leaking);
                    reg.register(config, introspector, factory).unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 10);
    }
}
