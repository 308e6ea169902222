use crate::db::engine::ArrayEngine;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error as ThisError;

///
/// RegistryError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum RegistryError {
    #[error("an engine is already registered for scheme '{scheme}'")]
    DuplicateScheme { scheme: String },

    #[error("no engine registered for '{uri}'")]
    UnknownScheme { uri: String },
}

///
/// EngineRegistry
///
/// Explicit scheme → engine table, built at startup and handed to the
/// catalog. A URI's scheme is the text before `://`; URIs without one use
/// the empty scheme.
///

#[derive(Default)]
pub struct EngineRegistry(HashMap<String, Arc<dyn ArrayEngine>>);

impl EngineRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Register an engine under a scheme. Schemes are case-insensitive.
    pub fn register(
        &mut self,
        scheme: &str,
        engine: Arc<dyn ArrayEngine>,
    ) -> Result<(), RegistryError> {
        let scheme = scheme.to_ascii_lowercase();
        if self.0.contains_key(&scheme) {
            return Err(RegistryError::DuplicateScheme { scheme });
        }
        self.0.insert(scheme, engine);

        Ok(())
    }

    /// Engine responsible for `uri`.
    pub fn resolve(&self, uri: &str) -> Result<Arc<dyn ArrayEngine>, RegistryError> {
        self.0
            .get(&scheme_of(uri).to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| RegistryError::UnknownScheme {
                uri: uri.to_string(),
            })
    }

    /// Registered schemes, sorted.
    #[must_use]
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.0.keys().map(String::as_str).collect();
        schemes.sort_unstable();

        schemes
    }
}

fn scheme_of(uri: &str) -> &str {
    uri.split_once("://").map_or("", |(scheme, _)| scheme)
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::engine::MemoryEngine;

    fn registry() -> EngineRegistry {
        let mut registry = EngineRegistry::new();
        registry
            .register("mem", Arc::new(MemoryEngine::new()))
            .expect("first registration succeeds");

        registry
    }

    #[test]
    fn resolves_by_scheme_case_insensitively() {
        let registry = registry();

        assert!(registry.resolve("mem://data/roads").is_ok());
        assert!(registry.resolve("MEM://data/roads").is_ok());
    }

    #[test]
    fn unknown_and_missing_schemes_fail() {
        let registry = registry();

        assert_eq!(
            registry.resolve("s3://bucket/roads").err(),
            Some(RegistryError::UnknownScheme {
                uri: "s3://bucket/roads".into()
            })
        );
        assert!(registry.resolve("/tmp/roads").is_err());
    }

    #[test]
    fn duplicate_scheme_is_rejected() {
        let mut registry = registry();

        let err = registry
            .register("Mem", Arc::new(MemoryEngine::new()))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateScheme {
                scheme: "mem".into()
            }
        );
        assert_eq!(registry.schemes(), vec!["mem"]);
    }
}
