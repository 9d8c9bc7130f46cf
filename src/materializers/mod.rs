//! Materializer registry.
//!
//! A materializer knows how to decode a stored artifact back into an
//! in-memory value. Artifacts record the identifier of the materializer that
//! wrote them; the registry maps those identifiers to factories. There is no
//! dynamic loading: anything that is not registered fails the lookup.

pub mod builtin;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::core::artifact::ArtifactView;
use crate::core::error::LineageError;

pub use builtin::{BytesMaterializer, JsonMaterializer, TextMaterializer};

/// Decodes one artifact's stored data
#[async_trait]
pub trait Materializer: Send + Sync {
    /// Read the artifact data and return the decoded value
    async fn handle_input(&self) -> Result<Payload>;
}

/// Builds a materializer bound to a specific artifact
pub type MaterializerFactory = Arc<dyn Fn(&ArtifactView) -> Box<dyn Materializer> + Send + Sync>;

/// Wrap a plain function or closure as a [`MaterializerFactory`]
pub fn factory<F, M>(build: F) -> MaterializerFactory
where
    F: Fn(&ArtifactView) -> M + Send + Sync + 'static,
    M: Materializer + 'static,
{
    Arc::new(move |artifact: &ArtifactView| Box::new(build(artifact)) as Box<dyn Materializer>)
}

/// A decoded artifact value of any type
pub struct Payload {
    type_name: &'static str,
    value: Box<dyn Any + Send>,
}

impl Payload {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        }
    }

    /// Rust type name of the wrapped value
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Take the value out, or get the payload back if the type is wrong
    pub fn downcast<T: Any>(self) -> std::result::Result<T, Self> {
        let type_name = self.type_name;
        match self.value.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(value) => Err(Self { type_name, value }),
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payload")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Lookup table from materializer identifiers to factories
#[derive(Clone, Default)]
pub struct MaterializerRegistry {
    factories: BTreeMap<String, MaterializerFactory>,
    aliases: BTreeMap<String, String>,
}

impl MaterializerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in text, json and bytes materializers
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(TextMaterializer::IDENTIFIER, factory(TextMaterializer::new));
        registry.register(JsonMaterializer::IDENTIFIER, factory(JsonMaterializer::new));
        registry.register(BytesMaterializer::IDENTIFIER, factory(BytesMaterializer::new));
        registry
    }

    /// Register a factory, replacing any previous one under the same id
    pub fn register(&mut self, identifier: impl Into<String>, factory: MaterializerFactory) {
        self.factories.insert(identifier.into(), factory);
    }

    /// Make `alias` resolve to the factory registered as `target`
    pub fn alias(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }

    /// Resolve an identifier (or an alias of one) to its factory
    pub fn resolve(&self, identifier: &str) -> Result<MaterializerFactory, LineageError> {
        let target = self
            .aliases
            .get(identifier)
            .map(String::as_str)
            .unwrap_or(identifier);

        self.factories
            .get(target)
            .cloned()
            .ok_or_else(|| LineageError::MaterializerLookup {
                identifier: identifier.to_string(),
                registered: self.identifiers(),
            })
    }

    /// Registered identifiers, sorted
    pub fn identifiers(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.resolve(identifier).is_ok()
    }
}

impl fmt::Debug for MaterializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterializerRegistry")
            .field("identifiers", &self.identifiers())
            .field("aliases", &self.aliases)
            .finish()
    }
}
