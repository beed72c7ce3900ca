//! Key resolvers: turn typed keys into the text stored in the database.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{Result, StorageError};

/// Converts keys of type `K` to and from their stored form.
pub trait KeyResolver<K>: Send + Sync + 'static {
    /// Renders the key as stored text.
    fn serialize(&self, key: &K) -> String;

    /// Parses stored text back into a key.
    fn deserialize(&self, raw: &str) -> Result<K>;
}

/// Resolver for `String` keys. The stored form is the key itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringKeyResolver;

impl KeyResolver<String> for StringKeyResolver {
    fn serialize(&self, key: &String) -> String {
        key.clone()
    }

    fn deserialize(&self, raw: &str) -> Result<String> {
        Ok(raw.to_string())
    }
}

/// Resolver for `Uuid` keys, stored hyphenated and lowercase.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidKeyResolver;

impl KeyResolver<Uuid> for UuidKeyResolver {
    fn serialize(&self, key: &Uuid) -> String {
        key.hyphenated().to_string()
    }

    fn deserialize(&self, raw: &str) -> Result<Uuid> {
        Uuid::parse_str(raw).map_err(|e| StorageError::invalid_key(raw, e))
    }
}

/// Resolver for integer keys, stored in decimal.
#[derive(Debug, Clone, Copy)]
pub struct NumberKeyResolver<N> {
    _marker: PhantomData<fn() -> N>,
}

impl<N> Default for NumberKeyResolver<N> {
    fn default() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<N> KeyResolver<N> for NumberKeyResolver<N>
where
    N: Display + FromStr + 'static,
    N::Err: Display,
{
    fn serialize(&self, key: &N) -> String {
        key.to_string()
    }

    fn deserialize(&self, raw: &str) -> Result<N> {
        raw.parse::<N>().map_err(|e| StorageError::invalid_key(raw, e))
    }
}

/// Resolvers indexed by the key type they handle.
#[derive(Clone, Default)]
pub struct KeyResolvers {
    resolvers: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl KeyResolvers {
    /// A registry holding the built-in resolvers.
    pub fn with_defaults() -> Self {
        let mut resolvers = Self::default();
        resolvers.register::<String, _>(StringKeyResolver);
        resolvers.register::<Uuid, _>(UuidKeyResolver);
        resolvers.register::<i32, _>(NumberKeyResolver::<i32>::default());
        resolvers.register::<i64, _>(NumberKeyResolver::<i64>::default());
        resolvers.register::<u32, _>(NumberKeyResolver::<u32>::default());
        resolvers.register::<u64, _>(NumberKeyResolver::<u64>::default());
        resolvers
    }

    /// Registers `resolver` for `K`. Returns true when it replaced an
    /// existing resolver.
    pub fn register<K, R>(&mut self, resolver: R) -> bool
    where
        K: 'static,
        R: KeyResolver<K>,
    {
        let resolver: Arc<dyn KeyResolver<K>> = Arc::new(resolver);
        self.resolvers
            .insert(TypeId::of::<K>(), Arc::new(resolver))
            .is_some()
    }

    /// Looks up the resolver for `K`.
    pub fn get<K: 'static>(&self) -> Option<Arc<dyn KeyResolver<K>>> {
        self.resolvers
            .get(&TypeId::of::<K>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn KeyResolver<K>>>())
            .cloned()
    }

    pub fn contains<K: 'static>(&self) -> bool {
        self.resolvers.contains_key(&TypeId::of::<K>())
    }

    /// Serializes `key` with its registered resolver.
    pub fn serialize<K: 'static>(&self, key: &K) -> Result<String> {
        self.get::<K>()
            .map(|resolver| resolver.serialize(key))
            .ok_or(StorageError::UnknownKeyType {
                type_name: type_name::<K>(),
            })
    }

    /// Parses `raw` with the resolver registered for `K`.
    pub fn deserialize<K: 'static>(&self, raw: &str) -> Result<K> {
        let resolver = self.get::<K>().ok_or(StorageError::UnknownKeyType {
            type_name: type_name::<K>(),
        })?;
        resolver.deserialize(raw)
    }
}

impl std::fmt::Debug for KeyResolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyResolvers")
            .field("len", &self.resolvers.len())
            .finish()
    }
}
