//! Statically typed access to one key type and one value type.

use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::Result;
use crate::storage::Storage;

/// Persistence port for values of type `V` keyed by `K`.
#[async_trait]
pub trait Repository<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + 'static,
{
    /// Saves `value` under `key`, replacing any previous value.
    async fn save(&self, key: &K, value: V) -> Result<()>;

    /// Loads the value stored under `key`.
    async fn retrieve(&self, key: &K) -> Result<Option<V>>;

    /// Deletes the value stored under `key`. Returns true if it existed.
    async fn delete(&self, key: &K) -> Result<bool>;
}

/// [`Repository`] backed by a [`Storage`], created with
/// [`Storage::repository`].
pub struct TypedRepository<K, V> {
    storage: Storage,
    _marker: PhantomData<fn(K) -> V>,
}

impl<K, V> TypedRepository<K, V> {
    pub(crate) fn new(storage: Storage) -> Self {
        Self {
            storage,
            _marker: PhantomData,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

impl<K, V> Clone for TypedRepository<K, V> {
    fn clone(&self) -> Self {
        Self::new(self.storage.clone())
    }
}

impl<K, V> std::fmt::Debug for TypedRepository<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedRepository")
            .field("key", &std::any::type_name::<K>())
            .field("value", &std::any::type_name::<V>())
            .finish()
    }
}

#[async_trait]
impl<K, V> Repository<K, V> for TypedRepository<K, V>
where
    K: Send + Sync + 'static,
    V: Send + 'static,
{
    async fn save(&self, key: &K, value: V) -> Result<()> {
        self.storage.save(key, value).await
    }

    async fn retrieve(&self, key: &K) -> Result<Option<V>> {
        self.storage.retrieve(key).await
    }

    async fn delete(&self, key: &K) -> Result<bool> {
        self.storage.delete::<K, V>(key).await
    }
}
