//! The storage base: owns the connection and dispatches to resolvers.

use std::any::type_name;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::{Result, StorageError};
use crate::key::{KeyResolver, KeyResolvers};
use crate::repository::TypedRepository;
use crate::sqlite::ConnectionState;
use crate::value::{ValueResolver, ValueResolvers};

/// Builder for [`Storage`].
#[derive(Debug)]
pub struct StorageBuilder {
    config: StorageConfig,
    keys: KeyResolvers,
    values: ValueResolvers,
}

impl StorageBuilder {
    fn new(config: StorageConfig) -> Self {
        Self {
            config,
            keys: KeyResolvers::with_defaults(),
            values: ValueResolvers::default(),
        }
    }

    /// Registers a key resolver for `K`, overriding any built-in one.
    pub fn key_resolver<K, R>(mut self, resolver: R) -> Self
    where
        K: 'static,
        R: KeyResolver<K>,
    {
        if self.keys.register::<K, R>(resolver) {
            debug!(key_type = type_name::<K>(), "key resolver overridden");
        }
        self
    }

    /// Registers a value resolver for `R::Value`.
    pub fn value_resolver<R: ValueResolver>(mut self, resolver: R) -> Self {
        let table = ValueResolver::table(&resolver).to_string();
        if self.values.register(resolver) {
            warn!(
                value_type = type_name::<R::Value>(),
                table = %table,
                "value resolver replaced an earlier registration"
            );
        }
        self
    }

    /// Connects and creates the schema of every registered value resolver.
    ///
    /// Fails with [`StorageError::Config`] if two value types share a table.
    pub async fn open(self) -> Result<Storage> {
        self.config.validate()?;
        self.values.check_tables()?;
        let storage = Storage {
            inner: Arc::new(Inner {
                permits: Arc::new(Semaphore::new(self.config.worker_threads)),
                conn: Mutex::new(ConnectionState::Pending),
                config: self.config,
                keys: self.keys,
                values: self.values,
            }),
        };

        let schemas: Vec<_> = storage.inner.values.schemas().cloned().collect();
        storage
            .run(move |conn| {
                for schema in &schemas {
                    schema.init(conn)?;
                    debug!(table = schema.table(), "schema ready");
                }
                Ok(())
            })
            .await?;

        info!(
            path = ?storage.inner.config.path,
            value_resolvers = storage.inner.values.len(),
            "storage opened"
        );
        Ok(storage)
    }
}

struct Inner {
    config: StorageConfig,
    keys: KeyResolvers,
    values: ValueResolvers,
    conn: Mutex<ConnectionState>,
    permits: Arc<Semaphore>,
}

/// Typed key/value storage over a single SQLite connection.
///
/// Keys are converted to text by the [`KeyResolver`] registered for their
/// type, and values are persisted by the [`ValueResolver`] registered for
/// theirs. Database work runs on blocking worker threads, at most
/// `worker_threads` at a time. Cloning is cheap and shares the connection.
///
/// A resolver that panics while running poisons the connection lock. Every
/// later operation on that storage then fails with [`StorageError::Worker`];
/// reopen it to recover.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("config", &self.inner.config)
            .field("keys", &self.inner.keys)
            .field("values", &self.inner.values)
            .finish()
    }
}

impl Storage {
    pub fn builder(config: StorageConfig) -> StorageBuilder {
        StorageBuilder::new(config)
    }

    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    pub fn has_key_resolver<K: 'static>(&self) -> bool {
        self.inner.keys.contains::<K>()
    }

    pub fn has_value_resolver<V: 'static>(&self) -> bool {
        self.inner.values.contains::<V>()
    }

    /// Returns true once [`shutdown`](Self::shutdown) has run.
    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }

    /// Saves `value` under `key`, replacing any previous value.
    pub async fn save<K, V>(&self, key: &K, value: V) -> Result<()>
    where
        K: 'static,
        V: Send + 'static,
    {
        let raw = self.inner.keys.serialize(key)?;
        let resolver = self.inner.values.require::<V>()?;
        debug!(table = resolver.table(), key = %raw, "save");
        self.run(move |conn| resolver.save(conn, &raw, &value)).await
    }

    /// Saves every entry inside one transaction. Returns the number saved.
    pub async fn save_many<K, V, I>(&self, entries: I) -> Result<usize>
    where
        K: 'static,
        V: Send + 'static,
        I: IntoIterator<Item = (K, V)>,
    {
        let resolver = self.inner.values.require::<V>()?;
        let entries = entries
            .into_iter()
            .map(|(key, value)| Ok((self.inner.keys.serialize(&key)?, value)))
            .collect::<Result<Vec<_>>>()?;
        debug!(table = resolver.table(), count = entries.len(), "save_many");
        self.run(move |conn| {
            let tx = conn.transaction()?;
            for (key, value) in &entries {
                resolver.save(&tx, key, value)?;
            }
            tx.commit()?;
            Ok(entries.len())
        })
        .await
    }

    /// Loads the value of type `V` stored under `key`.
    pub async fn retrieve<K, V>(&self, key: &K) -> Result<Option<V>>
    where
        K: 'static,
        V: Send + 'static,
    {
        let raw = self.inner.keys.serialize(key)?;
        let resolver = self.inner.values.require::<V>()?;
        debug!(table = resolver.table(), key = %raw, "retrieve");
        self.run(move |conn| resolver.retrieve(conn, &raw)).await
    }

    /// Deletes the value of type `V` stored under `key`. Returns true if
    /// something was removed.
    pub async fn delete<K, V>(&self, key: &K) -> Result<bool>
    where
        K: 'static,
        V: Send + 'static,
    {
        let raw = self.inner.keys.serialize(key)?;
        let resolver = self.inner.values.require::<V>()?;
        debug!(table = resolver.table(), key = %raw, "delete");
        self.run(move |conn| resolver.delete(conn, &raw)).await
    }

    /// A handle bound to one key type and one value type.
    pub fn repository<K, V>(&self) -> Result<TypedRepository<K, V>>
    where
        K: Send + Sync + 'static,
        V: Send + 'static,
    {
        if !self.has_key_resolver::<K>() {
            return Err(StorageError::UnknownKeyType {
                type_name: type_name::<K>(),
            });
        }
        self.inner.values.require::<V>()?;
        Ok(TypedRepository::new(self.clone()))
    }

    /// Closes the connection. Later operations fail with
    /// [`StorageError::Closed`]. Calling it again is a no-op.
    pub async fn shutdown(&self) -> Result<()> {
        self.inner.permits.close();
        let inner = Arc::clone(&self.inner);
        let closed = tokio::task::spawn_blocking(move || {
            let mut state = inner.conn.lock().map_err(|e| StorageError::Worker {
                message: e.to_string(),
            })?;
            state.close()
        })
        .await??;
        if closed {
            info!("storage shut down");
        }
        Ok(())
    }

    /// Runs `op` against the connection on a blocking worker.
    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| StorageError::Closed)?;
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut state = inner.conn.lock().map_err(|e| StorageError::Worker {
                message: e.to_string(),
            })?;
            if state.is_closed() {
                return Err(StorageError::Closed);
            }
            let conn = state.connection(&inner.config)?;
            op(conn)
        })
        .await?
    }
}
