//! Value resolvers: persist one value type against its own table.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StorageError};

/// Persists values of one type.
///
/// Every method runs on a blocking worker with the storage's connection
/// already locked, so implementations just issue their statements.
pub trait ValueResolver: Send + Sync + 'static {
    /// The type this resolver stores.
    type Value: Send + 'static;

    /// Name of the backing table.
    fn table(&self) -> &str;

    /// Creates the backing schema. Called once when the storage opens.
    fn init(&self, conn: &Connection) -> Result<()>;

    /// Inserts or replaces the value stored under `key`.
    fn save(&self, conn: &Connection, key: &str, value: &Self::Value) -> Result<()>;

    /// Loads the value stored under `key`.
    fn retrieve(&self, conn: &Connection, key: &str) -> Result<Option<Self::Value>>;

    /// Removes the value stored under `key`. Returns true if a row existed.
    fn delete(&self, conn: &Connection, key: &str) -> Result<bool>;
}

/// Type-erased view used while initializing the schema.
pub(crate) trait SchemaInit: Send + Sync {
    fn table(&self) -> &str;
    fn init(&self, conn: &Connection) -> Result<()>;
}

impl<R: ValueResolver> SchemaInit for R {
    fn table(&self) -> &str {
        ValueResolver::table(self)
    }

    fn init(&self, conn: &Connection) -> Result<()> {
        ValueResolver::init(self, conn)
    }
}

/// Resolvers indexed by the value type they store.
#[derive(Clone, Default)]
pub struct ValueResolvers {
    resolvers: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    // registration order, so schemas are created in the order they were added
    schemas: Vec<(TypeId, Arc<dyn SchemaInit>)>,
}

impl ValueResolvers {
    /// Registers `resolver`. Returns true when it replaced an existing one.
    pub fn register<R: ValueResolver>(&mut self, resolver: R) -> bool {
        let resolver = Arc::new(resolver);
        let id = TypeId::of::<R::Value>();
        let erased: Arc<dyn ValueResolver<Value = R::Value>> = resolver.clone();
        let schema: Arc<dyn SchemaInit> = resolver;
        match self.schemas.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = schema,
            None => self.schemas.push((id, schema)),
        }
        self.resolvers.insert(id, Arc::new(erased)).is_some()
    }

    /// Looks up the resolver for `V`.
    pub fn get<V: Send + 'static>(&self) -> Option<Arc<dyn ValueResolver<Value = V>>> {
        self.resolvers
            .get(&TypeId::of::<V>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn ValueResolver<Value = V>>>())
            .cloned()
    }

    /// Like [`get`](Self::get), failing with `UnknownValueType`.
    pub fn require<V: Send + 'static>(&self) -> Result<Arc<dyn ValueResolver<Value = V>>> {
        self.get::<V>().ok_or(StorageError::UnknownValueType {
            type_name: type_name::<V>(),
        })
    }

    pub fn contains<V: 'static>(&self) -> bool {
        self.resolvers.contains_key(&TypeId::of::<V>())
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub(crate) fn schemas(&self) -> impl Iterator<Item = &Arc<dyn SchemaInit>> {
        self.schemas.iter().map(|(_, schema)| schema)
    }

    /// Fails if two value types are backed by the same table. SQLite table
    /// names are case-insensitive, so `Scores` and `scores` collide.
    pub fn check_tables(&self) -> Result<()> {
        for (i, (_, schema)) in self.schemas.iter().enumerate() {
            let clash = self.schemas[..i]
                .iter()
                .any(|(_, earlier)| earlier.table().eq_ignore_ascii_case(schema.table()));
            if clash {
                return Err(StorageError::config(format!(
                    "table {:?} is used by more than one value type",
                    schema.table()
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ValueResolvers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables: Vec<&str> = self.schemas().map(|s| s.table()).collect();
        f.debug_struct("ValueResolvers")
            .field("tables", &tables)
            .finish()
    }
}

/// Stores any serde type as JSON text in a `(id, value)` table.
pub struct JsonValueResolver<V> {
    table: String,
    insert_sql: String,
    select_sql: String,
    delete_sql: String,
    _marker: PhantomData<fn() -> V>,
}

impl<V> JsonValueResolver<V> {
    /// Creates a resolver backed by `table`.
    ///
    /// The name must be an identifier: ASCII letters, digits and `_`, not
    /// starting with a digit.
    pub fn new(table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self {
            insert_sql: format!("INSERT OR REPLACE INTO {table} (id, value) VALUES (?1, ?2)"),
            select_sql: format!("SELECT value FROM {table} WHERE id = ?1"),
            delete_sql: format!("DELETE FROM {table} WHERE id = ?1"),
            table,
            _marker: PhantomData,
        })
    }
}

impl<V> std::fmt::Debug for JsonValueResolver<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonValueResolver")
            .field("table", &self.table)
            .field("type", &type_name::<V>())
            .finish()
    }
}

impl<V> ValueResolver for JsonValueResolver<V>
where
    V: Serialize + DeserializeOwned + Send + 'static,
{
    type Value = V;

    fn table(&self) -> &str {
        &self.table
    }

    fn init(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id    TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );",
            self.table
        ))?;
        Ok(())
    }

    fn save(&self, conn: &Connection, key: &str, value: &V) -> Result<()> {
        let json = serde_json::to_string(value)?;
        conn.prepare_cached(&self.insert_sql)?
            .execute(params![key, json])?;
        Ok(())
    }

    fn retrieve(&self, conn: &Connection, key: &str) -> Result<Option<V>> {
        let json: Option<String> = conn
            .prepare_cached(&self.select_sql)?
            .query_row(params![key], |row| row.get(0))
            .optional()?;
        json.map(|raw| serde_json::from_str(&raw).map_err(StorageError::from))
            .transpose()
    }

    fn delete(&self, conn: &Connection, key: &str) -> Result<bool> {
        let affected = conn.prepare_cached(&self.delete_sql)?.execute(params![key])?;
        Ok(affected > 0)
    }
}

/// SQLite keywords, which cannot be used as bare table names.
const SQL_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN",
    "WHERE", "WINDOW", "WITH", "WITHOUT",
];

fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let identifier = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !identifier {
        return Err(StorageError::config(format!("invalid table name {table:?}")));
    }
    if table.len() >= 7 && table[..7].eq_ignore_ascii_case("sqlite_") {
        return Err(StorageError::config(format!(
            "table name {table:?} uses the reserved sqlite_ prefix"
        )));
    }
    if SQL_KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(table)) {
        return Err(StorageError::config(format!(
            "table name {table:?} is an SQL keyword"
        )));
    }
    Ok(())
}
