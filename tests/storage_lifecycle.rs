use database_storage::{Result, Storage, StorageConfig, StorageError, ValueResolver};
use rusqlite::{params, Connection, OptionalExtension};
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct PlayerProfile {
    id: Uuid,
    name: String,
}

// Profiles are equal when they describe the same player.
impl PartialEq for PlayerProfile {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

struct PlayerProfileResolver;

impl ValueResolver for PlayerProfileResolver {
    type Value = PlayerProfile;

    fn table(&self) -> &str {
        "player_profile"
    }

    fn init(&self, conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS player_profile (
                id   TEXT PRIMARY KEY,
                name TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn save(&self, conn: &Connection, key: &str, value: &PlayerProfile) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO player_profile (id, name) VALUES (?1, ?2)",
            params![key, value.name],
        )?;
        Ok(())
    }

    fn retrieve(&self, conn: &Connection, key: &str) -> Result<Option<PlayerProfile>> {
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT id, name FROM player_profile WHERE id = ?1",
                [key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(id, name)| {
            let id = Uuid::parse_str(&id).map_err(|e| StorageError::InvalidKey {
                key: id.clone(),
                reason: e.to_string(),
            })?;
            Ok::<_, StorageError>(PlayerProfile { id, name })
        })
        .transpose()
    }

    fn delete(&self, conn: &Connection, key: &str) -> Result<bool> {
        let affected = conn.execute("DELETE FROM player_profile WHERE id = ?1", [key])?;
        Ok(affected > 0)
    }
}

// Helper function to open a storage on a temporary database file
async fn open_temp_storage() -> (Storage, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig::file(dir.path().join("test.db"));
    let storage = Storage::builder(config)
        .value_resolver(PlayerProfileResolver)
        .open()
        .await
        .unwrap();
    (storage, dir)
}

fn sample_profile() -> PlayerProfile {
    PlayerProfile {
        id: Uuid::new_v4(),
        name: "Tofpu".to_string(),
    }
}

#[tokio::test]
async fn open_creates_the_schema() {
    let (storage, dir) = open_temp_storage().await;
    storage.shutdown().await.unwrap();

    let conn = Connection::open(dir.path().join("test.db")).unwrap();
    let tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'player_profile'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(tables, 1);
}

#[tokio::test]
async fn profile_lifecycle() {
    let (storage, _dir) = open_temp_storage().await;
    let profile = sample_profile();

    storage.save(&profile.id, profile.clone()).await.unwrap();

    let retrieved: Option<PlayerProfile> = storage.retrieve(&profile.id).await.unwrap();
    let retrieved = retrieved.expect("retrieved profile is missing");
    assert_eq!(retrieved, profile);
    assert_eq!(retrieved.name, "Tofpu");

    let deleted = storage.delete::<Uuid, PlayerProfile>(&profile.id).await.unwrap();
    assert!(deleted, "profile was not deleted");

    let gone: Option<PlayerProfile> = storage.retrieve(&profile.id).await.unwrap();
    assert!(gone.is_none());

    storage.shutdown().await.unwrap();
}

#[tokio::test]
async fn saving_again_replaces_the_name() {
    let (storage, _dir) = open_temp_storage().await;
    let mut profile = sample_profile();
    storage.save(&profile.id, profile.clone()).await.unwrap();

    profile.name = "Tofpu2".to_string();
    storage.save(&profile.id, profile.clone()).await.unwrap();

    let retrieved: PlayerProfile = storage.retrieve(&profile.id).await.unwrap().unwrap();
    assert_eq!(retrieved.name, "Tofpu2");
}

#[tokio::test]
async fn data_survives_reopening() {
    let dir = TempDir::new().unwrap();
    let config = StorageConfig::file(dir.path().join("test.db"));
    let profile = sample_profile();

    let storage = Storage::builder(config.clone())
        .value_resolver(PlayerProfileResolver)
        .open()
        .await
        .unwrap();
    storage.save(&profile.id, profile.clone()).await.unwrap();
    storage.shutdown().await.unwrap();

    let reopened = Storage::builder(config)
        .value_resolver(PlayerProfileResolver)
        .open()
        .await
        .unwrap();
    let retrieved: Option<PlayerProfile> = reopened.retrieve(&profile.id).await.unwrap();
    assert_eq!(retrieved, Some(profile));
}

#[tokio::test]
async fn string_keys_reach_the_same_row_as_uuid_text() {
    let (storage, _dir) = open_temp_storage().await;
    let profile = sample_profile();
    storage.save(&profile.id, profile.clone()).await.unwrap();

    let by_text: Option<PlayerProfile> = storage.retrieve(&profile.id.to_string()).await.unwrap();
    assert_eq!(by_text, Some(profile));
}

#[tokio::test]
async fn operations_after_shutdown_fail() {
    let (storage, _dir) = open_temp_storage().await;
    let profile = sample_profile();
    storage.shutdown().await.unwrap();

    let err = storage.save(&profile.id, profile.clone()).await.unwrap_err();
    assert!(matches!(err, StorageError::Closed));
    let err = storage
        .delete::<Uuid, PlayerProfile>(&profile.id)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Closed));
}
