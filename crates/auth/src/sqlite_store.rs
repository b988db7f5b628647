//! Profile store backed by SQLite
//!
//! Holds the role catalog, profiles, role grants and the two role profiles.
//! Every provisioning insert is `INSERT ... ON CONFLICT DO NOTHING`, with
//! `rows_affected` telling a fresh row from an existing one.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, info};

use crate::error::{AuthError, Result};
use crate::profile::{
    AccountStatus, CustomerProfile, EnsureRow, Ensured, NewProfile, Profile, RoleAssignment,
    WorkerProfile,
};
use crate::roles::RoleName;
use crate::store::ProfileStore;

/// Profile store backed by SQLite
#[derive(Debug, Clone)]
pub struct SqliteProfileStore {
    pool: SqlitePool,
}

impl SqliteProfileStore {
    /// Open or create a store at the given path
    ///
    /// Creates the database, tables and role catalog if they don't exist.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                AuthError::database(format!(
                    "failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| AuthError::database(format!("failed to open database: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;

        info!(path = %path.display(), "profile store opened");
        Ok(store)
    }

    /// Create an in-memory store
    ///
    /// A single connection that never expires; a second connection would see
    /// a different, empty database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| AuthError::database(format!("failed to create memory db: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        // Role catalog
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roles (
                name TEXT PRIMARY KEY
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::database(format!("failed to create roles table: {}", e)))?;

        for role in RoleName::ALL {
            sqlx::query("INSERT INTO roles (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
                .bind(role.as_str())
                .execute(&self.pool)
                .await
                .map_err(|e| AuthError::database(format!("failed to seed roles: {}", e)))?;
        }

        // Profiles (id is the identity provider's user ID)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                full_name TEXT NOT NULL DEFAULT '',
                avatar_url TEXT,
                selected_role TEXT REFERENCES roles(name),
                account_status TEXT NOT NULL DEFAULT 'active',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::database(format!("failed to create profiles table: {}", e)))?;

        // Role grants
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS role_assignments (
                user_id TEXT NOT NULL,
                role_name TEXT NOT NULL REFERENCES roles(name),
                created_at TEXT NOT NULL,
                PRIMARY KEY (user_id, role_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AuthError::database(format!("failed to create role_assignments table: {}", e))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS worker_profiles (
                id TEXT PRIMARY KEY,
                headline TEXT,
                bio TEXT,
                hourly_rate INTEGER,
                total_jobs INTEGER NOT NULL DEFAULT 0,
                rating REAL NOT NULL DEFAULT 0.0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AuthError::database(format!("failed to create worker_profiles table: {}", e))
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS customer_profiles (
                id TEXT PRIMARY KEY,
                total_bookings INTEGER NOT NULL DEFAULT 0,
                total_spent INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AuthError::database(format!("failed to create customer_profiles table: {}", e))
        })?;

        debug!("profile store schema initialized");
        Ok(())
    }

    /// Count rows in a provisioning table for an identity
    pub async fn count_rows(&self, table: &str, user_id: &str) -> Result<u64> {
        let column = match table {
            "role_assignments" => "user_id",
            "profiles" | "worker_profiles" | "customer_profiles" => "id",
            other => return Err(AuthError::invalid_input(format!("unknown table '{}'", other))),
        };
        let sql = format!("SELECT COUNT(*) FROM {} WHERE {} = ?", table, column);
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn profile_from_row(row: &SqliteRow) -> Profile {
    let selected: Option<String> = row.get("selected_role");
    let status: String = row.get("account_status");
    let created: String = row.get("created_at");
    let updated: String = row.get("updated_at");

    Profile {
        id: row.get("id"),
        full_name: row.get("full_name"),
        avatar_url: row.get("avatar_url"),
        selected_role: selected.as_deref().and_then(RoleName::parse),
        account_status: AccountStatus::parse(&status).unwrap_or_default(),
        created_at: parse_timestamp(&created),
        updated_at: parse_timestamp(&updated),
    }
}

fn assignment_from_row(row: &SqliteRow) -> Option<RoleAssignment> {
    let role: String = row.get("role_name");
    let created: String = row.get("created_at");
    Some(RoleAssignment {
        user_id: row.get("user_id"),
        role: RoleName::parse(&role)?,
        created_at: parse_timestamp(&created),
    })
}

fn ensured(rows_affected: u64) -> Ensured {
    if rows_affected > 0 {
        Ensured::Created
    } else {
        Ensured::Existing
    }
}

#[async_trait]
impl ProfileStore for SqliteProfileStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let row = sqlx::query(
            r#"
            SELECT id, full_name, avatar_url, selected_role, account_status, created_at, updated_at
            FROM profiles WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(profile_from_row))
    }

    async fn upsert_profile(&self, profile: &NewProfile) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO profiles (id, full_name, avatar_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                full_name = excluded.full_name,
                avatar_url = COALESCE(excluded.avatar_url, profiles.avatar_url),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(user_id = %profile.id, "profile upserted");
        Ok(())
    }

    async fn set_selected_role(&self, profile: &NewProfile, role: RoleName) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO profiles (id, full_name, avatar_url, selected_role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                selected_role = excluded.selected_role,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.full_name)
        .bind(&profile.avatar_url)
        .bind(role.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(user_id = %profile.id, role = %role, "selected role set");
        Ok(())
    }

    async fn role_in_catalog(&self, role: RoleName) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE name = ?")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn get_role_assignment(
        &self,
        user_id: &str,
        role: RoleName,
    ) -> Result<Option<RoleAssignment>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, role_name, created_at
            FROM role_assignments WHERE user_id = ? AND role_name = ?
            "#,
        )
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().and_then(assignment_from_row))
    }

    async fn list_role_assignments(&self, user_id: &str) -> Result<Vec<RoleAssignment>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, role_name, created_at
            FROM role_assignments WHERE user_id = ?
            ORDER BY role_name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(assignment_from_row).collect())
    }

    async fn ensure_exists(&self, row: &EnsureRow) -> Result<Ensured> {
        let now = Utc::now().to_rfc3339();

        let result = match row {
            EnsureRow::RoleAssignment { user_id, role } => {
                sqlx::query(
                    r#"
                    INSERT INTO role_assignments (user_id, role_name, created_at)
                    VALUES (?, ?, ?)
                    ON CONFLICT(user_id, role_name) DO NOTHING
                    "#,
                )
                .bind(user_id)
                .bind(role.as_str())
                .bind(&now)
                .execute(&self.pool)
                .await?
            }
            EnsureRow::CustomerProfile { user_id } => {
                sqlx::query(
                    r#"
                    INSERT INTO customer_profiles (id, total_bookings, total_spent, created_at)
                    VALUES (?, 0, 0, ?)
                    ON CONFLICT(id) DO NOTHING
                    "#,
                )
                .bind(user_id)
                .bind(&now)
                .execute(&self.pool)
                .await?
            }
            EnsureRow::WorkerProfile { user_id, draft } => {
                sqlx::query(
                    r#"
                    INSERT INTO worker_profiles (id, headline, bio, hourly_rate, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    ON CONFLICT(id) DO NOTHING
                    "#,
                )
                .bind(user_id)
                .bind(&draft.headline)
                .bind(&draft.bio)
                .bind(draft.hourly_rate)
                .bind(&now)
                .execute(&self.pool)
                .await?
            }
        };

        let outcome = ensured(result.rows_affected());
        debug!(table = row.table(), ?outcome, "ensure_exists");
        Ok(outcome)
    }

    async fn get_worker_profile(&self, user_id: &str) -> Result<Option<WorkerProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, headline, bio, hourly_rate, total_jobs, rating, created_at
            FROM worker_profiles WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let created: String = row.get("created_at");
            WorkerProfile {
                id: row.get("id"),
                headline: row.get("headline"),
                bio: row.get("bio"),
                hourly_rate: row.get("hourly_rate"),
                total_jobs: row.get("total_jobs"),
                rating: row.get("rating"),
                created_at: parse_timestamp(&created),
            }
        }))
    }

    async fn get_customer_profile(&self, user_id: &str) -> Result<Option<CustomerProfile>> {
        let row = sqlx::query(
            r#"
            SELECT id, total_bookings, total_spent, created_at
            FROM customer_profiles WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let created: String = row.get("created_at");
            CustomerProfile {
                id: row.get("id"),
                total_bookings: row.get("total_bookings"),
                total_spent: row.get("total_spent"),
                created_at: parse_timestamp(&created),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::WorkerProfileDraft;

    fn new_profile(id: &str) -> NewProfile {
        NewProfile {
            id: id.to_string(),
            full_name: "Test User".to_string(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn test_catalog_seeded() {
        let store = SqliteProfileStore::in_memory().await.unwrap();
        for role in RoleName::ALL {
            assert!(store.role_in_catalog(role).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_upsert_profile_withholds_role() {
        let store = SqliteProfileStore::in_memory().await.unwrap();
        store.upsert_profile(&new_profile("u1")).await.unwrap();

        let profile = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.full_name, "Test User");
        assert_eq!(profile.selected_role, None);
        assert_eq!(profile.account_status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn test_upsert_profile_keeps_selected_role() {
        let store = SqliteProfileStore::in_memory().await.unwrap();
        store
            .set_selected_role(&new_profile("u1"), RoleName::Worker)
            .await
            .unwrap();

        let mut renamed = new_profile("u1");
        renamed.full_name = "Renamed".into();
        store.upsert_profile(&renamed).await.unwrap();

        let profile = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.full_name, "Renamed");
        assert_eq!(profile.selected_role, Some(RoleName::Worker));
    }

    #[tokio::test]
    async fn test_upsert_profile_keeps_avatar_when_absent() {
        let store = SqliteProfileStore::in_memory().await.unwrap();
        let mut with_avatar = new_profile("u1");
        with_avatar.avatar_url = Some("https://cdn/a.png".into());
        store.upsert_profile(&with_avatar).await.unwrap();
        store.upsert_profile(&new_profile("u1")).await.unwrap();

        let profile = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.avatar_url.as_deref(), Some("https://cdn/a.png"));
    }

    #[tokio::test]
    async fn test_set_selected_role_creates_missing_profile() {
        let store = SqliteProfileStore::in_memory().await.unwrap();
        assert!(store.get_profile("u1").await.unwrap().is_none());

        store
            .set_selected_role(&new_profile("u1"), RoleName::Customer)
            .await
            .unwrap();
        let profile = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.selected_role, Some(RoleName::Customer));

        store
            .set_selected_role(&new_profile("u1"), RoleName::Worker)
            .await
            .unwrap();
        let profile = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.selected_role, Some(RoleName::Worker));
    }

    #[tokio::test]
    async fn test_ensure_role_assignment_is_idempotent() {
        let store = SqliteProfileStore::in_memory().await.unwrap();
        let row = EnsureRow::RoleAssignment {
            user_id: "u1".into(),
            role: RoleName::Worker,
        };

        assert_eq!(store.ensure_exists(&row).await.unwrap(), Ensured::Created);
        assert_eq!(store.ensure_exists(&row).await.unwrap(), Ensured::Existing);
        assert_eq!(store.count_rows("role_assignments", "u1").await.unwrap(), 1);

        let grant = store
            .get_role_assignment("u1", RoleName::Worker)
            .await
            .unwrap();
        assert_eq!(grant.unwrap().role, RoleName::Worker);
        assert!(
            store
                .get_role_assignment("u1", RoleName::Customer)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_concurrent_ensure_yields_one_row() {
        let store = SqliteProfileStore::in_memory().await.unwrap();
        let row = EnsureRow::CustomerProfile {
            user_id: "u1".into(),
        };

        let (a, b) = tokio::join!(store.ensure_exists(&row), store.ensure_exists(&row));
        let mut outcomes = vec![a.unwrap(), b.unwrap()];
        outcomes.sort_by_key(|o| *o == Ensured::Existing);
        assert_eq!(outcomes, vec![Ensured::Created, Ensured::Existing]);
        assert_eq!(store.count_rows("customer_profiles", "u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_customer_profile_zeroed() {
        let store = SqliteProfileStore::in_memory().await.unwrap();
        store
            .ensure_exists(&EnsureRow::CustomerProfile {
                user_id: "u1".into(),
            })
            .await
            .unwrap();

        let customer = store.get_customer_profile("u1").await.unwrap().unwrap();
        assert_eq!(customer.total_bookings, 0);
        assert_eq!(customer.total_spent, 0);
    }

    #[tokio::test]
    async fn test_worker_profile_conflict_keeps_original() {
        let store = SqliteProfileStore::in_memory().await.unwrap();
        let first = EnsureRow::WorkerProfile {
            user_id: "u1".into(),
            draft: WorkerProfileDraft {
                headline: Some("Electrician".into()),
                bio: None,
                hourly_rate: Some(6000),
            },
        };
        let second = EnsureRow::WorkerProfile {
            user_id: "u1".into(),
            draft: WorkerProfileDraft {
                headline: Some("Painter".into()),
                ..Default::default()
            },
        };

        assert_eq!(store.ensure_exists(&first).await.unwrap(), Ensured::Created);
        assert_eq!(store.ensure_exists(&second).await.unwrap(), Ensured::Existing);

        let worker = store.get_worker_profile("u1").await.unwrap().unwrap();
        assert_eq!(worker.headline.as_deref(), Some("Electrician"));
        assert_eq!(worker.hourly_rate, Some(6000));
        assert_eq!(worker.total_jobs, 0);
        assert_eq!(worker.rating, 0.0);
    }

    #[tokio::test]
    async fn test_list_role_assignments() {
        let store = SqliteProfileStore::in_memory().await.unwrap();
        for role in [RoleName::Worker, RoleName::Customer] {
            store
                .ensure_exists(&EnsureRow::RoleAssignment {
                    user_id: "u1".into(),
                    role,
                })
                .await
                .unwrap();
        }

        let roles: Vec<RoleName> = store
            .list_role_assignments("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.role)
            .collect();
        assert_eq!(roles, vec![RoleName::Customer, RoleName::Worker]);
        assert!(store.list_role_assignments("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_on_disk() {
        let dir = std::env::temp_dir().join(format!("porter-store-{}", uuid::Uuid::new_v4()));
        let path = dir.join("porter.db");

        let store = SqliteProfileStore::open(&path).await.unwrap();
        store.upsert_profile(&new_profile("u1")).await.unwrap();
        drop(store);

        let reopened = SqliteProfileStore::open(&path).await.unwrap();
        assert!(reopened.get_profile("u1").await.unwrap().is_some());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
