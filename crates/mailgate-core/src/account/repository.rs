//! Account storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::model::{Account, AccountId, Endpoint, NewAccount, Security};
use crate::{Error, Result};

/// Repository for account storage and retrieval.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        debug!(path = database_path, "Account database ready");
        Ok(repo)
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL,
                imap_host TEXT NOT NULL,
                imap_port INTEGER NOT NULL,
                imap_secure TEXT NOT NULL,
                smtp_host TEXT NOT NULL,
                smtp_port INTEGER NOT NULL,
                smtp_secure TEXT NOT NULL,
                enc_creds TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails or a stored timestamp
    /// is malformed.
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r"
            SELECT id, username,
                   imap_host, imap_port, imap_secure,
                   smtp_host, smtp_port, smtp_secure,
                   enc_creds, created_at, updated_at
            FROM accounts
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_account).transpose()
    }

    /// Get all accounts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r"
            SELECT id, username,
                   imap_host, imap_port, imap_secure,
                   smtp_host, smtp_port, smtp_secure,
                   enc_creds, created_at, updated_at
            FROM accounts
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_account).collect()
    }

    /// Insert a new account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn insert_account(&self, account: NewAccount) -> Result<AccountId> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r"
            INSERT INTO accounts (
                username,
                imap_host, imap_port, imap_secure,
                smtp_host, smtp_port, smtp_secure,
                enc_creds, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&account.username)
        .bind(&account.imap.host)
        .bind(i64::from(account.imap.port))
        .bind(account.imap.security.as_str())
        .bind(&account.smtp.host)
        .bind(i64::from(account.smtp.port))
        .bind(account.smtp.security.as_str())
        .bind(&account.enc_creds)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = AccountId::new(result.last_insert_rowid());
        debug!(account_id = %id, "Inserted account");
        Ok(id)
    }

    /// Replace the sealed credentials of an account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountNotFound`] if no row has this id.
    pub async fn update_credentials(&self, id: AccountId, enc_creds: &str) -> Result<()> {
        let result = sqlx::query(
            r"
            UPDATE accounts SET
                enc_creds = ?,
                updated_at = ?
            WHERE id = ?
            ",
        )
        .bind(enc_creds)
        .bind(Utc::now().to_rfc3339())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AccountNotFound(id.to_string()));
        }
        debug!(account_id = %id, "Updated account credentials");
        Ok(())
    }

    /// Delete an account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete_account(&self, id: AccountId) -> Result<()> {
        sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Convert a database row to an Account.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
    Ok(Account {
        id: AccountId::new(row.get("id")),
        username: row.get("username"),
        imap: Endpoint {
            host: row.get("imap_host"),
            port: row.get::<i64, _>("imap_port") as u16,
            security: Security::from_name(row.get("imap_secure")),
        },
        smtp: Endpoint {
            host: row.get("smtp_host"),
            port: row.get::<i64, _>("smtp_port") as u16,
            security: Security::from_name(row.get("smtp_secure")),
        },
        enc_creds: row.get("enc_creds"),
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Config(format!("bad timestamp {value:?} in accounts table: {e}")))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn new_account() -> NewAccount {
        NewAccount {
            username: "ana@example.com".to_string(),
            imap: Endpoint::new("imap.example.com", 993, Security::Tls),
            smtp: Endpoint::new("smtp.example.com", 587, Security::StartTls),
            enc_creds: "blob-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_retrieve_account() {
        let repo = AccountRepository::in_memory().await.unwrap();

        let id = repo.insert_account(new_account()).await.unwrap();
        let account = repo.get_account(id).await.unwrap().unwrap();

        assert_eq!(account.id, id);
        assert_eq!(account.username, "ana@example.com");
        assert_eq!(account.imap, Endpoint::new("imap.example.com", 993, Security::Tls));
        assert_eq!(account.smtp.security, Security::StartTls);
        assert_eq!(account.enc_creds, "blob-1");
        assert_eq!(account.created_at, account.updated_at);
    }

    #[tokio::test]
    async fn test_missing_account() {
        let repo = AccountRepository::in_memory().await.unwrap();
        assert!(repo.get_account(AccountId::new(7)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_credentials() {
        let repo = AccountRepository::in_memory().await.unwrap();
        let id = repo.insert_account(new_account()).await.unwrap();

        repo.update_credentials(id, "blob-2").await.unwrap();
        let account = repo.get_account(id).await.unwrap().unwrap();
        assert_eq!(account.enc_creds, "blob-2");
        assert!(account.updated_at >= account.created_at);
    }

    #[tokio::test]
    async fn test_update_unknown_account() {
        let repo = AccountRepository::in_memory().await.unwrap();
        let err = repo
            .update_credentials(AccountId::new(99), "blob")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AccountNotFound(ref id) if id == "99"));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let repo = AccountRepository::in_memory().await.unwrap();
        let first = repo.insert_account(new_account()).await.unwrap();
        let second = repo.insert_account(new_account()).await.unwrap();

        let ids: Vec<_> = repo.list_accounts().await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![first, second]);

        repo.delete_account(first).await.unwrap();
        assert_eq!(repo.list_accounts().await.unwrap().len(), 1);
    }
}
