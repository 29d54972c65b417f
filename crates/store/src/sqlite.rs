//! SQLite chat store.
//!
//! Uses a single database file with three tables:
//! - `chats` — one row per chat, keyed by `(uid, id)`, carrying the title,
//!   revision counter and latest document ciphertext
//! - `messages` — the append-only log, ordered by `seq` within a chat
//! - `pdf_uploads` — the upload ledger, latest record per chat
//!
//! Appends run in a transaction whose first statement is a conditional
//! `UPDATE ... WHERE revision = ?`, so two writers holding the same
//! revision cannot both commit.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use fintrack_core::error::StoreError;
use fintrack_core::message::{Chat, ChatId, DocumentUpload, EncryptedBlob, Message, Role};
use fintrack_core::store::ChatStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

pub struct SqliteChatStore {
    pool: SqlitePool,
}

impl SqliteChatStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// An in-process `sqlite::memory:` database is limited to one connection,
    /// since every connection would otherwise see its own empty database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite chat store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                uid         TEXT NOT NULL,
                id          TEXT NOT NULL,
                title       TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                revision    INTEGER NOT NULL DEFAULT 0,
                pdf_text    TEXT,
                PRIMARY KEY (uid, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("chats table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                uid           TEXT NOT NULL,
                chat_id       TEXT NOT NULL,
                seq           INTEGER NOT NULL,
                role          TEXT NOT NULL,
                content       TEXT NOT NULL,
                timestamp     TEXT NOT NULL,
                file_attached INTEGER,
                file_type     TEXT,
                file_name     TEXT,
                PRIMARY KEY (uid, chat_id, seq),
                FOREIGN KEY (uid, chat_id) REFERENCES chats(uid, id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pdf_uploads (
                chat_id         TEXT PRIMARY KEY,
                uid             TEXT NOT NULL,
                encrypted_text  TEXT NOT NULL,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("pdf_uploads table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chats_uid_created ON chats(uid, created_at DESC)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("created_at index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    async fn load_messages(&self, uid: &str, chat_id: &str) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE uid = ?1 AND chat_id = ?2 ORDER BY seq ASC",
        )
        .bind(uid)
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Load messages: {e}")))?;

        rows.iter().map(row_to_message).collect()
    }

    async fn row_to_chat(&self, row: &sqlx::sqlite::SqliteRow) -> Result<Chat, StoreError> {
        let uid: String = column(row, "uid")?;
        let id: String = column(row, "id")?;
        let title: String = column(row, "title")?;
        let created_at: String = column(row, "created_at")?;
        let revision: i64 = column(row, "revision")?;
        let pdf_text: Option<String> = column(row, "pdf_text")?;

        let messages = self.load_messages(&uid, &id).await?;

        Ok(Chat {
            id: ChatId(id),
            uid,
            title,
            created_at: parse_time(&created_at),
            messages,
            pdf_text: pdf_text.map(EncryptedBlob),
            revision: revision.max(0) as u64,
        })
    }
}

fn column<'r, T>(row: &'r sqlx::sqlite::SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, StoreError> {
    let role: String = column(row, "role")?;
    let timestamp: String = column(row, "timestamp")?;

    Ok(Message {
        role: Role::from_str(&role).map_err(StoreError::QueryFailed)?,
        content: column(row, "content")?,
        timestamp: parse_time(&timestamp),
        file_attached: column(row, "file_attached")?,
        file_type: column(row, "file_type")?,
        file_name: column(row, "file_name")?,
    })
}

/// Fixed-width RFC 3339 so lexical order is chronological order.
fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_chat(&self, chat: Chat) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("Begin: {e}")))?;

        sqlx::query(
            "INSERT INTO chats (uid, id, title, created_at, revision, pdf_text) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&chat.uid)
        .bind(chat.id.as_str())
        .bind(&chat.title)
        .bind(format_time(&chat.created_at))
        .bind(chat.revision as i64)
        .bind(chat.pdf_text.as_ref().map(|b| b.as_str()))
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT chat failed: {e}")))?;

        for (seq, message) in chat.messages.iter().enumerate() {
            insert_message(&mut tx, &chat.uid, chat.id.as_str(), seq as i64, message).await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("Commit: {e}")))?;

        debug!(chat_id = %chat.id, "Created chat");
        Ok(())
    }

    async fn list_chats(&self, uid: &str) -> Result<Vec<Chat>, StoreError> {
        let rows = sqlx::query("SELECT * FROM chats WHERE uid = ?1 ORDER BY created_at DESC")
            .bind(uid)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("List chats: {e}")))?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in &rows {
            chats.push(self.row_to_chat(row).await?);
        }
        Ok(chats)
    }

    async fn get_chat(&self, uid: &str, chat_id: &ChatId) -> Result<Option<Chat>, StoreError> {
        let row = sqlx::query("SELECT * FROM chats WHERE uid = ?1 AND id = ?2")
            .bind(uid)
            .bind(chat_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Get chat: {e}")))?;

        match row {
            Some(row) => Ok(Some(self.row_to_chat(&row).await?)),
            None => Ok(None),
        }
    }

    async fn set_document(
        &self,
        uid: &str,
        chat_id: &ChatId,
        blob: &EncryptedBlob,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE chats SET pdf_text = ?1 WHERE uid = ?2 AND id = ?3")
            .bind(blob.as_str())
            .bind(uid)
            .bind(chat_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE pdf_text failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ChatNotFound(chat_id.to_string()));
        }
        Ok(())
    }

    async fn append_messages(
        &self,
        uid: &str,
        chat_id: &ChatId,
        expected_revision: u64,
        messages: &[Message],
        title: Option<&str>,
    ) -> Result<Chat, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("Begin: {e}")))?;

        let updated = sqlx::query(
            r#"
            UPDATE chats
            SET revision = revision + 1, title = COALESCE(?1, title)
            WHERE uid = ?2 AND id = ?3 AND revision = ?4
            "#,
        )
        .bind(title)
        .bind(uid)
        .bind(chat_id.as_str())
        .bind(expected_revision as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE revision failed: {e}")))?;

        if updated.rows_affected() == 0 {
            let found: Option<i64> =
                sqlx::query_scalar("SELECT revision FROM chats WHERE uid = ?1 AND id = ?2")
                    .bind(uid)
                    .bind(chat_id.as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(|e| StoreError::QueryFailed(format!("Read revision: {e}")))?;

            return Err(match found {
                None => StoreError::ChatNotFound(chat_id.to_string()),
                Some(found) => StoreError::RevisionConflict {
                    chat_id: chat_id.to_string(),
                    expected: expected_revision,
                    found: found.max(0) as u64,
                },
            });
        }

        let next_seq: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(seq) + 1, 0) FROM messages WHERE uid = ?1 AND chat_id = ?2",
        )
        .bind(uid)
        .bind(chat_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("Next seq: {e}")))?;

        for (offset, message) in messages.iter().enumerate() {
            insert_message(&mut tx, uid, chat_id.as_str(), next_seq + offset as i64, message)
                .await?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("Commit: {e}")))?;

        debug!(chat_id = %chat_id, appended = messages.len(), "Appended messages");

        self.get_chat(uid, chat_id)
            .await?
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))
    }

    async fn rename_chat(&self, uid: &str, chat_id: &ChatId, title: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE chats SET title = ?1 WHERE uid = ?2 AND id = ?3")
            .bind(title)
            .bind(uid)
            .bind(chat_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("UPDATE title failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_chat(&self, uid: &str, chat_id: &ChatId) -> Result<bool, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("Begin: {e}")))?;

        sqlx::query("DELETE FROM messages WHERE uid = ?1 AND chat_id = ?2")
            .bind(uid)
            .bind(chat_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE messages failed: {e}")))?;

        let deleted = sqlx::query("DELETE FROM chats WHERE uid = ?1 AND id = ?2")
            .bind(uid)
            .bind(chat_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE chat failed: {e}")))?;

        sqlx::query("DELETE FROM pdf_uploads WHERE chat_id = ?1 AND uid = ?2")
            .bind(chat_id.as_str())
            .bind(uid)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("DELETE upload failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("Commit: {e}")))?;

        Ok(deleted.rows_affected() > 0)
    }

    async fn put_upload(&self, upload: DocumentUpload) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO pdf_uploads (chat_id, uid, encrypted_text, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(chat_id) DO UPDATE SET
                uid = excluded.uid,
                encrypted_text = excluded.encrypted_text,
                created_at = excluded.created_at
            "#,
        )
        .bind(upload.chat_id.as_str())
        .bind(&upload.uid)
        .bind(upload.encrypted_text.as_str())
        .bind(format_time(&upload.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPSERT upload failed: {e}")))?;

        Ok(())
    }

    async fn get_upload(&self, chat_id: &ChatId) -> Result<Option<DocumentUpload>, StoreError> {
        let row = sqlx::query("SELECT * FROM pdf_uploads WHERE chat_id = ?1")
            .bind(chat_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Get upload: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let created_at: String = column(&row, "created_at")?;
        Ok(Some(DocumentUpload {
            chat_id: ChatId(column(&row, "chat_id")?),
            uid: column(&row, "uid")?,
            encrypted_text: EncryptedBlob(column(&row, "encrypted_text")?),
            created_at: parse_time(&created_at),
        }))
    }
}

async fn insert_message(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    uid: &str,
    chat_id: &str,
    seq: i64,
    message: &Message,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO messages (uid, chat_id, seq, role, content, timestamp, file_attached, file_type, file_name)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(uid)
    .bind(chat_id)
    .bind(seq)
    .bind(message.role.as_str())
    .bind(&message.content)
    .bind(format_time(&message.timestamp))
    .bind(message.file_attached)
    .bind(&message.file_type)
    .bind(&message.file_name)
    .execute(&mut **tx)
    .await
    .map_err(|e| StoreError::Storage(format!("INSERT message failed: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_store() -> (SqliteChatStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("chats.db").display());
        (SqliteChatStore::new(&url).await.unwrap(), dir)
    }

    async fn seeded(store: &SqliteChatStore, uid: &str) -> ChatId {
        let chat = Chat::new(uid, "New Chat");
        let id = chat.id.clone();
        store.create_chat(chat).await.unwrap();
        id
    }

    #[tokio::test]
    async fn create_and_get() {
        let (store, _dir) = test_store().await;
        let id = seeded(&store, "u1").await;

        let chat = store.get_chat("u1", &id).await.unwrap().unwrap();
        assert_eq!(chat.id, id);
        assert_eq!(chat.title, "New Chat");
        assert_eq!(chat.revision, 0);
        assert!(chat.pdf_text.is_none());
        assert!(store.get_chat("u2", &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_memory_database_works() {
        let store = SqliteChatStore::new("sqlite::memory:").await.unwrap();
        let id = seeded(&store, "u1").await;
        store
            .append_messages("u1", &id, 0, &[Message::user("hi")], None)
            .await
            .unwrap();
        let chat = store.get_chat("u1", &id).await.unwrap().unwrap();
        assert_eq!(chat.messages.len(), 1);
    }

    #[tokio::test]
    async fn list_newest_first() {
        let (store, _dir) = test_store().await;
        let mut old = Chat::new("u1", "old");
        old.created_at = Utc::now() - Duration::days(2);
        store.create_chat(old).await.unwrap();
        store.create_chat(Chat::new("u1", "new")).await.unwrap();
        store.create_chat(Chat::new("u2", "other")).await.unwrap();

        let titles: Vec<_> = store
            .list_chats("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.title)
            .collect();
        assert_eq!(titles, ["new", "old"]);
    }

    #[tokio::test]
    async fn append_preserves_order_and_attachment_fields() {
        let (store, _dir) = test_store().await;
        let id = seeded(&store, "u1").await;

        let first = [
            Message::user("Here is March").with_attachment("pdf", "march.pdf"),
            Message::assistant("Thanks."),
        ];
        let chat = store
            .append_messages("u1", &id, 0, &first, Some("March Review"))
            .await
            .unwrap();
        assert_eq!(chat.revision, 1);
        assert_eq!(chat.title, "March Review");

        let chat = store
            .append_messages(
                "u1",
                &id,
                1,
                &[Message::user("Total?"), Message::assistant("$900")],
                None,
            )
            .await
            .unwrap();

        let contents: Vec<_> = chat.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["Here is March", "Thanks.", "Total?", "$900"]);
        assert_eq!(chat.messages[0].file_name.as_deref(), Some("march.pdf"));
        assert_eq!(chat.messages[0].file_attached, Some(true));
        assert_eq!(chat.messages[1].role, Role::Assistant);
        assert!(chat.messages[2].file_attached.is_none());
        assert_eq!(chat.title, "March Review");
    }

    #[tokio::test]
    async fn stale_revision_conflicts_and_leaves_log_untouched() {
        let (store, _dir) = test_store().await;
        let id = seeded(&store, "u1").await;
        store
            .append_messages("u1", &id, 0, &[Message::user("a")], None)
            .await
            .unwrap();

        let err = store
            .append_messages("u1", &id, 0, &[Message::user("b")], Some("Lost"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::RevisionConflict { expected: 0, found: 1, .. }
        ));

        let chat = store.get_chat("u1", &id).await.unwrap().unwrap();
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.title, "New Chat");
    }

    #[tokio::test]
    async fn append_to_missing_chat_is_not_found() {
        let (store, _dir) = test_store().await;
        let err = store
            .append_messages("u1", &ChatId::from("missing"), 0, &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ChatNotFound(_)));
    }

    #[tokio::test]
    async fn document_and_upload_ledger() {
        let (store, _dir) = test_store().await;
        let id = seeded(&store, "u1").await;

        store
            .set_document("u1", &id, &EncryptedBlob("00:11".into()))
            .await
            .unwrap();
        store
            .put_upload(DocumentUpload {
                chat_id: id.clone(),
                uid: "u1".into(),
                encrypted_text: EncryptedBlob("00:11".into()),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .put_upload(DocumentUpload {
                chat_id: id.clone(),
                uid: "u1".into(),
                encrypted_text: EncryptedBlob("22:33".into()),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let chat = store.get_chat("u1", &id).await.unwrap().unwrap();
        assert_eq!(chat.pdf_text.unwrap().as_str(), "00:11");
        assert_eq!(chat.revision, 0);
        let upload = store.get_upload(&id).await.unwrap().unwrap();
        assert_eq!(upload.encrypted_text.as_str(), "22:33");

        let err = store
            .set_document("u1", &ChatId::from("missing"), &EncryptedBlob("x:y".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ChatNotFound(_)));
    }

    #[tokio::test]
    async fn delete_cascades() {
        let (store, _dir) = test_store().await;
        let id = seeded(&store, "u1").await;
        store
            .append_messages("u1", &id, 0, &[Message::user("hi")], None)
            .await
            .unwrap();
        store
            .put_upload(DocumentUpload {
                chat_id: id.clone(),
                uid: "u1".into(),
                encrypted_text: EncryptedBlob("00:11".into()),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        assert!(store.delete_chat("u1", &id).await.unwrap());
        assert!(store.get_chat("u1", &id).await.unwrap().is_none());
        assert!(store.get_upload(&id).await.unwrap().is_none());
        assert!(!store.delete_chat("u1", &id).await.unwrap());

        // Same id recreated starts with an empty log.
        let mut again = Chat::new("u1", "again");
        again.id = id.clone();
        store.create_chat(again).await.unwrap();
        let chat = store.get_chat("u1", &id).await.unwrap().unwrap();
        assert!(chat.messages.is_empty());
    }

    #[tokio::test]
    async fn rename() {
        let (store, _dir) = test_store().await;
        let id = seeded(&store, "u1").await;
        assert!(store.rename_chat("u1", &id, "Groceries").await.unwrap());
        assert!(!store.rename_chat("u2", &id, "Groceries").await.unwrap());
        assert_eq!(
            store.get_chat("u1", &id).await.unwrap().unwrap().title,
            "Groceries"
        );
    }

    #[tokio::test]
    async fn reopen_persists() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("chats.db").display());
        let id = {
            let store = SqliteChatStore::new(&url).await.unwrap();
            let id = seeded(&store, "u1").await;
            store
                .append_messages("u1", &id, 0, &[Message::user("persist me")], None)
                .await
                .unwrap();
            id
        };

        let store = SqliteChatStore::new(&url).await.unwrap();
        let chat = store.get_chat("u1", &id).await.unwrap().unwrap();
        assert_eq!(chat.messages[0].content, "persist me");
        assert_eq!(chat.revision, 1);
    }
}
