use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cchat::{
    AiModel, Character, ChatSession, MessageRole, NewMessage, SessionSnapshot, StoredMessage,
    SystemPrompt, UserProfile,
};
use ccommon::{
    AiModelId, BoxFuture, CharacterId, MessageId, SessionId, SystemPromptId, UserProfileId,
};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::backend::MemoryBackend;
use crate::error::MemoryError;
use crate::types::{
    AiModelDraft, CatalogEntity, CatalogRow, CharacterDraft, SessionDraft, SystemPromptDraft,
    UserProfileDraft,
};

const SESSION_COLUMNS: &str = "
    id,
    name,
    character_id,
    user_profile_id,
    ai_model_id,
    system_prompt_id,
    pre_prompt,
    pre_prompt_enabled,
    post_prompt,
    post_prompt_enabled,
    created_at_secs,
    created_at_nanos,
    last_activity_secs,
    last_activity_nanos
";

const MESSAGE_COLUMNS: &str = "id, session_id, role, content, created_at_secs, created_at_nanos";

#[derive(Debug)]
pub struct SqliteMemoryBackend {
    connection: Mutex<Connection>,
}

impl SqliteMemoryBackend {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                MemoryError::storage(format!(
                    "failed to create sqlite parent directory: {error}"
                ))
            })?;
        }

        let connection = Connection::open(path).map_err(|error| {
            MemoryError::storage(format!("failed to open sqlite database: {error}"))
        })?;
        Self::from_connection(connection)
    }

    pub fn new_in_memory() -> Result<Self, MemoryError> {
        let connection = Connection::open_in_memory().map_err(|error| {
            MemoryError::storage(format!("failed to open in-memory sqlite database: {error}"))
        })?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self, MemoryError> {
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(|error| {
                MemoryError::storage(format!("failed to configure sqlite busy timeout: {error}"))
            })?;
        let backend = Self {
            connection: Mutex::new(connection),
        };
        backend.initialize_schema()?;
        Ok(backend)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, MemoryError> {
        self.connection
            .lock()
            .map_err(|_| MemoryError::storage("sqlite backend lock poisoned"))
    }

    fn initialize_schema(&self) -> Result<(), MemoryError> {
        let conn = self.connection()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS characters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                created_at_secs INTEGER NOT NULL,
                created_at_nanos INTEGER NOT NULL,
                updated_at_secs INTEGER NOT NULL,
                updated_at_nanos INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_profiles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT,
                created_at_secs INTEGER NOT NULL,
                created_at_nanos INTEGER NOT NULL,
                updated_at_secs INTEGER NOT NULL,
                updated_at_nanos INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ai_models (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL,
                description TEXT,
                created_at_secs INTEGER NOT NULL,
                created_at_nanos INTEGER NOT NULL,
                updated_at_secs INTEGER NOT NULL,
                updated_at_nanos INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS system_prompts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at_secs INTEGER NOT NULL,
                created_at_nanos INTEGER NOT NULL,
                updated_at_secs INTEGER NOT NULL,
                updated_at_nanos INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                character_id INTEGER REFERENCES characters(id),
                user_profile_id INTEGER REFERENCES user_profiles(id),
                ai_model_id INTEGER REFERENCES ai_models(id),
                system_prompt_id INTEGER REFERENCES system_prompts(id),
                pre_prompt TEXT,
                pre_prompt_enabled INTEGER NOT NULL DEFAULT 0,
                post_prompt TEXT,
                post_prompt_enabled INTEGER NOT NULL DEFAULT 0,
                created_at_secs INTEGER NOT NULL,
                created_at_nanos INTEGER NOT NULL,
                last_activity_secs INTEGER NOT NULL,
                last_activity_nanos INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                content TEXT NOT NULL,
                created_at_secs INTEGER NOT NULL,
                created_at_nanos INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_session_order
            ON messages(session_id, created_at_secs, created_at_nanos, id);
            ",
        )
        .map_err(|error| {
            MemoryError::storage(format!("failed to initialize sqlite schema: {error}"))
        })?;

        Ok(())
    }

    fn create_catalog<T: CatalogEntity>(&self, draft: T::Draft) -> Result<T, MemoryError> {
        let (key, body) = T::split_draft(draft)?;
        let now = SystemTime::now();
        let (secs, nanos) = encode_system_time(now)?;

        let conn = self.connection()?;
        conn.execute(
            &format!(
                "
                INSERT INTO {table} (
                    {key_column},
                    {body_column},
                    created_at_secs,
                    created_at_nanos,
                    updated_at_secs,
                    updated_at_nanos
                )
                VALUES (?1, ?2, ?3, ?4, ?3, ?4)
                ",
                table = T::TABLE,
                key_column = T::KEY_COLUMN,
                body_column = T::BODY_COLUMN,
            ),
            params![key, body, secs, nanos],
        )
        .map_err(|error| MemoryError::storage(format!("failed to insert {}: {error}", T::NOUN)))?;

        Ok(T::from_row(CatalogRow {
            id: conn.last_insert_rowid(),
            key,
            body,
            created_at: now,
            updated_at: now,
        }))
    }

    fn get_catalog<T: CatalogEntity>(&self, id: T::Id) -> Result<Option<T>, MemoryError> {
        let conn = self.connection()?;
        select_catalog::<T>(&conn, id.into())
    }

    fn update_catalog<T: CatalogEntity>(
        &self,
        id: T::Id,
        draft: T::Draft,
    ) -> Result<T, MemoryError> {
        let id: i64 = id.into();
        let (key, body) = T::split_draft(draft)?;
        let (secs, nanos) = encode_system_time(SystemTime::now())?;

        let conn = self.connection()?;
        let updated = conn
            .execute(
                &format!(
                    "
                    UPDATE {table}
                    SET {key_column} = ?2,
                        {body_column} = ?3,
                        updated_at_secs = ?4,
                        updated_at_nanos = ?5
                    WHERE id = ?1
                    ",
                    table = T::TABLE,
                    key_column = T::KEY_COLUMN,
                    body_column = T::BODY_COLUMN,
                ),
                params![id, key, body, secs, nanos],
            )
            .map_err(|error| {
                MemoryError::storage(format!("failed to update {}: {error}", T::NOUN))
            })?;
        if updated == 0 {
            return Err(MemoryError::not_found(format!("{} {id} not found", T::NOUN)));
        }

        select_catalog::<T>(&conn, id)?
            .ok_or_else(|| MemoryError::not_found(format!("{} {id} not found", T::NOUN)))
    }

    fn delete_catalog<T: CatalogEntity>(&self, id: T::Id) -> Result<(), MemoryError> {
        let id: i64 = id.into();
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(|error| {
            MemoryError::storage(format!("failed to begin sqlite transaction: {error}"))
        })?;

        if select_catalog::<T>(&tx, id)?.is_none() {
            return Err(MemoryError::not_found(format!("{} {id} not found", T::NOUN)));
        }

        let in_use: i64 = tx
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM sessions WHERE {column} = ?1",
                    column = T::SESSION_COLUMN
                ),
                params![id],
                |row| row.get(0),
            )
            .map_err(|error| {
                MemoryError::storage(format!("failed to count {} references: {error}", T::NOUN))
            })?;
        if in_use > 0 {
            return Err(MemoryError::conflict(format!(
                "{} {id} is used by {in_use} session(s)",
                T::NOUN
            )));
        }

        tx.execute(
            &format!("DELETE FROM {table} WHERE id = ?1", table = T::TABLE),
            params![id],
        )
        .map_err(|error| MemoryError::storage(format!("failed to delete {}: {error}", T::NOUN)))?;
        tx.commit().map_err(|error| {
            MemoryError::storage(format!("failed to commit sqlite transaction: {error}"))
        })
    }

    /// Case-insensitive for ASCII; SQLite's `lower` leaves other characters unchanged.
    fn search_catalog<T: CatalogEntity>(&self, query: &str) -> Result<Vec<T>, MemoryError> {
        let conn = self.connection()?;
        let mut statement = conn
            .prepare(&format!(
                "
                SELECT
                    id,
                    {key_column},
                    {body_column},
                    created_at_secs,
                    created_at_nanos,
                    updated_at_secs,
                    updated_at_nanos
                FROM {table}
                WHERE instr(lower({key_column}), lower(?1)) > 0
                ORDER BY id ASC
                ",
                table = T::TABLE,
                key_column = T::KEY_COLUMN,
                body_column = T::BODY_COLUMN,
            ))
            .map_err(|error| {
                MemoryError::storage(format!("failed to prepare {} search: {error}", T::NOUN))
            })?;

        let raw_rows = statement
            .query_map(params![query], read_catalog_row)
            .map_err(|error| {
                MemoryError::storage(format!("failed to search {}: {error}", T::NOUN))
            })?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| {
                MemoryError::storage(format!("failed to decode {} row: {error}", T::NOUN))
            })?;

        raw_rows
            .into_iter()
            .map(|raw| raw.decode().map(T::from_row))
            .collect()
    }

    fn write_session(
        &self,
        id: Option<SessionId>,
        draft: SessionDraft,
    ) -> Result<ChatSession, MemoryError> {
        draft.validate()?;
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(|error| {
            MemoryError::storage(format!("failed to begin sqlite transaction: {error}"))
        })?;

        check_reference::<Character>(&tx, draft.character_id)?;
        check_reference::<UserProfile>(&tx, draft.user_profile_id)?;
        check_reference::<AiModel>(&tx, draft.ai_model_id)?;
        check_reference::<SystemPrompt>(&tx, draft.system_prompt_id)?;

        let id = match id {
            Some(id) => {
                let updated = tx
                    .execute(
                        "
                        UPDATE sessions
                        SET name = ?2,
                            character_id = ?3,
                            user_profile_id = ?4,
                            ai_model_id = ?5,
                            system_prompt_id = ?6,
                            pre_prompt = ?7,
                            pre_prompt_enabled = ?8,
                            post_prompt = ?9,
                            post_prompt_enabled = ?10
                        WHERE id = ?1
                        ",
                        params![
                            id.get(),
                            draft.name,
                            draft.character_id.map(i64::from),
                            draft.user_profile_id.map(i64::from),
                            draft.ai_model_id.map(i64::from),
                            draft.system_prompt_id.map(i64::from),
                            draft.pre_prompt,
                            draft.pre_prompt_enabled,
                            draft.post_prompt,
                            draft.post_prompt_enabled,
                        ],
                    )
                    .map_err(|error| {
                        MemoryError::storage(format!("failed to update session: {error}"))
                    })?;
                if updated == 0 {
                    return Err(MemoryError::not_found(format!("session {id} not found")));
                }
                id
            }
            None => {
                let (secs, nanos) = encode_system_time(SystemTime::now())?;
                tx.execute(
                    "
                    INSERT INTO sessions (
                        name,
                        character_id,
                        user_profile_id,
                        ai_model_id,
                        system_prompt_id,
                        pre_prompt,
                        pre_prompt_enabled,
                        post_prompt,
                        post_prompt_enabled,
                        created_at_secs,
                        created_at_nanos,
                        last_activity_secs,
                        last_activity_nanos
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?10, ?11)
                    ",
                    params![
                        draft.name,
                        draft.character_id.map(i64::from),
                        draft.user_profile_id.map(i64::from),
                        draft.ai_model_id.map(i64::from),
                        draft.system_prompt_id.map(i64::from),
                        draft.pre_prompt,
                        draft.pre_prompt_enabled,
                        draft.post_prompt,
                        draft.post_prompt_enabled,
                        secs,
                        nanos,
                    ],
                )
                .map_err(|error| {
                    MemoryError::storage(format!("failed to insert session: {error}"))
                })?;
                SessionId::new(tx.last_insert_rowid())
            }
        };

        let session = select_session(&tx, id)?
            .ok_or_else(|| MemoryError::not_found(format!("session {id} not found")))?;
        tx.commit().map_err(|error| {
            MemoryError::storage(format!("failed to commit sqlite transaction: {error}"))
        })?;
        Ok(session)
    }

    fn query_messages(
        &self,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<StoredMessage>, MemoryError> {
        let conn = self.connection()?;
        let mut statement = conn.prepare(sql).map_err(|error| {
            MemoryError::storage(format!("failed to prepare message query: {error}"))
        })?;

        let raw_rows = statement
            .query_map(params, read_message_row)
            .map_err(|error| MemoryError::storage(format!("failed to load messages: {error}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| {
                MemoryError::storage(format!("failed to decode message row: {error}"))
            })?;

        raw_rows.into_iter().map(RawMessage::decode).collect()
    }
}

impl MemoryBackend for SqliteMemoryBackend {
    fn create_character<'a>(
        &'a self,
        draft: CharacterDraft,
    ) -> BoxFuture<'a, Result<Character, MemoryError>> {
        Box::pin(async move { self.create_catalog::<Character>(draft) })
    }

    fn get_character<'a>(
        &'a self,
        id: CharacterId,
    ) -> BoxFuture<'a, Result<Option<Character>, MemoryError>> {
        Box::pin(async move { self.get_catalog::<Character>(id) })
    }

    fn update_character<'a>(
        &'a self,
        id: CharacterId,
        draft: CharacterDraft,
    ) -> BoxFuture<'a, Result<Character, MemoryError>> {
        Box::pin(async move { self.update_catalog::<Character>(id, draft) })
    }

    fn delete_character<'a>(&'a self, id: CharacterId) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move { self.delete_catalog::<Character>(id) })
    }

    fn search_characters<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Character>, MemoryError>> {
        Box::pin(async move { self.search_catalog::<Character>(query) })
    }

    fn create_user_profile<'a>(
        &'a self,
        draft: UserProfileDraft,
    ) -> BoxFuture<'a, Result<UserProfile, MemoryError>> {
        Box::pin(async move { self.create_catalog::<UserProfile>(draft) })
    }

    fn get_user_profile<'a>(
        &'a self,
        id: UserProfileId,
    ) -> BoxFuture<'a, Result<Option<UserProfile>, MemoryError>> {
        Box::pin(async move { self.get_catalog::<UserProfile>(id) })
    }

    fn update_user_profile<'a>(
        &'a self,
        id: UserProfileId,
        draft: UserProfileDraft,
    ) -> BoxFuture<'a, Result<UserProfile, MemoryError>> {
        Box::pin(async move { self.update_catalog::<UserProfile>(id, draft) })
    }

    fn delete_user_profile<'a>(
        &'a self,
        id: UserProfileId,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move { self.delete_catalog::<UserProfile>(id) })
    }

    fn search_user_profiles<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<UserProfile>, MemoryError>> {
        Box::pin(async move { self.search_catalog::<UserProfile>(query) })
    }

    fn create_ai_model<'a>(
        &'a self,
        draft: AiModelDraft,
    ) -> BoxFuture<'a, Result<AiModel, MemoryError>> {
        Box::pin(async move { self.create_catalog::<AiModel>(draft) })
    }

    fn get_ai_model<'a>(
        &'a self,
        id: AiModelId,
    ) -> BoxFuture<'a, Result<Option<AiModel>, MemoryError>> {
        Box::pin(async move { self.get_catalog::<AiModel>(id) })
    }

    fn update_ai_model<'a>(
        &'a self,
        id: AiModelId,
        draft: AiModelDraft,
    ) -> BoxFuture<'a, Result<AiModel, MemoryError>> {
        Box::pin(async move { self.update_catalog::<AiModel>(id, draft) })
    }

    fn delete_ai_model<'a>(&'a self, id: AiModelId) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move { self.delete_catalog::<AiModel>(id) })
    }

    fn search_ai_models<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<AiModel>, MemoryError>> {
        Box::pin(async move { self.search_catalog::<AiModel>(query) })
    }

    fn create_system_prompt<'a>(
        &'a self,
        draft: SystemPromptDraft,
    ) -> BoxFuture<'a, Result<SystemPrompt, MemoryError>> {
        Box::pin(async move { self.create_catalog::<SystemPrompt>(draft) })
    }

    fn get_system_prompt<'a>(
        &'a self,
        id: SystemPromptId,
    ) -> BoxFuture<'a, Result<Option<SystemPrompt>, MemoryError>> {
        Box::pin(async move { self.get_catalog::<SystemPrompt>(id) })
    }

    fn update_system_prompt<'a>(
        &'a self,
        id: SystemPromptId,
        draft: SystemPromptDraft,
    ) -> BoxFuture<'a, Result<SystemPrompt, MemoryError>> {
        Box::pin(async move { self.update_catalog::<SystemPrompt>(id, draft) })
    }

    fn delete_system_prompt<'a>(
        &'a self,
        id: SystemPromptId,
    ) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move { self.delete_catalog::<SystemPrompt>(id) })
    }

    fn search_system_prompts<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<SystemPrompt>, MemoryError>> {
        Box::pin(async move { self.search_catalog::<SystemPrompt>(query) })
    }

    fn create_session<'a>(
        &'a self,
        draft: SessionDraft,
    ) -> BoxFuture<'a, Result<ChatSession, MemoryError>> {
        Box::pin(async move { self.write_session(None, draft) })
    }

    fn get_session<'a>(
        &'a self,
        id: SessionId,
    ) -> BoxFuture<'a, Result<Option<ChatSession>, MemoryError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            select_session(&conn, id)
        })
    }

    fn load_session_snapshot<'a>(
        &'a self,
        id: SessionId,
    ) -> BoxFuture<'a, Result<Option<SessionSnapshot>, MemoryError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let Some(session) = select_session(&conn, id)? else {
                return Ok(None);
            };

            let character = match session.character_id {
                Some(id) => select_catalog::<Character>(&conn, id.get())?,
                None => None,
            };
            let user_profile = match session.user_profile_id {
                Some(id) => select_catalog::<UserProfile>(&conn, id.get())?,
                None => None,
            };
            let ai_model = match session.ai_model_id {
                Some(id) => select_catalog::<AiModel>(&conn, id.get())?,
                None => None,
            };
            let system_prompt = match session.system_prompt_id {
                Some(id) => select_catalog::<SystemPrompt>(&conn, id.get())?,
                None => None,
            };

            Ok(Some(SessionSnapshot {
                session,
                character,
                user_profile,
                ai_model,
                system_prompt,
            }))
        })
    }

    fn update_session<'a>(
        &'a self,
        id: SessionId,
        draft: SessionDraft,
    ) -> BoxFuture<'a, Result<ChatSession, MemoryError>> {
        Box::pin(async move { self.write_session(Some(id), draft) })
    }

    fn delete_session<'a>(&'a self, id: SessionId) -> BoxFuture<'a, Result<(), MemoryError>> {
        Box::pin(async move {
            let mut conn = self.connection()?;
            let tx = conn.transaction().map_err(|error| {
                MemoryError::storage(format!("failed to begin sqlite transaction: {error}"))
            })?;

            tx.execute("DELETE FROM messages WHERE session_id = ?1", params![id.get()])
                .map_err(|error| {
                    MemoryError::storage(format!("failed to delete session messages: {error}"))
                })?;
            let deleted = tx
                .execute("DELETE FROM sessions WHERE id = ?1", params![id.get()])
                .map_err(|error| {
                    MemoryError::storage(format!("failed to delete session: {error}"))
                })?;
            if deleted == 0 {
                return Err(MemoryError::not_found(format!("session {id} not found")));
            }

            tx.commit().map_err(|error| {
                MemoryError::storage(format!("failed to commit sqlite transaction: {error}"))
            })
        })
    }

    fn search_sessions<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ChatSession>, MemoryError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let mut statement = conn
                .prepare(&format!(
                    "
                    SELECT {SESSION_COLUMNS}
                    FROM sessions
                    WHERE instr(lower(name), lower(?1)) > 0
                    ORDER BY id ASC
                    "
                ))
                .map_err(|error| {
                    MemoryError::storage(format!("failed to prepare session search: {error}"))
                })?;

            let raw_rows = statement
                .query_map(params![query], read_session_row)
                .map_err(|error| {
                    MemoryError::storage(format!("failed to search sessions: {error}"))
                })?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|error| {
                    MemoryError::storage(format!("failed to decode session row: {error}"))
                })?;

            raw_rows.into_iter().map(RawSession::decode).collect()
        })
    }

    fn list_messages<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, MemoryError>> {
        Box::pin(async move {
            self.query_messages(
                &format!(
                    "
                    SELECT {MESSAGE_COLUMNS}
                    FROM messages
                    WHERE session_id = ?1
                    ORDER BY created_at_secs ASC, created_at_nanos ASC, id ASC
                    "
                ),
                params![session_id.get()],
            )
        })
    }

    fn latest_messages<'a>(
        &'a self,
        session_id: SessionId,
        count: usize,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, MemoryError>> {
        Box::pin(async move {
            let mut messages = self.query_messages(
                &format!(
                    "
                    SELECT {MESSAGE_COLUMNS}
                    FROM messages
                    WHERE session_id = ?1
                    ORDER BY created_at_secs DESC, created_at_nanos DESC, id DESC
                    LIMIT ?2
                    "
                ),
                params![session_id.get(), to_sql_count(count)],
            )?;
            messages.reverse();
            Ok(messages)
        })
    }

    fn message_page<'a>(
        &'a self,
        session_id: SessionId,
        offset: usize,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, MemoryError>> {
        Box::pin(async move {
            self.query_messages(
                &format!(
                    "
                    SELECT {MESSAGE_COLUMNS}
                    FROM messages
                    WHERE session_id = ?1
                    ORDER BY created_at_secs DESC, created_at_nanos DESC, id DESC
                    LIMIT ?2 OFFSET ?3
                    "
                ),
                params![session_id.get(), to_sql_count(limit), to_sql_count(offset)],
            )
        })
    }

    fn count_messages<'a>(
        &'a self,
        session_id: SessionId,
    ) -> BoxFuture<'a, Result<usize, MemoryError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM messages WHERE session_id = ?1",
                    params![session_id.get()],
                    |row| row.get(0),
                )
                .map_err(|error| {
                    MemoryError::storage(format!("failed to count messages: {error}"))
                })?;
            Ok(usize::try_from(count).unwrap_or_default())
        })
    }

    fn get_message<'a>(
        &'a self,
        id: MessageId,
    ) -> BoxFuture<'a, Result<Option<StoredMessage>, MemoryError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            select_message(&conn, id)
        })
    }

    fn insert_message<'a>(
        &'a self,
        message: NewMessage,
    ) -> BoxFuture<'a, Result<StoredMessage, MemoryError>> {
        Box::pin(async move {
            let now = SystemTime::now();
            let (secs, nanos) = encode_system_time(now)?;

            let mut conn = self.connection()?;
            let tx = conn.transaction().map_err(|error| {
                MemoryError::storage(format!("failed to begin sqlite transaction: {error}"))
            })?;

            if select_session(&tx, message.session_id)?.is_none() {
                return Err(MemoryError::not_found(format!(
                    "session {} not found",
                    message.session_id
                )));
            }

            tx.execute(
                "
                INSERT INTO messages (session_id, role, content, created_at_secs, created_at_nanos)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
                params![
                    message.session_id.get(),
                    message.role.as_str(),
                    message.content,
                    secs,
                    nanos
                ],
            )
            .map_err(|error| MemoryError::storage(format!("failed to insert message: {error}")))?;
            let id = MessageId::new(tx.last_insert_rowid());
            touch_session(&tx, message.session_id, secs, nanos)?;

            tx.commit().map_err(|error| {
                MemoryError::storage(format!("failed to commit sqlite transaction: {error}"))
            })?;

            Ok(StoredMessage {
                id,
                session_id: message.session_id,
                role: message.role,
                content: message.content,
                created_at: now,
            })
        })
    }

    fn update_message_content<'a>(
        &'a self,
        id: MessageId,
        content: String,
    ) -> BoxFuture<'a, Result<StoredMessage, MemoryError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let updated = conn
                .execute(
                    "UPDATE messages SET content = ?2 WHERE id = ?1",
                    params![id.get(), content],
                )
                .map_err(|error| {
                    MemoryError::storage(format!("failed to update message: {error}"))
                })?;
            if updated == 0 {
                return Err(MemoryError::not_found(format!("message {id} not found")));
            }

            select_message(&conn, id)?
                .ok_or_else(|| MemoryError::not_found(format!("message {id} not found")))
        })
    }

    fn delete_message_and_following<'a>(
        &'a self,
        id: MessageId,
    ) -> BoxFuture<'a, Result<usize, MemoryError>> {
        Box::pin(async move {
            let mut conn = self.connection()?;
            let tx = conn.transaction().map_err(|error| {
                MemoryError::storage(format!("failed to begin sqlite transaction: {error}"))
            })?;

            let anchor = tx
                .query_row(
                    "
                    SELECT session_id, created_at_secs, created_at_nanos
                    FROM messages
                    WHERE id = ?1
                    ",
                    params![id.get()],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()
                .map_err(|error| {
                    MemoryError::storage(format!("failed to load message: {error}"))
                })?;
            let Some((session_id, secs, nanos)) = anchor else {
                return Err(MemoryError::not_found(format!("message {id} not found")));
            };

            let deleted = tx
                .execute(
                    "
                    DELETE FROM messages
                    WHERE session_id = ?1
                      AND (
                        created_at_secs > ?2
                        OR (created_at_secs = ?2 AND created_at_nanos > ?3)
                        OR (created_at_secs = ?2 AND created_at_nanos = ?3 AND id >= ?4)
                      )
                    ",
                    params![session_id, secs, nanos, id.get()],
                )
                .map_err(|error| {
                    MemoryError::storage(format!("failed to delete messages: {error}"))
                })?;

            let (now_secs, now_nanos) = encode_system_time(SystemTime::now())?;
            touch_session(&tx, SessionId::new(session_id), now_secs, now_nanos)?;
            tx.commit().map_err(|error| {
                MemoryError::storage(format!("failed to commit sqlite transaction: {error}"))
            })?;

            Ok(deleted)
        })
    }
}

struct RawCatalogRow {
    id: i64,
    key: String,
    body: Option<String>,
    created_at_secs: i64,
    created_at_nanos: i64,
    updated_at_secs: i64,
    updated_at_nanos: i64,
}

impl RawCatalogRow {
    fn decode(self) -> Result<CatalogRow, MemoryError> {
        Ok(CatalogRow {
            id: self.id,
            key: self.key,
            body: self.body,
            created_at: decode_system_time(self.created_at_secs, self.created_at_nanos)?,
            updated_at: decode_system_time(self.updated_at_secs, self.updated_at_nanos)?,
        })
    }
}

fn read_catalog_row(row: &Row<'_>) -> rusqlite::Result<RawCatalogRow> {
    Ok(RawCatalogRow {
        id: row.get(0)?,
        key: row.get(1)?,
        body: row.get(2)?,
        created_at_secs: row.get(3)?,
        created_at_nanos: row.get(4)?,
        updated_at_secs: row.get(5)?,
        updated_at_nanos: row.get(6)?,
    })
}

fn select_catalog<T: CatalogEntity>(conn: &Connection, id: i64) -> Result<Option<T>, MemoryError> {
    let raw = conn
        .query_row(
            &format!(
                "
                SELECT
                    id,
                    {key_column},
                    {body_column},
                    created_at_secs,
                    created_at_nanos,
                    updated_at_secs,
                    updated_at_nanos
                FROM {table}
                WHERE id = ?1
                ",
                table = T::TABLE,
                key_column = T::KEY_COLUMN,
                body_column = T::BODY_COLUMN,
            ),
            params![id],
            read_catalog_row,
        )
        .optional()
        .map_err(|error| MemoryError::storage(format!("failed to load {}: {error}", T::NOUN)))?;

    raw.map(|raw| raw.decode().map(T::from_row)).transpose()
}

fn check_reference<T: CatalogEntity>(
    conn: &Connection,
    id: Option<T::Id>,
) -> Result<(), MemoryError> {
    let Some(id) = id.map(Into::<i64>::into) else {
        return Ok(());
    };
    match select_catalog::<T>(conn, id)? {
        Some(_) => Ok(()),
        None => Err(MemoryError::not_found(format!("{} {id} not found", T::NOUN))),
    }
}

struct RawSession {
    id: i64,
    name: String,
    character_id: Option<i64>,
    user_profile_id: Option<i64>,
    ai_model_id: Option<i64>,
    system_prompt_id: Option<i64>,
    pre_prompt: Option<String>,
    pre_prompt_enabled: bool,
    post_prompt: Option<String>,
    post_prompt_enabled: bool,
    created_at_secs: i64,
    created_at_nanos: i64,
    last_activity_secs: i64,
    last_activity_nanos: i64,
}

impl RawSession {
    fn decode(self) -> Result<ChatSession, MemoryError> {
        Ok(ChatSession {
            id: SessionId::new(self.id),
            name: self.name,
            character_id: self.character_id.map(CharacterId::new),
            user_profile_id: self.user_profile_id.map(UserProfileId::new),
            ai_model_id: self.ai_model_id.map(AiModelId::new),
            system_prompt_id: self.system_prompt_id.map(SystemPromptId::new),
            pre_prompt: self.pre_prompt,
            pre_prompt_enabled: self.pre_prompt_enabled,
            post_prompt: self.post_prompt,
            post_prompt_enabled: self.post_prompt_enabled,
            created_at: decode_system_time(self.created_at_secs, self.created_at_nanos)?,
            last_activity_at: decode_system_time(
                self.last_activity_secs,
                self.last_activity_nanos,
            )?,
        })
    }
}

fn read_session_row(row: &Row<'_>) -> rusqlite::Result<RawSession> {
    Ok(RawSession {
        id: row.get(0)?,
        name: row.get(1)?,
        character_id: row.get(2)?,
        user_profile_id: row.get(3)?,
        ai_model_id: row.get(4)?,
        system_prompt_id: row.get(5)?,
        pre_prompt: row.get(6)?,
        pre_prompt_enabled: row.get(7)?,
        post_prompt: row.get(8)?,
        post_prompt_enabled: row.get(9)?,
        created_at_secs: row.get(10)?,
        created_at_nanos: row.get(11)?,
        last_activity_secs: row.get(12)?,
        last_activity_nanos: row.get(13)?,
    })
}

fn select_session(conn: &Connection, id: SessionId) -> Result<Option<ChatSession>, MemoryError> {
    conn.query_row(
        &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
        params![id.get()],
        read_session_row,
    )
    .optional()
    .map_err(|error| MemoryError::storage(format!("failed to load session: {error}")))?
    .map(RawSession::decode)
    .transpose()
}

fn touch_session(
    conn: &Connection,
    id: SessionId,
    secs: i64,
    nanos: i64,
) -> Result<(), MemoryError> {
    conn.execute(
        "
        UPDATE sessions
        SET last_activity_secs = ?2, last_activity_nanos = ?3
        WHERE id = ?1
        ",
        params![id.get(), secs, nanos],
    )
    .map_err(|error| {
        MemoryError::storage(format!("failed to refresh session activity: {error}"))
    })?;
    Ok(())
}

struct RawMessage {
    id: i64,
    session_id: i64,
    role: String,
    content: String,
    created_at_secs: i64,
    created_at_nanos: i64,
}

impl RawMessage {
    fn decode(self) -> Result<StoredMessage, MemoryError> {
        let role = MessageRole::parse(&self.role).ok_or_else(|| {
            MemoryError::storage(format!("unknown message role '{}'", self.role))
        })?;

        Ok(StoredMessage {
            id: MessageId::new(self.id),
            session_id: SessionId::new(self.session_id),
            role,
            content: self.content,
            created_at: decode_system_time(self.created_at_secs, self.created_at_nanos)?,
        })
    }
}

fn read_message_row(row: &Row<'_>) -> rusqlite::Result<RawMessage> {
    Ok(RawMessage {
        id: row.get(0)?,
        session_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        created_at_secs: row.get(4)?,
        created_at_nanos: row.get(5)?,
    })
}

fn select_message(conn: &Connection, id: MessageId) -> Result<Option<StoredMessage>, MemoryError> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
        params![id.get()],
        read_message_row,
    )
    .optional()
    .map_err(|error| MemoryError::storage(format!("failed to load message: {error}")))?
    .map(RawMessage::decode)
    .transpose()
}

fn to_sql_count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn encode_system_time(value: SystemTime) -> Result<(i64, i64), MemoryError> {
    let duration = value.duration_since(UNIX_EPOCH).map_err(|error| {
        MemoryError::invalid_request(format!("timestamp predates unix epoch: {error}"))
    })?;
    Ok((
        duration.as_secs() as i64,
        i64::from(duration.subsec_nanos()),
    ))
}

fn decode_system_time(seconds: i64, nanos: i64) -> Result<SystemTime, MemoryError> {
    if seconds < 0 {
        return Err(MemoryError::storage(format!(
            "timestamp seconds must be non-negative, got {seconds}"
        )));
    }
    if !(0..1_000_000_000).contains(&nanos) {
        return Err(MemoryError::storage(format!(
            "timestamp nanos must be in [0, 1_000_000_000), got {nanos}"
        )));
    }
    Ok(UNIX_EPOCH + Duration::new(seconds as u64, nanos as u32))
}

pub(crate) fn default_sqlite_path() -> PathBuf {
    if let Some(explicit) = std::env::var_os("CONFAB_SQLITE_PATH") {
        return PathBuf::from(explicit);
    }

    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        return PathBuf::from(home).join(".confab").join("confab.sqlite3");
    }

    PathBuf::from("confab.sqlite3")
}
