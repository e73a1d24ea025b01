//! Users and sessions.

use super::{is_constraint_violation, RemoteStore};
use crate::error::ServerError;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub user_id: Uuid,
    pub login: String,
    pub password_verifier: String,
    /// Base64 KDF salt, returned to the client at login.
    pub salt: String,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub refresh_token: String,
    pub created_at: i64,
    pub expires_at: i64,
}

fn parse_uuid(idx: usize, s: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl RemoteStore {
    /// Insert a new user; a taken login yields [`ServerError::UserExists`].
    pub fn insert_user(&self, user: &UserRow) -> Result<(), ServerError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (user_id, login, password_verifier, salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.user_id.to_string(),
                user.login,
                user.password_verifier,
                user.salt,
                user.created_at
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                ServerError::UserExists
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    pub fn user_by_login(&self, login: &str) -> Result<Option<UserRow>, ServerError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT user_id, login, password_verifier, salt, created_at
                 FROM users WHERE login = ?1",
                [login],
                |row| {
                    Ok(UserRow {
                        user_id: parse_uuid(0, row.get(0)?)?,
                        login: row.get(1)?,
                        password_verifier: row.get(2)?,
                        salt: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn insert_session(&self, session: &SessionRow) -> Result<(), ServerError> {
        let conn = self.conn()?;
        insert_session(&conn, session)?;
        Ok(())
    }

    /// Owner of a live session whose stored refresh token matches.
    pub fn session_owner(
        &self,
        session_id: Uuid,
        refresh_token: &str,
        now: i64,
    ) -> Result<Option<Uuid>, ServerError> {
        let conn = self.conn()?;
        let owner: Option<String> = conn
            .query_row(
                "SELECT user_id FROM sessions
                 WHERE session_id = ?1 AND refresh_token = ?2 AND expires_at > ?3",
                params![session_id.to_string(), refresh_token, now],
                |row| row.get(0),
            )
            .optional()?;
        owner
            .map(|s| parse_uuid(0, s).map_err(ServerError::from))
            .transpose()
    }

    /// Atomically replace a session with its successor.
    ///
    /// The old row is deleted only if its refresh token still matches and it
    /// has not expired, so a replayed or raced refresh token finds nothing
    /// and fails with [`ServerError::SessionNotFound`].
    pub fn rotate_session(
        &self,
        old_session_id: Uuid,
        old_refresh_token: &str,
        now: i64,
        next: &SessionRow,
    ) -> Result<(), ServerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM sessions
             WHERE session_id = ?1 AND refresh_token = ?2 AND expires_at > ?3",
            params![old_session_id.to_string(), old_refresh_token, now],
        )?;
        if removed == 0 {
            return Err(ServerError::SessionNotFound);
        }
        insert_session(&tx, next)?;
        tx.commit()?;
        Ok(())
    }

    pub fn delete_expired_sessions(&self, now: i64) -> Result<usize, ServerError> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [now])?;
        Ok(removed)
    }

    #[cfg(test)]
    pub fn session_count(&self, user_id: Uuid) -> Result<i64, ServerError> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE user_id = ?1",
            [user_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn insert_session(conn: &rusqlite::Connection, session: &SessionRow) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO sessions (session_id, user_id, refresh_token, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.session_id.to_string(),
            session.user_id.to_string(),
            session.refresh_token,
            session.created_at,
            session.expires_at
        ],
    )
}
