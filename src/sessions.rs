use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// An active flight-client login.
///
/// Exactly one token is expected to be live at a time: a fresh login
/// inserts a new row and a renewal replaces the old one, so a superseded
/// token simply stops resolving. Sessions never expire by time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: i32,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

/// Diesel model for the sessions table
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SessionModel {
    pub id: i32,
    pub token: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::sessions)]
pub struct NewSessionModel {
    pub token: String,
}

impl From<SessionModel> for Session {
    fn from(model: SessionModel) -> Self {
        Self {
            id: model.id,
            token: model.token,
            created_at: model.created_at,
        }
    }
}

/// Storage seam for session tokens. The dispatcher only sees this trait, so
/// tests can substitute an in-memory store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session for `token`. Always inserts.
    async fn create(&self, token: &str) -> Result<Session>;

    /// Look up the session holding `token`.
    async fn find_by_token(&self, token: &str) -> Result<Option<Session>>;

    /// Replace `old_token` with a session for `new_token`. Returns `None`
    /// when no session holds `old_token`; otherwise the delete and the
    /// insert land together or not at all.
    async fn renew(&self, old_token: &str, new_token: &str) -> Result<Option<Session>>;
}
