use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;

use crate::sessions::{NewSessionModel, Session, SessionModel, SessionStore};
use crate::web::PgPool;

#[derive(Clone)]
pub struct SessionsRepository {
    pool: PgPool,
}

impl SessionsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SessionsRepository {
    async fn create(&self, token: &str) -> Result<Session> {
        use crate::schema::sessions;

        let pool = self.pool.clone();
        let new_session = NewSessionModel {
            token: token.to_string(),
        };

        let model = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let model: SessionModel = diesel::insert_into(sessions::table)
                .values(&new_session)
                .returning(SessionModel::as_returning())
                .get_result(&mut conn)?;

            Ok::<SessionModel, anyhow::Error>(model)
        })
        .await??;

        Ok(model.into())
    }

    async fn find_by_token(&self, token_value: &str) -> Result<Option<Session>> {
        use crate::schema::sessions::dsl::*;

        let pool = self.pool.clone();
        let token_value = token_value.to_string();

        let model = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let model: Option<SessionModel> = sessions
                .filter(token.eq(&token_value))
                .select(SessionModel::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<SessionModel>, anyhow::Error>(model)
        })
        .await??;

        Ok(model.map(|m| m.into()))
    }

    async fn renew(&self, old_token: &str, new_token: &str) -> Result<Option<Session>> {
        use crate::schema::sessions::dsl::*;

        let pool = self.pool.clone();
        let old_token = old_token.to_string();
        let new_token = new_token.to_string();

        let model = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            // Delete and insert must land together so a failed renewal
            // never leaves the pilot with zero or two live tokens.
            conn.transaction(|conn| {
                let old: Option<SessionModel> = sessions
                    .filter(token.eq(&old_token))
                    .select(SessionModel::as_select())
                    .first(conn)
                    .optional()?;

                let Some(old) = old else {
                    return Ok::<Option<SessionModel>, anyhow::Error>(None);
                };

                diesel::delete(sessions.filter(id.eq(old.id))).execute(conn)?;

                let fresh: SessionModel = diesel::insert_into(sessions)
                    .values(&NewSessionModel {
                        token: new_token.clone(),
                    })
                    .returning(SessionModel::as_returning())
                    .get_result(conn)?;

                Ok(Some(fresh))
            })
        })
        .await??;

        Ok(model.map(|m| m.into()))
    }
}
