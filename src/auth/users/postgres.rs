use anyhow::{Context, Result};
use sqlx::{postgres::PgRow, types::Json, PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;
use tracing::Instrument;
use uuid::Uuid;

use super::{apply_token, NewToken, NewUser, TokenEntry, User, UserFuture, UserSession, UserStore};

/// Postgres backed user store; see `sql/schema.sql`.
#[derive(Clone, Debug)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert_with_token(&self, new_user: &NewUser, token: &NewToken) -> Result<UserSession> {
        // The row lock from SELECT ... FOR UPDATE serializes concurrent logins
        // for the same user so token map writes cannot be lost.
        let mut tx = self.pool.begin().await.context("begin login transaction")?;

        let (mut user, created) = match lock_user(&mut tx, &new_user.email).await? {
            Some(user) => (user, false),
            None => match insert_user(&mut tx, new_user).await? {
                Some(user) => (user, true),
                // Lost a race with a concurrent first login for the same email.
                None => (
                    lock_user(&mut tx, &new_user.email)
                        .await?
                        .context("user vanished after insert conflict")?,
                    false,
                ),
            },
        };

        apply_token(&mut user.tokens, token);
        save_tokens(&mut tx, user.id, &user.tokens).await?;

        tx.commit().await.context("commit login transaction")?;

        Ok(UserSession { user, created })
    }
}

impl UserStore for PgUserStore {
    fn find_or_create_with_token<'a>(
        &'a self,
        new_user: &'a NewUser,
        token: &'a NewToken,
    ) -> UserFuture<'a, UserSession> {
        Box::pin(self.upsert_with_token(new_user, token))
    }
}

fn query_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn user_from_row(row: &PgRow) -> Result<User> {
    let Json(tokens): Json<HashMap<String, TokenEntry>> =
        row.try_get("tokens").context("failed to decode token map")?;
    Ok(User {
        id: row.try_get("id").context("missing id")?,
        email: row.try_get("email").context("missing email")?,
        uid: row.try_get("uid").context("missing uid")?,
        provider: row.try_get("provider").context("missing provider")?,
        confirmed: row.try_get("confirmed").context("missing confirmed")?,
        tokens,
    })
}

async fn lock_user(tx: &mut Transaction<'_, Postgres>, email: &str) -> Result<Option<User>> {
    let query = r"
        SELECT id, email, uid, provider, confirmed_at IS NOT NULL AS confirmed, tokens
        FROM users
        WHERE email = $1
        FOR UPDATE
    ";
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(&mut **tx)
        .instrument(query_span("SELECT", query))
        .await
        .context("failed to lookup user")?;

    row.as_ref().map(user_from_row).transpose()
}

async fn insert_user(tx: &mut Transaction<'_, Postgres>, new_user: &NewUser) -> Result<Option<User>> {
    // Provider-verified identities are confirmed on creation.
    let query = r"
        INSERT INTO users (id, email, uid, provider, encrypted_password, confirmed_at, tokens)
        VALUES ($1, $2, $3, $4, $5, NOW(), '{}'::jsonb)
        ON CONFLICT (email) DO NOTHING
        RETURNING id, email, uid, provider, confirmed_at IS NOT NULL AS confirmed, tokens
    ";
    let row = sqlx::query(query)
        .bind(Uuid::new_v4())
        .bind(&new_user.email)
        .bind(&new_user.uid)
        .bind(&new_user.provider)
        .bind(&new_user.password_hash)
        .fetch_optional(&mut **tx)
        .instrument(query_span("INSERT", query))
        .await
        .context("failed to insert user")?;

    row.as_ref().map(user_from_row).transpose()
}

async fn save_tokens(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    tokens: &HashMap<String, TokenEntry>,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET tokens = $2, updated_at = NOW()
        WHERE id = $1
    ";
    sqlx::query(query)
        .bind(user_id)
        .bind(Json(tokens))
        .execute(&mut **tx)
        .instrument(query_span("UPDATE", query))
        .await
        .context("failed to save user tokens")?;
    Ok(())
}
