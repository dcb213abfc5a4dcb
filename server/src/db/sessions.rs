//! Database operations for the sessions table.

use sqlx::PgPool;

use crate::error::Result;

/// Look up the user owning an unexpired session token.
pub async fn find_session_user(pool: &PgPool, token: &str) -> Result<Option<String>> {
    let user_id: Option<String> = sqlx::query_scalar(
        r#"
        SELECT user_id
        FROM sessions
        WHERE token = $1 AND expires_at > now()
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    Ok(user_id)
}
