//! Notification queries

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::NewNotification;

pub async fn create_notification(pool: &PgPool, notification: &NewNotification) -> Result<Uuid> {
    let id = Uuid::new_v4();

    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, notification_type, message, is_read, created_at)
        VALUES ($1, $2, $3, $4, FALSE, NOW())
        "#,
    )
    .bind(id)
    .bind(notification.user_id)
    .bind(notification.notification_type.as_str())
    .bind(&notification.message)
    .execute(pool)
    .await?;

    Ok(id)
}
