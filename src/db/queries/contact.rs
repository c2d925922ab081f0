//! Contact and contact list queries

use std::collections::HashSet;

use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{ContactBatchResult, ContactList, NewContact};

/// Bulk insert contacts in one round trip.
///
/// Rows whose email already exists for the user (or repeats within the
/// batch) are skipped by the unique `(user_id, lower(email))` index.
pub async fn create_contacts_batch(pool: &PgPool, rows: &[NewContact]) -> Result<ContactBatchResult> {
    if rows.is_empty() {
        return Ok(ContactBatchResult::default());
    }

    let ids: Vec<Uuid> = rows.iter().map(|_| Uuid::new_v4()).collect();
    let user_ids: Vec<Uuid> = rows.iter().map(|r| r.user_id).collect();
    let emails: Vec<String> = rows.iter().map(|r| r.email.clone()).collect();
    let first_names: Vec<Option<String>> = rows.iter().map(|r| r.first_name.clone()).collect();
    let last_names: Vec<Option<String>> = rows.iter().map(|r| r.last_name.clone()).collect();

    let inserted: Vec<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO contacts (id, user_id, email, first_name, last_name, created_at, updated_at)
        SELECT id, user_id, email, first_name, last_name, NOW(), NOW()
        FROM UNNEST($1::uuid[], $2::uuid[], $3::text[], $4::text[], $5::text[])
            WITH ORDINALITY AS t(id, user_id, email, first_name, last_name, ord)
        ORDER BY ord
        ON CONFLICT DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&ids)
    .bind(&user_ids)
    .bind(&emails)
    .bind(&first_names)
    .bind(&last_names)
    .fetch_all(pool)
    .await?;

    // RETURNING order is unspecified; report ids in file order
    let inserted: HashSet<Uuid> = inserted.into_iter().collect();
    let ids: Vec<Uuid> = ids.into_iter().filter(|id| inserted.contains(id)).collect();

    Ok(ContactBatchResult {
        count: ids.len() as u64,
        ids,
    })
}

/// Link contacts to a list owned by `user_id`. Existing links are kept.
pub async fn add_contacts_to_list(
    pool: &PgPool,
    list_id: Uuid,
    contact_ids: &[Uuid],
    user_id: Uuid,
) -> Result<u64> {
    if contact_ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO contact_list_members (list_id, contact_id, user_id, added_at)
        SELECT $1, contact_id, $3, NOW()
        FROM UNNEST($2::uuid[]) AS t(contact_id)
        WHERE EXISTS (SELECT 1 FROM contact_lists WHERE id = $1 AND user_id = $3)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(list_id)
    .bind(contact_ids)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Create a new contact list
pub async fn create_contact_list(pool: &PgPool, user_id: Uuid, name: &str) -> Result<ContactList> {
    let list = sqlx::query_as::<_, ContactList>(
        r#"
        INSERT INTO contact_lists (id, user_id, name, created_at)
        VALUES ($1, $2, $3, NOW())
        RETURNING id, user_id, name, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(name)
    .fetch_one(pool)
    .await?;

    Ok(list)
}

pub async fn contact_list_exists(pool: &PgPool, list_id: Uuid, user_id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM contact_lists WHERE id = $1 AND user_id = $2)",
    )
    .bind(list_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}
