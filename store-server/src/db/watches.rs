//! Catalog price lookup

use sqlx::PgConnection;

use super::models::Watch;

/// Fetch the catalog rows for a set of watch ids. Missing ids are simply
/// absent from the result; callers decide how to report them.
pub async fn find_by_ids(
    conn: &mut PgConnection,
    ids: &[i64],
) -> Result<Vec<Watch>, sqlx::Error> {
    sqlx::query_as("SELECT id, name, price FROM watches WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(conn)
        .await
}
