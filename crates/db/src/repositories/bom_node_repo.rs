//! Repository for the `bom_nodes` and `bom_sibling_sequences` tables.

use sqlx::{PgConnection, PgPool};

use bomtree_core::node::{BomNode, NewBomNode};
use bomtree_core::store::SiblingScope;
use bomtree_core::types::{DbId, ProductId};

use crate::models::bom_node::BomNodeRow;

/// Column list for bom_nodes queries.
const COLUMNS: &str = "id, root_product_id, product_id, parent_id, path, \
    quantity_of_prod, material_id, quantity_of_materials, tile_hh, \
    application_date, end_date, tk_vat_tu, tkh, version, created_by, \
    updated_by, created_at, updated_at, deleted_at";

/// Filler for the unused half of a `bom_sibling_sequences` key.
const NO_KEY: i64 = 0;

/// `(root_key, parent_key)` of a counter. Child counters are keyed by the
/// parent row alone so they survive moves of that parent across roots.
fn sequence_key(scope: SiblingScope) -> (i64, i64) {
    match scope {
        SiblingScope::TopLevel(root_product_id) => (root_product_id, NO_KEY),
        SiblingScope::Children(parent_id) => (NO_KEY, parent_id),
    }
}

/// Escape `LIKE` metacharacters so `prefix` matches literally.
fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Provides queries for BOM nodes.
pub struct BomNodeRepo;

impl BomNodeRepo {
    /// Insert a new node, returning the created row.
    pub async fn insert(
        conn: &mut PgConnection,
        input: &NewBomNode,
    ) -> Result<BomNodeRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO bom_nodes
                (root_product_id, product_id, parent_id, path, quantity_of_prod,
                 material_id, quantity_of_materials, tile_hh, application_date,
                 end_date, tk_vat_tu, tkh, created_by, updated_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BomNodeRow>(&query)
            .bind(input.root_product_id)
            .bind(input.product_id)
            .bind(input.parent_id)
            .bind(&input.path)
            .bind(input.quantity_of_prod)
            .bind(&input.material_id)
            .bind(input.quantity_of_materials)
            .bind(&input.tile_hh)
            .bind(input.application_date)
            .bind(input.end_date)
            .bind(&input.tk_vat_tu)
            .bind(&input.tkh)
            .bind(&input.created_by)
            .fetch_one(conn)
            .await
    }

    /// Lock a live parent whose path is still `expected_path` and bump its
    /// version. Returns `false` if the parent moved or was deleted.
    ///
    /// The row lock is held until the surrounding transaction ends, which
    /// serializes child inserts under one parent.
    pub async fn touch_parent(
        conn: &mut PgConnection,
        parent_id: DbId,
        expected_path: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bom_nodes SET version = version + 1
             WHERE id = $1 AND path = $2 AND deleted_at IS NULL",
        )
        .bind(parent_id)
        .bind(expected_path)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a node by id, including tombstoned rows.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<BomNodeRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM bom_nodes WHERE id = $1");
        sqlx::query_as::<_, BomNodeRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List live nodes of one root product, ordered by id.
    pub async fn list_by_root(
        pool: &PgPool,
        root_product_id: ProductId,
    ) -> Result<Vec<BomNodeRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM bom_nodes
             WHERE root_product_id = $1 AND deleted_at IS NULL
             ORDER BY id"
        );
        sqlx::query_as::<_, BomNodeRow>(&query)
            .bind(root_product_id)
            .fetch_all(pool)
            .await
    }

    /// List every live node, ordered by id.
    pub async fn list(pool: &PgPool) -> Result<Vec<BomNodeRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM bom_nodes WHERE deleted_at IS NULL ORDER BY id");
        sqlx::query_as::<_, BomNodeRow>(&query).fetch_all(pool).await
    }

    /// List live nodes whose path starts with `prefix`, ordered by path.
    pub async fn list_by_path_prefix(
        pool: &PgPool,
        prefix: &str,
    ) -> Result<Vec<BomNodeRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM bom_nodes
             WHERE path LIKE $1 || '%' ESCAPE '\\' AND deleted_at IS NULL
             ORDER BY path"
        );
        sqlx::query_as::<_, BomNodeRow>(&query)
            .bind(escape_like(prefix))
            .fetch_all(pool)
            .await
    }

    /// Count live nodes under `(root_product_id, parent_id)`.
    pub async fn count_siblings(
        pool: &PgPool,
        root_product_id: ProductId,
        parent_id: Option<DbId>,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM bom_nodes
             WHERE root_product_id = $1
               AND parent_id IS NOT DISTINCT FROM $2
               AND deleted_at IS NULL",
        )
        .bind(root_product_id)
        .bind(parent_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Atomically increment and return the counter of `scope`.
    ///
    /// A counter seen for the first time starts after the highest index any
    /// row in its scope carries (tombstones included), so it never hands out
    /// an index already used by rows created under count-based indexing.
    pub async fn next_sibling_index(pool: &PgPool, scope: SiblingScope) -> Result<i64, sqlx::Error> {
        let (root_key, parent_key) = sequence_key(scope);
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO bom_sibling_sequences (root_key, parent_key, last_index)
             VALUES ($1, $2, 1 + (
                 SELECT COALESCE(MAX(CAST(substring(path FROM '[0-9]+$') AS BIGINT)), 0)
                 FROM bom_nodes
                 WHERE CASE WHEN $2 = 0
                            THEN parent_id IS NULL AND root_product_id = $1
                            ELSE parent_id = $2
                       END
             ))
             ON CONFLICT (root_key, parent_key)
             DO UPDATE SET last_index = bom_sibling_sequences.last_index + 1
             RETURNING last_index",
        )
        .bind(root_key)
        .bind(parent_key)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Write every mutable column of `node` if its version still matches.
    /// Returns `None` on a version mismatch or when the row is tombstoned.
    pub async fn update_versioned(
        conn: &mut PgConnection,
        node: &BomNode,
    ) -> Result<Option<BomNodeRow>, sqlx::Error> {
        let query = format!(
            "UPDATE bom_nodes SET
                root_product_id = $3,
                product_id = $4,
                parent_id = $5,
                path = $6,
                quantity_of_prod = $7,
                material_id = $8,
                quantity_of_materials = $9,
                tile_hh = $10,
                application_date = $11,
                end_date = $12,
                tk_vat_tu = $13,
                tkh = $14,
                updated_by = $15,
                version = version + 1,
                updated_at = NOW()
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, BomNodeRow>(&query)
            .bind(node.id)
            .bind(node.version)
            .bind(node.root_product_id)
            .bind(node.product_id)
            .bind(node.parent_id)
            .bind(&node.path)
            .bind(node.quantity_of_prod)
            .bind(&node.material_id)
            .bind(node.quantity_of_materials)
            .bind(&node.tile_hh)
            .bind(node.application_date)
            .bind(node.end_date)
            .bind(&node.tk_vat_tu)
            .bind(&node.tkh)
            .bind(&node.updated_by)
            .fetch_optional(conn)
            .await
    }

    /// Bump the version of a live node if it still matches, leaving data and
    /// `updated_at` alone. Returns `false` on a mismatch.
    pub async fn touch_versioned(
        conn: &mut PgConnection,
        id: DbId,
        version: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bom_nodes SET version = version + 1
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(version)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a node. Returns `true` if a live row was tombstoned.
    pub async fn soft_delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bom_nodes SET deleted_at = NOW(), version = version + 1
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a node if its version still matches.
    pub async fn soft_delete_versioned(
        conn: &mut PgConnection,
        id: DbId,
        version: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE bom_nodes SET deleted_at = NOW(), version = version + 1
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(version)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
