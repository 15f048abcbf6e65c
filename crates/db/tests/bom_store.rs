//! Integration tests for the PostgreSQL hierarchy store.
//!
//! Runs the store and the service on top of it against a real database to
//! verify that:
//! - Sibling counters are monotonic and survive deletes
//! - Child inserts check and bump the parent row
//! - Prefix queries escape `LIKE` metacharacters and skip tombstones
//! - Batch writes are all-or-nothing
//! - A reparent rewrites the whole subtree in one transaction
//! - Child counters follow their parent across roots
//! - Concurrent creates and moves leave every path consistent

use std::sync::Arc;

use assert_matches::assert_matches;
use sqlx::PgPool;

use bomtree_core::error::CoreError;
use bomtree_core::node::{CreateBomNode, NewBomNode, UpdateBomNode};
use bomtree_core::path::SiblingIndexing;
use bomtree_core::service::BomService;
use bomtree_core::path;
use bomtree_core::store::{HierarchyStore, StoreError, WriteBatch};
use bomtree_db::PgHierarchyStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_node(root: i64, parent: Option<i64>, path: &str) -> NewBomNode {
    NewBomNode {
        root_product_id: root,
        product_id: None,
        parent_id: parent,
        path: path.to_string(),
        quantity_of_prod: 1,
        material_id: "STEEL-01".to_string(),
        quantity_of_materials: 4,
        tile_hh: None,
        application_date: None,
        end_date: None,
        tk_vat_tu: None,
        tkh: None,
        created_by: Some("tester".to_string()),
    }
}

fn pg_service(pool: PgPool) -> (BomService, Arc<PgHierarchyStore>) {
    let store = Arc::new(PgHierarchyStore::new(pool));
    (BomService::new(store.clone(), SiblingIndexing::Sequence), store)
}

/// Every live node is well formed and sits directly under its parent's path.
async fn assert_paths_consistent(store: &PgHierarchyStore) {
    let live = store.find_all().await.unwrap();
    for node in &live {
        assert!(path::is_well_formed(&node.path, node.root_product_id), "{}", node.path);
        if let Some(parent_id) = node.parent_id {
            let parent = live
                .iter()
                .find(|p| p.id == parent_id)
                .unwrap_or_else(|| panic!("live node {} has dead parent {parent_id}", node.id));
            assert_eq!(path::parent_prefix(&node.path), Some(parent.path.as_str()));
        }
    }
}

fn create_input(root: i64, parent: Option<i64>) -> CreateBomNode {
    CreateBomNode {
        root_product_id: root,
        parent_id: parent,
        product_id: None,
        quantity_of_prod: 1,
        material_id: "BOLT-M6".to_string(),
        quantity_of_materials: 8,
        tile_hh: None,
        application_date: None,
        end_date: None,
        tk_vat_tu: None,
        tkh: None,
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn sibling_sequence_is_monotonic(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);

    assert_eq!(store.next_sibling_index(5, None).await.unwrap(), 1);
    assert_eq!(store.next_sibling_index(5, None).await.unwrap(), 2);
    assert_eq!(store.next_sibling_index(6, None).await.unwrap(), 1);
    assert_eq!(store.next_sibling_index(5, Some(1)).await.unwrap(), 1);
    // Child counters are keyed by the parent row only.
    assert_eq!(store.next_sibling_index(9, Some(1)).await.unwrap(), 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn sibling_sequence_starts_after_existing_rows(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);
    let a = store.create(new_node(5, None, "5/1")).await.unwrap();
    store.create(new_node(5, None, "5/2")).await.unwrap();
    store.soft_delete(a.id).await.unwrap();

    // Tombstoned rows still count towards the seed.
    assert_eq!(store.next_sibling_index(5, None).await.unwrap(), 3);
}

#[sqlx::test(migrations = "./migrations")]
async fn create_bumps_parent_version(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);
    let parent = store.create(new_node(5, None, "5/1")).await.unwrap();
    assert_eq!(parent.version, 1);

    let child = store
        .create(new_node(5, Some(parent.id), "5/1/1"))
        .await
        .unwrap();
    assert_eq!(child.parent_id, Some(parent.id));
    assert_eq!(child.created_by.as_deref(), Some("tester"));
    assert_eq!(child.updated_by.as_deref(), Some("tester"));

    let parent = store.find_by_id(parent.id).await.unwrap().unwrap();
    assert_eq!(parent.version, 2);
}

#[sqlx::test(migrations = "./migrations")]
async fn create_under_stale_parent_path_conflicts(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);
    let parent = store.create(new_node(5, None, "5/1")).await.unwrap();

    let err = store
        .create(new_node(5, Some(parent.id), "5/9/1"))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Conflict(_));
    assert!(store.find_by_path_prefix("5/9/").await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_live_path_conflicts(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);
    store.create(new_node(5, None, "5/1")).await.unwrap();

    let err = store.create(new_node(5, None, "5/1")).await.unwrap_err();
    assert_matches!(err, StoreError::Conflict(_));
}

#[sqlx::test(migrations = "./migrations")]
async fn prefix_query_is_literal_and_skips_tombstones(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);
    let a = store.create(new_node(5, None, "5/1")).await.unwrap();
    let b = store.create(new_node(5, Some(a.id), "5/1/1")).await.unwrap();
    store.create(new_node(5, Some(a.id), "5/1/2")).await.unwrap();
    store.create(new_node(5, None, "5/12")).await.unwrap();
    store.soft_delete(b.id).await.unwrap();

    let paths: Vec<String> = store
        .find_by_path_prefix("5/1/")
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.path)
        .collect();
    assert_eq!(paths, vec!["5/1/2"]);

    assert!(store.find_by_path_prefix("5/_/").await.unwrap().is_empty());
    assert!(store.find_by_path_prefix("5/%").await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn count_where_matches_null_parent(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);
    let a = store.create(new_node(5, None, "5/1")).await.unwrap();
    store.create(new_node(5, None, "5/2")).await.unwrap();
    store.create(new_node(5, Some(a.id), "5/1/1")).await.unwrap();

    assert_eq!(store.count_where(5, None).await.unwrap(), 2);
    assert_eq!(store.count_where(5, Some(a.id)).await.unwrap(), 1);
    assert_eq!(store.count_where(6, None).await.unwrap(), 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn update_rejects_stale_version(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);
    let created = store.create(new_node(5, None, "5/1")).await.unwrap();

    let mut first = created.clone();
    first.quantity_of_prod = 3;
    let first = store.update(first).await.unwrap();
    assert_eq!(first.version, created.version + 1);

    let mut second = created;
    second.quantity_of_prod = 7;
    let err = store.update(second).await.unwrap_err();
    assert_matches!(err, StoreError::Conflict(_));

    let current = store.find_by_id(first.id).await.unwrap().unwrap();
    assert_eq!(current.quantity_of_prod, 3);
}

#[sqlx::test(migrations = "./migrations")]
async fn batch_update_rolls_back_on_conflict(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);
    let a = store.create(new_node(5, None, "5/1")).await.unwrap();
    let b = store.create(new_node(5, None, "5/2")).await.unwrap();

    let mut a_edit = a.clone();
    a_edit.material_id = "CHANGED".to_string();
    let mut b_stale = b.clone();
    b_stale.version += 10;

    let err = store
        .batch_update(vec![a_edit, b_stale].into())
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Conflict(_));

    let a_now = store.find_by_id(a.id).await.unwrap().unwrap();
    assert_eq!(a_now.material_id, "STEEL-01");
    assert_eq!(a_now.version, a.version);
}

#[sqlx::test(migrations = "./migrations")]
async fn touch_bumps_version_but_keeps_updated_at(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);
    let a = store.create(new_node(5, None, "5/1")).await.unwrap();
    let b = store.create(new_node(5, None, "5/2")).await.unwrap();
    let mut a_edit = a.clone();
    a_edit.path = "5/3".to_string();

    let written = store
        .batch_update(WriteBatch::from(vec![a_edit]).touching(b.clone()))
        .await
        .unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].path, "5/3");

    let b_now = store.find_by_id(b.id).await.unwrap().unwrap();
    assert_eq!(b_now.version, b.version + 1);
    assert_eq!(b_now.updated_at, b.updated_at);

    // The touch is version-checked too.
    let err = store
        .batch_update(WriteBatch::default().touching(b))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Conflict(_));
}

#[sqlx::test(migrations = "./migrations")]
async fn soft_delete_is_idempotent(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);
    let a = store.create(new_node(5, None, "5/1")).await.unwrap();

    store.soft_delete(a.id).await.unwrap();
    store.soft_delete(a.id).await.unwrap();
    store.soft_delete(9999).await.unwrap();

    let row = store.find_by_id(a.id).await.unwrap().unwrap();
    assert!(row.is_deleted());
    assert!(store.find_all().await.unwrap().is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn soft_delete_batch_rejects_already_deleted_rows(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);
    let a = store.create(new_node(5, None, "5/1")).await.unwrap();
    let b = store.create(new_node(5, None, "5/2")).await.unwrap();
    store.soft_delete(b.id).await.unwrap();

    let err = store.soft_delete_batch(vec![a.clone(), b]).await.unwrap_err();
    assert_matches!(err, StoreError::Conflict(_));
    assert!(!store.find_by_id(a.id).await.unwrap().unwrap().is_deleted());
}

#[sqlx::test(migrations = "./migrations")]
async fn ping_succeeds(pool: PgPool) {
    let store = PgHierarchyStore::new(pool);
    store.ping().await.unwrap();
}

// ---------------------------------------------------------------------------
// Service over PostgreSQL
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn reparent_rewrites_subtree(pool: PgPool) {
    let service = BomService::new(
        Arc::new(PgHierarchyStore::new(pool)),
        SiblingIndexing::Sequence,
    );

    let a = service.create(create_input(5, None), "admin").await.unwrap();
    let b = service.create(create_input(5, None), "admin").await.unwrap();
    let c = service.create(create_input(5, Some(a.id)), "admin").await.unwrap();
    let d = service.create(create_input(5, Some(c.id)), "admin").await.unwrap();
    assert_eq!(
        (a.path.as_str(), b.path.as_str(), c.path.as_str(), d.path.as_str()),
        ("5/1", "5/2", "5/1/1", "5/1/1/1")
    );

    let moved = service
        .update(
            c.id,
            UpdateBomNode {
                parent_id: Some(Some(b.id)),
                ..Default::default()
            },
            "editor",
        )
        .await
        .unwrap();
    assert_eq!(moved.path, "5/2/1");
    assert_eq!(moved.parent_id, Some(b.id));
    assert_eq!(moved.modified_by, "editor");

    let d = service.find_one(d.id).await.unwrap();
    assert_eq!(d.path, "5/2/1/1");
    assert_eq!(d.parent_id, Some(c.id));

    let forest = service.build_tree(Some(5)).await.unwrap();
    assert_eq!(forest.len(), 2);
    assert!(forest[0].children.is_empty());
    assert_eq!(forest[1].children[0].children[0].id, d.id);
}

#[sqlx::test(migrations = "./migrations")]
async fn move_under_own_descendant_is_rejected(pool: PgPool) {
    let service = BomService::new(
        Arc::new(PgHierarchyStore::new(pool)),
        SiblingIndexing::Sequence,
    );
    let a = service.create(create_input(5, None), "admin").await.unwrap();
    let c = service.create(create_input(5, Some(a.id)), "admin").await.unwrap();

    let err = service
        .update(
            a.id,
            UpdateBomNode {
                parent_id: Some(Some(c.id)),
                ..Default::default()
            },
            "admin",
        )
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::InvalidOperation(_));
    assert_eq!(service.find_one(a.id).await.unwrap().path, "5/1");
}

#[sqlx::test(migrations = "./migrations")]
async fn remove_tombstones_subtree(pool: PgPool) {
    let service = BomService::new(
        Arc::new(PgHierarchyStore::new(pool)),
        SiblingIndexing::Sequence,
    );
    let a = service.create(create_input(5, None), "admin").await.unwrap();
    let c = service.create(create_input(5, Some(a.id)), "admin").await.unwrap();
    let other = service.create(create_input(5, None), "admin").await.unwrap();

    service.remove(a.id).await.unwrap();
    service.remove(a.id).await.unwrap();

    assert_matches!(
        service.find_one(c.id).await,
        Err(CoreError::NotFound { .. })
    );
    let forest = service.build_tree(Some(5)).await.unwrap();
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].id, other.id);

    // A new top-level sibling does not reuse the deleted node's index.
    let next = service.create(create_input(5, None), "admin").await.unwrap();
    assert_eq!(next.path, "5/3");
}

#[sqlx::test(migrations = "./migrations")]
async fn children_keep_numbering_when_parent_changes_root(pool: PgPool) {
    let (service, store) = pg_service(pool);
    let a = service.create(create_input(5, None), "admin").await.unwrap();
    let c = service.create(create_input(5, Some(a.id)), "admin").await.unwrap();

    let to_nine = UpdateBomNode {
        root_product_id: Some(9),
        parent_id: Some(None),
        ..Default::default()
    };
    assert_eq!(service.update(a.id, to_nine, "admin").await.unwrap().path, "9/1");
    assert_eq!(service.find_one(c.id).await.unwrap().path, "9/1/1");
    let d = service.create(create_input(9, Some(a.id)), "admin").await.unwrap();
    assert_eq!(d.path, "9/1/2");

    let back_to_five = UpdateBomNode {
        root_product_id: Some(5),
        parent_id: Some(None),
        ..Default::default()
    };
    assert_eq!(service.update(a.id, back_to_five, "admin").await.unwrap().path, "5/2");
    let e = service.create(create_input(5, Some(a.id)), "admin").await.unwrap();
    assert_eq!(e.path, "5/2/3");
    assert_paths_consistent(&store).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn move_touches_new_parent_version_only(pool: PgPool) {
    let (service, store) = pg_service(pool);
    let a = service.create(create_input(5, None), "admin").await.unwrap();
    let b = service.create(create_input(5, None), "admin").await.unwrap();
    let before = store.find_by_id(b.id).await.unwrap().unwrap();

    let moved = UpdateBomNode {
        parent_id: Some(Some(b.id)),
        ..Default::default()
    };
    service.update(a.id, moved, "editor").await.unwrap();

    let after = store.find_by_id(b.id).await.unwrap().unwrap();
    assert_eq!(after.version, before.version + 1);
    assert_eq!(after.updated_at, before.updated_at);
    assert_eq!(after.updated_by, before.updated_by);
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
async fn concurrent_creates_under_one_parent_get_distinct_indices(pool: PgPool) {
    let (service, store) = pg_service(pool);
    let parent = service.create(create_input(5, None), "admin").await.unwrap();
    let parent_id = parent.id;

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..10 {
        let service = service.clone();
        tasks.spawn(async move { service.create(create_input(5, Some(parent_id)), "admin").await });
    }
    let mut indices = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let child = joined.unwrap().unwrap();
        indices.push(path::sibling_index(&child.path).unwrap());
    }
    indices.sort_unstable();
    assert_eq!(indices, (1..=10).collect::<Vec<i64>>());
    assert_paths_consistent(&store).await;
}

#[sqlx::test(migrations = "./migrations")]
async fn create_racing_a_move_of_its_parent_stays_consistent(pool: PgPool) {
    let (service, store) = pg_service(pool);
    let a = service.create(create_input(5, None), "admin").await.unwrap().id;
    let b = service.create(create_input(5, None), "admin").await.unwrap().id;

    let moved = UpdateBomNode {
        parent_id: Some(Some(b)),
        ..Default::default()
    };
    let (created, moved) = tokio::join!(
        service.create(create_input(5, Some(a)), "admin"),
        service.update(a, moved, "admin"),
    );

    assert!(matches!(created, Ok(_) | Err(CoreError::Conflict(_))), "{created:?}");
    assert!(matches!(moved, Ok(_) | Err(CoreError::Conflict(_))), "{moved:?}");
    assert_paths_consistent(&store).await;
}
