//! End-to-end repository behaviour over the in-memory store

use partition_repo::prelude::*;

type Repo = StoreRepository<Partition, MemoryStore>;

fn running(table: &str) -> PartitionPatch {
    PartitionPatch::new().table(table).status("RUNNING")
}

async fn seeded(tables: &[&str]) -> (Repo, Vec<i64>) {
    let repo = Repo::new(MemoryStore::new());
    let mut keys = Vec::with_capacity(tables.len());
    for table in tables {
        keys.push(repo.insert_selective(&running(table)).await.unwrap().primary_key);
    }
    (repo, keys)
}

fn ids(partitions: &[Partition]) -> Vec<i64> {
    partitions.iter().map(|p| p.partition_id).collect()
}

#[tokio::test]
async fn test_insert_update_select_round() {
    let (repo, keys) = seeded(&["t1", "t2"]).await;

    let stopped = repo
        .update_by_example_selective(
            &PartitionPatch::new().status("STOPPED"),
            &Criteria::matching(CriteriaGroup::new().eq(fields::TABLE, "t1")),
        )
        .await
        .unwrap();
    assert_eq!(stopped, 1);

    let t1 = repo.select_by_primary_key(keys[0]).await.unwrap();
    assert_eq!((t1.table.as_str(), t1.status.as_str()), ("t1", "STOPPED"));

    let untouched = repo.select_by_primary_key(keys[1]).await.unwrap();
    assert_eq!(untouched.status, "RUNNING");
}

#[tokio::test]
async fn test_update_by_example_selective_without_match_returns_zero() {
    let (repo, keys) = seeded(&["t1", "t2"]).await;

    let updated = repo
        .update_by_example_selective(
            &PartitionPatch::new().status("STOPPED"),
            &Criteria::matching(CriteriaGroup::new().eq(fields::TABLE, "missing")),
        )
        .await
        .unwrap();
    assert_eq!(updated, 0);

    for key in keys {
        let partition = repo.select_by_primary_key(key).await.unwrap();
        assert_eq!(partition.status, "RUNNING");
    }
}

#[tokio::test]
async fn test_rowbounds_window_over_five_records() {
    let (repo, keys) = seeded(&["a", "b", "c", "d", "e"]).await;
    let criteria = Criteria::new();

    let window = repo
        .select_by_example_with_rowbounds(&criteria, Pagination::new(0, 2))
        .await
        .unwrap();
    assert_eq!(ids(&window), keys[..2].to_vec());

    let tail = repo
        .select_by_example_with_rowbounds(&criteria, Pagination::new(4, 10))
        .await
        .unwrap();
    assert_eq!(ids(&tail), vec![keys[4]]);

    let past_end = repo
        .select_by_example_with_rowbounds(&criteria, Pagination::new(5, 10))
        .await
        .unwrap();
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn test_count_matches_select_length() {
    let (repo, _) = seeded(&["t1", "t2", "t1", "t3"]).await;
    let criteria = Criteria::matching(CriteriaGroup::new().eq(fields::TABLE, "t1"))
        .or(CriteriaGroup::new().eq(fields::TABLE, "t3"));

    let selected = repo.select_by_example(&criteria).await.unwrap();
    let counted = repo.count_by_example(&criteria).await.unwrap();
    assert_eq!(counted, selected.len() as u64);
    assert_eq!(counted, 3);
}

#[tokio::test]
async fn test_or_groups_do_not_duplicate_rows() {
    let (repo, keys) = seeded(&["t1", "t2"]).await;
    let criteria = Criteria::matching(CriteriaGroup::new().eq(fields::TABLE, "t1"))
        .or(CriteriaGroup::new().eq(fields::STATUS, "RUNNING"));

    let selected = repo.select_by_example(&criteria).await.unwrap();
    assert_eq!(ids(&selected), keys);
}

#[tokio::test]
async fn test_insert_selective_stores_type_defaults() {
    let repo = Repo::new(MemoryStore::new());
    let key = repo
        .insert_selective(&PartitionPatch::new().status("PENDING"))
        .await
        .unwrap()
        .primary_key;

    let stored = repo.select_by_primary_key(key).await.unwrap();
    assert_eq!(stored.table, "");
    assert_eq!(stored.node_id, None);
    assert_eq!(stored.start_key, None);
    assert_eq!(stored.created_at, None);
    assert_eq!(stored.status, "PENDING");
}

#[tokio::test]
async fn test_absent_differs_from_explicit_null() {
    let repo = Repo::new(MemoryStore::new());
    let key = repo
        .insert_selective(&running("t1").node_id(Some(7)))
        .await
        .unwrap()
        .primary_key;

    // absent node_id leaves the value alone
    repo.update_by_primary_key_selective(&PartitionPatch::new().partition_id(key).status("X"))
        .await
        .unwrap();
    assert_eq!(repo.select_by_primary_key(key).await.unwrap().node_id, Some(7));

    // explicit NULL clears it
    repo.update_by_primary_key_selective(&PartitionPatch::new().partition_id(key).node_id(None))
        .await
        .unwrap();
    assert_eq!(repo.select_by_primary_key(key).await.unwrap().node_id, None);
}

#[tokio::test]
async fn test_empty_key_patch_reports_existence() {
    let (repo, keys) = seeded(&["t1"]).await;
    let before = repo.select_by_primary_key(keys[0]).await.unwrap();

    let hit = repo
        .update_by_primary_key_selective(&PartitionPatch::new().partition_id(keys[0]))
        .await
        .unwrap();
    let miss = repo
        .update_by_primary_key_selective(&PartitionPatch::new().partition_id(keys[0] + 100))
        .await
        .unwrap();
    assert_eq!((hit, miss), (1, 0));
    assert_eq!(repo.select_by_primary_key(keys[0]).await.unwrap(), before);
}

#[tokio::test]
async fn test_delete_then_select_not_found() {
    let (repo, keys) = seeded(&["t1"]).await;
    assert_eq!(repo.delete_by_primary_key(keys[0]).await.unwrap(), 1);

    let err = repo.select_by_primary_key(keys[0]).await.unwrap_err();
    assert_eq!(err.kind, RepositoryErrorKind::NotFound);
    assert_eq!(err.entity_type.as_deref(), Some("Partition"));
}

#[tokio::test]
async fn test_delete_by_example_returns_rows_affected() {
    let (repo, _) = seeded(&["t1", "t2", "t1"]).await;
    let removed = repo
        .delete_by_example(&Criteria::matching(CriteriaGroup::new().eq(fields::TABLE, "t1")))
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(repo.count_by_example(&Criteria::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_keys_are_not_reused_after_delete() {
    let (repo, keys) = seeded(&["t1", "t2"]).await;
    repo.delete_by_primary_key(keys[1]).await.unwrap();
    let next = repo.insert_selective(&running("t3")).await.unwrap().primary_key;
    assert!(next > keys[1]);
}

#[tokio::test]
async fn test_bulk_guard_rejects_unfiltered_writes() {
    let repo = Repo::with_config(
        MemoryStore::new(),
        RepositoryConfig {
            require_bulk_delete_filter: true,
        },
    );
    repo.insert_selective(&running("t1")).await.unwrap();

    let err = repo.delete_by_example(&Criteria::new()).await.unwrap_err();
    assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    assert_eq!(err.operation, RepositoryOperation::DeleteByExample);

    // an empty group matches everything too
    let err = repo
        .delete_by_example(&Criteria::matching(CriteriaGroup::new()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, RepositoryErrorKind::ValidationFailed);
    assert_eq!(repo.count_by_example(&Criteria::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_key_on_explicit_insert() {
    let repo = Repo::new(MemoryStore::new());
    let record = Partition {
        partition_id: 3,
        table: "t1".to_string(),
        ..Partition::default()
    };
    repo.insert(&record).await.unwrap();

    let err = repo.insert(&record).await.unwrap_err();
    assert_eq!(err.kind, RepositoryErrorKind::DuplicateKey);
    assert_eq!(err.operation, RepositoryOperation::Insert);
    assert!(!err.is_retriable());
}

#[tokio::test]
async fn test_allocated_keys_skip_explicit_keys() {
    let repo = Repo::new(MemoryStore::new());
    let record = Partition {
        partition_id: 7,
        table: "t1".to_string(),
        ..Partition::default()
    };
    repo.insert(&record).await.unwrap();

    let next = repo.insert_selective(&running("t2")).await.unwrap().primary_key;
    assert!(next > 7);
    assert_eq!(repo.count_by_example(&Criteria::new()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_unavailable_store_fails_every_operation() {
    let (repo, keys) = seeded(&["t1"]).await;
    repo.store().set_available(false);

    let select = repo.select_by_primary_key(keys[0]).await.unwrap_err();
    let insert = repo.insert_selective(&running("t2")).await.unwrap_err();
    let delete = repo.delete_by_primary_key(keys[0]).await.unwrap_err();
    for err in [select, insert, delete] {
        assert_eq!(err.kind, RepositoryErrorKind::StoreUnavailable);
        assert!(err.is_retriable());
    }

    repo.store().set_available(true);
    assert!(repo.exists(keys[0]).await.unwrap());
}

#[tokio::test]
async fn test_invalid_criteria_is_rejected_before_the_store() {
    let (repo, _) = seeded(&["t1"]).await;
    repo.store().set_available(false);

    let err = repo
        .select_by_example(&Criteria::matching(
            CriteriaGroup::new().in_values(fields::STATUS, Vec::<Value>::new()),
        ))
        .await
        .unwrap_err();
    assert_eq!(err.kind, RepositoryErrorKind::InvalidPredicate);

    let err = repo
        .select_by_example(&Criteria::matching(CriteriaGroup::new().gt(fields::NODE_ID, "x")))
        .await
        .unwrap_err();
    assert_eq!(err.kind, RepositoryErrorKind::InvalidPredicate);
}

#[tokio::test]
async fn test_null_semantics_in_comparisons() {
    let repo = Repo::new(MemoryStore::new());
    repo.insert_selective(&running("t1").node_id(Some(1))).await.unwrap();
    repo.insert_selective(&running("t2").node_id(None)).await.unwrap();

    let count = |group: CriteriaGroup| {
        let repo = &repo;
        async move { repo.count_by_example(&Criteria::matching(group)).await.unwrap() }
    };

    assert_eq!(count(CriteriaGroup::new().ne(fields::NODE_ID, 5_i64)).await, 1);
    assert_eq!(count(CriteriaGroup::new().not_in(fields::NODE_ID, [5_i64])).await, 1);
    assert_eq!(count(CriteriaGroup::new().is_null(fields::NODE_ID)).await, 1);
    assert_eq!(count(CriteriaGroup::new().between(fields::NODE_ID, 0_i64, 9_i64)).await, 1);
}

#[tokio::test]
async fn test_order_by_nullable_column() {
    let repo = Repo::new(MemoryStore::new());
    let mut keys = Vec::new();
    for node in [Some(2), None, Some(1)] {
        let inserted = repo
            .insert_selective(&running("t1").node_id(node))
            .await
            .unwrap();
        keys.push(inserted.primary_key);
    }

    let ascending = repo
        .select_by_example(&Criteria::new().order_by(fields::NODE_ID, OrderDirection::Ascending))
        .await
        .unwrap();
    assert_eq!(ids(&ascending), vec![keys[2], keys[0], keys[1]]);

    let descending = repo
        .select_by_example(&Criteria::new().order_by(fields::NODE_ID, OrderDirection::Descending))
        .await
        .unwrap();
    assert_eq!(ids(&descending), vec![keys[1], keys[0], keys[2]]);
}

#[tokio::test]
async fn test_like_patterns() {
    let (repo, keys) = seeded(&["orders_2024", "orders_2025", "order%s", "users"]).await;

    let prefix = repo
        .select_by_example(&Criteria::matching(CriteriaGroup::new().like(fields::TABLE, "orders%")))
        .await
        .unwrap();
    assert_eq!(ids(&prefix), vec![keys[0], keys[1]]);

    let literal = repo
        .select_by_example(&Criteria::matching(
            CriteriaGroup::new().like(fields::TABLE, "order\\%s"),
        ))
        .await
        .unwrap();
    assert_eq!(ids(&literal), vec![keys[2]]);
}

#[tokio::test]
async fn test_transaction_rollback_and_commit() {
    let (repo, keys) = seeded(&["t1"]).await;

    let scope = repo.begin().await.unwrap();
    scope.delete_by_primary_key(keys[0]).await.unwrap();
    scope.insert_selective(&running("t2")).await.unwrap();
    scope.rollback().await.unwrap();
    assert!(repo.exists(keys[0]).await.unwrap());
    assert_eq!(repo.count_by_example(&Criteria::new()).await.unwrap(), 1);

    let scope = repo.begin().await.unwrap();
    scope
        .update_by_primary_key_selective(&PartitionPatch::new().partition_id(keys[0]).status("DONE"))
        .await
        .unwrap();
    scope.commit().await.unwrap();
    assert_eq!(repo.select_by_primary_key(keys[0]).await.unwrap().status, "DONE");
}

#[tokio::test]
async fn test_criteria_from_json() {
    let (repo, keys) = seeded(&["t1", "t2", "t3"]).await;
    let criteria: Criteria = serde_json::from_value(serde_json::json!({
        "groups": [
            [{"field": "table", "operator": "in", "operand": {"set": ["t2", "t3"]}}]
        ],
        "order_by": [{"field": "table", "direction": "desc"}]
    }))
    .unwrap();

    let selected = repo.select_by_example(&criteria).await.unwrap();
    assert_eq!(ids(&selected), vec![keys[2], keys[1]]);
}
