//! Integration tests for sibling-set reconciliation
//!
//! Require a running PostgreSQL database (see `common`).

mod common;

use common::Fixture;
use taskboard_shared::{
    activation::{update_board, ActivationPolicy, UpdateBoard},
    db::transaction::{begin, ConsistencyLevel},
    error::CoreError,
    models::{
        column::Column,
        subtask::Subtask,
        tag::Tag,
        task::{CreateTask, NewSubtask, Task, UpdateTask},
    },
    ordering::{
        reconcile::{reconcile, ColumnFields, SubtaskFields, Submitted, TaskSubtasks},
        OrderingPolicy, COLUMNS, SUBTASKS,
    },
};
use uuid::Uuid;

fn subtask(id: Option<Uuid>, name: &str) -> Submitted<SubtaskFields> {
    Submitted {
        id,
        fields: SubtaskFields {
            name: name.to_string(),
            completed: None,
        },
    }
}

fn column(id: Option<Uuid>, name: &str) -> Submitted<ColumnFields> {
    Submitted {
        id,
        fields: ColumnFields {
            name: name.to_string(),
        },
    }
}

#[tokio::test]
async fn test_reconcile_keeps_updates_creates_and_deletes() {
    let fx = Fixture::new().await;
    let (_, columns) = fx.board("Reconcile", &["Todo"]).await;
    let tasks = fx.tasks(columns[0].id, &["T"]).await;
    let existing = fx.subtasks(tasks[0].id, &["Write tests", "Review"]).await;

    let mut tx = begin(&fx.pool, ConsistencyLevel::ReadCommitted).await.unwrap();
    let outcome = reconcile(
        &mut tx,
        &TaskSubtasks {
            task_id: tasks[0].id,
        },
        Some(vec![
            subtask(Some(existing[0].id), "Write tests"),
            subtask(None, "New subtask"),
        ]),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(outcome.updated.len(), 1);
    assert_eq!(outcome.updated[0].id, existing[0].id);
    assert_eq!(outcome.created.len(), 1);
    assert_eq!(outcome.deleted_ids, vec![existing[1].id]);

    let after = Subtask::list_by_task(&fx.pool, tasks[0].id).await.unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0].id, existing[0].id);
    assert_eq!(after[0].position, 0);
    assert_eq!(after[1].name, "New subtask");
    assert_eq!(after[1].position, 1);

    fx.cleanup().await;
}

#[tokio::test]
async fn test_resubmitting_current_state_changes_nothing() {
    let fx = Fixture::new().await;
    let (_, columns) = fx.board("Round trip", &["Todo"]).await;
    let tasks = fx.tasks(columns[0].id, &["T"]).await;
    let existing = fx.subtasks(tasks[0].id, &["a", "b", "c"]).await;

    let submitted: Vec<_> = existing
        .iter()
        .map(|s| subtask(Some(s.id), &s.name))
        .collect();

    let mut tx = begin(&fx.pool, ConsistencyLevel::ReadCommitted).await.unwrap();
    let outcome = reconcile(
        &mut tx,
        &TaskSubtasks {
            task_id: tasks[0].id,
        },
        Some(submitted),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert!(outcome.created.is_empty());
    assert!(outcome.deleted_ids.is_empty());
    assert_eq!(
        fx.subtask_layout(tasks[0].id).await,
        vec![
            ("a".to_string(), 0),
            ("b".to_string(), 1),
            ("c".to_string(), 2)
        ]
    );

    let after = Subtask::list_by_task(&fx.pool, tasks[0].id).await.unwrap();
    for (before, after) in existing.iter().zip(&after) {
        assert_eq!(after.updated_at, before.updated_at, "{} was rewritten", after.name);
    }

    fx.cleanup().await;
}

#[tokio::test]
async fn test_unchanged_columns_keep_their_timestamps() {
    let fx = Fixture::new().await;
    let (board, columns) = fx.board("Stable columns", &["Todo", "Done"]).await;

    update_board(
        &fx.pool,
        &ActivationPolicy::default(),
        fx.owner_id(),
        board.id,
        UpdateBoard {
            columns: Some(vec![
                column(Some(columns[0].id), "Todo"),
                column(Some(columns[1].id), "Finished"),
            ]),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let after = Column::list_by_board(&fx.pool, board.id).await.unwrap();
    assert_eq!(after[0].id, columns[0].id);
    assert_eq!(after[0].updated_at, columns[0].updated_at);
    assert_eq!(after[1].name, "Finished");
    assert!(after[1].updated_at > columns[1].updated_at);

    fx.cleanup().await;
}

#[tokio::test]
async fn test_submitted_order_becomes_positions() {
    let fx = Fixture::new().await;
    let (_, columns) = fx.board("Reverse", &["Todo"]).await;
    let tasks = fx.tasks(columns[0].id, &["T"]).await;
    let existing = fx.subtasks(tasks[0].id, &["a", "b", "c"]).await;

    let submitted: Vec<_> = existing
        .iter()
        .rev()
        .map(|s| subtask(Some(s.id), &s.name))
        .collect();

    let mut tx = begin(&fx.pool, ConsistencyLevel::ReadCommitted).await.unwrap();
    reconcile(
        &mut tx,
        &TaskSubtasks {
            task_id: tasks[0].id,
        },
        Some(submitted),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(
        fx.subtask_layout(tasks[0].id).await,
        vec![
            ("c".to_string(), 0),
            ("b".to_string(), 1),
            ("a".to_string(), 2)
        ]
    );

    fx.cleanup().await;
}

#[tokio::test]
async fn test_omitted_collection_clears_siblings() {
    let fx = Fixture::new().await;
    let (_, columns) = fx.board("Clear", &["Todo"]).await;
    let tasks = fx.tasks(columns[0].id, &["T"]).await;
    fx.subtasks(tasks[0].id, &["a", "b"]).await;

    let mut tx = begin(&fx.pool, ConsistencyLevel::ReadCommitted).await.unwrap();
    let outcome = reconcile(
        &mut tx,
        &TaskSubtasks {
            task_id: tasks[0].id,
        },
        None,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(outcome.deleted_ids.len(), 2);
    assert!(fx.subtask_layout(tasks[0].id).await.is_empty());

    fx.cleanup().await;
}

#[tokio::test]
async fn test_foreign_id_is_treated_as_create() {
    let fx = Fixture::new().await;
    let (_, columns) = fx.board("Foreign id", &["Todo"]).await;
    let tasks = fx.tasks(columns[0].id, &["T", "Other"]).await;
    let mine = fx.subtasks(tasks[0].id, &["mine"]).await;
    let theirs = fx.subtasks(tasks[1].id, &["theirs"]).await;

    let mut tx = begin(&fx.pool, ConsistencyLevel::ReadCommitted).await.unwrap();
    let outcome = reconcile(
        &mut tx,
        &TaskSubtasks {
            task_id: tasks[0].id,
        },
        Some(vec![
            subtask(Some(mine[0].id), "mine"),
            subtask(Some(theirs[0].id), "copied"),
        ]),
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(outcome.created.len(), 1);
    assert_ne!(outcome.created[0].id, theirs[0].id);

    // The other task's subtask is untouched
    assert_eq!(
        fx.subtask_layout(tasks[1].id).await,
        vec![("theirs".to_string(), 0)]
    );

    fx.cleanup().await;
}

#[tokio::test]
async fn test_duplicate_id_rolls_back() {
    let fx = Fixture::new().await;
    let (_, columns) = fx.board("Duplicate", &["Todo"]).await;
    let tasks = fx.tasks(columns[0].id, &["T"]).await;
    let existing = fx.subtasks(tasks[0].id, &["a", "b"]).await;

    let mut tx = begin(&fx.pool, ConsistencyLevel::ReadCommitted).await.unwrap();
    let err = reconcile(
        &mut tx,
        &TaskSubtasks {
            task_id: tasks[0].id,
        },
        Some(vec![
            subtask(Some(existing[0].id), "x"),
            subtask(Some(existing[0].id), "y"),
        ]),
    )
    .await
    .unwrap_err();
    drop(tx);

    assert!(matches!(err, CoreError::ValidationFailed(_)));
    assert_eq!(
        fx.subtask_layout(tasks[0].id).await,
        vec![("a".to_string(), 0), ("b".to_string(), 1)]
    );

    fx.cleanup().await;
}

#[tokio::test]
async fn test_update_board_reconciles_columns() {
    let fx = Fixture::new().await;
    let (board, columns) = fx.board("Columns", &["Todo", "Doing", "Done"]).await;
    fx.tasks(columns[1].id, &["in progress"]).await;

    update_board(
        &fx.pool,
        &ActivationPolicy::default(),
        fx.owner_id(),
        board.id,
        UpdateBoard {
            name: Some("Renamed".to_string()),
            columns: Some(vec![
                column(Some(columns[2].id), "Shipped"),
                column(Some(columns[0].id), "Todo"),
                column(None, "Blocked"),
            ]),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let after = Column::list_by_board(&fx.pool, board.id).await.unwrap();
    let names: Vec<&str> = after.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Shipped", "Todo", "Blocked"]);
    assert_eq!(after[0].id, columns[2].id);
    fx.assert_dense(COLUMNS, board.id).await;

    // Dropping "Doing" cascades to its tasks
    assert!(fx.task_layout(columns[1].id).await.is_empty());

    fx.cleanup().await;
}

#[tokio::test]
async fn test_update_board_without_columns_removes_them() {
    let fx = Fixture::new().await;
    let (board, _) = fx.board("No columns", &["Todo", "Done"]).await;

    update_board(
        &fx.pool,
        &ActivationPolicy::default(),
        fx.owner_id(),
        board.id,
        UpdateBoard::default(),
    )
    .await
    .unwrap();

    assert!(Column::list_by_board(&fx.pool, board.id).await.unwrap().is_empty());

    fx.cleanup().await;
}

#[tokio::test]
async fn test_create_with_subtasks_and_tags() {
    let fx = Fixture::new().await;
    let (_, columns) = fx.board("Create", &["Todo"]).await;
    fx.tasks(columns[0].id, &["existing"]).await;
    let tag = Tag::create(&fx.pool, fx.owner_id(), "urgent", "#ff0000").await.unwrap();

    let detail = Task::create_with_subtasks(
        &fx.pool,
        &OrderingPolicy::default(),
        fx.owner_id(),
        &CreateTask {
            column_id: columns[0].id,
            name: "Ship it".to_string(),
            ..Default::default()
        },
        &[
            NewSubtask {
                name: "build".to_string(),
                completed: true,
            },
            NewSubtask {
                name: "release".to_string(),
                completed: false,
            },
        ],
        &[tag.id],
    )
    .await
    .unwrap();

    assert_eq!(detail.task.position, 1);
    assert_eq!(detail.task.status, "Todo");
    assert_eq!(detail.subtasks.len(), 2);
    assert!(detail.subtasks[0].completed);
    assert_eq!(detail.subtasks[1].position, 1);
    assert_eq!(detail.tags.len(), 1);
    assert_eq!(detail.tags[0].id, tag.id);

    fx.cleanup().await;
}

#[tokio::test]
async fn test_create_with_foreign_tag_writes_nothing() {
    let fx = Fixture::new().await;
    let other = Fixture::new().await;
    let (_, columns) = fx.board("Foreign tag", &["Todo"]).await;
    let foreign = Tag::create(&other.pool, other.owner_id(), "theirs", "blue").await.unwrap();

    let err = Task::create_with_subtasks(
        &fx.pool,
        &OrderingPolicy::default(),
        fx.owner_id(),
        &CreateTask {
            column_id: columns[0].id,
            name: "Tagged".to_string(),
            ..Default::default()
        },
        &[],
        &[foreign.id],
    )
    .await
    .unwrap_err();

    assert!(matches!(err, CoreError::NotFound(_)));
    assert!(fx.task_layout(columns[0].id).await.is_empty());

    fx.cleanup().await;
    other.cleanup().await;
}

#[tokio::test]
async fn test_update_with_subtasks_keeps_completion_and_tags() {
    let fx = Fixture::new().await;
    let (_, columns) = fx.board("Update", &["Todo"]).await;
    let tag = Tag::create(&fx.pool, fx.owner_id(), "later", "gray").await.unwrap();
    let created = Task::create_with_subtasks(
        &fx.pool,
        &OrderingPolicy::default(),
        fx.owner_id(),
        &CreateTask {
            column_id: columns[0].id,
            name: "Original".to_string(),
            ..Default::default()
        },
        &[NewSubtask {
            name: "done already".to_string(),
            completed: true,
        }],
        &[tag.id],
    )
    .await
    .unwrap();
    let kept = created.subtasks[0].id;

    let updated = Task::update_with_subtasks(
        &fx.pool,
        &OrderingPolicy::default(),
        fx.owner_id(),
        created.task.id,
        &UpdateTask {
            name: Some("Renamed".to_string()),
            ..Default::default()
        },
        Some(vec![
            subtask(None, "first"),
            subtask(Some(kept), "done already, renamed"),
        ]),
        None,
    )
    .await
    .unwrap();

    assert_eq!(updated.task.name, "Renamed");
    assert_eq!(updated.subtasks.len(), 2);
    assert_eq!(updated.subtasks[1].id, kept);
    assert!(updated.subtasks[1].completed);
    assert!(!updated.subtasks[0].completed);
    assert_eq!(updated.tags.len(), 1);
    fx.assert_dense(SUBTASKS, created.task.id).await;

    // An explicit empty tag list clears them; omitting subtasks clears those
    let cleared = Task::update_with_subtasks(
        &fx.pool,
        &OrderingPolicy::default(),
        fx.owner_id(),
        created.task.id,
        &UpdateTask::default(),
        None,
        Some(&[][..]),
    )
    .await
    .unwrap();
    assert!(cleared.subtasks.is_empty());
    assert!(cleared.tags.is_empty());
    assert_eq!(cleared.task.name, "Renamed");

    fx.cleanup().await;
}

#[tokio::test]
async fn test_update_rename_respects_name_policy() {
    let fx = Fixture::new().await;
    let (_, columns) = fx.board("Rename", &["Todo"]).await;
    let tasks = fx.tasks(columns[0].id, &["Alpha", "Beta"]).await;

    let strict = OrderingPolicy {
        unique_task_names_per_column: true,
        ..Default::default()
    };
    let err = Task::update_with_subtasks(
        &fx.pool,
        &strict,
        fx.owner_id(),
        tasks[1].id,
        &UpdateTask {
            name: Some("Alpha".to_string()),
            ..Default::default()
        },
        None,
        None,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CoreError::Conflict(_)));

    // Keeping the current name is not a conflict with itself
    Task::update_with_subtasks(
        &fx.pool,
        &strict,
        fx.owner_id(),
        tasks[1].id,
        &UpdateTask {
            name: Some("Beta".to_string()),
            ..Default::default()
        },
        None,
        None,
    )
    .await
    .unwrap();

    fx.cleanup().await;
}
