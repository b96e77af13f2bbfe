//! Ordered collection reconciliation
//!
//! Syncs a client-submitted list against the persisted siblings of one
//! parent. Items whose `id` matches an existing sibling are updated in place,
//! all others are created, and every touched item takes its index in the
//! submitted list as its position. Existing siblings that were not touched
//! are deleted afterwards.
//!
//! An omitted collection (`None`) deletes every sibling, as does an empty
//! one; both paths are kept distinct so callers can tell them apart.
//!
//! # Example
//!
//! ```no_run
//! use taskboard_shared::ordering::reconcile::{reconcile, BoardColumns, ColumnFields, Submitted};
//! # async fn example(pool: sqlx::PgPool, board_id: uuid::Uuid, todo_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
//! let mut tx = pool.begin().await?;
//! let outcome = reconcile(
//!     &mut *tx,
//!     &BoardColumns { board_id },
//!     Some(vec![
//!         Submitted { id: Some(todo_id), fields: ColumnFields { name: "Todo".into() } },
//!         Submitted { id: None, fields: ColumnFields { name: "Done".into() } },
//!     ]),
//! )
//! .await?;
//! tx.commit().await?;
//! println!("{} created, {} deleted", outcome.created.len(), outcome.deleted_ids.len());
//! # Ok(())
//! # }
//! ```

use super::{OrderedTable, COLUMNS, SUBTASKS};
use crate::error::{CoreError, CoreResult};
use crate::models::column::Column;
use crate::models::subtask::Subtask;
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

/// One item of a submitted list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Submitted<F> {
    /// Identity of an existing sibling; absent or unknown means "create"
    #[serde(default, alias = "uuid")]
    pub id: Option<Uuid>,

    #[serde(flatten)]
    pub fields: F,
}

/// A single step of a reconciliation plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Create the submitted item at `index`
    Create { index: usize, position: i32 },

    /// Update existing sibling `id` with the submitted item at `index`
    Update { index: usize, id: Uuid, position: i32 },
}

/// Writes required to make the persisted set match the submitted list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// One step per submitted item, in input order
    pub steps: Vec<Step>,

    /// Existing siblings not referenced by the submission, in position order
    pub to_delete: Vec<Uuid>,
}

/// Result of a reconciliation pass
#[derive(Debug, Clone)]
pub struct ReconcileOutcome<E> {
    pub created: Vec<E>,
    pub updated: Vec<E>,
    pub deleted_ids: Vec<Uuid>,
}

impl<E> Default for ReconcileOutcome<E> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            updated: Vec::new(),
            deleted_ids: Vec::new(),
        }
    }
}

/// Computes the reconciliation steps without touching the store
///
/// # Errors
///
/// `ValidationFailed` when two submitted items carry the same existing id.
pub fn plan<F>(existing: &[Uuid], submitted: &[Submitted<F>]) -> CoreResult<Plan> {
    let existing_set: HashSet<Uuid> = existing.iter().copied().collect();
    let mut touched: HashSet<Uuid> = HashSet::with_capacity(submitted.len());
    let mut steps = Vec::with_capacity(submitted.len());

    for (index, item) in submitted.iter().enumerate() {
        let position = i32::try_from(index)
            .map_err(|_| CoreError::invalid("Too many items submitted"))?;

        match item.id {
            Some(id) if existing_set.contains(&id) => {
                if !touched.insert(id) {
                    return Err(CoreError::invalid(format!(
                        "Item {} appears more than once in the submitted list",
                        id
                    )));
                }
                steps.push(Step::Update {
                    index,
                    id,
                    position,
                });
            }
            _ => steps.push(Step::Create { index, position }),
        }
    }

    let to_delete = existing
        .iter()
        .copied()
        .filter(|id| !touched.contains(id))
        .collect();

    Ok(Plan { steps, to_delete })
}

/// A persisted sibling set that can be reconciled
#[async_trait]
pub trait SiblingSet: Send + Sync {
    /// Client-editable fields of one item
    type Fields: Send + Sync;

    /// Row type returned after a write
    type Entity: Send;

    fn table(&self) -> OrderedTable;

    fn parent_id(&self) -> Uuid;

    async fn create(
        &self,
        conn: &mut PgConnection,
        fields: &Self::Fields,
        position: i32,
    ) -> Result<Self::Entity, sqlx::Error>;

    async fn update(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        fields: &Self::Fields,
        position: i32,
    ) -> Result<Self::Entity, sqlx::Error>;
}

/// Reconciles `submitted` against the set on the caller's transaction
///
/// Creates and updates run in input order, deletes run last. Any error
/// leaves the transaction for the caller to roll back.
pub async fn reconcile<S: SiblingSet>(
    conn: &mut PgConnection,
    set: &S,
    submitted: Option<Vec<Submitted<S::Fields>>>,
) -> CoreResult<ReconcileOutcome<S::Entity>> {
    let table = set.table();
    let parent_id = set.parent_id();
    let existing = table.ordered_ids(&mut *conn, parent_id).await?;

    let submitted = match submitted {
        Some(items) => items,
        None => {
            debug!(
                table = table.table,
                parent_id = %parent_id,
                existing = existing.len(),
                "Collection omitted, clearing all siblings"
            );
            Vec::new()
        }
    };

    let plan = plan(&existing, &submitted)?;
    debug!(
        table = table.table,
        parent_id = %parent_id,
        steps = plan.steps.len(),
        deletes = plan.to_delete.len(),
        "Reconciliation planned"
    );

    let mut outcome = ReconcileOutcome::default();

    for step in &plan.steps {
        match *step {
            Step::Create { index, position } => {
                let entity = set.create(&mut *conn, &submitted[index].fields, position).await?;
                outcome.created.push(entity);
            }
            Step::Update {
                index,
                id,
                position,
            } => {
                let entity = set
                    .update(&mut *conn, id, &submitted[index].fields, position)
                    .await?;
                outcome.updated.push(entity);
            }
        }
    }

    if !plan.to_delete.is_empty() {
        let sql = format!("DELETE FROM {} WHERE id = ANY($1)", table.table);
        sqlx::query(&sql)
            .bind(&plan.to_delete)
            .execute(&mut *conn)
            .await?;
    }
    outcome.deleted_ids = plan.to_delete;

    info!(
        table = table.table,
        parent_id = %parent_id,
        created = outcome.created.len(),
        updated = outcome.updated.len(),
        deleted = outcome.deleted_ids.len(),
        "Sibling set reconciled"
    );

    Ok(outcome)
}

/// Editable fields of a board column
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnFields {
    pub name: String,
}

/// Columns of one board
#[derive(Debug, Clone, Copy)]
pub struct BoardColumns {
    pub board_id: Uuid,
}

#[async_trait]
impl SiblingSet for BoardColumns {
    type Fields = ColumnFields;
    type Entity = Column;

    fn table(&self) -> OrderedTable {
        COLUMNS
    }

    fn parent_id(&self) -> Uuid {
        self.board_id
    }

    async fn create(
        &self,
        conn: &mut PgConnection,
        fields: &ColumnFields,
        position: i32,
    ) -> Result<Column, sqlx::Error> {
        Column::insert(conn, self.board_id, &fields.name, position).await
    }

    async fn update(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        fields: &ColumnFields,
        position: i32,
    ) -> Result<Column, sqlx::Error> {
        Column::update(conn, id, &fields.name, position).await
    }
}

/// Editable fields of a subtask; `completed` is kept when omitted on update
/// and defaults to `false` on create
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubtaskFields {
    pub name: String,

    #[serde(default, alias = "is_completed")]
    pub completed: Option<bool>,
}

/// Subtasks of one task
#[derive(Debug, Clone, Copy)]
pub struct TaskSubtasks {
    pub task_id: Uuid,
}

#[async_trait]
impl SiblingSet for TaskSubtasks {
    type Fields = SubtaskFields;
    type Entity = Subtask;

    fn table(&self) -> OrderedTable {
        SUBTASKS
    }

    fn parent_id(&self) -> Uuid {
        self.task_id
    }

    async fn create(
        &self,
        conn: &mut PgConnection,
        fields: &SubtaskFields,
        position: i32,
    ) -> Result<Subtask, sqlx::Error> {
        Subtask::insert(
            conn,
            self.task_id,
            &fields.name,
            fields.completed.unwrap_or(false),
            position,
        )
        .await
    }

    async fn update(
        &self,
        conn: &mut PgConnection,
        id: Uuid,
        fields: &SubtaskFields,
        position: i32,
    ) -> Result<Subtask, sqlx::Error> {
        Subtask::replace(conn, id, &fields.name, fields.completed, position).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Option<Uuid>, name: &str) -> Submitted<ColumnFields> {
        Submitted {
            id,
            fields: ColumnFields {
                name: name.to_string(),
            },
        }
    }

    #[test]
    fn test_plan_keeps_matches_creates_new_and_deletes_rest() {
        let write_tests = Uuid::new_v4();
        let review = Uuid::new_v4();

        let plan = plan(
            &[write_tests, review],
            &[item(Some(write_tests), "Write tests"), item(None, "New subtask")],
        )
        .unwrap();

        assert_eq!(
            plan.steps,
            vec![
                Step::Update {
                    index: 0,
                    id: write_tests,
                    position: 0
                },
                Step::Create {
                    index: 1,
                    position: 1
                },
            ]
        );
        assert_eq!(plan.to_delete, vec![review]);
    }

    #[test]
    fn test_plan_unknown_id_creates() {
        let existing = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let plan = plan(&[existing], &[item(Some(stranger), "Doing")]).unwrap();

        assert_eq!(
            plan.steps,
            vec![Step::Create {
                index: 0,
                position: 0
            }]
        );
        assert_eq!(plan.to_delete, vec![existing]);
    }

    #[test]
    fn test_plan_empty_submission_deletes_everything() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let plan = plan::<ColumnFields>(&[a, b], &[]).unwrap();

        assert!(plan.steps.is_empty());
        assert_eq!(plan.to_delete, vec![a, b]);
    }

    #[test]
    fn test_plan_rejects_duplicate_existing_id() {
        let a = Uuid::new_v4();

        let err = plan(&[a], &[item(Some(a), "Todo"), item(Some(a), "Done")]).unwrap_err();

        assert!(matches!(err, CoreError::ValidationFailed(_)));
    }

    #[test]
    fn test_plan_resubmitting_current_list_is_update_only() {
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let submitted: Vec<_> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| item(Some(*id), &format!("Column {}", i)))
            .collect();

        let plan = plan(&ids, &submitted).unwrap();

        assert!(plan.to_delete.is_empty());
        for (i, step) in plan.steps.iter().enumerate() {
            assert_eq!(
                *step,
                Step::Update {
                    index: i,
                    id: ids[i],
                    position: i as i32
                }
            );
        }
    }

    #[test]
    fn test_plan_reordering_assigns_submission_positions() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        let plan = plan(&[a, b, c], &[item(Some(c), "C"), item(Some(a), "A")]).unwrap();

        assert_eq!(
            plan.steps,
            vec![
                Step::Update {
                    index: 0,
                    id: c,
                    position: 0
                },
                Step::Update {
                    index: 1,
                    id: a,
                    position: 1
                },
            ]
        );
        assert_eq!(plan.to_delete, vec![b]);
    }

    #[test]
    fn test_submitted_deserializes_with_and_without_id() {
        let id = Uuid::new_v4();
        let json = format!(r#"[{{"id":"{}","name":"Todo"}},{{"name":"Done"}}]"#, id);

        let items: Vec<Submitted<ColumnFields>> = serde_json::from_str(&json).unwrap();

        assert_eq!(items[0], item(Some(id), "Todo"));
        assert_eq!(items[1], item(None, "Done"));
    }

    #[test]
    fn test_deserialize_uuid_alias() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"uuid":"{}","name":"Doing"}}"#, id);

        let parsed: Submitted<ColumnFields> = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, item(Some(id), "Doing"));
    }
}
