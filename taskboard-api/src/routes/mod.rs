/// API route handlers, one module per resource
///
/// Handlers validate and decode requests, call the shared crate's models or
/// ordering core with the caller's `AuthContext`, and return JSON.

pub mod auth;
pub mod boards;
pub mod columns;
pub mod health;
pub mod subtasks;
pub mod tags;
pub mod tasks;

use crate::error::{ApiError, ValidationErrorDetail};
use std::collections::HashSet;

/// Rejects a submitted list in which two items share a name
///
/// Names are compared case-insensitively after trimming. Every duplicate
/// is reported as `field.<index>.name`.
pub(crate) fn ensure_unique_names<'a>(
    field: &str,
    names: impl IntoIterator<Item = &'a str>,
) -> Result<(), ApiError> {
    let mut seen = HashSet::new();
    let details: Vec<ValidationErrorDetail> = names
        .into_iter()
        .enumerate()
        .filter(|(_, name)| !seen.insert(name.trim().to_lowercase()))
        .map(|(index, name)| ValidationErrorDetail {
            field: format!("{}.{}.name", field, index),
            message: format!("Duplicate name '{}'", name.trim()),
        })
        .collect();

    if details.is_empty() {
        Ok(())
    } else {
        Err(ApiError::ValidationError(details))
    }
}

/// Length rule shared by column, task and subtask names
pub(crate) fn check_name_length(
    field: &str,
    name: &str,
    min: usize,
    max: usize,
) -> Result<(), ApiError> {
    let len = name.trim().chars().count();
    if len < min || len > max {
        return Err(ApiError::invalid_field(
            field,
            format!("Name must be between {} and {} characters", min, max),
        ));
    }
    Ok(())
}
