//! Directory merge
//!
//! Makes sure a source directory exists at the destination, then registers
//! one task per source child. Children already present at the destination
//! with the same name and content hash are settled on the spot.

use std::collections::HashMap;

use tracing::debug;

use drivepull_core::domain::{ApiError, Entry, EntryId, EntryRef, Task, TaskError};

use crate::context::SyncContext;

/// Creates `name` under `parent_id`, or finds the existing directory
///
/// Returns the directory and whether it was created by this call.
pub(crate) async fn ensure_directory(
    ctx: &SyncContext,
    name: &str,
    parent_id: &EntryId,
) -> Result<(Entry, bool), ApiError> {
    let created = ctx
        .reauth
        .guarded("make_directory", || {
            ctx.destination.make_directory(name, parent_id)
        })
        .await;

    match created {
        Ok(dir) => Ok((dir, true)),
        Err(ApiError::AlreadyExists(_)) => {
            let siblings = ctx
                .reauth
                .guarded("list_children", || ctx.destination.list_children(parent_id))
                .await?;
            siblings
                .into_iter()
                .find(|e| e.is_directory && e.name == name)
                .map(|dir| (dir, false))
                .ok_or_else(|| {
                    ApiError::NotFound(format!(
                        "directory {name:?} reported as existing but missing from {parent_id}"
                    ))
                })
        }
        Err(e) => Err(e),
    }
}

/// Looks `name` up under `parent_id` and creates it only when missing
///
/// Used while resolving the run's target directories, so that a rerun over
/// an existing tree issues no create at all.
pub(crate) async fn find_or_create_directory(
    ctx: &SyncContext,
    name: &str,
    parent_id: &EntryId,
) -> Result<(Entry, bool), ApiError> {
    let siblings = ctx
        .reauth
        .guarded("list_children", || ctx.destination.list_children(parent_id))
        .await?;

    match siblings.into_iter().find(|e| e.name == name) {
        Some(dir) if dir.is_directory => Ok((dir, false)),
        Some(_) => Err(ApiError::Client {
            status: 409,
            message: format!("{name:?} exists and is not a directory"),
        }),
        None => ensure_directory(ctx, name, parent_id).await,
    }
}

/// Executes one directory task and returns the child ids to dispatch
pub async fn sync_directory(ctx: &SyncContext, task: &Task) -> Result<Vec<EntryId>, TaskError> {
    let id = task.id();

    let (dest_dir, fresh) = match &task.dest {
        Some(dir) => (dir.clone(), false),
        None => {
            let (dir, fresh) =
                ensure_directory(ctx, &task.source.name, &task.dest_parent_id).await?;
            ctx.store
                .set_destination(id, dir.clone())
                .map_err(|e| TaskError::Unexpected(e.to_string()))?;
            (dir, fresh)
        }
    };

    let mut existing: HashMap<(String, bool), Entry> = HashMap::new();
    if !fresh {
        let listing = ctx
            .reauth
            .guarded("list_children", || {
                ctx.destination.list_children(&dest_dir.id)
            })
            .await?;
        for entry in listing {
            existing.insert(entry.snapshot_key(), entry);
        }
    }

    let children = ctx
        .source
        .list_children(&EntryRef::Id(id.clone()))
        .await
        .map_err(ApiError::into_source_error)?;

    let total = children.len() as u64;
    let mut tasks = Vec::with_capacity(children.len());
    let mut dispatch = Vec::with_capacity(children.len());
    let mut settled = Vec::new();
    let (mut files, mut bytes) = (0u64, 0u64);

    for child in children {
        let matched = existing.remove(&child.snapshot_key());
        if !child.is_directory {
            files += 1;
            bytes += child.size;
        }

        let mut child_task = Task::new(child, dest_dir.id.clone());
        let up_to_date = match matched {
            Some(dest) if child_task.is_directory() => {
                child_task.dest = Some(dest);
                false
            }
            Some(dest) if child_task.source.content_matches(&dest) => {
                child_task.dest = Some(dest);
                true
            }
            _ => false,
        };

        if up_to_date {
            settled.push((
                child_task.id().clone(),
                child_task.source.path.clone(),
                child_task.source.size,
            ));
        } else {
            dispatch.push(child_task.id().clone());
        }
        tasks.push(child_task);
    }

    ctx.store
        .put_all(tasks)
        .map_err(|e| TaskError::Unexpected(e.to_string()))?;
    ctx.stats.record_discovered(total, files, bytes);

    for (child_id, path, size) in settled {
        ctx.store
            .resolve_success(&child_id)
            .map_err(|e| TaskError::Unexpected(e.to_string()))?;
        ctx.stats.record_succeeded(false, size);
        debug!(task_id = %child_id, path = %path, "Already present at destination, skipping");
    }

    debug!(
        task_id = %id,
        path = %task.source.path,
        children = total,
        dispatched = dispatch.len(),
        "Directory merged"
    );
    Ok(dispatch)
}
