use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{
    App,
    error::AppError,
    identity::AuthUser,
    models::{
        like::{LIKES_TABLE, Like, LikeSummary, NewLike},
        project::{PROJECTS_TABLE, Project},
    },
    store::{Filter, Select, StoreError, TabularStore, fetch_all, fetch_one},
};

pub async fn like_summary<S>(
    store: &S,
    project_id: i64,
    viewer: Option<Uuid>,
) -> Result<LikeSummary, StoreError>
where
    S: TabularStore + ?Sized,
{
    let likes: Vec<Like> = fetch_all(store, &Select::from(LIKES_TABLE).eq("project_id", project_id)).await?;

    Ok(LikeSummary {
        count: likes.len(),
        user_liked: viewer.is_some_and(|v| likes.iter().any(|l| l.user_id == v)),
    })
}

/// Likes the project for `user`, or takes the like back if there already is one.
pub async fn toggle_like<S>(store: &S, project_id: i64, user: Uuid) -> Result<LikeSummary, StoreError>
where
    S: TabularStore + ?Sized,
{
    // 404 instead of a foreign key violation
    fetch_one::<Project, _>(store, &Select::from(PROJECTS_TABLE).eq("id", project_id)).await?;

    let existing: Vec<Like> = fetch_all(
        store,
        &Select::from(LIKES_TABLE)
            .eq("project_id", project_id)
            .eq("user_id", user)
            .limit(1),
    )
    .await?;

    if existing.is_empty() {
        let row = serde_json::to_value(NewLike {
            project_id,
            user_id: user,
        })
        .map_err(StoreError::decode)?;
        // Two concurrent likes can both see no row. The likes table is unique
        // on (project_id, user_id), so the slower insert fails instead.
        match store.insert(LIKES_TABLE, vec![row]).await {
            Ok(_) => tracing::debug!(project_id, user_id = %user, "liked"),
            Err(e) if e.is_unique_violation() => {
                tracing::debug!(project_id, user_id = %user, "already liked")
            }
            Err(e) => return Err(e),
        }
    } else {
        store
            .delete(
                LIKES_TABLE,
                &[
                    Filter::eq("project_id", project_id),
                    Filter::eq("user_id", user),
                ],
            )
            .await?;
        tracing::debug!(project_id, user_id = %user, "unliked");
    }

    like_summary(store, project_id, Some(user)).await
}

pub async fn like_project(
    State(ctx): State<App>,
    Path(project_id): Path<i64>,
    AuthUser(identity): AuthUser,
) -> Result<Json<LikeSummary>, AppError> {
    let store = ctx.store_for(Some(&identity));
    Ok(Json(toggle_like(&store, project_id, identity.id).await?))
}
