use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    App,
    enrichment::{Enriched, Relation, resolve_enriched},
    error::AppError,
    identity::MaybeAuthUser,
    models::comment::{COMMENTS_TABLE, Comment},
    store::{Direction, Select, StoreError, TabularStore},
};

use super::{
    CommentView,
    thread::{CommentTree, OrphanPolicy, build_threads, count_comments},
};

#[derive(Serialize)]
pub struct CommentListing {
    /// Comments placed in a thread, which excludes dropped orphans.
    pub count: usize,
    pub threads: Vec<CommentTree<CommentView>>,
}

/// Every comment on the project, oldest first, arranged into reply threads.
pub async fn fetch_comment_threads<S>(
    store: &S,
    project_id: i64,
    viewer: Option<Uuid>,
    policy: OrphanPolicy,
) -> Result<CommentListing, StoreError>
where
    S: TabularStore + ?Sized,
{
    let base = Select::from(COMMENTS_TABLE)
        .eq("project_id", project_id)
        .order("created_at", Direction::Asc);
    let rows: Vec<Enriched<Comment>> =
        resolve_enriched(store, &base, &Relation::AUTHOR_PROFILE).await?;

    let views = rows.into_iter().map(|r| CommentView::new(r, viewer)).collect();
    let threads = build_threads(views, policy);

    Ok(CommentListing {
        count: count_comments(&threads),
        threads,
    })
}

pub async fn get_comments(
    State(ctx): State<App>,
    Path(project_id): Path<i64>,
    MaybeAuthUser(auth_user): MaybeAuthUser,
) -> Result<Json<CommentListing>, AppError> {
    let identity = auth_user.ok();
    let store = ctx.store_for(identity.as_ref());

    let listing = fetch_comment_threads(
        &store,
        project_id,
        identity.map(|i| i.id),
        ctx.config.orphan_policy,
    )
    .await?;

    Ok(Json(listing))
}
