use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    App,
    enrichment::{Enriched, Relation, resolve_enriched_one},
    error::AppError,
    identity::{AuthUser, Identity},
    models::{
        comment::{COMMENTS_TABLE, Comment, CommentSubmission, NewComment},
        project::{PROJECTS_TABLE, Project},
    },
    store::{Select, StoreError, TabularStore, fetch_one, insert_one},
};

use super::CommentView;

const FOREIGN_PARENT: &str = "You're replying to a comment that does not belong to this project";

pub async fn submit_comment<S>(
    store: &S,
    project_id: i64,
    identity: &Identity,
    mut comment: CommentSubmission,
) -> Result<CommentView, AppError>
where
    S: TabularStore + ?Sized,
{
    comment
        .validate()
        .map_err(|e| (e, StatusCode::BAD_REQUEST))?;

    fetch_one::<Project, _>(store, &Select::from(PROJECTS_TABLE).eq("id", project_id)).await?;

    // check if the parent comment actually belongs to the project
    if let Some(parent_id) = comment.parent_comment_id {
        let parent = fetch_one::<Comment, _>(store, &Select::from(COMMENTS_TABLE).eq("id", parent_id))
            .await
            .map_err(|e| -> AppError {
                if e.is_not_found() {
                    (FOREIGN_PARENT, StatusCode::BAD_REQUEST).into()
                } else {
                    e.into()
                }
            })?;

        if parent.project_id != project_id {
            return Err((FOREIGN_PARENT, StatusCode::BAD_REQUEST).into());
        }
    }

    let row = serde_json::to_value(NewComment {
        content: comment.content,
        user_id: identity.id,
        project_id,
        parent_comment_id: comment.parent_comment_id,
    })
    .map_err(StoreError::decode)?;
    let inserted: Comment = insert_one(store, COMMENTS_TABLE, row).await?;
    tracing::info!(comment_id = inserted.id, project_id, "comment created");

    let enriched = match resolve_enriched_one(
        store,
        &Select::from(COMMENTS_TABLE).eq("id", inserted.id),
        &Relation::AUTHOR_PROFILE,
    )
    .await
    {
        Ok(enriched) => enriched,
        Err(e) => {
            // The comment is stored, so answer with what we know.
            tracing::warn!(comment_id = inserted.id, error = %e, "could not re-read new comment");
            Enriched {
                row: inserted,
                profile: Some(identity.as_profile()),
            }
        }
    };

    Ok(CommentView::new(enriched, Some(identity.id)))
}

pub async fn create_comment(
    State(ctx): State<App>,
    Path(project_id): Path<i64>,
    AuthUser(identity): AuthUser,
    crate::json::Json(comment): crate::json::Json<CommentSubmission>,
) -> Result<(StatusCode, Json<CommentView>), AppError> {
    let store = ctx.store_for(Some(&identity));
    let created = submit_comment(&store, project_id, &identity, comment).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[cfg(test)]
mod test {
    use serde_json::{Value, json};
    use uuid::Uuid;

    use super::*;
    use crate::store::mock::{Call, MockStore, eq_value};

    const ALICE: &str = "11111111-1111-4111-8111-111111111111";

    fn identity() -> Identity {
        Identity {
            id: Uuid::parse_str(ALICE).unwrap(),
            email: Some("alice@example.com".into()),
            full_name: Some("Alice".into()),
            avatar_url: None,
            access_token: "token".into(),
        }
    }

    fn submission(content: &str, parent: Option<i64>) -> CommentSubmission {
        CommentSubmission {
            content: content.into(),
            parent_comment_id: parent,
        }
    }

    fn comment_row(id: i64, project_id: i64, parent: Option<i64>) -> Value {
        json!({
            "id": id,
            "project_id": project_id,
            "parent_comment_id": parent,
            "content": "hello",
            "user_id": ALICE,
            "created_at": "2024-05-01T12:00:00Z"
        })
    }

    fn project_row(id: i64) -> Value {
        json!({ "id": id, "title": "Todo app", "created_at": "2024-05-01T00:00:00Z" })
    }

    fn is_insert(call: &Call) -> bool {
        matches!(call, Call::Insert { .. })
    }

    #[tokio::test]
    async fn reply_to_other_project_is_rejected() {
        let store = MockStore::new(|call| match call {
            Call::Select(q) if q.table == PROJECTS_TABLE => Ok(vec![project_row(1)]),
            Call::Select(q) if q.table == COMMENTS_TABLE => Ok(vec![comment_row(10, 2, None)]),
            _ => panic!("unexpected call {call:?}"),
        });

        let err = submit_comment(&store, 1, &identity(), submission("hi", Some(10)))
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(store.count(is_insert), 0);
    }

    #[tokio::test]
    async fn reply_to_missing_parent_is_rejected() {
        let store = MockStore::new(|call| match call {
            Call::Select(q) if q.table == PROJECTS_TABLE => Ok(vec![project_row(1)]),
            Call::Select(_) => Err(StoreError::not_found(COMMENTS_TABLE)),
            _ => panic!("unexpected call {call:?}"),
        });

        let err = submit_comment(&store, 1, &identity(), submission("hi", Some(10)))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blank_comment_is_rejected_before_any_store_call() {
        let store = MockStore::new(|call| panic!("unexpected call {call:?}"));

        let err = submit_comment(&store, 1, &identity(), submission("   ", None))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn created_reply_is_returned_enriched() {
        let store = MockStore::new(|call| match call {
            Call::Select(q) if q.table == PROJECTS_TABLE => Ok(vec![project_row(1)]),
            Call::Select(q) if q.embed.is_some() => {
                assert_eq!(eq_value(&q.filters, "id"), Some("11"));
                let mut row = comment_row(11, 1, Some(10));
                row["profiles"] = json!({ "id": ALICE, "full_name": "Alice A." });
                Ok(vec![row])
            }
            Call::Select(q) if q.table == COMMENTS_TABLE => Ok(vec![comment_row(10, 1, None)]),
            Call::Insert { rows, .. } => {
                assert_eq!(rows[0]["content"], "nice one");
                assert_eq!(rows[0]["user_id"], ALICE);
                Ok(vec![comment_row(11, 1, Some(10))])
            }
            _ => panic!("unexpected call {call:?}"),
        });

        let created = submit_comment(&store, 1, &identity(), submission("  nice one ", Some(10)))
            .await
            .unwrap();

        assert_eq!(created.comment.id, 11);
        assert_eq!(created.author.display_name, "Alice A.");
        assert!(created.is_comment_owner);
    }

    #[tokio::test]
    async fn failed_re_read_still_returns_comment() {
        let store = MockStore::new(|call| match call {
            Call::Select(q) if q.table == PROJECTS_TABLE => Ok(vec![project_row(1)]),
            Call::Select(_) => Err(StoreError::new(
                crate::store::StoreErrorKind::Timeout,
                "timed out",
            )),
            Call::Insert { .. } => Ok(vec![comment_row(12, 1, None)]),
            _ => panic!("unexpected call {call:?}"),
        });

        let created = submit_comment(&store, 1, &identity(), submission("hello", None))
            .await
            .unwrap();
        assert_eq!(created.comment.id, 12);
        assert_eq!(created.author.display_name, "Alice");
    }
}
