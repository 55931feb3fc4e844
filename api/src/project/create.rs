use axum::{Json, extract::State, http::StatusCode};

use crate::{
    App,
    enrichment::{Enriched, Relation, resolve_enriched_one},
    error::AppError,
    identity::{AuthUser, Identity},
    models::project::{PROJECTS_TABLE, Project, ProjectSubmission},
    store::{Select, StoreError, TabularStore, insert_one},
};

use super::get::ProjectView;

pub async fn submit_project<S>(
    store: &S,
    identity: &Identity,
    submission: ProjectSubmission,
) -> Result<ProjectView, AppError>
where
    S: TabularStore + ?Sized,
{
    let new_project = submission
        .validate(identity.id)
        .map_err(|e| (e, StatusCode::BAD_REQUEST))?;

    let row = serde_json::to_value(&new_project).map_err(StoreError::decode)?;
    let inserted: Project = insert_one(store, PROJECTS_TABLE, row).await?;
    tracing::info!(project_id = inserted.id, "project created");

    let enriched = match resolve_enriched_one(
        store,
        &Select::from(PROJECTS_TABLE).eq("id", inserted.id),
        &Relation::AUTHOR_PROFILE,
    )
    .await
    {
        Ok(enriched) => enriched,
        Err(e) => {
            tracing::warn!(project_id = inserted.id, error = %e, "could not re-read new project");
            Enriched {
                row: inserted,
                profile: Some(identity.as_profile()),
            }
        }
    };

    Ok(ProjectView::new(enriched, Some(identity.id)))
}

pub async fn create_project(
    State(ctx): State<App>,
    AuthUser(identity): AuthUser,
    crate::json::Json(submission): crate::json::Json<ProjectSubmission>,
) -> Result<(StatusCode, Json<ProjectView>), AppError> {
    let store = ctx.store_for(Some(&identity));
    let created = submit_project(&store, &identity, submission).await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::store::mock::{Call, MockStore};

    fn identity() -> Identity {
        Identity {
            id: Uuid::parse_str("11111111-1111-4111-8111-111111111111").unwrap(),
            email: Some("alice@example.com".into()),
            full_name: None,
            avatar_url: None,
            access_token: "token".into(),
        }
    }

    fn submission(tags: &[&str]) -> ProjectSubmission {
        ProjectSubmission {
            title: "Recipe finder".into(),
            description: "Search recipes by ingredient".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            project_link: None,
            video_link: None,
        }
    }

    #[tokio::test]
    async fn new_project_is_owned_by_submitter() {
        let store = MockStore::new(|call| match call {
            Call::Insert { table, rows } => {
                assert_eq!(table, PROJECTS_TABLE);
                assert_eq!(rows[0]["tags"], json!(["Vue"]));
                let mut row = rows[0].clone();
                row["id"] = json!(42);
                row["created_at"] = json!("2024-05-01T00:00:00Z");
                Ok(vec![row])
            }
            Call::Select(_) => Err(StoreError::from_code(Some("PGRST200".into()), "no relationship")),
            _ => panic!("unexpected call {call:?}"),
        });

        let created = submit_project(&store, &identity(), submission(&["vue"]))
            .await
            .unwrap();

        assert_eq!(created.project.id, 42);
        assert!(created.is_owner);
        assert_eq!(created.author.display_name, "alice@example.com");
    }

    #[tokio::test]
    async fn invalid_submission_is_a_bad_request() {
        let store = MockStore::new(|call| panic!("unexpected call {call:?}"));

        let err = submit_project(&store, &identity(), submission(&["Fortran"]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
