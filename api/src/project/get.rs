use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    App,
    enrichment::{AuthorView, Enriched, Relation, resolve_enriched, resolve_enriched_one},
    error::AppError,
    identity::{AuthUser, MaybeAuthUser},
    models::{
        like::LikeSummary,
        profile::Profile,
        project::{PROJECTS_TABLE, Project},
    },
    store::{Direction, Select, StoreError, TabularStore},
};

use super::{like::like_summary, search::ProjectQuery};

// The model that will be returned to the client
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProjectView {
    #[serde(flatten)]
    pub project: Project,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    pub author: AuthorView,
    pub is_owner: bool,
}

impl ProjectView {
    pub fn new(enriched: Enriched<Project>, viewer: Option<Uuid>) -> Self {
        let author = enriched.author();
        let is_owner = viewer.is_some() && enriched.row.author_id == viewer;
        ProjectView {
            project: enriched.row,
            profile: enriched.profile,
            author,
            is_owner,
        }
    }
}

impl AsRef<Project> for ProjectView {
    fn as_ref(&self) -> &Project {
        &self.project
    }
}

#[derive(Serialize)]
pub struct ProjectListing {
    pub count: usize,
    pub projects: Vec<ProjectView>,
}

#[derive(Serialize)]
pub struct OwnedProjects {
    pub mine: Vec<ProjectView>,
    pub others: Vec<ProjectView>,
}

#[derive(Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: ProjectView,
    pub likes: LikeSummary,
}

/// All projects, newest first, with their authors attached.
pub async fn list_projects<S>(store: &S, viewer: Option<Uuid>) -> Result<Vec<ProjectView>, StoreError>
where
    S: TabularStore + ?Sized,
{
    let base = Select::from(PROJECTS_TABLE).order("created_at", Direction::Desc);
    let rows: Vec<Enriched<Project>> =
        resolve_enriched(store, &base, &Relation::AUTHOR_PROFILE).await?;

    Ok(rows.into_iter().map(|r| ProjectView::new(r, viewer)).collect())
}

/// Splits into the viewer's own projects and everyone else's, keeping order.
pub fn split_by_owner(projects: Vec<ProjectView>) -> (Vec<ProjectView>, Vec<ProjectView>) {
    projects.into_iter().partition(|p| p.is_owner)
}

pub async fn fetch_project<S>(
    store: &S,
    project_id: i64,
    viewer: Option<Uuid>,
) -> Result<ProjectView, StoreError>
where
    S: TabularStore + ?Sized,
{
    let base = Select::from(PROJECTS_TABLE).eq("id", project_id);
    let row = resolve_enriched_one(store, &base, &Relation::AUTHOR_PROFILE).await?;
    Ok(ProjectView::new(row, viewer))
}

pub async fn project_detail<S>(
    store: &S,
    project_id: i64,
    viewer: Option<Uuid>,
) -> Result<ProjectDetail, StoreError>
where
    S: TabularStore + ?Sized,
{
    let project = fetch_project(store, project_id, viewer).await?;
    let likes = match like_summary(store, project_id, viewer).await {
        Ok(likes) => likes,
        Err(e) => {
            tracing::warn!(project_id, error = %e, "could not load likes");
            LikeSummary::default()
        }
    };

    Ok(ProjectDetail { project, likes })
}

pub async fn get_projects(
    State(ctx): State<App>,
    MaybeAuthUser(auth_user): MaybeAuthUser,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<ProjectListing>, AppError> {
    let identity = auth_user.ok();
    let store = ctx.store_for(identity.as_ref());

    let projects = list_projects(&store, identity.map(|i| i.id)).await?;
    let projects = query.apply(projects);

    Ok(Json(ProjectListing {
        count: projects.len(),
        projects,
    }))
}

pub async fn get_my_projects(
    State(ctx): State<App>,
    AuthUser(identity): AuthUser,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<OwnedProjects>, AppError> {
    let store = ctx.store_for(Some(&identity));

    let projects = list_projects(&store, Some(identity.id)).await?;
    let (mine, others) = split_by_owner(query.apply(projects));

    Ok(Json(OwnedProjects { mine, others }))
}

pub async fn get_project(
    State(ctx): State<App>,
    Path(project_id): Path<i64>,
    MaybeAuthUser(auth_user): MaybeAuthUser,
) -> Result<Json<ProjectDetail>, AppError> {
    let identity = auth_user.ok();
    let store = ctx.store_for(identity.as_ref());

    Ok(Json(
        project_detail(&store, project_id, identity.map(|i| i.id)).await?,
    ))
}
