use axum::{
    Router,
    routing::{get, post},
};

use crate::App;

use super::{
    comment::{create::create_comment, get::get_comments},
    create::create_project,
    get::{get_my_projects, get_project, get_projects},
    like::like_project,
};

pub fn route() -> Router<App> {
    // TODO rate limit the write endpoints
    Router::<App>::new()
        .route("/", get(get_projects).post(create_project))
        .route("/mine", get(get_my_projects))
        .route("/{id}", get(get_project))
        .route("/{id}/comments", get(get_comments).post(create_comment))
        .route("/{id}/like", post(like_project))
}
