pub mod create;
pub mod get;
pub mod thread;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    enrichment::{AuthorView, Enriched},
    models::{comment::Comment, profile::Profile},
};

use thread::Threadable;

// The model that will be returned to the client
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    pub author: AuthorView,
    pub is_comment_owner: bool,
}

impl CommentView {
    pub fn new(enriched: Enriched<Comment>, viewer: Option<Uuid>) -> Self {
        let author = enriched.author();
        CommentView {
            is_comment_owner: is_comment_owner(&enriched.row, viewer),
            comment: enriched.row,
            profile: enriched.profile,
            author,
        }
    }
}

impl Threadable for CommentView {
    fn thread_id(&self) -> i64 {
        self.comment.id
    }

    fn parent_thread_id(&self) -> Option<i64> {
        self.comment.parent_comment_id
    }
}

fn is_comment_owner(comment: &Comment, viewer: Option<Uuid>) -> bool {
    match (comment.author_id, viewer) {
        (Some(author), Some(viewer)) => author == viewer,
        _ => false,
    }
}
