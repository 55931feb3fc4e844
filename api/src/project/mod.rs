pub mod comment;
pub mod create;
pub mod get;
pub mod like;
pub mod routes;
pub mod search;
