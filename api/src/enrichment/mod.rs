//! Attaching author profiles to rows fetched from the store.
//!
//! The joined fetch is tried first. When the store cannot resolve the
//! relation (or the request fails for any other reason) the base rows are
//! fetched alone and each author profile is looked up individually. A
//! missing profile never fails the whole operation.

use futures_util::future::join_all;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    models::profile::{PROFILE_COLUMNS, PROFILES_TABLE, Profile},
    store::{Embed, Select, StoreError, TabularStore, fetch_all, fetch_one},
};

pub mod display;

pub use display::{AuthorView, resolve_avatar_url, resolve_display_name};

/// A row that references its author by profile id, optionally carrying
/// denormalized author columns.
pub trait Authored {
    fn author_id(&self) -> Option<Uuid>;

    fn creator_name(&self) -> Option<&str> {
        None
    }

    fn user_email(&self) -> Option<&str> {
        None
    }
}

/// How a base table points at its related profile.
#[derive(Clone, Copy, Debug)]
pub struct Relation {
    /// Key the joined profile is returned under.
    pub alias: &'static str,
    /// Column on the base table holding the profile id.
    pub foreign_key: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

impl Relation {
    pub const AUTHOR_PROFILE: Relation = Relation {
        alias: "profiles",
        foreign_key: "user_id",
        table: PROFILES_TABLE,
        columns: PROFILE_COLUMNS,
    };

    fn embed(&self) -> Embed {
        Embed {
            alias: self.alias.to_string(),
            foreign_key: self.foreign_key.to_string(),
            columns: self.columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn lookup(&self, id: Uuid) -> Select {
        Select::from(self.table).eq("id", id).single()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enriched<T> {
    #[serde(flatten)]
    pub row: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

impl<T: Authored> Enriched<T> {
    pub fn author(&self) -> AuthorView {
        AuthorView::resolve(self.profile.as_ref(), &self.row)
    }
}

/// Fetches the rows selected by `base` with their author profiles attached.
///
/// Only a failure of the plain base-row fetch is returned as an error.
pub async fn resolve_enriched<T, S>(
    store: &S,
    base: &Select,
    relation: &Relation,
) -> Result<Vec<Enriched<T>>, StoreError>
where
    T: DeserializeOwned + Authored + Send + Sync,
    S: TabularStore + ?Sized,
{
    match joined_fetch(store, base, relation).await {
        Ok(rows) => return Ok(rows),
        Err(e) => tracing::warn!(
            table = %base.table,
            relation = relation.alias,
            error = %e,
            "joined fetch failed, enriching rows individually"
        ),
    }

    let rows: Vec<T> = fetch_all(store, base).await?;
    Ok(attach_profiles(store, rows, relation).await)
}

/// Single-row variant of [`resolve_enriched`]. `base` is constrained to one
/// row; zero rows is reported as [`crate::store::StoreErrorKind::NotFound`].
pub async fn resolve_enriched_one<T, S>(
    store: &S,
    base: &Select,
    relation: &Relation,
) -> Result<Enriched<T>, StoreError>
where
    T: DeserializeOwned + Authored + Send + Sync,
    S: TabularStore + ?Sized,
{
    let base = base.clone().single();

    match joined_fetch(store, &base, relation).await {
        Ok(rows) => match <[Enriched<T>; 1]>::try_from(rows) {
            Ok([row]) => return Ok(row),
            Err(rows) => tracing::warn!(
                table = %base.table,
                rows = rows.len(),
                "joined single fetch returned an unexpected row count"
            ),
        },
        // Nothing to fall back to when the row itself is missing
        Err(e) if e.is_not_found() => return Err(e),
        Err(e) => tracing::warn!(
            table = %base.table,
            relation = relation.alias,
            error = %e,
            "joined fetch failed, enriching row individually"
        ),
    }

    let row: T = fetch_one(store, &base).await?;
    let profile = lookup_profile(store, &row, relation).await;
    Ok(Enriched { row, profile })
}

async fn joined_fetch<T, S>(
    store: &S,
    base: &Select,
    relation: &Relation,
) -> Result<Vec<Enriched<T>>, StoreError>
where
    T: DeserializeOwned,
    S: TabularStore + ?Sized,
{
    let query = base.clone().embed(relation.embed());
    store
        .select(&query)
        .await?
        .into_iter()
        .map(|row| split_embedded(row, relation.alias))
        .collect()
}

/// Separates the embedded profile under `alias` from the base row.
fn split_embedded<T: DeserializeOwned>(
    mut row: Value,
    alias: &str,
) -> Result<Enriched<T>, StoreError> {
    let profile = match row.as_object_mut().and_then(|o| o.remove(alias)) {
        None | Some(Value::Null) => None,
        Some(embedded) => Some(serde_json::from_value(embedded).map_err(StoreError::decode)?),
    };
    let row = serde_json::from_value(row).map_err(StoreError::decode)?;
    Ok(Enriched { row, profile })
}

/// Looks up every row's profile concurrently. `join_all` yields results in
/// the order of `rows`, so each row gets exactly its own lookup.
async fn attach_profiles<T, S>(store: &S, rows: Vec<T>, relation: &Relation) -> Vec<Enriched<T>>
where
    T: Authored + Send + Sync,
    S: TabularStore + ?Sized,
{
    let profiles = join_all(rows.iter().map(|row| lookup_profile(store, row, relation))).await;

    rows.into_iter()
        .zip(profiles)
        .map(|(row, profile)| Enriched { row, profile })
        .collect()
}

async fn lookup_profile<T, S>(store: &S, row: &T, relation: &Relation) -> Option<Profile>
where
    T: Authored + ?Sized,
    S: TabularStore + ?Sized,
{
    let id = row.author_id()?;
    match fetch_one::<Profile, _>(store, &relation.lookup(id)).await {
        Ok(profile) => Some(profile),
        Err(e) => {
            tracing::debug!(profile_id = %id, error = %e, "profile lookup failed");
            None
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        models::project::{PROJECTS_TABLE, Project},
        store::{
            Filter, StoreErrorKind,
            mock::{Call, MockStore, eq_value},
        },
    };

    const ALICE: &str = "11111111-1111-4111-8111-111111111111";
    const BOB: &str = "22222222-2222-4222-8222-222222222222";
    const CAROL: &str = "33333333-3333-4333-8333-333333333333";

    fn project_row(id: i64, author: Option<&str>) -> Value {
        json!({
            "id": id,
            "title": format!("Project {id}"),
            "description": "desc",
            "tags": ["Rust"],
            "user_id": author,
            "created_at": "2024-05-01T12:00:00Z"
        })
    }

    fn profile_row(id: &str, name: &str) -> Value {
        json!({ "id": id, "email": format!("{name}@example.com"), "full_name": name, "avatar_url": null })
    }

    fn is_joined_select(call: &Call) -> bool {
        matches!(call, Call::Select(q) if q.table == PROJECTS_TABLE && q.embed.is_some())
    }

    fn is_profile_lookup(call: &Call) -> bool {
        matches!(call, Call::Select(q) if q.table == PROFILES_TABLE)
    }

    fn relation_missing() -> StoreError {
        StoreError::from_code(
            Some("PGRST200".into()),
            "Could not find a relationship between 'projects' and 'profiles'",
        )
    }

    #[tokio::test]
    async fn joined_fetch_success_skips_profile_lookups() {
        let store = MockStore::new(|call| match call {
            Call::Select(q) if q.embed.is_some() => {
                let mut with_profile = project_row(1, Some(ALICE));
                with_profile["profiles"] = profile_row(ALICE, "alice");
                let mut without_profile = project_row(2, Some(BOB));
                without_profile["profiles"] = Value::Null;
                Ok(vec![with_profile, without_profile])
            }
            _ => panic!("unexpected call {call:?}"),
        });

        let rows: Vec<Enriched<Project>> =
            resolve_enriched(&store, &Select::from(PROJECTS_TABLE), &Relation::AUTHOR_PROFILE)
                .await
                .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0].profile.as_ref().and_then(|p| p.full_name.as_deref()),
            Some("alice")
        );
        // a null joined profile is returned as-is, not looked up again
        assert_eq!(rows[1].profile, None);
        assert_eq!(store.count(is_joined_select), 1);
        assert_eq!(store.count(is_profile_lookup), 0);
        assert_eq!(store.calls().len(), 1);
    }

    #[tokio::test]
    async fn missing_relation_falls_back_to_per_row_lookups() {
        let store = MockStore::new(|call| match call {
            Call::Select(q) if q.embed.is_some() => Err(relation_missing()),
            Call::Select(q) if q.table == PROJECTS_TABLE => Ok(vec![
                project_row(1, Some(ALICE)),
                project_row(2, Some(BOB)),
                project_row(3, Some(CAROL)),
            ]),
            Call::Select(q) if q.table == PROFILES_TABLE => match eq_value(&q.filters, "id") {
                Some(ALICE) => Ok(vec![profile_row(ALICE, "alice")]),
                Some(CAROL) => Ok(vec![profile_row(CAROL, "carol")]),
                _ => Err(StoreError::new(StoreErrorKind::Transport, "connection reset")),
            },
            _ => panic!("unexpected call {call:?}"),
        });

        let rows: Vec<Enriched<Project>> =
            resolve_enriched(&store, &Select::from(PROJECTS_TABLE), &Relation::AUTHOR_PROFILE)
                .await
                .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().map(|r| r.row.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(rows[0].profile.as_ref().map(|p| p.id.to_string()).as_deref(), Some(ALICE));
        assert_eq!(rows[1].profile, None);
        assert_eq!(rows[2].profile.as_ref().map(|p| p.id.to_string()).as_deref(), Some(CAROL));
        assert_eq!(store.count(is_profile_lookup), 3);
    }

    #[tokio::test]
    async fn rows_without_author_are_not_looked_up() {
        let store = MockStore::new(|call| match call {
            Call::Select(q) if q.embed.is_some() => {
                Err(StoreError::new(StoreErrorKind::Timeout, "timed out"))
            }
            Call::Select(q) if q.table == PROJECTS_TABLE => {
                Ok(vec![project_row(1, None), project_row(2, Some(ALICE))])
            }
            Call::Select(_) => Ok(vec![profile_row(ALICE, "alice")]),
            _ => panic!("unexpected call {call:?}"),
        });

        let rows: Vec<Enriched<Project>> =
            resolve_enriched(&store, &Select::from(PROJECTS_TABLE), &Relation::AUTHOR_PROFILE)
                .await
                .unwrap();

        assert_eq!(rows[0].profile, None);
        assert!(rows[1].profile.is_some());
        assert_eq!(store.count(is_profile_lookup), 1);
    }

    #[tokio::test]
    async fn base_fetch_failure_is_surfaced() {
        let store = MockStore::new(|call| match call {
            Call::Select(q) if q.embed.is_some() => Err(relation_missing()),
            _ => Err(StoreError::from_code(
                Some("42P01".into()),
                "relation \"public.projects\" does not exist",
            )),
        });

        let err = resolve_enriched::<Project, _>(
            &store,
            &Select::from(PROJECTS_TABLE),
            &Relation::AUTHOR_PROFILE,
        )
        .await
        .unwrap_err();

        assert!(err.is_relation_not_found());
        assert_eq!(store.count(is_profile_lookup), 0);
    }

    #[tokio::test]
    async fn single_row_falls_back_and_keeps_row_when_profile_missing() {
        let store = MockStore::new(|call| match call {
            Call::Select(q) if q.embed.is_some() => Err(relation_missing()),
            Call::Select(q) if q.table == PROJECTS_TABLE => {
                assert!(q.single);
                Ok(vec![project_row(9, Some(BOB))])
            }
            Call::Select(_) => Err(StoreError::not_found(PROFILES_TABLE)),
            _ => panic!("unexpected call {call:?}"),
        });

        let row: Enriched<Project> = resolve_enriched_one(
            &store,
            &Select::from(PROJECTS_TABLE).eq("id", 9),
            &Relation::AUTHOR_PROFILE,
        )
        .await
        .unwrap();

        assert_eq!(row.row.id, 9);
        assert_eq!(row.profile, None);
    }

    #[tokio::test]
    async fn single_row_not_found_does_not_fall_back() {
        let store = MockStore::new(|_| Err(StoreError::not_found(PROJECTS_TABLE)));

        let err = resolve_enriched_one::<Project, _>(
            &store,
            &Select::from(PROJECTS_TABLE).eq("id", 404),
            &Relation::AUTHOR_PROFILE,
        )
        .await
        .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(store.calls().len(), 1);
    }

    /// Profile lookups that take longer the earlier their row comes, so they
    /// complete in reverse order. Bob's lookup fails.
    #[derive(Default)]
    struct SlowProfiles {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        finished: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TabularStore for SlowProfiles {
        async fn select(&self, query: &Select) -> Result<Vec<Value>, StoreError> {
            if query.embed.is_some() {
                return Err(relation_missing());
            }
            if query.table == PROJECTS_TABLE {
                return Ok(vec![
                    project_row(1, Some(ALICE)),
                    project_row(2, Some(BOB)),
                    project_row(3, Some(CAROL)),
                ]);
            }

            let id = eq_value(&query.filters, "id").unwrap_or_default().to_string();
            let delay = match id.as_str() {
                ALICE => 60,
                BOB => 30,
                _ => 5,
            };

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.finished.lock().unwrap().push(id.clone());

            match id.as_str() {
                ALICE => Ok(vec![profile_row(ALICE, "alice")]),
                CAROL => Ok(vec![profile_row(CAROL, "carol")]),
                _ => Err(StoreError::new(StoreErrorKind::Transport, "connection reset")),
            }
        }

        async fn insert(&self, _: &str, _: Vec<Value>) -> Result<Vec<Value>, StoreError> {
            panic!("unexpected insert")
        }

        async fn update(&self, _: &str, _: &[Filter], _: Value) -> Result<Vec<Value>, StoreError> {
            panic!("unexpected update")
        }

        async fn delete(&self, _: &str, _: &[Filter]) -> Result<(), StoreError> {
            panic!("unexpected delete")
        }
    }

    #[tokio::test]
    async fn out_of_order_lookups_attach_to_their_own_rows() {
        let store = SlowProfiles::default();

        let rows: Vec<Enriched<Project>> =
            resolve_enriched(&store, &Select::from(PROJECTS_TABLE), &Relation::AUTHOR_PROFILE)
                .await
                .unwrap();

        assert_eq!(*store.finished.lock().unwrap(), vec![CAROL, BOB, ALICE]);
        assert_eq!(store.peak.load(Ordering::SeqCst), 3, "lookups should overlap");

        assert_eq!(rows.iter().map(|r| r.row.id).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(rows[0].profile.as_ref().map(|p| p.id.to_string()).as_deref(), Some(ALICE));
        assert_eq!(rows[1].profile, None);
        assert_eq!(rows[2].profile.as_ref().map(|p| p.id.to_string()).as_deref(), Some(CAROL));
    }
}
