use serde_json::{Map, Value};

use crate::{
    models::profile::{NewProfile, PROFILES_TABLE, Profile},
    store::{Filter, Select, StoreError, TabularStore, fetch_one, insert_one, single_row},
};

use super::Identity;

/// Makes sure `identity` has a profile row, creating it on first sign-in.
///
/// Name and avatar from the identity are copied into an existing profile only
/// where the profile has none, so edits made elsewhere are kept.
pub async fn ensure_profile<S>(store: &S, identity: &Identity) -> Result<Profile, StoreError>
where
    S: TabularStore + ?Sized,
{
    let lookup = Select::from(PROFILES_TABLE).eq("id", identity.id).single();

    let existing = match fetch_one::<Profile, _>(store, &lookup).await {
        Ok(profile) => profile,
        Err(e) if e.is_not_found() => {
            tracing::info!(profile_id = %identity.id, "creating profile");
            let row = NewProfile {
                id: identity.id,
                email: identity.email.as_deref(),
                full_name: identity.full_name.as_deref(),
                avatar_url: identity.avatar_url.as_deref(),
            };
            let row = serde_json::to_value(&row).map_err(StoreError::decode)?;
            return insert_one(store, PROFILES_TABLE, row).await;
        }
        Err(e) => return Err(e),
    };

    let patch = missing_fields(&existing, identity);
    if patch.is_empty() {
        return Ok(existing);
    }

    let rows = store
        .update(
            PROFILES_TABLE,
            &[Filter::eq("id", identity.id)],
            Value::Object(patch),
        )
        .await?;
    serde_json::from_value(single_row(rows, PROFILES_TABLE)?).map_err(StoreError::decode)
}

fn missing_fields(profile: &Profile, identity: &Identity) -> Map<String, Value> {
    let mut patch = Map::new();
    let candidates = [
        ("email", &profile.email, &identity.email),
        ("full_name", &profile.full_name, &identity.full_name),
        ("avatar_url", &profile.avatar_url, &identity.avatar_url),
    ];
    for (column, current, known) in candidates {
        if let (None, Some(value)) = (current, known) {
            patch.insert(column.to_string(), Value::String(value.clone()));
        }
    }
    patch
}
