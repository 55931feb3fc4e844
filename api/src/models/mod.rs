pub mod comment;
pub mod like;
pub mod profile;
pub mod project;

use serde::{Deserialize, Deserializer};

/// Treats an explicit `null` column the same as a missing one.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
