pub mod envelope;
pub mod field;
pub mod message;
pub mod record;
pub mod webhook;

use serde::{Deserialize, Deserializer};

/// The platform sends `null` for empty values (`"items": null` on an empty
/// page, `"fields": null` on a blank row). Read those as the default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
