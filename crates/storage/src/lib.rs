pub mod dashboard;
pub mod db;
pub mod entries;
pub mod obligations;
pub mod rules;
pub mod statements;

pub use db::{create_memory_pool, create_pool, DbPool};
pub use entries::{EntryFilter, MatchUpdate, NewEntry};
pub use obligations::NewObligation;

/// Parse a stored enum string back into its domain type, surfacing bad rows
/// as decode errors rather than panics.
pub(crate) fn decode<T>(raw: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))
}
