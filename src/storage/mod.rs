mod surrealdb;
mod traits;

pub use self::surrealdb::{StoreStats, SurrealStorage, UpsertOutcome};
pub use traits::GraphStore;
