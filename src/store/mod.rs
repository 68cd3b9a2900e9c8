pub mod duckdb;
pub mod traits;

pub use self::duckdb::DuckDbStore;
pub use traits::{DocumentStore, PoemStream, StoreError};
