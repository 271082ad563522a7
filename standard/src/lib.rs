pub mod errors;

pub use errors::{IngestionError, Result};
