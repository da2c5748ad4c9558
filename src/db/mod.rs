//! Persistence: schema, row models, bounded connection pool, repository ops.

pub mod models;
pub mod pool;
pub mod repository;
pub mod schema;

pub use models::{Group, Inspection, InspectionDetail, InspectionResult, Presentation, Verdict};
pub use pool::ConnectionPool;
