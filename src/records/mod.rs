//! Student, course and mark records
//!
//! The [`Repository`] turns each record operation into builder-made statements and
//! runs them through a pooled [`Database`](crate::core::Database). Multi-statement
//! work that must be atomic, the cascading student delete, runs in one transaction.

pub mod error;
pub mod models;
pub mod pagination;
pub mod repository;
pub mod schema;

pub use error::{RecordError, RecordResult};
pub use models::{NewCourse, NewMark, NewStudent, StudentDetail, StudentPage};
pub use pagination::{parse_leading_int, PageRequest, DEFAULT_LIMIT, DEFAULT_PAGE};
pub use repository::Repository;
pub use schema::{ensure_sqlite_schema, Tables, DEFAULT_SCHEMA, SQLITE_SCHEMA};
