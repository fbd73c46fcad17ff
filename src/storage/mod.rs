pub mod query;

pub use query::{QueryError, Statement, StatementKind};
