//! Error taxonomy for the generic data-access layer.

use crate::domain::coerce::CoercionError;
use crate::domain::schema::SchemaError;
use crate::storage::query::QueryError;

/// Errors produced by the CRUD engine.
///
/// Every variant is recovered at the operation boundary; the transport layer maps it to a JSON
/// error body and a status code via [`CrudError::status_code`].
#[derive(Debug, thiserror::Error)]
pub enum CrudError {
    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("No primary key found for table {0}")]
    MissingPrimaryKey(String),

    #[error("No object found with ID {id} in table {table}")]
    RowNotFound { table: String, id: String },

    #[error("Type conversion failed for column '{column}': {message}")]
    Conversion { column: String, message: String },

    #[error("No data provided")]
    EmptyPayload,

    #[error("{0}")]
    MissingField(&'static str),

    #[error("Unknown column '{column}' for table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(#[source] sqlx::Error),

    #[error("SQL execution failed: {0}")]
    Sql(#[from] sqlx::Error),
}

impl CrudError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TableNotFound(_) => "table_not_found",
            Self::MissingPrimaryKey(_) => "missing_primary_key",
            Self::RowNotFound { .. } => "row_not_found",
            Self::Conversion { .. } => "conversion_error",
            Self::EmptyPayload => "empty_payload",
            Self::MissingField(_) => "missing_field",
            Self::UnknownColumn { .. } => "unknown_column",
            Self::SchemaUnavailable(_) => "schema_unavailable",
            Self::Sql(_) => "sql_execution_error",
        }
    }

    /// HTTP status for this error (4xx for caller mistakes, 5xx for everything that failed
    /// after the request was accepted).
    pub fn status_code(&self) -> u16 {
        match self {
            Self::TableNotFound(_) | Self::RowNotFound { .. } => 404,
            Self::EmptyPayload | Self::MissingField(_) | Self::UnknownColumn { .. } => 400,
            Self::MissingPrimaryKey(_)
            | Self::Conversion { .. }
            | Self::SchemaUnavailable(_)
            | Self::Sql(_) => 500,
        }
    }

    /// Table the error refers to, when known.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::TableNotFound(t) | Self::MissingPrimaryKey(t) => Some(t.as_str()),
            Self::RowNotFound { table, .. } | Self::UnknownColumn { table, .. } => {
                Some(table.as_str())
            }
            _ => None,
        }
    }

    /// Offending column, when the error is tied to one.
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::Conversion { column, .. } | Self::UnknownColumn { column, .. } => {
                Some(column.as_str())
            }
            _ => None,
        }
    }
}

impl From<SchemaError> for CrudError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::TableNotFound(t) => Self::TableNotFound(t),
            SchemaError::Unavailable(e) => Self::SchemaUnavailable(e),
        }
    }
}

impl From<CoercionError> for CrudError {
    fn from(err: CoercionError) -> Self {
        Self::Conversion {
            column: err.column,
            message: err.message,
        }
    }
}

impl From<QueryError> for CrudError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::UnknownColumn { table, column } => Self::UnknownColumn { table, column },
            QueryError::MissingPrimaryKey(t) => Self::MissingPrimaryKey(t),
        }
    }
}

pub type CrudResult<T> = std::result::Result<T, CrudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_4xx() {
        assert_eq!(CrudError::TableNotFound("Ghosts".into()).status_code(), 404);
        assert_eq!(CrudError::EmptyPayload.status_code(), 400);
        assert_eq!(CrudError::MissingField("No ID provided").status_code(), 400);
        let missing = CrudError::RowNotFound {
            table: "Passions".into(),
            id: "7".into(),
        };
        assert_eq!(missing.status_code(), 404);
        assert_eq!(missing.table(), Some("Passions"));
        assert_eq!(
            missing.to_string(),
            "No object found with ID 7 in table Passions"
        );
    }

    #[test]
    fn server_errors_are_5xx() {
        assert_eq!(CrudError::MissingPrimaryKey("logs".into()).status_code(), 500);
        let conv = CrudError::Conversion {
            column: "created".into(),
            message: "unrecognised datetime".into(),
        };
        assert_eq!(conv.status_code(), 500);
        assert_eq!(conv.column(), Some("created"));
        assert_eq!(CrudError::Sql(sqlx::Error::RowNotFound).status_code(), 500);
    }

    #[test]
    fn schema_errors_translate() {
        let e: CrudError = SchemaError::TableNotFound("Nope".into()).into();
        assert!(matches!(e, CrudError::TableNotFound(ref t) if t == "Nope"));
        assert_eq!(e.to_string(), "Table Nope not found");
    }
}
