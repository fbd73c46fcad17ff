use serde::Serialize;

/// Native value family of a column, computed once from the declared database type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Float,
    Bool,
    Date,
    DateTime,
    Text,
}

impl ColumnKind {
    /// Classifies a declared type by case-insensitive substring match.
    ///
    /// Priority order: integer, floating point, boolean, date (without time), date-time, text.
    /// Arrays (`_int4`, `integer[]`) and range types are always text.
    pub fn from_declared_type(declared: &str) -> Self {
        let t = declared.trim().to_ascii_uppercase();
        let has = |needle: &str| t.contains(needle);

        if t.starts_with('_') || t.ends_with("[]") || has("RANGE") {
            ColumnKind::Text
        } else if has("INT") && !has("INTERVAL") && !has("POINT") {
            ColumnKind::Integer
        } else if ["FLOAT", "NUMERIC", "DECIMAL", "REAL", "DOUBLE"]
            .iter()
            .any(|n| has(n))
        {
            ColumnKind::Float
        } else if has("BOOL") {
            ColumnKind::Bool
        } else if has("DATE") && !has("TIME") {
            ColumnKind::Date
        } else if has("TIME") {
            ColumnKind::DateTime
        } else {
            ColumnKind::Text
        }
    }
}

/// Editing widget suggested for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    LongText,
    Text,
}

impl InputKind {
    /// HTML `<input type>` (or `textarea`) for the admin form.
    pub fn html_type(self) -> &'static str {
        match self {
            InputKind::Integer | InputKind::Float => "number",
            InputKind::Boolean => "checkbox",
            InputKind::Date => "date",
            InputKind::DateTime => "datetime-local",
            InputKind::LongText => "textarea",
            InputKind::Text => "text",
        }
    }

    pub fn step(self) -> Option<&'static str> {
        match self {
            InputKind::Float => Some("0.01"),
            _ => None,
        }
    }
}

/// Metadata for one column of a live table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    pub name: String,
    /// Type as reported by the database, e.g. `character varying(50)` or `integer`.
    pub declared_type: String,
    /// Underlying type name (`varchar`, `int4`, ...) used as the cast target for bound values.
    pub udt_name: String,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub default: Option<String>,
    pub kind: ColumnKind,
    pub max_length: Option<u32>,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        udt_name: impl Into<String>,
        nullable: bool,
        is_primary_key: bool,
    ) -> Self {
        let declared_type = declared_type.into();
        let kind = ColumnKind::from_declared_type(&declared_type);
        let max_length = parse_max_length(&declared_type);
        Self {
            name: name.into(),
            declared_type,
            udt_name: udt_name.into(),
            nullable,
            is_primary_key,
            default: None,
            kind,
            max_length,
        }
    }

    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.default = default;
        self
    }

    pub fn input_kind(&self) -> InputKind {
        match self.kind {
            ColumnKind::Integer => InputKind::Integer,
            ColumnKind::Float => InputKind::Float,
            ColumnKind::Bool => InputKind::Boolean,
            ColumnKind::Date => InputKind::Date,
            ColumnKind::DateTime => InputKind::DateTime,
            ColumnKind::Text => {
                let long = self.declared_type.to_ascii_uppercase().contains("TEXT")
                    || self.max_length.is_some_and(|n| n > 100);
                if long {
                    InputKind::LongText
                } else {
                    InputKind::Text
                }
            }
        }
    }
}

/// Extracts `n` from `VARCHAR(n)`, `CHAR(n)`, `character varying(n)`.
fn parse_max_length(declared: &str) -> Option<u32> {
    if !declared.to_ascii_uppercase().contains("CHAR") {
        return None;
    }
    let open = declared.find('(')?;
    let close = declared[open..].find(')')? + open;
    declared[open + 1..close].trim().parse().ok()
}

/// A live table and its columns in catalog order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// First primary-key column (row-addressed operations use a single key column).
    pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.is_primary_key)
    }

    /// Columns that may be written from a payload (everything except the primary key).
    pub fn writable_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| !c.is_primary_key)
    }
}
