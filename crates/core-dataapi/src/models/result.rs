use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    /// Declared wire type. `None` is a protocol violation and fails decoding.
    pub type_name: Option<String>,
    pub nullable: bool,
}

impl ColumnMetadata {
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: Some(type_name.into()),
            nullable: true,
        }
    }

    #[must_use]
    pub const fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }
}

/// Wire value of a single cell. Exactly one variant per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    IsNull(bool),
    LongValue(i64),
    DoubleValue(f64),
    StringValue(String),
    BooleanValue(bool),
    BlobValue(Vec<u8>),
    /// A value kind this client cannot represent. Never decodes.
    Unknown,
}

impl Field {
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::IsNull(true))
    }

    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::IsNull(_) => "isNull",
            Self::LongValue(_) => "longValue",
            Self::DoubleValue(_) => "doubleValue",
            Self::StringValue(_) => "stringValue",
            Self::BooleanValue(_) => "booleanValue",
            Self::BlobValue(_) => "blobValue",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPage {
    pub columns: Vec<ColumnMetadata>,
    pub records: Vec<Vec<Field>>,
    pub next_token: Option<String>,
    pub total_num_rows: Option<i64>,
}

impl ResultPage {
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.next_token.is_some()
    }
}
