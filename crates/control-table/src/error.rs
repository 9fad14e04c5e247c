use thiserror::Error;

pub type Result<T, E = CatalogError> = core::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown device model: {0}")]
    UnknownModel(String),
    #[error("invalid register width {width} for field `{field}` (expected 1, 2 or 4)")]
    InvalidWidth { field: String, width: u8 },
    #[error("field `{field}` declared twice for model {model}")]
    DuplicateField { model: String, field: String },
}
