use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutletError {
    #[error("Outlet not found. key: {key}")]
    NotFound { key: String },

    #[error("Outlet value type mismatch. key: {key}, expected: {expected}, found: {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}
