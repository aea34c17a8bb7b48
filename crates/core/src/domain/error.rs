// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Rep name must not be empty")]
    EmptyName,

    #[error("Roster must contain at least one named rep")]
    EmptyRoster,
}

pub type Result<T> = std::result::Result<T, DomainError>;
