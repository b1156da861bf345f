pub mod cleanup;
pub mod conversations;
pub mod error;
pub mod identity;
pub mod listing;
pub mod messaging;
pub mod notifications;
pub mod ports;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;
