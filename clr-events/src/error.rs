use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to read or write the type name store. {0}")]
    Persist(#[from] binrw::Error),

    #[error("Invalid layout for event {kind}: {reason}")]
    InvalidSchema { kind: &'static str, reason: String },

    #[error("No subscription with handle {0}")]
    UnknownSubscription(u64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
