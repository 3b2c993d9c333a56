use thiserror::Error;

/// Errors produced while embedding into or extracting from a carrier.
#[derive(Error, Debug)]
pub enum StegoError {
    #[error("failed to read carrier: {0}")]
    CarrierRead(String),
    #[error("failed to write carrier: {0}")]
    CarrierWrite(String),
    #[error("insufficient capacity: payload needs {required} bits, carrier holds {available}")]
    InsufficientCapacity { required: usize, available: usize },
    #[error("terminator not found: no payload, or bit width/strategy differ from encoding")]
    TerminatorNotFound,
    #[error("unsupported carrier type: {0}")]
    UnsupportedCarrierType(String),
    #[error("invalid embedding parameters: {0}")]
    InvalidParameters(String),
    #[error("payload would be cut short at byte {offset}: it contains the terminator sequence")]
    TerminatorCollision { offset: usize },
    #[error("operation cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StegoError>;
