use thiserror::Error;

use crate::id::FrondId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FernError {
    #[error("invalid parent: {0} is neither root nor attached")]
    InvalidParent(FrondId),

    #[error("pool exhausted: all {capacity} fronds are attached")]
    PoolExhausted { capacity: usize },

    #[error("id {id} out of range for table of {len} slots")]
    OutOfRange { id: FrondId, len: usize },

    #[error("sentinel {0} does not denote a live frond")]
    Sentinel(FrondId),

    #[error("frond {0} is not attached")]
    Detached(FrondId),

    #[error("capacity {requested} exceeds maximum of {max}")]
    CapacityTooLarge { requested: usize, max: usize },

    #[error("cannot reserve a slot table for capacity {requested}")]
    CapacityUnavailable { requested: usize },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("arena corrupted: {message}")]
    Corrupted { message: String },
}

pub type FernResult<T> = Result<T, FernError>;
