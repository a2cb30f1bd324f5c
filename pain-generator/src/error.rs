use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenError {
    #[error("CSV Error")]
    CsvError(#[from] csv::Error),
    #[error("I/O Error")]
    IoError(#[from] io::Error),
    #[error("Malformed party record on line {line}")]
    MalformedRecord { line: u64 },
    #[error("At least 2 distinct account ids are required, found {distinct}")]
    InsufficientParties { distinct: usize },
    #[error("Invalid sampler configuration: {0}")]
    InvalidSamplerConfig(String),
    #[error("Amounts must be finite and positive")]
    InvalidAmount,
    #[error("Batch callback failed: {0}")]
    Callback(String),
}
