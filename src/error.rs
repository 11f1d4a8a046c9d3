use thiserror::Error;

#[derive(Error, Debug)]
pub enum FblrError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Malformed report: {0}")]
    MalformedReport(String),

    #[error("Merge failed: {0}")]
    Merge(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FblrError>;
