use thiserror::Error;

/// The only failures that halt a page: the sheet could not be obtained or read.
/// Everything downstream of a successful load degrades instead of erroring.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("invalid Google Sheets URL: {0}")]
    InvalidUrl(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} did not return CSV (is the sheet shared as \"anyone with the link\"?)")]
    NotCsv { url: String },

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("sheet has no header row")]
    EmptyHeader,

    #[error("building record table: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("{0}")]
    Source(String),
}

/// Alias for loader results.
pub type LoadResult<T> = Result<T, LoadError>;

/// Failure of a whole page run. Only `Load` is expected in practice; `Internal`
/// covers table plumbing that should not fail on well-formed input.
#[derive(Error, Debug)]
pub enum PageError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
