use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("empty")]
    Empty,
    #[error("non-finite samples in input")]
    NonFinite,
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
