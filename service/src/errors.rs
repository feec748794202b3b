use auscult_analysis::errors::AnalysisError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("empty")]
    Empty,
    #[error("non-finite samples in input")]
    NonFinite,
    #[error("unsupported wav dtype")]
    UnsupportedWavDtype,
    #[error("unsupported format or decode failed: {0}")]
    WavDecode(String),
    #[error("media fetch failed: {0}")]
    Media(String),
    #[error("cache unavailable: {0}")]
    Cache(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<AnalysisError> for ServiceError {
    #[inline]
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::Empty => Self::Empty,
            AnalysisError::NonFinite => Self::NonFinite,
        }
    }
}

impl ServiceError {
    /// The stable wire string for the error body.
    #[must_use]
    pub fn kind(&self) -> String {
        match self {
            Self::Empty => "empty".into(),
            Self::UnsupportedWavDtype => "unsupported wav dtype".into(),
            Self::Media(_) => "media_error".into(),
            other => format!("error: {other}"),
        }
    }

    /// HTTP status class the boundary should answer with.
    #[must_use]
    pub fn status(&self) -> u16 {
        match self {
            Self::Empty
            | Self::NonFinite
            | Self::UnsupportedWavDtype
            | Self::WavDecode(_)
            | Self::Media(_) => 400,
            Self::Cache(_) => 500,
        }
    }

    /// JSON error body.
    #[must_use]
    pub fn body(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.kind() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_kinds() {
        assert_eq!(ServiceError::Empty.kind(), "empty");
        assert_eq!(ServiceError::Empty.status(), 400);
        assert_eq!(
            ServiceError::UnsupportedWavDtype.kind(),
            "unsupported wav dtype"
        );
        assert_eq!(ServiceError::Media("down".into()).kind(), "media_error");
        assert!(
            ServiceError::Cache("down".into())
                .kind()
                .starts_with("error: ")
        );
    }

    #[test]
    fn test_body_shape() {
        let body = ServiceError::Empty.body();
        assert_eq!(body, serde_json::json!({ "error": "empty" }));
    }

    #[test]
    fn test_analysis_error_mapping() {
        assert!(matches!(
            ServiceError::from(AnalysisError::Empty),
            ServiceError::Empty
        ));
        assert!(matches!(
            ServiceError::from(AnalysisError::NonFinite),
            ServiceError::NonFinite
        ));
    }
}
