use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {details}")]
    ClientBuild { details: String },

    #[error("Network error fetching version list ({stage}): {details}")]
    Network { stage: NetworkStage, details: String },

    #[error("Version list request failed with HTTP {status}{body_snippet}")]
    HttpStatus { status: u16, body_snippet: String },

    #[error("Timed out fetching version list after {seconds}s")]
    Timeout { seconds: u64 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStage {
    #[error("request")]
    Request,
    #[error("response parse")]
    ResponseParse,
}

impl FetchError {
    pub fn request(details: impl Into<String>) -> Self {
        Self::Network {
            stage: NetworkStage::Request,
            details: details.into(),
        }
    }

    pub fn request_from<E>(error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::request(error.to_string())
    }

    pub fn parse(details: impl Into<String>) -> Self {
        Self::Network {
            stage: NetworkStage::ResponseParse,
            details: details.into(),
        }
    }

    pub fn parse_from<E>(error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::parse(error.to_string())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("No framework version found in the candidate archives")]
    NotFound,
}
