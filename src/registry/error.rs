use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Registry slow or unavailable: {0}")]
    NetworkTimeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited: retry after {retry_after_secs:?} seconds")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RegistryError {
    /// Whether a failed call may succeed when attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RegistryError::NetworkTimeout(_)
                | RegistryError::Network(_)
                | RegistryError::RateLimited { .. }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RegistryError::NetworkTimeout(e.to_string())
        } else if e.is_decode() {
            RegistryError::InvalidResponse(e.to_string())
        } else {
            RegistryError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RegistryError::NotFound("p".into()), false)]
    #[case(RegistryError::NetworkTimeout("slow".into()), true)]
    #[case(RegistryError::Network("reset".into()), true)]
    #[case(RegistryError::RateLimited { retry_after_secs: None }, true)]
    #[case(RegistryError::InvalidInput("missing".into()), false)]
    #[case(RegistryError::InvalidResponse("bad json".into()), false)]
    fn is_retryable_returns_expected(#[case] error: RegistryError, #[case] expected: bool) {
        assert_eq!(error.is_retryable(), expected);
    }
}
