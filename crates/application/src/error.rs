use domain::DomainError;
use thiserror::Error;

use crate::rate_limiter::RateLimitError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("rate limit error: {0}")]
    RateLimited(#[from] RateLimitError),
}
