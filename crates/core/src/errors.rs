use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("invalid price range: min {min} must be non-negative and <= max {max}")]
    InvalidPriceRange { min: f64, max: f64 },
    #[error("spice level {0} is out of range 0..=5")]
    InvalidSpiceLevel(u8),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}
