//! Guarded numeric operations used by the demo endpoint.

/// Returned when a square root is requested for a negative input.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("math: square root of negative number {input}")]
pub struct NegativeInputError {
    pub input: f64,
}

/// Square root that rejects negative inputs instead of returning NaN.
pub fn sqrt(x: f64) -> Result<f64, NegativeInputError> {
    if x < 0.0 {
        return Err(NegativeInputError { input: x });
    }
    Ok(x.sqrt())
}
