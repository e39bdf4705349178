use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ModelError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub(crate) fn require_finite(value: f64, name: &str) -> Result<f64, ModelError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModelError::invalid(format!("{name} must be finite, got {value}")))
    }
}

pub(crate) fn require_non_negative(value: f64, name: &str) -> Result<f64, ModelError> {
    require_finite(value, name)?;
    if value < 0.0 {
        return Err(ModelError::invalid(format!("{name} must be >= 0, got {value}")));
    }
    Ok(value)
}

pub(crate) fn require_positive(value: f64, name: &str) -> Result<f64, ModelError> {
    require_finite(value, name)?;
    if value <= 0.0 {
        return Err(ModelError::invalid(format!("{name} must be > 0, got {value}")));
    }
    Ok(value)
}

pub(crate) fn require_fraction(value: f64, name: &str) -> Result<f64, ModelError> {
    require_finite(value, name)?;
    if !(0.0..=1.0).contains(&value) {
        return Err(ModelError::invalid(format!(
            "{name} must be between 0 and 1, got {value}"
        )));
    }
    Ok(value)
}
