use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: String, to: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CoreError::InvalidPhaseTransition {
            from: "idle".to_string(),
            to: "done".to_string(),
        };
        assert!(error.to_string().contains("idle"));
        assert!(error.to_string().contains("done"));
    }
}
