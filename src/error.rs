use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Goal '{goal}' is infeasible under the structural constraints and earlier goals")]
    Infeasible { goal: String },

    #[error("No feasible selection was found for goal '{goal}' before the time limit")]
    NoSolution { goal: String },

    #[error("Run cancelled after {completed} solved goal(s)")]
    Cancelled { completed: usize },

    #[error("Model error: {0}")]
    Model(String),
}

impl Error {
    pub fn error_code(&self) -> i32 {
        match self {
            Error::Io(_) => -1,
            Error::Json(_) => -2,
            Error::Validation(_) => -3,
            Error::Infeasible { .. } => -4,
            Error::NoSolution { .. } => -5,
            Error::Cancelled { .. } => -6,
            Error::Model(_) => -7,
        }
    }

    /// Shorthand used throughout input validation.
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = vec![
            Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "missing")),
            Error::Validation("bad".to_string()),
            Error::Infeasible { goal: "Minimal Cost".to_string() },
            Error::NoSolution { goal: "Minimal Cost".to_string() },
            Error::Cancelled { completed: 1 },
            Error::Model("dup".to_string()),
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.error_code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|c| *c < 0));
    }

    #[test]
    fn test_infeasible_message_names_goal() {
        let err = Error::Infeasible { goal: "Minimal Indexes".to_string() };
        assert!(err.to_string().contains("Minimal Indexes"));
    }
}
