use thiserror::Error;

/// Errors returned when a generator is configured with invalid settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("code length must be between {min} and {max}, got {length}")]
    InvalidLength {
        length: usize,
        min: usize,
        max: usize,
    },
    #[error("alphabet must not be empty")]
    EmptyAlphabet,
    #[error("alphabet character {0:?} is not allowed in short codes")]
    InvalidCharacter(char),
    #[error("alphabet contains {0:?} more than once")]
    DuplicateCharacter(char),
}
