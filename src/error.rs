//! Run-level error type.
//!
//! `AppError` aborts the whole invocation (malformed input, bad configuration,
//! I/O failures). Failures scoped to a single series are *not* `AppError`s; see
//! [`crate::fit::FitFailure`] and [`crate::normalize::DegenerateBaseline`].

/// Input, configuration or I/O problem.
pub const EXIT_INPUT: u8 = 2;
/// The input parsed but nothing usable remained.
pub const EXIT_NO_DATA: u8 = 3;
/// A computation could not produce a result.
pub const EXIT_COMPUTE: u8 = 4;

#[derive(Clone, PartialEq, Eq)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Shorthand for [`EXIT_INPUT`] errors.
    pub fn input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, message)
    }

    /// Shorthand for [`EXIT_NO_DATA`] errors.
    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(EXIT_NO_DATA, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
