use crate::config::ConfigError;
use crate::customers::follow_ups::RepositoryError;
use crate::telemetry::TelemetryError;
use std::fmt;

/// Startup and serving failures surfaced by the service binary.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Storage(RepositoryError),
}

impl AppError {
    /// Process exit code for the binary; configuration problems are distinguished from runtime ones.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::Telemetry(_) => 2,
            AppError::Io(_) | AppError::Server(_) | AppError::Storage(_) => 1,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Storage(err) => write!(f, "storage error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Storage(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<RepositoryError> for AppError {
    fn from(value: RepositoryError) -> Self {
        Self::Storage(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn wraps_sources_with_context() {
        let err = AppError::from(ConfigError::InvalidPort);
        assert_eq!(err.to_string(), "configuration error: APP_PORT must be a valid u16");
        assert!(err.source().is_some());
        assert_eq!(err.exit_code(), 2);

        let err = AppError::from(RepositoryError::Unavailable("pool closed".to_string()));
        assert_eq!(
            err.to_string(),
            "storage error: repository unavailable: pool closed"
        );
        assert_eq!(err.exit_code(), 1);
    }
}
