//! Build pipeline and device bus errors.

use thiserror::Error;

/// Failure of a build pipeline call.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The compiler reported a failure without producing a status.
    #[error("{0}")]
    Compile(String),
    /// The compiler process could not be started.
    #[error("failed to spawn compiler `{program}`")]
    Spawn {
        /// Executable that failed to start.
        program: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// Talking to the compiler process failed.
    #[error("compiler I/O failed")]
    Io(#[from] std::io::Error),
    /// The build request could not be encoded.
    #[error("failed to encode build request")]
    Encode(#[from] serde_json::Error),
    /// The compiler printed something that is not a build status.
    #[error("compiler produced an unreadable build status")]
    InvalidStatus(#[source] serde_json::Error),
    /// The source tree could not be watched.
    #[error("failed to watch `{path}`")]
    Watch {
        /// Directory that could not be watched.
        path: String,
        /// Underlying watcher error.
        #[source]
        source: notify::Error,
    },
}

impl PipelineError {
    /// Short label for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Compile(_) => "compile",
            Self::Spawn { .. } => "spawn",
            Self::Io(_) => "io",
            Self::Encode(_) => "encode",
            Self::InvalidStatus(_) => "invalid_status",
            Self::Watch { .. } => "watch",
        }
    }
}

/// Failure of a device bus call.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No transport with this name is available.
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),
    /// The transport exists but the connection failed.
    #[error("{0}")]
    Connect(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn compile_message_is_verbatim() {
        let err = PipelineError::Compile("compile failed: line 4".into());
        assert_eq!(err.to_string(), "compile failed: line 4");
        assert!(err.source().is_none());
        assert_eq!(err.error_type(), "compile");
    }

    #[test]
    fn spawn_keeps_os_error_as_source() {
        let err = PipelineError::Spawn {
            program: "devs".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "failed to spawn compiler `devs`");
        assert_eq!(err.source().unwrap().to_string(), "no such file");
    }

    #[test]
    fn device_errors_display() {
        assert_eq!(
            DeviceError::UnsupportedTransport("serial".into()).to_string(),
            "unsupported transport: serial"
        );
        assert_eq!(DeviceError::Connect("port busy".into()).to_string(), "port busy");
    }
}
