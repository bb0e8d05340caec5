use thiserror::Error;

/// Failures that can end an analysis request.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Failed to transcode audio: {0}")]
    Transcode(String),

    #[error("Frame {index} out of range for {feature} ({len} frames)")]
    FrameIndexOutOfRange {
        feature: &'static str,
        index: usize,
        len: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    /// Stable machine-readable name, used in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Decode(_) => "decode",
            AnalysisError::Transcode(_) => "transcode",
            AnalysisError::FrameIndexOutOfRange { .. } => "frame_index_out_of_range",
            AnalysisError::InvalidInput(_) => "invalid_input",
            AnalysisError::Io(_) => "io",
        }
    }

    /// Every processing failure is reported as a client error.
    pub fn status(&self) -> u16 {
        400
    }
}

impl From<symphonia::core::errors::Error> for AnalysisError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        AnalysisError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(AnalysisError::Decode("x".into()).kind(), "decode");
        assert_eq!(AnalysisError::Transcode("x".into()).kind(), "transcode");
        let err = AnalysisError::FrameIndexOutOfRange {
            feature: "mfcc",
            index: 12,
            len: 10,
        };
        assert_eq!(err.kind(), "frame_index_out_of_range");
        assert_eq!(err.to_string(), "Frame 12 out of range for mfcc (10 frames)");
    }

    #[test]
    fn all_failures_are_client_errors() {
        assert_eq!(AnalysisError::InvalidInput("k".into()).status(), 400);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(AnalysisError::from(io).status(), 400);
    }
}
