//! Media capture collaborators.
//!
//! Screenshot, photo and audio capture are platform concerns. The agent only
//! needs to know whether a capture happened.

/// Which capture a command asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Screenshot,
    Photo,
    Audio,
}

impl CaptureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Screenshot => "screenshot",
            Self::Photo => "photo",
            Self::Audio => "audio",
        }
    }
}

impl std::fmt::Display for CaptureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a capture attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Completed,
    NotImplemented,
    Failed(String),
}

/// Platform capture backend.
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn capture_screenshot(&self) -> CaptureOutcome;

    async fn capture_photo(&self) -> CaptureOutcome;

    async fn record_audio(&self) -> CaptureOutcome;

    /// Dispatches to the matching capture method.
    async fn capture(&self, kind: CaptureKind) -> CaptureOutcome {
        match kind {
            CaptureKind::Screenshot => self.capture_screenshot().await,
            CaptureKind::Photo => self.capture_photo().await,
            CaptureKind::Audio => self.record_audio().await,
        }
    }
}

/// Capture backend for hosts without capture support.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedCapture;

#[async_trait::async_trait]
impl CaptureDevice for UnsupportedCapture {
    async fn capture_screenshot(&self) -> CaptureOutcome {
        CaptureOutcome::NotImplemented
    }

    async fn capture_photo(&self) -> CaptureOutcome {
        CaptureOutcome::NotImplemented
    }

    async fn record_audio(&self) -> CaptureOutcome {
        CaptureOutcome::NotImplemented
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unsupported_capture_reports_not_implemented() {
        let capture = UnsupportedCapture;
        for kind in [CaptureKind::Screenshot, CaptureKind::Photo, CaptureKind::Audio] {
            assert_eq!(capture.capture(kind).await, CaptureOutcome::NotImplemented);
        }
    }

    #[test]
    fn test_capture_kind_display() {
        assert_eq!(CaptureKind::Screenshot.to_string(), "screenshot");
        assert_eq!(CaptureKind::Photo.to_string(), "photo");
        assert_eq!(CaptureKind::Audio.to_string(), "audio");
    }
}
