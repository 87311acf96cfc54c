//! External face detector invocation.
//!
//! One short-lived process per image, no pooling. The image path is the
//! detector's only argument and it must print exactly one line
//! `{width, height, faces: [{x, y, w, h}], count}` and exit with status 0.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::process::Command;
use tracing::debug;

use crate::config::FaceDetectorConfig;
use crate::error::DetectorError;
use crate::events::FaceMetadata;

pub trait FaceDetector: Send + Sync {
    fn detect<'a>(&'a self, image: &'a Path) -> BoxFuture<'a, Result<FaceMetadata, DetectorError>>;
}

#[derive(Debug, Clone)]
pub struct ProcessFaceDetector {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ProcessFaceDetector {
    pub fn new(config: &FaceDetectorConfig) -> Self {
        let mut parts = config.command.iter().cloned();
        let program = parts.next().unwrap_or_default();
        Self {
            program,
            args: parts.collect(),
            timeout: config.timeout,
        }
    }

    async fn run(&self, image: &Path) -> Result<FaceMetadata, DetectorError> {
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(image)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| DetectorError::Launch {
                program: self.program.clone(),
                source,
            })?;

        let output = match self.timeout {
            // Dropping the pending future kills the child.
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| DetectorError::TimedOut(limit))?,
            None => child.wait_with_output().await,
        }
        .map_err(|source| DetectorError::Launch {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(DetectorError::ExitStatus {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(image = %image.display(), output = %stdout.trim(), "face detector finished");
        parse_detector_output(&stdout)
    }
}

impl FaceDetector for ProcessFaceDetector {
    fn detect<'a>(&'a self, image: &'a Path) -> BoxFuture<'a, Result<FaceMetadata, DetectorError>> {
        Box::pin(self.run(image))
    }
}

/// Parse the detector's stdout, which must hold exactly one non-blank line.
pub fn parse_detector_output(stdout: &str) -> Result<FaceMetadata, DetectorError> {
    let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
    let line = lines
        .next()
        .ok_or_else(|| DetectorError::Unparsable("no output".to_string()))?;
    if lines.next().is_some() {
        return Err(DetectorError::Unparsable(
            "expected exactly one line of output".to_string(),
        ));
    }
    serde_json::from_str(line).map_err(|err| DetectorError::Unparsable(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_line_record() {
        let meta = parse_detector_output(
            "{ \"count\" : 1,\"width\" : 640,\"height\" : 480, \"faces\" : [{\"x\" : 10, \"y\" :20, \"w\" : 30, \"h\" : 40} ] }\n",
        )
        .unwrap();
        assert_eq!(meta.count, 1);
        assert_eq!((meta.width, meta.height), (640, 480));
        assert_eq!(meta.faces[0].w, 30);
    }

    #[test]
    fn rejects_extra_lines_and_garbage() {
        let line = r#"{"count":0,"width":1,"height":1,"faces":[]}"#;
        assert!(parse_detector_output(&format!("{line}\n{line}\n")).is_err());
        assert!(parse_detector_output("").is_err());
        assert!(parse_detector_output("Face Count : 2").is_err());
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let detector = ProcessFaceDetector::new(&FaceDetectorConfig {
            command: vec!["/nonexistent/face-detector".to_string()],
            timeout: None,
        });
        let err = detector.detect(Path::new("/tmp/x.jpg")).await.unwrap_err();
        assert!(matches!(err, DetectorError::Launch { .. }));
    }
}
