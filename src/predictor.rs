//! Prediction subprocess
//!
//! Runs the external pass/fail model as a child process:
//!
//! ```text
//! <interpreter> --version                      (probe)
//! <interpreter> <script> 85 4 75 80            (positional)
//! <interpreter> <script> '{"attendance":85,…}' (json)
//! ```
//!
//! The script prints its label on stdout. Anything it writes to stderr is
//! treated as diagnostics and logged.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::RwLock;

/// Upper bound for the `--version` probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// TYPES
// ============================================================================

/// The four inputs the model is trained on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSet {
    pub attendance: f64,
    pub study_hours: f64,
    pub previous_marks: f64,
    pub assignment_score: f64,
}

/// How feature values are handed to the script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArgumentMode {
    /// Four argv entries, in model column order
    #[default]
    Positional,
    /// One argv entry holding a JSON object
    Json,
}

impl FromStr for ArgumentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positional" => Ok(Self::Positional),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown argument mode '{}'", other)),
        }
    }
}

/// Model output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionLabel {
    Pass,
    Fail,
}

impl PredictionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Fail => "Fail",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown prediction label '{0}'")]
pub struct UnknownLabel(pub String);

impl FromStr for PredictionLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("pass") {
            Ok(Self::Pass)
        } else if s.eq_ignore_ascii_case("fail") {
            Ok(Self::Fail)
        } else {
            Err(UnknownLabel(s.to_string()))
        }
    }
}

impl TryFrom<String> for PredictionLabel {
    type Error = UnknownLabel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Subprocess settings
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    pub interpreter: String,
    pub script: PathBuf,
    pub argument_mode: ArgumentMode,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("{interpreter} is not installed or not available in system PATH. Please install it and ensure it's in your PATH. Error: {reason}")]
    InterpreterUnavailable { interpreter: String, reason: String },

    #[error("Failed to execute prediction script: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to read prediction script output: {0}")]
    Io(#[source] std::io::Error),

    #[error("Prediction failed. Script exited with code {}. Error: {stderr}", exit_code_display(.code))]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Prediction failed. No output received from the prediction model.")]
    EmptyOutput,

    #[error("Prediction failed. Unrecognized model output: {0}")]
    UnrecognizedLabel(String),

    #[error("Prediction failed. Script did not finish within {}s", .0.as_secs_f32())]
    TimedOut(Duration),
}

fn exit_code_display(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

// ============================================================================
// PREDICTOR
// ============================================================================

/// Outcome of the most recent interpreter probe
#[derive(Debug, Clone)]
pub struct ProbeStatus {
    pub available: bool,
    pub detail: String,
    pub checked_at: DateTime<Utc>,
}

/// Each call owns its own child process; clones share the last probe result
#[derive(Debug, Clone)]
pub struct Predictor {
    config: PredictorConfig,
    last_probe: Arc<RwLock<Option<ProbeStatus>>>,
}

impl Predictor {
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            last_probe: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    /// Result of the last probe, without spawning anything
    pub async fn last_probe(&self) -> Option<ProbeStatus> {
        self.last_probe.read().await.clone()
    }

    /// Check that the interpreter can be started. Returns its version banner.
    pub async fn probe(&self) -> Result<String, PredictError> {
        let result = self.run_probe().await;

        let status = match &result {
            Ok(version) => ProbeStatus { available: true, detail: version.clone(), checked_at: Utc::now() },
            Err(e) => ProbeStatus { available: false, detail: e.to_string(), checked_at: Utc::now() },
        };
        *self.last_probe.write().await = Some(status);

        result
    }

    async fn run_probe(&self) -> Result<String, PredictError> {
        let unavailable = |reason: String| PredictError::InterpreterUnavailable {
            interpreter: self.config.interpreter.clone(),
            reason,
        };

        let run = Command::new(&self.config.interpreter)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(PROBE_TIMEOUT, run)
            .await
            .map_err(|_| unavailable("version check timed out".to_string()))?
            .map_err(|e| unavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(unavailable(format!(
                "version check exited with code {}",
                exit_code_display(&output.status.code())
            )));
        }

        // Older interpreters print the banner on stderr
        let banner = if output.stdout.is_empty() { &output.stderr } else { &output.stdout };
        Ok(String::from_utf8_lossy(banner).trim().to_string())
    }

    /// Script path followed by the feature arguments
    pub fn build_args(&self, features: &FeatureSet) -> Vec<String> {
        let mut args = vec![self.config.script.to_string_lossy().into_owned()];

        match self.config.argument_mode {
            ArgumentMode::Positional => {
                args.extend([
                    features.attendance.to_string(),
                    features.study_hours.to_string(),
                    features.previous_marks.to_string(),
                    features.assignment_score.to_string(),
                ]);
            }
            ArgumentMode::Json => {
                args.push(serde_json::json!(features).to_string());
            }
        }

        args
    }

    /// Probe, run the script once, and parse its label
    pub async fn predict(&self, features: &FeatureSet) -> Result<PredictionLabel, PredictError> {
        let version = self.probe().await?;
        tracing::debug!(interpreter = %self.config.interpreter, %version, "Interpreter available");

        let args = self.build_args(features);
        let started = Instant::now();

        let child = Command::new(&self.config.interpreter)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(PredictError::Spawn)?;

        // Dropping the future on timeout drops the child, which kills it
        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                tracing::error!(
                    script = %self.config.script.display(),
                    "Prediction script timed out after {:?}", self.config.timeout
                );
                PredictError::TimedOut(self.config.timeout)
            })?
            .map_err(PredictError::Io)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            tracing::warn!("Prediction script stderr: {}", line);
        }

        tracing::info!(
            code = ?output.status.code(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Prediction script finished"
        );

        if !output.status.success() {
            return Err(PredictError::NonZeroExit {
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        parse_label(&stdout)
    }
}

/// Last non-empty stdout line is the label
pub fn parse_label(stdout: &str) -> Result<PredictionLabel, PredictError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .ok_or(PredictError::EmptyOutput)?;

    line.parse()
        .map_err(|_| PredictError::UnrecognizedLabel(line.to_string()))
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_features() -> FeatureSet {
        FeatureSet {
            attendance: 85.0,
            study_hours: 4.5,
            previous_marks: 75.0,
            assignment_score: 80.0,
        }
    }

    fn predictor(interpreter: &str, script: PathBuf, mode: ArgumentMode, timeout: Duration) -> Predictor {
        Predictor::new(PredictorConfig {
            interpreter: interpreter.to_string(),
            script,
            argument_mode: mode,
            timeout,
        })
    }

    #[test]
    fn test_parse_label() {
        assert_eq!(parse_label("Pass\n").unwrap(), PredictionLabel::Pass);
        assert_eq!(parse_label("  fail  ").unwrap(), PredictionLabel::Fail);
        assert_eq!(parse_label("loading model\nPASS\n\n").unwrap(), PredictionLabel::Pass);

        assert!(matches!(parse_label(""), Err(PredictError::EmptyOutput)));
        assert!(matches!(parse_label(" \n\t\n"), Err(PredictError::EmptyOutput)));
        assert!(matches!(parse_label("maybe"), Err(PredictError::UnrecognizedLabel(s)) if s == "maybe"));
    }

    #[test]
    fn test_argument_mode_from_str() {
        assert_eq!("positional".parse::<ArgumentMode>().unwrap(), ArgumentMode::Positional);
        assert_eq!(" JSON ".parse::<ArgumentMode>().unwrap(), ArgumentMode::Json);
        assert!("stdin".parse::<ArgumentMode>().is_err());
        assert!("args".parse::<ArgumentMode>().is_err());
    }

    #[test]
    fn test_build_args_positional() {
        let p = predictor("python", PathBuf::from("predict.py"), ArgumentMode::Positional, Duration::from_secs(1));
        let args = p.build_args(&sample_features());
        assert_eq!(args, vec!["predict.py", "85", "4.5", "75", "80"]);
    }

    #[test]
    fn test_build_args_json() {
        let p = predictor("python", PathBuf::from("predict.py"), ArgumentMode::Json, Duration::from_secs(1));
        let args = p.build_args(&sample_features());
        assert_eq!(args.len(), 2);

        let payload: serde_json::Value = serde_json::from_str(&args[1]).unwrap();
        assert_eq!(payload["attendance"], 85.0);
        assert_eq!(payload["studyHours"], 4.5);
        assert_eq!(payload["previousMarks"], 75.0);
        assert_eq!(payload["assignmentScore"], 80.0);
    }

    #[test]
    fn test_nonzero_exit_message() {
        let err = PredictError::NonZeroExit { code: Some(1), stderr: "model missing".to_string() };
        assert_eq!(
            err.to_string(),
            "Prediction failed. Script exited with code 1. Error: model missing"
        );
    }

    #[tokio::test]
    async fn test_interpreter_check_is_cached() {
        let p = predictor(
            "edupredict-no-such-interpreter",
            PathBuf::from("predict.py"),
            ArgumentMode::Positional,
            Duration::from_secs(1),
        );
        assert!(p.last_probe().await.is_none());

        assert!(p.probe().await.is_err());

        // Clones share the cached result
        let status = p.clone().last_probe().await.unwrap();
        assert!(!status.available);
        assert!(status.detail.starts_with("edupredict-no-such-interpreter is not installed"));
    }

    #[tokio::test]
    async fn test_missing_interpreter() {
        let p = predictor(
            "edupredict-no-such-interpreter",
            PathBuf::from("predict.py"),
            ArgumentMode::Positional,
            Duration::from_secs(1),
        );

        let err = p.predict(&sample_features()).await.unwrap_err();
        assert!(matches!(err, PredictError::InterpreterUnavailable { .. }));
        assert!(err.to_string().starts_with("edupredict-no-such-interpreter is not installed"));
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use std::io::Write;
        use tokio_test::{assert_err, assert_ok};

        fn script(body: &str) -> tempfile::NamedTempFile {
            let mut file = tempfile::Builder::new().suffix(".sh").tempfile().unwrap();
            writeln!(file, "{}", body).unwrap();
            file
        }

        fn bash(file: &tempfile::NamedTempFile, mode: ArgumentMode, timeout: Duration) -> Predictor {
            predictor("bash", file.path().to_path_buf(), mode, timeout)
        }

        #[tokio::test]
        async fn test_version_check_reports_version() {
            let file = script("exit 0");
            let version = assert_ok!(bash(&file, ArgumentMode::Positional, Duration::from_secs(5)).probe().await);
            assert!(version.to_lowercase().contains("bash"));
        }

        #[tokio::test]
        async fn test_positional_success() {
            let file = script(
                r#"[ "$#" -eq 4 ] || { echo "usage: attendance hours marks score" >&2; exit 1; }
echo "model loaded" >&2
echo "Pass""#,
            );
            let p = bash(&file, ArgumentMode::Positional, Duration::from_secs(5));
            let label = assert_ok!(p.predict(&sample_features()).await);
            assert_eq!(label, PredictionLabel::Pass);
        }

        #[tokio::test]
        async fn test_json_success() {
            let file = script(
                r#"[ "$#" -eq 1 ] || exit 3
case "$1" in *'"studyHours":4.5'*) echo Fail ;; *) exit 4 ;; esac"#,
            );
            let p = bash(&file, ArgumentMode::Json, Duration::from_secs(5));
            let label = assert_ok!(p.predict(&sample_features()).await);
            assert_eq!(label, PredictionLabel::Fail);
        }

        #[tokio::test]
        async fn test_nonzero_exit_carries_stderr() {
            let file = script("echo 'Error: model file not found' >&2\nexit 2");
            let p = bash(&file, ArgumentMode::Positional, Duration::from_secs(5));

            match p.predict(&sample_features()).await {
                Err(PredictError::NonZeroExit { code, stderr }) => {
                    assert_eq!(code, Some(2));
                    assert_eq!(stderr, "Error: model file not found");
                }
                other => panic!("expected NonZeroExit, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_empty_output() {
            let file = script("exit 0");
            let p = bash(&file, ArgumentMode::Positional, Duration::from_secs(5));
            let err = assert_err!(p.predict(&sample_features()).await);
            assert!(matches!(err, PredictError::EmptyOutput));
        }

        #[tokio::test]
        async fn test_timeout_kills_script() {
            let file = script("sleep 10\necho Pass");
            let p = bash(&file, ArgumentMode::Positional, Duration::from_millis(200));

            let started = Instant::now();
            let err = assert_err!(p.predict(&sample_features()).await);
            assert!(matches!(err, PredictError::TimedOut(_)));
            assert!(started.elapsed() < Duration::from_secs(5));
        }
    }
}
