pub mod scan;
pub mod signatures;

use std::process::ExitCode;

/// Scan completed and found nothing
pub const EXIT_CLEAN: u8 = 0;
/// Scan completed and found at least one anomaly
pub const EXIT_ANOMALIES: u8 = 1;
/// Configuration, connection or scan failure
pub const EXIT_FAILURE: u8 = 2;

/// Result of a successfully executed command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Clean,
    Anomalies,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Clean => ExitCode::from(EXIT_CLEAN),
            Outcome::Anomalies => ExitCode::from(EXIT_ANOMALIES),
        }
    }
}
