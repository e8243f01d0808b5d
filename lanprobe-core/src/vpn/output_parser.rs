//! Pattern-based classifier for VPN client CLI failures
//!
//! The control CLI reports problems as free text on stderr. This module maps
//! that text onto the harness error taxonomy using regex patterns.

use regex::Regex;

/// What a failed client command means for the harness
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CtlFailure {
    /// The daemon behind the CLI is not running or not reachable
    DaemonUnreachable { message: String },
    /// The client refused a setting value or key
    Rejected { message: String },
    /// Anything else
    Other { message: String },
}

/// Parser for control CLI output
pub struct OutputParser {
    /// Pattern for "Unable to connect to daemon" style messages
    unreachable_pattern: Regex,
    /// Pattern for invalid setting key/value messages
    rejected_pattern: Regex,
}

impl OutputParser {
    /// Create a new OutputParser with compiled regex patterns
    pub fn new() -> Self {
        Self {
            unreachable_pattern: Regex::new(
                r"(?i)unable to connect to (the )?(daemon|service)|connection refused|daemon (is )?not running|not connected to (the )?daemon|timed out connecting|no such file or directory.*sock",
            )
            .expect("Failed to compile unreachable pattern"),
            rejected_pattern: Regex::new(
                r"(?i)invalid (value|setting|argument|key)|unknown (setting|key)|unsupported (value|setting)|not a valid|could not (set|apply)|failed to apply",
            )
            .expect("Failed to compile rejected pattern"),
        }
    }

    /// Classify the combined stdout/stderr of a failed command
    pub fn classify(&self, output: &str) -> CtlFailure {
        let message = first_meaningful_line(output);

        if self.unreachable_pattern.is_match(output) {
            return CtlFailure::DaemonUnreachable { message };
        }

        if self.rejected_pattern.is_match(output) {
            return CtlFailure::Rejected { message };
        }

        CtlFailure::Other { message }
    }
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new()
    }
}

fn first_meaningful_line(output: &str) -> String {
    output
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no output")
        .to_string()
}
