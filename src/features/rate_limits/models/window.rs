use std::fmt;
use std::str::FromStr;

/// Trailing interval over which requests are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    Hourly,
    Daily,
}

impl Window {
    /// Checked in this order; the first violated window denies.
    pub const ALL: [Window; 2] = [Window::Hourly, Window::Daily];

    pub const fn seconds(self) -> i64 {
        match self {
            Window::Hourly => 3_600,
            Window::Daily => 86_400,
        }
    }

    /// Records strictly newer than this timestamp fall inside the window,
    /// i.e. the window is `(now - seconds, now]`.
    pub const fn cutoff(self, now: i64) -> i64 {
        now - self.seconds()
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Hourly => write!(f, "hourly"),
            Window::Daily => write!(f, "daily"),
        }
    }
}

/// How a request is admitted against the configured windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementMode {
    /// Check, then record after the fact. Concurrent requests may overshoot
    /// the limit by a small margin.
    Soft,
    /// Check and record in one conditional insert. Never overshoots.
    Strict,
}

impl FromStr for EnforcementMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "soft" => Ok(Self::Soft),
            "strict" => Ok(Self::Strict),
            other => Err(format!("expected 'soft' or 'strict', got '{}'", other)),
        }
    }
}

/// When a soft-mode request is written to the usage log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordUsageOn {
    /// After the upstream call succeeds
    Success,
    /// As soon as the request is admitted, whatever the upstream outcome
    Attempt,
}

impl FromStr for RecordUsageOn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "success" => Ok(Self::Success),
            "attempt" => Ok(Self::Attempt),
            other => Err(format!("expected 'success' or 'attempt', got '{}'", other)),
        }
    }
}
