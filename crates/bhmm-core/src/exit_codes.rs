//! Process exit codes reported by the `bhmm` binary.
//!
//! Scripts driving long sampling jobs branch on these, so the numbers are
//! fixed. Codes below 20 mean the caller can fix the problem by changing
//! arguments or data; 20 and above mean the run itself failed.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    /// Bad flags, unreadable or invalid configuration.
    Usage = 10,
    /// Observations or an initial model that cannot be used.
    BadInput = 11,
    /// Forward underflow, rejected count matrix or a failed EM fit.
    Numerical = 20,
    /// Reading input or writing results failed.
    Io = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// True when rerunning with different arguments or data may succeed.
    pub fn is_caller_fault(self) -> bool {
        matches!(self, ExitCode::Usage | ExitCode::BadInput)
    }

    /// Short tag used in log records.
    pub fn label(self) -> &'static str {
        match self {
            ExitCode::Success => "success",
            ExitCode::Usage => "usage",
            ExitCode::BadInput => "bad_input",
            ExitCode::Numerical => "numerical",
            ExitCode::Io => "io",
        }
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.label(), self.as_i32())
    }
}
