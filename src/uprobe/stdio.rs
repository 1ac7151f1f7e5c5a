//! A probe that prints [`super::UprobeEvent::Log`] events to stderr,
//! and forwards everything else (spec §3.7's "stdio" probe).

use super::{LogLevel, Uprobe, UprobeEvent};
use crate::error::{UError, UResult};

pub struct StdioProbe {
    min_level: LogLevel,
}

impl StdioProbe {
    pub fn new(min_level: LogLevel) -> Self {
        StdioProbe { min_level }
    }
}

impl Default for StdioProbe {
    fn default() -> Self {
        StdioProbe::new(LogLevel::Info)
    }
}

impl Uprobe for StdioProbe {
    fn throw(&self, pipe_name: &str, event: &UprobeEvent) -> UResult<()> {
        match event {
            UprobeEvent::Log { level, message } if *level >= self.min_level => {
                eprintln!("[{}] {pipe_name}: {message}", level.as_str());
                Ok(())
            }
            _ => Err(UError::Unhandled),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn below_threshold_is_unhandled() {
        let probe = StdioProbe::new(LogLevel::Warning);
        let err = probe
            .throw("p", &UprobeEvent::Log { level: LogLevel::Debug, message: "x".into() })
            .unwrap_err();
        assert!(matches!(err, UError::Unhandled));
    }

    #[test]
    fn at_or_above_threshold_is_handled() {
        let probe = StdioProbe::new(LogLevel::Warning);
        probe
            .throw("p", &UprobeEvent::Log { level: LogLevel::Error, message: "x".into() })
            .unwrap();
    }
}
