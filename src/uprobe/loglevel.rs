//! A probe that raises or drops [`super::UprobeEvent::Log`] events
//! based on a per-pipe-name regex, letting an operator silence or
//! promote one noisy pipe without touching the whole chain (spec
//! §3.7).

use regex::Regex;

use super::{LogLevel, Uprobe, UprobeEvent};
use crate::error::{UError, UResult};

struct Rule {
    pattern: Regex,
    level: LogLevel,
}

/// Matches pipe names against an ordered list of `(pattern, level)`
/// rules; the first match wins. A log event below its matched rule's
/// level is dropped entirely (not forwarded); at or above, it's
/// forwarded to `next` unchanged. Pipe names with no matching rule
/// pass through untouched.
pub struct LoglevelProbe {
    rules: Vec<Rule>,
    next: std::sync::Arc<dyn Uprobe>,
}

impl LoglevelProbe {
    pub fn new(next: std::sync::Arc<dyn Uprobe>) -> Self {
        LoglevelProbe { rules: Vec::new(), next }
    }

    /// Add a rule. Invalid regexes are rejected rather than silently
    /// ignored, since a typo'd filter that matches everything (or
    /// nothing) is a correctness bug, not a style nit.
    pub fn with_rule(mut self, pattern: &str, level: LogLevel) -> Result<Self, regex::Error> {
        self.rules.push(Rule { pattern: Regex::new(pattern)?, level });
        Ok(self)
    }

    fn threshold_for(&self, pipe_name: &str) -> Option<LogLevel> {
        self.rules
            .iter()
            .find(|r| r.pattern.is_match(pipe_name))
            .map(|r| r.level)
    }
}

impl Uprobe for LoglevelProbe {
    fn throw(&self, pipe_name: &str, event: &UprobeEvent) -> UResult<()> {
        if let UprobeEvent::Log { level, .. } = event {
            if let Some(threshold) = self.threshold_for(pipe_name) {
                if *level < threshold {
                    return Ok(()); // dropped, not forwarded
                }
            }
        }
        match self.next.throw(pipe_name, event) {
            Err(UError::Unhandled) => Err(UError::Unhandled),
            other => other,
        }
    }
}
