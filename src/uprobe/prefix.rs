//! A probe that rewrites the pipe name attached to log messages before
//! forwarding, so a bin can label every inner pipe's output with the
//! bin's own name (spec §3.7, used heavily by the `bin` helper
//! pattern in §4.3).

use std::sync::Arc;

use super::{Uprobe, UprobeEvent};
use crate::error::UResult;

pub struct PrefixProbe {
    prefix: String,
    next: Arc<dyn Uprobe>,
}

impl PrefixProbe {
    pub fn new(prefix: impl Into<String>, next: Arc<dyn Uprobe>) -> Self {
        PrefixProbe { prefix: prefix.into(), next }
    }
}

impl Uprobe for PrefixProbe {
    fn throw(&self, pipe_name: &str, event: &UprobeEvent) -> UResult<()> {
        let prefixed = format!("{}.{pipe_name}", self.prefix);
        self.next.throw(&prefixed, event)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::uprobe::LogLevel;
    use std::sync::Mutex;

    struct Capture(Mutex<Option<String>>);
    impl Uprobe for Capture {
        fn throw(&self, pipe_name: &str, _event: &UprobeEvent) -> UResult<()> {
            *self.0.lock().unwrap() = Some(pipe_name.to_string());
            Ok(())
        }
    }

    #[test]
    fn prefixes_the_pipe_name() {
        let capture = Arc::new(Capture(Mutex::new(None)));
        let probe = PrefixProbe::new("encoder_bin", capture.clone());
        probe
            .throw("x264", &UprobeEvent::Log { level: LogLevel::Info, message: "ok".into() })
            .unwrap();
        assert_eq!(capture.0.lock().unwrap().as_deref(), Some("encoder_bin.x264"));
    }
}
