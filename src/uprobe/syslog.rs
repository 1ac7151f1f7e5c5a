//! A probe that forwards [`super::UprobeEvent::Log`] events to the
//! system log via `syslog(3)` (spec §3.7's "syslog" probe), for
//! daemonized pipelines that have no attached terminal.

use std::ffi::CString;
use std::sync::Mutex;

use super::{LogLevel, Uprobe, UprobeEvent};
use crate::error::{UError, UResult};

fn syslog_priority(level: LogLevel) -> libc::c_int {
    match level {
        LogLevel::Verbose | LogLevel::Debug => libc::LOG_DEBUG,
        LogLevel::Info => libc::LOG_INFO,
        LogLevel::Notice => libc::LOG_NOTICE,
        LogLevel::Warning => libc::LOG_WARNING,
        LogLevel::Error => libc::LOG_ERR,
    }
}

pub struct SyslogProbe {
    min_level: LogLevel,
    /// `openlog(3)` keeps a pointer into its ident argument for the
    /// process lifetime; this keeps that allocation alive.
    _ident: Mutex<CString>,
}

impl SyslogProbe {
    /// Opens the syslog connection under `ident`. `ident` should
    /// outlive every use of this probe (enforced by holding the
    /// `CString` for the probe's own lifetime).
    pub fn new(ident: &str, min_level: LogLevel) -> Self {
        let ident = CString::new(ident).unwrap_or_else(|_| CString::new("upipe").unwrap());
        unsafe {
            libc::openlog(ident.as_ptr(), libc::LOG_PID, libc::LOG_USER);
        }
        SyslogProbe { min_level, _ident: Mutex::new(ident) }
    }
}

impl Drop for SyslogProbe {
    fn drop(&mut self) {
        unsafe {
            libc::closelog();
        }
    }
}

impl Uprobe for SyslogProbe {
    fn throw(&self, pipe_name: &str, event: &UprobeEvent) -> UResult<()> {
        match event {
            UprobeEvent::Log { level, message } if *level >= self.min_level => {
                if let Ok(line) = CString::new(format!("{pipe_name}: {message}")) {
                    unsafe {
                        libc::syslog(syslog_priority(*level), b"%s\0".as_ptr() as *const libc::c_char, line.as_ptr());
                    }
                }
                Ok(())
            }
            _ => Err(UError::Unhandled),
        }
    }
}
