// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Providers allow the engine to run in different contexts by letting
//! the host plug in its own implementation of core services. Today
//! that is only logging: the controller routes engine diagnostics into
//! its structured logger, while unit tests print or capture them.

use crate::ddi::sync::KMutex;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::fmt::Display;

/// The set of all host-specific providers required by a pipeline.
pub struct Providers {
    pub log: Box<dyn LogProvider>,
}

/// A logging provider provides the means to log messages to some
/// destination based on the context in which the engine is running.
///
/// The pipeline only ever logs at [`LogLevel::Debug`] from its hot
/// path; the other levels are for the control operations.
pub trait LogProvider: Send + Sync {
    /// Log a message at the specified level.
    fn log(&self, level: LogLevel, msg: &str);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Debug,
    Note,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let level_s = match self {
            Self::Debug => "[DEBUG]",
            Self::Note => "[NOTE]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERROR]",
        };
        write!(f, "{level_s}")
    }
}

#[derive(Clone, Copy)]
pub struct PrintlnLog;

impl LogProvider for PrintlnLog {
    fn log(&self, level: LogLevel, msg: &str) {
        println!("{level} {msg}");
    }
}

/// Keep every message so a test can make assertions about them.
#[derive(Clone, Default)]
pub struct CaptureLog {
    msgs: Arc<KMutex<Vec<(LogLevel, String)>>>,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message logged so far, oldest first.
    pub fn messages(&self) -> Vec<(LogLevel, String)> {
        self.msgs.lock().clone()
    }
}

impl LogProvider for CaptureLog {
    fn log(&self, level: LogLevel, msg: &str) {
        self.msgs.lock().push((level, msg.to_string()));
    }
}
