// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

//! Controller logging.

use flowacct::provider::LogLevel;
use flowacct::provider::LogProvider;
use slog::Drain;
use slog::Logger;
use slog::debug;
use slog::error;
use slog::info;
use slog::o;
use slog::warn;

/// Build the root logger.
///
/// `RUST_LOG` takes precedence over `debug`, which only lowers the
/// default filter from `info` to `debug`.
pub fn init(debug: bool) -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let default = if debug { "debug" } else { "info" };
    let mut builder = slog_envlogger::LogBuilder::new(drain).parse(default);
    if let Ok(filter) = std::env::var("RUST_LOG") {
        builder = builder.parse(&filter);
    }
    let drain = builder.build().ignore_res();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}

/// A logger which discards everything.
pub fn discard() -> Logger {
    Logger::root(slog::Discard, o!())
}

/// Route engine diagnostics into a slog [`Logger`].
pub struct SlogLog {
    log: Logger,
}

impl SlogLog {
    pub fn new(log: &Logger) -> Self {
        Self { log: log.new(o!("component" => "engine")) }
    }
}

impl LogProvider for SlogLog {
    fn log(&self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::Debug => debug!(self.log, "{}", msg),
            LogLevel::Note => info!(self.log, "{}", msg),
            LogLevel::Warn => warn!(self.log, "{}", msg),
            LogLevel::Error => error!(self.log, "{}", msg),
        }
    }
}
