// Copyright (c) 2023, MaidSafe.
// All rights reserved.
//
// This SAFE Network Software is licensed under the BSD-3-Clause license.
// Please see the LICENSE file for more details.

use crate::error::{Error, Result};
use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// File logger for the supervisor daemon.
///
/// Lines are written as `<ISO timestamp> - <LEVEL> - <message>`. Consecutive
/// duplicate messages are collapsed: the first occurrence is written, repeats
/// are suppressed, and when a differing message arrives a summary line is
/// emitted first. A single repeat re-emits the original line; more repeats
/// emit `Repeated N more times: <original>`. This stops the file filling up
/// with heartbeat entries.
pub struct DedupLogger {
    state: Mutex<DedupState>,
}

struct DedupState {
    file: File,
    last_message: Option<String>,
    last_level: Level,
    repeats: u64,
}

impl DedupLogger {
    pub fn new(path: &Path) -> Result<DedupLogger> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(DedupLogger {
            state: Mutex::new(DedupState {
                file,
                last_message: None,
                last_level: Level::Info,
                repeats: 0,
            }),
        })
    }

    /// Install the logger as the global `log` sink.
    pub fn init(path: &Path, level: LevelFilter) -> Result<()> {
        let logger = DedupLogger::new(path)?;
        log::set_boxed_logger(Box::new(logger))
            .map_err(|e| Error::LoggingConfiguration(e.to_string()))?;
        log::set_max_level(level);
        Ok(())
    }

    fn handle(&self, level: Level, message: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.last_message.as_deref() == Some(message) {
            state.repeats += 1;
            return;
        }
        if state.repeats > 0 {
            let summary = if state.repeats == 1 {
                state.last_message.clone().unwrap_or_default()
            } else {
                format!(
                    "Repeated {} more times: {}",
                    state.repeats,
                    state.last_message.as_deref().unwrap_or_default()
                )
            };
            let last_level = state.last_level;
            state.write_line(last_level, &summary);
        }
        state.write_line(level, message);
        state.last_message = Some(message.to_string());
        state.last_level = level;
        state.repeats = 0;
    }
}

impl DedupState {
    fn write_line(&mut self, level: Level, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f");
        let _ = writeln!(self.file, "{timestamp} - {level} - {message}");
    }
}

impl Log for DedupLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.handle(record.level(), &record.args().to_string());
    }

    fn flush(&self) {
        if let Ok(mut state) = self.state.lock() {
            let _ = state.file.flush();
        }
    }
}
