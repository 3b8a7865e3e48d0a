// Copyright (c) 2023, MaidSafe.
// All rights reserved.
//
// This SAFE Network Software is licensed under the BSD-3-Clause license.
// Please see the LICENSE file for more details.

pub mod alert;
pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod ring;
pub mod ssh;
pub mod supervisor;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

pub const LOG_FILE: &str = "/var/log/xrootdrestart.log";
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Shared flag set by the signal listeners and polled by everything that must
/// stop cleanly: the scheduler loop, the heartbeat task, and the restart
/// primitives, which abort the attempt and roll back when they observe it.
///
/// All accesses use `Ordering::Relaxed`; the flag is only ever polled and no
/// ordering with other state is required.
#[derive(Clone, Debug, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> ShutdownFlag {
        Default::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
