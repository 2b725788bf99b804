// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Finding server instances the supervisor did not start itself.
//!
//! A process the supervisor spawned is tracked through its own handle. The
//! process table is consulted only to notice an instance launched by
//! something else, so that `start` does not launch a second copy and `stop`
//! can still shut it down.

use std::ffi::OsStr;

use sysinfo::Pid;
use sysinfo::ProcessesToUpdate;
use sysinfo::System;

use crate::error::ErrorKind;
use crate::error::Fallible;
use crate::error::fail_with;

pub trait ProcessLocator: Send + Sync {
    /// Ids of running processes whose name is exactly `name`.
    fn find(&self, name: &str) -> Vec<u32>;

    /// Kill a process. `Ok(false)` when it no longer exists.
    fn terminate(&self, pid: u32) -> Fallible<bool>;
}

/// Looks processes up in the operating system's process table.
pub struct SystemLocator;

impl ProcessLocator for SystemLocator {
    fn find(&self, name: &str) -> Vec<u32> {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::All, true);
        let mut pids: Vec<u32> = system
            .processes_by_exact_name(OsStr::new(name))
            .map(|process| process.pid().as_u32())
            .collect();
        pids.sort_unstable();
        pids
    }

    fn terminate(&self, pid: u32) -> Fallible<bool> {
        let pid = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        match system.process(pid) {
            None => Ok(false),
            Some(process) => {
                if process.kill() {
                    Ok(true)
                } else {
                    fail_with(
                        ErrorKind::ProcessControlFailed,
                        format!("failed to signal process {pid}"),
                    )
                }
            }
        }
    }
}

/// Never finds anything.
pub struct NullLocator;

impl ProcessLocator for NullLocator {
    fn find(&self, _name: &str) -> Vec<u32> {
        Vec::new()
    }

    fn terminate(&self, _pid: u32) -> Fallible<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_locator_misses_unknown_name() {
        let pids = SystemLocator.find("no-such-process-acc-manager-test");
        assert!(pids.is_empty());
    }

    #[test]
    fn test_system_locator_finds_self() {
        let me = std::process::id();
        let system = {
            let mut system = System::new();
            system.refresh_processes(ProcessesToUpdate::All, true);
            system
        };
        let Some(name) = system.process(Pid::from_u32(me)).map(|p| p.name().to_owned()) else {
            return;
        };
        let pids = SystemLocator.find(&name.to_string_lossy());
        assert!(pids.contains(&me));
    }

    #[test]
    fn test_null_locator() -> Fallible<()> {
        assert!(NullLocator.find("accServer.exe").is_empty());
        assert!(!NullLocator.terminate(1)?);
        Ok(())
    }
}
