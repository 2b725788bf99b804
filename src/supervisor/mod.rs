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

pub mod locator;

use std::process::ExitStatus;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::RwLock;
use std::time::Duration;
use std::time::Instant;

use tokio::process::Child;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio::time::timeout;

use crate::error::ErrorKind;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail_with;
use crate::installation::InstallationPaths;
use crate::settings::ManagerSettings;
use crate::supervisor::locator::ProcessLocator;
use crate::types::process::ProcessState;
use crate::types::process::ProcessStatus;
use crate::types::process::RunState;
use crate::types::timestamp::Timestamp;

const EXTERNAL_POLL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug)]
pub struct SupervisorOptions {
    /// How long `start` waits for the process to be confirmed alive.
    pub startup_timeout: Duration,
    /// How long `stop` waits for the process to exit.
    pub stop_timeout: Duration,
    /// A freshly spawned process must survive this long to count as running.
    pub startup_grace: Duration,
    /// Pause between the stop and start halves of a restart.
    pub settle_delay: Duration,
}

impl SupervisorOptions {
    pub fn from_settings(settings: &ManagerSettings) -> Self {
        Self {
            startup_timeout: settings.startup_timeout(),
            stop_timeout: settings.stop_timeout(),
            startup_grace: settings.startup_grace(),
            settle_delay: settings.settle_delay(),
        }
    }
}

/// Starts and stops the server executable.
///
/// Control operations take `control` for their whole duration, so a start
/// can never overlap a stop. The state they publish lives behind its own
/// lock and is replaced whole, which lets `status` answer while a control
/// operation is in flight.
pub struct Supervisor {
    paths: Option<InstallationPaths>,
    options: SupervisorOptions,
    locator: Arc<dyn ProcessLocator>,
    control: Mutex<Option<Child>>,
    published: RwLock<ProcessState>,
}

impl Supervisor {
    pub fn new(
        paths: Option<InstallationPaths>,
        options: SupervisorOptions,
        locator: Arc<dyn ProcessLocator>,
    ) -> Self {
        Self {
            paths,
            options,
            locator,
            control: Mutex::new(None),
            published: RwLock::new(ProcessState::stopped()),
        }
    }

    /// The current state. Never waits on a control operation: if one is
    /// running, the state it last published is returned.
    pub fn status(&self) -> ProcessStatus {
        if let Ok(mut slot) = self.control.try_lock() {
            self.poll(&mut slot);
        }
        ProcessStatus::of(self.current())
    }

    pub async fn start(&self) -> Fallible<ProcessState> {
        let mut slot = self.control.lock().await;
        self.start_locked(&mut slot).await
    }

    pub async fn stop(&self) -> Fallible<ProcessState> {
        let mut slot = self.control.lock().await;
        self.stop_locked(&mut slot).await
    }

    /// Stop, wait for the settle delay, start. If nothing was running the
    /// start happens straight away.
    pub async fn restart(&self) -> Fallible<ProcessState> {
        let mut slot = self.control.lock().await;
        match self.stop_locked(&mut slot).await {
            Ok(_) => {
                log::debug!("Waiting {:?} before starting again.", self.options.settle_delay);
                sleep(self.options.settle_delay).await;
            }
            Err(e) if e.kind() == ErrorKind::NotRunning => {
                log::debug!("Restart found the server stopped; starting it.");
            }
            Err(e) => return Err(e),
        }
        self.start_locked(&mut slot).await
    }

    async fn start_locked(&self, slot: &mut Option<Child>) -> Fallible<ProcessState> {
        self.poll(slot);
        let Some(paths) = &self.paths else {
            return fail_with(
                ErrorKind::InstallationPathMissing,
                "no installation root is configured",
            );
        };
        paths.require_valid()?;
        let current = self.current();
        if current.is_active() || slot.is_some() {
            return fail_with(
                ErrorKind::AlreadyRunning,
                format!("server is already {:?}", current.state).to_lowercase(),
            );
        }
        let external = self.find_external(paths.executable_name()).await?;
        if !external.is_empty() {
            return fail_with(
                ErrorKind::AlreadyRunning,
                format!("server is already running outside the manager (pid {external:?})"),
            );
        }

        let start_time = Timestamp::now();
        self.publish(ProcessState {
            state: RunState::Starting,
            process_id: None,
            start_time: Some(start_time),
            last_heartbeat: None,
            last_error: None,
        });

        let exe = paths.executable();
        log::info!("Starting {}", exe.display());
        let begun = Instant::now();
        let spawned = Command::new(&exe)
            .current_dir(paths.root())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let message = format!("failed to launch {}: {e}", exe.display());
                return Err(self.failed(message));
            }
        };
        let pid = child.id();

        let grace = self.options.startup_grace;
        let confirmed = timeout(self.options.startup_timeout, async {
            sleep(grace).await;
            child.try_wait()
        })
        .await;
        match confirmed {
            Ok(Ok(None)) => {}
            Ok(Ok(Some(status))) => {
                let message = format!("server exited during startup ({status})");
                return Err(self.failed(message));
            }
            Ok(Err(e)) => {
                let message = format!("cannot query server process: {e}");
                return Err(self.failed(message));
            }
            Err(_) => {
                // Left in `starting`: the next `status` call decides.
                *slot = Some(child);
                return fail_with(
                    ErrorKind::ProcessControlTimeout,
                    format!(
                        "server was not confirmed alive within {:?}",
                        self.options.startup_timeout
                    ),
                );
            }
        }

        let now = Timestamp::now();
        let state = ProcessState {
            state: RunState::Running,
            process_id: pid,
            start_time: Some(start_time),
            last_heartbeat: Some(now),
            last_error: None,
        };
        self.publish(state.clone());
        *slot = Some(child);
        log::info!(
            "Server running (pid {}) after {}ms.",
            pid.map(|p| p.to_string()).unwrap_or_default(),
            begun.elapsed().as_millis()
        );
        Ok(state)
    }

    async fn stop_locked(&self, slot: &mut Option<Child>) -> Fallible<ProcessState> {
        self.poll(slot);
        match slot.take() {
            Some(child) => self.stop_owned(slot, child).await,
            None => self.stop_external().await,
        }
    }

    async fn stop_owned(&self, slot: &mut Option<Child>, mut child: Child) -> Fallible<ProcessState> {
        let mut stopping = self.current();
        stopping.state = RunState::Stopping;
        self.publish(stopping);
        log::info!("Stopping server (pid {:?}).", child.id());

        if let Err(e) = child.start_kill() {
            // The process may have exited since it was last polled.
            if e.kind() != std::io::ErrorKind::InvalidInput {
                *slot = Some(child);
                return Err(self.failed(format!("failed to signal server: {e}")));
            }
        }
        match timeout(self.options.stop_timeout, child.wait()).await {
            Ok(Ok(status)) => {
                log::info!("Server exited ({status}).");
                let state = ProcessState::stopped();
                self.publish(state.clone());
                Ok(state)
            }
            Ok(Err(e)) => {
                *slot = Some(child);
                Err(self.failed(format!("failed to wait for server: {e}")))
            }
            Err(_) => {
                *slot = Some(child);
                fail_with(
                    ErrorKind::ProcessControlTimeout,
                    format!(
                        "server did not exit within {:?}",
                        self.options.stop_timeout
                    ),
                )
            }
        }
    }

    /// Stop an instance that was started by something else. Processes that
    /// vanish before they can be signalled are not an error.
    async fn stop_external(&self) -> Fallible<ProcessState> {
        let Some(name) = self.paths.as_ref().map(|p| p.executable_name().to_string()) else {
            self.publish(ProcessState::stopped());
            return fail_with(ErrorKind::NotRunning, "server is not running");
        };
        let pids = self.find_external(&name).await?;
        if pids.is_empty() {
            self.publish(ProcessState::stopped());
            return fail_with(ErrorKind::NotRunning, "server is not running");
        }

        let mut stopping = self.current();
        stopping.state = RunState::Stopping;
        stopping.process_id = pids.first().copied();
        self.publish(stopping);
        log::info!("Stopping externally started server (pid {pids:?}).");

        for pid in pids {
            let locator = Arc::clone(&self.locator);
            let killed = tokio::task::spawn_blocking(move || locator.terminate(pid)).await?;
            match killed {
                Ok(true) => {}
                Ok(false) => log::debug!("Process {pid} was already gone."),
                Err(e) => return Err(self.failed(e.message().to_string())),
            }
        }

        let waited = timeout(self.options.stop_timeout, async {
            loop {
                match self.find_external(&name).await {
                    Ok(pids) if pids.is_empty() => return,
                    _ => sleep(EXTERNAL_POLL).await,
                }
            }
        })
        .await;
        if waited.is_err() {
            return fail_with(
                ErrorKind::ProcessControlTimeout,
                format!("server did not exit within {:?}", self.options.stop_timeout),
            );
        }
        let state = ProcessState::stopped();
        self.publish(state.clone());
        Ok(state)
    }

    async fn find_external(&self, name: &str) -> Fallible<Vec<u32>> {
        let locator = Arc::clone(&self.locator);
        let name = name.to_string();
        let pids = tokio::task::spawn_blocking(move || locator.find(&name)).await?;
        Ok(pids)
    }

    /// Check on the owned child without blocking. Publishes its exit if it
    /// has exited and refreshes the heartbeat if it is alive.
    fn poll(&self, slot: &mut Option<Child>) {
        let Some(child) = slot.as_mut() else {
            return;
        };
        match child.try_wait() {
            Ok(None) => {
                let mut state = self.current();
                if state.state == RunState::Starting {
                    state.state = RunState::Running;
                    state.process_id = child.id();
                }
                state.last_heartbeat = Some(Timestamp::now());
                self.publish(state);
            }
            Ok(Some(status)) => {
                *slot = None;
                self.publish_exit(status);
            }
            Err(e) => log::warn!("Cannot poll server process: {e}"),
        }
    }

    fn publish_exit(&self, status: ExitStatus) {
        // Killed by a signal counts as a clean stop.
        if status.success() || status.code().is_none() {
            log::info!("Server exited ({status}).");
            self.publish(ProcessState::stopped());
        } else {
            let message = format!("server exited unexpectedly ({status})");
            log::error!("{message}");
            let mut state = ProcessState::stopped();
            state.state = RunState::Error;
            state.last_error = Some(message);
            self.publish(state);
        }
    }

    /// Publish an `error` state and build the matching report.
    fn failed(&self, message: String) -> ErrorReport {
        log::error!("{message}");
        let mut state = ProcessState::stopped();
        state.state = RunState::Error;
        state.last_error = Some(message.clone());
        self.publish(state);
        ErrorReport::with_kind(ErrorKind::ProcessControlFailed, message)
    }

    fn current(&self) -> ProcessState {
        match self.published.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn publish(&self, state: ProcessState) {
        let mut guard = match self.published.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.state != state.state {
            log::debug!("Process state {:?} -> {:?}", guard.state, state.state);
        }
        *guard = state;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::Path;
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::helper::create_tmp_installation;
    use crate::helper::write_executable;
    use crate::supervisor::locator::NullLocator;

    fn options() -> SupervisorOptions {
        SupervisorOptions {
            startup_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(5),
            startup_grace: Duration::from_millis(100),
            settle_delay: Duration::from_millis(50),
        }
    }

    fn supervisor(root: &Path, options: SupervisorOptions) -> Supervisor {
        Supervisor::new(
            Some(InstallationPaths::new(root, "accServer.exe")),
            options,
            Arc::new(NullLocator),
        )
    }

    /// Pretends a set of externally started processes exist.
    struct FakeLocator {
        pids: StdMutex<Vec<u32>>,
    }

    impl ProcessLocator for FakeLocator {
        fn find(&self, _name: &str) -> Vec<u32> {
            self.pids.lock().map(|p| p.clone()).unwrap_or_default()
        }

        fn terminate(&self, pid: u32) -> Fallible<bool> {
            let mut pids = self.pids.lock().map_err(|_| ErrorReport::new("poisoned"))?;
            let before = pids.len();
            pids.retain(|p| *p != pid);
            Ok(pids.len() < before)
        }
    }

    #[tokio::test]
    async fn test_start_then_stop() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        let supervisor = supervisor(dir.path(), options());
        let state = supervisor.start().await?;
        assert_eq!(state.state, RunState::Running);
        assert!(state.process_id.is_some());
        assert!(state.start_time.is_some());

        let status = supervisor.status();
        assert_eq!(status.process.state, RunState::Running);
        assert!(status.process.last_heartbeat.is_some());

        let state = supervisor.stop().await?;
        assert_eq!(state.state, RunState::Stopped);
        let status = supervisor.status();
        assert_eq!(status.process.state, RunState::Stopped);
        assert_eq!(status.uptime_seconds, 0);
        assert!(status.process.process_id.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_second_stop_is_not_running() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        let supervisor = supervisor(dir.path(), options());
        supervisor.start().await?;
        supervisor.stop().await?;
        let err = supervisor.stop().await.err().map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::NotRunning));
        Ok(())
    }

    #[tokio::test]
    async fn test_double_start() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        let supervisor = supervisor(dir.path(), options());
        supervisor.start().await?;
        let err = supervisor.start().await.err().map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::AlreadyRunning));
        supervisor.stop().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_starts_launch_once() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        let supervisor = supervisor(dir.path(), options());
        let (a, b) = tokio::join!(supervisor.start(), supervisor.start());
        assert!(a.is_ok() != b.is_ok());
        supervisor.stop().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_installation() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        std::fs::remove_dir(dir.path().join("results"))?;
        let supervisor = supervisor(dir.path(), options());
        let err = supervisor.start().await.err().map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::InstallationInvalid));
        assert_eq!(supervisor.status().process.state, RunState::Stopped);

        let unconfigured = Supervisor::new(None, options(), Arc::new(NullLocator));
        let err = unconfigured.start().await.err().map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::InstallationPathMissing));
        Ok(())
    }

    #[tokio::test]
    async fn test_launch_failure_is_reported() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        std::fs::write(dir.path().join("accServer.exe"), "not a program")?;
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o644);
            std::fs::set_permissions(dir.path().join("accServer.exe"), perms)?;
        }
        let supervisor = supervisor(dir.path(), options());
        let err = supervisor.start().await.err();
        assert_eq!(err.as_ref().map(|e| e.kind()), Some(ErrorKind::ProcessControlFailed));
        let status = supervisor.status();
        assert_eq!(status.process.state, RunState::Error);
        assert!(status.process.last_error.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_exit_during_startup() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        write_executable(dir.path(), "exit 3")?;
        let supervisor = supervisor(dir.path(), options());
        let err = supervisor.start().await.err().map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::ProcessControlFailed));
        assert_eq!(supervisor.status().process.state, RunState::Error);
        Ok(())
    }

    #[tokio::test]
    async fn test_crash_after_start_is_an_error() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        write_executable(dir.path(), "sleep 0.5\nexit 2")?;
        let supervisor = supervisor(dir.path(), options());
        supervisor.start().await?;
        sleep(Duration::from_millis(1200)).await;
        let status = supervisor.status();
        assert_eq!(status.process.state, RunState::Error);
        assert!(status.process.last_error.is_some());
        // Nothing left to stop.
        let err = supervisor.stop().await.err().map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::NotRunning));
        Ok(())
    }

    #[tokio::test]
    async fn test_startup_timeout_leaves_process_starting() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        let mut opts = options();
        opts.startup_grace = Duration::from_millis(300);
        opts.startup_timeout = Duration::from_millis(50);
        let supervisor = supervisor(dir.path(), opts);
        let err = supervisor.start().await.err().map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::ProcessControlTimeout));
        // The process was left alive; a status query confirms it.
        let status = supervisor.status();
        assert_eq!(status.process.state, RunState::Running);
        assert!(status.process.process_id.is_some());
        supervisor.stop().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_restart() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        let supervisor = supervisor(dir.path(), options());
        let first = supervisor.start().await?;
        let second = supervisor.restart().await?;
        assert_eq!(second.state, RunState::Running);
        assert_ne!(first.process_id, second.process_id);
        supervisor.stop().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_restart_when_stopped_just_starts() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        let supervisor = supervisor(dir.path(), options());
        let state = supervisor.restart().await?;
        assert_eq!(state.state, RunState::Running);
        supervisor.stop().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_external_instance() -> Fallible<()> {
        let dir = create_tmp_installation()?;
        let locator = Arc::new(FakeLocator {
            pids: StdMutex::new(vec![4242]),
        });
        let supervisor = Supervisor::new(
            Some(InstallationPaths::new(dir.path(), "accServer.exe")),
            options(),
            locator.clone(),
        );
        let err = supervisor.start().await.err().map(|e| e.kind());
        assert_eq!(err, Some(ErrorKind::AlreadyRunning));
        let state = supervisor.stop().await?;
        assert_eq!(state.state, RunState::Stopped);
        assert!(locator.find("accServer.exe").is_empty());
        Ok(())
    }
}
