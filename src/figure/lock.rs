/// Owner lock
///
/// Serializes requests that share a generator script. Two parallel requests
/// for sibling outputs would otherwise both miss the cache and run the script
/// twice, each overwriting the other's outputs.
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{FigureError, FigureResult, ScriptFailure, FIGURE_RULE};
use crate::figure::cache::LOCKS_DIR;
use crate::logging::{operations, services, status};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Held lock; the lock file is removed on drop
#[derive(Debug)]
pub struct OwnerLock {
    path: PathBuf,
}

impl OwnerLock {
    /// Acquire the lock for `script` under `cache_root`, waiting up to `timeout`
    pub fn acquire(
        cache_root: &Path,
        script: &str,
        timeout: Duration,
        exception_file: Option<&Path>,
    ) -> FigureResult<Self> {
        let dir = cache_root.join(LOCKS_DIR);
        fs::create_dir_all(&dir).map_err(|e| FigureError::io(&dir, e))?;
        let path = dir.join(format!("{script}.lock"));

        let start = Instant::now();
        let mut contended = false;

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    // Holder pid, for whoever finds a stale lock
                    let _ = writeln!(file, "{}", std::process::id());
                    debug!(
                        service = services::OWNER_LOCK,
                        operation = operations::ACQUIRE,
                        status = status::SUCCESS,
                        script = script,
                        waited_ms = start.elapsed().as_millis() as u64,
                        "owner lock acquired"
                    );
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if let Some(pid) = dead_holder(&path) {
                        warn!(
                            service = services::OWNER_LOCK,
                            operation = operations::ACQUIRE,
                            status = status::STALE,
                            script = script,
                            pid = pid,
                            lock = %path.display(),
                            "removing owner lock left by a dead process"
                        );
                        match fs::remove_file(&path) {
                            Ok(()) => continue,
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => return Err(FigureError::io(&path, e)),
                        }
                    }
                    if !contended {
                        contended = true;
                        warn!(
                            service = services::OWNER_LOCK,
                            operation = operations::ACQUIRE,
                            status = status::CONTENDED,
                            script = script,
                            lock = %path.display(),
                            "waiting for another request of the same script"
                        );
                    }
                    if start.elapsed() >= timeout {
                        return Err(lock_timeout(script, &path, timeout, exception_file));
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(FigureError::io(&path, e)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OwnerLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(
                service = services::OWNER_LOCK,
                operation = operations::RELEASE,
                status = status::ERROR,
                lock = %self.path.display(),
                "failed to release owner lock: {}",
                e
            );
        }
    }
}

/// Pid recorded in a lock file whose process no longer exists.
///
/// A lock whose pid is not yet written belongs to a holder that is still
/// starting up, so it is never considered dead. The pid is read twice so a
/// lock re-created by another waiter in between is left alone.
fn dead_holder(path: &Path) -> Option<u32> {
    let read_pid = || -> Option<u32> { fs::read_to_string(path).ok()?.trim().parse().ok() };

    let pid = read_pid()?;
    if pid == std::process::id() || is_process_running(pid) {
        return None;
    }
    (read_pid() == Some(pid)).then_some(pid)
}

#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return true;
    }
    // EPERM means the process exists but belongs to someone else
    !matches!(kill(Pid::from_raw(raw), None), Err(Errno::ESRCH))
}

#[cfg(windows)]
fn is_process_running(pid: u32) -> bool {
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::OpenProcess;
    use winapi::um::winnt::PROCESS_QUERY_LIMITED_INFORMATION;

    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
        if handle.is_null() {
            false
        } else {
            CloseHandle(handle);
            true
        }
    }
}

fn lock_timeout(
    script: &str,
    path: &Path,
    timeout: Duration,
    exception_file: Option<&Path>,
) -> FigureError {
    let holder = fs::read_to_string(path)
        .map(|pid| pid.trim().to_string())
        .unwrap_or_default();
    let holder = if holder.is_empty() { "?" } else { holder.as_str() };

    FigureError::ScriptExecution(Box::new(ScriptFailure {
        script: script.to_string(),
        rule_name: FIGURE_RULE.to_string(),
        brief: format!("Timed out waiting for the lock on figure script {script}"),
        context: format!(
            "figcache waited {}s for another request of {script} (pid {holder}) to finish. \
             Remove {} if no other build is running.",
            timeout.as_secs(),
            path.display()
        ),
        exception_file: exception_file.map(Path::to_path_buf),
        source: std::io::Error::new(
            ErrorKind::TimedOut,
            format!(
                "lock {} still held by pid {holder} after {}s",
                path.display(),
                timeout.as_secs()
            ),
        ),
    }))
}
