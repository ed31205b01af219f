//! Camera control through the gphoto2 command-line tool.
//!
//! Every call spawns one `gphoto2` process and polls it until it exits or its
//! time bound runs out, in which case the process is killed. gphoto2 does not
//! always exit non-zero on camera errors, so its output is also scanned for
//! the `*** Error` marker it prints.
//!
//! Running children are kept in a process-wide table so a forced exit can
//! kill them instead of leaving them to drive the camera on their own.

use std::collections::HashMap;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{DeviceChannel, DeviceOutput};
use crate::constants::DEVICE_POLL_INTERVAL_MS;
use crate::errors::DeviceError;
use crate::exposure::camera::SetCommand;

const GPHOTO2_ERROR_MARKER: &str = "*** Error";

/// Children still running, by PID.
static RUNNING_CHILDREN: Mutex<Option<HashMap<u32, Child>>> = Mutex::new(None);

fn running_children() -> MutexGuard<'static, Option<HashMap<u32, Child>>> {
    RUNNING_CHILDREN.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Kill and reap every camera command still in flight. Returns how many
/// were killed.
pub fn kill_running_commands() -> usize {
    let children: Vec<Child> = running_children()
        .take()
        .map(|table| table.into_values().collect())
        .unwrap_or_default();
    let killed = children.len();
    for mut child in children {
        let _ = child.kill();
        let _ = child.wait();
    }
    killed
}

/// What polling a registered child found.
enum Poll {
    Exited(ExitStatus),
    Running,
    /// Killed by [`kill_running_commands`].
    Gone,
    Failed(std::io::Error),
}

fn poll_child(pid: u32) -> Poll {
    let mut table = running_children();
    let Some(child) = table.as_mut().and_then(|table| table.get_mut(&pid)) else {
        return Poll::Gone;
    };
    match child.try_wait() {
        Ok(Some(status)) => Poll::Exited(status),
        Ok(None) => Poll::Running,
        Err(e) => Poll::Failed(e),
    }
}

/// Remove `pid` from the table, killing it if it is still alive.
fn reap_child(pid: u32, kill: bool) {
    let child = running_children().as_mut().and_then(|table| table.remove(&pid));
    if let Some(mut child) = child
        && kill
    {
        let _ = child.kill();
        let _ = child.wait();
    }
}

pub struct Gphoto2Channel {
    /// Program and leading arguments, e.g. `["sudo", "/sw/bin/gphoto2"]`.
    program: Vec<String>,
    port: Option<String>,
    command_timeout: Duration,
    debug_enabled: bool,
}

impl Gphoto2Channel {
    /// `program` may carry leading words such as `sudo`; it is split on
    /// whitespace.
    pub fn new(program: &str, port: Option<String>, command_timeout: Duration, debug_enabled: bool) -> Self {
        let mut words: Vec<String> = program.split_whitespace().map(str::to_string).collect();
        if words.is_empty() {
            words.push(crate::constants::DEFAULT_GPHOTO2_COMMAND.to_string());
        }
        Self {
            program: words,
            port,
            command_timeout,
            debug_enabled,
        }
    }

    fn arguments(&self, action: &[String]) -> Vec<String> {
        let mut args: Vec<String> = self.program[1..].to_vec();
        if let Some(port) = &self.port {
            args.push("--port".to_string());
            args.push(port.clone());
        }
        args.extend_from_slice(action);
        args
    }

    fn run(&self, action: &[String], timeout: Duration) -> Result<DeviceOutput, DeviceError> {
        let args = self.arguments(action);
        let display = std::iter::once(self.program[0].as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");

        if self.debug_enabled {
            log_debug!("Running: {display} (timeout {}s)", timeout.as_secs());
        }

        let mut command = Command::new(&self.program[0]);
        command.args(&args);
        run_with_timeout(command, display, timeout)
    }
}

impl DeviceChannel for Gphoto2Channel {
    fn set(&mut self, command: &SetCommand) -> Result<DeviceOutput, DeviceError> {
        self.run(
            &["--set-config".to_string(), command.to_string()],
            self.command_timeout,
        )
    }

    fn trigger_exposure(&mut self, timeout: Duration) -> Result<DeviceOutput, DeviceError> {
        self.run(&["--capture-image".to_string()], timeout)
    }

    fn channel_name(&self) -> &'static str {
        "gphoto2"
    }
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut source) = source {
            let mut bytes = Vec::new();
            let _ = source.read_to_end(&mut bytes);
            text = String::from_utf8_lossy(&bytes).into_owned();
        }
        text
    })
}

fn collect_output(readers: [JoinHandle<String>; 2]) -> String {
    readers
        .into_iter()
        .filter_map(|reader| reader.join().ok())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run `command`, killing it if it is still alive after `timeout`.
///
/// stdout and stderr are drained on helper threads so a chatty child cannot
/// block on a full pipe while it is being polled.
pub fn run_with_timeout(
    mut command: Command,
    display: String,
    timeout: Duration,
) -> Result<DeviceOutput, DeviceError> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| DeviceError::Spawn {
        command: display.clone(),
        source,
    })?;
    let readers = [
        spawn_reader(child.stdout.take()),
        spawn_reader(child.stderr.take()),
    ];
    let pid = child.id();
    running_children().get_or_insert_with(HashMap::new).insert(pid, child);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match poll_child(pid) {
            Poll::Exited(status) => {
                reap_child(pid, false);
                break status;
            }
            Poll::Running if Instant::now() >= deadline => {
                reap_child(pid, true);
                // Grandchildren may still hold the pipes, so the readers are
                // left to finish on their own.
                drop(readers);
                return Err(DeviceError::Timeout {
                    command: display,
                    timeout,
                });
            }
            Poll::Running => thread::sleep(Duration::from_millis(DEVICE_POLL_INTERVAL_MS)),
            Poll::Gone => {
                drop(readers);
                return Err(DeviceError::Command {
                    command: display,
                    output: "killed during shutdown".to_string(),
                });
            }
            Poll::Failed(source) => {
                reap_child(pid, true);
                return Err(DeviceError::Spawn {
                    command: display,
                    source,
                });
            }
        }
    };

    let output = collect_output(readers);
    if status.success() && !output.contains(GPHOTO2_ERROR_MARKER) {
        Ok(DeviceOutput {
            command: display,
            output,
        })
    } else {
        Err(DeviceError::Command {
            command: display,
            output: if output.is_empty() {
                format!("exited with {status}")
            } else {
                output
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::camera::{CANON_5D, Parameter};
    use serial_test::serial;

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[test]
    fn test_arguments_place_port_before_action() {
        let channel = Gphoto2Channel::new(
            "sudo /sw/bin/gphoto2",
            Some("usb:001,004".to_string()),
            Duration::from_secs(10),
            false,
        );
        let command = CANON_5D.command(Parameter::Iso, "1600").unwrap();
        let args = channel.arguments(&["--set-config".to_string(), command.to_string()]);
        assert_eq!(channel.program[0], "sudo");
        assert_eq!(
            args,
            vec![
                "/sw/bin/gphoto2",
                "--port",
                "usb:001,004",
                "--set-config",
                "/main/imgsettings/iso=1600"
            ]
        );
    }

    #[test]
    #[serial]
    fn test_successful_command_returns_output() {
        let result = run_with_timeout(shell("echo ready"), "echo".to_string(), Duration::from_secs(5));
        let output = result.unwrap();
        assert_eq!(output.output, "ready");
    }

    #[test]
    #[serial]
    fn test_failing_command_reports_output() {
        let result = run_with_timeout(
            shell("echo 'no camera' >&2; exit 1"),
            "fail".to_string(),
            Duration::from_secs(5),
        );
        match result {
            Err(DeviceError::Command { output, .. }) => assert_eq!(output, "no camera"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    #[serial]
    fn test_error_marker_fails_even_on_zero_exit() {
        let result = run_with_timeout(
            shell("echo '*** Error: Could not find camera ***'"),
            "marker".to_string(),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(DeviceError::Command { .. })));
    }

    #[test]
    #[serial]
    fn test_hung_command_is_killed_at_deadline() {
        let started = Instant::now();
        let result = run_with_timeout(shell("exec sleep 10"), "sleep".to_string(), Duration::from_millis(200));
        assert!(matches!(result, Err(DeviceError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_missing_program_is_a_spawn_error() {
        let mut channel = Gphoto2Channel::new(
            "/nonexistent/gphoto2",
            None,
            Duration::from_secs(1),
            false,
        );
        let result = channel.trigger_exposure(Duration::from_secs(1));
        assert!(matches!(result, Err(DeviceError::Spawn { .. })));
    }

    #[test]
    #[serial]
    fn test_forced_shutdown_kills_command_in_flight() {
        let worker = thread::spawn(|| {
            run_with_timeout(shell("exec sleep 30"), "sleep".to_string(), Duration::from_secs(60))
        });

        // Wait for the child to be registered
        let started = Instant::now();
        let mut killed = 0;
        while killed == 0 && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(20));
            killed = kill_running_commands();
        }
        assert_eq!(killed, 1);

        let result = worker.join().unwrap();
        match result {
            Err(DeviceError::Command { output, .. }) => assert_eq!(output, "killed during shutdown"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(kill_running_commands(), 0);
    }

    #[test]
    #[serial]
    fn test_finished_commands_leave_nothing_to_kill() {
        run_with_timeout(shell("true"), "true".to_string(), Duration::from_secs(5)).unwrap();
        let _ = run_with_timeout(shell("exec sleep 10"), "sleep".to_string(), Duration::from_millis(100));
        assert_eq!(kill_running_commands(), 0);
    }
}
