use std::collections::VecDeque;
use std::io::{self, Read};
use std::process::Child;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::debug;

/// Lines of diagnostic output kept for error messages
pub const TAIL_LINES: usize = 5;

/// Drain a pipe on its own thread, calling `on_line` for every line.
///
/// Lines end at `\n` or `\r`, since the encoder rewrites its progress line in
/// place. The thread returns the last `keep` non-empty lines.
pub fn spawn_line_reader<R, F>(reader: R, keep: usize, mut on_line: F) -> JoinHandle<Vec<String>>
where
    R: Read + Send + 'static,
    F: FnMut(&str) + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = reader;
        let mut tail: VecDeque<String> = VecDeque::with_capacity(keep);
        let mut pending: Vec<u8> = Vec::new();
        let mut buf = [0u8; 4096];

        let mut emit = |bytes: &[u8], tail: &mut VecDeque<String>| {
            let line = String::from_utf8_lossy(bytes);
            let line = line.trim();
            if line.is_empty() {
                return;
            }
            on_line(line);
            if keep > 0 {
                if tail.len() == keep {
                    tail.pop_front();
                }
                tail.push_back(line.to_string());
            }
        };

        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            };
            for &byte in &buf[..n] {
                if byte == b'\n' || byte == b'\r' {
                    emit(&pending, &mut tail);
                    pending.clear();
                } else {
                    pending.push(byte);
                }
            }
        }
        emit(&pending, &mut tail);

        tail.into_iter().collect()
    })
}

/// Ask a child to exit, then kill it once `grace` runs out.
///
/// On unix the request is SIGTERM; elsewhere the child is killed right away.
pub fn terminate(child: &mut Child, grace: Duration) {
    if let Ok(Some(_)) = child.try_wait() {
        return;
    }

    if request_exit(child) {
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            match child.try_wait() {
                Ok(Some(_)) => return,
                Ok(None) => thread::sleep(Duration::from_millis(20)),
                Err(_) => break,
            }
        }
        debug!("Process {} ignored termination request, killing", child.id());
    }

    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn request_exit(child: &Child) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(child.id()) else {
        return false;
    };
    kill(Pid::from_raw(pid), Signal::SIGTERM).is_ok()
}

#[cfg(not(unix))]
fn request_exit(_child: &Child) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_reader_splits_on_carriage_returns() {
        let input = b"first\nframe=1 time=00:00:01.00\rframe=2 time=00:00:02.00\r\nlast".to_vec();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let tail = spawn_line_reader(io::Cursor::new(input), 2, move |line| {
            sink.lock().unwrap().push(line.to_string());
        })
        .join()
        .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "first",
                "frame=1 time=00:00:01.00",
                "frame=2 time=00:00:02.00",
                "last"
            ]
        );
        assert_eq!(tail, vec!["frame=2 time=00:00:02.00", "last"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_terminate_stops_long_running_child() {
        let mut child = std::process::Command::new("sleep").arg("30").spawn().unwrap();
        let started = Instant::now();
        terminate(&mut child, Duration::from_secs(1));

        assert!(child.try_wait().unwrap().is_some());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
