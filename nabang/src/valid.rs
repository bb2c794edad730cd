//! Out-of-band rendezvous for failed validations.
//!
//! When a validation fails, the writer parks on a named POSIX semaphore
//! until the viewer answers. The answer travels as a 4-byte little-endian
//! command in a response file named like the semaphore, dropped into the
//! writer's working directory: 0 aborts the writer, 1 lets it continue, 2
//! flips the failed condition to true. Both halves live here so the viewer
//! binary can complete the loop.

use std::ffi::CString;
use std::fs;
use std::io;

/// The viewer's answer to a failed validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Tear the writer process down on the spot.
    Abort,
    /// Carry on; the condition stays false.
    Continue,
    /// Treat the condition as satisfied from here on.
    Ignore,
}

impl Verdict {
    fn command(self) -> i32 {
        match self {
            Verdict::Abort => 0,
            Verdict::Continue => 1,
            Verdict::Ignore => 2,
        }
    }

    fn from_command(command: i32) -> Self {
        match command {
            0 => Verdict::Abort,
            2 => Verdict::Ignore,
            _ => Verdict::Continue,
        }
    }
}

/// The response file for validation `key`, relative to the working
/// directory both processes share.
fn response_file(key: i32) -> String {
    format!("nabang-valid-{key}")
}

/// Writer half: park until the viewer posts, then collect the command. A
/// response file that went missing counts as an abort order.
pub(crate) fn await_verdict(key: i32) -> Verdict {
    let name = response_file(key);
    if !wait_on_semaphore(&name) {
        // Without a semaphore there is nobody to wait for.
        return Verdict::Continue;
    }

    let command = match fs::read(&name) {
        Ok(bytes) if bytes.len() >= 4 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        _ => 0,
    };
    let _ = fs::remove_file(&name);
    Verdict::from_command(command)
}

/// Viewer half: drop the response file, then wake the writer.
pub fn post_verdict(key: i32, verdict: Verdict) -> io::Result<()> {
    let name = response_file(key);
    fs::write(&name, verdict.command().to_le_bytes())?;
    post_semaphore(&name)
}

fn semaphore_name(name: &str) -> Option<CString> {
    // POSIX named semaphores live under a leading slash.
    CString::new(format!("/{name}")).ok()
}

fn wait_on_semaphore(name: &str) -> bool {
    let Some(cname) = semaphore_name(name) else {
        return false;
    };

    // Safety: `cname` is NUL-terminated and outlives every call below; the
    // semaphore handle is closed on all paths out.
    unsafe {
        let sem = libc::sem_open(
            cname.as_ptr(),
            libc::O_CREAT,
            0o644 as libc::c_uint,
            0 as libc::c_uint,
        );
        if sem == libc::SEM_FAILED {
            return false;
        }

        while libc::sem_wait(sem) == -1 {
            if io::Error::last_os_error().raw_os_error() != Some(libc::EINTR) {
                break;
            }
        }

        libc::sem_close(sem);
        libc::sem_unlink(cname.as_ptr());
    }
    true
}

fn post_semaphore(name: &str) -> io::Result<()> {
    let Some(cname) = semaphore_name(name) else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "bad rendezvous name"));
    };

    // Safety: as in `wait_on_semaphore`; create-or-open so the viewer may
    // answer before the writer parked.
    unsafe {
        let sem = libc::sem_open(
            cname.as_ptr(),
            libc::O_CREAT,
            0o644 as libc::c_uint,
            0 as libc::c_uint,
        );
        if sem == libc::SEM_FAILED {
            return Err(io::Error::last_os_error());
        }

        if libc::sem_post(sem) == -1 {
            let err = io::Error::last_os_error();
            libc::sem_close(sem);
            return Err(err);
        }
        libc::sem_close(sem);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_round_trip() {
        for verdict in [Verdict::Abort, Verdict::Continue, Verdict::Ignore] {
            assert_eq!(Verdict::from_command(verdict.command()), verdict);
        }
        // Unknown commands degrade to plain continuation.
        assert_eq!(Verdict::from_command(17), Verdict::Continue);
    }
}
