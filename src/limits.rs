//! Process resource limits required before the reactor starts.

use std::io;

use crate::error::ReactorError;

/// Descriptors needed beyond the connection slots: listener, epoll fd,
/// stdio, and whatever the runtime opens for logging.
const FD_OVERHEAD: u64 = 16;

/// Make sure RLIMIT_NOFILE can hold one descriptor per connection slot.
///
/// Raises the soft limit when the hard limit allows it. Never lowers either
/// limit. Returns the soft limit in effect afterwards.
pub fn ensure_nofile_limit(max_connections: usize) -> Result<u64, ReactorError> {
    let mut rlim: libc::rlimit = unsafe { std::mem::zeroed() };
    let ret = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut rlim) };
    if ret != 0 {
        return Err(ReactorError::Io(io::Error::last_os_error()));
    }

    let required = max_connections as u64 + FD_OVERHEAD;
    let soft = rlim.rlim_cur as u64;
    let hard = rlim.rlim_max as u64;

    if soft >= required {
        return Ok(soft);
    }

    if rlim.rlim_max == libc::RLIM_INFINITY || hard >= required {
        rlim.rlim_cur = required as libc::rlim_t;
        let ret = unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &rlim) };
        if ret != 0 {
            return Err(ReactorError::Io(io::Error::last_os_error()));
        }
        tracing::info!(from = soft, to = required, "Raised RLIMIT_NOFILE");
        Ok(required)
    } else {
        Err(ReactorError::ResourceLimit(format!(
            "RLIMIT_NOFILE too low: need {} but hard limit is {} (soft: {}). \
             Raise it with: ulimit -n {}",
            required, hard, soft, required
        )))
    }
}
