//! Detach from the terminal before the Tokio runtime exists

use anyhow::Result;

/// Double-fork into a background process
///
/// Must run while the process is single-threaded: no runtime, no appender worker, no
/// library threads. The original process and the intermediate child both exit 0; only the
/// grandchild returns. The working directory is kept so relative command paths still
/// resolve; stdio is redirected to `/dev/null`.
///
/// Returns `Ok(false)` on platforms without fork.
#[allow(unsafe_code)] // fork() requires unsafe
pub fn daemonize() -> Result<bool> {
    #[cfg(unix)]
    {
        use nix::unistd::{fork, setsid, ForkResult};

        // SAFETY: called before any thread is spawned, so the child inherits a consistent
        // single-threaded address space.
        match unsafe { fork() }? {
            ForkResult::Parent { .. } => std::process::exit(0),
            ForkResult::Child => {}
        }

        // New session: lose the controlling terminal
        setsid()?;

        // SAFETY: still single-threaded, we are the first fork's only thread
        match unsafe { fork() }? {
            ForkResult::Parent { .. } => std::process::exit(0),
            ForkResult::Child => {}
        }

        redirect_stdio()?;
        Ok(true)
    }

    #[cfg(not(unix))]
    {
        Ok(false)
    }
}

#[cfg(unix)]
fn redirect_stdio() -> Result<()> {
    use nix::fcntl::{open, OFlag};
    use nix::sys::stat::Mode;
    use nix::unistd::{close, dup2};

    let null = open("/dev/null", OFlag::O_RDWR, Mode::empty())?;
    for fd in 0..=2 {
        dup2(null, fd)?;
    }
    if null > 2 {
        close(null)?;
    }
    Ok(())
}
