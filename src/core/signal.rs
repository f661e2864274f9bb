//! # OS termination signals.
//!
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGQUIT` (plus [`tokio::signal::ctrl_c`]).
//! **Other platforms:** `Ctrl-C` only.

/// `SIGINT` number (also reported for Ctrl-C).
pub const SIGINT: i32 = 2;
/// `SIGQUIT` number.
pub const SIGQUIT: i32 = 3;
/// `SIGTERM` number.
pub const SIGTERM: i32 = 15;

/// Shell convention for a process ended by signal `signo`.
pub fn exit_code_for(signo: i32) -> i32 {
    128 + signo
}

/// Completes with the signal number once the process receives a termination signal.
///
/// Each call registers independent listeners; `Err` if registration fails.
#[cfg(unix)]
pub async fn wait_for_termination() -> std::io::Result<i32> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let signo = tokio::select! {
        _ = tokio::signal::ctrl_c() => SIGINT,
        _ = sigint.recv()  => SIGINT,
        _ = sigterm.recv() => SIGTERM,
        _ = sigquit.recv() => SIGQUIT,
    };
    Ok(signo)
}

/// Completes with the signal number once the process receives a termination signal.
#[cfg(not(unix))]
pub async fn wait_for_termination() -> std::io::Result<i32> {
    tokio::signal::ctrl_c().await?;
    Ok(SIGINT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_follows_signal_number() {
        assert_eq!(exit_code_for(SIGINT), 130);
        assert_eq!(exit_code_for(SIGQUIT), 131);
        assert_eq!(exit_code_for(SIGTERM), 143);
    }
}
