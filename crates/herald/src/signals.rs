//! SIGINT / SIGTERM handling on the event loop

use std::io;

use tokio::signal;

use crate::event_loop::LocalLoop;

/// Listen for termination signals, calling `on_signal` with the signal name
pub fn install(event_loop: &LocalLoop, on_signal: Box<dyn Fn(&'static str)>) {
    event_loop.spawn_local(async move {
        loop {
            match wait_for_signal().await {
                Ok(name) => on_signal(name),
                Err(e) => {
                    tracing::error!(error = %e, "failed to install signal handler");
                    return;
                }
            }
        }
    });
    tracing::debug!("signal handlers installed");
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_signal() -> io::Result<&'static str> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result.map(|()| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map(|()| "SIGINT")
    }
}
