use anyhow::{anyhow, Result};

/// Spawn a blocking job on the current tokio runtime.
///
/// Serial I/O is synchronous, so long-running loops go to the blocking pool.
/// Fails instead of panicking when called outside a runtime.
pub fn spawn_blocking_task<F, R>(name: &str, func: F) -> Result<tokio::task::JoinHandle<R>>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let handle = tokio::runtime::Handle::try_current()
        .map_err(|err| anyhow!("Cannot start {name}: no tokio runtime ({err})"))?;
    log::debug!("Spawning blocking task {name}");
    Ok(handle.spawn_blocking(func))
}
