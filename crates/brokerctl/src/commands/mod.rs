//! Command implementations

pub mod group;
pub mod profile;
pub mod topic;

use crate::cli::OutputFormat;
use crate::connection::{ConnectionManager, Session};
use crate::error::Result as CliResult;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;

/// Settings every admin command needs
pub struct CommandContext<'a> {
    pub conn_mgr: &'a ConnectionManager,
    pub profile: Option<&'a str>,
    pub output: OutputFormat,
    pub query: Option<&'a str>,
}

/// Show a spinner on stderr while `fut` runs
///
/// Hidden automatically when stderr is not a terminal.
pub async fn with_spinner<F, T>(message: String, fut: F) -> T
where
    F: Future<Output = T>,
{
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")
    {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));

    let result = fut.await;
    pb.finish_and_clear();
    result
}

/// Open a session, run `op`, and always finish the session
///
/// The operation's error wins over a failure to finish.
pub async fn run_in_session<T, Op>(ctx: &CommandContext<'_>, op: Op) -> CliResult<T>
where
    Op: AsyncFnOnce(&Session) -> CliResult<T>,
{
    let session = ctx.conn_mgr.open_session(ctx.profile).await?;
    let result = op(&session).await;
    let finished = session.finish().await;
    let value = result?;
    finished?;
    Ok(value)
}
