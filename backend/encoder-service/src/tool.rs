//! External tool invocation
//!
//! The pipeline shells out to ffprobe, ffmpeg, mp4fragment, and mp4dash.
//! Children are spawned with `kill_on_drop` so a cancelled worker task can
//! never leak an encoder process, and stderr is always captured for the
//! failure message.

use std::path::Path;
use tokio::process::Command;

/// Run a tool to completion and return its stdout.
///
/// A non-zero exit or a spawn failure becomes an `Err(String)` carrying the
/// tool name, exit status, and captured stderr; callers wrap it in their
/// stage's error variant.
pub(crate) async fn run_tool(tool: &str, args: &[String]) -> Result<Vec<u8>, String> {
    let output = Command::new(tool)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| format!("failed to spawn {tool}: {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "{tool} exited with {}: {}",
            output.status,
            stderr.trim()
        ));
    }

    Ok(output.stdout)
}

/// Path rendered for a command line.
pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
