// Short-lived helper commands (service manager, taskkill)

use tokio::process::Command;
use tracing::debug;

use procwatch_core::port::AdapterError;

/// Exit status plus combined stdout/stderr text
pub(crate) struct CommandOutput {
    pub success: bool,
    pub text: String,
}

pub(crate) async fn run(program: &str, args: &[&str]) -> Result<CommandOutput, AdapterError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| AdapterError::CommandFailed(format!("{}: {}", program, e)))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let text = text.trim().to_string();

    debug!(program, args = ?args, status = ?output.status.code(), "Helper command finished");
    Ok(CommandOutput {
        success: output.status.success(),
        text,
    })
}
