//! Shell preparation after login

use super::prompts::{ret_value, PROMPT_EXPRESSION};
use crate::config::LoginConfig;
use crate::pattern::{Case, CaseKind, Pattern};
use crate::result::PatternError;
use crate::session::Batch;

/// Commands run, in order, once a root shell is up: terminal geometry, then
/// the console log level.
pub fn shell_commands(config: &LoginConfig) -> Vec<String> {
    vec![
        format!(
            "stty cols {} rows {}",
            config.terminal.cols, config.terminal.rows
        ),
        format!("dmesg -n {}", config.kernel_log_level),
    ]
}

/// Run every command and insist on a zero exit status.
///
/// Each command is followed by a prompt wait and `echo $?`. A zero status is
/// the success case; any other status is recognized by a lower-priority
/// reject case.
pub(crate) fn configure_batch(config: &LoginConfig) -> Result<Batch, PatternError> {
    let prompt = Pattern::new(PROMPT_EXPRESSION)?;
    let status_ok = Pattern::new(&ret_value("0"))?;
    let status_any = Pattern::new(&ret_value(r"\d+"))?;

    let batch = shell_commands(config)
        .into_iter()
        .fold(Batch::new(config.timeouts.configure), |batch, command| {
            batch
                .send(format!("{command}\n"))
                .expect(prompt.clone())
                .send("echo $?\n")
                .switch(vec![
                    Case::new(status_ok.clone()),
                    Case::new(status_any.clone()).kind(CaseKind::Reject),
                ])
        });

    Ok(batch)
}
