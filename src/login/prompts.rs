//! Console prompt expressions and the batches built from them
//!
//! These strings are the whole protocol surface: they must match the guest's
//! getty and bash prompts byte for byte.

use crate::config::{LoginConfig, TargetIdentity};
use crate::pattern::{Case, CaseKind, Pattern};
use crate::result::PatternError;
use crate::session::Batch;
use regex::escape;
use secrecy::ExposeSecret;
use std::time::Duration;

/// Any user or root shell prompt
pub const PROMPT_EXPRESSION: &str = r"(\$ |\# )";

/// Line terminator the console emits
pub const CRLF: &str = "\r\n";

/// Password prompt printed by login(1)
pub const PASSWORD_PROMPT: &str = "Password:";

/// Printed by login(1) after a bad password
pub const LOGIN_INCORRECT: &str = "Login incorrect";

/// Times the banner or password prompt may be answered within one attempt
pub const LOGIN_CASE_RETRIES: usize = 10;

/// Output of `echo $?` for exit status `code`, followed by the next prompt.
///
/// `code` is a regex fragment, so `r"\d+"` matches any status.
pub fn ret_value(code: &str) -> String {
    format!("\n{code}{CRLF}.*{PROMPT_EXPRESSION}")
}

/// The getty banner, e.g. `localhost login: `.
///
/// A bare `login: ` would also match lines like
/// `Last failed login: Tue Jun  9 22:25:30 UTC 2020 on ttyS0`.
pub fn login_banner(target: &TargetIdentity) -> String {
    format!("{} login: ", target.host_alternation())
}

/// Prompt of `username`'s login shell in its home directory.
pub fn user_prompt(username: &str, target: &TargetIdentity) -> String {
    format!(r"\[{}@{} ~\]\$ ", escape(username), target.host_alternation())
}

/// Prompt of a root shell obtained with `sudo su` from `username`'s home.
pub fn root_prompt(username: &str, target: &TargetIdentity) -> String {
    format!(
        r"\[root@{} {}\]\# ",
        target.host_alternation(),
        escape(username)
    )
}

/// Either prompt a logged in console may be sitting at.
pub fn logged_in_prompt(username: &str, target: &TargetIdentity) -> String {
    format!(
        "({}|{})",
        user_prompt(username, target),
        root_prompt(username, target)
    )
}

/// Poke the console and look for a shell prompt.
pub(crate) fn probe_batch(config: &LoginConfig) -> Result<Batch, PatternError> {
    let prompt = logged_in_prompt(&config.credentials.username, &config.target);

    Ok(Batch::new(config.timeouts.probe)
        .send("\n")
        .expect(Pattern::new(&prompt)?))
}

/// Log in from the getty banner and escalate to root.
///
/// Built with the first attempt's deadline; a retry reuses it through
/// [`Batch::with_timeout`].
pub(crate) fn login_batch(config: &LoginConfig, timeout: Duration) -> Result<Batch, PatternError> {
    let username = &config.credentials.username;
    let password = config.credentials.password.expose_secret();

    let cases = vec![
        Case::new(Pattern::new(&login_banner(&config.target))?)
            .send(format!("{username}\n"))
            .kind(CaseKind::Continue)
            .retries(LOGIN_CASE_RETRIES),
        Case::new(Pattern::new(PASSWORD_PROMPT)?)
            .send(format!("{password}\n"))
            .kind(CaseKind::Continue)
            .retries(LOGIN_CASE_RETRIES),
        Case::new(Pattern::new(LOGIN_INCORRECT)?).kind(CaseKind::PermissionDenied),
        Case::new(Pattern::new(&user_prompt(username, &config.target))?),
    ];

    Ok(Batch::new(timeout)
        .send("\n")
        .send("\n")
        .switch(cases)
        .send(format!("{}\n", config.escalation_command))
        .expect(Pattern::new(PROMPT_EXPRESSION)?))
}
