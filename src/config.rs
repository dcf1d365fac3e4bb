//! Typed login parameters
//!
//! Everything the orchestrator needs besides the transport: who the target
//! is, how to authenticate, how the shell should be left, and how long each
//! stage may take. [`LoginConfig::from_map`] reads the same keys from any
//! key/value source (a ConfigMap's data, a test fixture) and
//! [`LoginConfig::from_env`] reads them from the process environment.

use secrecy::SecretString;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Key holding the target's real name (required)
pub const TARGET_NAME_KEY: &str = "CONSOLE_TARGET_NAME";
/// Key holding extra host aliases, newline or comma separated
pub const TARGET_ALIASES_KEY: &str = "CONSOLE_TARGET_ALIASES";
/// Key holding the login user
pub const USERNAME_KEY: &str = "CONSOLE_USERNAME";
/// Key holding the login password
pub const PASSWORD_KEY: &str = "CONSOLE_PASSWORD";
/// Key holding the privilege escalation command
pub const ESCALATION_COMMAND_KEY: &str = "CONSOLE_ESCALATION_COMMAND";
/// Key holding the terminal rows set after login
pub const TERMINAL_ROWS_KEY: &str = "CONSOLE_TERMINAL_ROWS";
/// Key holding the terminal columns set after login
pub const TERMINAL_COLS_KEY: &str = "CONSOLE_TERMINAL_COLS";
/// Key holding the console log level passed to `dmesg -n`
pub const KERNEL_LOG_LEVEL_KEY: &str = "CONSOLE_KERNEL_LOG_LEVEL";
/// Key holding the connect timeout
pub const CONNECT_TIMEOUT_KEY: &str = "CONSOLE_CONNECT_TIMEOUT_SECONDS";
/// Key holding the already-logged-in probe timeout
pub const PROBE_TIMEOUT_KEY: &str = "CONSOLE_PROBE_TIMEOUT_SECONDS";
/// Key holding the first login attempt timeout
pub const LOGIN_TIMEOUT_KEY: &str = "CONSOLE_LOGIN_TIMEOUT_SECONDS";
/// Key holding the login retry timeout
pub const LOGIN_RETRY_TIMEOUT_KEY: &str = "CONSOLE_LOGIN_RETRY_TIMEOUT_SECONDS";
/// Key holding the shell configuration timeout
pub const CONFIGURE_TIMEOUT_KEY: &str = "CONSOLE_CONFIGURE_TIMEOUT_SECONDS";

/// Aliases a freshly booted guest may present before it learns its name
pub const DEFAULT_ALIASES: [&str; 2] = ["localhost", "fedora"];
/// Default login user
pub const DEFAULT_USERNAME: &str = "fedora";
/// Default login password
pub const DEFAULT_PASSWORD: &str = "fedora";
/// Default privilege escalation command
pub const DEFAULT_ESCALATION_COMMAND: &str = "sudo su";
/// Default terminal rows and columns
pub const DEFAULT_TERMINAL_SIZE: u16 = 500;
/// Default `dmesg -n` level: only emergency messages reach the console
pub const DEFAULT_KERNEL_LOG_LEVEL: u8 = 1;

/// Errors produced while reading configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A required key is absent
    #[error("{0} field is missing")]
    MissingField(&'static str),

    /// A key is present but its value is unusable
    #[error("{key} field is illegal: {value:?}")]
    IllegalField {
        /// The offending key
        key: &'static str,
        /// The raw value
        value: String,
    },
}

/// The names a console may present itself under.
///
/// Prompt patterns accept any of the aliases or the real name, since a guest
/// that did not get a hostname from DHCP keeps a default one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetIdentity {
    name: String,
    aliases: Vec<String>,
}

impl TargetIdentity {
    /// Identity with the default aliases (`localhost`, `fedora`).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: DEFAULT_ALIASES.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Replace the alias set.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// The target's real name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The accepted aliases.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Regex alternation matching any alias or the real name, e.g.
    /// `(localhost|fedora|vm\-1)`. Names are escaped.
    pub fn host_alternation(&self) -> String {
        let mut names: Vec<&str> = self.aliases.iter().map(String::as_str).collect();
        if !names.contains(&self.name.as_str()) {
            names.push(&self.name);
        }

        let escaped: Vec<String> = names.iter().map(|n| regex::escape(n)).collect();
        format!("({})", escaped.join("|"))
    }
}

/// Login credentials
#[derive(Debug)]
pub struct Credentials {
    /// User to log in as
    pub username: String,
    /// Password, never logged
    pub password: SecretString,
}

impl Credentials {
    /// Create credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, DEFAULT_PASSWORD)
    }
}

/// Terminal geometry forced with `stty` after login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSize {
    /// Rows
    pub rows: u16,
    /// Columns
    pub cols: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self {
            rows: DEFAULT_TERMINAL_SIZE,
            cols: DEFAULT_TERMINAL_SIZE,
        }
    }
}

/// Per-stage time budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Opening the console stream
    pub connect: Duration,
    /// Detecting an already logged in shell
    pub probe: Duration,
    /// First login attempt
    pub login: Duration,
    /// Second (last) login attempt
    pub login_retry: Duration,
    /// Post-login shell configuration
    pub configure: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            probe: Duration::from_secs(5),
            login: Duration::from_secs(120),
            login_retry: Duration::from_secs(60),
            configure: Duration::from_secs(30),
        }
    }
}

/// Everything the login orchestrator needs
#[derive(Debug)]
pub struct LoginConfig {
    /// Who the console belongs to
    pub target: TargetIdentity,
    /// How to authenticate
    pub credentials: Credentials,
    /// Command turning the user shell into a root shell
    pub escalation_command: String,
    /// Geometry set after login
    pub terminal: TerminalSize,
    /// Console log level set after login
    pub kernel_log_level: u8,
    /// Stage budgets
    pub timeouts: Timeouts,
}

impl LoginConfig {
    /// Defaults for everything but the target.
    pub fn new(target: TargetIdentity) -> Self {
        Self {
            target,
            credentials: Credentials::default(),
            escalation_command: DEFAULT_ESCALATION_COMMAND.to_string(),
            terminal: TerminalSize::default(),
            kernel_log_level: DEFAULT_KERNEL_LOG_LEVEL,
            timeouts: Timeouts::default(),
        }
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&vars)
    }

    /// Read configuration from a key/value map.
    ///
    /// Only the target name is required; every other key falls back to its
    /// default when absent.
    pub fn from_map(raw: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let parser = MapParser { raw };

        let name = parser
            .string(TARGET_NAME_KEY)?
            .ok_or(ConfigError::MissingField(TARGET_NAME_KEY))?;
        let mut target = TargetIdentity::new(name);
        if let Some(aliases) = parser.list(TARGET_ALIASES_KEY) {
            target = target.with_aliases(aliases);
        }

        let mut config = Self::new(target);

        if let Some(username) = parser.string(USERNAME_KEY)? {
            config.credentials.username = username;
        }
        if let Some(password) = parser.string(PASSWORD_KEY)? {
            config.credentials.password = SecretString::from(password);
        }
        if let Some(command) = parser.string(ESCALATION_COMMAND_KEY)? {
            config.escalation_command = command;
        }
        if let Some(rows) = parser.number(TERMINAL_ROWS_KEY)? {
            config.terminal.rows = rows;
        }
        if let Some(cols) = parser.number(TERMINAL_COLS_KEY)? {
            config.terminal.cols = cols;
        }
        if let Some(level) = parser.number(KERNEL_LOG_LEVEL_KEY)? {
            config.kernel_log_level = level;
        }

        let timeouts = &mut config.timeouts;
        for (key, slot) in [
            (CONNECT_TIMEOUT_KEY, &mut timeouts.connect),
            (PROBE_TIMEOUT_KEY, &mut timeouts.probe),
            (LOGIN_TIMEOUT_KEY, &mut timeouts.login),
            (LOGIN_RETRY_TIMEOUT_KEY, &mut timeouts.login_retry),
            (CONFIGURE_TIMEOUT_KEY, &mut timeouts.configure),
        ] {
            if let Some(seconds) = parser.number::<u64>(key)? {
                *slot = Duration::from_secs(seconds);
            }
        }

        Ok(config)
    }
}

struct MapParser<'a> {
    raw: &'a HashMap<String, String>,
}

impl MapParser<'_> {
    /// Present values must be non-empty after trimming
    fn string(&self, key: &'static str) -> Result<Option<String>, ConfigError> {
        match self.raw.get(key) {
            None => Ok(None),
            Some(value) if value.trim().is_empty() => Err(ConfigError::IllegalField {
                key,
                value: value.clone(),
            }),
            Some(value) => Ok(Some(value.trim().to_string())),
        }
    }

    /// Positive integers only
    fn number<N>(&self, key: &'static str) -> Result<Option<N>, ConfigError>
    where
        N: std::str::FromStr + PartialOrd + Default,
    {
        let Some(value) = self.raw.get(key) else {
            return Ok(None);
        };

        match value.trim().parse::<N>() {
            Ok(n) if n > N::default() => Ok(Some(n)),
            _ => Err(ConfigError::IllegalField {
                key,
                value: value.clone(),
            }),
        }
    }

    /// Newline or comma separated, blanks dropped; absent or all-blank is `None`
    fn list(&self, key: &'static str) -> Option<Vec<String>> {
        let items: Vec<String> = self
            .raw
            .get(key)?
            .split(['\n', ','])
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();

        (!items.is_empty()).then_some(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_when_only_name_given() {
        let config = LoginConfig::from_map(&map(&[(TARGET_NAME_KEY, "vmi-latency")])).unwrap();

        assert_eq!(config.target.name(), "vmi-latency");
        assert_eq!(config.target.aliases(), ["localhost", "fedora"]);
        assert_eq!(config.credentials.username, "fedora");
        assert_eq!(config.credentials.password.expose_secret(), "fedora");
        assert_eq!(config.escalation_command, "sudo su");
        assert_eq!(config.terminal, TerminalSize { rows: 500, cols: 500 });
        assert_eq!(config.kernel_log_level, 1);
        assert_eq!(config.timeouts, Timeouts::default());
        assert_eq!(config.timeouts.login, Duration::from_secs(120));
        assert_eq!(config.timeouts.login_retry, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_name() {
        let err = LoginConfig::from_map(&map(&[(USERNAME_KEY, "cirros")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingField(TARGET_NAME_KEY));
    }

    #[test]
    fn test_empty_name_is_illegal() {
        let err = LoginConfig::from_map(&map(&[(TARGET_NAME_KEY, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::IllegalField { key, .. } if key == TARGET_NAME_KEY));
    }

    #[test]
    fn test_overrides() {
        let config = LoginConfig::from_map(&map(&[
            (TARGET_NAME_KEY, "vm1"),
            (TARGET_ALIASES_KEY, "localhost\ncirros, "),
            (USERNAME_KEY, "cirros"),
            (PASSWORD_KEY, "gocubsgo"),
            (ESCALATION_COMMAND_KEY, "sudo -i"),
            (TERMINAL_ROWS_KEY, "50"),
            (TERMINAL_COLS_KEY, "200"),
            (KERNEL_LOG_LEVEL_KEY, "3"),
            (LOGIN_TIMEOUT_KEY, "300"),
            (LOGIN_RETRY_TIMEOUT_KEY, "400"),
        ]))
        .unwrap();

        assert_eq!(config.target.aliases(), ["localhost", "cirros"]);
        assert_eq!(config.credentials.username, "cirros");
        assert_eq!(config.credentials.password.expose_secret(), "gocubsgo");
        assert_eq!(config.escalation_command, "sudo -i");
        assert_eq!(config.terminal, TerminalSize { rows: 50, cols: 200 });
        assert_eq!(config.kernel_log_level, 3);
        assert_eq!(config.timeouts.login, Duration::from_secs(300));
        assert_eq!(config.timeouts.login_retry, Duration::from_secs(400));
        assert_eq!(config.timeouts.connect, Duration::from_secs(10));
    }

    #[test]
    fn test_illegal_timeouts() {
        for value in ["abc", "0", "-5", "1.5"] {
            let err = LoginConfig::from_map(&map(&[
                (TARGET_NAME_KEY, "vm1"),
                (PROBE_TIMEOUT_KEY, value),
            ]))
            .unwrap_err();

            assert_eq!(
                err,
                ConfigError::IllegalField {
                    key: PROBE_TIMEOUT_KEY,
                    value: value.to_string(),
                }
            );
        }
    }

    #[test]
    fn test_blank_alias_list_keeps_defaults() {
        let config = LoginConfig::from_map(&map(&[
            (TARGET_NAME_KEY, "vm1"),
            (TARGET_ALIASES_KEY, " \n , "),
        ]))
        .unwrap();

        assert_eq!(config.target.aliases(), ["localhost", "fedora"]);
    }

    #[test]
    fn test_host_alternation() {
        let target = TargetIdentity::new("vm.1");
        assert_eq!(target.host_alternation(), r"(localhost|fedora|vm\.1)");
    }

    #[test]
    fn test_host_alternation_skips_duplicate_name() {
        let target = TargetIdentity::new("localhost").with_aliases(["localhost"]);
        assert_eq!(target.host_alternation(), "(localhost)");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ConfigError::MissingField(TARGET_NAME_KEY).to_string(),
            "CONSOLE_TARGET_NAME field is missing"
        );
    }
}
