//! Author identity resolution for CLI commands.
//!
//! The resolution chain: `--author` flag > `STORYFORK_AUTHOR` env > user
//! config `author` > `USER` env (TTY only) > anonymous. Writing never
//! requires a name; unattributed work is credited to the anonymous identity.

use std::env;
use storyfork_core::model::Identity;

/// Environment reader trait for dependency injection in tests.
trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

/// Real environment reader.
struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_name_with(
    cli_flag: Option<&str>,
    configured: Option<&str>,
    env: &dyn EnvReader,
) -> Option<String> {
    if let Some(name) = cli_flag.filter(|n| !n.trim().is_empty()) {
        return Some(name.to_string());
    }

    if let Some(val) = env.get("STORYFORK_AUTHOR") {
        return Some(val);
    }

    if let Some(name) = configured.filter(|n| !n.trim().is_empty()) {
        return Some(name.to_string());
    }

    // USER only counts when a person is at the keyboard.
    if env.is_tty() {
        if let Some(val) = env.get("USER") {
            return Some(val);
        }
    }

    None
}

fn identity_for(name: Option<String>) -> Identity {
    name.and_then(|n| Identity::new(&n, &n).ok())
        .unwrap_or_else(Identity::anonymous)
}

/// Resolve who is writing, falling back to [`Identity::anonymous`].
pub fn resolve_author(cli_flag: Option<&str>, configured: Option<&str>) -> Identity {
    identity_for(resolve_name_with(cli_flag, configured, &RealEnv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Test environment reader with configurable values.
    struct MockEnv {
        vars: HashMap<String, String>,
        tty: bool,
    }

    impl MockEnv {
        fn new() -> Self {
            Self {
                vars: HashMap::new(),
                tty: false,
            }
        }

        fn var(mut self, key: &str, val: &str) -> Self {
            self.vars.insert(key.to_string(), val.to_string());
            self
        }

        const fn tty(mut self) -> Self {
            self.tty = true;
            self
        }
    }

    impl EnvReader for MockEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.vars.get(key).filter(|v| !v.is_empty()).cloned()
        }

        fn is_tty(&self) -> bool {
            self.tty
        }
    }

    #[test]
    fn cli_flag_takes_priority() {
        let env = MockEnv::new().var("STORYFORK_AUTHOR", "env-name").tty();
        let got = resolve_name_with(Some("flag-name"), Some("cfg-name"), &env);
        assert_eq!(got.as_deref(), Some("flag-name"));
    }

    #[test]
    fn env_beats_config() {
        let env = MockEnv::new().var("STORYFORK_AUTHOR", "env-name");
        let got = resolve_name_with(None, Some("cfg-name"), &env);
        assert_eq!(got.as_deref(), Some("env-name"));
    }

    #[test]
    fn config_beats_user() {
        let env = MockEnv::new().var("USER", "login").tty();
        let got = resolve_name_with(None, Some("cfg-name"), &env);
        assert_eq!(got.as_deref(), Some("cfg-name"));
    }

    #[test]
    fn user_only_on_tty() {
        let piped = MockEnv::new().var("USER", "login");
        assert_eq!(resolve_name_with(None, None, &piped), None);

        let tty = MockEnv::new().var("USER", "login").tty();
        assert_eq!(resolve_name_with(None, None, &tty).as_deref(), Some("login"));
    }

    #[test]
    fn blank_flag_is_ignored() {
        let env = MockEnv::new();
        assert_eq!(resolve_name_with(Some("  "), None, &env), None);
    }

    #[test]
    fn nothing_resolved_is_anonymous() {
        assert!(identity_for(None).is_anonymous());
        let named = identity_for(Some("Ada".into()));
        assert_eq!(named.display_name, "Ada");
        assert!(!named.is_anonymous());
    }
}
