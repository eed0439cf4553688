//! Where jobsync keeps its settings and, by default, its state store
//!
//! Each directory resolves from the first of:
//! 1. its `JOBSYNC_*` override, with `~` and `$VAR` expanded
//! 2. the matching XDG base directory, plus `jobsync`
//! 3. a default below the home directory
//!
//! | Directory | Override             | XDG               | Default                  |
//! |-----------|----------------------|-------------------|--------------------------|
//! | config    | `JOBSYNC_CONFIG_DIR` | `XDG_CONFIG_HOME` | `~/.config/jobsync`      |
//! | state     | `JOBSYNC_STATE_DIR`  | `XDG_STATE_HOME`  | `~/.local/state/jobsync` |

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "JOBSYNC_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "JOBSYNC_STATE_DIR";

const APP_DIR: &str = "jobsync";

/// Name of the settings file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// How one per-user directory is located
struct DirSpec {
    kind: &'static str,
    override_var: &'static str,
    xdg_var: &'static str,
    /// Components below the home directory when neither variable is set
    home_default: &'static [&'static str],
}

const CONFIG: DirSpec = DirSpec {
    kind: "config",
    override_var: ENV_CONFIG_DIR,
    xdg_var: "XDG_CONFIG_HOME",
    home_default: &[".config"],
};

const STATE: DirSpec = DirSpec {
    kind: "state",
    override_var: ENV_STATE_DIR,
    xdg_var: "XDG_STATE_HOME",
    home_default: &[".local", "state"],
};

impl DirSpec {
    fn resolve(&self) -> Result<PathBuf> {
        if let Ok(dir) = std::env::var(self.override_var) {
            let path = expand(&dir);
            log::debug!(
                "Using {} dir from {}: {}",
                self.kind,
                self.override_var,
                path.display()
            );
            return Ok(path);
        }

        if let Ok(base) = std::env::var(self.xdg_var) {
            let path = Path::new(&base).join(APP_DIR);
            log::debug!(
                "Using {} dir from {}: {}",
                self.kind,
                self.xdg_var,
                path.display()
            );
            return Ok(path);
        }

        let home = dirs::home_dir().context("Could not determine home directory")?;
        let path = self
            .home_default
            .iter()
            .fold(home, |path, part| path.join(part))
            .join(APP_DIR);
        log::debug!("Using default {} dir: {}", self.kind, path.display());
        Ok(path)
    }
}

/// Directory holding `config.toml`
pub fn config_dir() -> Result<PathBuf> {
    CONFIG.resolve()
}

/// Default root of the filesystem state store
pub fn state_dir() -> Result<PathBuf> {
    STATE.resolve()
}

/// Default location of the settings file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as-is.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Exclusive access to the process environment for one test.
    ///
    /// Variables changed through the guard are restored when it drops.
    struct EnvGuard {
        _lock: MutexGuard<'static, ()>,
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self {
                _lock: ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner),
                saved: Vec::new(),
            }
        }

        fn save(&mut self, key: &'static str) {
            if !self.saved.iter().any(|(saved, _)| *saved == key) {
                self.saved.push((key, env::var(key).ok()));
            }
        }

        fn set(&mut self, key: &'static str, value: &str) {
            self.save(key);
            // SAFETY: ENV_LOCK serializes every test that touches the environment
            unsafe { env::set_var(key, value) };
        }

        fn unset(&mut self, key: &'static str) {
            self.save(key);
            // SAFETY: as above
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..).rev() {
                // SAFETY: the lock is still held until this guard is gone
                match value {
                    Some(value) => unsafe { env::set_var(key, value) },
                    None => unsafe { env::remove_var(key) },
                }
            }
        }
    }

    #[test]
    fn test_override_wins_and_is_expanded() {
        let mut env = EnvGuard::new();
        env.set(ENV_CONFIG_DIR, "~/ops/jobsync");
        env.set("XDG_CONFIG_HOME", "/xdg/config");

        let home = dirs::home_dir().unwrap();
        assert_eq!(config_dir().unwrap(), home.join("ops").join("jobsync"));
        assert_eq!(
            config_file().unwrap(),
            home.join("ops").join("jobsync").join("config.toml")
        );
    }

    #[test]
    fn test_state_dir_override() {
        let mut env = EnvGuard::new();
        env.set(ENV_STATE_DIR, "/srv/jobsync-state");

        assert_eq!(state_dir().unwrap(), PathBuf::from("/srv/jobsync-state"));
    }

    #[test]
    fn test_xdg_base_gets_app_dir() {
        let mut env = EnvGuard::new();
        env.unset(ENV_STATE_DIR);
        env.set("XDG_STATE_HOME", "/tmp/xdg-state");

        assert_eq!(state_dir().unwrap(), PathBuf::from("/tmp/xdg-state/jobsync"));
    }

    #[test]
    fn test_home_default() {
        let mut env = EnvGuard::new();
        env.unset(ENV_STATE_DIR);
        env.unset("XDG_STATE_HOME");

        let home = dirs::home_dir().unwrap();
        assert_eq!(
            state_dir().unwrap(),
            home.join(".local").join("state").join("jobsync")
        );
    }

    #[test]
    fn test_expand_env_var_and_unknown_var() {
        let mut env = EnvGuard::new();
        env.set("JOBSYNC_TEST_BUCKET", "nightly");

        assert_eq!(
            expand("/state/$JOBSYNC_TEST_BUCKET/current"),
            PathBuf::from("/state/nightly/current")
        );
        assert_eq!(
            expand("/state/$JOBSYNC_UNSET_12345/current"),
            PathBuf::from("/state/$JOBSYNC_UNSET_12345/current")
        );
    }
}
