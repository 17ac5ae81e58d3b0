//! Shared helpers for CLI commands: project root resolution and session setup.

use std::path::{Path, PathBuf};

use stabil_cache::{Session, SessionConfig};
use stabil_config::{ProjectConfig, CONFIG_FILE};

use crate::GlobalArgs;

/// Walks up from `start` looking for the nearest directory containing `stabil.toml`.
///
/// The configuration file is optional, so `start` itself is the root when
/// no ancestor has one.
pub fn find_project_root(start: &Path) -> PathBuf {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).is_file() {
            return current;
        }
        if !current.pop() {
            return start.to_path_buf();
        }
    }
}

/// Resolves the project root and its configuration from global CLI args.
///
/// If `--config` names a file, that file is loaded and its directory is the
/// root. If it names a directory, that directory is the root. Otherwise the
/// root is found by walking up from the current directory.
pub fn resolve_project(
    global: &GlobalArgs,
) -> Result<(PathBuf, ProjectConfig), Box<dyn std::error::Error>> {
    let (root, config) = match global.config {
        Some(ref config_path) => {
            let p = PathBuf::from(config_path);
            if p.is_file() {
                let content = std::fs::read_to_string(&p)?;
                let root = p
                    .parent()
                    .filter(|d| !d.as_os_str().is_empty())
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."));
                (root, stabil_config::load_config_from_str(&content)?)
            } else {
                let config = stabil_config::load_config_or_default(&p)?;
                (p, config)
            }
        }
        None => {
            let root = find_project_root(&std::env::current_dir()?);
            let config = stabil_config::load_config_or_default(&root)?;
            (root, config)
        }
    };
    let root = std::fs::canonicalize(&root)
        .map_err(|e| format!("cannot resolve project root {}: {e}", root.display()))?;
    Ok((root, config))
}

/// Builds the session settings for `root` from the project configuration.
pub fn session_config(root: &Path, config: &ProjectConfig) -> SessionConfig {
    SessionConfig {
        root: root.to_path_buf(),
        data_path: config.data.resolve_path(root),
        environment: config.data.environment.clone(),
        block_policy: config.tracking.block_policy,
        track_dirs: config.tracking.dirs.clone(),
    }
}

/// Resolves the project and opens its session.
pub fn open_session(global: &GlobalArgs) -> Result<Session, Box<dyn std::error::Error>> {
    let (root, config) = resolve_project(global)?;
    Ok(Session::open(session_config(&root, &config))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn global_with(config: Option<String>) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            config,
        }
    }

    #[test]
    fn find_project_root_in_parent() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "").unwrap();
        let sub = tmp.path().join("tests/unit");
        fs::create_dir_all(&sub).unwrap();
        assert_eq!(find_project_root(&sub), tmp.path());
    }

    #[test]
    fn find_project_root_falls_back_to_start() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("pkg");
        fs::create_dir_all(&sub).unwrap();
        assert_eq!(find_project_root(&sub), sub);
    }

    #[test]
    fn resolve_project_from_config_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("custom.toml");
        fs::write(&config_path, "[data]\nenvironment = \"ci\"\n").unwrap();

        let global = global_with(Some(config_path.to_str().unwrap().to_string()));
        let (root, config) = resolve_project(&global).unwrap();
        assert_eq!(root, fs::canonicalize(tmp.path()).unwrap());
        assert_eq!(config.data.environment, "ci");
    }

    #[test]
    fn resolve_project_from_dir_without_config() {
        let tmp = TempDir::new().unwrap();
        let global = global_with(Some(tmp.path().to_str().unwrap().to_string()));
        let (root, config) = resolve_project(&global).unwrap();
        assert_eq!(root, fs::canonicalize(tmp.path()).unwrap());
        assert_eq!(config.data.environment, "default");
    }

    #[test]
    fn invalid_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILE), "[data]\nenvironment = \"\"\n").unwrap();
        let global = global_with(Some(tmp.path().to_str().unwrap().to_string()));
        assert!(resolve_project(&global).is_err());
    }

    #[test]
    fn session_config_resolves_data_path() {
        let config = stabil_config::load_config_from_str(
            "[data]\npath = \"cache/db\"\n[tracking]\ndirs = [\"src\"]\n",
        )
        .unwrap();
        let session = session_config(Path::new("/proj"), &config);
        assert_eq!(session.data_path, PathBuf::from("/proj/cache/db"));
        assert_eq!(session.track_dirs, vec![PathBuf::from("src")]);
        assert!(session.tracks("src/a.py"));
        assert!(!session.tracks("tests/a.py"));
    }
}
