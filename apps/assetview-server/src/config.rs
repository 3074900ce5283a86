use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub const PRODUCTION: &str = "production";
pub const DEFAULT_MODE: &str = "development";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_STATIC_DIR: &str = "client/build";

pub const PORT_VAR: &str = "PORT";
pub const MODE_VAR: &str = "NODE_ENV";
pub const STATIC_DIR_VAR: &str = "STATIC_DIR";

/// Server settings resolved from flags, the environment and `.env`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub mode: String,
    /// Built front-end, served as-is in production.
    pub static_dir: PathBuf,
}

/// Values given on the command line; they win over every variable.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub port: Option<u16>,
    pub mode: Option<String>,
    pub static_dir: Option<PathBuf>,
}

impl ServerConfig {
    pub fn is_production(&self) -> bool {
        self.mode == PRODUCTION
    }

    /// Resolve each setting from `overrides`, then `vars`, then the default.
    pub fn resolve(overrides: Overrides, vars: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match overrides.port {
            Some(port) => port,
            None => match vars(PORT_VAR) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{PORT_VAR}={raw:?} is not a port number"))?,
                None => DEFAULT_PORT,
            },
        };
        let mode = overrides
            .mode
            .or_else(|| vars(MODE_VAR))
            .unwrap_or_else(|| DEFAULT_MODE.to_string());
        let static_dir = overrides
            .static_dir
            .or_else(|| vars(STATIC_DIR_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));
        Ok(Self {
            port,
            mode,
            static_dir,
        })
    }
}

/// Read `KEY=value` pairs from a dotenv file. A missing file yields no pairs.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) if err.not_found() => return Ok(HashMap::new()),
        Err(err) => return Err(err).with_context(|| format!("read {}", path.display())),
    };
    iter.collect::<Result<HashMap<_, _>, _>>()
        .with_context(|| format!("parse {}", path.display()))
}

/// Process environment first, then the dotenv file.
pub fn layered(file: HashMap<String, String>) -> impl Fn(&str) -> Option<String> {
    move |key| std::env::var(key).ok().or_else(|| file.get(key).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_flags_or_variables() {
        let config = ServerConfig::resolve(Overrides::default(), vars(&[])).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.mode, "development");
        assert_eq!(config.static_dir, PathBuf::from("client/build"));
        assert!(!config.is_production());
    }

    #[test]
    fn node_env_selects_production() {
        let config =
            ServerConfig::resolve(Overrides::default(), vars(&[("NODE_ENV", "production")]))
                .unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn flags_win_over_variables() {
        let overrides = Overrides {
            port: Some(8080),
            mode: Some("staging".into()),
            static_dir: None,
        };
        let config = ServerConfig::resolve(
            overrides,
            vars(&[("NODE_ENV", "production"), ("PORT", "7000"), ("STATIC_DIR", "dist")]),
        )
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.mode, "staging");
        assert_eq!(config.static_dir, PathBuf::from("dist"));
    }

    #[test]
    fn malformed_port_is_an_error() {
        let err = ServerConfig::resolve(Overrides::default(), vars(&[("PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn env_file_supplies_mode_and_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "# deployment\nNODE_ENV=production\nPORT=7000\n").unwrap();

        let file = read_env_file(&path).unwrap();
        let config =
            ServerConfig::resolve(Overrides::default(), |key| file.get(key).cloned()).unwrap();
        assert!(config.is_production());
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn missing_env_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_env_file(&dir.path().join(".env")).unwrap().is_empty());
    }

    #[test]
    fn process_environment_shadows_env_file() {
        // PATH is set in any test environment; the file value must lose.
        let file = HashMap::from([("PATH".to_string(), "from-file".to_string())]);
        let lookup = layered(file);
        assert_ne!(lookup("PATH").as_deref(), Some("from-file"));

        let file = HashMap::from([("ASSETVIEW_UNSET_FOR_TEST".to_string(), "x".to_string())]);
        assert_eq!(layered(file)("ASSETVIEW_UNSET_FOR_TEST").as_deref(), Some("x"));
    }
}
