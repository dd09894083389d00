//! Configuration management for the CLI

use anyhow::{Context, Result};
use doctor_lib::ScanConfig;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable prefix for scan settings
pub const ENV_PREFIX: &str = "POD_DOCTOR";

/// Load scan settings from defaults, a config file and the environment.
///
/// An explicit `path` must exist. Without one, the default location is used
/// when present. Environment variables (`POD_DOCTOR_EVENT_CONCURRENCY`,
/// `POD_DOCTOR_POLICY__INCLUDE_INIT_CONTAINERS`, ...) override the file.
pub fn load_scan_config(path: Option<&Path>) -> Result<ScanConfig> {
    let mut builder = config::Config::builder();

    match path {
        Some(path) => {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        None => {
            if let Some(default_path) = default_config_path() {
                builder = builder.add_source(config::File::from(default_path).required(false));
            }
        }
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to load configuration")?;

    settings
        .try_deserialize()
        .context("Invalid scan configuration")
}

/// `~/.config/pod-doctor/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("pod-doctor").join("config.json"))
}

/// Get kubeconfig paths
///
/// An explicit path wins. Otherwise `KUBECONFIG` is split like kubectl does
/// (`:` on Unix, `;` on Windows), falling back to `~/.kube/config`.
pub fn kubeconfig_paths(override_path: Option<&Path>) -> Result<Vec<PathBuf>> {
    kubeconfig_paths_from(override_path, std::env::var_os("KUBECONFIG"))
}

fn kubeconfig_paths_from(
    override_path: Option<&Path>,
    env_value: Option<OsString>,
) -> Result<Vec<PathBuf>> {
    if let Some(path) = override_path {
        return Ok(vec![path.to_path_buf()]);
    }

    if let Some(value) = env_value {
        let paths: Vec<PathBuf> = std::env::split_paths(&value)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        if !paths.is_empty() {
            return Ok(paths);
        }
    }

    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(vec![home.join(".kube").join("config")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctor_lib::anomaly::ContainerSelection;
    use std::io::Write;

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "event_concurrency": 2,
                "scan_timeout_secs": 30,
                "policy": {{
                    "waiting_reasons": ["CrashLoopBackOff"],
                    "container_selection": "first"
                }}
            }}"#
        )
        .unwrap();

        let config = load_scan_config(Some(file.path())).unwrap();
        assert_eq!(config.event_concurrency, 2);
        assert_eq!(config.scan_timeout_secs, Some(30));
        assert_eq!(config.policy.waiting_reasons, vec!["CrashLoopBackOff"]);
        assert_eq!(config.policy.container_selection, ContainerSelection::First);
        // Untouched fields keep their defaults
        assert_eq!(config.policy.healthy_phases, vec!["Running", "Succeeded"]);
        assert_eq!(config.retry_attempts, 3);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(load_scan_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_kubeconfig_override_wins() {
        let env = std::env::join_paths(["/tmp/a.yaml", "/tmp/b.yaml"]).unwrap();
        let paths = kubeconfig_paths_from(Some(Path::new("/tmp/kc.yaml")), Some(env)).unwrap();
        assert_eq!(paths, vec![PathBuf::from("/tmp/kc.yaml")]);
    }

    #[test]
    fn test_kubeconfig_env_list_is_split() {
        let env = std::env::join_paths(["/tmp/a.yaml", "", "/tmp/b.yaml"]).unwrap();
        let paths = kubeconfig_paths_from(None, Some(env)).unwrap();
        assert_eq!(
            paths,
            vec![PathBuf::from("/tmp/a.yaml"), PathBuf::from("/tmp/b.yaml")]
        );
    }

    #[test]
    fn test_empty_kubeconfig_env_uses_home() {
        let paths = kubeconfig_paths_from(None, Some(OsString::new())).unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with(".kube/config"));
    }
}
