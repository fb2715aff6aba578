use std::path::Path;
use std::time::Duration;

use colorizer_lib::{ColorizerError, Config, PipelineOptions};

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/colorizer/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, ColorizerError> {
    let cfg = Config::load(path).map_err(|e| {
        let loc = path
            .map(|p| p.display().to_string())
            .or_else(|| Config::central_config_path().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "defaults".to_string());
        ColorizerError::Config(format!("Failed to read config {}: {}", loc, e))
    })?;

    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        ColorizerError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Merge the `--colorize-timeout` flag with config, preferring the flag when given.
pub fn resolve_pipeline_options(
    cli_colorize_timeout: Option<u64>,
    config: &Config,
) -> Result<PipelineOptions, ColorizerError> {
    let mut options = PipelineOptions::from_config(config);
    if let Some(secs) = cli_colorize_timeout {
        if secs == 0 {
            return Err(ColorizerError::Config(
                "--colorize-timeout must be greater than zero".to_string(),
            ));
        }
        options.colorize_deadline = Some(Duration::from_secs(secs));
    }
    Ok(options)
}

/// Format effective config as a single-line string.
pub fn format_effective_config(
    config: &Config,
    options: &PipelineOptions,
    config_source: Option<&Path>,
) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    let deadline = options
        .colorize_deadline
        .map(|d| format!("{}s", d.as_secs()))
        .unwrap_or_else(|| "none".to_string());
    format!(
        "Effective config [{source}]: bucket={}, timeouts: http={}s, colorize={}, connectivity={}s, discard_staged_originals={}, probe={}:{}, state_dir={}",
        config.storage_bucket,
        config.timeouts.http.as_secs(),
        deadline,
        config.timeouts.connectivity.as_secs(),
        options.discard_staged_originals,
        config.pipeline.probe_host,
        config.pipeline.probe_port,
        config.paths.state_dir().display(),
    )
}

/// Log effective config (visible with --verbose).
pub fn log_effective_config(config: &Config, options: &PipelineOptions, config_path: Option<&Path>) {
    tracing::info!("{}", format_effective_config(config, options, config_path));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn pipeline_options_prefer_config_when_flag_absent() {
        let mut cfg = Config::default();
        cfg.timeouts.colorize = Duration::from_secs(90);
        cfg.pipeline.discard_staged_originals = false;

        let options = resolve_pipeline_options(None, &cfg).unwrap();
        assert_eq!(options.colorize_deadline, Some(Duration::from_secs(90)));
        assert!(!options.discard_staged_originals);
    }

    #[test]
    fn pipeline_options_prefer_cli_when_flag_present() {
        let options = resolve_pipeline_options(Some(15), &Config::default()).unwrap();
        assert_eq!(options.colorize_deadline, Some(Duration::from_secs(15)));
    }

    #[test]
    fn zero_timeout_flag_is_rejected() {
        let err = resolve_pipeline_options(Some(0), &Config::default()).unwrap_err();
        assert!(matches!(err, ColorizerError::Config(msg) if msg.contains("timeout")));
    }

    #[test]
    fn load_config_wraps_parse_failures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "timeouts = [").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ColorizerError::Config(msg) if msg.contains("bad.toml")));
    }

    #[test]
    fn load_config_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.toml");
        std::fs::write(&path, "[timeouts]\nhttp = \"0s\"\n").unwrap();
        let err = load_config(Some(&path)).unwrap_err();
        assert!(matches!(err, ColorizerError::Config(msg) if msg.contains("Invalid config")));
    }

    #[test]
    fn format_effective_config_includes_all_fields() {
        let mut cfg = Config::default();
        cfg.paths.state_dir = Some(PathBuf::from("/tmp/colorizer-state"));
        let options = PipelineOptions::from_config(&cfg);
        let summary = format_effective_config(&cfg, &options, Some(Path::new("colorizer.toml")));
        assert!(summary.contains("bucket=colorizer-app.appspot.com"));
        assert!(summary.contains("http=30s"));
        assert!(summary.contains("colorize=120s"));
        assert!(summary.contains("connectivity=5s"));
        assert!(summary.contains("discard_staged_originals=true"));
        assert!(summary.contains("probe=firebasestorage.googleapis.com:443"));
        assert!(summary.contains("/tmp/colorizer-state"));
        assert!(summary.contains("colorizer.toml"));
    }
}
