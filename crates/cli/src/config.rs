use std::path::PathBuf;

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "./shelfmark-data";

/// CLI configuration loaded from environment variables.
///
/// Command-line flags are applied on top with [`CliConfig::with_data_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Directory holding the `inventory` and `preGeneratedQRs` blobs.
    pub data_dir: PathBuf,
    /// Prefix used by `pool generate` when none is given.
    pub pool_prefix: Option<String>,
}

impl CliConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default            |
    /// |-------------------------|--------------------|
    /// | `SHELFMARK_DATA_DIR`    | `./shelfmark-data` |
    /// | `SHELFMARK_POOL_PREFIX` | unset              |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = non_blank("SHELFMARK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let pool_prefix = non_blank("SHELFMARK_POOL_PREFIX");

        Self {
            data_dir,
            pool_prefix,
        }
    }

    /// Override the data directory when a flag was given.
    pub fn with_data_dir(mut self, data_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = CliConfig::from_lookup(lookup(&[]));
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.pool_prefix, None);
    }

    #[test]
    fn reads_env_values_and_ignores_blank() {
        let config = CliConfig::from_lookup(lookup(&[
            ("SHELFMARK_DATA_DIR", "/var/lib/shelfmark"),
            ("SHELFMARK_POOL_PREFIX", "  "),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/shelfmark"));
        assert_eq!(config.pool_prefix, None);
    }

    #[test]
    fn flag_overrides_env() {
        let config = CliConfig::from_lookup(lookup(&[("SHELFMARK_DATA_DIR", "/env")]))
            .with_data_dir(Some(PathBuf::from("/flag")));
        assert_eq!(config.data_dir, PathBuf::from("/flag"));
    }
}
