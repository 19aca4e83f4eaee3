// src/config/validate.rs

use crate::config::model::{ConfigFile, DefaultSection, MirrorConfig, RawConfigFile};
use crate::errors::{MirrorError, Result};
use crate::pattern::Pattern;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = MirrorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.default, raw.mirror))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_mirrors(cfg)?;
    validate_defaults(&cfg.default)?;
    for (name, mirror) in cfg.mirror.iter() {
        validate_mirror(name, mirror, &cfg.default)?;
    }
    Ok(())
}

fn ensure_has_mirrors(cfg: &RawConfigFile) -> Result<()> {
    if cfg.mirror.is_empty() {
        return Err(MirrorError::ConfigError(
            "config must contain at least one [mirror.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_defaults(defaults: &DefaultSection) -> Result<()> {
    if defaults.max_concurrent_copies == Some(0) {
        return Err(MirrorError::ConfigError(
            "[default].max_concurrent_copies must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_mirror(name: &str, mirror: &MirrorConfig, defaults: &DefaultSection) -> Result<()> {
    if mirror.source.trim().is_empty() {
        return Err(MirrorError::ConfigError(format!(
            "mirror '{name}' has an empty `source`"
        )));
    }
    if mirror.dest.as_os_str().is_empty() {
        return Err(MirrorError::ConfigError(format!(
            "mirror '{name}' has an empty `dest`"
        )));
    }
    if mirror.max_concurrent_copies == Some(0) {
        return Err(MirrorError::ConfigError(format!(
            "mirror '{name}': max_concurrent_copies must be >= 1 (got 0)"
        )));
    }

    let options = mirror.effective_options(defaults);

    // Compiles the glob and every ignore glob; surfaces Match errors as-is.
    Pattern::new(&mirror.source, options.dereference, &options.ignore)?;

    options.transform_spec().map_err(|e| {
        MirrorError::ConfigError(format!("mirror '{name}': {e}"))
    })?;

    Ok(())
}
