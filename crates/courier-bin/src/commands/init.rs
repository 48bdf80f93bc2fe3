//! Deployment bootstrap.

use anyhow::Result;
use courier_config_and_utils::{Config, Paths};

/// Create the runtime directories and write `config.json` with the
/// settings in effect. An existing file is kept unless `force` is set.
pub fn init(config: &Config, paths: &Paths, force: bool) -> Result<()> {
    paths.ensure_dirs()?;

    let config_file = paths.config_file();
    if config_file.exists() && !force {
        println!("Config already exists at {}", config_file.display());
        return Ok(());
    }

    config.save(paths)?;
    println!("Wrote {}", config_file.display());
    Ok(())
}
