//! The `config` command.

use crate::config;

/// Print the config path and effective values; `init` writes defaults.
pub fn cmd_config(init: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if init {
        match &path {
            Some(p) if p.exists() => println!("Config already exists at {}", p.display()),
            _ => {
                let written = config::save(&config::Config::default())?;
                println!("Wrote default config to {}", written.display());
            }
        }
    }

    match &path {
        Some(p) => println!("# {}", p.display()),
        None => println!("# (no config directory on this platform)"),
    }

    let mut effective = config::load();
    // Never echo secrets
    if effective.credentials.client_secret.is_some() {
        effective.credentials.client_secret = Some("********".to_string());
    }
    println!("{}", toml::to_string_pretty(&effective)?);
    Ok(())
}
