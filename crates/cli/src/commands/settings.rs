//! `mapek config` subcommands

use anyhow::{Context, Result};
use colored::Colorize;
use controller_lib::PolicyKind;
use url::Url;

use crate::config::{Config, DEFAULT_BASE_URL, DEFAULT_DAEMON_URL};
use crate::output::{print_json, print_success, OutputFormat};

pub fn show(config: Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&config),
        OutputFormat::Table => {
            let or_default = |value: &Option<String>, default: &str| match value {
                Some(v) => v.clone(),
                None => format!("{} {}", default, "(default)".dimmed()),
            };
            println!("{}", "CLI Configuration".bold());
            println!("{}", "=".repeat(50));
            println!("Base URL:    {}", or_default(&config.base_url, DEFAULT_BASE_URL));
            println!("Daemon URL:  {}", or_default(&config.daemon_url, DEFAULT_DAEMON_URL));
            println!(
                "Policy:      {}",
                or_default(&config.default_policy, PolicyKind::default().as_str())
            );
            println!("File:        {}", Config::config_path()?.display());
        }
    }
    Ok(())
}

fn checked_url(url: &str) -> Result<String> {
    Url::parse(url).with_context(|| format!("Invalid URL '{}'", url))?;
    Ok(url.to_string())
}

pub fn set_base_url(mut config: Config, url: &str) -> Result<()> {
    config.base_url = Some(checked_url(url)?);
    let path = config.save()?;
    print_success(&format!("Base URL set to {} ({})", url, path.display()));
    Ok(())
}

pub fn set_daemon_url(mut config: Config, url: &str) -> Result<()> {
    config.daemon_url = Some(checked_url(url)?);
    let path = config.save()?;
    print_success(&format!("Daemon URL set to {} ({})", url, path.display()));
    Ok(())
}

pub fn set_policy(mut config: Config, policy: PolicyKind) -> Result<()> {
    config.default_policy = Some(policy.as_str().to_string());
    let path = config.save()?;
    print_success(&format!("Default policy set to {} ({})", policy, path.display()));
    Ok(())
}
