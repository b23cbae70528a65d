//! Turns parsed arguments into a `MigrationConfig` and client credentials.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use tfmigrate_core::app::MigrationConfig;
use url::Url;

use crate::args::Args;

/// Host component of the API address, written into rewritten backend blocks.
pub fn hostname_from_address(address: &str) -> Result<String> {
    let url = Url::parse(address)
        .with_context(|| format!("error parsing the TFE address {address:?}"))?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_string()),
        _ => bail!("TFE address {address:?} has no hostname"),
    }
}

pub fn migration_config(args: &Args) -> Result<MigrationConfig> {
    if args.organization.trim().is_empty() {
        bail!("--organization must not be empty");
    }
    if args.tfe_token.trim().is_empty() {
        bail!("required TFE token not found (set TFE_TOKEN)");
    }

    let mut config = MigrationConfig::new(args.organization.clone())
        .with_hostname(hostname_from_address(&args.tfe_address)?)
        .with_workers(args.workers)
        .with_backend_update(args.update_backend);
    if let Some(secs) = args.stage_timeout {
        config = config.with_stage_timeout(Duration::from_secs(secs));
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// The Bitbucket token; only needed when backend updates are enabled.
pub fn bitbucket_token(args: &Args) -> Result<&str> {
    match args.bitbucket_token.as_deref() {
        Some(token) if !token.trim().is_empty() => Ok(token),
        _ => bail!("required Bitbucket token not found (set BITBUCKET_TOKEN)"),
    }
}
