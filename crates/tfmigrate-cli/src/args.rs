//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;
use tfmigrate_core::app::config::DEFAULT_WORKERS;
use tfmigrate_core::impls::{bitbucket, tfe};

#[derive(Parser, Debug)]
#[command(
    name = "tfmigrate",
    version,
    about = "Migrate Terraform state files from S3 into Terraform Enterprise workspaces"
)]
pub struct Args {
    /// CSV file listing the states to migrate (no header row)
    #[arg(long, value_name = "PATH")]
    pub input: PathBuf,

    /// Organization that will contain the new workspaces
    #[arg(long, value_name = "NAME")]
    pub organization: String,

    /// Also rewrite the backend block of each configuration in Bitbucket.
    /// Input records then have 7 fields instead of 3.
    #[arg(long, default_value_t = false)]
    pub update_backend: bool,

    #[arg(long, value_name = "N", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Deadline for each network call, in seconds
    #[arg(long, value_name = "SECS")]
    pub stage_timeout: Option<u64>,

    /// Write a JSON report of every task to this path
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Exit with status 2 unless every task was fully migrated
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    /// Log filter, e.g. `info` or `tfmigrate_core=debug` (overrides RUST_LOG)
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    #[arg(long, env = "TFE_ADDRESS", default_value = tfe::DEFAULT_ADDRESS)]
    pub tfe_address: String,

    #[arg(long, env = "TFE_TOKEN", hide_env_values = true)]
    pub tfe_token: String,

    #[arg(long, env = "BITBUCKET_ADDRESS", default_value = bitbucket::DEFAULT_ADDRESS)]
    pub bitbucket_address: String,

    /// Required with --update-backend
    #[arg(long, env = "BITBUCKET_TOKEN", hide_env_values = true)]
    pub bitbucket_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec![
            "tfmigrate",
            "--input",
            "states.csv",
            "--organization",
            "acme",
            "--tfe-token",
            "secret",
        ];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args.input, PathBuf::from("states.csv"));
        assert_eq!(args.organization, "acme");
        assert_eq!(args.workers, DEFAULT_WORKERS);
        assert!(!args.update_backend);
        assert!(!args.strict);
        assert_eq!(args.stage_timeout, None);
        assert_eq!(args.report, None);
    }

    #[test]
    fn all_flags() {
        let args = parse(&[
            "--update-backend",
            "--workers",
            "3",
            "--stage-timeout",
            "30",
            "--report",
            "out.json",
            "--strict",
            "--log-level",
            "debug",
            "--tfe-address",
            "https://tfe.example.com",
            "--bitbucket-token",
            "bb",
        ])
        .unwrap();
        assert!(args.update_backend);
        assert_eq!(args.workers, 3);
        assert_eq!(args.stage_timeout, Some(30));
        assert_eq!(args.report, Some(PathBuf::from("out.json")));
        assert!(args.strict);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.tfe_address, "https://tfe.example.com");
        assert_eq!(args.bitbucket_token.as_deref(), Some("bb"));
    }

    #[test]
    fn input_and_organization_are_required() {
        assert!(
            Args::try_parse_from(["tfmigrate", "--organization", "acme", "--tfe-token", "t"])
                .is_err()
        );
        assert!(Args::try_parse_from(["tfmigrate", "--input", "x.csv", "--tfe-token", "t"]).is_err());
    }

    #[test]
    fn workers_must_be_a_number() {
        assert!(parse(&["--workers", "many"]).is_err());
    }
}
