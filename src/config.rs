//! Configuration types for maintain-btrfs
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation
//! - The tunables shared by the maintenance actions

use crate::error::ConfigError;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// How often scrub and balance progress is sampled
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Periodic maintenance for btrfs filesystems
#[derive(Parser, Debug, Clone)]
#[command(
    name = "maintain-btrfs",
    about = "Scrub, defragment, balance and trim btrfs filesystems",
    long_about = "Runs the periodic maintenance actions on each given btrfs mount point.\n\n\
                  Actions run in order: scrub, device statistics, defragment, balance, trim.\n\
                  The exit status is success only if every action succeeded on every mount point.",
    after_help = "EXAMPLES:\n    \
        maintain-btrfs /\n    \
        maintain-btrfs --no-defragment -v / /home\n    \
        maintain-btrfs --no-scrub --no-balance /mnt/pool",
    disable_version_flag = true
)]
pub struct CliArgs {
    /// Mount points of the filesystems to maintain
    #[arg(value_name = "MOUNTPOINT")]
    pub mountpoints: Vec<PathBuf>,

    /// Skip scrubbing
    #[arg(long)]
    pub no_scrub: bool,

    /// Skip defragmentation
    #[arg(long)]
    pub no_defragment: bool,

    /// Skip balancing
    #[arg(long)]
    pub no_balance: bool,

    /// Skip trimming
    #[arg(long)]
    pub no_trim: bool,

    /// Verbose output (progress, per-counter results and debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print version information and exit
    #[arg(short = 'V', long)]
    pub version: bool,
}

/// Which actions to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSet {
    pub scrub: bool,
    pub defragment: bool,
    pub balance: bool,
    pub trim: bool,
}

impl Default for ActionSet {
    fn default() -> Self {
        Self {
            scrub: true,
            defragment: true,
            balance: true,
            trim: true,
        }
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct MaintainConfig {
    /// Filesystems to maintain, in command-line order
    pub mountpoints: Vec<PathBuf>,

    /// Enabled actions (device statistics always run)
    pub actions: ActionSet,

    /// Verbose logging and progress display
    pub verbose: bool,

    /// Scrub/balance progress sampling interval
    pub progress_interval: Duration,
}

impl MaintainConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        if args.mountpoints.is_empty() {
            return Err(ConfigError::NoMountpoints);
        }

        if let Some(empty) = args.mountpoints.iter().find(|p| p.as_os_str().is_empty()) {
            return Err(ConfigError::InvalidMountpoint {
                path: empty.clone(),
                reason: "empty path".into(),
            });
        }

        Ok(Self {
            mountpoints: args.mountpoints,
            actions: ActionSet {
                scrub: !args.no_scrub,
                defragment: !args.no_defragment,
                balance: !args.no_balance,
                trim: !args.no_trim,
            },
            verbose: args.verbose,
            progress_interval: PROGRESS_INTERVAL,
        })
    }

    /// Progress sampling interval, if progress is shown at all
    pub fn sampling(&self) -> Option<Duration> {
        self.verbose.then_some(self.progress_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(std::iter::once("maintain-btrfs").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_defaults_enable_everything() {
        let config = MaintainConfig::from_args(parse(&["/mnt/pool"])).unwrap();
        assert_eq!(config.mountpoints, vec![PathBuf::from("/mnt/pool")]);
        assert_eq!(config.actions, ActionSet::default());
        assert!(!config.verbose);
        assert_eq!(config.sampling(), None);
    }

    #[test]
    fn test_disable_flags() {
        let config = MaintainConfig::from_args(parse(&[
            "--no-scrub",
            "--no-balance",
            "-v",
            "/",
            "/home",
        ]))
        .unwrap();

        assert!(!config.actions.scrub);
        assert!(config.actions.defragment);
        assert!(!config.actions.balance);
        assert!(config.actions.trim);
        assert_eq!(config.mountpoints.len(), 2);
        assert_eq!(config.sampling(), Some(PROGRESS_INTERVAL));
    }

    #[test]
    fn test_no_mountpoints_rejected() {
        let err = MaintainConfig::from_args(parse(&["--no-trim"])).unwrap_err();
        assert!(matches!(err, ConfigError::NoMountpoints));
    }

    #[test]
    fn test_empty_mountpoint_rejected() {
        let err = MaintainConfig::from_args(parse(&["/mnt", ""])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidMountpoint { .. }));
    }

    #[test]
    fn test_version_flag() {
        let args = parse(&["-V"]);
        assert!(args.version);
        assert!(args.mountpoints.is_empty());
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(CliArgs::try_parse_from(["maintain-btrfs", "--frobnicate", "/"]).is_err());
    }
}
