use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "stakeploy")]
#[command(
    author,
    version,
    about = "Deploy the reward token and staking contracts, skipping what is already deployed"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "STAKEPLOY_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Only run the units carrying one of these tags (comma separated).
    ///
    /// Dependencies of the selected units always run first. If not provided, or if the
    /// `all` tag is given, every unit runs.
    #[arg(short, long, env = "STAKEPLOY_TAGS", value_delimiter = ',')]
    pub tags: Vec<String>,

    /// The network to deploy to, as declared in the configuration file.
    ///
    /// If not provided, the configured default network is used.
    #[arg(short, long, env = "STAKEPLOY_NETWORK")]
    pub network: Option<String>,

    /// Redeploy all contracts.
    /// If not provided, contracts whose bytecode did not change since their last deployment are skipped.
    #[arg(long, env = "STAKEPLOY_REDEPLOY", default_value_t = false)]
    pub redeploy: bool,

    /// Forget every recorded deployment of the network before deploying.
    #[arg(long, env = "STAKEPLOY_RESET", default_value_t = false)]
    pub reset: bool,

    /// Path to the configuration file (or to the directory holding Stakeploy.toml).
    ///
    /// If not provided, ./Stakeploy.toml is used when it exists.
    #[arg(long, alias = "conf", env = "STAKEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the directory of the address registry.
    #[arg(long, env = "STAKEPLOY_DEPLOYMENTS_DIR")]
    pub deployments_dir: Option<PathBuf>,

    /// Override the directory of the compiled contract artifacts.
    #[arg(long, env = "STAKEPLOY_ARTIFACTS_DIR")]
    pub artifacts_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_comma_separated() {
        let cli = Cli::try_parse_from(["stakeploy", "--tags", "rewardToken,stakingToken"]).unwrap();

        assert_eq!(cli.tags, ["rewardToken", "stakingToken"]);
        assert!(!cli.redeploy);
        assert_eq!(cli.verbosity, LevelFilter::INFO);
    }

    #[test]
    fn test_redeploy_and_network_flags() {
        let cli = Cli::try_parse_from([
            "stakeploy",
            "--network",
            "sepolia",
            "--redeploy",
            "--reset",
            "-v",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.network.as_deref(), Some("sepolia"));
        assert!(cli.redeploy);
        assert!(cli.reset);
        assert_eq!(cli.verbosity, LevelFilter::DEBUG);
        assert!(cli.tags.is_empty());
    }
}
