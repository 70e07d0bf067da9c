use clap::{Args, Parser, Subcommand, ValueEnum};

/// Top-level CLI parser for the `vigil` binary.
#[derive(Debug, Parser)]
#[command(name = "vigil", version, about = "Vigil - continuous sanctions screening")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// Single-line JSON.
    Raw,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Look for new watchlist versions and apply their deltas.
    ScanDatasets(DrainArgs),
    /// Apply one downloaded watchlist delta to one organization.
    ApplyDelta(ApplyDeltaArgs),
    /// Export the next dataset file of an organization.
    BuildDataset(OrgArgs),
    /// Print the catalog of exported organization datasets.
    Catalog,
    /// Print the recent delta files of an organization.
    DeltaList(OrgArgs),
    /// List the matching algorithms offered by the provider.
    Algorithms,
}

#[derive(Clone, Debug, Args)]
pub struct DrainArgs {
    /// Only queue follow-up jobs, do not run them
    #[arg(long)]
    pub no_drain: bool,
}

#[derive(Clone, Debug, Args)]
pub struct ApplyDeltaArgs {
    /// Dataset update job id
    #[arg(long)]
    pub job: String,

    #[command(flatten)]
    pub drain: DrainArgs,
}

#[derive(Clone, Debug, Args)]
pub struct OrgArgs {
    /// Organization id
    #[arg(long)]
    pub org: String,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};
    use pretty_assertions::assert_eq;

    use super::{Cli, Commands, OutputFormat};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn apply_delta_requires_a_job() {
        assert!(Cli::try_parse_from(["vigil", "apply-delta"]).is_err());

        let cli = Cli::try_parse_from(["vigil", "apply-delta", "--job", "job-1", "--no-drain"])
            .expect("cli should parse");
        let Commands::ApplyDelta(args) = cli.command else {
            panic!("expected apply-delta");
        };
        assert_eq!(args.job, "job-1");
        assert!(args.drain.no_drain);
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from(["vigil", "delta-list", "--org", "org-1", "--format", "raw", "-q"])
            .expect("cli should parse");
        assert_eq!(cli.format, OutputFormat::Raw);
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::DeltaList(ref args) if args.org == "org-1"));
    }

    #[test]
    fn output_format_rejects_invalid_value() {
        assert!(Cli::try_parse_from(["vigil", "--format", "table", "catalog"]).is_err());
    }
}
