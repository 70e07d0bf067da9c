mod datasets;
mod provider;

use crate::cli::{Commands, OutputFormat};
use crate::context::AppContext;

/// Dispatch a parsed command to its handler.
pub async fn dispatch(command: Commands, ctx: &AppContext, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        Commands::ScanDatasets(args) => datasets::scan(&args, ctx, format).await,
        Commands::ApplyDelta(args) => datasets::apply(&args, ctx, format).await,
        Commands::BuildDataset(args) => datasets::build(&args, ctx, format).await,
        Commands::Catalog => datasets::catalog(ctx, format).await,
        Commands::DeltaList(args) => datasets::delta_list(&args, ctx, format).await,
        Commands::Algorithms => provider::algorithms(ctx, format).await,
    }
}
