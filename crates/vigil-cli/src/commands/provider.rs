use anyhow::bail;

use crate::cli::OutputFormat;
use crate::context::AppContext;
use crate::output::output;

pub async fn algorithms(ctx: &AppContext, format: OutputFormat) -> anyhow::Result<()> {
    if !ctx.provider.is_configured() {
        bail!("no screening provider configured (set VIGIL_PROVIDER__URL)");
    }
    let algorithms = ctx.provider.algorithms().await?;
    output(&algorithms, format)
}
