use serde::Serialize;

use crate::cli::{ApplyDeltaArgs, DrainArgs, OrgArgs, OutputFormat};
use crate::context::AppContext;
use crate::output::output;

#[derive(Serialize)]
struct WithFollowUps<T> {
    #[serde(flatten)]
    result: T,
    follow_up_jobs: usize,
}

async fn follow_ups(ctx: &AppContext, args: &DrainArgs) -> anyhow::Result<usize> {
    if args.no_drain {
        let queued = ctx.queue.len().await;
        tracing::info!(queued, "follow-up jobs left queued");
        return Ok(0);
    }
    ctx.drain().await
}

pub async fn scan(args: &DrainArgs, ctx: &AppContext, format: OutputFormat) -> anyhow::Result<()> {
    let summary = ctx.worker.scan_dataset_updates().await?;
    let follow_up_jobs = follow_ups(ctx, args).await?;
    output(
        &WithFollowUps {
            result: summary,
            follow_up_jobs,
        },
        format,
    )
}

pub async fn apply(args: &ApplyDeltaArgs, ctx: &AppContext, format: OutputFormat) -> anyhow::Result<()> {
    let summary = ctx.worker.apply_delta_file(&args.job).await?;
    let follow_up_jobs = follow_ups(ctx, &args.drain).await?;
    output(
        &WithFollowUps {
            result: summary,
            follow_up_jobs,
        },
        format,
    )
}

pub async fn build(args: &OrgArgs, ctx: &AppContext, format: OutputFormat) -> anyhow::Result<()> {
    let file = ctx.worker.build_dataset(&args.org).await?;
    if file.is_none() {
        tracing::info!(org_id = %args.org, "no changes since the last export");
    }
    output(&file, format)
}

pub async fn catalog(ctx: &AppContext, format: OutputFormat) -> anyhow::Result<()> {
    let document = ctx.worker.catalog().document().await?;
    output(&document, format)
}

pub async fn delta_list(args: &OrgArgs, ctx: &AppContext, format: OutputFormat) -> anyhow::Result<()> {
    let versions = ctx.worker.catalog().delta_list(&args.org).await?;
    output(&versions, format)
}
