use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing_subscriber::EnvFilter;

use alirecon::cli::{
    Cli, DiskAttachmentCommand, DiskCommand, MnsTopicsCommand, OssBucketCommand, ResourceCommand,
};
use alirecon::output::{attribute_table, attribute_tree, sweep_table, topics_table};
use alirecon::reconcile::{Engine, ProviderContext, Reconciler};
use alirecon::resource::{AttributeSet, ResourceDescriptor};
use alirecon::resources::{
    DiskAttachmentResource, DiskResource, MnsTopicsDataSource, OssBucketResource,
};
use alirecon::sweep::sweep_oss_buckets;
use alirecon::terraform::state::StateFile;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.provider.to_config();
    tracing::debug!(?config, "provider configuration");

    let ctx = config.context()?;
    let mut state = StateFile::load(config.state_path()).await?;

    match cli.command {
        ResourceCommand::Disk { command } => match command {
            DiskCommand::Create(args) => {
                let mut engine = Engine::new(&ctx, &mut state);
                let descriptor = engine.create(&DiskResource, &args.attributes()).await?;
                print_descriptor(&descriptor);
            }
            DiskCommand::Show(args) => show(&ctx, &mut state, &DiskResource, &args.id).await?,
            DiskCommand::Destroy(args) => {
                Engine::new(&ctx, &mut state)
                    .destroy(&DiskResource, &args.id)
                    .await?;
                println!("destroyed {}", args.id);
            }
        },
        ResourceCommand::DiskAttachment { command } => match command {
            DiskAttachmentCommand::Attach(args) => {
                let mut engine = Engine::new(&ctx, &mut state);
                let descriptor = engine
                    .apply(&DiskAttachmentResource, &args.attributes())
                    .await?;
                print_descriptor(&descriptor);
            }
            DiskAttachmentCommand::Show(args) => {
                show(&ctx, &mut state, &DiskAttachmentResource, &args.id).await?
            }
            DiskAttachmentCommand::Detach(args) => {
                Engine::new(&ctx, &mut state)
                    .destroy(&DiskAttachmentResource, &args.id)
                    .await?;
                println!("detached {}", args.id);
            }
        },
        ResourceCommand::OssBucket { command } => match command {
            OssBucketCommand::Apply(args) => {
                let declared = match &args.config {
                    Some(path) => {
                        let raw = tokio::fs::read_to_string(path).await?;
                        AttributeSet::from_json(&serde_json::from_str(&raw)?)?
                    }
                    None => AttributeSet::new(),
                };
                let mut engine = Engine::new(&ctx, &mut state);
                let descriptor = engine
                    .apply(&OssBucketResource, &args.attributes(declared))
                    .await?;
                println!("{}", attribute_tree(&descriptor.id, &descriptor.attributes));
            }
            OssBucketCommand::Show(args) => {
                let mut engine = Engine::new(&ctx, &mut state);
                match engine.refresh(&OssBucketResource, &args.bucket).await? {
                    Some(descriptor) if args.tree => {
                        println!("{}", attribute_tree(&descriptor.id, &descriptor.attributes));
                    }
                    Some(descriptor) => print_descriptor(&descriptor),
                    None => println!("{} not found", args.bucket),
                }
            }
            OssBucketCommand::Destroy(args) => {
                Engine::new(&ctx, &mut state)
                    .destroy(&OssBucketResource, &args.bucket)
                    .await?;
                println!("destroyed {}", args.bucket);
            }
            OssBucketCommand::Sweep(args) => {
                let report = sweep_oss_buckets(&ctx, Duration::from_secs(args.settle_secs)).await?;
                tracing::info!(
                    deleted = report.deleted.len(),
                    skipped = report.skipped.len(),
                    failed = report.failed.len(),
                    "sweep complete"
                );
                println!("{}", sweep_table(&report));
            }
        },
        ResourceCommand::MnsTopics { command } => match command {
            MnsTopicsCommand::List(args) => {
                let mut engine = Engine::new(&ctx, &mut state);
                let descriptor = engine
                    .read_data_source(&MnsTopicsDataSource, &args.attributes())
                    .await?;
                println!("{}", topics_table(descriptor.attributes.get_blocks("topics")?));
            }
        },
    }

    Ok(())
}

async fn show(
    ctx: &ProviderContext,
    state: &mut StateFile,
    reconciler: &dyn Reconciler,
    id: &str,
) -> Result<()> {
    match Engine::new(ctx, state).refresh(reconciler, id).await? {
        Some(descriptor) => print_descriptor(&descriptor),
        None => println!("{} {} not found", reconciler.resource_type(), id),
    }
    Ok(())
}

fn print_descriptor(descriptor: &ResourceDescriptor) {
    println!("{} {}", descriptor.resource_type, descriptor.id);
    println!("{}", attribute_table(&descriptor.attributes));
}
