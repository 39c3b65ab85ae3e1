use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, Context};
use colored::Colorize;
use cstore_core::metrics::MetricEvent;
use cstore_core::{
    ContentEntry, ContentMutation, ContentStore, InitState, RecordingMetrics, StoreConfig,
};
use cstore_engine::{DatabaseId, EngineProvider, LogEngine, LogEngineProvider, StorageEngine};
use tokio::task::LocalSet;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    LocalSet::new().block_on(&runtime, execute(cli.command, config, cli.stats))
}

fn resolve_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if cli.low_resource {
        config.low_resource_mode = true;
    }
    Ok(config)
}

async fn execute(command: Command, config: StoreConfig, stats: bool) -> anyhow::Result<()> {
    if let Command::Compact = command {
        return cmd_compact(&config).await;
    }

    let metrics = RecordingMetrics::new();
    let engine = LogEngineProvider.engine(DatabaseId::FeedContent, &config.data_dir);
    let store = ContentStore::with_metrics(engine, &config, Rc::new(metrics.clone()));
    if store.wait_for_init().await != InitState::Ready {
        bail!(
            "cannot open content store in {}",
            config.data_dir.display()
        );
    }

    match command {
        Command::Put(args) => cmd_put(&store, args).await?,
        Command::Get(args) => cmd_get(&store, args).await?,
        Command::Scan(args) => cmd_scan(&store, args).await?,
        Command::Keys => cmd_keys(&store).await?,
        Command::Delete(args) => {
            let mut mutation = ContentMutation::new();
            for key in args.keys {
                mutation.append_delete(key);
            }
            commit(&store, mutation).await?
        }
        Command::DeletePrefix(args) => {
            let mut mutation = ContentMutation::new();
            mutation.append_delete_by_prefix(args.prefix);
            commit(&store, mutation).await?
        }
        Command::Clear => {
            let mut mutation = ContentMutation::new();
            mutation.append_delete_all();
            commit(&store, mutation).await?
        }
        Command::Apply(args) => cmd_apply(&store, &args.path).await?,
        Command::Compact => unreachable!("handled above"),
    }

    if stats {
        print_stats(&metrics);
    }
    Ok(())
}

async fn cmd_put(store: &ContentStore, args: PutArgs) -> anyhow::Result<()> {
    let data = match (args.value, args.file) {
        (Some(value), _) => value.into_bytes(),
        (None, Some(path)) => std::fs::read(&path)
            .with_context(|| format!("cannot read {}", path.display()))?,
        (None, None) => bail!("either a value or --file is required"),
    };
    let mut mutation = ContentMutation::new();
    mutation.append_upsert(args.key, data);
    commit(store, mutation).await
}

async fn cmd_get(store: &ContentStore, args: GetArgs) -> anyhow::Result<()> {
    let result = store.load_content(args.keys.iter().cloned()).await;
    if !result.success {
        bail!("failed to load content");
    }
    for key in &args.keys {
        match result.entries.iter().find(|entry| &entry.key == key) {
            Some(entry) => print_entry(entry),
            None => println!("{} {}", key.yellow(), "(missing)".dimmed()),
        }
    }
    Ok(())
}

async fn cmd_scan(store: &ContentStore, args: ScanArgs) -> anyhow::Result<()> {
    let result = store.load_content_by_prefix(args.prefix).await;
    if !result.success {
        bail!("failed to load content");
    }
    let mut entries = result.entries;
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    for entry in &entries {
        print_entry(entry);
    }
    println!("{} entries", entries.len().to_string().bold());
    Ok(())
}

async fn cmd_keys(store: &ContentStore) -> anyhow::Result<()> {
    let result = store.load_all_content_keys().await;
    if !result.success {
        bail!("failed to load keys");
    }
    let mut keys = result.keys;
    keys.sort();
    for key in &keys {
        println!("{key}");
    }
    Ok(())
}

async fn cmd_apply(store: &ContentStore, path: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    let mutation = ContentMutation::from_json(&text)?;
    commit(store, mutation).await
}

async fn cmd_compact(config: &StoreConfig) -> anyhow::Result<()> {
    let engine = LogEngine::new(config.data_dir.join(DatabaseId::FeedContent.folder_name()));
    engine
        .init(config.engine_options())
        .await
        .context("cannot open content log")?;
    let before = engine.log_len().await?;
    engine.compact().await.context("compaction failed")?;
    let after = engine.log_len().await?;
    println!(
        "{} Compacted {} -> {} bytes",
        "✓".green().bold(),
        before,
        after
    );
    Ok(())
}

async fn commit(store: &ContentStore, mutation: ContentMutation) -> anyhow::Result<()> {
    let count = mutation.len();
    if !store.commit_content_mutation(mutation).await {
        bail!("mutation failed; earlier operations may have been applied");
    }
    println!("{} Applied {} operation(s)", "✓".green().bold(), count);
    Ok(())
}

fn print_entry(entry: &ContentEntry) {
    println!("{} {}", entry.key.yellow(), render_value(&entry.data));
}

/// Text as-is, anything else as hex.
fn render_value(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => format!("0x{}", hex::encode(data)),
    }
}

fn print_stats(metrics: &RecordingMetrics) {
    for event in metrics.events() {
        match event {
            MetricEvent::Time { name, elapsed } => {
                println!("  {} {:?}", name.cyan(), elapsed)
            }
            MetricEvent::Count { name, count } => println!("  {} {}", name.cyan(), count),
        }
    }
}
