//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use aura_rag::chunk::{Chunk, Granularity, SemanticChunker, chunk_hierarchical};
use aura_rag::{
    DocumentIngestor, Embedder, InMemoryVectorIndex, RagConfig, RetrievalPipeline,
    create_embedder, load_config,
};
use std::path::Path;
use std::sync::Arc;

const PREVIEW_CHARS: usize = 80;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Chunk {
            file,
            chunk_size,
            overlap,
            hierarchical,
            json,
        } => {
            let mut config = load(workspace)?;
            if let Some(size) = chunk_size {
                config.chunking.chunk_size = size;
            }
            if let Some(overlap) = overlap {
                config.chunking.overlap = overlap;
            }
            handle_chunk(&file, &config, hierarchical, json).await
        }
        Commands::Query {
            query,
            docs,
            category,
            max_chunks,
            json,
        } => {
            let mut config = load(workspace)?;
            if let Some(max) = max_chunks {
                config.retrieval.max_chunks = max;
            }
            handle_query(&query, &docs, category.as_deref(), config, json).await
        }
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn load(workspace: &Path) -> anyhow::Result<RagConfig> {
    load_config(Some(workspace), None).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

async fn handle_chunk(
    file: &Path,
    config: &RagConfig,
    hierarchical: bool,
    json: bool,
) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file).await?;
    let document_id = file.to_string_lossy();

    if hierarchical {
        let levels = chunk_hierarchical(&text, &document_id, &config.chunking);
        if json {
            println!("{}", serde_json::to_string_pretty(&levels)?);
            return Ok(());
        }
        for granularity in Granularity::ALL {
            let (size, overlap) = granularity.window();
            println!("== {granularity:?} ({size} tokens, {overlap} overlap) ==");
            print_chunks(levels.get(granularity));
            println!();
        }
        return Ok(());
    }

    let chunks = SemanticChunker::new(config.chunking.clone()).chunk(&text, &document_id);
    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
    } else {
        print_chunks(&chunks);
    }
    Ok(())
}

fn print_chunks(chunks: &[Chunk]) {
    if chunks.is_empty() {
        println!("  (no chunks)");
        return;
    }
    for chunk in chunks {
        println!(
            "  #{:<3} {:>4} words  quality {:>5.2}  {}",
            chunk.index,
            chunk.word_count,
            chunk.quality_score,
            preview(&chunk.text)
        );
        if !chunk.keywords.is_empty() {
            println!("        keywords: {}", chunk.keywords.join(", "));
        }
    }
}

async fn handle_query(
    query: &str,
    docs: &Path,
    category: Option<&str>,
    config: RagConfig,
    json: bool,
) -> anyhow::Result<()> {
    let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding));
    let index = Arc::new(InMemoryVectorIndex::new());

    let ingestor = DocumentIngestor::new(config.chunking.clone(), embedder.clone(), index.clone());
    let reports = ingestor.ingest_directory(docs, category).await?;
    let indexed: usize = reports.iter().map(|r| r.chunks_indexed).sum();
    tracing::info!(documents = reports.len(), chunks = indexed, "Indexed documents");
    if indexed == 0 {
        anyhow::bail!("No indexable documents found in {}", docs.display());
    }

    let pipeline = RetrievalPipeline::builder(embedder, index)
        .with_config(config)
        .build();
    let result = pipeline.retrieve(query).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.is_empty() {
        println!("No relevant context found.");
        return Ok(());
    }
    println!("{}", result.context);
    println!();
    println!("Sources:");
    for source in &result.sources {
        println!("  - {}", source);
    }
    let stats = &result.stats;
    println!();
    println!(
        "{} candidates, {} re-ranked, {} selected, {} used (~{:.0} of {} tokens{}) in {} ms",
        stats.candidates,
        stats.reranked,
        stats.selected,
        stats.chunks_used,
        stats.estimated_tokens,
        stats.token_window,
        if stats.truncated { ", truncated" } else { "" },
        stats.retrieval_time_ms
    );
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".aura");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&RagConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// First line of `text`, cut to a fixed width on a character boundary.
fn preview(text: &str) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() <= PREVIEW_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(PREVIEW_CHARS - 1).collect();
    format!("{cut}…")
}
