//! Recollect CLI
//!
//! Command-line administration for an agent memory store: inspect, save,
//! search, manage categories and mind maps, take backups, export and import.

use std::io::{self, BufRead, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use recollect_core::{
    Embedder, EngineConfig, HashingEmbedder, MatchKind, MemoryEngine, MemoryNode, NoteImportance,
    SaveRequest, SearchQuery, SharedEngine, TimeWindow,
};

/// Recollect - long-term memory for autonomous agents
#[derive(Parser)]
#[command(name = "recollect")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Administer a Recollect agent memory store")]
struct Cli {
    /// Store root (overrides RECOLLECT_DATA_DIR and memory.config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Embedding backend
    #[arg(long, global = true, value_enum, default_value_t = EmbedderKind::default())]
    embedder: EmbedderKind,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EmbedderKind {
    /// Local ONNX model (requires the `embeddings` feature)
    Fastembed,
    /// Deterministic feature hashing, no model download
    Hashing,
    /// Keyword search only
    None,
}

impl Default for EmbedderKind {
    fn default() -> Self {
        if cfg!(feature = "embeddings") {
            EmbedderKind::Fastembed
        } else {
            EmbedderKind::Hashing
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Json,
    Jsonl,
}

#[derive(Subcommand)]
enum Commands {
    /// Show store statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Save a document (content `-` reads stdin)
    Save {
        title: String,
        content: String,
        /// Tags (comma-separated)
        #[arg(long)]
        tags: Option<String>,
        /// Category id
        #[arg(long)]
        category: Option<String>,
        /// Node type
        #[arg(long = "type")]
        node_type: Option<String>,
        /// Keep permanently and trigger a backup
        #[arg(long)]
        permanent: bool,
    },

    /// Add a short agent note
    Note {
        text: String,
        #[arg(long = "type", default_value = "general")]
        note_type: String,
        #[arg(long)]
        important: bool,
        /// Tags (comma-separated)
        #[arg(long)]
        tags: Option<String>,
    },

    /// Hybrid keyword + vector search
    Search {
        query: String,
        #[arg(long, default_value = "10")]
        limit: usize,
        #[arg(long)]
        category: Option<String>,
        /// Any-of tag filter (comma-separated)
        #[arg(long)]
        tags: Option<String>,
        /// Node type filter (comma-separated)
        #[arg(long)]
        types: Option<String>,
        /// Disable the recency adjustment of vector matches
        #[arg(long)]
        no_recency: bool,
        #[arg(long)]
        json: bool,
    },

    /// Show one node (touches its access time)
    Get {
        id: String,
        #[arg(long)]
        json: bool,
    },

    /// Nodes accessed within a window (recent, day, week, month, <n>h)
    Recent {
        #[arg(long, default_value = "day")]
        window: String,
    },

    /// Nodes connected to a node within `depth` hops
    Related {
        id: String,
        #[arg(long, default_value = "1")]
        depth: usize,
    },

    /// Category management
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },

    /// Mind map management
    MindMap {
        #[command(subcommand)]
        command: MindMapCommands,
    },

    /// Record a task status note (completed and error are important)
    Status {
        task: String,
        status: String,
        #[arg(long)]
        details: Option<String>,
    },

    /// Notes, task statuses, mind maps and knowledge a new session starts with
    Session {
        #[arg(long)]
        json: bool,
    },

    /// Take a snapshot now
    Backup {
        /// Ignore the backup interval
        #[arg(long)]
        force: bool,
    },

    /// List snapshots, newest first
    Backups,

    /// Export nodes as JSON or JSONL
    Export {
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
        /// Only nodes carrying all of these tags (comma-separated)
        #[arg(long)]
        tags: Option<String>,
        /// Only nodes created on or after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,
    },

    /// Import nodes from a JSON or JSONL export
    Import { input: PathBuf },

    /// Keep the store open and take periodic backups until interrupted
    Maintain {
        /// Seconds between backup attempts
        #[arg(long, default_value = "300")]
        period_secs: u64,
    },
}

#[derive(Subcommand)]
enum CategoryCommands {
    /// Create a category
    Add {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        parent: Option<String>,
    },
    /// List every category as a tree
    List,
    /// Root-to-category path
    Path { id: String },
    /// Fold one category into another
    Merge { source: String, target: String },
    /// Nodes filed under a category
    Contents {
        id: String,
        #[arg(long)]
        recursive: bool,
    },
    /// Relate two categories
    Relate {
        source: String,
        target: String,
        #[arg(long = "type", default_value = "related")]
        relation_type: String,
        #[arg(long, default_value = "0.5")]
        strength: f32,
    },
}

#[derive(Subcommand)]
enum MindMapCommands {
    /// Create a map with a root concept
    Create {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "type", default_value = "task")]
        map_type: String,
    },
    /// Add a concept, optionally linked from an existing one
    Add {
        map_id: String,
        title: String,
        #[arg(long, default_value = "")]
        content: String,
        #[arg(long)]
        related_to: Option<String>,
        #[arg(long, default_value = "related")]
        link_type: String,
    },
    /// Link two concepts
    Link {
        map_id: String,
        source: String,
        target: String,
        #[arg(long = "type", default_value = "related")]
        link_type: String,
        #[arg(long, default_value = "1.0")]
        strength: f32,
    },
    /// Print a map's outline (or the full map as JSON)
    Show {
        map_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Find maps by title, description or concept text
    Search {
        query: String,
        #[arg(long, default_value = "3")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let mut config = EngineConfig::from_env()?;
    if let Some(dir) = cli.data_dir {
        config.root = dir;
    }
    let embedder = build_embedder(cli.embedder)?;

    match cli.command {
        Commands::Maintain { period_secs } => run_maintain(config, embedder, period_secs),
        command => {
            let mut engine = MemoryEngine::open(config, embedder)?;
            run_command(&mut engine, command)
        }
    }
}

/// Logs go to stderr; stdout carries command output
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_embedder(kind: EmbedderKind) -> anyhow::Result<Option<Arc<dyn Embedder>>> {
    match kind {
        EmbedderKind::None => Ok(None),
        EmbedderKind::Hashing => Ok(Some(Arc::new(HashingEmbedder::new(
            recollect_core::embeddings::DEFAULT_HASHING_DIMENSIONS,
        )))),
        #[cfg(feature = "embeddings")]
        EmbedderKind::Fastembed => Ok(Some(Arc::new(recollect_core::FastEmbedder::new()))),
        #[cfg(not(feature = "embeddings"))]
        EmbedderKind::Fastembed => {
            anyhow::bail!("this build has no fastembed support; rebuild with --features embeddings")
        }
    }
}

fn run_command(engine: &mut MemoryEngine, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Stats { json } => run_stats(engine, json),
        Commands::Save {
            title,
            content,
            tags,
            category,
            node_type,
            permanent,
        } => {
            let content = if content == "-" {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                content
            };
            let mut request = SaveRequest::new(title, content)
                .tags(split_list(tags.as_deref()))
                .permanent(permanent);
            if let Some(category) = category {
                request = request.category(category);
            }
            if let Some(node_type) = node_type {
                request = request.node_type(node_type);
            }
            let id = engine.save(request)?;
            println!("{} {}", "Saved".green().bold(), id);
            Ok(())
        }
        Commands::Note {
            text,
            note_type,
            important,
            tags,
        } => {
            let importance = if important {
                NoteImportance::High
            } else {
                NoteImportance::Normal
            };
            let id = engine.add_note(&text, &note_type, importance, &split_list(tags.as_deref()))?;
            println!("{} {}", "Noted".green().bold(), id);
            Ok(())
        }
        Commands::Search {
            query,
            limit,
            category,
            tags,
            types,
            no_recency,
            json,
        } => {
            let mut search = SearchQuery::new(query)
                .limit(limit)
                .tags(split_list(tags.as_deref()))
                .types(split_list(types.as_deref()))
                .recency_boost(!no_recency);
            if let Some(category) = category {
                search = search.category(category);
            }
            let hits = engine.search(&search);
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
                return Ok(());
            }
            if hits.is_empty() {
                println!("{}", "No matches.".dimmed());
            }
            for (rank, hit) in hits.iter().enumerate() {
                let how = match hit.match_kind {
                    MatchKind::Keyword { quality } => format!("keyword {quality:.1}"),
                    MatchKind::Vector { distance } => format!("vector {distance:.3}"),
                };
                println!(
                    "{:>3}. {} {} {}",
                    rank + 1,
                    hit.node.title.white().bold(),
                    format!("[{}]", hit.node.id).dimmed(),
                    how.cyan()
                );
                println!("     {}", preview(&hit.node.content, 100));
            }
            Ok(())
        }
        Commands::Get { id, json } => {
            let node = engine
                .get(&id)
                .with_context(|| format!("no node with id {id}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&node)?);
            } else {
                print_node(&node, &engine.node_path(&node.id));
            }
            Ok(())
        }
        Commands::Recent { window } => {
            let window: TimeWindow = window.parse()?;
            let nodes = engine.recent(window);
            println!("{}", format!("=== Accessed within {window} ===").cyan().bold());
            for node in &nodes {
                print_line(node);
            }
            println!("{}", format!("{} nodes", nodes.len()).dimmed());
            Ok(())
        }
        Commands::Related { id, depth } => {
            if engine.peek(&id).is_none() {
                anyhow::bail!("no node with id {id}");
            }
            for node in engine.related(&id, depth) {
                print_line(&node);
            }
            Ok(())
        }
        Commands::Category { command } => run_category(engine, command),
        Commands::MindMap { command } => run_mind_map(engine, command),
        Commands::Status {
            task,
            status,
            details,
        } => {
            let id = engine.log_task_status(&task, &status, details.as_deref())?;
            println!("{} {}", "Logged".green().bold(), id);
            Ok(())
        }
        Commands::Session { json } => run_session(engine, json),
        Commands::Backup { force } => {
            match engine.create_backup(force)? {
                Some(path) => println!("{} {}", "Backup written to".green().bold(), path.display()),
                None => println!(
                    "{}",
                    "Backup skipped: interval not elapsed (use --force)".yellow()
                ),
            }
            Ok(())
        }
        Commands::Backups => {
            let backups = engine.list_backups()?;
            if backups.is_empty() {
                println!("{}", "No backups.".dimmed());
            }
            for backup in backups {
                let nodes = backup
                    .state
                    .map(|s| format!("{} nodes", s.num_nodes))
                    .unwrap_or_else(|| "no state".to_string());
                println!("{}  {}", backup.name.white().bold(), nodes.dimmed());
            }
            Ok(())
        }
        Commands::Export {
            output,
            format,
            tags,
            since,
        } => run_export(engine, &output, format, tags.as_deref(), since.as_deref()),
        Commands::Import { input } => {
            let nodes = read_export(&input)?;
            let total = nodes.len();
            let imported = engine.import(nodes)?;
            engine.flush()?;
            println!(
                "{}",
                format!("Imported {imported} of {total} nodes from {}", input.display())
                    .green()
                    .bold()
            );
            Ok(())
        }
        Commands::Maintain { .. } => anyhow::bail!("maintain runs without an open engine"),
    }
}

fn run_stats(engine: &MemoryEngine, json: bool) -> anyhow::Result<()> {
    let stats = engine.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "=== Recollect Memory Statistics ===".cyan().bold());
    println!();
    println!("{}: {}", "Store".white().bold(), stats.root.display());
    println!("{}: {}", "Nodes".white().bold(), stats.nodes);
    for (node_type, count) in &stats.node_types {
        println!("  {node_type:14} {count}");
    }
    println!("{}: {}", "Edges".white().bold(), stats.edges);
    println!(
        "{}: {} ({} relations)",
        "Categories".white().bold(),
        stats.categories,
        stats.category_relations
    );
    println!(
        "{}: {} x {}d ({})",
        "Vectors".white().bold(),
        stats.vectors.total_vectors,
        stats.vectors.dimensions,
        if stats.vectors.available {
            stats.vectors.model.green()
        } else {
            "unavailable".red()
        }
    );
    if let Some(cache) = &stats.cache {
        println!(
            "{}: {}/{} nodes, {} relation lookups",
            "Cache".white().bold(),
            cache.node_entries,
            cache.capacity,
            cache.relation_entries
        );
    }
    match stats.last_backup {
        Some(at) => println!(
            "{}: {}",
            "Last Backup".white().bold(),
            at.format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("{}: {}", "Last Backup".white().bold(), "never".yellow()),
    }
    if let Some(snapshot) = &stats.recovered_from {
        println!("{}: {}", "Recovered From".white().bold(), snapshot.yellow());
    }
    Ok(())
}

fn run_category(engine: &mut MemoryEngine, command: CategoryCommands) -> anyhow::Result<()> {
    match command {
        CategoryCommands::Add {
            name,
            description,
            parent,
        } => {
            let id = engine.add_category(&name, &description, parent.as_deref());
            println!("{} {}", "Created".green().bold(), id);
        }
        CategoryCommands::List => {
            let roots: Vec<String> = engine
                .categories()
                .into_iter()
                .filter(|c| c.parent_id.is_none())
                .map(|c| c.id.clone())
                .collect();
            if roots.is_empty() {
                println!("{}", "No categories.".dimmed());
            }
            for root in roots {
                print_category_tree(engine, &root, 0);
            }
        }
        CategoryCommands::Path { id } => {
            let names: Vec<&str> = engine
                .category_path(&id)
                .iter()
                .map(|c| c.name.as_str())
                .collect();
            if names.is_empty() {
                anyhow::bail!("no category with id {id}");
            }
            println!("{}", names.join(" / "));
        }
        CategoryCommands::Merge { source, target } => {
            if !engine.merge_categories(&source, &target) {
                anyhow::bail!("cannot merge {source} into {target}");
            }
            println!("{} {} into {}", "Merged".green().bold(), source, target);
        }
        CategoryCommands::Contents { id, recursive } => {
            for node in engine.category_contents(&id, recursive) {
                print_line(&node);
            }
        }
        CategoryCommands::Relate {
            source,
            target,
            relation_type,
            strength,
        } => {
            if !engine.add_relation(&source, &target, &relation_type, strength) {
                anyhow::bail!("unknown category in {source} -> {target}");
            }
            println!("{} {} -[{}]-> {}", "Related".green().bold(), source, relation_type, target);
        }
    }
    Ok(())
}

fn run_mind_map(engine: &mut MemoryEngine, command: MindMapCommands) -> anyhow::Result<()> {
    match command {
        MindMapCommands::Create {
            title,
            description,
            map_type,
        } => {
            let id = engine.create_mind_map(&title, &description, &map_type)?;
            println!("{} {}", "Created".green().bold(), id);
        }
        MindMapCommands::Add {
            map_id,
            title,
            content,
            related_to,
            link_type,
        } => {
            let id = engine.add_mind_map_concept(
                &map_id,
                &title,
                &content,
                related_to.as_deref(),
                &link_type,
                None,
            )?;
            println!("{} {}", "Added".green().bold(), id);
        }
        MindMapCommands::Link {
            map_id,
            source,
            target,
            link_type,
            strength,
        } => {
            engine.link_mind_map_concepts(&map_id, &source, &target, &link_type, strength)?;
            println!("{} {} -[{}]-> {}", "Linked".green().bold(), source, link_type, target);
        }
        MindMapCommands::Show { map_id, json } => {
            if json {
                let map = engine
                    .mind_map(&map_id)
                    .with_context(|| format!("no mind map with id {map_id}"))?;
                println!("{}", serde_json::to_string_pretty(map)?);
            } else {
                let summary = engine
                    .mind_map_summary(&map_id)
                    .with_context(|| format!("no mind map with id {map_id}"))?;
                println!("{summary}");
            }
        }
        MindMapCommands::Search { query, limit } => {
            let matches = engine.search_mind_maps(&query, limit);
            if matches.is_empty() {
                println!("{}", "No matches.".dimmed());
            }
            for m in matches {
                println!(
                    "{} {} {}",
                    m.title.white().bold(),
                    format!("[{}]", m.id).dimmed(),
                    format!("score {}, {} concepts", m.score, m.concept_count).cyan()
                );
            }
        }
    }
    Ok(())
}

fn run_session(engine: &MemoryEngine, json: bool) -> anyhow::Result<()> {
    let memory = engine.session_memory();
    if json {
        println!("{}", serde_json::to_string_pretty(&memory)?);
        return Ok(());
    }

    println!("{}", "=== Agent Notes ===".cyan().bold());
    for note in &memory.agent_notes {
        println!("- [{}] {}", note.note_type, preview(&note.content, 100));
    }
    println!("{}", "=== Task Statuses ===".cyan().bold());
    for status in &memory.task_statuses {
        println!("- {}", preview(&status.content, 100));
    }
    println!("{}", "=== Mind Maps ===".cyan().bold());
    for map in &memory.mind_maps {
        println!(
            "- {} {} {}",
            map.title.white().bold(),
            format!("[{}]", map.id).dimmed(),
            format!("{} concepts, {} links", map.concepts, map.links).dimmed()
        );
    }
    println!("{}", "=== Knowledge Base ===".cyan().bold());
    for item in &memory.knowledge_base {
        println!("- {}: {}", item.title.white().bold(), preview(&item.content, 100));
    }
    Ok(())
}

fn print_category_tree(engine: &MemoryEngine, id: &str, depth: usize) {
    let Some(category) = engine.category(id) else {
        return;
    };
    println!(
        "{}{} {}",
        "  ".repeat(depth),
        category.name.white().bold(),
        format!("[{}]", category.id).dimmed()
    );
    let children: Vec<String> = engine
        .subcategories(id, false)
        .into_iter()
        .map(|c| c.id.clone())
        .collect();
    for child in children {
        print_category_tree(engine, &child, depth + 1);
    }
}

fn run_export(
    engine: &MemoryEngine,
    output: &Path,
    format: ExportFormat,
    tags: Option<&str>,
    since: Option<&str>,
) -> anyhow::Result<()> {
    let since = since
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("invalid date '{date}', use YYYY-MM-DD"))
                .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
        })
        .transpose()?;
    let tag_filter = split_list(tags);

    let all = engine.export();
    let total = all.len();
    let selected: Vec<MemoryNode> = all
        .into_iter()
        .filter(|n| since.is_none_or(|since| n.created_at >= since))
        .filter(|n| tag_filter.iter().all(|t| n.has_tag(t)))
        .collect();

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(std::fs::File::create(output)?);
    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &selected)?;
            writer.write_all(b"\n")?;
        }
        ExportFormat::Jsonl => {
            for node in &selected {
                serde_json::to_writer(&mut writer, node)?;
                writer.write_all(b"\n")?;
            }
        }
    }
    writer.flush()?;

    println!(
        "{}",
        format!(
            "Exported {} of {} nodes to {}",
            selected.len(),
            total,
            output.display()
        )
        .green()
        .bold()
    );
    Ok(())
}

/// A JSON array or one node per line
fn read_export(path: &Path) -> anyhow::Result<Vec<MemoryNode>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let mut reader = io::BufReader::new(file);

    let starts_with_array = {
        let buf = reader.fill_buf()?;
        buf.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'[')
    };
    if starts_with_array {
        return Ok(serde_json::from_reader(reader)?);
    }

    let mut nodes = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        nodes.push(
            serde_json::from_str(&line).with_context(|| format!("line {}", n + 1))?,
        );
    }
    Ok(nodes)
}

fn run_maintain(
    config: EngineConfig,
    embedder: Option<Arc<dyn Embedder>>,
    period_secs: u64,
) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let engine = MemoryEngine::open(config, embedder)?;
        let shared = SharedEngine::new(engine);
        let task = shared.spawn_backup_task(Duration::from_secs(period_secs.max(1)));
        tracing::info!(period_secs, "Maintaining store, Ctrl-C to stop");

        tokio::signal::ctrl_c().await?;
        task.abort();
        shared.run(|engine| engine.flush()).await??;
        tracing::info!("Store flushed, exiting");
        Ok::<(), anyhow::Error>(())
    })
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        format!("{}...", flat.chars().take(max_chars).collect::<String>())
    }
}

fn print_line(node: &MemoryNode) {
    println!(
        "{}  {} {}  {}",
        node.last_accessed.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        node.title.white().bold(),
        format!("[{}]", node.id).dimmed(),
        node.node_type.cyan()
    );
}

fn print_node(node: &MemoryNode, category_path: &[String]) {
    println!("{}", node.title.cyan().bold());
    println!("{}: {}", "Id".white().bold(), node.id);
    println!("{}: {}", "Type".white().bold(), node.node_type);
    if !node.tags.is_empty() {
        println!("{}: {}", "Tags".white().bold(), node.tags.join(", "));
    }
    if !category_path.is_empty() {
        println!("{}: {}", "Category".white().bold(), category_path.join(" / "));
    }
    println!(
        "{}: {}  {}: {}",
        "Created".white().bold(),
        node.created_at.format("%Y-%m-%d %H:%M:%S"),
        "Accessed".white().bold(),
        node.last_accessed.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "{}: {} days",
        "Age".white().bold(),
        format!("{:.1}", node.age_days(Utc::now()))
    );
    println!();
    println!("{}", node.content);
}
