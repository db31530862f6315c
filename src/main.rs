use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use html_validate::config::{Args, Config, DumpMode, OutputFormat};
use html_validate::parser::{self, Document, NodeId, NodeKind};
use html_validate::{HtmlValidate, MetaTable, Report};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .parse_default_env()
        .init();

    let config = Config::from_args(&args)?;
    if let Some(path) = &config.config_path {
        log::info!("using configuration {}", path.display());
    }

    if let Some(mode) = args.dump_mode() {
        let meta = MetaTable::html5_with(config.elements.clone())?;
        for path in &args.files {
            dump(mode, path, &meta)?;
        }
        return Ok(ExitCode::SUCCESS);
    }

    let engine = Arc::new(HtmlValidate::new(&config)?);
    log::debug!("active rules: {:?}", engine.active_rules().collect::<Vec<_>>());

    let report = validate_files(engine, &args.files).await?;
    match args.formatter {
        OutputFormat::Text => print!("{}", report.format_text()),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Validate every file on the blocking pool, keeping argument order
async fn validate_files(engine: Arc<HtmlValidate>, files: &[PathBuf]) -> Result<Report> {
    let mut tasks = Vec::with_capacity(files.len());
    for path in files {
        let engine = engine.clone();
        let path = path.clone();
        tasks.push(tokio::spawn(async move {
            let source = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let filename = path.display().to_string();
            tokio::task::spawn_blocking(move || engine.validate_string(&source, &filename))
                .await
                .context("validation task failed")
        }));
    }

    let mut results = Vec::with_capacity(tasks.len());
    for task in tasks {
        results.push(task.await??);
    }
    Ok(Report::new(results))
}

fn dump(mode: DumpMode, path: &Path, meta: &MetaTable) -> Result<()> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path.display().to_string();

    match mode {
        DumpMode::Tokens => {
            for token in parser::tokenize(&source, &filename) {
                let token = token?;
                println!("{} {:?} {:?}", token.location, token.kind, token.text);
            }
        }
        DumpMode::Events => {
            let (_, events) = parser::parse(&source, &filename, meta)?;
            for event in events {
                println!("{:?}", event);
            }
        }
        DumpMode::Tree => {
            let (document, _) = parser::parse(&source, &filename, meta)?;
            print_tree(&document, document.root().id, 0);
        }
    }
    Ok(())
}

fn print_tree(document: &Document, id: NodeId, depth: usize) {
    let Some(node) = document.get(id) else {
        return;
    };
    let indent = "  ".repeat(depth);
    match node.kind {
        NodeKind::Root => println!("(root) {}", node.location.filename),
        NodeKind::Text => println!("{}#text {:?}", indent, node.text.as_deref().unwrap_or_default()),
        NodeKind::Element => println!(
            "{}{} {}:{} {:?}",
            indent,
            node.display_name(),
            node.location.line,
            node.location.column,
            node.closed
        ),
    }
    for child in &node.children {
        print_tree(document, *child, depth + 1);
    }
}
