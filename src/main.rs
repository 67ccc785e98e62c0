//! reconchain - CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use futures_util::StreamExt;
use reconchain::{
    chain::{ChainSummary, NodeState},
    cli::{parse_params, Args, Commands},
    config::Config,
    dispatch::BatchRequest,
    events::StreamFrame,
    orchestrator::Orchestrator,
    telemetry::{format_event, init_tracing},
    tools::ToolRegistry,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.clone()).context("Failed to load configuration")?;
    init_tracing(&config.logging.level, args.verbose)?;

    if let Commands::Config = args.command {
        return show_config(&args, &config);
    }

    let orchestrator = Arc::new(Orchestrator::from_config(config)?);

    match &args.command {
        Commands::Tools { search } => list_tools(&args, &orchestrator, search.as_deref()),
        Commands::Check { tool } => check_tool(&args, &orchestrator, tool),
        Commands::Execute { tool, params } => {
            let params = parse_params(params).map_err(anyhow::Error::msg)?;
            let response = orchestrator.execute(tool, params, None).await?;
            if args.json {
                return print_json(&response);
            }
            if response.success {
                println!("{} {} ({:.2}s)", "✓".green(), tool.bold(), response.duration);
                if let Some(result) = &response.result {
                    println!("{}", serde_json::to_string_pretty(result)?);
                }
            } else {
                println!(
                    "{} {} failed: {}",
                    "✗".red(),
                    tool.bold(),
                    response.error.as_deref().unwrap_or("unknown error")
                );
            }
            Ok(())
        }
        Commands::Batch { tool, targets, workers } => {
            let mut request = BatchRequest::new(tool.clone(), targets.clone());
            if let Some(workers) = workers {
                request = request.with_max_workers(*workers);
            }
            let report = orchestrator.batch_scan(request).await?;
            if args.json {
                return print_json(&report);
            }
            for entry in &report.results {
                let mark = if entry.success { "✓".green() } else { "✗".red() };
                println!("{} {:<40} {}", mark, entry.url, entry.status);
            }
            println!();
            println!(
                "{} targets, {} found, {} errors",
                report.total, report.found, report.errors
            );
            Ok(())
        }
        Commands::Infer { text, tools } => {
            let response = orchestrator.analyze_text(text, tools, &HashMap::new(), None).await;
            if args.json {
                return print_json(&response);
            }
            println!("Target: {} ({})", response.target.value.bold(), response.target.kind);
            if let Some(message) = &response.message {
                println!("{}", message.yellow());
            }
            if let Some(analysis) = &response.analysis {
                println!("{}", analysis.summary);
                println!("Recommended tools: {}", analysis.recommended_tools.join(", "));
            }
            for entry in response.results.iter().flatten() {
                let mark = if entry.success { "✓".green() } else { "✗".red() };
                match &entry.error {
                    Some(error) => println!("{} {} - {}", mark, entry.tool.bold(), error),
                    None => println!("{} {}", mark, entry.tool.bold()),
                }
            }
            Ok(())
        }
        Commands::Plan { target, objectives } => {
            let plan = orchestrator.generate_plan(target, objectives);
            if args.json {
                return print_json(&plan);
            }
            println!("Attack plan for {}", plan.target.bold());
            for phase in &plan.phases {
                println!();
                println!("{}. {} - {}", phase.phase, phase.name.bold(), phase.description);
                for tool in &phase.tools {
                    let mark = if phase.available.contains(tool) { "✓".green() } else { "·".dimmed() };
                    println!("   {} {}", mark, tool);
                }
            }
            for recommendation in &plan.recommendations {
                println!("{} {}", "→".cyan(), recommendation);
            }
            Ok(())
        }
        Commands::Chain {
            target,
            target_type,
            objectives,
            dry_run,
            watch,
        } => {
            run_chain(&args, &orchestrator, target, target_type, objectives, *dry_run, *watch).await
        }
        Commands::Config => Ok(()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn list_tools(args: &Args, orchestrator: &Orchestrator, search: Option<&str>) -> Result<()> {
    let report = orchestrator.link_status();
    let tools: Vec<_> = match search {
        Some(keyword) => {
            let names: Vec<_> = orchestrator
                .registry()
                .search_tools(keyword)
                .into_iter()
                .map(|t| t.name.clone())
                .collect();
            report.tools.into_iter().filter(|t| names.contains(&t.tool)).collect()
        }
        None => report.tools,
    };
    if args.json {
        return print_json(&tools);
    }

    for link in &tools {
        let mark = if link.dependency_ok { "✓".green() } else { "✗".red() };
        println!(
            "{} {:<16} {:<15} {}",
            mark,
            link.tool,
            link.category.to_string().dimmed(),
            link.dependency.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!("{}/{} tools ready", report.ok, report.total_tools);
    Ok(())
}

fn check_tool(args: &Args, orchestrator: &Orchestrator, tool: &str) -> Result<()> {
    let status = orchestrator.check_dependency(tool);
    if args.json {
        return print_json(&status);
    }
    match (&status.dependency, status.available) {
        (None, _) => println!("{} {} has no external dependency", "✓".green(), tool),
        (Some(dep), true) => println!("{} {} found on PATH", "✓".green(), dep),
        (Some(dep), false) => println!("{} {} not installed", "✗".red(), dep),
    }
    Ok(())
}

async fn run_chain(
    args: &Args,
    orchestrator: &Arc<Orchestrator>,
    target: &str,
    target_type: &str,
    objectives: &[String],
    dry_run: bool,
    watch: bool,
) -> Result<()> {
    let created = orchestrator.create_chain(target, target_type, objectives)?;
    if !args.json {
        println!(
            "Created chain {} with {} nodes",
            created.chain_id.bold(),
            created.node_count
        );
    }

    if dry_run {
        let suggestions = orchestrator.suggest_next_steps(&created.chain_id)?;
        if args.json {
            return print_json(&suggestions);
        }
        for suggestion in &suggestions {
            println!("{} {:<16} {}", "→".cyan(), suggestion.tool, suggestion.reason);
        }
        return Ok(());
    }

    let watcher = watch.then(|| {
        let mut stream = Box::pin(orchestrator.subscribe_events(orchestrator.bus().latest_id()));
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                if let StreamFrame::Event(event) = frame {
                    eprintln!("{}", format_event(&event));
                }
            }
        })
    });

    let summary = orchestrator.execute_chain(&created.chain_id, None).await;

    if let Some(handle) = watcher {
        // Let the subscriber flush what is already in the log
        tokio::task::yield_now().await;
        handle.abort();
    }

    let summary = summary?;
    if args.json {
        return print_json(&summary);
    }
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &ChainSummary) {
    println!();
    for node in &summary.nodes {
        let mark = match node.state {
            NodeState::Success => "✓".green(),
            NodeState::Failed => "✗".red(),
            NodeState::Skipped => "-".yellow(),
            _ => "·".dimmed(),
        };
        match &node.reason {
            Some(reason) => println!("{} {:<16} {}", mark, node.id, reason.dimmed()),
            None => println!("{} {}", mark, node.id),
        }
    }
    println!();
    println!(
        "{:?} in {} waves: {} succeeded, {} failed, {} skipped ({:.2}s)",
        summary.status,
        summary.waves,
        summary.counts.success,
        summary.counts.failed,
        summary.counts.skipped,
        summary.duration
    );
}

fn show_config(args: &Args, config: &Config) -> Result<()> {
    if args.json {
        return print_json(config);
    }

    println!("reconchain configuration");
    match args.config.clone().or_else(Config::default_path) {
        Some(path) => println!("  File: {}", path.display()),
        None => println!("  File: (defaults)"),
    }
    println!();
    println!("{}", config.to_toml()?);
    Ok(())
}
