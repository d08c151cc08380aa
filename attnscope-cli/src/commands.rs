//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use attnscope_core::{AppConfig, GuideExample};
use attnscope_ml::heatmap::HeatmapStyle;
use attnscope_ml::{
    AttentionModel, HeadSummary, SharedModel, ViewOutcome, ViewRequest, compute_head_summaries,
    compute_tokens, compute_view,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, config_path),
        Commands::Guide => {
            print!("{}", format_guide(attnscope_core::examples()));
            Ok(())
        }
        Commands::Serve { host, port } => {
            let mut config = load(workspace, config_path)?;
            // Apply CLI overrides
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            handle_serve(config).await
        }
        Commands::Render {
            text,
            layer,
            head,
            output,
            annotate,
        } => {
            let mut config = load(workspace, config_path)?;
            config.view.annotate |= annotate;
            let request = ViewRequest::new(
                text,
                layer.unwrap_or(config.view.default_layer),
                head.unwrap_or(config.view.default_head),
            );
            let model = load_model(&config).await?;
            let svg = render(model.as_ref(), &request, &HeatmapStyle::from(&config.view))?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &svg)?;
                    println!("Heatmap written to {}", path.display());
                }
                None => std::io::stdout().write_all(svg.as_bytes())?,
            }
            Ok(())
        }
        Commands::Tokens { text } => {
            let config = load(workspace, config_path)?;
            let model = load_model(&config).await?;
            let tokens = compute_tokens(model.as_ref(), &text)?;
            println!("{} tokens:", tokens.len());
            for (i, token) in tokens.iter().enumerate() {
                println!("  {:>3}  {}", i, token);
            }
            Ok(())
        }
        Commands::Heads { text, top, json } => {
            let config = load(workspace, config_path)?;
            let model = load_model(&config).await?;
            let summaries = compute_head_summaries(model.as_ref(), &text)?;
            let shown = &summaries[..top.min(summaries.len())];
            if json {
                println!("{}", serde_json::to_string_pretty(shown)?);
            } else {
                print!("{}", format_heads(shown));
            }
            Ok(())
        }
    }
}

fn load(workspace: &Path, config_path: Option<&Path>) -> anyhow::Result<AppConfig> {
    attnscope_core::load_config(Some(workspace), config_path, None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
}

async fn load_model(config: &AppConfig) -> anyhow::Result<Arc<dyn AttentionModel>> {
    SharedModel::from_config(config.model.clone())
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load model '{}': {}", config.model.model_id, e))
}

async fn handle_serve(config: AppConfig) -> anyhow::Result<()> {
    // A missing or unreachable checkpoint is fatal before binding.
    let model = load_model(&config).await?;
    let addr = config.server.bind_addr();
    println!("attnscope viewer: http://{}", addr);
    let state = attnscope_ui::AppState::new(model, config)?;
    attnscope_ui::run(state, &addr).await?;
    Ok(())
}

fn render(
    model: &dyn AttentionModel,
    request: &ViewRequest,
    style: &HeatmapStyle,
) -> anyhow::Result<String> {
    match compute_view(model, request)? {
        ViewOutcome::Warning(message) => anyhow::bail!(message),
        ViewOutcome::Ready(view) => Ok(view.heatmap_svg(style)?),
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            match attnscope_core::config::init_workspace_config(workspace)? {
                Some(path) => println!("Created default configuration at: {}", path.display()),
                None => println!(
                    "Configuration file already exists at: {}",
                    attnscope_core::config::workspace_config_path(workspace).display()
                ),
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = attnscope_core::load_config(Some(workspace), config_path, None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

fn format_guide(examples: &[GuideExample]) -> String {
    let mut out = String::from("Example guide\n=============\n");
    for (i, example) in examples.iter().enumerate() {
        out.push_str(&format!("\n{}. {}\n", i + 1, example.title));
        out.push_str(&format!("   {}\n", example.summary));
        for sentence in example.sentences {
            out.push_str(&format!("   > {}\n", sentence));
        }
        out.push_str(&format!("   Expect: {}\n", example.expectation));
        if let Some(hint) = example.focus_hint() {
            out.push_str(&format!("   Inspect row: {}\n", hint));
        }
    }
    out
}

fn format_heads(summaries: &[HeadSummary]) -> String {
    let mut out = format!(
        "{:>5} {:>4}  {:<14} {:>7} {:>6} {:>6} {:>6} {:>8}\n",
        "layer", "head", "pattern", "entropy", "self", "prev", "next", "boundary"
    );
    for s in summaries {
        out.push_str(&format!(
            "{:>5} {:>4}  {:<14} {:>7.3} {:>6.3} {:>6.3} {:>6.3} {:>8.3}\n",
            s.layer,
            s.head,
            s.pattern.to_string(),
            s.entropy,
            s.self_weight,
            s.previous_weight,
            s.next_weight,
            s.boundary_weight
        ));
    }
    out
}
