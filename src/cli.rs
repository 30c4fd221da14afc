use crate::config::{Config, load_config, merge_init_config};
use crate::layout::{Size, compute_layout};
use crate::layout_dump::write_layout_dump;
use crate::parser::parse_tree;
use crate::render::{render_svg, write_output_png, write_output_svg};
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "tdr", version, about = "Hierarchical tree diagram renderer")]
pub struct Args {
    /// Input file (.tree, .json, .md) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (themeVariables and tree settings)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Viewport width
    #[arg(short = 'w', long = "width", default_value_t = 1200.0)]
    pub width: f32,

    /// Viewport height
    #[arg(short = 'H', long = "height", default_value_t = 800.0)]
    pub height: f32,

    #[arg(long = "horizontalSpacing")]
    pub horizontal_spacing: Option<f32>,

    #[arg(long = "verticalSpacing")]
    pub vertical_spacing: Option<f32>,

    /// Keep the natural size instead of shrinking into the viewport
    #[arg(long = "noFit")]
    pub no_fit: bool,

    /// Log verbosity (-d info, -dd debug, -ddd trace); RUST_LOG wins when set
    #[arg(short = 'd', long = "debug", action = ArgAction::Count)]
    pub debug: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Json => "json",
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug);

    let mut base_config = load_config(args.config.as_deref())?;
    apply_args(&mut base_config, &args);

    let (input, is_markdown) = read_input(args.input.as_deref())?;
    let diagrams = if is_markdown {
        extract_tree_blocks(&input)
    } else {
        vec![input]
    };

    if diagrams.is_empty() {
        return Err(anyhow::anyhow!("No tree diagrams found in input"));
    }

    if diagrams.len() == 1 {
        let output = match args.output_format {
            OutputFormat::Png => Some(ensure_output(&args.output, "png")?),
            _ => args.output.clone(),
        };
        return render_one(&diagrams[0], &base_config, &args, args.output_format, output.as_deref());
    }

    let outputs = resolve_multi_outputs(args.output.as_deref(), args.output_format, diagrams.len())?;
    for (idx, diagram) in diagrams.iter().enumerate() {
        render_one(diagram, &base_config, &args, args.output_format, Some(&outputs[idx]))
            .with_context(|| format!("diagram {}", idx + 1))?;
    }
    Ok(())
}

fn render_one(
    source: &str,
    base_config: &Config,
    args: &Args,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let parsed = parse_tree(source)?;
    let mut config = base_config.clone();
    if let Some(init_cfg) = parsed.init_config {
        config = merge_init_config(config, init_cfg);
        // Command-line flags outrank the document's own directive.
        apply_args(&mut config, args);
    }
    debug!(nodes = parsed.diagram.len(), depth = parsed.diagram.depth(), "parsed tree");

    let viewport = Size::new(config.render.width, config.render.height);
    let layout = compute_layout(&parsed.diagram, &config.theme, &config.layout, viewport)?;
    match format {
        OutputFormat::Svg => {
            let svg = render_svg(&layout, &config.theme);
            write_output_svg(&svg, output)?;
        }
        OutputFormat::Png => {
            let svg = render_svg(&layout, &config.theme);
            let output = output.ok_or_else(|| anyhow::anyhow!("Output path required for png output"))?;
            write_output_png(&svg, output, &config.render, &config.theme)?;
        }
        OutputFormat::Json => {
            write_layout_dump(output, &layout)?;
        }
    }
    Ok(())
}

fn apply_args(config: &mut Config, args: &Args) {
    config.render.width = args.width;
    config.render.height = args.height;
    if let Some(value) = args.horizontal_spacing {
        config.layout.horizontal_spacing = value;
    }
    if let Some(value) = args.vertical_spacing {
        config.layout.vertical_spacing = value;
    }
    if args.no_fit {
        config.layout.fit_to_viewport = false;
    }
}

fn setup_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt_layer = fmt::layer().with_writer(io::stderr).with_target(true);
    // A subscriber may already be installed when run() is embedded.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok((buf, false));
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let is_md = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| matches!(ext, "md" | "markdown"))
            .unwrap_or(false);
        return Ok((content, is_md));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, false))
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

fn extract_tree_blocks(input: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut fence: Option<&'static str> = None;
    let mut current = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim();
        match fence {
            None => fence = detect_tree_fence(trimmed),
            Some(open) if is_fence_end(trimmed, open) => {
                fence = None;
                blocks.push(current.join("\n"));
                current.clear();
            }
            Some(_) => current.push(line),
        }
    }

    blocks
}

fn detect_tree_fence(line: &str) -> Option<&'static str> {
    for fence in ["```", "~~~"] {
        if let Some(rest) = line.strip_prefix(fence)
            && rest.trim_start_matches(['`', '~']).trim().starts_with("tree")
        {
            return Some(fence);
        }
    }
    None
}

fn is_fence_end(line: &str, fence: &str) -> bool {
    line.strip_prefix(fence)
        .is_some_and(|rest| rest.trim().is_empty())
}

fn resolve_multi_outputs(
    output: Option<&Path>,
    format: OutputFormat,
    count: usize,
) -> Result<Vec<PathBuf>> {
    let ext = format.extension();
    let base = output.ok_or_else(|| anyhow::anyhow!("Output path required for markdown input"))?;
    if base.is_dir() {
        return Ok((0..count)
            .map(|idx| base.join(format!("tree-{}.{}", idx + 1, ext)))
            .collect());
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("tree");
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    Ok((0..count)
        .map(|idx| parent.join(format!("{}-{}.{}", stem, idx + 1, ext)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_tree_blocks() {
        let input = r#"
text
``` tree
root
  child
```
```rust
fn main() {}
```
~~~tree
other
~~~
"#;
        let blocks = extract_tree_blocks(input);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0], "root\n  child");
        assert_eq!(blocks[1], "other");
    }

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "tdr",
            "--horizontalSpacing",
            "14",
            "--noFit",
            "-w",
            "640",
        ]);
        let mut config = Config::default();
        apply_args(&mut config, &args);
        assert_eq!(config.layout.horizontal_spacing, 14.0);
        assert_eq!(config.layout.vertical_spacing, 6.0);
        assert!(!config.layout.fit_to_viewport);
        assert_eq!(config.render.width, 640.0);
    }

    #[test]
    fn multi_outputs_are_numbered() {
        let outputs =
            resolve_multi_outputs(Some(Path::new("out/org.svg")), OutputFormat::Svg, 2).unwrap();
        assert_eq!(
            outputs,
            vec![PathBuf::from("out/org-1.svg"), PathBuf::from("out/org-2.svg")]
        );
        assert!(resolve_multi_outputs(None, OutputFormat::Json, 2).is_err());
    }
}
