use anyhow::Result;
use clap::{Parser, Subcommand};
use image_multitool::app::{App, Command};
use image_multitool::models::{Config, OutputFormat, SizeUnit};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "image-multitool")]
#[command(about = "Resize images or compress them toward a target size")]
struct CliArgs {
    /// Directory the download is written to (overrides IMAGE_MULTITOOL_OUTPUT_DIR).
    #[arg(long, global = true, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Print the conversion report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Stretch an image to exact pixel dimensions.
    Resize {
        input: PathBuf,
        /// Defaults to the source width.
        #[arg(long)]
        width: Option<u32>,
        /// Defaults to the source height.
        #[arg(long)]
        height: Option<u32>,
        /// image/jpeg, image/png, image/webp (or jpg, png, webp).
        #[arg(long, value_parser = parse_format_arg)]
        format: Option<OutputFormat>,
    },
    /// Re-encode at a quality estimated from a target size.
    Compress {
        input: PathBuf,
        #[arg(long)]
        target: f64,
        #[arg(long, default_value = "KB", value_parser = parse_unit_arg)]
        unit: SizeUnit,
        #[arg(long, value_parser = parse_format_arg)]
        format: Option<OutputFormat>,
    },
}

fn parse_format_arg(input: &str) -> std::result::Result<OutputFormat, String> {
    input.parse().map_err(|_| {
        format!(
            "Invalid format '{}'. Expected image/jpeg, image/png or image/webp",
            input
        )
    })
}

fn parse_unit_arg(input: &str) -> std::result::Result<SizeUnit, String> {
    input
        .parse()
        .map_err(|_| format!("Invalid unit '{}'. Expected KB or MB", input))
}

fn into_command(command: CliCommand, default_format: OutputFormat) -> Command {
    match command {
        CliCommand::Resize {
            input,
            width,
            height,
            format,
        } => Command::Resize {
            input,
            width,
            height,
            format: format.unwrap_or(default_format),
        },
        CliCommand::Compress {
            input,
            target,
            unit,
            format,
        } => Command::Compress {
            input,
            target,
            unit,
            format: format.unwrap_or(default_format),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_multitool=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = CliArgs::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }

    let app = App::new(&config);
    let command = into_command(args.command, config.default_format);

    match app.run(command).await {
        Ok(report) => {
            info!("Saved {}", report.output_path.display());
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Ok(())
        }
        Err(e) => {
            error!("Conversion failed: {}", e);
            std::process::exit(1);
        }
    }
}
