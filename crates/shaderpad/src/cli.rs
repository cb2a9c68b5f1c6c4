use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "shaderpad",
    author,
    version,
    about = "GLSL shader playground with live scriptable uniforms",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Project file to open (TOML). Runs the bundled default shader when omitted.
    #[arg(value_name = "PROJECT")]
    pub project: Option<PathBuf>,

    /// Override the initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT")]
    pub size: Option<String>,

    /// Render one frame, write it as a PNG to this path, then exit.
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the default project (shader body plus example uniforms) to a file.
    Init {
        /// Destination path for the project TOML.
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

/// Parses a `WIDTHxHEIGHT` specification.
pub fn parse_surface_size(value: &str) -> anyhow::Result<(u32, u32)> {
    let mut parts = value.trim().split('x');
    let width = parts
        .next()
        .and_then(|part| part.trim().parse::<u32>().ok());
    let height = parts
        .next()
        .and_then(|part| part.trim().parse::<u32>().ok());
    match (width, height, parts.next()) {
        (Some(width), Some(height), None) if width > 0 && height > 0 => Ok((width, height)),
        _ => anyhow::bail!("invalid size '{value}', expected WIDTHxHEIGHT (e.g. 1280x720)"),
    }
}
