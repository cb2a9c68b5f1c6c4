use std::path::Path;

use anyhow::{anyhow, Context, Result};
use canvas::UniformRegistry;
use scripting::RhaiUniformEngine;
use tracing_subscriber::EnvFilter;

use crate::cli::{self, Cli, Command, RunArgs};
use crate::defaults;
use crate::project::{Project, ProviderSpec};
use crate::window;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();
    match cli.command {
        Some(Command::Init { path }) => {
            defaults::default_project().save(&path)?;
            tracing::info!(path = %path.display(), "default project written");
            Ok(())
        }
        None => run_project(cli.run),
    }
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_project(args: RunArgs) -> Result<()> {
    let size = match args.size.as_deref() {
        Some(spec) => cli::parse_surface_size(spec)?,
        None => (1280, 720),
    };
    let engine = RhaiUniformEngine::new();
    let (registry, body) = load_session(&engine, args.project.as_deref())?;
    tracing::info!(
        uniforms = registry.len(),
        project = %args.project.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "<default>".to_string()),
        "starting shaderpad"
    );
    window::run_window(
        window::WindowOptions {
            size,
            project: args.project,
            export: args.export,
        },
        engine,
        registry,
        body,
    )
}

/// Builds the uniform registry (built-ins first, then the project's entries)
/// and resolves the fragment body. A user script that fails to compile is not
/// fatal — the provider just stays silent until the next reload — but broken
/// built-ins and malformed definitions are.
pub fn load_session(
    engine: &RhaiUniformEngine,
    project_path: Option<&Path>,
) -> Result<(UniformRegistry, String)> {
    let mut registry = UniformRegistry::new();
    for script in defaults::builtin_uniform_scripts() {
        let name = script.name.clone();
        let id = registry.add_scripted(script);
        registry
            .compile_provider(id, engine)
            .with_context(|| format!("failed to compile built-in uniform '{name}'"))?;
    }

    let body = match project_path {
        Some(path) => {
            let project = Project::load(path)?;
            let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
            for definition in &project.uniforms {
                let spec = definition
                    .provider()
                    .with_context(|| format!("invalid uniform '{}'", definition.name))?;
                match spec {
                    ProviderSpec::Static(value) => {
                        registry
                            .add_static(definition.name.clone(), definition.ty, value)
                            .map_err(|err| {
                                anyhow!("invalid uniform '{}': {err}", definition.name)
                            })?;
                    }
                    ProviderSpec::Scripted(script) => {
                        let id = registry.add_scripted(script);
                        if let Err(error) = registry.compile_provider(id, engine) {
                            tracing::warn!(
                                uniform = %definition.name,
                                %error,
                                "uniform script failed to compile; it will contribute nothing"
                            );
                        }
                    }
                }
            }
            project.resolve_main(base_dir)?
        }
        None => defaults::DEFAULT_MAIN.to_string(),
    };

    Ok((registry, body))
}
