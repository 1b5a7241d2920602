use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use restyle_core::{Engine, EngineOptions, MixinRegistry, Patterns};

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Migrate {
            input,
            out_dir,
            patterns,
            mixins,
            brand_payload,
            keep_chrome,
        } => {
            let source = fs::read_to_string(&input)
                .with_context(|| format!("reading {}", input.display()))?;

            let patterns = match patterns {
                Some(path) => {
                    let data = fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    Patterns::from_json(&data)?
                }
                None => Patterns::default(),
            };
            let registry = match mixins {
                Some(path) => {
                    let data = fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    MixinRegistry::with_templates_json(&data)?
                }
                None => MixinRegistry::builtin(),
            };
            let options = EngineOptions {
                exclude_chrome: !keep_chrome,
                brand_payload: brand_payload
                    .map(|path| {
                        fs::read_to_string(&path)
                            .with_context(|| format!("reading {}", path.display()))
                    })
                    .transpose()?,
            };

            let engine = Engine::new(registry, &patterns)?;
            let output = engine.migrate(&source, &options);

            fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating {}", out_dir.display()))?;
            for (bucket, text) in &output.buckets {
                let path = out_dir.join(format!("{}.css", bucket));
                fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
                println!("wrote {} ({} bytes)", path.display(), text.len());
            }

            println!(
                "rules: {} detail-view, {} listing-view, {} general; {} excluded",
                output.counts.detail_view,
                output.counts.listing_view,
                output.counts.general,
                output.excluded
            );
            if !output.unconverted_mixins.is_empty() {
                println!("unconverted mixins: {}", output.unconverted_mixins.join(", "));
            }
            for warning in &output.warnings {
                eprintln!("warning: {}", warning);
            }
        }
    }
    Ok(())
}
