use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use storybook::assemble::{StorybookAssembler, StorybookManifest};
use storybook::catalog::Catalog;
use storybook::cli::{CliOptions, Command, RenderOptions};
use storybook::config::{PipelineConfig, setup_logging};
use storybook::openai::{OpenAiClient, OpenAiConfig};
use storybook::overlay::{TextOverlay, load_font};
use storybook::pipeline::{Pipeline, UntitledPolicy, validate_prompt};
use tracing::{error, info};

fn build_pipeline(
    client: OpenAiClient,
    render: &RenderOptions,
    cli: &CliOptions,
) -> Result<Pipeline> {
    let font = load_font(&render.font)
        .with_context(|| format!("Failed to load font {}", render.font.display()))?;
    let overlay = TextOverlay::new(font)
        .with_font_size(render.font_size)
        .with_max_text_width_chars(render.max_text_width.get());

    let config = PipelineConfig {
        public_dir: cli.public_dir.clone(),
        image_model: render.image_model.clone(),
        negative_prompt: render.negative_prompt.clone(),
        sentences_per_page: render.sentences_per_page,
        concurrency: render.concurrency,
    };
    let policy = if render.allow_untitled {
        UntitledPolicy::Accept
    } else {
        UntitledPolicy::Reject
    };

    let assembler = StorybookAssembler::new(Arc::new(client), overlay, config);
    Ok(Pipeline::new(assembler).with_untitled_policy(policy))
}

fn openai_client(render: &RenderOptions) -> Result<OpenAiClient> {
    OpenAiClient::new(OpenAiConfig::new(render.openai_api_key.clone()))
        .context("Failed to build OpenAI client")
}

async fn publish(catalog: &Catalog, manifest: &StorybookManifest) -> Result<()> {
    catalog
        .append(manifest)
        .await
        .context("Failed to save storybook")?;
    println!("{}", manifest.title);
    for path in manifest.image_paths() {
        println!("  {}", path.display());
    }
    Ok(())
}

async fn run(cli: CliOptions) -> Result<()> {
    let catalog = Catalog::open(cli.catalog.clone())
        .await
        .context("Failed to open catalog")?;

    match &cli.command {
        Command::Generate {
            prompt,
            text_model,
            render,
        } => {
            let prompt = validate_prompt(prompt)?;
            let client = openai_client(render)?;
            let text = client
                .generate_story(text_model, prompt)
                .await
                .context("Story generation failed")?;
            let pipeline = build_pipeline(client, render, &cli)?;
            let manifest = pipeline.run(&text).await?;
            publish(&catalog, &manifest).await
        }
        Command::Assemble { input, render } => {
            let text = match input {
                Some(path) => tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut text = String::new();
                    std::io::stdin()
                        .read_to_string(&mut text)
                        .context("Failed to read story from stdin")?;
                    text
                }
            };
            let pipeline = build_pipeline(openai_client(render)?, render, &cli)?;
            let manifest = pipeline.run(&text).await?;
            publish(&catalog, &manifest).await
        }
        Command::List => {
            for entry in catalog.load().await? {
                println!("{}\t{}\t{} pages", entry.path, entry.title, entry.all_images.len());
            }
            Ok(())
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = CliOptions::parse();

    if setup_logging(cli.debug).is_err() {
        return;
    }

    match run(cli).await {
        Ok(()) => info!("Done"),
        Err(err) => {
            error!("An error occurred while generating the storybook: {:#}", err);
            std::process::exit(1);
        }
    }
}
