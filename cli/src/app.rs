use anyhow::{Context, Result};
use banana_core::{get_default_config_file, BananaConfig, APP_NAME};
use banana_nodes::{
    node_class_mappings, ImageCodec, MultiTurnChatInputs, NanoBanana, NanoBananaAio,
    NanoBananaAioInputs, NanoBananaGrounding, NanoBananaGroundingInputs, NanoBananaInputs,
    NanoBananaMultiTurnChat, Node, PixelBuffer, PngCodec,
};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::cli::{GenerationFlags, RequestArgs};
use crate::logging::log_error;
use crate::output::{numbered_path, print_nodes, print_saved, print_section, write_frames};

/// Generation settings after applying CLI overrides to the config file
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub model_name: String,
    pub aspect_ratio: String,
    pub image_size: String,
    pub temperature: f32,
}

impl Settings {
    pub fn resolve(config: &BananaConfig, flags: &GenerationFlags) -> Self {
        let defaults = BananaConfig::default();
        let pick = |flag: &Option<String>, file: &Option<String>, fallback: &Option<String>| {
            flag.clone()
                .or_else(|| file.clone())
                .or_else(|| fallback.clone())
                .unwrap_or_default()
        };

        Self {
            model_name: pick(&flags.model, &config.model_name, &defaults.model_name),
            aspect_ratio: pick(&flags.aspect_ratio, &config.aspect_ratio, &defaults.aspect_ratio),
            image_size: pick(&flags.image_size, &config.image_size, &defaults.image_size),
            temperature: flags
                .temperature
                .or(config.temperature)
                .unwrap_or(1.0),
        }
    }
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner} {msg}")
    {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Reads and decodes reference images from disk
pub fn load_images(paths: &[PathBuf]) -> Result<Vec<PixelBuffer>> {
    paths
        .iter()
        .map(|path| {
            let bytes =
                fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            PngCodec
                .decode(&bytes)
                .with_context(|| format!("Failed to decode {}", path.display()))
        })
        .collect()
}

pub async fn run_generate(config: BananaConfig, request: RequestArgs) -> Result<()> {
    let settings = Settings::resolve(&config, &request.options);
    let defaults = NanoBananaInputs::default();
    let inputs = NanoBananaInputs {
        model_name: settings.model_name,
        prompt: request.prompt.unwrap_or(defaults.prompt),
        images: load_images(&request.images)?,
        aspect_ratio: settings.aspect_ratio,
        image_size: settings.image_size,
        temperature: settings.temperature,
    };
    info!(model = %inputs.model_name, "Running {}", NanoBanana::DISPLAY_NAME);

    let mut node = NanoBanana::new(config);
    let progress = spinner("Generating image...");
    let result = node.try_run(inputs).await;
    progress.finish_and_clear();

    let outputs = result.context("Image generation failed")?;
    print_saved(&write_frames(&request.output, &outputs.image)?);
    print_section("Thinking", &outputs.thinking);
    Ok(())
}

pub async fn run_grounding(
    config: BananaConfig,
    request: RequestArgs,
    use_search: bool,
) -> Result<()> {
    let settings = Settings::resolve(&config, &request.options);
    let defaults = NanoBananaGroundingInputs::default();
    let inputs = NanoBananaGroundingInputs {
        model_name: settings.model_name,
        prompt: request.prompt.unwrap_or(defaults.prompt),
        use_search,
        images: load_images(&request.images)?,
        aspect_ratio: settings.aspect_ratio,
        image_size: settings.image_size,
        temperature: settings.temperature,
    };
    info!(model = %inputs.model_name, use_search, "Running {}", NanoBananaGrounding::DISPLAY_NAME);

    let mut node = NanoBananaGrounding::new(config);
    let progress = spinner("Generating grounded image...");
    let result = node.try_run(inputs).await;
    progress.finish_and_clear();

    let outputs = result.context("Grounded generation failed")?;
    print_saved(&write_frames(&request.output, &outputs.image)?);
    print_section("Response", &outputs.text_response);
    print_section("Sources", &outputs.grounding_sources);
    Ok(())
}

pub async fn run_aio(
    config: BananaConfig,
    request: RequestArgs,
    image_count: u32,
    use_search: bool,
) -> Result<()> {
    let settings = Settings::resolve(&config, &request.options);
    let defaults = NanoBananaAioInputs::default();
    let inputs = NanoBananaAioInputs {
        model_name: settings.model_name,
        prompt: request.prompt.unwrap_or(defaults.prompt),
        image_count,
        use_search,
        images: load_images(&request.images)?,
        aspect_ratio: settings.aspect_ratio,
        image_size: settings.image_size,
        temperature: settings.temperature,
    };
    info!(model = %inputs.model_name, image_count, "Running {}", NanoBananaAio::DISPLAY_NAME);

    let mut node = NanoBananaAio::new(config);
    let progress = spinner(&format!(
        "Generating {} image{}...",
        image_count,
        if image_count == 1 { "" } else { "s" }
    ));
    let result = node.try_run(inputs).await;
    progress.finish_and_clear();

    let outputs = result.context("Generation failed")?;
    print_saved(&write_frames(&request.output, &outputs.images)?);
    print_section("Thinking", &outputs.thinking);
    print_section("Sources", &outputs.grounding_sources);
    Ok(())
}

/// Runs an interactive multi-turn editing session
pub async fn run_interactive_chat(
    config: BananaConfig,
    flags: GenerationFlags,
    seed: Option<PathBuf>,
    output: PathBuf,
) -> Result<()> {
    let settings = Settings::resolve(&config, &flags);
    let seed = match seed {
        Some(path) => load_images(&[path])?.into_iter().next(),
        None => None,
    };
    let mut node = NanoBananaMultiTurnChat::new(config);

    println!("Starting multi-turn image chat with {}.", settings.model_name.bold());
    println!("Type 'reset' to start over, 'history' to show past turns, 'exit' or 'quit' to end the session.");
    println!();

    loop {
        print!("{}: ", "You".green().bold());
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut input = String::new();
        let read = io::stdin()
            .read_line(&mut input)
            .context("Failed to read input")?;
        if read == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            println!("Exiting chat session.");
            break;
        }
        if input.eq_ignore_ascii_case("reset") {
            node.reset();
            println!("Chat session reset.");
            continue;
        }
        if input.eq_ignore_ascii_case("history") {
            for (i, turn) in node.state().turns().iter().enumerate() {
                println!("{}. {} -> {}", i + 1, turn.prompt, turn.response);
            }
            continue;
        }

        let inputs = MultiTurnChatInputs {
            model_name: settings.model_name.clone(),
            prompt: input.to_string(),
            reset_chat: false,
            aspect_ratio: settings.aspect_ratio.clone(),
            image_size: settings.image_size.clone(),
            temperature: settings.temperature,
            image_input: seed.clone(),
        };

        let progress = spinner("Generating image...");
        debug!(prompt = %input, "Sending chat turn");
        let result = node.try_run(inputs).await;
        progress.finish_and_clear();

        match result {
            Ok(outputs) => {
                let target = numbered_path(&output, node.state().turns().len());
                print_saved(&write_frames(&target, &outputs.image)?);
                print_section("Assistant", &outputs.response_text);
                debug!(metadata = %outputs.metadata, "Turn metadata");
            }
            Err(e) => log_error(&e.to_string()),
        }

        println!();
    }

    Ok(())
}

pub fn list_nodes() {
    print_nodes(&node_class_mappings());
}

/// Saves the effective configuration, creating the directory if needed
pub fn init_config(config: &BananaConfig, path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => get_default_config_file(APP_NAME)?,
    };
    config.save_to_file(&path)?;
    println!("{} {}", "Wrote".green().bold(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let config = BananaConfig {
            aspect_ratio: Some("4:3".into()),
            temperature: Some(0.5),
            ..BananaConfig::default()
        };
        let flags = GenerationFlags {
            aspect_ratio: Some("21:9".into()),
            ..Default::default()
        };

        let settings = Settings::resolve(&config, &flags);
        assert_eq!(settings.aspect_ratio, "21:9");
        assert_eq!(settings.temperature, 0.5);
        assert_eq!(settings.model_name, "gemini-3-pro-image-preview");
        assert_eq!(settings.image_size, "2K");
    }

    #[test]
    fn test_load_images_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_images(&[dir.path().join("missing.png")]).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_init_config_writes_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = BananaConfig {
            project_id: Some("my-project".into()),
            ..BananaConfig::default()
        };
        init_config(&config, Some(&path)).unwrap();

        let loaded = BananaConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.project_id.as_deref(), Some("my-project"));
    }
}
