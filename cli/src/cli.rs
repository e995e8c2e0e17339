use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Generate and edit images with Gemini from the terminal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, default_value_t = false, global = true)]
    pub verbose: bool,

    /// Path to a config file (defaults to ~/.config/nano-banana/config.toml)
    #[arg(long, env = "NANO_BANANA_CONFIG", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Text(+images)-to-image generation
    Generate {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Generation grounded in Google Search, with citations
    Grounding {
        #[command(flatten)]
        request: RequestArgs,

        /// Disable the Google Search tool
        #[arg(long, default_value_t = false)]
        no_search: bool,
    },

    /// Single or batched generation with grounding
    Aio {
        #[command(flatten)]
        request: RequestArgs,

        /// Number of images to generate (1-10)
        #[arg(short = 'n', long, default_value_t = 1)]
        count: u32,

        /// Disable the Google Search tool
        #[arg(long, default_value_t = false)]
        no_search: bool,
    },

    /// Interactive multi-turn image editing
    Chat {
        #[command(flatten)]
        options: GenerationFlags,

        /// Image to start the conversation from
        #[arg(long)]
        seed: Option<PathBuf>,

        /// Where each turn's image is written; turns are numbered
        #[arg(short, long, default_value = "nano-banana-chat.png")]
        output: PathBuf,
    },

    /// List the available nodes
    Nodes,

    /// Write the effective configuration to the config file
    InitConfig,
}

/// Prompt, reference images and output location
#[derive(ClapArgs, Debug, Clone)]
pub struct RequestArgs {
    /// The prompt describing the image
    #[arg(index = 1)]
    pub prompt: Option<String>,

    /// Reference image (repeatable, up to 6)
    #[arg(short, long = "image")]
    pub images: Vec<PathBuf>,

    /// Output PNG path; batches get a numeric suffix
    #[arg(short, long, default_value = "nano-banana.png")]
    pub output: PathBuf,

    #[command(flatten)]
    pub options: GenerationFlags,
}

/// Overrides for the generation settings from the config file
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct GenerationFlags {
    #[arg(short, long, env = "NANO_BANANA_MODEL")]
    pub model: Option<String>,

    /// One of 1:1 2:3 3:2 3:4 4:3 4:5 5:4 9:16 16:9 21:9
    #[arg(short, long)]
    pub aspect_ratio: Option<String>,

    /// One of 1K 2K 4K
    #[arg(short = 's', long)]
    pub image_size: Option<String>,

    /// Sampling temperature (0.0-2.0)
    #[arg(short, long)]
    pub temperature: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aio() {
        let args = Args::try_parse_from([
            "nano-banana",
            "aio",
            "a banana",
            "-n",
            "3",
            "-i",
            "a.png",
            "-i",
            "b.jpg",
            "--aspect-ratio",
            "16:9",
            "--no-search",
        ])
        .unwrap();

        match args.command {
            Command::Aio {
                request,
                count,
                no_search,
            } => {
                assert_eq!(request.prompt.as_deref(), Some("a banana"));
                assert_eq!(count, 3);
                assert!(no_search);
                assert_eq!(request.images.len(), 2);
                assert_eq!(request.options.aspect_ratio.as_deref(), Some("16:9"));
                assert_eq!(request.output, PathBuf::from("nano-banana.png"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_verbose_is_global() {
        let args = Args::try_parse_from(["nano-banana", "nodes", "--verbose"]).unwrap();
        assert!(args.verbose);
        assert!(matches!(args.command, Command::Nodes));
    }
}
