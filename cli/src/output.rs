use anyhow::{Context, Result};
use banana_nodes::{ImageCodec, NodeDescriptor, PixelBuffer, PngCodec};
use colored::*;
use pulldown_cmark::{Event as MdEvent, HeadingLevel, Options, Parser as MdParser, Tag};
use std::fs;
use std::path::{Path, PathBuf};

/// Print a labelled block of model text to the terminal
pub fn print_section(label: &str, body: &str) {
    if body.trim().is_empty() {
        return;
    }
    println!("{}:\n{}", label.blue().bold(), render_markdown(body));
}

pub fn print_saved(paths: &[PathBuf]) {
    for path in paths {
        println!("{} {}", "Saved".green().bold(), path.display());
    }
}

pub fn print_nodes(nodes: &[NodeDescriptor]) {
    for node in nodes {
        println!(
            "{}  {} ({})",
            node.name.green().bold(),
            node.display_name,
            node.category.dimmed()
        );
        println!("    returns: {}", node.return_names.join(", "));
    }
}

/// Writes every frame as its own PNG. A single frame goes to `path` itself;
/// batches become `stem-1.png`, `stem-2.png`, …
pub fn write_frames(path: &Path, images: &PixelBuffer) -> Result<Vec<PathBuf>> {
    let codec = PngCodec;
    let mut written = Vec::with_capacity(images.batch());

    for index in 0..images.batch() {
        let target = if images.batch() == 1 {
            path.to_path_buf()
        } else {
            numbered_path(path, index + 1)
        };
        let frame = images
            .frame(index)
            .with_context(|| format!("Missing frame {}", index))?;
        let single = PixelBuffer::new(1, images.height(), images.width(), frame.to_vec())?;
        let bytes = codec.encode(&single)?;

        fs::write(&target, bytes)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        written.push(target);
    }

    Ok(written)
}

/// `out.png` with `n = 2` gives `out-2.png`
pub fn numbered_path(path: &Path, n: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    path.with_file_name(format!("{}-{}.{}", stem, n, extension))
}

/// Render the markdown that grounding documents use (headings, lists, links,
/// emphasis, block quotes) for the terminal
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = MdParser::new_ext(markdown, options);
    let mut output = String::new();
    let mut in_block_quote = false;
    let mut link_stack: Vec<String> = Vec::new();

    for event in parser {
        match event {
            MdEvent::Start(Tag::Heading(level, ..)) => match level {
                HeadingLevel::H1 => output.push_str(&format!("\n{} ", "##".bright_cyan().bold())),
                HeadingLevel::H2 => output.push_str(&format!("\n{} ", "#".bright_cyan().bold())),
                _ => output.push('\n'),
            },
            MdEvent::End(Tag::Heading(..)) => {
                output.push('\n');
            }
            MdEvent::Start(Tag::Paragraph) => {
                if !output.is_empty() && !output.ends_with('\n') {
                    output.push_str("\n\n");
                }
            }
            MdEvent::End(Tag::Paragraph) => {
                output.push('\n');
            }
            MdEvent::Start(Tag::BlockQuote) => {
                in_block_quote = true;
            }
            MdEvent::End(Tag::BlockQuote) => {
                in_block_quote = false;
            }
            MdEvent::Start(Tag::List(_)) => {
                output.push('\n');
            }
            MdEvent::End(Tag::List(_)) => {}
            MdEvent::Start(Tag::Item) => {
                output.push_str(&format!("{}  ", "•".yellow()));
            }
            MdEvent::End(Tag::Item) => {
                if !output.ends_with('\n') {
                    output.push('\n');
                }
            }
            MdEvent::Start(Tag::Link(_, dest, _)) => {
                link_stack.push(dest.to_string());
            }
            MdEvent::End(Tag::Link(..)) => {
                if let Some(dest) = link_stack.pop() {
                    output.push_str(&format!(" <{}>", dest.underline()));
                }
            }
            MdEvent::Code(ref code) => {
                output.push_str(&format!("`{}`", code.on_bright_black().white()));
            }
            MdEvent::Text(ref text) => {
                if in_block_quote {
                    output.push_str(&text.italic().to_string());
                } else if !link_stack.is_empty() {
                    output.push_str(&text.bold().to_string());
                } else {
                    output.push_str(text);
                }
            }
            MdEvent::SoftBreak | MdEvent::HardBreak => {
                output.push('\n');
            }
            _ => {}
        }
    }

    output.trim_end().to_string()
}
