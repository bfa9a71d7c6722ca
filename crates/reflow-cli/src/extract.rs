use indicatif::{ProgressBar, ProgressStyle};
use reflow::{CancelToken, Reflow, TextBlock};

use crate::prelude::{println, *};

#[derive(Debug, clap::Parser)]
#[command(name = "extract")]
#[command(about = "Extract paragraph text blocks from a document")]
pub struct App {
    /// Path to the PDF file (or a JSON array of extracted pages)
    path: std::path::PathBuf,

    /// Source key stamped on every block (defaults to the md5 of the file)
    #[arg(long)]
    key: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Json,
    Text,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let options = crate::input::load_options(&global)?;
    let input = crate::input::open(&app.path, app.key)?;

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} pages")
            .unwrap(),
    );

    let cancel = CancelToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("interrupted, finishing with the pages read so far");
                cancel.cancel();
            }
        })
    };

    let progress = bar.clone();
    let reflow = Reflow::new(options)
        .with_cancel(cancel)
        .with_progress(move |index, total| {
            progress.set_length(total as u64);
            progress.set_position(index as u64 + 1);
        });

    let result = reflow.run(input.source.as_ref(), &input.key).await;
    watcher.abort();
    bar.finish_and_clear();

    let blocks = result.context("extraction failed")?;
    log::info!("{} block(s) from {}", blocks.len(), app.path.display());

    println!("{}", render(&blocks, app.format)?);
    Ok(())
}

fn render(blocks: &[TextBlock], format: Format) -> Result<String> {
    Ok(match format {
        Format::Json => serde_json::to_string_pretty(blocks)?,
        Format::Text => blocks
            .iter()
            .map(|b| f!("[{}] {}", b.page, b.content))
            .collect::<Vec<_>>()
            .join("\n\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflow::BBox;

    fn block(content: &str, page: usize) -> TextBlock {
        TextBlock {
            content: content.into(),
            page,
            bbox: BBox {
                left: 72.0,
                right: 500.0,
                top: 700.0,
                bottom: 600.0,
            },
            source_key: "k".into(),
        }
    }

    #[test]
    fn test_render_text() {
        let out = render(&[block("First.", 0), block("Second.", 1)], Format::Text).unwrap();
        assert_eq!(out, "[0] First.\n\n[1] Second.");
    }

    #[test]
    fn test_render_json_uses_wire_names() {
        let out = render(&[block("First.", 0)], Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value[0]["sourceKey"], "k");
        assert_eq!(value[0]["box"]["top"], 700.0);
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[], Format::Text).unwrap(), "");
        assert_eq!(render(&[], Format::Json).unwrap(), "[]");
    }
}
