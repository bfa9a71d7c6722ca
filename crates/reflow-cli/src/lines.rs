use reflow::parser::dedup::mark_repeats;
use reflow::{PageLineSet, Reflow};

use crate::prelude::{println, *};

#[derive(Debug, clap::Parser)]
#[command(name = "lines")]
#[command(about = "Print merged lines with their header/footer marks")]
pub struct App {
    /// Path to the PDF file (or a JSON array of extracted pages)
    path: std::path::PathBuf,

    /// Only print lines that would be removed
    #[arg(long)]
    removed: bool,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let options = crate::input::load_options(&global)?;
    let input = crate::input::open(&app.path, None)?;

    let reflow = Reflow::new(options);
    let mut pages = reflow
        .collect_lines(input.source.as_ref())
        .await
        .context("line extraction failed")?;
    mark_repeats(&mut pages, reflow.options());

    if app.removed {
        keep_removed(&mut pages, reflow.options().interior_repeat_threshold);
    }

    println!("{}", serde_json::to_string_pretty(&pages)?);
    Ok(())
}

fn keep_removed(pages: &mut PageLineSet, threshold: u32) {
    for page in pages.values_mut() {
        page.lines.retain(|line| line.dedup.should_remove(threshold));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reflow::{DedupState, Line, PageLines, PageSize, RawTextItem};

    #[test]
    fn test_keep_removed_filters_clean_lines() {
        let mut header = Line::from_item(RawTextItem::new("Draft", 72.0, 760.0, 50.0, 10.0));
        header.dedup = DedupState::EdgeRepeatForward;
        let body = Line::from_item(RawTextItem::new("Body", 72.0, 700.0, 50.0, 10.0));
        let mut margin = Line::from_item(RawTextItem::new("Note", 10.0, 400.0, 30.0, 10.0));
        margin.dedup = DedupState::InteriorRepeat(2);

        let mut pages = PageLineSet::new();
        pages.insert(
            0,
            PageLines {
                size: PageSize::LETTER,
                lines: vec![header, body, margin],
            },
        );

        keep_removed(&mut pages, 3);
        let texts: Vec<&str> = pages[&0].lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Draft"]);
    }
}
