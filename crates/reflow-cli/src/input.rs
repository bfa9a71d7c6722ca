use std::path::Path;

use reflow::{LopdfBackend, MemorySource, PageSource, ReflowError, ReflowOptions};

use crate::prelude::*;

/// A document ready to feed the pipeline.
pub struct Input {
    pub source: Box<dyn PageSource>,
    /// Caller-provided key, or the md5 hex digest of the file contents.
    pub key: String,
}

/// Open a PDF, or a JSON array of pre-extracted pages when the file ends in
/// `.json`.
pub fn open(path: &Path, key: Option<String>) -> Result<Input> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path).with_context(|| f!("failed to read {display}"))?;
    if bytes.is_empty() {
        return Err(Error::EmptyInput(display).into());
    }

    let key = key.unwrap_or_else(|| f!("{:x}", md5::compute(&bytes)));
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let source: Box<dyn PageSource> = if is_json {
        let text = String::from_utf8(bytes).with_context(|| f!("{display} is not UTF-8"))?;
        Box::new(MemorySource::from_json(&text).map_err(|e| unreadable(&display, e))?)
    } else {
        Box::new(LopdfBackend::load_bytes(&bytes).map_err(|e| match e {
            ReflowError::Encrypted => Error::Encrypted(display.clone()),
            other => unreadable(&display, other),
        })?)
    };

    log::debug!("opened {display} with key {key}");
    Ok(Input { source, key })
}

/// Options from `--config` (or defaults) with command-line overrides applied.
pub fn load_options(global: &crate::Global) -> Result<ReflowOptions> {
    let mut options = match &global.config {
        Some(path) => ReflowOptions::load(path)
            .with_context(|| f!("failed to load config {}", path.display()))?,
        None => ReflowOptions::default(),
    };
    if let Some(max_pages) = global.max_pages {
        options.max_pages = Some(max_pages);
    }
    options.validate()?;
    Ok(options)
}

fn unreadable(path: &str, err: ReflowError) -> Error {
    Error::UnreadableInput {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn global(config: Option<std::path::PathBuf>, max_pages: Option<usize>) -> crate::Global {
        crate::Global {
            config,
            max_pages,
            verbose: false,
        }
    }

    #[test]
    fn test_json_pages_get_md5_key() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let json = r#"[{"size": {"width": 612, "height": 792}, "items": []}]"#;
        file.write_all(json.as_bytes()).unwrap();

        let input = open(file.path(), None).unwrap();
        assert_eq!(input.key, f!("{:x}", md5::compute(json.as_bytes())));
    }

    #[test]
    fn test_explicit_key_wins() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(b"[]").unwrap();
        let input = open(file.path(), Some("paper-7".into())).unwrap();
        assert_eq!(input.key, "paper-7");
    }

    #[test]
    fn test_empty_file_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = open(file.path(), None).err().unwrap();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::EmptyInput(_))));
    }

    #[test]
    fn test_non_pdf_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"plain text").unwrap();
        let err = open(file.path(), None).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnreadableInput { .. })
        ));
    }

    #[test]
    fn test_max_pages_flag_overrides_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"max_pages = 40\nmin_paragraph_lines = 3\n").unwrap();

        let options = load_options(&global(Some(file.path().to_path_buf()), Some(5))).unwrap();
        assert_eq!(options.max_pages, Some(5));
        assert_eq!(options.min_paragraph_lines, 3);
    }

    #[test]
    fn test_zero_max_pages_rejected() {
        assert!(load_options(&global(None, Some(0))).is_err());
    }
}
