use crate::error::IndexError;
use crate::normalize;
use lopdf::Document;
use std::path::Path;
use tracing::warn;

/// One pdf extraction backend. Returns normalized, non-empty page texts in
/// page order; the result may be shorter than the true page count when
/// individual pages fail.
pub trait PdfBackend {
    fn name(&self) -> &'static str;

    fn extract_pages(&self, path: &Path, max_pages: Option<usize>)
        -> Result<Vec<String>, IndexError>;
}

/// Primary backend: page-by-page extraction through lopdf. A failing page
/// is logged and skipped; only an unreadable file is fatal.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfBackend;

impl PdfBackend for LopdfBackend {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract_pages(
        &self,
        path: &Path,
        max_pages: Option<usize>,
    ) -> Result<Vec<String>, IndexError> {
        let document = Document::load(path).map_err(|error| IndexError::Extraction {
            path: path.to_path_buf(),
            detail: error.to_string(),
        })?;

        let mut pages = Vec::new();
        for (visited, (page_no, _page_id)) in document.get_pages().into_iter().enumerate() {
            if let Some(limit) = max_pages {
                if visited >= limit {
                    break;
                }
            }

            let text = match document.extract_text(&[page_no]) {
                Ok(text) => text,
                Err(error) => {
                    warn!(
                        page = page_no,
                        path = %path.display(),
                        %error,
                        "skipping unreadable page"
                    );
                    continue;
                }
            };

            let cleaned = normalize::clean(&text);
            if !cleaned.is_empty() {
                pages.push(cleaned);
            }
        }

        Ok(pages)
    }
}

/// Secondary backend: whole-file page extraction through pdf-extract. Used
/// when the primary backend cannot read the file at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractBackend;

impl PdfBackend for PdfExtractBackend {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract_pages(
        &self,
        path: &Path,
        max_pages: Option<usize>,
    ) -> Result<Vec<String>, IndexError> {
        let bytes = std::fs::read(path)?;
        let raw_pages = pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|error| {
            IndexError::Extraction {
                path: path.to_path_buf(),
                detail: error.to_string(),
            }
        })?;

        let limit = max_pages.unwrap_or(raw_pages.len());
        Ok(raw_pages
            .into_iter()
            .take(limit)
            .map(|page| normalize::clean(&page))
            .filter(|page| !page.is_empty())
            .collect())
    }
}

/// Dispatching extractor: tries the primary backend and falls back to the
/// secondary when the primary cannot open the file.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor {
    primary: LopdfBackend,
    fallback: PdfExtractBackend,
}

impl PdfExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract_pages(
        &self,
        path: &Path,
        max_pages: Option<usize>,
    ) -> Result<Vec<String>, IndexError> {
        let primary_error = match self.primary.extract_pages(path, max_pages) {
            Ok(pages) => return Ok(pages),
            Err(error) => error,
        };

        warn!(
            backend = self.primary.name(),
            path = %path.display(),
            error = %primary_error,
            "primary pdf backend failed, trying fallback"
        );

        self.fallback
            .extract_pages(path, max_pages)
            .map_err(|fallback_error| IndexError::Extraction {
                path: path.to_path_buf(),
                detail: format!(
                    "{} failed ({primary_error}); {} failed ({fallback_error})",
                    self.primary.name(),
                    self.fallback.name()
                ),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{PdfBackend, PdfExtractBackend, PdfExtractor};
    use crate::error::IndexError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn unreadable_file_fails_on_both_backends() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.pdf");
        fs::write(&path, b"%PDF-1.4\n%not really a pdf")?;

        let extractor = PdfExtractor::new();
        let result = extractor.extract_pages(&path, None);

        match result {
            Err(IndexError::Extraction { path: failed, detail }) => {
                assert_eq!(failed, path);
                assert!(detail.contains("lopdf"));
                assert!(detail.contains("pdf-extract"));
            }
            other => panic!("expected extraction error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        let extractor = PdfExtractor::new();
        assert!(extractor
            .extract_pages(std::path::Path::new("/nonexistent/x.pdf"), None)
            .is_err());
    }

    #[test]
    fn fallback_backend_reports_garbage_input() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("garbage.pdf");
        fs::write(&path, b"not a pdf at all")?;

        let result = PdfExtractBackend.extract_pages(&path, None);
        assert!(result.is_err());
        Ok(())
    }
}
