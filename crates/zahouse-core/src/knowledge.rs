use std::path::Path;

use tracing::{info, warn};

use crate::document::{extract_pdf_text, normalize_whitespace};

#[derive(Debug, Clone)]
pub struct KnowledgeSource {
    pub name: String,
    pub text: String,
}

/// Reference documents loaded once at startup and prepended to every prompt.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    sources: Vec<KnowledgeSource>,
    rendered: String,
}

impl KnowledgeBase {
    pub fn from_sources(sources: Vec<KnowledgeSource>) -> Self {
        let rendered = sources
            .iter()
            .map(|s| format!("--- SOURCE: {} ---\n{}", s.name, s.text))
            .collect::<Vec<_>>()
            .join("\n\n");
        Self { sources, rendered }
    }

    /// Load every `.pdf`, `.txt` and `.md` file directly inside `dir`.
    ///
    /// A missing directory gives an empty base; unreadable files are skipped.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) => {
                warn!(dir = %dir.display(), "knowledge base not loaded: {e}");
                return Self::default();
            }
        };

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        let mut sources = Vec::new();
        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
                .unwrap_or_default();

            let text = match ext.as_str() {
                "pdf" => std::fs::read(&path)
                    .map_err(|e| e.to_string())
                    .and_then(|bytes| extract_pdf_text(&bytes).map_err(|e| e.to_string())),
                "txt" | "md" => std::fs::read_to_string(&path).map_err(|e| e.to_string()),
                _ => continue,
            };

            match text {
                Ok(text) => {
                    let text = normalize_whitespace(&text);
                    if text.is_empty() {
                        warn!(file = %name, "knowledge file has no text, skipping");
                        continue;
                    }
                    info!(file = %name, chars = text.chars().count(), "loaded knowledge source");
                    sources.push(KnowledgeSource { name, text });
                }
                Err(e) => warn!(file = %name, "failed to load knowledge source: {e}"),
            }
        }

        info!(dir = %dir.display(), sources = sources.len(), "knowledge base ready");
        Self::from_sources(sources)
    }

    pub fn text(&self) -> &str {
        &self.rendered
    }

    pub fn sources(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }
}
