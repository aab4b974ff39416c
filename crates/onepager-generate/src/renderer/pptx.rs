use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use onepager_core::TEMPLATE_EXTENSION;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use super::{RenderError, Renderer};
use crate::context::SubstitutionContext;

/// Renders `.pptx` templates by rewriting placeholder text inside the XML
/// parts of the package.
///
/// PowerPoint stores `<<TAG>>` as `&lt;&lt;TAG&gt;&gt;`, so each tag is
/// matched both literally and XML-escaped. Values are always written escaped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PptxRenderer;

impl PptxRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for PptxRenderer {
    fn template_extension(&self) -> &str {
        TEMPLATE_EXTENSION
    }

    fn render(
        &self,
        template: &Path,
        context: &SubstitutionContext,
        destination: &Path,
    ) -> Result<(), RenderError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let result = rewrite_package(template, context, destination);
        if result.is_err() {
            fs::remove_file(destination).ok();
        }
        result
    }
}

fn rewrite_package(
    template: &Path,
    context: &SubstitutionContext,
    destination: &Path,
) -> Result<(), RenderError> {
    let replacements = Replacements::new(context);
    let mut archive = ZipArchive::new(File::open(template)?)?;
    let mut writer = ZipWriter::new(BufWriter::new(File::create(destination)?));
    let mut parts_rewritten = 0_usize;

    for position in 0..archive.len() {
        let mut entry = archive.by_index(position)?;
        let name = entry.name().to_string();
        let options = SimpleFileOptions::default()
            .compression_method(entry.compression())
            .unix_permissions(entry.unix_mode().unwrap_or(0o644));

        if entry.is_dir() {
            writer.add_directory(name, options)?;
            continue;
        }

        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;

        if name.ends_with(".xml") {
            if let Some(rewritten) = replacements.apply(&content) {
                content = rewritten.into_bytes();
                parts_rewritten += 1;
            }
        }

        writer.start_file(name, options)?;
        writer.write_all(&content)?;
    }

    let mut inner = writer.finish()?;
    inner.flush()?;

    tracing::debug!(
        template = %template.display(),
        destination = %destination.display(),
        parts_rewritten,
        "package rendered"
    );
    Ok(())
}

struct Replacement {
    tag: String,
    escaped_tag: String,
    value: String,
}

struct Replacements {
    items: Vec<Replacement>,
}

impl Replacements {
    fn new(context: &SubstitutionContext) -> Self {
        let mut items: Vec<Replacement> = context
            .iter()
            .filter(|(tag, _)| !tag.is_empty())
            .map(|(tag, value)| Replacement {
                tag: tag.to_string(),
                escaped_tag: escape_xml(tag),
                value: escape_xml(value),
            })
            .collect();
        // Longer tags first so a tag never clobbers another that contains it.
        items.sort_by(|a, b| b.tag.len().cmp(&a.tag.len()));
        Self { items }
    }

    /// The rewritten part, or `None` when no tag occurs in it.
    ///
    /// A single left-to-right pass: inserted values are never scanned again.
    fn apply(&self, content: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(content);
        let mut output = String::with_capacity(text.len());
        let mut rest: &str = &text;
        let mut changed = false;

        while let Some(next) = rest.chars().next() {
            match self.match_at(rest) {
                Some((consumed, value)) => {
                    output.push_str(value);
                    rest = &rest[consumed..];
                    changed = true;
                }
                None => {
                    output.push(next);
                    rest = &rest[next.len_utf8()..];
                }
            }
        }

        changed.then_some(output)
    }

    fn match_at(&self, text: &str) -> Option<(usize, &str)> {
        self.items.iter().find_map(|item| {
            if text.starts_with(&item.tag) {
                Some((item.tag.len(), item.value.as_str()))
            } else if text.starts_with(&item.escaped_tag) {
                Some((item.escaped_tag.len(), item.value.as_str()))
            } else {
                None
            }
        })
    }
}

fn escape_xml(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
