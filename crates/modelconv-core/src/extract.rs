//! Model extraction: streaming a model out as one JSON document.
//!
//! [`JsonExtractor`] walks the elements of the configured root type and
//! writes their features straight into the top-level object. Nested
//! elements reached through reference features become nested objects.
//! Nothing is buffered beyond a [`BufWriter`], so document size is bounded
//! by the sink, not by memory.
//!
//! ## Layout
//!
//! ```text
//! {
//!   "id":"V1",
//!   "speed":42,
//!   "probes":[ {
//!     "value":1
//!   }, {
//!     "value":2
//!   }]
//! }
//! ```
//!
//! Indentation (two spaces per depth) is cosmetic. Null features produce no
//! member; empty multi-valued features produce `[]`.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::config::{ExtractOptions, ExtractorConfig};
use crate::error::{ExtractError, SchemaError};
use crate::model::{ElementId, FeatureValue, Model, Scalar};
use crate::schema::{Feature, ValueKind};
use crate::store::{HandleStore, ModelHandle};
use crate::uri::to_file_path;

/// Where an extracted document goes.
pub enum Destination<'a> {
    /// A file, replaced atomically once the document is complete.
    Path(PathBuf),
    /// An already-open sink. It is flushed, not closed: the caller keeps
    /// ownership and may keep writing after extraction returns.
    Sink(&'a mut dyn Write),
}

impl Destination<'_> {
    /// A path or `file:` URI.
    pub fn uri(uri_or_path: &str) -> Self {
        Destination::Path(to_file_path(uri_or_path))
    }
}

impl From<&Path> for Destination<'_> {
    fn from(path: &Path) -> Self {
        Destination::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Destination<'_> {
    fn from(path: PathBuf) -> Self {
        Destination::Path(path)
    }
}

impl<'a> From<&'a mut dyn Write> for Destination<'a> {
    fn from(sink: &'a mut dyn Write) -> Self {
        Destination::Sink(sink)
    }
}

/// Serializes a model held in a [`HandleStore`].
pub trait Extractor {
    fn extract(
        &self,
        store: &dyn HandleStore,
        model: ModelHandle,
        destination: Destination<'_>,
        options: &ExtractOptions,
    ) -> Result<(), ExtractError>;
}

#[derive(Debug, Clone, Default)]
pub struct JsonExtractor {
    config: ExtractorConfig,
}

impl JsonExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn with_root_type(mut self, root_type: impl Into<String>) -> Self {
        self.config.root_type = root_type.into();
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Stream `model` into `sink` and flush it.
    ///
    /// Fails with [`SchemaError::UnknownType`] if the root type is not part
    /// of the model's schema; nothing is written in that case.
    pub fn write_model<W: Write>(&self, model: &Model, sink: W) -> Result<usize, ExtractError> {
        let roots = model.elements_of_kind(&self.config.root_type)?;
        let mut writer = DocumentWriter {
            model,
            out: BufWriter::new(sink),
            max_depth: self.config.max_depth,
        };
        writer.write_document(&roots)?;
        writer.out.flush()?;
        Ok(roots.len())
    }

    /// Write to a sibling temp file, then rename over `path`.
    fn write_to_path(&self, model: &Model, path: &Path) -> Result<usize, ExtractError> {
        // Fail before touching the filesystem.
        model.elements_of_kind(&self.config.root_type)?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|source| ExtractError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let roots = self.write_model(model, tmp.as_file_mut())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| ExtractError::Persist {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        Ok(roots)
    }
}

impl Extractor for JsonExtractor {
    fn extract(
        &self,
        store: &dyn HandleStore,
        model: ModelHandle,
        destination: Destination<'_>,
        options: &ExtractOptions,
    ) -> Result<(), ExtractError> {
        if !options.is_empty() {
            tracing::warn!(
                keys = ?options.extra.keys().collect::<Vec<_>>(),
                "extract options are not interpreted; ignoring"
            );
        }
        let model = store.model(model)?;
        let (roots, target) = match destination {
            Destination::Path(path) => {
                let roots = self.write_to_path(model, &path)?;
                (roots, path.display().to_string())
            }
            Destination::Sink(sink) => (self.write_model(model, sink)?, "<sink>".to_string()),
        };
        tracing::info!(
            root_type = %self.config.root_type,
            roots,
            elements = model.len(),
            %target,
            "model extracted"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recursive writer
// ---------------------------------------------------------------------------

struct DocumentWriter<'m, W: Write> {
    model: &'m Model,
    out: W,
    max_depth: usize,
}

impl<W: Write> DocumentWriter<'_, W> {
    fn write_document(&mut self, roots: &[ElementId]) -> Result<(), ExtractError> {
        self.out.write_all(b"{\n")?;
        // Shared across roots: their members all land in the one top-level object.
        let mut first = true;
        for &root in roots {
            self.write_members(root, 1, &mut first)?;
        }
        self.out.write_all(b"\n}")?;
        Ok(())
    }

    fn write_members(&mut self, id: ElementId, depth: usize, first: &mut bool) -> Result<(), ExtractError> {
        let model = self.model;
        let element = model
            .element(id)
            .ok_or_else(|| SchemaError::UnknownElement { id: id.to_string() })?;
        let features = model.schema().features_in_declaration_order(element.type_name())?;

        for feature in features {
            let Some(value) = element.get(&feature.name) else {
                continue;
            };
            if !*first {
                self.out.write_all(b",\n")?;
            }
            *first = false;

            self.indent(depth)?;
            write_json_string(&mut self.out, &feature.name)?;
            self.out.write_all(b":")?;

            match value {
                FeatureValue::Scalar(s) => self.write_scalar(feature, s)?,
                FeatureValue::Scalars(items) => {
                    self.out.write_all(b"[")?;
                    for (i, s) in items.iter().enumerate() {
                        if i > 0 {
                            self.out.write_all(b",")?;
                        }
                        self.write_scalar(feature, s)?;
                    }
                    self.out.write_all(b"]")?;
                }
                FeatureValue::Element(child) => self.write_object(feature, *child, depth)?,
                FeatureValue::Elements(children) => {
                    self.out.write_all(b"[")?;
                    for (i, child) in children.iter().enumerate() {
                        if i > 0 {
                            self.out.write_all(b",")?;
                        }
                        self.write_object(feature, *child, depth)?;
                    }
                    self.out.write_all(b"]")?;
                }
            }
        }
        Ok(())
    }

    fn write_object(&mut self, feature: &Feature, child: ElementId, depth: usize) -> Result<(), ExtractError> {
        if depth >= self.max_depth {
            return Err(ExtractError::DepthExceeded {
                feature: feature.name.clone(),
                max_depth: self.max_depth,
            });
        }
        self.out.write_all(b" {\n")?;
        let mut first = true;
        self.write_members(child, depth + 1, &mut first)?;
        self.out.write_all(b"\n")?;
        self.indent(depth)?;
        self.out.write_all(b"}")?;
        Ok(())
    }

    /// Numbers of number-kind features go out bare; everything else as an
    /// escaped string of its text form.
    fn write_scalar(&mut self, feature: &Feature, value: &Scalar) -> Result<(), ExtractError> {
        match (feature.value_kind(), value) {
            (Some(ValueKind::Number), Scalar::Number(n)) => write!(self.out, "{n}")?,
            (_, Scalar::Text(s)) => write_json_string(&mut self.out, s)?,
            (_, other) => write_json_string(&mut self.out, &other.to_string())?,
        }
        Ok(())
    }

    fn indent(&mut self, depth: usize) -> io::Result<()> {
        for _ in 0..depth {
            self.out.write_all(b"  ")?;
        }
        Ok(())
    }
}

fn write_json_string<W: Write>(out: &mut W, s: &str) -> io::Result<()> {
    serde_json::to_writer(out, s).map_err(io::Error::from)
}
