//! Document export: binding report sections into a template.
//!
//! The exporter loads `<templates_root>/export/<kind>.<ext>`, binds the
//! assembled sections and lookup tables into a [`RenderContext`], and hands
//! both to a [`TemplateRenderer`]. The destination only receives bytes once
//! rendering has fully succeeded.
//!
//! Variables bound for every report kind:
//!
//! | name          | value                                         |
//! |---------------|-----------------------------------------------|
//! | `devices`     | ordered sections                              |
//! | `sheetNames`  | sheet name per section, same order            |
//! | `from`, `to`  | report window (UTC)                           |
//! | `fromLocal`, `toLocal` | report window in the user's timezone |
//! | `timezone`, `speedUnit`, `distanceUnit`, `volumeUnit` | user preferences |
//!
//! Events reports additionally bind `geofenceNames`, `maintenanceNames` and
//! `positions`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::config::template_path;
use crate::error::{ReportError, ReportResult};
use crate::filter::LookupTables;
use crate::preferences::ReportPreferences;
use crate::query::{ReportKind, ReportQuery};
use crate::section::ReportSection;
use crate::sheet::SheetNameTable;

/// Named variables handed to the templating engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderContext {
    variables: Map<String, Value>,
}

impl RenderContext {
    /// An empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `name`, replacing any previous binding.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::RenderingFailure`] if the value cannot be serialized.
    pub fn put_var<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> ReportResult<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| ReportError::RenderingFailure(format!("cannot bind '{name}': {e}")))?;
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    /// Look up a bound variable.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// All bound variables.
    #[must_use]
    pub const fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }
}

/// A templating engine producing one sheet per bound section.
#[cfg_attr(test, mockall::automock)]
pub trait TemplateRenderer: Send + Sync {
    /// File extension of the templates this engine reads.
    fn extension(&self) -> &'static str;

    /// MIME type of the rendered document.
    fn content_type(&self) -> &'static str;

    /// Render `template` with `context`.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::RenderingFailure`] when the engine fails.
    fn render(&self, template: &[u8], context: &RenderContext) -> ReportResult<Vec<u8>>;
}

/// Mutable state of one export call: sheet names handed out so far and the
/// lookup tables filled while filtering.
#[derive(Debug, Default)]
pub struct ExportScope {
    table: SheetNameTable,
    sheet_names: Vec<String>,
    lookups: LookupTables,
}

impl ExportScope {
    /// Fresh state for a new export call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the sheet name for the next section.
    pub fn push_sheet(&mut self, label: &str) -> &str {
        let name = self.table.unique(label);
        self.sheet_names.push(name);
        self.sheet_names.last().map_or("", String::as_str)
    }

    /// Sheet names in section order.
    #[must_use]
    pub fn sheet_names(&self) -> &[String] {
        &self.sheet_names
    }

    /// Lookup tables shared by every device of this call.
    #[must_use]
    pub const fn lookups(&self) -> &LookupTables {
        &self.lookups
    }

    /// Mutable access for the visibility filter.
    pub fn lookups_mut(&mut self) -> &mut LookupTables {
        &mut self.lookups
    }
}

/// Binds report data into templates and writes the rendered document.
#[derive(Clone)]
pub struct DocumentExporter {
    templates_root: PathBuf,
    renderer: Arc<dyn TemplateRenderer>,
}

impl std::fmt::Debug for DocumentExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentExporter")
            .field("templates_root", &self.templates_root)
            .field("extension", &self.renderer.extension())
            .finish()
    }
}

impl DocumentExporter {
    /// Create an exporter reading templates below `templates_root`.
    pub fn new(templates_root: impl Into<PathBuf>, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            templates_root: templates_root.into(),
            renderer,
        }
    }

    /// Directory templates are read from.
    #[must_use]
    pub fn templates_root(&self) -> &Path {
        &self.templates_root
    }

    /// Template location for a report kind.
    #[must_use]
    pub fn template_path(&self, kind: ReportKind) -> PathBuf {
        template_path(&self.templates_root, kind, self.renderer.extension())
    }

    /// File extension of rendered documents.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        self.renderer.extension()
    }

    /// MIME type of rendered documents.
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        self.renderer.content_type()
    }

    async fn load_template(&self, kind: ReportKind) -> ReportResult<Vec<u8>> {
        let path = self.template_path(kind);
        debug!(path = %path.display(), "Loading report template");
        tokio::fs::read(&path)
            .await
            .map_err(|source| ReportError::TemplateMissing { path, source })
    }

    /// Render `sections` with the `kind` template and write the document to `sink`.
    ///
    /// # Errors
    ///
    /// - [`ReportError::TemplateMissing`] if the template cannot be read
    /// - [`ReportError::RenderingFailure`] from the engine, unchanged
    /// - [`ReportError::IoError`] if writing to `sink` fails
    pub async fn export<R, W>(
        &self,
        kind: ReportKind,
        sections: &[ReportSection<R>],
        scope: &ExportScope,
        preferences: &ReportPreferences,
        query: &ReportQuery,
        sink: &mut W,
    ) -> ReportResult<()>
    where
        R: Serialize + Sync,
        W: AsyncWrite + Unpin + Send,
    {
        let template = self.load_template(kind).await?;

        let context = bind_context(kind, sections, scope, preferences, query)?;
        let document = self.renderer.render(&template, &context)?;

        sink.write_all(&document).await?;
        sink.flush().await?;

        info!(
            kind = %kind,
            sheets = sections.len(),
            bytes = document.len(),
            "Report document written"
        );
        Ok(())
    }
}

fn bind_context<R: Serialize>(
    kind: ReportKind,
    sections: &[ReportSection<R>],
    scope: &ExportScope,
    preferences: &ReportPreferences,
    query: &ReportQuery,
) -> ReportResult<RenderContext> {
    let mut context = RenderContext::new();

    context.put_var("timezone", &preferences.timezone)?;
    context.put_var("speedUnit", &preferences.speed_unit)?;
    context.put_var("distanceUnit", &preferences.distance_unit)?;
    context.put_var("volumeUnit", &preferences.volume_unit)?;

    context.put_var("devices", sections)?;
    context.put_var("sheetNames", scope.sheet_names())?;

    if kind == ReportKind::Events {
        let lookups = scope.lookups();
        context.put_var("geofenceNames", lookups.geofence_names())?;
        context.put_var("maintenanceNames", lookups.maintenance_names())?;
        context.put_var("positions", lookups.positions())?;
    }

    context.put_var("from", &query.from())?;
    context.put_var("to", &query.to())?;
    context.put_var("fromLocal", &preferences.local_time(query.from()))?;
    context.put_var("toLocal", &preferences.local_time(query.to()))?;

    Ok(context)
}
