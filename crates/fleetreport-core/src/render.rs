//! A [`TemplateRenderer`] producing JSON workbooks.
//!
//! Templates are JSON sheet layouts:
//!
//! ```json
//! {
//!   "title": "Events",
//!   "columns": [
//!     "eventTime",
//!     "type",
//!     { "field": "geofenceId", "lookup": "geofenceNames", "header": "Geofence" }
//!   ]
//! }
//! ```
//!
//! A plain column copies the record field. A lookup column reads the record
//! field as a key into a bound id table such as `geofenceNames`. The output
//! holds one sheet per section, named from `sheetNames`, plus every scalar
//! variable of the context.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ReportError, ReportResult};
use crate::export::{RenderContext, TemplateRenderer};

/// Layout read from a template file.
#[derive(Debug, Clone, Deserialize)]
struct SheetLayout {
    #[serde(default)]
    title: String,
    columns: Vec<Column>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Column {
    Field(String),
    Lookup {
        field: String,
        lookup: String,
        #[serde(default)]
        header: Option<String>,
    },
}

impl Column {
    fn header(&self) -> &str {
        match self {
            Self::Field(field) => field,
            Self::Lookup { field, header, .. } => header.as_deref().unwrap_or(field),
        }
    }

    fn cell(&self, record: &Value, context: &RenderContext) -> Value {
        match self {
            Self::Field(field) => record.get(field).cloned().unwrap_or(Value::Null),
            Self::Lookup { field, lookup, .. } => {
                let key = match record.get(field) {
                    Some(Value::Number(id)) => id.to_string(),
                    Some(Value::String(id)) => id.clone(),
                    _ => return Value::Null,
                };
                context
                    .get(lookup)
                    .and_then(|table| table.get(&key))
                    .cloned()
                    .unwrap_or(Value::Null)
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Sheet {
    name: String,
    device_name: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    group_name: Value,
    header: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
struct Workbook {
    title: String,
    sheets: Vec<Sheet>,
    variables: Map<String, Value>,
}

/// Renders report contexts into JSON workbooks.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWorkbookRenderer;

impl JsonWorkbookRenderer {
    /// Create the renderer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn array<'a>(context: &'a RenderContext, name: &str) -> ReportResult<&'a Vec<Value>> {
    context
        .get(name)
        .and_then(Value::as_array)
        .ok_or_else(|| ReportError::RenderingFailure(format!("variable '{name}' is not bound")))
}

impl TemplateRenderer for JsonWorkbookRenderer {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn render(&self, template: &[u8], context: &RenderContext) -> ReportResult<Vec<u8>> {
        let layout: SheetLayout = serde_json::from_slice(template)
            .map_err(|e| ReportError::RenderingFailure(format!("invalid template: {e}")))?;

        let devices = array(context, "devices")?;
        let sheet_names = array(context, "sheetNames")?;
        if devices.len() != sheet_names.len() {
            return Err(ReportError::RenderingFailure(format!(
                "{} sections but {} sheet names",
                devices.len(),
                sheet_names.len()
            )));
        }

        let header: Vec<String> = layout.columns.iter().map(|c| c.header().to_string()).collect();

        let sheets = devices
            .iter()
            .zip(sheet_names)
            .map(|(section, name)| {
                let rows = section
                    .get("records")
                    .and_then(Value::as_array)
                    .map(|records| {
                        records
                            .iter()
                            .map(|record| {
                                layout
                                    .columns
                                    .iter()
                                    .map(|column| column.cell(record, context))
                                    .collect()
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                Sheet {
                    name: name.as_str().unwrap_or_default().to_string(),
                    device_name: section.get("deviceName").cloned().unwrap_or(Value::Null),
                    group_name: section.get("groupName").cloned().unwrap_or(Value::Null),
                    header: header.clone(),
                    rows,
                }
            })
            .collect();

        let variables = context
            .variables()
            .iter()
            .filter(|(_, value)| !value.is_array() && !value.is_object())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let workbook = Workbook {
            title: layout.title,
            sheets,
            variables,
        };

        serde_json::to_vec_pretty(&workbook)
            .map_err(|e| ReportError::RenderingFailure(format!("cannot encode workbook: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> RenderContext {
        let mut context = RenderContext::new();
        context
            .put_var(
                "devices",
                &json!([
                    {
                        "deviceName": "Van",
                        "groupName": "North",
                        "records": [
                            { "type": "geofenceEnter", "geofenceId": 5 },
                            { "type": "alarm", "geofenceId": 0 }
                        ]
                    }
                ]),
            )
            .unwrap();
        context.put_var("sheetNames", &json!(["Van"])).unwrap();
        context.put_var("geofenceNames", &json!({ "5": "Depot" })).unwrap();
        context.put_var("timezone", "UTC").unwrap();
        context
    }

    fn render(template: &str, context: &RenderContext) -> ReportResult<Value> {
        let bytes = JsonWorkbookRenderer::new().render(template.as_bytes(), context)?;
        Ok(serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_renders_one_sheet_per_section() {
        let workbook = render(
            r#"{"title":"Events","columns":["type",{"field":"geofenceId","lookup":"geofenceNames","header":"Geofence"}]}"#,
            &context(),
        )
        .unwrap();

        assert_eq!(workbook["title"], "Events");
        let sheets = workbook["sheets"].as_array().unwrap();
        assert_eq!(sheets.len(), 1);
        assert_eq!(sheets[0]["name"], "Van");
        assert_eq!(sheets[0]["groupName"], "North");
        assert_eq!(sheets[0]["header"], json!(["type", "Geofence"]));
        assert_eq!(sheets[0]["rows"], json!([["geofenceEnter", "Depot"], ["alarm", null]]));
        assert_eq!(workbook["variables"]["timezone"], "UTC");
        assert!(workbook["variables"].get("geofenceNames").is_none());
    }

    #[test]
    fn test_invalid_template_is_rendering_failure() {
        let err = render("not json", &context()).unwrap_err();
        assert!(matches!(err, ReportError::RenderingFailure(_)));
    }

    #[test]
    fn test_mismatched_sheet_names_fail() {
        let mut ctx = context();
        ctx.put_var("sheetNames", &json!(["Van", "Extra"])).unwrap();
        let err = render(r#"{"columns":["type"]}"#, &ctx).unwrap_err();
        assert!(matches!(err, ReportError::RenderingFailure(_)));
    }

    #[test]
    fn test_unbound_sections_fail() {
        let err = render(r#"{"columns":["type"]}"#, &RenderContext::new()).unwrap_err();
        assert!(err.to_string().contains("devices"));
    }
}
