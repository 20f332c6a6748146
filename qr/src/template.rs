//! SQL and destination templates
//!
//! Templates are handlebars in strict mode: referencing an unknown variable
//! fails the render instead of silently producing an empty string. Output is
//! not HTML-escaped.

use chrono::Datelike;
use handlebars::Handlebars;
use hourledger::SlotRef;
use serde::Serialize;
use tracing::debug;

use crate::error::TemplateError;

/// Variables available to every template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateVars {
    pub year: String,
    /// Two digits
    pub month: String,
    /// Two digits
    pub day: String,
    /// Two digits
    pub hour: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub step: String,
}

impl TemplateVars {
    pub fn for_slot(step: &str, slot: SlotRef) -> Self {
        Self {
            year: slot.date.year().to_string(),
            month: format!("{:02}", slot.date.month()),
            day: format!("{:02}", slot.date.day()),
            hour: format!("{:02}", slot.hour),
            date: slot.date.format("%Y-%m-%d").to_string(),
            step: step.to_string(),
        }
    }
}

/// Strict renderer for query and destination templates
pub struct QueryTemplate {
    hbs: Handlebars<'static>,
}

impl Default for QueryTemplate {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryTemplate {
    pub fn new() -> Self {
        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(true);
        hbs.register_escape_fn(handlebars::no_escape);
        Self { hbs }
    }

    /// Render `template`; `name` only labels errors
    pub fn render(&self, name: &str, template: &str, vars: &TemplateVars) -> Result<String, TemplateError> {
        debug!(%name, date = %vars.date, hour = %vars.hour, "QueryTemplate::render: called");
        self.hbs
            .render_template(template, vars)
            .map_err(|e| TemplateError::Render {
                name: name.to_string(),
                source: Box::new(e),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn vars() -> TemplateVars {
        TemplateVars::for_slot("events", SlotRef::new(NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(), 4))
    }

    #[test]
    fn test_vars_are_zero_padded() {
        let vars = vars();
        assert_eq!(vars.year, "2026");
        assert_eq!(vars.month, "03");
        assert_eq!(vars.day, "09");
        assert_eq!(vars.hour, "04");
        assert_eq!(vars.date, "2026-03-09");
    }

    #[test]
    fn test_render_sql() {
        let template = QueryTemplate::new();
        let sql = template
            .render(
                "hourly.sql",
                "SELECT * FROM t WHERE dt = '{{date}}' AND hr = '{{hour}}' AND note <> 'a&b' -- {{step}}",
                &vars(),
            )
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE dt = '2026-03-09' AND hr = '04' AND note <> 'a&b' -- events"
        );
    }

    #[test]
    fn test_render_destination_with_parts() {
        let template = QueryTemplate::new();
        let out = template
            .render("output", "out/{{year}}/{{month}}/{{day}}/{{hour}}/", &vars())
            .unwrap();
        assert_eq!(out, "out/2026/03/09/04/");
    }

    #[test]
    fn test_unknown_variable_fails() {
        let template = QueryTemplate::new();
        let err = template.render("hourly.sql", "SELECT {{minute}}", &vars()).unwrap_err();
        assert!(err.to_string().contains("hourly.sql"));
    }
}
