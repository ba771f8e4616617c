//! `%%NAME%%` placeholder substitution for query templates.
//!
//! Values are never spliced in as raw text: every slot is bound to a
//! [`Binding`] that knows how to render itself as a SPARQL term, so a value
//! cannot close a literal or an IRI early.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

use crate::domain::Iri;
use crate::temporal::DateWindow;

pub const STATION: &str = "STATION";
pub const START_DATE: &str = "START_DATE";
pub const END_DATE: &str = "END_DATE";
pub const VALUES: &str = "VALUES";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%%([A-Z][A-Z0-9_]*)%%").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Iri(Iri),
    Literal(String),
    /// Start of the day, as an `xsd:dateTime`.
    WindowStart(NaiveDate),
    /// Last millisecond of the day, as an `xsd:dateTime`.
    WindowEnd(NaiveDate),
    /// Space separated IRIs for a `VALUES` block.
    Values(Vec<Iri>),
}

impl Binding {
    pub fn render(&self) -> String {
        match self {
            Binding::Iri(iri) => format!("<{}>", iri.as_str()),
            Binding::Literal(value) => format!("\"{}\"", escape_literal(value)),
            Binding::WindowStart(date) => format!(
                "\"{}T00:00:00Z\"^^<http://www.w3.org/2001/XMLSchema#dateTime>",
                date.format("%Y-%m-%d")
            ),
            Binding::WindowEnd(date) => format!(
                "\"{}T23:59:59.999Z\"^^<http://www.w3.org/2001/XMLSchema#dateTime>",
                date.format("%Y-%m-%d")
            ),
            Binding::Values(iris) => iris
                .iter()
                .map(|iri| format!("<{}>", iri.as_str()))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Named bindings for one rendering.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    slots: BTreeMap<String, Binding>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, name: &str, binding: Binding) -> Self {
        self.slots.insert(name.to_string(), binding);
        self
    }

    /// Binds `%%START_DATE%%` and `%%END_DATE%%`.
    pub fn window(self, window: &DateWindow) -> Self {
        self.bind(START_DATE, Binding::WindowStart(window.start))
            .bind(END_DATE, Binding::WindowEnd(window.end))
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.slots.get(name)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Template {
    text: &'static str,
}

impl Template {
    pub const fn new(text: &'static str) -> Self {
        Self { text }
    }

    pub fn text(&self) -> &'static str {
        self.text
    }

    /// Distinct placeholder names present in the template.
    pub fn placeholders(&self) -> BTreeSet<String> {
        PLACEHOLDER
            .captures_iter(self.text)
            .map(|caps| caps[1].to_string())
            .collect()
    }

    pub fn render(&self, bindings: &Bindings) -> String {
        render(self.text, bindings)
    }
}

/// Replaces each bound placeholder; unbound ones are kept verbatim.
pub fn render(template: &str, bindings: &Bindings) -> String {
    let rendered: Cow<'_, str> = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        match bindings.get(&caps[1]) {
            Some(binding) => binding.render(),
            None => caps[0].to_string(),
        }
    });
    rendered.into_owned()
}

fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(value: &str) -> Iri {
        value.parse().unwrap()
    }

    #[test]
    fn substitutes_every_occurrence() {
        let bindings = Bindings::new().bind(STATION, Binding::Iri(iri("http://x/S1")));
        let out = render("A %%STATION%% B %%STATION%%", &bindings);
        assert_eq!(out, "A <http://x/S1> B <http://x/S1>");
    }

    #[test]
    fn unbound_placeholders_are_left_alone() {
        let bindings = Bindings::new().bind(STATION, Binding::Iri(iri("http://x/S1")));
        let out = render("%%STATION%% %%OTHER%% %%lower%%", &bindings);
        assert_eq!(out, "<http://x/S1> %%OTHER%% %%lower%%");
    }

    #[test]
    fn values_render_as_bracketed_list() {
        let bindings = Bindings::new().bind(
            VALUES,
            Binding::Values(vec![iri("https://o/D1"), iri("https://o/D2")]),
        );
        assert_eq!(
            render("VALUES ?dobj { %%VALUES%% }", &bindings),
            "VALUES ?dobj { <https://o/D1> <https://o/D2> }"
        );
    }

    #[test]
    fn literals_are_escaped() {
        let binding = Binding::Literal("say \"hi\"\n\\".to_string());
        assert_eq!(binding.render(), r#""say \"hi\"\n\\""#);
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let bindings = Bindings::new()
            .bind("A", Binding::Literal("%%B%%".to_string()))
            .bind("B", Binding::Literal("boom".to_string()));
        assert_eq!(render("%%A%%", &bindings), "\"%%B%%\"");
    }

    #[test]
    fn window_dates_cover_whole_days() {
        let window = DateWindow::parse("2020-01-01", "2020-12-31").unwrap();
        let out = render("%%START_DATE%%|%%END_DATE%%", &Bindings::new().window(&window));
        assert_eq!(
            out,
            "\"2020-01-01T00:00:00Z\"^^<http://www.w3.org/2001/XMLSchema#dateTime>|\
             \"2020-12-31T23:59:59.999Z\"^^<http://www.w3.org/2001/XMLSchema#dateTime>"
        );
    }

    #[test]
    fn lists_placeholders() {
        let template = Template::new("%%STATION%% %%START_DATE%% %%STATION%%");
        let names = template.placeholders().into_iter().collect::<Vec<_>>();
        assert_eq!(names, vec!["START_DATE", "STATION"]);
    }
}
