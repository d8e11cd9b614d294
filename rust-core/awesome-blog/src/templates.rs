//! minijinja-backed template rendering plus the text helpers templates use.

use awesome_core::{Error, Result, TemplateRenderer};
use minijinja::{path_loader, Environment};
use serde_json::Value;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Template environment with the blog's filters registered
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    /// Load templates lazily from `dir`
    pub fn from_directory(dir: impl AsRef<Path>) -> Self {
        let mut env = base_environment();
        env.set_loader(path_loader(dir.as_ref()));
        Self { env }
    }

    /// Templates compiled from in-memory sources
    ///
    /// # Errors
    ///
    /// Returns `Error::Template` if a source does not parse.
    pub fn from_sources<I, N, S>(sources: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let mut env = base_environment();
        for (name, source) in sources {
            env.add_template_owned(name.into(), source.into())
                .map_err(template_error)?;
        }
        Ok(Self { env })
    }
}

impl TemplateRenderer for Templates {
    fn render(&self, name: &str, context: &Value) -> Result<String> {
        self.env
            .get_template(name)
            .and_then(|t| t.render(context))
            .map_err(template_error)
    }
}

fn base_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_filter("datetime", datetime_filter);
    env.add_filter("text2html", text2html_filter);
    env
}

fn template_error(e: minijinja::Error) -> Error {
    Error::Template {
        message: e.to_string(),
    }
}

fn text2html_filter(text: String) -> minijinja::Value {
    minijinja::Value::from_safe_string(text2html(&text))
}

fn datetime_filter(timestamp: f64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    relative_time(timestamp, now)
}

/// Human phrasing of how long before `now` the `timestamp` was
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn relative_time(timestamp: f64, now: f64) -> String {
    let delta = (now - timestamp).max(0.0) as u64;
    match delta {
        0..=59 => "1 minute ago".to_string(),
        60..=3599 => format!("{} minutes ago", delta / 60),
        3600..=86_399 => format!("{} hours ago", delta / 3600),
        86_400..=604_799 => format!("{} days ago", delta / 86_400),
        _ => chrono::DateTime::from_timestamp(timestamp as i64, 0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
    }
}

/// Escape `text` and wrap each non-blank line in a paragraph
#[must_use]
pub fn text2html(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| format!("<p>{}</p>", escape(line)))
        .collect()
}

fn escape(line: &str) -> String {
    line.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: f64 = 1_700_000_000.0;

    #[test]
    fn test_relative_time() {
        assert_eq!(relative_time(NOW - 5.0, NOW), "1 minute ago");
        assert_eq!(relative_time(NOW - 120.0, NOW), "2 minutes ago");
        assert_eq!(relative_time(NOW - 7200.0, NOW), "2 hours ago");
        assert_eq!(relative_time(NOW - 3.0 * 86_400.0, NOW), "3 days ago");
        assert_eq!(relative_time(0.0, NOW), "1970-01-01");
    }

    #[test]
    fn test_text2html() {
        assert_eq!(
            text2html("first <b>line</b>\n\n  \nsecond & last"),
            "<p>first &lt;b&gt;line&lt;/b&gt;</p><p>second &amp; last</p>"
        );
    }

    #[test]
    fn test_render_from_sources() {
        let templates = Templates::from_sources([(
            "hello.html",
            "Hello {% if __user__ %}{{ __user__.name }}{% else %}guest{% endif %}",
        )])
        .unwrap();
        let out = templates.render("hello.html", &json!({"__user__": {"name": "Ann"}})).unwrap();
        assert_eq!(out, "Hello Ann");
        let out = templates.render("hello.html", &json!({"__user__": null})).unwrap();
        assert_eq!(out, "Hello guest");
    }

    #[test]
    fn test_filters_registered() {
        let templates = Templates::from_sources([("f.html", "{{ body|text2html }}")]).unwrap();
        let out = templates.render("f.html", &json!({"body": "a\nb"})).unwrap();
        assert_eq!(out, "<p>a</p><p>b</p>");
    }

    #[test]
    fn test_missing_template_is_error() {
        let templates = Templates::from_sources(Vec::<(String, String)>::new()).unwrap();
        assert!(matches!(
            templates.render("none.html", &Value::Null),
            Err(Error::Template { .. })
        ));
    }
}
