//! HTML mail body generation.

use chrono::Utc;
use mb_common::{Level, LevelClass};
use tracing::debug;

use crate::config::ReportConfig;
use crate::document::{EventDocument, EventEntry};
use crate::error::{ReportError, Result};

/// Second-stage transform from an [`EventDocument`] to an HTML body.
#[derive(Debug, Clone, Default)]
pub struct HtmlTransform {
    config: ReportConfig,
}

impl HtmlTransform {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Transform `document` into HTML, reporting `lost` discarded events.
    pub fn transform(&self, document: &EventDocument, lost: u64) -> Result<String> {
        if document.is_empty() {
            return Err(ReportError::EmptyDocument);
        }

        let html = self.generate_html(document, lost);

        let output = if cfg!(debug_assertions) || !self.config.minify {
            html
        } else {
            let cfg = minify_html::Cfg {
                minify_css: true,
                ..Default::default()
            };
            String::from_utf8(minify_html::minify(html.as_bytes(), &cfg))?
        };

        debug!(
            bytes = output.len(),
            events = document.len(),
            lost,
            "mail body generated"
        );
        Ok(output)
    }

    fn generate_html(&self, document: &EventDocument, lost: u64) -> String {
        let (background, text, border) = self.config.theme.palette();
        let rows: Vec<String> = document.entries.iter().map(generate_row).collect();

        format!(
            r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="generator" content="mailbatch {version}">
    <title>{title}</title>
    <style>
        body {{ background-color: {background}; color: {text}; font-family: ui-sans-serif, system-ui, sans-serif; font-size: 10pt; }}
        table {{ border-collapse: collapse; width: 100%; }}
        th, td {{ border-bottom: 1px solid {border}; padding: 2px 6px; text-align: left; vertical-align: top; }}
        tr.trigger td {{ font-weight: bold; }}
        td.level {{ white-space: nowrap; }}
        .unrecoverable {{ color: #b91c1c; }}
        .recoverable {{ color: #c2410c; }}
        .information {{ color: #1d4ed8; }}
        .debug {{ color: #6b7280; }}
        .lost {{ background-color: #fef3c7; border: 1px solid #f59e0b; padding: 4px 8px; margin-bottom: 8px; }}
        pre {{ margin: 2px 0; white-space: pre-wrap; }}
    </style>
</head>
<body>
    <h2>{title}</h2>
    <p class="summary">{total} events, {triggering} triggering, generated {generated_at}</p>
    {lost_banner}
    <table>
        <thead><tr><th>Time</th><th>Level</th><th>Thread</th><th>Logger</th><th>Message</th></tr></thead>
        <tbody>
{rows}
        </tbody>
    </table>
</body>
</html>"##,
            version = env!("CARGO_PKG_VERSION"),
            title = html_escape(self.config.heading()),
            background = background,
            text = text,
            border = border,
            total = document.len(),
            triggering = document.triggering_count(),
            generated_at = Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
            lost_banner = lost_banner(lost),
            rows = rows.join("\n"),
        )
    }
}

fn lost_banner(lost: u64) -> String {
    match lost {
        0 => String::new(),
        1 => r#"<div class="lost">1 logging event was lost</div>"#.to_string(),
        n => format!(r#"<div class="lost">{} logging events were lost</div>"#, n),
    }
}

fn generate_row(entry: &EventEntry) -> String {
    let class = level_css_class(entry.level);
    let row_class = if entry.triggering { " class=\"trigger\"" } else { "" };
    let exception = entry
        .exception
        .as_deref()
        .map(|e| format!("<pre>{}</pre>", html_escape(e)))
        .unwrap_or_default();

    format!(
        r#"            <tr{row_class}><td>{time}</td><td class="level {class}">{level}</td><td>{thread}</td><td>{logger}</td><td>{message}{exception}</td></tr>"#,
        row_class = row_class,
        time = entry.timestamp.format("%H:%M:%S%.3f"),
        class = class,
        level = entry.level.name(),
        thread = html_escape(&entry.thread),
        logger = html_escape(&entry.logger),
        message = html_escape(&entry.message).replace('\n', "<br/>"),
        exception = exception,
    )
}

fn level_css_class(level: Level) -> &'static str {
    match level.class() {
        LevelClass::Unrecoverable => "unrecoverable",
        LevelClass::Recoverable => "recoverable",
        LevelClass::Information => "information",
        LevelClass::Debug => "debug",
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Layout, ReportTheme};
    use crate::document::render;
    use mb_common::Record;

    fn document() -> EventDocument {
        let mut warn = Record::new(Level::Warn, "Warning <message>");
        warn.mark_triggering();
        let records = vec![
            Record::new(Level::Info, "This is a\nmultiline message"),
            warn,
            Record::new(Level::Emergency, "sample").with_exception("System.ArgumentException"),
        ];
        render(&records, &Layout::default())
    }

    #[test]
    fn test_transform_renders_rows() {
        let html = HtmlTransform::default().transform(&document(), 0).unwrap();
        assert!(html.contains("<!DOCTYPE html>"));
        assert_eq!(html.matches("<tr><td>").count() + html.matches("<tr class=\"trigger\">").count(), 3);
        assert!(html.contains("3 events, 1 triggering"));
        assert!(!html.contains("were lost"));
    }

    #[test]
    fn test_transform_escapes_and_breaks_lines() {
        let html = HtmlTransform::default().transform(&document(), 0).unwrap();
        assert!(html.contains("Warning &lt;message&gt;"));
        assert!(html.contains("This is a<br/>multiline message"));
        assert!(html.contains("<pre>System.ArgumentException</pre>"));
    }

    #[test]
    fn test_triggering_rows_are_highlighted() {
        let html = HtmlTransform::default().transform(&document(), 0).unwrap();
        assert_eq!(html.matches("<tr class=\"trigger\">").count(), 1);
        assert!(html.contains(r#"class="level unrecoverable">EMERGENCY"#));
    }

    #[test]
    fn test_lost_banner() {
        let transform = HtmlTransform::default();
        let html = transform.transform(&document(), 7).unwrap();
        assert!(html.contains("7 logging events were lost"));
        let html = transform.transform(&document(), 1).unwrap();
        assert!(html.contains("1 logging event was lost"));
    }

    #[test]
    fn test_title_and_theme() {
        let config = ReportConfig::default()
            .with_title("Ops <alerts>")
            .with_theme(ReportTheme::Dark);
        let html = HtmlTransform::new(config).transform(&document(), 0).unwrap();
        assert!(html.contains("<h2>Ops &lt;alerts&gt;</h2>"));
        assert!(html.contains("background-color: #111827"));
    }

    #[test]
    fn test_empty_document_is_rejected() {
        let empty = render(&[], &Layout::default());
        assert!(matches!(
            HtmlTransform::default().transform(&empty, 3),
            Err(ReportError::EmptyDocument)
        ));
    }
}
