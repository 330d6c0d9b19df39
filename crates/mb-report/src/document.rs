//! The event document: a structured, ordered rendering of one batch.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use mb_common::{Level, Record, TRIGGER_PROPERTY};
use serde::Serialize;

use crate::config::Layout;

/// One rendered record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEntry {
    pub level: Level,
    pub timestamp: DateTime<Utc>,
    pub thread: String,
    pub logger: String,
    pub domain: String,
    pub username: String,
    pub message: String,
    pub properties: BTreeMap<String, String>,
    pub exception: Option<String>,
    pub triggering: bool,
}

impl From<&Record> for EventEntry {
    fn from(record: &Record) -> Self {
        EventEntry {
            level: record.level,
            timestamp: record.timestamp,
            thread: record.thread.clone(),
            logger: record.logger.clone(),
            domain: record.domain.clone(),
            username: record.username.clone(),
            message: record.message.clone(),
            properties: record.properties.clone(),
            exception: record.exception.clone(),
            triggering: record.is_triggering(),
        }
    }
}

/// A batch rendered in arrival order, bracketed by header and footer text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDocument {
    pub header: String,
    pub footer: String,
    pub entries: Vec<EventEntry>,
}

impl EventDocument {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn triggering_count(&self) -> usize {
        self.entries.iter().filter(|e| e.triggering).count()
    }

    /// XML text form of the document.
    pub fn to_xml(&self) -> String {
        let mut out = String::with_capacity(self.header.len() + self.entries.len() * 256);
        out.push_str(&self.header);
        for entry in &self.entries {
            write_entry_xml(&mut out, entry);
        }
        out.push_str(&self.footer);
        out
    }
}

/// Render `records` into a document using `layout`.
pub fn render(records: &[Record], layout: &Layout) -> EventDocument {
    EventDocument {
        header: layout.header.clone(),
        footer: layout.footer.clone(),
        entries: records.iter().map(EventEntry::from).collect(),
    }
}

fn write_entry_xml(out: &mut String, entry: &EventEntry) {
    // Writing into a String cannot fail.
    let _ = write!(
        out,
        r#"<event logger="{}" timestamp="{}" level="{}" thread="{}" domain="{}" username="{}">"#,
        xml_escape(&entry.logger),
        entry.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
        entry.level.name(),
        xml_escape(&entry.thread),
        xml_escape(&entry.domain),
        xml_escape(&entry.username),
    );
    let _ = write!(out, "<message>{}</message>", xml_escape(&entry.message));

    if entry.triggering || !entry.properties.is_empty() {
        out.push_str("<properties>");
        for (name, value) in &entry.properties {
            let _ = write!(
                out,
                r#"<data name="{}" value="{}" />"#,
                xml_escape(name),
                xml_escape(value)
            );
        }
        if entry.triggering {
            let _ = write!(out, r#"<data name="{}" value="true" />"#, TRIGGER_PROPERTY);
        }
        out.push_str("</properties>");
    }

    if let Some(exception) = &entry.exception {
        let _ = write!(out, "<exception>{}</exception>", xml_escape(exception));
    }
    out.push_str("</event>\n");
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\n' | '\r' | '\t') => {
                let _ = write!(out, "&#x{:x};", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Vec<Record> {
        let mut warn = Record::new(Level::Warn, "disk <90%> full")
            .with_logger("app.disk")
            .with_thread("io-1")
            .with_property("mount", "/var");
        warn.mark_triggering();
        vec![
            Record::new(Level::Debug, "heartbeat 1").with_thread("io-1"),
            warn,
            Record::new(Level::Error, "failed").with_exception("Error: \"boom\" & more"),
        ]
    }

    #[test]
    fn test_render_preserves_order() {
        let doc = render(&batch(), &Layout::default());
        let messages: Vec<_> = doc.entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["heartbeat 1", "disk <90%> full", "failed"]);
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.triggering_count(), 1);
    }

    #[test]
    fn test_xml_is_bracketed_and_escaped() {
        let doc = render(&batch(), &Layout::default());
        let xml = doc.to_xml();
        assert!(xml.starts_with("<?xml version='1.0' ?>\n<events>\n"));
        assert!(xml.ends_with("</events>\n"));
        assert!(xml.contains("<message>disk &lt;90%&gt; full</message>"));
        assert!(xml.contains(r#"<data name="mount" value="/var" />"#));
        assert!(xml.contains(r#"<data name="IsTrigger" value="true" />"#));
        assert!(xml.contains("<exception>Error: &quot;boom&quot; &amp; more</exception>"));
        assert!(xml.contains(r#"level="WARN""#));
        assert_eq!(xml.matches("<event ").count(), 3);
    }

    #[test]
    fn test_custom_layout() {
        let layout = Layout {
            header: "[".to_string(),
            footer: "]".to_string(),
        };
        let doc = render(&[], &layout);
        assert!(doc.is_empty());
        assert_eq!(doc.to_xml(), "[]");
    }

    #[test]
    fn test_control_characters_are_escaped() {
        assert_eq!(xml_escape("a\u{1}b\tc"), "a&#x1;b\tc");
    }
}
