//! RFC 5322 message assembly.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TransportError};

const BODY_LINE_WIDTH: usize = 76;

/// Name used in the default sender.
pub const DEFAULT_SENDER_NAME: &str = "mailbatch";

/// A mail address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub name: Option<String>,
    pub address: String,
}

impl Mailbox {
    pub fn new(name: Option<String>, address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        validate_address(&address)?;
        Ok(Mailbox { name, address })
    }

    /// Domain part of the address.
    pub fn domain(&self) -> &str {
        self.address
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or("localhost")
    }

    /// Parse a comma or semicolon separated address list.
    pub fn parse_list(list: &str) -> Result<Vec<Mailbox>> {
        list.split([',', ';'])
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Mailbox::from_str)
            .collect()
    }
}

/// `mailbatch <mailbatch@HOST>`, with HOST taken from the environment.
pub fn default_sender() -> Mailbox {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty() && !h.contains(char::is_whitespace))
        .unwrap_or_else(|| "localhost".to_string());
    Mailbox {
        name: Some(DEFAULT_SENDER_NAME.to_string()),
        address: format!("{}@{}", DEFAULT_SENDER_NAME, host),
    }
}

fn validate_address(address: &str) -> Result<()> {
    let valid = match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !address
                    .chars()
                    .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '<' | '>' | ','))
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(TransportError::InvalidAddress(address.to_string()))
    }
}

impl FromStr for Mailbox {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match (s.find('<'), s.ends_with('>')) {
            (Some(open), true) => {
                let name = s[..open].trim().trim_matches('"').trim();
                let name = (!name.is_empty()).then(|| name.to_string());
                Mailbox::new(name, &s[open + 1..s.len() - 1])
            }
            _ => Mailbox::new(None, s),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", encode_phrase(name), self.address),
            None => write!(f, "<{}>", self.address),
        }
    }
}

impl Serialize for Mailbox {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match &self.name {
            Some(name) => serializer.collect_str(&format_args!("{} <{}>", name, self.address)),
            None => serializer.serialize_str(&self.address),
        }
    }
}

impl<'de> Deserialize<'de> for Mailbox {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Mail priority, carried in the `X-Priority` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    fn x_priority(self) -> &'static str {
        match self {
            Priority::High => "1 (Highest)",
            Priority::Normal => "3 (Normal)",
            Priority::Low => "5 (Lowest)",
        }
    }

    fn importance(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            _ => Err(format!("invalid priority: {}", s)),
        }
    }
}

/// One outgoing message with an HTML body.
#[derive(Debug, Clone)]
pub struct MailMessage {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub from: Mailbox,
    pub to: Vec<Mailbox>,
    pub reply_to: Option<Mailbox>,
    pub subject: String,
    pub priority: Priority,
    pub html_body: String,
}

impl MailMessage {
    pub fn new(
        from: Mailbox,
        to: Vec<Mailbox>,
        subject: impl Into<String>,
        html_body: impl Into<String>,
    ) -> Result<Self> {
        if to.is_empty() {
            return Err(TransportError::NoRecipients);
        }
        Ok(MailMessage {
            id: Uuid::new_v4(),
            date: Utc::now(),
            from,
            to,
            reply_to: None,
            subject: subject.into(),
            priority: Priority::default(),
            html_body: html_body.into(),
        })
    }

    pub fn with_reply_to(mut self, reply_to: Option<Mailbox>) -> Self {
        self.reply_to = reply_to;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn message_id(&self) -> String {
        format!("<{}@{}>", self.id, self.from.domain())
    }

    /// Wire form with CRLF line endings.
    pub fn to_rfc822(&self) -> String {
        let mut out = String::with_capacity(self.html_body.len() * 4 / 3 + 512);
        let mut header = |name: &str, value: &str| {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        };

        header("Date", &self.date.to_rfc2822());
        header("From", &self.from.to_string());
        let to: Vec<String> = self.to.iter().map(ToString::to_string).collect();
        header("To", &to.join(", "));
        if let Some(reply_to) = &self.reply_to {
            header("Reply-To", &reply_to.to_string());
        }
        header("Subject", &encode_header_text(&self.subject));
        header("Message-ID", &self.message_id());
        header("MIME-Version", "1.0");
        header("X-Priority", self.priority.x_priority());
        header("Importance", self.priority.importance());
        header("Content-Type", "text/html; charset=utf-8");
        header("Content-Transfer-Encoding", "base64");

        out.push_str("\r\n");
        let encoded = STANDARD.encode(self.html_body.as_bytes());
        for chunk in encoded.as_bytes().chunks(BODY_LINE_WIDTH) {
            // base64 output is ASCII
            out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
            out.push_str("\r\n");
        }
        out
    }
}

/// Header text, RFC 2047 B-encoded when it is not plain printable ASCII.
fn encode_header_text(text: &str) -> String {
    let text: String = text
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    if text.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        text
    } else {
        format!("=?utf-8?B?{}?=", STANDARD.encode(text.as_bytes()))
    }
}

fn encode_phrase(name: &str) -> String {
    let encoded = encode_header_text(name);
    if encoded.starts_with("=?") || !name.contains(|c: char| "()<>[]:;@\\,.\"".contains(c)) {
        encoded
    } else {
        format!("\"{}\"", encoded.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> MailMessage {
        MailMessage::new(
            "mailbatch <mailbatch@build01>".parse().unwrap(),
            Mailbox::parse_list("ops@example.com; Dev Team <dev@example.com>").unwrap(),
            "1 of 4 (lost 0)",
            "<p>hello</p>",
        )
        .unwrap()
    }

    #[test]
    fn test_mailbox_parsing() {
        let mailbox: Mailbox = "\"Ops, Night\" <ops@example.com>".parse().unwrap();
        assert_eq!(mailbox.name.as_deref(), Some("Ops, Night"));
        assert_eq!(mailbox.address, "ops@example.com");
        assert_eq!(mailbox.domain(), "example.com");
        assert!("not-an-address".parse::<Mailbox>().is_err());
        assert!("a@b@c".parse::<Mailbox>().is_err());
        assert!("bad address@example.com".parse::<Mailbox>().is_err());
    }

    #[test]
    fn test_parse_list() {
        let list = Mailbox::parse_list("a@example.com, b@example.com;;").unwrap();
        assert_eq!(list.len(), 2);
        assert!(Mailbox::parse_list("a@example.com, nope").is_err());
    }

    #[test]
    fn test_no_recipients() {
        let err = MailMessage::new(default_sender(), vec![], "s", "b").unwrap_err();
        assert!(matches!(err, TransportError::NoRecipients));
    }

    #[test]
    fn test_headers() {
        let msg = message().with_priority(Priority::High);
        let wire = msg.to_rfc822();
        assert!(wire.contains("From: mailbatch <mailbatch@build01>\r\n"));
        assert!(wire.contains("To: <ops@example.com>, Dev Team <dev@example.com>\r\n"));
        assert!(wire.contains("Subject: 1 of 4 (lost 0)\r\n"));
        assert!(wire.contains("X-Priority: 1 (Highest)\r\n"));
        assert!(wire.contains(&format!("Message-ID: <{}@build01>\r\n", msg.id)));
        assert!(wire.contains("Content-Transfer-Encoding: base64\r\n"));
        assert!(!wire.contains("Reply-To"));
    }

    #[test]
    fn test_body_is_base64_wrapped() {
        let mut msg = message();
        msg.html_body = "x".repeat(200);
        let wire = msg.to_rfc822();
        let (_, body) = wire.split_once("\r\n\r\n").unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert!(lines.iter().all(|l| l.trim_end().len() <= BODY_LINE_WIDTH));
        let joined: String = lines.iter().map(|l| l.trim_end()).collect();
        assert_eq!(STANDARD.decode(joined).unwrap(), msg.html_body.as_bytes());
    }

    #[test]
    fn test_subject_encoding() {
        assert_eq!(encode_header_text("plain"), "plain");
        assert_eq!(encode_header_text("a\r\nBcc: x"), "a  Bcc: x");
        let encoded = encode_header_text("Fehler für Ops");
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert!(encoded.ends_with("?="));
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }
}
