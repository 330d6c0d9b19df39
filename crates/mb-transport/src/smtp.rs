//! Blocking SMTP client, plain or implicit TLS.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use tracing::{debug, trace};

use crate::addressing::SmtpEndpoint;
use crate::error::{Result, TransportError};
use crate::message::MailMessage;
use crate::tls;
use crate::Transport;

/// Default connect and read/write timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const GREETING: &[u16] = &[220];
const COMPLETED: &[u16] = &[250];
const AUTHENTICATED: &[u16] = &[235];
const RECIPIENT_OK: &[u16] = &[250, 251];
const START_INPUT: &[u16] = &[354];

/// Delivers messages to a mail server, one connection per message.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    endpoint: SmtpEndpoint,
    timeout: Duration,
    client_name: String,
    tls: OnceLock<Arc<ClientConfig>>,
}

#[derive(Debug)]
struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    fn is(&self, accepted: &[u16]) -> bool {
        accepted.contains(&self.code)
    }

    fn text(&self) -> String {
        self.lines.join(" ")
    }
}

impl SmtpTransport {
    pub fn new(endpoint: SmtpEndpoint) -> Self {
        Self {
            endpoint,
            timeout: DEFAULT_TIMEOUT,
            client_name: "localhost".to_string(),
            tls: OnceLock::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name announced in EHLO/HELO.
    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// Trust these roots for `smtps` instead of the system CA bundle.
    pub fn with_tls_roots(self, roots: RootCertStore) -> Self {
        let tls = OnceLock::new();
        let _ = tls.set(tls::client_config(roots));
        Self { tls, ..self }
    }

    fn connect(&self) -> Result<TcpStream> {
        let addrs = (self.endpoint.host.as_str(), self.endpoint.port).to_socket_addrs()?;
        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(self.timeout))?;
                    stream.set_write_timeout(Some(self.timeout))?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address for {}", self.endpoint.host),
                )
            })
            .into())
    }

    fn tls_config(&self) -> Result<Arc<ClientConfig>> {
        if let Some(config) = self.tls.get() {
            return Ok(config.clone());
        }
        let config = tls::default_client_config()?;
        let _ = self.tls.set(config.clone());
        Ok(config)
    }

    fn secure(&self, stream: TcpStream) -> Result<StreamOwned<ClientConnection, TcpStream>> {
        let name = ServerName::try_from(self.endpoint.host.as_str())
            .map_err(|e| {
                TransportError::Tls(format!("invalid server name {}: {}", self.endpoint.host, e))
            })?
            .to_owned();
        let conn = ClientConnection::new(self.tls_config()?, name)
            .map_err(|e| TransportError::Tls(e.to_string()))?;
        Ok(StreamOwned::new(conn, stream))
    }

    fn converse<S: Read + Write>(
        &self,
        mut session: Session<S>,
        message: &MailMessage,
    ) -> Result<()> {
        session.expect("greeting", None, GREETING)?;

        let ehlo = session.command(&format!("EHLO {}", self.client_name))?;
        if !ehlo.is(COMPLETED) {
            let helo = format!("HELO {}", self.client_name);
            session.expect("HELO", Some(&helo), COMPLETED)?;
        }

        if let Some(credentials) = &self.endpoint.credentials {
            let token = STANDARD.encode(format!(
                "\0{}\0{}",
                credentials.username, credentials.password
            ));
            let auth = format!("AUTH PLAIN {}", token);
            session.expect("AUTH", Some(&auth), AUTHENTICATED)?;
        }

        session.expect(
            "MAIL FROM",
            Some(&format!("MAIL FROM:<{}>", message.from.address)),
            COMPLETED,
        )?;
        for rcpt in &message.to {
            session.expect(
                "RCPT TO",
                Some(&format!("RCPT TO:<{}>", rcpt.address)),
                RECIPIENT_OK,
            )?;
        }
        session.expect("DATA", Some("DATA"), START_INPUT)?;
        session.send_data(&message.to_rfc822())?;
        session.expect("message", None, COMPLETED)?;

        // The message is accepted at this point.
        let _ = session.command("QUIT");
        Ok(())
    }
}

impl Transport for SmtpTransport {
    fn send(&self, message: &MailMessage) -> Result<()> {
        let stream = self.connect()?;
        if self.endpoint.implicit_tls {
            self.converse(Session::new(self.secure(stream)?), message)?;
        } else {
            self.converse(Session::new(stream), message)?;
        }

        debug!(
            host = %self.endpoint.host,
            port = self.endpoint.port,
            tls = self.endpoint.implicit_tls,
            recipients = message.to.len(),
            "message delivered"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        let scheme = if self.endpoint.implicit_tls { "smtps" } else { "smtp" };
        format!("{}://{}:{}", scheme, self.endpoint.host, self.endpoint.port)
    }
}

struct Session<S> {
    stream: BufReader<S>,
}

impl<S: Read + Write> Session<S> {
    fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    fn command(&mut self, line: &str) -> Result<Reply> {
        if line.starts_with("AUTH") {
            trace!("C: AUTH PLAIN ****");
        } else {
            trace!(line, "C:");
        }
        let writer = self.stream.get_mut();
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\r\n")?;
        writer.flush()?;
        self.read_reply()
    }

    /// Send `line` (or just read when `None`) and require one of `accepted`.
    fn expect(&mut self, what: &str, line: Option<&str>, accepted: &[u16]) -> Result<Reply> {
        let reply = match line {
            Some(line) => self.command(line)?,
            None => self.read_reply()?,
        };
        if reply.is(accepted) {
            Ok(reply)
        } else {
            Err(TransportError::Protocol {
                command: what.to_string(),
                code: reply.code,
                reply: reply.text(),
            })
        }
    }

    fn send_data(&mut self, data: &str) -> Result<()> {
        let mut buf = String::with_capacity(data.len() + 16);
        for line in data.split("\r\n") {
            if line.starts_with('.') {
                buf.push('.');
            }
            buf.push_str(line);
            buf.push_str("\r\n");
        }
        // `split` yields a trailing empty piece for CRLF-terminated data.
        if data.ends_with("\r\n") {
            buf.truncate(buf.len() - 2);
        }
        buf.push_str(".\r\n");
        let writer = self.stream.get_mut();
        writer.write_all(buf.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn read_reply(&mut self) -> Result<Reply> {
        let mut lines = Vec::new();
        loop {
            let mut line = String::new();
            if self.stream.read_line(&mut line)? == 0 {
                return Err(TransportError::MalformedReply(
                    "connection closed".to_string(),
                ));
            }
            let line = line.trim_end_matches(['\r', '\n']);
            trace!(line, "S:");
            if line.len() < 3 || !line.is_char_boundary(3) {
                return Err(TransportError::MalformedReply(line.to_string()));
            }
            let code: u16 = line[..3]
                .parse()
                .map_err(|_| TransportError::MalformedReply(line.to_string()))?;
            let more = line.as_bytes().get(3) == Some(&b'-');
            lines.push(line.get(4..).unwrap_or_default().to_string());
            if !more {
                return Ok(Reply { code, lines });
            }
        }
    }
}
