//! Delivery for mailbatch.
//!
//! An [`Addressing`] descriptor picks a [`Transport`]: a maildrop directory
//! or an SMTP server, plain or over implicit TLS. Messages are assembled as [`MailMessage`] values
//! with an HTML body.

pub mod addressing;
pub mod error;
pub mod maildrop;
pub mod message;
pub mod smtp;
pub mod tls;

pub use addressing::{Addressing, Credentials, SmtpEndpoint, SMTP_CONFIG_ENV};
pub use error::{Result, TransportError};
pub use maildrop::Maildrop;
pub use message::{default_sender, MailMessage, Mailbox, Priority};
pub use smtp::SmtpTransport;

/// Something that can deliver a message.
pub trait Transport: Send + Sync {
    fn send(&self, message: &MailMessage) -> Result<()>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Build the transport named by `addressing`.
pub fn transport_for(addressing: &Addressing) -> Result<Box<dyn Transport>> {
    addressing.validate()?;
    Ok(match addressing {
        Addressing::Maildrop { dir } => Box::new(Maildrop::new(dir.clone())),
        Addressing::Smtp(endpoint) => Box::new(SmtpTransport::new(endpoint.clone())),
    })
}
