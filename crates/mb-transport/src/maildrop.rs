//! Maildrop (pickup directory) delivery.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::message::MailMessage;
use crate::Transport;

/// Writes each message as `<id>.eml` into a directory.
#[derive(Debug, Clone)]
pub struct Maildrop {
    dir: PathBuf,
}

impl Maildrop {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the message and return its path.
    ///
    /// The file is written under a temporary name and renamed so pickup
    /// agents never see a partial message.
    pub fn deliver(&self, message: &MailMessage) -> Result<PathBuf> {
        let map_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| TransportError::Maildrop { path, source }
        };

        fs::create_dir_all(&self.dir).map_err(map_err(&self.dir))?;

        let path = self.dir.join(format!("{}.eml", message.id));
        let tmp = self.dir.join(format!(".{}.eml.tmp", message.id));

        let mut file = fs::File::create(&tmp).map_err(map_err(&tmp))?;
        file.write_all(message.to_rfc822().as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(map_err(&tmp))?;
        drop(file);
        fs::rename(&tmp, &path).map_err(map_err(&path))?;

        debug!(path = %path.display(), "message written to maildrop");
        Ok(path)
    }
}

impl Transport for Maildrop {
    fn send(&self, message: &MailMessage) -> Result<()> {
        self.deliver(message).map(|_| ())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.dir.display())
    }
}
