//! FTP backend over suppaftp's blocking client.
//!
//! Absolute logical paths are resolved beneath `root` on the server;
//! relative ones against the working directory reported by `PWD` after
//! login (and the optional `initial_directory` change). Discovery over FTP
//! is single-level: [`Backend::lists_recursively`] returns `false`.

pub mod listing;

use std::io::Cursor;
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use suppaftp::types::{FileType, FormatControl};
use suppaftp::{FtpError, Mode, NativeTlsConnector, NativeTlsFtpStream};
use tracing::{debug, info, warn};

use crate::config::{ConnectionOptions, FtpMode};
use crate::errors::{Result, StorageError};
use crate::files::{Access, EntryKind, RawEntry};
use crate::path;

use super::{Backend, BackendKind, WriteMode};

pub use listing::{ListingParser, ServerFlavor};

/// Backend speaking FTP (optionally explicit FTPS) to a remote server.
pub struct FtpBackend {
    options: ConnectionOptions,
    root: String,
    cwd: String,
    offset: FixedOffset,
    flavor: ServerFlavor,
    stream: Option<NativeTlsFtpStream>,
}

impl FtpBackend {
    pub fn new(options: ConnectionOptions) -> Self {
        let root = match path::normalize(&options.root) {
            r if r.is_empty() => "/".to_string(),
            r => r,
        };
        let offset = options.timezone_offset().unwrap_or_else(|_| Utc.fix());
        Self {
            options,
            cwd: root.clone(),
            root,
            offset,
            flavor: ServerFlavor::default(),
            stream: None,
        }
    }

    fn stream_mut(&mut self) -> Result<&mut NativeTlsFtpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| StorageError::Connection("FTP session is not connected".to_string()))
    }

    fn parser(&self) -> ListingParser {
        ListingParser {
            flavor: self.flavor,
            offset: self.offset,
            today: Utc::now().with_timezone(&self.offset).date_naive(),
        }
    }

    fn resolve_addr(&self) -> Result<SocketAddr> {
        (self.options.host.as_str(), self.options.port)
            .to_socket_addrs()
            .map_err(|e| {
                StorageError::Connection(format!("cannot resolve {}: {e}", self.options.host))
            })?
            .next()
            .ok_or_else(|| {
                StorageError::Connection(format!("no address for {}", self.options.host))
            })
    }

    fn open_stream(&self) -> Result<NativeTlsFtpStream> {
        let addr = self.resolve_addr()?;
        let timeout = Duration::from_secs(self.options.timeout);
        let stream = NativeTlsFtpStream::connect_timeout(addr, timeout)
            .map_err(|e| StorageError::Connection(format!("connect to {addr} failed: {e}")))?;

        if !self.options.ssl {
            return Ok(stream);
        }
        let connector = native_tls::TlsConnector::new()
            .map_err(|e| StorageError::Connection(format!("TLS setup failed: {e}")))?;
        stream
            .into_secure(NativeTlsConnector::from(connector), &self.options.host)
            .map_err(|e| StorageError::Connection(format!("TLS upgrade failed: {e}")))
    }

    /// `LIST` a directory by its server path; `Ok(None)` when the server
    /// refuses because the directory does not exist.
    fn list_lines(&mut self, server_path: &str) -> Result<Option<Vec<String>>> {
        match self.stream_mut()?.list(Some(server_path)) {
            Ok(lines) => Ok(Some(lines)),
            Err(FtpError::UnexpectedResponse(_)) => Ok(None),
            Err(e) => Err(ftp_error("LIST", server_path, e)),
        }
    }

    fn put(&mut self, server_path: &str, data: &[u8], append: bool) -> Result<()> {
        let mut reader = Cursor::new(data);
        let stream = self.stream_mut()?;
        let result = if append {
            stream.append_file(server_path, &mut reader)
        } else {
            stream.put_file(server_path, &mut reader)
        };
        result.map_err(|e| ftp_error(if append { "APPE" } else { "STOR" }, server_path, e))?;
        Ok(())
    }
}

impl Drop for FtpBackend {
    fn drop(&mut self) {
        if self.stream.is_some() {
            let _ = self.close();
        }
    }
}

impl Backend for FtpBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ftp
    }

    fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let mut stream = self.open_stream()?;
        stream.set_mode(if self.options.passive_mode {
            Mode::Passive
        } else {
            Mode::Active
        });

        stream
            .login(self.options.username.as_str(), self.options.password.as_str())
            .map_err(|e| {
                StorageError::Connection(format!(
                    "login as {} failed: {e}",
                    self.options.username
                ))
            })?;

        let file_type = match self.options.ftp_mode {
            FtpMode::Binary => FileType::Binary,
            FtpMode::Ascii => FileType::Ascii(FormatControl::Default),
        };
        stream
            .transfer_type(file_type)
            .map_err(|e| StorageError::Connection(format!("TYPE failed: {e}")))?;

        self.flavor = ServerFlavor::detect(stream.get_welcome_msg());

        if let Some(dir) = self
            .options
            .initial_directory
            .as_deref()
            .filter(|d| !d.trim().is_empty())
        {
            stream.cwd(dir).map_err(|e| {
                StorageError::Connection(format!("cannot change to {dir}: {e}"))
            })?;
        }

        let pwd = stream
            .pwd()
            .map_err(|e| StorageError::Connection(format!("PWD failed: {e}")))?;
        self.cwd = match path::normalize(&pwd) {
            p if p.is_empty() => "/".to_string(),
            p => p,
        };

        info!(
            "FTP connected to {}:{} as {} (cwd {}, {:?} server)",
            self.options.host, self.options.port, self.options.username, self.cwd, self.flavor
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.quit() {
                warn!("FTP quit failed: {e}");
            } else {
                debug!("FTP session to {} closed", self.options.host);
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn absolute_path(&self, path: &str) -> String {
        let logical = path::normalize(path);
        if path::is_absolute(&logical) {
            path::under_root(&self.root, &logical)
        } else {
            path::under_root(&self.cwd, &logical)
        }
    }

    fn root_path(&self) -> String {
        self.root.clone()
    }

    fn lists_recursively(&self) -> bool {
        false
    }

    fn stat(&mut self, path: &str) -> Result<Option<RawEntry>> {
        let logical = path::normalize(path);
        let server_path = self.absolute_path(&logical);
        self.stream_mut()?;

        let Some(parent) = path::parent(&server_path) else {
            return Ok(Some(server_root_entry(&logical)));
        };
        let name = path::name(&server_path).to_string();

        let Some(lines) = self.list_lines(&parent)? else {
            return Ok(None);
        };
        let parser = self.parser();
        let Some(mut entry) = lines
            .iter()
            .filter_map(|line| parser.parse(&parent, line))
            .find(|e| e.name == name)
        else {
            return Ok(None);
        };

        if entry.is_file() {
            if let Ok(mdtm) = self.stream_mut()?.mdtm(&server_path) {
                entry.modified = Some(Utc.from_utc_datetime(&mdtm));
            }
        }
        entry.path = logical;
        Ok(Some(entry))
    }

    fn list_raw(&mut self, path: &str) -> Result<Vec<RawEntry>> {
        let logical = path::normalize(path);
        let server_path = self.absolute_path(&logical);
        let lines = self
            .list_lines(&server_path)?
            .ok_or_else(|| StorageError::NotFound(logical.clone()))?;

        let parser = self.parser();
        let mut entries = Vec::with_capacity(lines.len());
        for line in &lines {
            match parser.parse(&logical, line) {
                Some(entry) => entries.push(entry),
                None if line.starts_with("total ") || line.trim().is_empty() => {}
                None => {
                    let name = line.split_whitespace().last().unwrap_or_default();
                    if name != "." && name != ".." {
                        warn!("Skipping unparseable listing line: {line:?}");
                    }
                }
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_bytes(&mut self, path: &str) -> Result<Vec<u8>> {
        let server_path = self.absolute_path(path);
        let buffer = self
            .stream_mut()?
            .retr_as_buffer(&server_path)
            .map_err(|e| ftp_error("RETR", &server_path, e))?;
        Ok(buffer.into_inner())
    }

    fn write_bytes(&mut self, path: &str, data: &[u8], mode: WriteMode) -> Result<()> {
        let server_path = self.absolute_path(path);
        debug!("FTP write {} bytes to {} ({:?})", data.len(), server_path, mode);
        self.put(&server_path, data, mode == WriteMode::Append)
    }

    fn delete_file(&mut self, path: &str) -> Result<()> {
        let server_path = self.absolute_path(path);
        debug!("FTP DELE {}", server_path);
        self.stream_mut()?
            .rm(&server_path)
            .map_err(|e| ftp_error("DELE", &server_path, e))
    }

    fn remove_dir(&mut self, path: &str) -> Result<()> {
        let server_path = self.absolute_path(path);
        debug!("FTP RMD {}", server_path);
        self.stream_mut()?
            .rmdir(&server_path)
            .map_err(|e| ftp_error("RMD", &server_path, e))
    }

    fn mkdir(&mut self, path: &str) -> Result<()> {
        let server_path = self.absolute_path(path);
        debug!("FTP MKD {}", server_path);
        self.stream_mut()?
            .mkdir(&server_path)
            .map_err(|e| ftp_error("MKD", &server_path, e))
    }

    fn chmod(&mut self, path: &str, mode: u32) -> Result<()> {
        let server_path = self.absolute_path(path);
        let command = format!("CHMOD {:04o} {}", mode & 0o7777, server_path);
        self.stream_mut()?
            .site(&command)
            .map_err(|e| ftp_error("SITE CHMOD", &server_path, e))?;
        Ok(())
    }

    fn chown(&mut self, _path: &str, _user: &str) -> Result<()> {
        Err(StorageError::NotSupported(
            "changing the owner is not available over FTP".to_string(),
        ))
    }

    fn chgrp(&mut self, _path: &str, _group: &str) -> Result<()> {
        Err(StorageError::NotSupported(
            "changing the group is not available over FTP".to_string(),
        ))
    }

    fn touch(
        &mut self,
        path: &str,
        modified: Option<DateTime<Utc>>,
        accessed: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if modified.is_some() || accessed.is_some() {
            return Err(StorageError::NotSupported(
                "setting explicit timestamps is not available over FTP".to_string(),
            ));
        }

        // Re-uploading the content is the only portable way to bump the
        // modification time.
        let content = match self.stat(path)? {
            Some(entry) if entry.is_file() => self.read_bytes(path)?,
            Some(_) => {
                return Err(StorageError::OperationFailed(format!(
                    "{path} is not a file"
                )))
            }
            None => Vec::new(),
        };
        self.write_bytes(path, &content, WriteMode::Replace)
    }
}

/// The server's `/` never appears in any listing.
fn server_root_entry(logical: &str) -> RawEntry {
    RawEntry {
        name: String::new(),
        path: logical.to_string(),
        kind: Some(EntryKind::Directory),
        size: 0,
        owner: None,
        group: None,
        created: None,
        accessed: None,
        modified: None,
        mode: None,
        access: Access {
            readable: true,
            writeable: true,
            executable: true,
        },
    }
}

fn ftp_error(command: &str, path: &str, err: FtpError) -> StorageError {
    match err {
        FtpError::ConnectionError(e) => {
            StorageError::Connection(format!("{command} {path}: {e}"))
        }
        other => StorageError::OperationFailed(format!("{command} {path}: {other}")),
    }
}
