pub mod expand;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::backends::BackendKind;
use crate::errors::CoreError;

/// Transfer type used for FTP data connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FtpMode {
    #[default]
    Binary,
    Ascii,
}

/// Connection-level configuration, consumed once at connect time.
///
/// Keys are snake_case. Every field has a default, so an empty object is a
/// valid (local, root `/`) configuration. The same option bag also carries
/// action options; unknown keys are ignored here.
///
/// - `timeout`: FTP connect timeout in seconds (default 90).
/// - `root`: the directory logical paths are resolved against (default `/`).
/// - `default_*_permissions`: octal modes applied to newly created entries.
///   Accepted as an octal string (`"0755"`) or an integer whose decimal
///   digits are read as octal (`755`).
/// - `timezone`: fixed offset (`"+02:00"`) for FTP listing dates, UTC when
///   absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_ftp_port")]
    pub port: u16,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_passive_mode")]
    pub passive_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_directory: Option<String>,
    #[serde(default)]
    pub ftp_mode: FtpMode,
    #[serde(default = "default_root")]
    pub root: String,
    #[serde(default)]
    pub persistence: bool,
    #[serde(
        default = "default_directory_permissions",
        deserialize_with = "deserialize_octal",
        serialize_with = "serialize_octal"
    )]
    pub default_directory_permissions: u32,
    #[serde(
        default = "default_file_permissions",
        deserialize_with = "deserialize_octal",
        serialize_with = "serialize_octal"
    )]
    pub default_file_permissions: u32,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default)]
    pub ssl: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: String::new(),
            host: String::new(),
            port: default_ftp_port(),
            timeout: default_timeout(),
            passive_mode: default_passive_mode(),
            initial_directory: None,
            ftp_mode: FtpMode::default(),
            root: default_root(),
            persistence: false,
            default_directory_permissions: default_directory_permissions(),
            default_file_permissions: default_file_permissions(),
            read_only: false,
            timezone: None,
            ssl: false,
        }
    }
}

/// A single validation problem with a connection option.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ConnectionOptions {
    /// Parse the connection keys out of an option bag.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, CoreError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Config(format!("Invalid connection options: {e}")))
    }

    /// Return a copy with all `${env:...}` placeholders and `~` expanded.
    pub fn expand(mut self) -> Self {
        self.host = expand::expand_env_placeholders(&self.host);
        self.username = expand::expand_env_placeholders(&self.username);
        self.password = expand::expand_env_placeholders(&self.password);
        self.root = expand::expand_tilde(&expand::expand_env_placeholders(&self.root));
        self.initial_directory = self
            .initial_directory
            .map(|s| expand::expand_env_placeholders(&s));
        self
    }

    /// Check the options required by `kind`.
    ///
    /// Returns every problem found; an empty list means the options are
    /// usable for that backend.
    pub fn validate(&self, kind: BackendKind) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (field, mode) in [
            (
                "default_directory_permissions",
                self.default_directory_permissions,
            ),
            ("default_file_permissions", self.default_file_permissions),
        ] {
            if mode > 0o7777 {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: format!("{field} must be at most 7777 (octal)"),
                });
            }
        }

        if self.timezone.is_some() && self.timezone_offset().is_err() {
            errors.push(ValidationError {
                field: "timezone".to_string(),
                message: "timezone must be UTC or a fixed offset like +02:00".to_string(),
            });
        }

        if kind == BackendKind::Ftp {
            if self.host.trim().is_empty() {
                errors.push(ValidationError {
                    field: "host".to_string(),
                    message: "host is required".to_string(),
                });
            }
            if self.port == 0 {
                errors.push(ValidationError {
                    field: "port".to_string(),
                    message: "port must be at least 1".to_string(),
                });
            }
            if self.timeout == 0 {
                errors.push(ValidationError {
                    field: "timeout".to_string(),
                    message: "timeout must be at least 1 second".to_string(),
                });
            }
        }

        errors
    }

    /// The configured timezone as a fixed offset.
    pub fn timezone_offset(&self) -> Result<FixedOffset, CoreError> {
        let utc = Utc.fix();
        match self.timezone.as_deref().map(str::trim) {
            None | Some("") => Ok(utc),
            Some(tz) if tz.eq_ignore_ascii_case("utc") || tz == "Z" => Ok(utc),
            Some(tz) => tz
                .parse::<FixedOffset>()
                .map_err(|e| CoreError::Config(format!("Invalid timezone {tz:?}: {e}"))),
        }
    }
}

/// Parse an octal mode given as a string or as an integer spelled in octal.
pub fn parse_octal_mode(value: &serde_json::Value) -> Option<u32> {
    let digits = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.as_u64()?.to_string(),
        _ => return None,
    };
    let digits = digits.strip_prefix("0o").unwrap_or(&digits);
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 8).ok()
}

fn deserialize_octal<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    parse_octal_mode(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid octal mode: {value}")))
}

fn serialize_octal<S>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{mode:04o}"))
}

// --- Default value functions ---

fn default_username() -> String {
    "anonymous".to_string()
}

fn default_ftp_port() -> u16 {
    21
}

fn default_timeout() -> u64 {
    90
}

fn default_passive_mode() -> bool {
    true
}

fn default_root() -> String {
    "/".to_string()
}

fn default_directory_permissions() -> u32 {
    0o755
}

fn default_file_permissions() -> u32 {
    0o644
}
