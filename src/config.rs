//! Configuration management for the MJPEG HTTP streamer

use crate::capture::PixelFormat;
use crate::server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete streamer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Statistics reporting interval (seconds), 0 disables the report
    #[serde(default = "default_stats_interval")]
    pub stats_interval_seconds: u64,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub capture: CaptureSection,

    #[serde(default)]
    pub recording: RecordingSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stats_interval_seconds: default_stats_interval(),
            server: ServerSection::default(),
            capture: CaptureSection::default(),
            recording: RecordingSection::default(),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Digest username
    #[serde(default = "default_username")]
    pub username: String,

    /// Setting a password turns on Digest authentication
    #[serde(default)]
    pub password: Option<String>,

    /// Concurrent client limit (0 = unlimited)
    #[serde(default)]
    pub max_clients: usize,

    /// Time a client has to send each request line (seconds)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Time running sessions get to finish at shutdown (seconds)
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            username: default_username(),
            password: None,
            max_clients: 0,
            read_timeout_secs: default_read_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

/// Where frames come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureSource {
    /// Generated colour bars
    TestPattern,
    /// JPEG files replayed from `device`, which names a directory
    Directory,
    /// Video4Linux2 device at `device`
    V4l2,
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureSource::TestPattern => "test-pattern",
            CaptureSource::Directory => "directory",
            CaptureSource::V4l2 => "v4l2",
        };
        f.write_str(name)
    }
}

impl FromStr for CaptureSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test-pattern" => Ok(CaptureSource::TestPattern),
            "directory" => Ok(CaptureSource::Directory),
            "v4l2" => Ok(CaptureSource::V4l2),
            other => Err(ConfigError::Invalid(format!(
                "unknown capture source '{}', expected test-pattern, directory or v4l2",
                other
            ))),
        }
    }
}

/// Capture and compression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSection {
    #[serde(default = "default_source")]
    pub source: CaptureSource,

    /// Device node, or frame directory for the `directory` source
    #[serde(default = "default_device")]
    pub device: String,

    /// Frame width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Frame height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Frames per second
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Pixel format requested from the source
    #[serde(default = "default_format")]
    pub format: PixelFormat,

    /// JPEG quality (1-100) for formats that need compressing
    #[serde(default = "default_quality")]
    pub quality: u8,

    /// Number of frame slots in the pipeline
    #[serde(default = "default_slots")]
    pub slots: usize,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            source: default_source(),
            device: default_device(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            format: default_format(),
            quality: default_quality(),
            slots: default_slots(),
        }
    }
}

/// Optional recording of the frame stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingSection {
    /// Raw MJPEG output file; no recording when unset
    #[serde(default)]
    pub output: Option<PathBuf>,
}

// Default value functions
fn default_port() -> u16 {
    8080
}
fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
fn default_username() -> String {
    "uvc_user".to_string()
}
fn default_read_timeout() -> u64 {
    30
}
fn default_shutdown_grace() -> u64 {
    1
}
fn default_stats_interval() -> u64 {
    10
}
fn default_source() -> CaptureSource {
    CaptureSource::TestPattern
}
fn default_device() -> String {
    "/dev/video0".to_string()
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_fps() -> u32 {
    5
}
fn default_format() -> PixelFormat {
    PixelFormat::Mjpeg
}
fn default_quality() -> u8 {
    40
}
fn default_slots() -> usize {
    3
}

/// Named frame sizes accepted on the command line
pub const RESOLUTIONS: &[(&str, u32, u32)] = &[
    ("1280x720", 1280, 720),
    ("960x720", 960, 720),
    ("800x600", 800, 600),
    ("854x480", 854, 480),
    ("800x480", 800, 480),
    ("768x576", 768, 576),
    ("640x480", 640, 480),
    ("480x320", 480, 320),
    ("384x288", 384, 288),
    ("352x288", 352, 288),
    ("320x240", 320, 240),
    ("320x200", 320, 200),
    ("160x120", 160, 120),
];

/// One of the supported frame sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl FromStr for Resolution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RESOLUTIONS
            .iter()
            .find(|(name, _, _)| *name == s)
            .map(|&(_, width, height)| Resolution { width, height })
            .ok_or_else(|| {
                let names: Vec<_> = RESOLUTIONS.iter().map(|(name, _, _)| *name).collect();
                ConfigError::Invalid(format!(
                    "unsupported resolution '{}', expected one of {}",
                    s,
                    names.join(", ")
                ))
            })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl Config {
    /// Loads configuration from TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Loads `path` if it exists, otherwise returns the defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads configuration from TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server: port must be > 0".into()));
        }

        if self.server.password.as_deref() == Some("") {
            return Err(ConfigError::Invalid(
                "server: password must not be empty".into(),
            ));
        }

        let cap = &self.capture;

        if cap.width == 0 || cap.height == 0 {
            return Err(ConfigError::Invalid(
                "capture: width and height must be > 0".into(),
            ));
        }

        if cap.fps == 0 || cap.fps > 120 {
            return Err(ConfigError::Invalid(format!(
                "capture: FPS must be between 1 and 120, got {}",
                cap.fps
            )));
        }

        if cap.quality == 0 || cap.quality > 100 {
            return Err(ConfigError::Invalid(format!(
                "capture: quality must be between 1 and 100, got {}",
                cap.quality
            )));
        }

        if cap.slots == 0 || cap.slots > 16 {
            return Err(ConfigError::Invalid(format!(
                "capture: slots must be between 1 and 16, got {}",
                cap.slots
            )));
        }

        if cap.source == CaptureSource::Directory && !Path::new(&cap.device).is_dir() {
            return Err(ConfigError::Invalid(format!(
                "capture: '{}' is not a directory",
                cap.device
            )));
        }

        Ok(())
    }

    /// Saves configuration to TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Listener settings for [`MjpegServer`](crate::server::MjpegServer)
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: SocketAddr::new(self.server.bind_address, self.server.port),
            username: self.server.username.clone(),
            password: self.server.password.clone(),
            max_clients: self.server.max_clients,
            read_timeout: Duration::from_secs(self.server.read_timeout_secs),
            shutdown_grace: Duration::from_secs(self.server.shutdown_grace_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.username, "uvc_user");
        assert!(config.server.password.is_none());
        assert_eq!(config.capture.fps, 5);
        assert_eq!(config.capture.quality, 40);
        assert_eq!(config.capture.slots, 3);
        assert_eq!(config.capture.format, PixelFormat::Mjpeg);
        assert_eq!(config.stats_interval_seconds, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
stats_interval_seconds = 5

[server]
port = 9000
bind_address = "127.0.0.1"
username = "admin"
password = "secret"
max_clients = 4

[capture]
source = "test-pattern"
width = 320
height = 240
fps = 15
format = "YUYV"
quality = 75

[recording]
output = "/tmp/out.mjpeg"
        "#;

        let config = Config::from_str(toml).unwrap();

        assert_eq!(config.stats_interval_seconds, 5);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.password.as_deref(), Some("secret"));
        assert_eq!(config.server.max_clients, 4);
        assert_eq!(config.capture.format, PixelFormat::Yuyv);
        assert_eq!(config.capture.width, 320);
        assert_eq!(config.capture.slots, 3);
        assert_eq!(
            config.recording.output.as_deref(),
            Some(Path::new("/tmp/out.mjpeg"))
        );

        let server = config.server_config();
        assert_eq!(server.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert!(server.authenticator().is_some());
        assert_eq!(server.read_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_quality() {
        let toml = r#"
[capture]
quality = 0
        "#;

        assert!(matches!(
            Config::from_str(toml),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_invalid_fps() {
        let toml = r#"
[capture]
fps = 500
        "#;

        assert!(Config::from_str(toml).is_err());
    }

    #[test]
    fn test_unknown_format_is_parse_error() {
        let toml = r#"
[capture]
format = "H264"
        "#;

        assert!(matches!(Config::from_str(toml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_directory_source_must_exist() {
        let toml = r#"
[capture]
source = "directory"
device = "/nonexistent/frames"
        "#;
        assert!(Config::from_str(toml).is_err());

        let dir = tempfile::tempdir().unwrap();
        let toml = format!(
            "[capture]\nsource = \"directory\"\ndevice = \"{}\"\n",
            dir.path().display()
        );
        let config = Config::from_str(&toml).unwrap();
        assert_eq!(config.capture.source, CaptureSource::Directory);
    }

    #[test]
    fn test_resolution_names() {
        let res: Resolution = "1280x720".parse().unwrap();
        assert_eq!((res.width, res.height), (1280, 720));
        assert_eq!(res.to_string(), "1280x720");

        assert!("1920x1080".parse::<Resolution>().is_err());
        assert!("vga".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_capture_source_names() {
        assert_eq!("v4l2".parse::<CaptureSource>().unwrap(), CaptureSource::V4l2);
        assert_eq!(CaptureSource::TestPattern.to_string(), "test-pattern");
        assert!("webcam".parse::<CaptureSource>().is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default("/nonexistent/config.toml").unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.server.password = Some("pw".into());
        config.capture.format = PixelFormat::Rggb;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.server.password.as_deref(), Some("pw"));
        assert_eq!(loaded.capture.format, PixelFormat::Rggb);
    }
}
