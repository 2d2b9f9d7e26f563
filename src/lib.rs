pub mod error;
pub mod render;
pub mod scan;
pub mod server;
pub mod symbology;

pub use error::ServiceError;

/// Service configuration. Defaults live here as constants and can be
/// overridden by a TOML file or `BARCODE_*` environment variables
pub mod config {
    use anyhow::{anyhow, Result};
    use serde::Deserialize;
    use std::path::PathBuf;

    /// Default bind address (all interfaces)
    pub const DEFAULT_HOST: &str = "0.0.0.0";

    /// Default bind port
    pub const DEFAULT_PORT: u16 = 5000;

    /// Maximum accepted request body, 16 MiB
    pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

    /// Largest accepted width or height of an uploaded image, in pixels
    pub const MAX_IMAGE_DIMENSION: u32 = 8192;

    /// Scratch directory created at startup
    pub const UPLOAD_DIR: &str = "uploads";

    /// Config file read when none is given on the command line
    pub const DEFAULT_CONFIG_FILE: &str = "barcode-api.toml";

    /// Tracing filter used when `RUST_LOG` is unset
    pub const DEFAULT_LOG_LEVEL: &str = "info,actix_web=info";

    /// Detection backends enabled unless configured otherwise
    pub const DEFAULT_SCAN_BACKENDS: [&str; 2] = ["qr", "zxing"];

    /// Pixels per QR module
    pub const QR_BOX_SIZE: u32 = 10;

    /// QR quiet zone, in modules
    pub const QR_BORDER: u32 = 4;

    /// Pixels per linear barcode module
    pub const LINEAR_MODULE_WIDTH: u32 = 3;

    /// Height of linear barcode bars, in pixels
    pub const LINEAR_BAR_HEIGHT: u32 = 120;

    /// Linear barcode quiet zone, in modules
    pub const LINEAR_QUIET_ZONE: u32 = 10;

    /// Runtime settings for the HTTP service
    #[derive(Debug, Clone, Deserialize)]
    pub struct Settings {
        pub host: String,
        pub port: u16,
        pub max_upload_bytes: usize,
        pub max_image_dimension: u32,
        pub upload_dir: PathBuf,
        pub scan_backends: Vec<String>,
        pub log_level: String,
        pub workers: Option<usize>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Settings {
                host: DEFAULT_HOST.into(),
                port: DEFAULT_PORT,
                max_upload_bytes: MAX_UPLOAD_BYTES,
                max_image_dimension: MAX_IMAGE_DIMENSION,
                upload_dir: UPLOAD_DIR.into(),
                scan_backends: DEFAULT_SCAN_BACKENDS.iter().map(|b| b.to_string()).collect(),
                log_level: DEFAULT_LOG_LEVEL.into(),
                workers: None,
            }
        }
    }

    impl Settings {
        /// Load settings from defaults, the optional config file and the
        /// environment, in that order of priority
        pub fn load(config_file: Option<&str>) -> Result<Self> {
            let file = config_file.unwrap_or(DEFAULT_CONFIG_FILE);
            let backends: Vec<String> = DEFAULT_SCAN_BACKENDS.iter().map(|b| b.to_string()).collect();

            let settings: Settings = ::config::Config::builder()
                .set_default("host", DEFAULT_HOST)?
                .set_default("port", DEFAULT_PORT as i64)?
                .set_default("max_upload_bytes", MAX_UPLOAD_BYTES as i64)?
                .set_default("max_image_dimension", MAX_IMAGE_DIMENSION as i64)?
                .set_default("upload_dir", UPLOAD_DIR)?
                .set_default("scan_backends", backends)?
                .set_default("log_level", DEFAULT_LOG_LEVEL)?
                .add_source(::config::File::with_name(file).required(config_file.is_some()))
                .add_source(
                    ::config::Environment::with_prefix("BARCODE")
                        .try_parsing(true)
                        .list_separator(",")
                        .with_list_parse_key("scan_backends"),
                )
                .build()?
                .try_deserialize()?;

            settings.validate()?;
            Ok(settings)
        }

        /// Reject settings the server cannot start with
        pub fn validate(&self) -> Result<()> {
            if self.port == 0 {
                return Err(anyhow!("port must be non-zero"));
            }
            if self.max_upload_bytes == 0 {
                return Err(anyhow!("max_upload_bytes must be non-zero"));
            }
            if self.max_image_dimension == 0 {
                return Err(anyhow!("max_image_dimension must be non-zero"));
            }
            if self.workers == Some(0) {
                return Err(anyhow!("workers must be non-zero when set"));
            }
            Ok(())
        }

        /// The `host:port` pair to bind to
        pub fn bind_addr(&self) -> (String, u16) {
            (self.host.clone(), self.port)
        }
    }

}

/// Base64 and data URI helpers
pub mod util {
    use crate::ServiceError;
    use base64::{engine::general_purpose, Engine as _};

    const DATA_URI_IMAGE: &str = "data:image";
    const PNG_DATA_URI: &str = "data:image/png;base64,";

    /// Strip a `data:image/...;base64,` prefix if there is one
    pub fn strip_data_uri(input: &str) -> Result<&str, ServiceError> {
        if !input.starts_with(DATA_URI_IMAGE) {
            return Ok(input);
        }
        match input.split_once(',') {
            Some((_, payload)) => Ok(payload),
            None => Err(ServiceError::InvalidImage(
                "data URI has no payload".into(),
            )),
        }
    }

    /// Decode a base64 image, with or without a data URI prefix. ASCII
    /// whitespace inside the payload is ignored
    pub fn decode_base64_image(input: &str) -> Result<Vec<u8>, ServiceError> {
        let payload: String = strip_data_uri(input.trim())?
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        Ok(general_purpose::STANDARD.decode(payload)?)
    }

    /// Wrap PNG bytes into a `data:image/png;base64,` URI
    pub fn png_data_uri(png: &[u8]) -> String {
        format!("{PNG_DATA_URI}{}", general_purpose::STANDARD.encode(png))
    }

}
