//! Error handling for the Nursery Pi monitor crate.

/// A specialized `Result` type for Nursery Pi operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// The main error type for Nursery Pi operations.
///
/// Device errors are almost never shown to HTTP clients. The session layer
/// turns them into placeholder frames, silence or a logged no-op; only
/// [`MonitorError::UnknownSwitch`] is reported back to a caller.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No usable device of the requested kind could be opened
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A single read or write on an open device failed
    #[error("Device error: {0}")]
    Device(String),

    /// Frame encoding failed
    #[error("Encoding error: {0}")]
    Encode(String),

    /// Switch id is not part of the configured set
    #[error("Unknown switch: {0}")]
    UnknownSwitch(String),

    /// GPIO operation failed
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),
}

impl MonitorError {
    /// Create a new device-unavailable error
    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable(msg.into())
    }

    /// Create a new transient device error
    pub fn device_error(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Create a new encoding error
    pub fn encode_error(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new unknown-switch error
    pub fn unknown_switch(id: impl Into<String>) -> Self {
        Self::UnknownSwitch(id.into())
    }

    /// Create a new GPIO error
    pub fn gpio_error(msg: impl Into<String>) -> Self {
        Self::Gpio(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Whether the error means the device could not be opened at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::DeviceUnavailable(_))
    }
}
