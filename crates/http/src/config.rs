//! Per-connection tuning knobs.

/// Default capacity reserved in the parser buffer before each read
const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Default initial capacity of the batched response buffer
const DEFAULT_WRITE_BUFFER_SIZE: usize = 2 * 1024;

/// Configuration applied to one [`HttpConnection`](crate::connection::HttpConnection).
///
/// ```
/// use micro_http_ws::config::ConnectionConfig;
///
/// let config = ConnectionConfig::default().with_max_message_size(Some(1 << 20));
/// assert_eq!(config.max_message_size(), Some(1 << 20));
/// assert_eq!(config.read_buffer_size(), 8 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    read_buffer_size: usize,
    write_buffer_size: usize,
    max_message_size: Option<usize>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { read_buffer_size: DEFAULT_READ_BUFFER_SIZE, write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE, max_message_size: None }
    }
}

impl ConnectionConfig {
    pub fn with_read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.read_buffer_size = read_buffer_size.max(1);
        self
    }

    pub fn with_write_buffer_size(mut self, write_buffer_size: usize) -> Self {
        self.write_buffer_size = write_buffer_size;
        self
    }

    /// Caps a reassembled websocket message. `None` leaves it unbounded.
    pub fn with_max_message_size(mut self, max_message_size: Option<usize>) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    pub fn write_buffer_size(&self) -> usize {
        self.write_buffer_size
    }

    pub fn max_message_size(&self) -> Option<usize> {
        self.max_message_size
    }
}
