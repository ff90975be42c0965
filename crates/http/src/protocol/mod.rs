//! Protocol types shared by the parser, the handler and the connection.
//!
//! - [`Request`] / [`RequestHeader`]: a parsed request with its buffered body
//! - [`Response`]: what the handler fills, serialized by the connection
//! - [`RequestContext`]: one exchange handed to the handler, carrying upgrade
//!   intent and access to the transport for streaming
//! - [`PayloadItem`] / [`PayloadSize`]: body framing used by the codecs
//! - [`HttpError`], [`ParseError`], [`SendError`], [`WsError`]: error types

mod context;
pub use context::RequestContext;
pub use context::StreamWriter;

mod message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::Request;
pub use request::RequestHeader;

mod response;
pub use response::Response;
pub use response::ResponseHead;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::WsError;
