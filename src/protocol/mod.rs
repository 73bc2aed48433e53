//! Client-server communication protocol.
//!
//! This module defines how requests and responses travel between a [`Connection`] and a
//! [`Dispatcher`]: the request shapes, the binary response envelope, the typed-value codec and
//! the transport abstraction that carries the bytes.
//!
//! # Overview
//!
//! Requests ride on plain HTTP. Control requests (`challenge`, `login`, `logout`) are `GET`s
//! with the selector in the `cmd` query parameter. Statements are `POST`ed as a form: `q` holds
//! the statement text, every other field is a parameter name mapped to a base64-encoded
//! [`TypedValue`](crate::TypedValue).
//!
//! # Binary Format
//!
//! Every response begins with a 4-byte signed error code:
//!
//! - `0` means success and the command-specific payload follows.
//! - Anything else is followed by a length-prefixed UTF-8 message and a length-prefixed UTF-8
//!   diagnostic trace.
//!
//! All integers are big-endian. Success payloads:
//!
//! - `challenge`: 32 raw bytes.
//! - `login` / `logout`: nothing.
//! - command: 4-byte rows-affected count.
//! - query: 1-byte column count, `(1-byte length + name)` per column, 4-byte row count, then
//!   one encoded value per cell in row-major order.
//!
//! # Key Components
//!
//! - [`Request`] / [`HttpRequest`]: protocol request and its HTTP shape.
//! - [`Response`]: decoded response, including the [`ErrorEnvelope`].
//! - [`Transport`]: a single request/response exchange.
//!
//! [`Connection`]: crate::Connection
//! [`Dispatcher`]: crate::server::Dispatcher
mod codec;
mod request;
mod response;
mod transport;

pub use codec::{CodecError, FrameReader, FrameWriter, decode_value, encode_value};
pub use request::{HttpRequest, Method, Request, decode_param};
pub use response::{CHALLENGE_LEN, ErrorEnvelope, Response, ResponseKind, SUCCESS};
pub use transport::{HttpTransport, LoopbackTransport, Transport, TransportError};
