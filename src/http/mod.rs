//! HTTP-ish wire handling for the probe.
//!
//! The probe does not speak full HTTP. It sends one fixed request and only
//! cares where the response headers end:
//!
//! - **`boundary`**: incremental `\r\n\r\n` scanner fed chunk by chunk
//! - **`request`**: renders the fixed request from a template
//!
//! # Example
//!
//! ```
//! use hitprobe::http::boundary::BoundaryScanner;
//!
//! let mut scanner = BoundaryScanner::new();
//! assert_eq!(scanner.feed(b"HTTP/1.0 200 OK\r\n"), None);
//! assert_eq!(scanner.feed(b"\r\nhello"), Some(2));
//! ```

pub mod boundary;
pub mod request;
