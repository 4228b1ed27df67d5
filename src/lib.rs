//! hitprobe - repeating HTTPS text probe
//!
//! Core library: boundary scanning, the attempt loop and its transports.

pub mod config;
pub mod http;
pub mod probe;
pub mod transport;
