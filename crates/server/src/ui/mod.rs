//! Console output for the QrShare server.

pub mod qr;

pub use qr::{generate_png_qr, generate_png_qr_bytes, generate_terminal_qr};
