//! Decoding of the fixed-width hexadecimal register dump returned by the
//! compressor controllers' `mkv.cgi` endpoint.
//!
//! The flow is: [`slice_response`] splits the raw body into 8-character
//! registers, [`parse_registers`] walks a [`FamilyLayout`] over them and
//! [`build_batch`] binds the result to a device and a capture time.

mod batch;
mod decoder;
mod layout;
mod parser;
mod slicer;

use thiserror::Error;

pub use batch::build_batch;
pub use decoder::{decode_span, hex_to_u32, is_placeholder};
pub use layout::{FamilyLayout, LayoutEntry, Scale, Span, CURRENT_LAYOUT, LEGACY_LAYOUT};
pub use parser::{decode_response, parse_registers};
pub use slicer::{expand_placeholders, slice_response, RegisterSlice};

/// Width of one register in hex characters.
pub const REGISTER_WIDTH: usize = 8;
/// Single-character marker the device sends in place of an omitted register.
pub const PLACEHOLDER_MARKER: char = 'X';
/// Fill character a marker expands to; a register containing it was not reported.
pub const PLACEHOLDER_FILL: char = 'Z';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("response too short: {registers} registers need {expected} characters, got {actual}")]
    ShortResponse {
        registers: usize,
        expected: usize,
        actual: usize,
    },
    #[error("invalid hex data {value:?}")]
    InvalidHex { value: String },
    #[error("register {register} holds invalid hex data {value:?}")]
    InvalidRegister { register: usize, value: String },
    #[error("field {field} reads register {register}, layout has {count}")]
    RegisterOutOfBounds {
        field: &'static str,
        register: usize,
        count: usize,
    },
    #[error("register slice has {actual} registers, layout expects {expected}")]
    SliceLength { expected: usize, actual: usize },
    #[error("request payload selects {actual} registers, layout declares {expected}")]
    PayloadMismatch { expected: usize, actual: usize },
}
