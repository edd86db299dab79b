use tracing::debug;

use crate::decoder::is_placeholder;
use crate::{DecodeError, PLACEHOLDER_FILL, PLACEHOLDER_MARKER, REGISTER_WIDTH};

/// A response split into fixed-width registers, index-addressable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSlice {
    registers: Vec<String>,
}

impl RegisterSlice {
    pub fn get(&self, index: usize) -> Option<&str> {
        self.registers.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.registers.iter().map(String::as_str)
    }

    pub fn placeholder_count(&self) -> usize {
        self.iter().filter(|register| is_placeholder(register)).count()
    }

    /// Concatenation of all registers, i.e. the expanded response without surplus.
    pub fn concat(&self) -> String {
        self.registers.concat()
    }
}

/// Replaces every single-character placeholder marker with a full register of fill characters.
pub fn expand_placeholders(raw: &str) -> String {
    let fill: String = std::iter::repeat(PLACEHOLDER_FILL)
        .take(REGISTER_WIDTH)
        .collect();
    raw.replace(PLACEHOLDER_MARKER, &fill)
}

/// Splits a raw response into exactly `register_count` registers.
///
/// A response that is too short after placeholder expansion is rejected
/// outright: reading it would shift every later register. Surplus characters
/// past the last register are ignored.
pub fn slice_response(raw: &str, register_count: usize) -> Result<RegisterSlice, DecodeError> {
    let expanded = expand_placeholders(raw.trim());
    let expected = register_count * REGISTER_WIDTH;

    if expanded.len() < expected {
        return Err(DecodeError::ShortResponse {
            registers: register_count,
            expected,
            actual: expanded.len(),
        });
    }
    if expanded.len() > expected {
        debug!(
            surplus = expanded.len() - expected,
            register_count, "ignoring characters past the last register"
        );
    }

    let mut registers = Vec::with_capacity(register_count);
    for index in 0..register_count {
        let start = index * REGISTER_WIDTH;
        let chunk = expanded
            .get(start..start + REGISTER_WIDTH)
            .ok_or_else(|| DecodeError::InvalidRegister {
                register: index,
                value: expanded
                    .chars()
                    .skip(start)
                    .take(REGISTER_WIDTH)
                    .collect(),
            })?;
        registers.push(chunk.to_string());
    }

    Ok(RegisterSlice { registers })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_expands_to_full_register() {
        assert_eq!(expand_placeholders("0001X0002"), "0001ZZZZZZZZ0002");
    }

    #[test]
    fn placeholder_keeps_later_offsets_aligned() {
        let slice = slice_response("00000001X00000003", 3).expect("slice");
        assert_eq!(slice.get(0), Some("00000001"));
        assert_eq!(slice.get(1), Some("ZZZZZZZZ"));
        assert_eq!(slice.get(2), Some("00000003"));
        assert_eq!(slice.placeholder_count(), 1);
    }

    #[test]
    fn short_response_is_rejected() {
        let err = slice_response("0000000100000002", 3).expect_err("short");
        assert_eq!(
            err,
            DecodeError::ShortResponse {
                registers: 3,
                expected: 24,
                actual: 16,
            }
        );
    }

    #[test]
    fn surplus_and_whitespace_are_ignored() {
        let slice = slice_response("  0000000A0000000BFF\r\n", 2).expect("slice");
        assert_eq!(slice.len(), 2);
        assert_eq!(slice.concat(), "0000000A0000000B");
    }

    #[test]
    fn exact_response_round_trips() {
        let raw = "0123456789ABCDEF00000E10";
        let slice = slice_response(raw, 3).expect("slice");
        assert_eq!(slice.concat(), raw);
    }
}
