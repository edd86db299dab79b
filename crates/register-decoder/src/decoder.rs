use crate::layout::Span;
use crate::{DecodeError, PLACEHOLDER_FILL, REGISTER_WIDTH};

/// Big-endian unsigned value of a hex string of at most 8 characters.
pub fn hex_to_u32(hex: &str) -> Result<u32, DecodeError> {
    if hex.is_empty()
        || hex.len() > REGISTER_WIDTH
        || !hex.bytes().all(|byte| byte.is_ascii_hexdigit())
    {
        return Err(DecodeError::InvalidHex {
            value: hex.to_string(),
        });
    }

    u32::from_str_radix(hex, 16).map_err(|_| DecodeError::InvalidHex {
        value: hex.to_string(),
    })
}

/// True when the device left this register out of the response.
pub fn is_placeholder(register: &str) -> bool {
    register.contains(PLACEHOLDER_FILL)
}

/// Reads `span` out of one register. `Ok(None)` means the register was not
/// reported, whatever part of it is asked for.
pub fn decode_span(register: &str, span: Span) -> Result<Option<u32>, DecodeError> {
    if is_placeholder(register) {
        return Ok(None);
    }

    let hex = register
        .get(span.range())
        .ok_or_else(|| DecodeError::InvalidHex {
            value: register.to_string(),
        })?;
    hex_to_u32(hex).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_big_endian() {
        assert_eq!(hex_to_u32("00000E10"), Ok(3600));
        assert_eq!(hex_to_u32("1b58"), Ok(7000));
        assert_eq!(hex_to_u32("FFFFFFFF"), Ok(u32::MAX));
    }

    #[test]
    fn rejects_non_hex_input() {
        assert!(hex_to_u32("").is_err());
        assert!(hex_to_u32("+123").is_err());
        assert!(hex_to_u32("12G4").is_err());
        assert!(hex_to_u32("123456789").is_err());
    }

    #[test]
    fn placeholder_register_is_missing_for_every_span() {
        for span in [Span::High, Span::Low, Span::Full] {
            assert_eq!(decode_span("ZZZZZZZZ", span), Ok(None));
        }
    }

    #[test]
    fn zero_register_is_not_missing() {
        assert_eq!(decode_span("00000000", Span::Full), Ok(Some(0)));
    }

    #[test]
    fn spans_select_register_halves() {
        assert_eq!(decode_span("1B580001", Span::High), Ok(Some(7000)));
        assert_eq!(decode_span("1B580001", Span::Low), Ok(Some(1)));
        assert_eq!(decode_span("1B580001", Span::Full), Ok(Some(0x1B58_0001)));
    }

    #[test]
    fn short_register_is_invalid() {
        assert!(decode_span("1B5", Span::Low).is_err());
    }
}
