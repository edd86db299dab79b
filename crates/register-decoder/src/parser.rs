use tracing::debug;
use types::{MeasurementSet, MeasurementValue, Reading};

use crate::decoder::decode_span;
use crate::layout::FamilyLayout;
use crate::slicer::{slice_response, RegisterSlice};
use crate::DecodeError;

/// Walks `layout` over `slice` and decodes every entry into a reading.
///
/// Unreported registers become [`MeasurementValue::Missing`]; the field is still
/// emitted so the series keeps its category and unit.
pub fn parse_registers(
    layout: &FamilyLayout,
    slice: &RegisterSlice,
) -> Result<MeasurementSet, DecodeError> {
    if slice.len() != layout.register_count {
        return Err(DecodeError::SliceLength {
            expected: layout.register_count,
            actual: slice.len(),
        });
    }

    let mut set = MeasurementSet::default();
    for entry in layout.entries {
        let register = slice
            .get(entry.register)
            .ok_or(DecodeError::RegisterOutOfBounds {
                field: entry.name,
                register: entry.register,
                count: slice.len(),
            })?;

        let value = match decode_span(register, entry.span) {
            Ok(Some(raw)) => entry.scale.apply(raw),
            Ok(None) => MeasurementValue::Missing,
            Err(_) => {
                return Err(DecodeError::InvalidRegister {
                    register: entry.register,
                    value: register.to_string(),
                })
            }
        };

        set.push(Reading {
            category: entry.category,
            name: entry.name.to_string(),
            value,
            unit: entry.unit.to_string(),
        });
    }

    debug!(
        family = %layout.family,
        fields = set.len(),
        placeholders = slice.placeholder_count(),
        "register dump decoded"
    );
    Ok(set)
}

/// Slices and parses a raw response in one step.
pub fn decode_response(layout: &FamilyLayout, raw: &str) -> Result<MeasurementSet, DecodeError> {
    let slice = slice_response(raw, layout.register_count)?;
    parse_registers(layout, &slice)
}
