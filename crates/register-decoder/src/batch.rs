use chrono::{DateTime, SubsecRound, Utc};
use types::{DeviceDescriptor, Measurement, MeasurementBatch, MeasurementSet};

/// Flattens a measurement set into one batch for `device`. All measurements
/// share `captured_at`, truncated to whole seconds.
pub fn build_batch(
    device: &DeviceDescriptor,
    set: &MeasurementSet,
    captured_at: DateTime<Utc>,
) -> MeasurementBatch {
    let captured_at = captured_at.trunc_subsecs(0);
    let measurements = set
        .iter()
        .map(|reading| Measurement {
            key: Measurement::key_for(&device.tag, reading.category, &reading.name),
            category: reading.category,
            name: reading.name.clone(),
            value: reading.value,
            unit: reading.unit.clone(),
            device_tag: device.tag.clone(),
            location: device.location.clone(),
            captured_at,
        })
        .collect();

    MeasurementBatch {
        device_tag: device.tag.clone(),
        captured_at,
        measurements,
    }
}
