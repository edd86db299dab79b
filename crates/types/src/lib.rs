use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp layout used by the storage records.
pub const RECORD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Compressor firmware generation. Each family has its own request payload and register layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    #[serde(alias = "1", alias = "old")]
    Legacy,
    #[serde(alias = "2", alias = "new")]
    Current,
}

impl DeviceFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Current => "current",
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeviceFamily {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "legacy" | "old" | "1" => Ok(Self::Legacy),
            "current" | "new" | "2" => Ok(Self::Current),
            other => Err(format!("unknown device family {other:?}")),
        }
    }
}

/// Identity of one compressor in the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Host (optionally `host:port`) of the controller's web interface.
    pub address: String,
    pub tag: String,
    pub location: String,
    pub family: DeviceFamily,
}

/// Measurement grouping. Declaration order is the emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    AnalogInput,
    Counter,
    Vfd,
    DigitalInput,
    DigitalOutput,
    Alarm,
    MachineState,
}

impl Category {
    /// Short code used in measurement keys and the `type` tag.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AnalogInput => "AI",
            Self::Counter => "CNT",
            Self::Vfd => "VFD",
            Self::DigitalInput => "DI",
            Self::DigitalOutput => "DO",
            Self::Alarm => "SP",
            Self::MachineState => "MS",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Decoded field value. `Missing` marks a register the device did not report this cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasurementValue {
    Integer(i64),
    Float(f64),
    Missing,
}

impl MeasurementValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl Serialize for MeasurementValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Integer(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Missing => serializer.serialize_none(),
        }
    }
}

/// One decoded field before it is bound to a device and a capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub category: Category,
    pub name: String,
    pub value: MeasurementValue,
    pub unit: String,
}

/// Parser output: readings grouped by category, in layout order within each category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementSet {
    groups: BTreeMap<Category, Vec<Reading>>,
}

impl MeasurementSet {
    pub fn push(&mut self, reading: Reading) {
        self.groups.entry(reading.category).or_default().push(reading);
    }

    pub fn category(&self, category: Category) -> &[Reading] {
        self.groups
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn get(&self, category: Category, name: &str) -> Option<&Reading> {
        self.category(category).iter().find(|reading| reading.name == name)
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.groups.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.groups.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A reading bound to its device and capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Time-series identity: `{device tag}_{category code}_{field name}`.
    pub key: String,
    pub category: Category,
    pub name: String,
    pub value: MeasurementValue,
    pub unit: String,
    pub device_tag: String,
    pub location: String,
    pub captured_at: DateTime<Utc>,
}

impl Measurement {
    pub fn key_for(device_tag: &str, category: Category, name: &str) -> String {
        format!("{device_tag}_{}_{name}", category.code())
    }

    pub fn to_record(&self) -> MeasurementRecord {
        MeasurementRecord {
            measurement: self.key.clone(),
            tags: RecordTags {
                eu: self.unit.clone(),
                location: self.location.clone(),
                kind: self.category.code().to_string(),
            },
            time: self.captured_at.format(RECORD_TIME_FORMAT).to_string(),
            fields: RecordFields { value: self.value },
        }
    }
}

/// All measurements of one device for one poll cycle. Every entry shares `captured_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementBatch {
    pub device_tag: String,
    pub captured_at: DateTime<Utc>,
    pub measurements: Vec<Measurement>,
}

impl MeasurementBatch {
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.measurements
            .iter()
            .filter(|measurement| measurement.value.is_missing())
            .count()
    }

    pub fn records(&self) -> Vec<MeasurementRecord> {
        self.measurements.iter().map(Measurement::to_record).collect()
    }
}

/// Storage-client shape of a measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementRecord {
    pub measurement: String,
    pub tags: RecordTags,
    pub time: String,
    pub fields: RecordFields,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordTags {
    pub eu: String,
    pub location: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFields {
    pub value: MeasurementValue,
}
