use std::ops::Range;

use types::{Category, DeviceFamily, MeasurementValue};

use crate::{DecodeError, REGISTER_WIDTH};

/// Part of a register a field is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span {
    /// First four hex characters.
    High,
    /// Last four hex characters.
    Low,
    /// All eight characters, for 32-bit counters.
    Full,
}

impl Span {
    pub fn range(&self) -> Range<usize> {
        let half = REGISTER_WIDTH / 2;
        match self {
            Self::High => 0..half,
            Self::Low => half..REGISTER_WIDTH,
            Self::Full => 0..REGISTER_WIDTH,
        }
    }
}

/// Conversion from the raw register value to engineering units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Raw,
    /// Fractional result.
    Divide(u32),
    /// Integer result, rounded towards zero.
    DivideTruncate(u32),
    Multiply(u32),
}

impl Scale {
    pub fn apply(&self, raw: u32) -> MeasurementValue {
        match *self {
            Self::Raw => MeasurementValue::Integer(i64::from(raw)),
            Self::Divide(divisor) => {
                MeasurementValue::Float(f64::from(raw) / f64::from(divisor.max(1)))
            }
            Self::DivideTruncate(divisor) => {
                MeasurementValue::Integer(i64::from(raw / divisor.max(1)))
            }
            Self::Multiply(factor) => MeasurementValue::Integer(i64::from(raw) * i64::from(factor)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    pub category: Category,
    pub name: &'static str,
    pub register: usize,
    pub span: Span,
    pub scale: Scale,
    pub unit: &'static str,
}

const fn entry(
    category: Category,
    name: &'static str,
    register: usize,
    span: Span,
    scale: Scale,
    unit: &'static str,
) -> LayoutEntry {
    LayoutEntry {
        category,
        name,
        register,
        span,
        scale,
        unit,
    }
}

/// Register map of one device family, together with the request that selects those registers.
#[derive(Debug)]
pub struct FamilyLayout {
    pub family: DeviceFamily,
    pub register_count: usize,
    /// Form body posted to the controller. Each register is selected by a 6-character code.
    pub request_payload: &'static str,
    pub entries: &'static [LayoutEntry],
}

const PAYLOAD_PREFIX: &str = "QUESTION=";
const REQUEST_CODE_WIDTH: usize = 6;

impl FamilyLayout {
    pub fn for_family(family: DeviceFamily) -> &'static FamilyLayout {
        match family {
            DeviceFamily::Legacy => &LEGACY_LAYOUT,
            DeviceFamily::Current => &CURRENT_LAYOUT,
        }
    }

    /// Number of registers the request payload asks for.
    pub fn requested_registers(&self) -> usize {
        self.request_payload
            .strip_prefix(PAYLOAD_PREFIX)
            .map(|codes| codes.len() / REQUEST_CODE_WIDTH)
            .unwrap_or(0)
    }

    /// Checks that the payload matches the register count and that every entry is in bounds.
    pub fn validate(&self) -> Result<(), DecodeError> {
        let requested = self.requested_registers();
        let well_formed = self
            .request_payload
            .strip_prefix(PAYLOAD_PREFIX)
            .map(|codes| codes.len() % REQUEST_CODE_WIDTH == 0)
            .unwrap_or(false);
        if !well_formed || requested != self.register_count {
            return Err(DecodeError::PayloadMismatch {
                expected: self.register_count,
                actual: requested,
            });
        }

        for entry in self.entries {
            if entry.register >= self.register_count {
                return Err(DecodeError::RegisterOutOfBounds {
                    field: entry.name,
                    register: entry.register,
                    count: self.register_count,
                });
            }
        }

        Ok(())
    }
}

pub static LEGACY_LAYOUT: FamilyLayout = FamilyLayout {
    family: DeviceFamily::Legacy,
    register_count: 99,
    request_payload: LEGACY_PAYLOAD,
    entries: LEGACY_ENTRIES,
};

pub static CURRENT_LAYOUT: FamilyLayout = FamilyLayout {
    family: DeviceFamily::Current,
    register_count: 176,
    request_payload: CURRENT_PAYLOAD,
    entries: CURRENT_ENTRIES,
};

const LEGACY_ENTRIES: &[LayoutEntry] = &[
    entry(Category::AnalogInput, "Compressor Outlet", 0, Span::High, Scale::Divide(1000), "bar"),
    entry(Category::AnalogInput, "Element Outlet", 1, Span::High, Scale::DivideTruncate(10), "°C"),
    entry(Category::AnalogInput, "Ambient Air", 2, Span::High, Scale::DivideTruncate(10), "°C"),
    entry(Category::Counter, "Running Hours", 7, Span::Full, Scale::DivideTruncate(3600), "hrs"),
    entry(Category::Counter, "Motor Starts", 8, Span::Full, Scale::Raw, ""),
    entry(Category::Counter, "Load Relay", 9, Span::Full, Scale::Raw, ""),
    entry(Category::Counter, "Fan Starts", 15, Span::Full, Scale::Raw, ""),
    entry(Category::Counter, "Accumulated Volume", 16, Span::Full, Scale::Multiply(1000), ""),
    entry(Category::Counter, "Module Hours", 17, Span::Full, Scale::DivideTruncate(3600), "hrs"),
    entry(Category::Counter, "Low Load Hours", 18, Span::Full, Scale::DivideTruncate(3600), "hrs"),
    entry(Category::Vfd, "Rotate", 19, Span::High, Scale::Raw, "rpm"),
    entry(Category::Vfd, "Current", 21, Span::High, Scale::Raw, "A"),
    entry(Category::Vfd, "Flow", 20, Span::Full, Scale::Raw, "%"),
    entry(Category::DigitalInput, "Emergency Stop", 3, Span::High, Scale::Raw, ""),
    entry(Category::DigitalInput, "Overload Fan Motor", 4, Span::High, Scale::Raw, ""),
    entry(Category::DigitalInput, "Electronic Condensate Drain", 5, Span::High, Scale::Raw, ""),
    entry(Category::DigitalInput, "Pressure Setting Selection", 6, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "Fan Motor", 22, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "Blowoff", 23, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "General Shutdown", 24, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "Automatic Operation", 25, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "General Warning", 26, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "Run Enable Main Motor", 27, Span::High, Scale::Raw, ""),
    entry(Category::Alarm, "No Valid Pressure Control", 28, Span::Low, Scale::Raw, ""),
    entry(Category::Alarm, "Motor Converter 1 Alarm", 29, Span::Low, Scale::Raw, ""),
    entry(Category::Alarm, "Expansion Module Communication", 30, Span::Low, Scale::Raw, ""),
    entry(Category::Alarm, "Low Load Alarm", 31, Span::Low, Scale::Raw, ""),
    entry(Category::MachineState, "PrimaryState", 98, Span::Low, Scale::Raw, ""),
];

const CURRENT_ENTRIES: &[LayoutEntry] = &[
    entry(Category::AnalogInput, "Controller Temperature", 0, Span::High, Scale::Divide(10), "°C"),
    entry(Category::AnalogInput, "Compressor Outlet", 1, Span::High, Scale::Divide(1000), "bar"),
    entry(Category::AnalogInput, "Relative Humidity", 2, Span::High, Scale::Raw, "%"),
    entry(Category::AnalogInput, "Vessel Pressure", 3, Span::High, Scale::Divide(1000), "bar"),
    entry(Category::AnalogInput, "Element Outlet", 4, Span::High, Scale::DivideTruncate(10), "°C"),
    entry(Category::AnalogInput, "Ambient Air", 5, Span::High, Scale::DivideTruncate(10), "°C"),
    entry(Category::Counter, "Running Hours", 13, Span::Full, Scale::DivideTruncate(3600), "hrs"),
    entry(Category::Counter, "Loaded Hours", 14, Span::Full, Scale::DivideTruncate(3600), "hrs"),
    entry(Category::Counter, "Motor Starts", 15, Span::Full, Scale::Raw, ""),
    entry(Category::Counter, "Load Relay", 16, Span::Full, Scale::Raw, ""),
    entry(Category::Counter, "Fan Starts", 22, Span::Full, Scale::Raw, ""),
    entry(Category::Counter, "Accumulated Volume", 23, Span::Full, Scale::Multiply(1000), ""),
    entry(Category::Counter, "Module Hours", 24, Span::Full, Scale::DivideTruncate(3600), "hrs"),
    entry(Category::Counter, "Emergency Stops", 25, Span::Full, Scale::Raw, ""),
    entry(Category::Counter, "Direct Stops", 26, Span::Full, Scale::Raw, ""),
    entry(Category::Vfd, "Rotate", 36, Span::High, Scale::Raw, "rpm"),
    entry(Category::Vfd, "Current", 38, Span::High, Scale::Raw, "A"),
    entry(Category::Vfd, "Flow", 37, Span::Full, Scale::Raw, "%"),
    entry(Category::DigitalInput, "Emergency Stop", 6, Span::High, Scale::Raw, ""),
    entry(Category::DigitalInput, "Overload Fan Motor", 7, Span::High, Scale::Raw, ""),
    entry(Category::DigitalInput, "Electronic Condensate Drain", 8, Span::High, Scale::Raw, ""),
    entry(Category::DigitalInput, "Active Power Supply", 9, Span::High, Scale::Raw, ""),
    entry(Category::DigitalInput, "Phase Sequence", 10, Span::High, Scale::Raw, ""),
    entry(Category::DigitalInput, "Air Filter", 11, Span::High, Scale::Raw, ""),
    entry(Category::DigitalInput, "Pressure Setting Selection", 12, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "Fan Motor", 39, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "Blowoff", 40, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "Run Enable Main Motor", 41, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "Recirculation Valve", 42, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "Cubicle Fan", 43, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "Automatic Operation", 44, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "General Warning", 45, Span::High, Scale::Raw, ""),
    entry(Category::DigitalOutput, "General Shutdown", 46, Span::High, Scale::Raw, ""),
    entry(Category::Alarm, "No Valid Pressure Control", 47, Span::Low, Scale::Raw, ""),
    entry(Category::Alarm, "Motor Converter 1 Alarm", 48, Span::Low, Scale::Raw, ""),
    entry(Category::Alarm, "Expansion Module Communication", 49, Span::Low, Scale::Raw, ""),
    entry(Category::MachineState, "PrimaryState", 175, Span::Low, Scale::Raw, ""),
];

const LEGACY_PAYLOAD: &str = concat!(
    "QUESTION=30020130020330020530030130030230030430030a300701300703300704300705300706300",
    "70730070830070930070b30070c30070d30071830210130210530210a300501300504300505300507300",
    "508300509300e03300e04300e2a300e8831130131130331130431130531130731130831130931130a311",
    "30b31130c31130d31130e31130f311310311311311312311313311314311315311316311317311318311",
    "31931131a31131b31131c31131d31131e31131f311320311321311322311323311324311325311326311",
    "32731132831132931132a31132b31132c311401311402311403311404311405311406311407311408311",
    "40931140a31140b31140c31140d31140e31140f311410311411311412300901300906300911300907300",
    "912300909300108",
);

const CURRENT_PAYLOAD: &str = concat!(
    "QUESTION=30020830020930020a30020c30020e300210300301300302300304300305300306300307300",
    "30a30070130070230070330070430070530070630070730070830070930070b30070c30070d30070e300",
    "70f30071430071530071830072230072330072430072530072630072730210130210530210a300501300",
    "502300504300505300506300507300508300509300e03300e04300e2a311301311303311304311305311",
    "30731130831130931130a31130b31130c31130d31130e31130f311310311311311312311313311314311",
    "31531131631131731131831131931131a31131b31131c31131d31131e31131f311320311321311322311",
    "32331132431132531132631132731132831132931132a31132b31132c31132d31132e31132f311330311",
    "33131133231133331133431133531133631133731133831133931133a31133b31133c31133d31133e311",
    "33f31134031134131134231134331134431134531134631134731134831134931134a31134b31134c311",
    "34d31134e31134f31135031135131135231135331135431135531135631135731135831135931135a311",
    "35b31135c31135d31135e31135f311360311361311362311363311364311365311366311367311401311",
    "40231140331140431140531140631140731140831140931140a31140b31140c31140d31140e31140f311",
    "410311411311412300901300906300911300907300912300909300108",
);
