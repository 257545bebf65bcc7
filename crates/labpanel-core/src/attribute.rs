//! Attribute metadata and values.
//!
//! An [`AttributeDescriptor`] is the metadata the device bus returns for one
//! remote-controllable value. It is fetched when a widget is bound to the
//! attribute and never mutated afterwards. [`AttrValue`] is the payload of
//! reads, writes and change events.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

// =============================================================================
// Type system
// =============================================================================

/// Wire data type of an attribute or command argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Short,
    UShort,
    Int,
    Long,
    ULong,
    Long64,
    ULong64,
    UChar,
    Float,
    Double,
    String,
    Enum,
    State,
    PipeBlob,
    Encoded,
}

impl DataType {
    /// All data types, in declaration order.
    pub const ALL: [DataType; 16] = [
        DataType::Boolean,
        DataType::Short,
        DataType::UShort,
        DataType::Int,
        DataType::Long,
        DataType::ULong,
        DataType::Long64,
        DataType::ULong64,
        DataType::UChar,
        DataType::Float,
        DataType::Double,
        DataType::String,
        DataType::Enum,
        DataType::State,
        DataType::PipeBlob,
        DataType::Encoded,
    ];

    /// Integer or floating point type.
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Any of the integer variants.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            DataType::Short
                | DataType::UShort
                | DataType::Int
                | DataType::Long
                | DataType::ULong
                | DataType::Long64
                | DataType::ULong64
                | DataType::UChar
        )
    }

    /// `Float` or `Double`.
    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    /// Inclusive integer range representable by this type.
    ///
    /// Returns `None` for non-integer types.
    pub fn integer_range(self) -> Option<(i128, i128)> {
        let range = match self {
            DataType::Short => (i16::MIN as i128, i16::MAX as i128),
            DataType::UShort => (0, u16::MAX as i128),
            DataType::Int | DataType::Long => (i32::MIN as i128, i32::MAX as i128),
            DataType::ULong => (0, u32::MAX as i128),
            DataType::Long64 => (i64::MIN as i128, i64::MAX as i128),
            DataType::ULong64 => (0, u64::MAX as i128),
            DataType::UChar => (0, u8::MAX as i128),
            _ => return None,
        };
        Some(range)
    }
}

/// Dimensionality of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataFormat {
    Scalar,
    Spectrum,
    Image,
}

/// Access mode of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteMode {
    Read,
    ReadWrite,
    ReadWithWrite,
    Write,
}

impl WriteMode {
    /// All write modes, in declaration order.
    pub const ALL: [WriteMode; 4] = [
        WriteMode::Read,
        WriteMode::ReadWrite,
        WriteMode::ReadWithWrite,
        WriteMode::Write,
    ];
}

// =============================================================================
// Device state
// =============================================================================

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const RED: Rgb = Rgb(255, 0, 0);
    pub const GREEN: Rgb = Rgb(0, 255, 0);
    pub const DARK_GREEN: Rgb = Rgb(0, 125, 0);
    pub const BLUE: Rgb = Rgb(0, 0, 255);
    pub const LIGHT_BLUE: Rgb = Rgb(128, 160, 255);
    pub const YELLOW: Rgb = Rgb(255, 255, 0);
    pub const ORANGE: Rgb = Rgb(255, 140, 0);
    pub const MAGENTA: Rgb = Rgb(255, 0, 255);
    pub const BEIGE: Rgb = Rgb(204, 204, 122);
    pub const GREY: Rgb = Rgb(155, 155, 155);
}

/// Background and text color of a status label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelStyle {
    pub background: Rgb,
    pub foreground: Rgb,
}

impl LabelStyle {
    /// Black text on `background`.
    pub const fn on(background: Rgb) -> Self {
        Self {
            background,
            foreground: Rgb::BLACK,
        }
    }

    /// Explicit background and text color.
    pub const fn new(background: Rgb, foreground: Rgb) -> Self {
        Self {
            background,
            foreground,
        }
    }
}

/// Standard device state enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DevState {
    On,
    Off,
    Close,
    Open,
    Insert,
    Extract,
    Moving,
    Standby,
    Fault,
    Init,
    Running,
    Alarm,
    Disable,
    Unknown,
}

impl DevState {
    /// All states in wire order.
    pub const ALL: [DevState; 14] = [
        DevState::On,
        DevState::Off,
        DevState::Close,
        DevState::Open,
        DevState::Insert,
        DevState::Extract,
        DevState::Moving,
        DevState::Standby,
        DevState::Fault,
        DevState::Init,
        DevState::Running,
        DevState::Alarm,
        DevState::Disable,
        DevState::Unknown,
    ];

    /// Upper-case state name as the bus reports it.
    pub fn name(self) -> &'static str {
        match self {
            DevState::On => "ON",
            DevState::Off => "OFF",
            DevState::Close => "CLOSE",
            DevState::Open => "OPEN",
            DevState::Insert => "INSERT",
            DevState::Extract => "EXTRACT",
            DevState::Moving => "MOVING",
            DevState::Standby => "STANDBY",
            DevState::Fault => "FAULT",
            DevState::Init => "INIT",
            DevState::Running => "RUNNING",
            DevState::Alarm => "ALARM",
            DevState::Disable => "DISABLE",
            DevState::Unknown => "UNKNOWN",
        }
    }

    /// Parse a state name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Color of the generic status label for this state.
    pub fn style(self) -> LabelStyle {
        match self {
            DevState::On | DevState::Open | DevState::Extract => LabelStyle::on(Rgb::GREEN),
            DevState::Off | DevState::Close | DevState::Insert => LabelStyle::on(Rgb::WHITE),
            DevState::Moving => LabelStyle::on(Rgb::LIGHT_BLUE),
            DevState::Standby => LabelStyle::on(Rgb::YELLOW),
            DevState::Fault => LabelStyle::on(Rgb::RED),
            DevState::Init => LabelStyle::on(Rgb::BEIGE),
            DevState::Running => LabelStyle::new(Rgb::DARK_GREEN, Rgb::WHITE),
            DevState::Alarm => LabelStyle::on(Rgb::ORANGE),
            DevState::Disable => LabelStyle::on(Rgb::MAGENTA),
            DevState::Unknown => LabelStyle::on(Rgb::GREY),
        }
    }
}

impl std::fmt::Display for DevState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Values
// =============================================================================

/// Value carried by reads, writes, command arguments and change events.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    /// Index into the descriptor's enum labels.
    Enum(i64),
    State(DevState),
    Spectrum(Vec<f64>),
    Image(Array2<f64>),
    /// Array arguments of commands.
    BoolArray(Vec<bool>),
    IntArray(Vec<i64>),
    FloatArray(Vec<f64>),
    StrArray(Vec<String>),
    /// Paired numeric and string arrays, e.g. archive extractions.
    DoubleStringArray {
        doubles: Vec<f64>,
        strings: Vec<String>,
    },
    /// Commands without return value.
    Void,
}

impl AttrValue {
    /// Numeric view of a scalar value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Int(v) | AttrValue::Enum(v) => Some(*v as f64),
            AttrValue::UInt(v) => Some(*v as f64),
            AttrValue::Float(v) => Some(*v),
            AttrValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Integer view of a scalar value. Floats are truncated toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) | AttrValue::Enum(v) => Some(*v),
            AttrValue::UInt(v) => i64::try_from(*v).ok(),
            AttrValue::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            AttrValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Boolean view. Numbers are true when non-zero.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            AttrValue::Int(v) | AttrValue::Enum(v) => Some(*v != 0),
            AttrValue::UInt(v) => Some(*v != 0),
            AttrValue::Float(v) => Some(*v != 0.0),
            _ => None,
        }
    }

    /// String payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// State payload.
    pub fn as_state(&self) -> Option<DevState> {
        match self {
            AttrValue::State(s) => Some(*s),
            _ => None,
        }
    }

    /// Spectrum payload.
    pub fn as_spectrum(&self) -> Option<&[f64]> {
        match self {
            AttrValue::Spectrum(v) | AttrValue::FloatArray(v) => Some(v),
            _ => None,
        }
    }

    /// Image payload.
    pub fn as_image(&self) -> Option<&Array2<f64>> {
        match self {
            AttrValue::Image(img) => Some(img),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttrValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            AttrValue::Int(v) | AttrValue::Enum(v) => write!(f, "{}", v),
            AttrValue::UInt(v) => write!(f, "{}", v),
            AttrValue::Float(v) => write!(f, "{}", v),
            AttrValue::Str(s) => f.write_str(s),
            AttrValue::State(s) => f.write_str(s.name()),
            AttrValue::Spectrum(v) | AttrValue::FloatArray(v) => write!(f, "{:?}", v),
            AttrValue::Image(img) => write!(f, "<image {}x{}>", img.ncols(), img.nrows()),
            AttrValue::BoolArray(v) => write!(f, "{:?}", v),
            AttrValue::IntArray(v) => write!(f, "{:?}", v),
            AttrValue::StrArray(v) => write!(f, "{:?}", v),
            AttrValue::DoubleStringArray { doubles, strings } => {
                write!(f, "({:?}, {:?})", doubles, strings)
            }
            AttrValue::Void => f.write_str("None"),
        }
    }
}

// =============================================================================
// Descriptor
// =============================================================================

/// Metadata describing one remote-controllable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDescriptor {
    /// Attribute name as declared by the device (case preserved).
    pub name: String,
    pub data_type: DataType,
    pub data_format: DataFormat,
    pub write_mode: WriteMode,
    /// Lower bound, when the device declares one.
    pub min: Option<f64>,
    /// Upper bound, when the device declares one.
    pub max: Option<f64>,
    /// Physical unit, empty when dimensionless.
    pub unit: String,
    /// printf-style display format, e.g. `%6.3f`.
    pub format: String,
    /// Labels of an enumerated attribute, indexed by value.
    pub enum_labels: Vec<String>,
}

impl AttributeDescriptor {
    /// Read-only scalar descriptor with no range, unit or format.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            data_format: DataFormat::Scalar,
            write_mode: WriteMode::Read,
            min: None,
            max: None,
            unit: String::new(),
            format: String::new(),
            enum_labels: Vec::new(),
        }
    }

    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Mark the attribute read-write.
    pub fn writable(self) -> Self {
        self.with_write_mode(WriteMode::ReadWrite)
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_data_format(mut self, data_format: DataFormat) -> Self {
        self.data_format = data_format;
        self
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_enum_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Both bounds are declared.
    pub fn is_bounded(&self) -> bool {
        self.min.is_some() && self.max.is_some()
    }

    /// Label for an enum index, if defined.
    pub fn enum_label(&self, index: i64) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.enum_labels.get(i))
            .map(String::as_str)
    }
}
