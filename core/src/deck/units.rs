use std::fmt;

pub const EMU_PER_INCH: i64 = 914_400;
const EMU_PER_CENTIPOINT: i64 = 127;

/// English Metric Units, the length unit of DrawingML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Emu(pub i64);

impl Emu {
    pub fn from_inches(inches: f64) -> Self {
        Emu((inches * EMU_PER_INCH as f64).round() as i64)
    }

    /// Font sizes are stored in hundredths of a point.
    pub fn to_centipoints(self) -> i64 {
        self.0 / EMU_PER_CENTIPOINT
    }

    pub fn parse(value: &str) -> Option<Self> {
        value.trim().parse().ok().map(Emu)
    }
}

impl fmt::Display for Emu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
