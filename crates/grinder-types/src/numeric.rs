//! Scaled-integer numerics used on the decision path.
//!
//! Mirrors the discipline of the portfolio crate's money type: no
//! construction from `f64`, decimal strings are parsed/rendered only at
//! the wire boundary, and every arithmetic op is plain integer math.

use std::fmt;

/// An error while parsing a wire-format decimal string into a scaled integer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecimalParseError {
    Empty,
    InvalidDigit(char),
    TooManyDecimalPoints,
    ScaleOverflow,
}

impl fmt::Display for DecimalParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecimalParseError::Empty => write!(f, "empty decimal string"),
            DecimalParseError::InvalidDigit(c) => write!(f, "invalid digit '{c}' in decimal string"),
            DecimalParseError::TooManyDecimalPoints => write!(f, "more than one '.' in decimal string"),
            DecimalParseError::ScaleOverflow => write!(f, "value does not fit in i64 after scaling"),
        }
    }
}

impl std::error::Error for DecimalParseError {}

/// Parse a decimal wire string (e.g. `"123.450"`) into an integer scaled by
/// `10^scale_digits` (e.g. `scale_digits = 3` → `123450`).
pub fn parse_decimal(s: &str, scale_digits: u32) -> Result<i64, DecimalParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(DecimalParseError::Empty);
    }
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, s.strip_prefix('+').unwrap_or(s)),
    };
    let mut parts = rest.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();
    if rest.matches('.').count() > 1 {
        return Err(DecimalParseError::TooManyDecimalPoints);
    }
    for c in int_part.chars().chain(frac_part.unwrap_or("").chars()) {
        if !c.is_ascii_digit() {
            return Err(DecimalParseError::InvalidDigit(c));
        }
    }
    let int_val: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().map_err(|_| DecimalParseError::ScaleOverflow)?
    };
    let scale = 10i64.pow(scale_digits);
    let mut scaled = int_val.checked_mul(scale).ok_or(DecimalParseError::ScaleOverflow)?;

    if let Some(frac) = frac_part {
        let frac_digits = scale_digits as usize;
        let mut frac_scaled_str = frac.to_string();
        if frac_scaled_str.len() > frac_digits {
            frac_scaled_str.truncate(frac_digits);
        }
        while frac_scaled_str.len() < frac_digits {
            frac_scaled_str.push('0');
        }
        let frac_val: i64 = if frac_scaled_str.is_empty() {
            0
        } else {
            frac_scaled_str.parse().map_err(|_| DecimalParseError::ScaleOverflow)?
        };
        scaled = scaled.checked_add(frac_val).ok_or(DecimalParseError::ScaleOverflow)?;
    }

    Ok(sign * scaled)
}

/// Render a scaled integer back into a canonical decimal wire string.
pub fn render_decimal(scaled: i64, scale_digits: u32) -> String {
    if scale_digits == 0 {
        return scaled.to_string();
    }
    let scale = 10i64.pow(scale_digits);
    let sign = if scaled < 0 { "-" } else { "" };
    let magnitude = scaled.unsigned_abs();
    let int_part = magnitude / scale as u64;
    let frac_part = magnitude % scale as u64;
    format!("{sign}{int_part}.{frac_part:0width$}", width = scale_digits as usize)
}

macro_rules! scaled_newtype {
    ($name:ident, $inner:ty, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub $inner);

        impl $name {
            pub fn new(raw: $inner) -> Self {
                Self(raw)
            }

            pub fn raw(self) -> $inner {
                self.0
            }
        }

        impl std::ops::Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl std::ops::Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }
    };
}

scaled_newtype!(
    PriceTicks,
    i64,
    "A price expressed as an integer count of a symbol's `tick_size` units."
);
scaled_newtype!(
    QtySteps,
    i64,
    "A quantity expressed as an integer count of a symbol's `step_size` units."
);
scaled_newtype!(Bps, i64, "Basis points, scale x1 (e.g. `spacing_bps`, `natr_bps`).");
scaled_newtype!(
    MultiplierX1000,
    i64,
    "A multiplier scaled x1000, where 1000 == 1.0x."
);

impl Bps {
    pub fn clamp(self, min: Bps, max: Bps) -> Bps {
        Bps(self.0.clamp(min.0, max.0))
    }

    /// Integer EMA: `prev + (new - prev) * alpha_x1000 / 1000`, rounded
    /// toward zero on the fractional remainder (consistent truncation, no
    /// banker's rounding ambiguity).
    pub fn ema_step(prev: Bps, new: Bps, alpha_x1000: i64) -> Bps {
        let delta = new.0 - prev.0;
        let weighted = delta * alpha_x1000 / 1000;
        Bps(prev.0 + weighted)
    }
}

impl MultiplierX1000 {
    pub const IDENTITY: MultiplierX1000 = MultiplierX1000(1000);

    pub fn apply_to_bps(self, bps: Bps) -> Bps {
        Bps(bps.0 * self.0 / 1000)
    }
}

/// Probability in basis points, clamped to `[0, 10_000]` at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProbabilityBps(u16);

impl ProbabilityBps {
    pub const ZERO: ProbabilityBps = ProbabilityBps(0);
    pub const CERTAIN: ProbabilityBps = ProbabilityBps(10_000);

    pub fn new(raw: i64) -> Self {
        Self(raw.clamp(0, 10_000) as u16)
    }

    pub fn raw(self) -> u16 {
        self.0
    }
}
