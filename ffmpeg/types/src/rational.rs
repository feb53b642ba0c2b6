use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/**
    A rational number, used for frame rates and time bases.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /**
        Returns the value as a float, or zero for a zero denominator.
    */
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        self.num as f64 / self.den as f64
    }

    /**
        Returns the reciprocal, e.g. the time base of a frame rate.
    */
    pub const fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }

    pub const fn is_positive(self) -> bool {
        self.num > 0 && self.den > 0
    }

    /**
        Rescale a timestamp from one time base to another, rounding to the
        nearest value with halfway cases away from zero.
    */
    pub fn rescale(ts: i64, from: Rational, to: Rational) -> i64 {
        if from == to {
            return ts;
        }

        // ts * from.num / from.den * to.den / to.num
        // = ts * from.num * to.den / (from.den * to.num)
        let num = ts as i128 * from.num as i128 * to.den as i128;
        let den = from.den as i128 * to.num as i128;
        if den == 0 {
            return ts;
        }
        let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
        let half = den / 2;
        let rounded = if num >= 0 {
            (num + half) / den
        } else {
            (num - half) / den
        };
        rounded as i64
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Rational {
    type Err = ParseError;

    /**
        Parses `N` or `N/D`.
    */
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseError::new("rational", s);
        let (num, den) = match s.split_once('/') {
            Some((num, den)) => (num.trim(), den.trim()),
            None => (s.trim(), "1"),
        };
        let num = num.parse().map_err(|_| err())?;
        let den = den.parse().map_err(|_| err())?;
        if den == 0 {
            return Err(err());
        }
        Ok(Self { num, den })
    }
}
