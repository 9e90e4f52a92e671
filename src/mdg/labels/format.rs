//! Number formats
//!
//! A [`NumberFormat`] turns an ordinal into text. It is parsed from a compact format string
//! where each style character opens a level and an optional separator character follows it:
//!
//!     "1."    1, 1.1, 1.1.1, ...       (the last level repeats for deeper levels)
//!     "A-1."  A, A-1, A-1.1, ...
//!     "1a"    1, 1a, 1aa, ...          (no separator between levels)
//!     "Ii"    I, Ii, Iii, ...
//!
//! Style characters: `V` void, `1` decimal, `A`/`a` alphabetic, `I`/`i` roman.
//! A level without an explicit separator reuses the last one given, or `.` if none.

use std::fmt;
use std::rc::Rc;

use crate::mdg::error::FormatError;

pub const SEPARATORS: &str = "-.+*~/#_°^";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberStyle {
    Void,
    Decimal,
    UpperAlpha,
    LowerAlpha,
    UpperRoman,
    LowerRoman,
}

impl NumberStyle {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'V' => Some(Self::Void),
            '1' => Some(Self::Decimal),
            'A' => Some(Self::UpperAlpha),
            'a' => Some(Self::LowerAlpha),
            'I' => Some(Self::UpperRoman),
            'i' => Some(Self::LowerRoman),
            _ => None,
        }
    }

    pub fn format(self, n: usize) -> String {
        if n == 0 {
            return String::new();
        }
        match self {
            Self::Void => String::new(),
            Self::Decimal => n.to_string(),
            Self::UpperAlpha => alpha(n).to_uppercase(),
            Self::LowerAlpha => alpha(n),
            Self::UpperRoman => roman(n),
            Self::LowerRoman => roman(n).to_lowercase(),
        }
    }
}

/// Bijective base 26: a..z, aa, ab, ...
fn alpha(mut n: usize) -> String {
    let mut out = Vec::new();
    while n > 0 {
        n -= 1;
        out.push(b'a' + (n % 26) as u8);
        n /= 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

fn roman(mut n: usize) -> String {
    const TABLE: [(usize, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    let mut out = String::new();
    for (value, digits) in TABLE {
        while n >= value {
            out.push_str(digits);
            n -= value;
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FormatLevel {
    style: NumberStyle,
    separator: String,
}

/// Immutable, shared chain of per-level number styles.
///
/// Cloning is cheap: all clones share the level table and only differ in the level they point
/// at. The deepest level is its own sub format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberFormat {
    levels: Rc<[FormatLevel]>,
    index: usize,
}

impl NumberFormat {
    pub fn new(style: NumberStyle, separator: impl Into<String>) -> Self {
        Self {
            levels: Rc::from(vec![FormatLevel {
                style,
                separator: separator.into(),
            }]),
            index: 0,
        }
    }

    pub fn parse(spec: &str) -> Result<Self, FormatError> {
        if spec.is_empty() {
            return Err(FormatError::Missing);
        }
        let mut styles = Vec::new();
        let mut seps: Vec<String> = Vec::new();
        for c in spec.chars() {
            if let Some(style) = NumberStyle::from_char(c) {
                if styles.len() > seps.len() {
                    seps.push(String::new());
                }
                styles.push(style);
            } else if styles.is_empty() || !SEPARATORS.contains(c) {
                return Err(FormatError::InvalidCharacter(c, spec.to_string()));
            } else if seps.len() >= styles.len() {
                return Err(FormatError::DoubleSeparator(c, spec.to_string()));
            } else {
                seps.push(c.to_string());
            }
        }
        if styles.len() > seps.len() {
            let last = seps.last().cloned().unwrap_or_else(|| ".".to_string());
            seps.push(last);
        }
        let levels: Vec<FormatLevel> = styles
            .into_iter()
            .zip(seps)
            .map(|(style, separator)| FormatLevel { style, separator })
            .collect();
        Ok(Self {
            levels: Rc::from(levels),
            index: 0,
        })
    }

    fn level(&self) -> &FormatLevel {
        &self.levels[self.index]
    }

    pub fn style(&self) -> NumberStyle {
        self.level().style
    }

    /// Separator placed between this level's number and the next level's.
    pub fn separator(&self) -> &str {
        &self.level().separator
    }

    pub fn format(&self, n: usize) -> String {
        self.style().format(n)
    }

    pub fn sub(&self) -> Self {
        Self {
            levels: Rc::clone(&self.levels),
            index: (self.index + 1).min(self.levels.len() - 1),
        }
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for level in self.levels[self.index..].iter() {
            let c = match level.style {
                NumberStyle::Void => 'V',
                NumberStyle::Decimal => '1',
                NumberStyle::UpperAlpha => 'A',
                NumberStyle::LowerAlpha => 'a',
                NumberStyle::UpperRoman => 'I',
                NumberStyle::LowerRoman => 'i',
            };
            write!(f, "{}{}", c, level.separator)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest(
        style,
        n,
        expected,
        case(NumberStyle::LowerRoman, 14, "xiv"),
        case(NumberStyle::UpperRoman, 1994, "MCMXCIV"),
        case(NumberStyle::UpperAlpha, 1, "A"),
        case(NumberStyle::LowerAlpha, 26, "z"),
        case(NumberStyle::LowerAlpha, 27, "aa"),
        case(NumberStyle::Decimal, 0, ""),
        case(NumberStyle::Void, 7, "")
    )]
    fn test_style_format(style: NumberStyle, n: usize, expected: &str) {
        assert_eq!(style.format(n), expected);
    }

    #[test]
    fn test_parse_single_level_defaults_separator() {
        let f = NumberFormat::parse("1").unwrap();
        assert_eq!(f.separator(), ".");
        assert_eq!(f.format(3), "3");
        assert_eq!(f.sub().separator(), ".");
    }

    #[test]
    fn test_parse_repeats_last_separator() {
        let f = NumberFormat::parse("1-A").unwrap();
        assert_eq!(f.separator(), "-");
        let sub = f.sub();
        assert_eq!(sub.style(), NumberStyle::UpperAlpha);
        assert_eq!(sub.separator(), "-");
        assert_eq!(sub.sub().style(), NumberStyle::UpperAlpha);
    }

    #[test]
    fn test_parse_empty_separator() {
        let f = NumberFormat::parse("1A.").unwrap();
        assert_eq!(f.separator(), "");
        assert_eq!(f.sub().separator(), ".");
        assert_eq!(f.to_string(), "1A.");
    }

    #[rstest(spec, case(""), case(".1"), case("1x"), case("1.."))]
    fn test_parse_rejects(spec: &str) {
        assert!(NumberFormat::parse(spec).is_err());
    }
}
