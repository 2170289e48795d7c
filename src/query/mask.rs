use std::fmt;
use std::str::FromStr;

use crate::types::{Error, Result};

/// How a query treats one triple position.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Binding {
    /// Position must equal the query triple.
    Match,
    /// Position is enumerated and reported.
    Vary,
    /// Position is neither constrained nor reported; the query value passes through.
    Ignore,
}

impl Binding {
    const fn digit(self) -> u8 {
        match self {
            Binding::Match => 0,
            Binding::Vary => 1,
            Binding::Ignore => 2,
        }
    }

    const fn from_digit(digit: u8) -> Self {
        match digit {
            0 => Binding::Match,
            1 => Binding::Vary,
            _ => Binding::Ignore,
        }
    }

    const fn letter(self) -> char {
        match self {
            Binding::Match => 'M',
            Binding::Vary => 'V',
            Binding::Ignore => 'I',
        }
    }
}

/// The 27 binding patterns over (entity, attribute, value).
///
/// Variant names spell the binding of entity, attribute and value in that
/// order. The discriminant is `Σ digit(letter_i) · 3^i` with `M = 0`, `V = 1`,
/// `I = 2` and the entity as the fastest-varying position.
#[allow(clippy::upper_case_acronyms, missing_docs)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum QueryMask {
    MMM = 0,
    VMM = 1,
    IMM = 2,
    MVM = 3,
    VVM = 4,
    IVM = 5,
    MIM = 6,
    VIM = 7,
    IIM = 8,
    MMV = 9,
    VMV = 10,
    IMV = 11,
    MVV = 12,
    VVV = 13,
    IVV = 14,
    MIV = 15,
    VIV = 16,
    IIV = 17,
    MMI = 18,
    VMI = 19,
    IMI = 20,
    MVI = 21,
    VVI = 22,
    IVI = 23,
    MII = 24,
    VII = 25,
    III = 26,
}

impl QueryMask {
    /// All masks in code order.
    pub const ALL: [QueryMask; 27] = [
        QueryMask::MMM,
        QueryMask::VMM,
        QueryMask::IMM,
        QueryMask::MVM,
        QueryMask::VVM,
        QueryMask::IVM,
        QueryMask::MIM,
        QueryMask::VIM,
        QueryMask::IIM,
        QueryMask::MMV,
        QueryMask::VMV,
        QueryMask::IMV,
        QueryMask::MVV,
        QueryMask::VVV,
        QueryMask::IVV,
        QueryMask::MIV,
        QueryMask::VIV,
        QueryMask::IIV,
        QueryMask::MMI,
        QueryMask::VMI,
        QueryMask::IMI,
        QueryMask::MVI,
        QueryMask::VVI,
        QueryMask::IVI,
        QueryMask::MII,
        QueryMask::VII,
        QueryMask::III,
    ];

    /// Numeric code of the mask.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Mask for a numeric code, `None` above 26.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Mask for three bindings in (entity, attribute, value) order.
    pub fn from_bindings(bindings: [Binding; 3]) -> Self {
        let code = bindings[0].digit() + 3 * bindings[1].digit() + 9 * bindings[2].digit();
        Self::ALL[code as usize]
    }

    /// Binding of position `pos` (0 = entity, 1 = attribute, 2 = value).
    pub fn binding(self, pos: usize) -> Binding {
        let code = self.code() / 3u8.pow(pos.min(2) as u32);
        Binding::from_digit(code % 3)
    }

    /// Bindings in (entity, attribute, value) order.
    pub fn bindings(self) -> [Binding; 3] {
        [self.binding(0), self.binding(1), self.binding(2)]
    }
}

impl fmt::Display for QueryMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for binding in self.bindings() {
            write!(f, "{}", binding.letter())?;
        }
        Ok(())
    }
}

impl FromStr for QueryMask {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let letters: Vec<char> = s.chars().collect();
        if letters.len() != 3 {
            return Err(Error::Serialization(format!("query mask '{s}' must have 3 letters")));
        }
        let mut bindings = [Binding::Match; 3];
        for (slot, letter) in bindings.iter_mut().zip(letters) {
            *slot = match letter {
                'M' => Binding::Match,
                'V' => Binding::Vary,
                'I' => Binding::Ignore,
                other => {
                    return Err(Error::Serialization(format!(
                        "query mask '{s}' has invalid letter '{other}'"
                    )))
                }
            };
        }
        Ok(Self::from_bindings(bindings))
    }
}
