/// Calculator configuration record.
///
/// One `Config` lives in the Engine; the display and arithmetic layers
/// consult it on every operation. Properties are reachable from scripts via
/// `config("name", value)`; each property is documented in `ALL_PROPS`.
use crate::core::rational::Rational;

// ---------------------------------------------------------------------------
// Rounding policy
// ---------------------------------------------------------------------------

/// The seven rounding modes shared by quo/mod/quomod, sqrt/appr/cfappr and
/// display rounding. One dispatcher in the rational layer consumes these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    /// Quotient toward zero.
    Zero,
    /// Quotient away from zero.
    Away,
    /// Toward negative infinity.
    Floor,
    /// Toward positive infinity.
    Ceil,
    /// Round half to even (banker's).
    NearEven,
    /// Round half away from zero.
    HalfUp,
    /// Truncate extra precision (alias of Zero for division; distinct slot
    /// for display rounding).
    Trunc,
}

impl Round {
    pub fn from_name(name: &str) -> Option<Round> {
        Some(match name {
            "zero" => Round::Zero,
            "away" => Round::Away,
            "floor" => Round::Floor,
            "ceil" => Round::Ceil,
            "even" | "neareven" => Round::NearEven,
            "halfup" => Round::HalfUp,
            "trunc" => Round::Trunc,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Round::Zero => "zero",
            Round::Away => "away",
            Round::Floor => "floor",
            Round::Ceil => "ceil",
            Round::NearEven => "even",
            Round::HalfUp => "halfup",
            Round::Trunc => "trunc",
        }
    }
}

// ---------------------------------------------------------------------------
// Output mode
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// num/den fraction form.
    Frac,
    /// Integer part only.
    Int,
    /// Decimal expansion to `display` digits.
    Real,
    /// Scientific d.ddd e±k.
    Exp,
    Hex,
    Oct,
    Bin,
    /// Integer bytes rendered as characters.
    Str,
}

impl Mode {
    pub fn from_name(name: &str) -> Option<Mode> {
        Some(match name {
            "frac" | "fraction" => Mode::Frac,
            "int" | "integer" => Mode::Int,
            "real" | "decimal" => Mode::Real,
            "exp" | "exponential" => Mode::Exp,
            "hex" => Mode::Hex,
            "oct" | "octal" => Mode::Oct,
            "bin" | "binary" => Mode::Bin,
            "str" | "string" => Mode::Str,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Mode::Frac => "frac",
            Mode::Int => "int",
            Mode::Real => "real",
            Mode::Exp => "exp",
            Mode::Hex => "hex",
            Mode::Oct => "oct",
            Mode::Bin => "bin",
            Mode::Str => "str",
        }
    }
}

// ---------------------------------------------------------------------------
// Debug bitmasks (calc_debug)
// ---------------------------------------------------------------------------

pub const DEBUG_OPCODES: u32 = 1;
pub const DEBUG_CALLS: u32 = 2;
pub const DEBUG_PARSE: u32 = 4;

// ---------------------------------------------------------------------------
// The configuration record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    /// Digits of fractional precision shown in real/exp modes.
    pub display: u32,
    /// Default eps for transcendentals when the caller omits it.
    pub epsilon: Rational,
    /// Prefix inexact displays with '~'.
    pub tilde: bool,
    /// Indent columns for matrix/list display.
    pub tab: u32,
    pub quo: Round,
    pub modulo: Round,
    pub quomod: Round,
    pub sqrt: Round,
    pub appr: Round,
    pub cfappr: Round,
    /// Rounding applied when printing.
    pub outround: Round,
    pub leadzero: bool,
    pub fullzero: bool,
    /// Element cap on auto-printed containers.
    pub maxprint: usize,
    pub prompt: String,
    pub more: String,
    pub calc_debug: u32,
    /// While positive, the next trapped error aborts the statement and
    /// decrements the counter; at zero errors flow as values.
    pub stoponerror: i32,
    pub lib_debug: u32,
    pub resource_debug: u32,
    pub user_debug: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mode: Mode::Real,
            display: 20,
            epsilon: Rational::pow10(-20),
            tilde: true,
            tab: 3,
            quo: Round::Zero,
            modulo: Round::Floor,
            quomod: Round::Floor,
            sqrt: Round::NearEven,
            appr: Round::NearEven,
            cfappr: Round::NearEven,
            outround: Round::NearEven,
            leadzero: false,
            fullzero: false,
            maxprint: 16,
            prompt: "> ".into(),
            more: ">> ".into(),
            calc_debug: 0,
            stoponerror: 0,
            lib_debug: 0,
            resource_debug: 0,
            user_debug: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Property documentation (config list / describe)
// ---------------------------------------------------------------------------

pub struct PropDef {
    pub name: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

pub static ALL_PROPS: &[PropDef] = &[
    PropDef {
        name: "mode",
        default: "real",
        description: "Numeric output format: frac, int, real, exp, hex, oct, bin, str.",
    },
    PropDef {
        name: "display",
        default: "20",
        description: "Digits of fractional precision shown in real and exp modes.",
    },
    PropDef {
        name: "epsilon",
        default: "1e-20",
        description: "Default precision bound for transcendental functions.",
    },
    PropDef {
        name: "tilde",
        default: "1",
        description: "Prefix inexact decimal displays with '~'.",
    },
    PropDef {
        name: "tab",
        default: "3",
        description: "Indent columns used when printing matrices and lists.",
    },
    PropDef {
        name: "quo",
        default: "zero",
        description: "Rounding policy for the integer quotient operator //.",
    },
    PropDef {
        name: "mod",
        default: "floor",
        description: "Rounding policy for the % operator.",
    },
    PropDef {
        name: "quomod",
        default: "floor",
        description: "Rounding policy for the quomod builtin.",
    },
    PropDef {
        name: "sqrt",
        default: "even",
        description: "Rounding policy applied to irrational square roots.",
    },
    PropDef {
        name: "appr",
        default: "even",
        description: "Rounding policy for the appr builtin.",
    },
    PropDef {
        name: "cfappr",
        default: "even",
        description: "Rounding policy for continued-fraction approximation.",
    },
    PropDef {
        name: "outround",
        default: "even",
        description: "Rounding applied to the final displayed digit.",
    },
    PropDef {
        name: "leadzero",
        default: "0",
        description: "Print a leading 0 before a bare decimal point.",
    },
    PropDef {
        name: "fullzero",
        default: "0",
        description: "Pad displayed fractions with trailing zeros to 'display' digits.",
    },
    PropDef {
        name: "maxprint",
        default: "16",
        description: "Maximum elements auto-printed from a container before eliding.",
    },
    PropDef {
        name: "prompt",
        default: "> ",
        description: "Primary interactive prompt.",
    },
    PropDef {
        name: "more",
        default: ">> ",
        description: "Continuation prompt for unfinished statements.",
    },
    PropDef {
        name: "calc_debug",
        default: "0",
        description: "Debug bitmask: 1 opcode trace, 2 call trace, 4 parse trace.",
    },
    PropDef {
        name: "stoponerror",
        default: "0",
        description: "While positive, each trapped error aborts the statement and \
                      decrements this counter; at zero errors become values.",
    },
    PropDef {
        name: "lib_debug",
        default: "0",
        description: "Internal debug bitmask reserved for library scripts.",
    },
    PropDef {
        name: "resource_debug",
        default: "0",
        description: "Debug bitmask for resource-file loading.",
    },
    PropDef {
        name: "user_debug",
        default: "0",
        description: "Free bitmask reserved for user scripts.",
    },
];

pub fn prop_def(name: &str) -> Option<&'static PropDef> {
    ALL_PROPS.iter().find(|p| p.name == name)
}
