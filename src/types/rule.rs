use std::fmt;

/// Site-building rule assigned to a Procedural Feature, normalized from the
/// free-text `RULE` attribute.
///
/// Numeric strings parse to `Numbered(1..=15)`, `"AHZ"` is its own variant,
/// and anything else (including `SCS1`/`KCS`/`MACS` features, which never
/// enter the terrestrial SBB path) normalizes to `Unknown`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rule {
    Numbered(u8),
    Ahz,
    Unknown,
}

impl Rule {
    /// Normalize raw `RULE` text.
    pub fn from_text(text: &str) -> Self {
        match text.trim().parse::<u8>() {
            Ok(n) if (1..=15).contains(&n) => Rule::Numbered(n),
            _ if text.trim() == "AHZ" => Rule::Ahz,
            _ => Rule::Unknown,
        }
    }

    /// Canonical integer code: -1 for AHZ, 0 for unknown, else the rule number.
    #[inline]
    pub fn code(&self) -> i16 {
        match self {
            Rule::Numbered(n) => *n as i16,
            Rule::Ahz => -1,
            Rule::Unknown => 0,
        }
    }

    /// Rules 5, 6, 7 and 9 combine the PF buffer with nearby wetland polygons.
    #[inline]
    pub fn is_wetland(&self) -> bool {
        matches!(self, Rule::Numbered(5 | 6 | 7 | 9))
    }

    /// Effective buffer distance (meters) given the user-supplied `BUFFER`.
    ///
    /// Returns `(buffer, warning)`. A `None` buffer on a non-wetland rule
    /// means the feature is skipped by the simple/zero SBB paths. A supplied
    /// buffer of zero overrides every computed value to zero.
    pub fn effective_buffer(&self, supplied: Option<f64>) -> (Option<f64>, Option<String>) {
        let mut warning = None;
        let computed = match self {
            Rule::Ahz => Some(supplied.unwrap_or(0.0)),
            Rule::Numbered(1) => Some(150.0),
            Rule::Numbered(2 | 3 | 4 | 8 | 14) => Some(250.0),
            Rule::Numbered(11 | 12) => Some(405.0),
            Rule::Numbered(15) => Some(0.0),
            Rule::Numbered(13) => supplied,
            Rule::Numbered(10) => match supplied {
                Some(b) if b == 0.0 || b == 150.0 || b == 500.0 => Some(b),
                _ => {
                    warning = Some("buffer distance is invalid for rule 10".to_string());
                    None
                }
            },
            // Wetland rules carry no fixed buffer; see the wetland SBB path.
            Rule::Numbered(5 | 6 | 7 | 9) => None,
            Rule::Numbered(_) | Rule::Unknown => None,
        };
        if supplied == Some(0.0) {
            return (Some(0.0), warning);
        }
        (computed, warning)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Numbered(n) => write!(f, "{n}"),
            Rule::Ahz => write!(f, "AHZ"),
            Rule::Unknown => write!(f, "?"),
        }
    }
}
