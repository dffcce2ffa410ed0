// Operating modes reported by the heater and the target range each allows.

use crate::config::TempRange;

struct ModeSpec {
    code: i64,
    label: &'static str,
    range: TempRange,
}

const MODES: [ModeSpec; 3] = [
    ModeSpec {
        code: 1,
        label: "iMemory",
        range: TempRange::new(40.0, 65.0),
    },
    ModeSpec {
        code: 2,
        label: "Green",
        range: TempRange::new(40.0, 53.0),
    },
    ModeSpec {
        code: 7,
        label: "Boost",
        range: TempRange::new(40.0, 65.0),
    },
];

fn lookup(code: i64) -> Option<&'static ModeSpec> {
    MODES.iter().find(|m| m.code == code)
}

/// Human-readable mode name. Unknown codes render as `Mode N`.
pub fn mode_label(mode: Option<i64>) -> String {
    match mode {
        None => "Unknown".into(),
        Some(code) => lookup(code).map_or_else(|| format!("Mode {code}"), |m| m.label.into()),
    }
}

/// The target range the mode permits, or `fallback` when unknown.
pub fn mode_range(mode: Option<i64>, fallback: TempRange) -> TempRange {
    mode.and_then(lookup).map_or(fallback, |m| m.range)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn known_modes() {
        assert_eq!(mode_label(Some(1)), "iMemory");
        assert_eq!(mode_label(Some(2)), "Green");
        assert_eq!(mode_label(Some(7)), "Boost");
        assert_eq!(mode_range(Some(2), TempRange::new(35.0, 70.0)).to_string(), "40-53°C");
    }

    #[test]
    fn unknown_and_missing_modes() {
        let configured = TempRange::new(35.0, 70.0);
        assert_eq!(mode_label(Some(9)), "Mode 9");
        assert_eq!(mode_label(None), "Unknown");
        assert_eq!(mode_range(Some(9), configured), configured);
        assert_eq!(mode_range(None, configured), configured);
    }
}
