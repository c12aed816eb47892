//! Confidence scoring as data.
//!
//! Plugins extract [`Signals`] from content; this module converts them to a
//! calibrated score with one pure function. Keeping the weights here means a
//! labeled corpus can recalibrate scoring without touching plugin logic.

/// Base score awarded for a successful structural parse.
pub const STRUCTURAL_PARSE_BASE: f64 = 0.60;

/// Additive boost per corroborating signal (matching extension, known root
/// element, recognized comment style, section headers, document markers).
pub const CORROBORATION_BOOST: f64 = 0.05;

/// Penalty applied when the parse only succeeded after recovery
/// (e.g. comment stripping, or a truncated structure).
pub const RECOVERY_PENALTY: f64 = 0.15;

/// Structural signals extracted by a plugin from sampled content.
///
/// Extension matches count as corroboration only; a detection with
/// `structural_parse == false` and `corroborating == 0` scores zero,
/// which is why plugins must not detect on extension alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    /// The content parsed as the plugin's format (or showed an equivalent
    /// structural signal for line-oriented formats).
    pub structural_parse: bool,
    /// Number of corroborating signals beyond the structural parse.
    pub corroborating: u32,
    /// The parse required recovery (stripping, truncation tolerance).
    pub recovered_parse: bool,
}

impl Signals {
    /// Signals for a clean structural parse with no corroboration.
    #[must_use]
    pub const fn parsed() -> Self {
        Self {
            structural_parse: true,
            corroborating: 0,
            recovered_parse: false,
        }
    }

    /// Adds one corroborating signal.
    pub fn corroborate(&mut self) {
        self.corroborating += 1;
    }
}

/// Converts extracted signals into a confidence score clamped to `[0, 1]`.
#[must_use]
pub fn confidence(signals: &Signals) -> f64 {
    let mut score = 0.0;

    if signals.structural_parse {
        score += STRUCTURAL_PARSE_BASE;
    }

    score += f64::from(signals.corroborating) * CORROBORATION_BOOST;

    if signals.recovered_parse {
        score -= RECOVERY_PENALTY;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_parse_alone_scores_base() {
        let score = confidence(&Signals::parsed());
        assert!((score - STRUCTURAL_PARSE_BASE).abs() < f64::EPSILON);
    }

    #[test]
    fn each_corroborating_signal_adds_fixed_boost() {
        let mut signals = Signals::parsed();
        signals.corroborating = 3;

        let expected = STRUCTURAL_PARSE_BASE + 3.0 * CORROBORATION_BOOST;
        assert!((confidence(&signals) - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn recovery_subtracts_penalty() {
        let signals = Signals {
            structural_parse: true,
            corroborating: 0,
            recovered_parse: true,
        };

        let expected = STRUCTURAL_PARSE_BASE - RECOVERY_PENALTY;
        assert!((confidence(&signals) - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn score_never_exceeds_one() {
        let signals = Signals {
            structural_parse: true,
            corroborating: 50,
            recovered_parse: false,
        };
        assert!((confidence(&signals) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn score_never_goes_below_zero() {
        let signals = Signals {
            structural_parse: false,
            corroborating: 0,
            recovered_parse: true,
        };
        assert!(confidence(&signals).abs() < f64::EPSILON);
    }

    #[test]
    fn corroboration_without_structure_stays_below_base() {
        // Extension-only evidence can never reach a parsed file's score.
        let signals = Signals {
            structural_parse: false,
            corroborating: 2,
            recovered_parse: false,
        };
        assert!(confidence(&signals) < STRUCTURAL_PARSE_BASE);
    }

    #[test]
    fn corroborate_increments_count() {
        let mut signals = Signals::parsed();
        signals.corroborate();
        signals.corroborate();
        assert_eq!(signals.corroborating, 2);
    }
}
