//! Compact human-readable rendering of byte magnitudes
//!
//! Uses decimal (powers of 1000) units. Magnitudes past giga stay in `G`
//! and are shown as a large number rather than advancing to a further unit.

use crate::settings::DEFAULT_DECIMAL_PLACE;

/// Unit suffixes, smallest first
const UNITS: [&str; 4] = ["B", "K", "M", "G"];

/// Text shown in place of a metric that cannot be formatted
pub const FORMAT_ERROR_MARKER: &str = "ERR";

/// Formats byte counts and byte rates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricFormatter {
    decimal_place: usize,
}

impl Default for MetricFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_DECIMAL_PLACE)
    }
}

impl MetricFormatter {
    pub fn new(decimal_place: usize) -> Self {
        Self { decimal_place }
    }

    pub fn decimal_place(&self) -> usize {
        self.decimal_place
    }

    /// Format a magnitude with its unit suffix
    ///
    /// Non-finite and negative input yields [`FORMAT_ERROR_MARKER`].
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() || value < 0.0 {
            return FORMAT_ERROR_MARKER.to_string();
        }

        let mut scaled = value;
        let mut unit = 0;
        while scaled >= 1000.0 && unit < UNITS.len() - 1 {
            scaled /= 1000.0;
            unit += 1;
        }

        if scaled.fract() == 0.0 {
            format!("{:.0}{}", scaled, UNITS[unit])
        } else {
            format!("{:.*}{}", self.decimal_place, scaled, UNITS[unit])
        }
    }

    /// Format a magnitude and append a decoration
    pub fn format_with(&self, value: f64, decoration: &str) -> String {
        let mut text = self.format(value);
        text.push_str(decoration);
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes_below_kilo() {
        let formatter = MetricFormatter::default();
        assert_eq!(formatter.format(0.0), "0B");
        assert_eq!(formatter.format(999.0), "999B");
    }

    #[test]
    fn test_format_whole_number_after_scaling() {
        let formatter = MetricFormatter::default();
        assert_eq!(formatter.format(1000.0), "1K");
        assert_eq!(formatter.format(2_000_000.0), "2M");
    }

    #[test]
    fn test_format_fractional_uses_decimal_place() {
        assert_eq!(MetricFormatter::new(2).format(1500.0), "1.50K");
        assert_eq!(MetricFormatter::new(0).format(1500.0), "2K");
        assert_eq!(MetricFormatter::new(1).format(2_340_000.0), "2.3M");
        assert_eq!(MetricFormatter::new(2).format(12.5), "12.50B");
    }

    #[test]
    fn test_format_caps_at_giga() {
        let formatter = MetricFormatter::default();
        let text = formatter.format(1.2345e12);

        assert!(text.ends_with('G'));
        assert_eq!(text, "1234.50G");

        let prefix: f64 = text.trim_end_matches('G').parse().unwrap();
        assert!(prefix >= 1000.0);
    }

    #[test]
    fn test_format_suffix_and_prefix_property() {
        let formatter = MetricFormatter::new(3);
        let samples = [0.5, 7.0, 999.9, 1000.0, 45_678.0, 3.2e6, 8.75e9, 5.0e13];

        for value in samples {
            let text = formatter.format(value);
            let unit = text.chars().last().unwrap();
            let k = match unit {
                'B' => 0,
                'K' => 1,
                'M' => 2,
                'G' => 3,
                other => panic!("unexpected unit {other} in {text}"),
            };
            let prefix: f64 = text[..text.len() - 1].parse().unwrap();
            let expected = value / 1000f64.powi(k);
            assert!(
                (prefix - expected).abs() <= 0.0005 * expected.max(1.0),
                "{value} rendered as {text}"
            );
        }
    }

    #[test]
    fn test_format_invalid_input_returns_marker() {
        let formatter = MetricFormatter::default();
        assert_eq!(formatter.format(f64::NAN), FORMAT_ERROR_MARKER);
        assert_eq!(formatter.format(f64::INFINITY), FORMAT_ERROR_MARKER);
        assert_eq!(formatter.format(-1000.0), FORMAT_ERROR_MARKER);
    }

    #[test]
    fn test_format_with_decoration() {
        let formatter = MetricFormatter::default();
        assert_eq!(formatter.format_with(1000.0, "↓"), "1K↓");
        assert_eq!(formatter.format_with(f64::NAN, "↓"), "ERR↓");
    }
}
