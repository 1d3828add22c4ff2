//! Prometheus text v0.0.4 rendering primitives.
//!
//! Numeric rendering uses `dtoa`/`itoa` — fast, locale-independent
//! formatters — with `+Inf`/`-Inf`/`NaN` special-cased ahead of them, since
//! neither formatter renders non-finite values the way the exposition
//! format requires.

/// Writes `name`, `help`, and `kind` as the two-line family header:
/// `# HELP <name> <help>\n# TYPE <name> <kind>\n`.
pub(crate) fn write_family_header(out: &mut String, name: &str, help: &str, kind: &str) {
    out.push_str("# HELP ");
    out.push_str(name);
    out.push(' ');
    out.push_str(help);
    out.push('\n');
    out.push_str("# TYPE ");
    out.push_str(name);
    out.push(' ');
    out.push_str(kind);
    out.push('\n');
}

/// Writes a double using the locale-independent period decimal separator,
/// with `+Inf`, `-Inf`, and `NaN` spelled out for the corresponding values.
pub(crate) fn write_f64(out: &mut String, value: f64) {
    if value.is_nan() {
        out.push_str("NaN");
    } else if value == f64::INFINITY {
        out.push_str("+Inf");
    } else if value == f64::NEG_INFINITY {
        out.push_str("-Inf");
    } else {
        let mut buf = dtoa::Buffer::new();
        out.push_str(buf.format(value));
    }
}

/// Writes a non-negative integer.
pub(crate) fn write_u64(out: &mut String, value: u64) {
    let mut buf = itoa::Buffer::new();
    out.push_str(buf.format(value));
}

/// Writes the upper bound of a histogram bucket as a label value: `+Inf`
/// for the final, unbounded bucket, otherwise the decimal value.
pub(crate) fn write_bound(out: &mut String, bound: f64) {
    if bound == f64::INFINITY {
        out.push_str("+Inf");
    } else {
        write_f64(out, bound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_non_finite_values() {
        let mut out = String::new();
        write_f64(&mut out, f64::NAN);
        assert_eq!(out, "NaN");

        out.clear();
        write_f64(&mut out, f64::INFINITY);
        assert_eq!(out, "+Inf");

        out.clear();
        write_f64(&mut out, f64::NEG_INFINITY);
        assert_eq!(out, "-Inf");
    }

    #[test]
    fn renders_decimal_with_period_separator() {
        let mut out = String::new();
        write_f64(&mut out, 64835.83);
        assert_eq!(out, "64835.83");
    }

    #[test]
    fn family_header_has_help_then_type() {
        let mut out = String::new();
        write_family_header(&mut out, "sb64v77", "a gauge", "gauge");
        assert_eq!(out, "# HELP sb64v77 a gauge\n# TYPE sb64v77 gauge\n");
    }
}
