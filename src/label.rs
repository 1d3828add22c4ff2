//! Label tuples and the precomputed wire-identifier bytes derived from them:
//! a child's label set never changes after construction, so the UTF-8 text
//! for `{k="v",...}` is built exactly once and reused on every scrape.

/// Escapes a label value: `\` doubles, `"` is escaped, and both bare `\n`
/// and `\r`/`\r\n` normalize to the two-character `\n` escape sequence.
pub(crate) fn escape_label_value(out: &mut String, value: &str) {
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push_str("\\n");
            }
            other => out.push(other),
        }
    }
}

/// Precomputed label text for one child: a fully-closed form for lines with
/// no extra label, and an open prefix for lines (histogram buckets, summary
/// quantiles) that append one more `name="value"` pair before closing.
#[derive(Debug, Clone, Default)]
pub(crate) struct LabelIdent {
    /// `""`, or `"{k=\"v\",...}"`.
    closed: String,
    /// `"{"`, or `"{k=\"v\","` — append `extra="value"}` to complete a line.
    open_prefix: String,
}

impl LabelIdent {
    /// Builds the identifier text from the family's label schema (zipped
    /// with this child's values, in schema order) followed by the
    /// registry/family's static labels.
    pub(crate) fn build(
        schema: &[String],
        values: &[String],
        static_labels: &[(String, String)],
    ) -> Self {
        debug_assert_eq!(schema.len(), values.len());

        let mut inner = String::new();
        for (name, value) in schema.iter().zip(values.iter()) {
            if !inner.is_empty() {
                inner.push(',');
            }
            inner.push_str(name);
            inner.push_str("=\"");
            escape_label_value(&mut inner, value);
            inner.push('"');
        }
        for (name, value) in static_labels {
            if !inner.is_empty() {
                inner.push(',');
            }
            inner.push_str(name);
            inner.push_str("=\"");
            escape_label_value(&mut inner, value);
            inner.push('"');
        }

        if inner.is_empty() {
            Self {
                closed: String::new(),
                open_prefix: "{".to_string(),
            }
        } else {
            Self {
                closed: format!("{{{inner}}}"),
                open_prefix: format!("{{{inner},"),
            }
        }
    }

    /// The fully-closed label block, or `""` if the child carries no labels.
    pub(crate) fn closed(&self) -> &str {
        &self.closed
    }

    /// The open prefix, always ending in either `{` or `,`.
    pub(crate) fn open_prefix(&self) -> &str {
        &self.open_prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_backslash_quote_and_newline() {
        let mut out = String::new();
        escape_label_value(&mut out, "a\\b\"c\nd\re\r\nf");
        assert_eq!(out, "a\\\\b\\\"c\\nd\\ne\\nf");
    }

    #[test]
    fn label_ident_with_schema_and_static_labels() {
        let schema = vec!["method".to_string()];
        let values = vec!["GET".to_string()];
        let statics = vec![("region".to_string(), "eu".to_string())];
        let ident = LabelIdent::build(&schema, &values, &statics);
        assert_eq!(ident.closed(), "{method=\"GET\",region=\"eu\"}");
        assert_eq!(ident.open_prefix(), "{method=\"GET\",region=\"eu\",");
    }

    #[test]
    fn label_ident_empty() {
        let ident = LabelIdent::build(&[], &[], &[]);
        assert_eq!(ident.closed(), "");
        assert_eq!(ident.open_prefix(), "{");
    }
}
