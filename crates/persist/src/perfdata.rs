//! Perfdata string parser
//!
//! Plugin output of the form `label=value[uom];warn;crit;min;max`, space
//! separated, labels optionally single-quoted, with a data-source-type
//! wrapper on the label (`d[...]` derive, `c[...]` counter, `a[...]`
//! absolute, `g[...]` gauge). Thresholds accept Nagios range syntax; the
//! upper bound is retained.
//!
//! One malformed metric never poisons the batch: it is logged, counted by
//! the caller and skipped.

/// Data source type of one metric
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(i16)]
pub enum ValueType {
    #[default]
    Gauge = 0,
    Counter = 1,
    Derive = 2,
    Absolute = 3,
}

/// One parsed metric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerfMetric {
    pub name: String,
    pub value: f64,
    pub value_type: ValueType,
    pub unit: String,
    pub warn: Option<f64>,
    pub crit: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Units the pipeline understands; everything else passes through verbatim
fn normalize_unit(raw: &str) -> String {
    match raw.to_ascii_lowercase().as_str() {
        "" => String::new(),
        // time units collapse to seconds for comparison purposes
        "s" | "ms" | "us" | "ns" => "s".into(),
        "%" => "%".into(),
        "b" => "B".into(),
        "kb" => "KB".into(),
        "mb" => "MB".into(),
        "gb" => "GB".into(),
        "tb" => "TB".into(),
        "c" => "c".into(),
        _ => raw.to_string(),
    }
}

/// Parse one threshold field, tolerating Nagios range syntax
///
/// `10`, `10:20`, `@10:20`, `~:10`, `10:` and `inf` all yield the upper
/// bound when one exists.
fn parse_threshold(raw: &str) -> Option<f64> {
    let raw = raw.trim().trim_start_matches('@');
    if raw.is_empty() {
        return None;
    }
    let upper = match raw.split_once(':') {
        Some((_, upper)) => upper,
        None => raw,
    };
    let upper = upper.trim();
    if upper.is_empty() || upper == "~" {
        return None;
    }
    match upper {
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => upper.parse().ok(),
    }
}

/// Split the value field into numeric part and unit-of-measure tail
fn split_value_uom(raw: &str) -> Option<(f64, String)> {
    let numeric_end = raw
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    let value: f64 = raw[..numeric_end].parse().ok()?;
    Some((value, normalize_unit(raw[numeric_end..].trim())))
}

/// Pull the next label off the input, honoring single quotes
///
/// Returns `(label, rest_after_equals)` or `None` when no `=` terminates
/// the label.
fn take_label(input: &str) -> Option<(&str, &str)> {
    let input = input.trim_start();
    if let Some(stripped) = input.strip_prefix('\'') {
        let close = stripped.find('\'')?;
        let label = &stripped[..close];
        let rest = stripped[close + 1..].strip_prefix('=')?;
        Some((label, rest))
    } else {
        let eq = input.find('=')?;
        Some((&input[..eq], &input[eq + 1..]))
    }
}

/// Unwrap a data-source-type wrapper from the label
fn split_ds_type(label: &str) -> (ValueType, &str) {
    for (prefix, vtype) in [
        ("a[", ValueType::Absolute),
        ("c[", ValueType::Counter),
        ("d[", ValueType::Derive),
        ("g[", ValueType::Gauge),
    ] {
        if let Some(inner) = label.strip_prefix(prefix)
            && let Some(inner) = inner.strip_suffix(']')
        {
            return (vtype, inner);
        }
    }
    (ValueType::Gauge, label)
}

/// Parse a whole perfdata string
///
/// Malformed metrics are skipped with a debug log; the caller sees only
/// what parsed cleanly.
pub fn parse_perfdata(perfdata: &str) -> Vec<PerfMetric> {
    let mut out = Vec::new();
    let mut rest = perfdata.trim();

    while !rest.is_empty() {
        let Some((raw_label, after_label)) = take_label(rest) else {
            // No further label=value pair in the tail.
            if !rest.trim().is_empty() {
                tracing::debug!(tail = rest, "perfdata tail ignored");
            }
            break;
        };

        // The metric's fields run until the next space.
        let (fields, remaining) = match after_label.find(' ') {
            Some(pos) => (&after_label[..pos], &after_label[pos + 1..]),
            None => (after_label, ""),
        };
        rest = remaining.trim_start();

        let (value_type, name) = split_ds_type(raw_label.trim());
        if name.is_empty() {
            tracing::debug!("perfdata metric with empty label skipped");
            continue;
        }

        let mut parts = fields.split(';');
        let value_part = parts.next().unwrap_or("");
        let Some((value, unit)) = split_value_uom(value_part) else {
            tracing::debug!(metric = name, raw = value_part, "unparsable perfdata value");
            continue;
        };

        out.push(PerfMetric {
            name: name.to_string(),
            value,
            value_type,
            unit,
            warn: parts.next().and_then(parse_threshold),
            crit: parts.next().and_then(parse_threshold),
            min: parts.next().and_then(parse_threshold),
            max: parts.next().and_then(parse_threshold),
        });
    }

    out
}
