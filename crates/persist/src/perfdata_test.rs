use crate::perfdata::{parse_perfdata, ValueType};

#[test]
fn test_single_metric_full_fields() {
    let metrics = parse_perfdata("load=0.42;1;2;0;4");
    assert_eq!(metrics.len(), 1);
    let m = &metrics[0];
    assert_eq!(m.name, "load");
    assert_eq!(m.value, 0.42);
    assert_eq!(m.value_type, ValueType::Gauge);
    assert_eq!(m.unit, "");
    assert_eq!(m.warn, Some(1.0));
    assert_eq!(m.crit, Some(2.0));
    assert_eq!(m.min, Some(0.0));
    assert_eq!(m.max, Some(4.0));
}

#[test]
fn test_multiple_metrics() {
    let metrics = parse_perfdata("load=0.42;1;2;0;4 mem=35%;80;95");
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[0].name, "load");
    assert_eq!(metrics[1].name, "mem");
    assert_eq!(metrics[1].unit, "%");
    assert_eq!(metrics[1].warn, Some(80.0));
    assert_eq!(metrics[1].crit, Some(95.0));
    assert_eq!(metrics[1].min, None);
}

#[test]
fn test_quoted_label_with_spaces() {
    let metrics = parse_perfdata("'used space'=81GB;90;95;0;100");
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].name, "used space");
    assert_eq!(metrics[0].unit, "GB");
    assert_eq!(metrics[0].value, 81.0);
}

#[test]
fn test_ds_type_wrappers() {
    let metrics = parse_perfdata("d[rx]=120 c[hits]=4512c a[delta]=3 g[temp]=21.5");
    assert_eq!(metrics.len(), 4);
    assert_eq!(metrics[0].name, "rx");
    assert_eq!(metrics[0].value_type, ValueType::Derive);
    assert_eq!(metrics[1].name, "hits");
    assert_eq!(metrics[1].value_type, ValueType::Counter);
    assert_eq!(metrics[1].unit, "c");
    assert_eq!(metrics[2].value_type, ValueType::Absolute);
    assert_eq!(metrics[3].value_type, ValueType::Gauge);
}

#[test]
fn test_byte_and_time_units_normalized() {
    let metrics = parse_perfdata("t=250ms size=4kb big=2Tb");
    assert_eq!(metrics[0].unit, "s");
    assert_eq!(metrics[1].unit, "KB");
    assert_eq!(metrics[2].unit, "TB");
}

#[test]
fn test_range_thresholds_keep_upper_bound() {
    let metrics = parse_perfdata("rta=0.5;10:20;@30:40;~:0;50:");
    let m = &metrics[0];
    assert_eq!(m.warn, Some(20.0));
    assert_eq!(m.crit, Some(40.0));
    assert_eq!(m.min, Some(0.0));
    assert_eq!(m.max, None);
}

#[test]
fn test_malformed_metric_does_not_poison_batch() {
    let metrics = parse_perfdata("good=1;2;3 bad=notanumber also_good=7");
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[0].name, "good");
    assert_eq!(metrics[1].name, "also_good");
    assert_eq!(metrics[1].value, 7.0);
}

#[test]
fn test_empty_and_garbage_inputs() {
    assert!(parse_perfdata("").is_empty());
    assert!(parse_perfdata("   ").is_empty());
    assert!(parse_perfdata("no equals sign here").is_empty());
}

#[test]
fn test_negative_and_scientific_values() {
    let metrics = parse_perfdata("offset=-0.003s drift=1.5e-3");
    assert_eq!(metrics[0].value, -0.003);
    assert_eq!(metrics[0].unit, "s");
    assert_eq!(metrics[1].value, 1.5e-3);
}

#[test]
fn test_infinite_threshold() {
    let metrics = parse_perfdata("x=1;inf;-inf");
    assert_eq!(metrics[0].warn, Some(f64::INFINITY));
    assert_eq!(metrics[0].crit, Some(f64::NEG_INFINITY));
}
