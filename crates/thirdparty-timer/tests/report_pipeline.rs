//! End-to-end passes over TransactionFlow reports.

use thirdparty_timer::{
    aggregate_host, distinct_hosts, run_pass, MeasureKey, MemorySink, MetricName, NeverStop,
    ReportDocument, TimerError,
};

const FIXTURE: &str = include_str!("fixtures/transaction_flow.xml");

// ─────────────────────── helpers ───────────────────────

fn report(adm: &str, links: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<dashboardreport>
  <data>
    <admdashlet>
      <adm>{adm}</adm>
      <adm_links>{links}</adm_links>
    </admdashlet>
  </data>
</dashboardreport>"#
    )
}

fn pass(xml: &str) -> MemorySink {
    let mut sink = MemorySink::new();
    run_pass(xml.as_bytes(), &MeasureKey::default(), &mut sink, &NeverStop).unwrap();
    sink
}

// ─────────────────────── fixture ───────────────────────

#[test]
fn test_fixture_hosts() {
    let doc = ReportDocument::parse(FIXTURE.as_bytes()).unwrap();
    let hosts: Vec<_> = distinct_hosts(&doc).unwrap().into_iter().collect();
    assert_eq!(
        hosts,
        vec![
            "ads.example.io",
            "api.maps.example.net",
            "cdn.example.com",
            "fonts.example.org"
        ]
    );
}

#[test]
fn test_fixture_metrics() {
    let mut sink = MemorySink::new();
    let report = run_pass(FIXTURE.as_bytes(), &MeasureKey::default(), &mut sink, &NeverStop).unwrap();

    assert_eq!(report.hosts, 4);
    assert_eq!(report.hosts_processed, 4);
    assert_eq!(report.samples_emitted, 6);
    assert_eq!(report.skipped_values, 2);

    assert_eq!(sink.value("cdn.example.com", MetricName::ResponseTime), Some(20.0));
    assert_eq!(sink.value("cdn.example.com", MetricName::Count), Some(8.0));
    assert_eq!(sink.value("api.maps.example.net", MetricName::ResponseTime), Some(45.5));
    assert_eq!(sink.value("api.maps.example.net", MetricName::Count), Some(12.0));
    assert_eq!(sink.value("fonts.example.org", MetricName::ResponseTime), None);
    assert_eq!(sink.value("fonts.example.org", MetricName::Count), Some(7.0));
    assert_eq!(sink.value("ads.example.io", MetricName::ResponseTime), Some(80.0));
    assert_eq!(sink.value("ads.example.io", MetricName::Count), None);

    assert!(sink.samples().iter().all(|s| s.group == "Third Party Timer"));
    assert!(sink.samples().iter().all(|s| s.dimension == "host"));
}

#[test]
fn test_fixture_sum_aggregation() {
    let mut sink = MemorySink::new();
    run_pass(
        FIXTURE.as_bytes(),
        &MeasureKey::from_aggregation("sum"),
        &mut sink,
        &NeverStop,
    )
    .unwrap();
    let mean = sink
        .value("cdn.example.com", MetricName::ResponseTime)
        .unwrap();
    assert!((mean - 1000.0 / 3.0).abs() < 1e-9);
}

// ─────────────────────── properties ───────────────────────

#[test]
fn test_no_qualifying_agents_emits_nothing() {
    let xml = report(
        r#"<agent name="Frontend" host="web-1" response_avg="5"/>"#,
        r#"<agent to="Third Party Content@web-1" remoting_count="4"/>"#,
    );
    let doc = ReportDocument::parse(xml.as_bytes()).unwrap();
    assert!(distinct_hosts(&doc).unwrap().is_empty());
    assert!(pass(&xml).samples().is_empty());
}

#[test]
fn test_duplicate_rows_yield_one_host() {
    let row = r#"<agent name="Third Party Content" host="a.com" response_avg="1"/>"#;
    let xml = report(&row.repeat(5), "");
    let doc = ReportDocument::parse(xml.as_bytes()).unwrap();
    let hosts = distinct_hosts(&doc).unwrap();
    assert_eq!(hosts.len(), 1);
    assert!(hosts.contains("a.com"));

    let sink = pass(&xml);
    assert_eq!(sink.samples().len(), 1);
}

#[test]
fn test_mean_of_response_times() {
    let xml = report(
        r#"<agent name="Third Party Content" host="a.com" response_avg="10.0"/>
           <agent name="Third Party Content" host="a.com" response_avg="20.0"/>
           <agent name="Third Party Content" host="a.com" response_avg="30.0"/>"#,
        "",
    );
    assert_eq!(pass(&xml).value("a.com", MetricName::ResponseTime), Some(20.0));
}

#[test]
fn test_sum_of_counts() {
    let xml = report(
        r#"<agent name="Third Party Content" host="b.com"/>"#,
        r#"<agent to="Third Party Content@b.com" remoting_count="3"/>
           <agent to="Third Party Content@b.com" remoting_count="5"/>"#,
    );
    assert_eq!(pass(&xml).value("b.com", MetricName::Count), Some(8.0));
}

#[test]
fn test_missing_measure_key_still_emits_count() {
    let xml = report(
        r#"<agent name="Third Party Content" host="a.com" response_sum="10"/>"#,
        r#"<agent to="Third Party Content@a.com" remoting_count="2"/>"#,
    );
    let sink = pass(&xml);
    assert_eq!(sink.value("a.com", MetricName::ResponseTime), None);
    assert_eq!(sink.value("a.com", MetricName::Count), Some(2.0));
    assert_eq!(sink.samples().len(), 1);
}

#[test]
fn test_link_substring_match() {
    let xml = report(
        r#"<agent name="Third Party Content" host="b.com"/>"#,
        r#"<agent to="Third Party Content@b.com.extra" remoting_count="6"/>"#,
    );
    assert_eq!(pass(&xml).value("b.com", MetricName::Count), Some(6.0));
}

#[test]
fn test_malformed_value_does_not_block_others() {
    let xml = report(
        r#"<agent name="Third Party Content" host="a.com" response_avg="N/A"/>
           <agent name="Third Party Content" host="a.com" response_avg="12"/>"#,
        "",
    );
    let doc = ReportDocument::parse(xml.as_bytes()).unwrap();
    let agg = aggregate_host(&doc, "a.com", &MeasureKey::default()).unwrap();
    assert_eq!(agg.response_time, Some(12.0));
    assert_eq!(agg.skipped, 1);
}

#[test]
fn test_passes_are_deterministic() {
    let first = pass(FIXTURE).into_samples();
    let second = pass(FIXTURE).into_samples();
    assert_eq!(first, second);
}

#[test]
fn test_malformed_report_fails_the_pass() {
    let mut sink = MemorySink::new();
    let broken = FIXTURE.replace("</adm_links>", "");
    let result = run_pass(broken.as_bytes(), &MeasureKey::default(), &mut sink, &NeverStop);
    assert!(matches!(result, Err(TimerError::Parse(_))));
    assert!(sink.samples().is_empty());
}
