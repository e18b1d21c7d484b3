//! End-to-end pipeline behavior, without the process-wide Hub.

use foundation::fmt::{LogFormat, Renderer};
use foundation::pipeline::{
    ContextMergeProcessor, ModuleFilter, ModuleLevels, Pipeline, RedactionPolicy,
    RedactionProcessor, TraceContextProcessor,
};
use foundation::sinks::CaptureSink;
use foundation::{attrs, context, AttributeMap, Level, LogRecord, Value};
use std::sync::Arc;

fn filtered_pipeline(sink: Arc<CaptureSink>) -> Pipeline {
    let levels = ModuleLevels::new(
        Level::Info,
        vec![
            ("app.db".to_owned(), Level::Debug),
            ("ext".to_owned(), Level::Error),
        ],
    );
    Pipeline::builder(Renderer::new(LogFormat::KeyValue, false))
        .processor(ModuleFilter::new(levels))
        .sink(sink)
        .build()
}

fn record(logger: &str, level: Level, event: &str) -> LogRecord {
    LogRecord::new(logger, level, event, AttributeMap::new())
}

#[test]
fn per_module_filtering_matches_the_documented_scenario() {
    let sink = Arc::new(CaptureSink::new());
    let pipeline = filtered_pipeline(sink.clone());

    pipeline.dispatch(record("app.db.query", Level::Info, "info on app.db.query"));
    pipeline.dispatch(record("app.db.query", Level::Debug, "debug on app.db.query"));
    pipeline.dispatch(record("ext.http", Level::Info, "info on ext.http"));
    pipeline.dispatch(record("app.api", Level::Info, "info on app.api"));

    let seen: Vec<(String, Level)> = sink
        .records()
        .iter()
        .map(|r| (r.logger().to_owned(), r.level()))
        .collect();
    assert_eq!(
        seen,
        vec![
            ("app.db.query".to_owned(), Level::Info),
            ("app.db.query".to_owned(), Level::Debug),
            ("app.api".to_owned(), Level::Info),
        ]
    );
}

#[test]
fn records_from_one_logger_stay_in_emission_order() {
    let sink = Arc::new(CaptureSink::new());
    let pipeline = filtered_pipeline(sink.clone());
    for n in 0..20 {
        pipeline.dispatch(record("app.api", Level::Info, &format!("event {}", n)));
    }
    let sequences: Vec<u64> = sink.records().iter().map(|r| r.sequence()).collect();
    let mut sorted = sequences.clone();
    sorted.sort_unstable();
    assert_eq!(sequences, sorted);
}

#[test]
fn scoped_context_reaches_the_sink_and_unwinds() {
    let sink = Arc::new(CaptureSink::new());
    let pipeline = Pipeline::builder(Renderer::new(LogFormat::KeyValue, false))
        .processor(ContextMergeProcessor::new())
        .sink(sink.clone())
        .build();

    context::with_context(attrs! { "request_id" => "r-1" }, || {
        pipeline.dispatch(record("app", Level::Info, "inside"));
    });
    pipeline.dispatch(record("app", Level::Info, "outside"));

    let records = sink.records();
    assert_eq!(
        records[0]
            .attributes()
            .get("request_id")
            .and_then(Value::as_str),
        Some("r-1")
    );
    assert!(records[1].attributes().get("request_id").is_none());
}

#[test]
fn trace_context_is_injected_and_rendered() {
    let sink = Arc::new(CaptureSink::new());
    let pipeline = Pipeline::builder(Renderer::new(LogFormat::Json, false))
        .processor(TraceContextProcessor::new())
        .sink(sink.clone())
        .build();

    let _trace = context::push_trace("trace-77", Some("span-3".to_owned()));
    pipeline.dispatch(record("app", Level::Info, "traced"));

    let rendered = sink.rendered();
    let parsed: serde_json::Value = serde_json::from_str(&rendered[0]).unwrap();
    assert_eq!(parsed["trace_id"], "trace-77");
    assert_eq!(parsed["span_id"], "span-3");
}

#[test]
fn json_rendering_round_trips_level_logger_event_and_attributes() {
    let sink = Arc::new(CaptureSink::new());
    let pipeline = Pipeline::builder(Renderer::new(LogFormat::Json, false))
        .sink(sink.clone())
        .build();

    pipeline.dispatch(LogRecord::new(
        "app.db",
        Level::Warning,
        "slow query",
        attrs! {
            "table" => "users",
            "rows" => 42u64,
            "elapsed" => 1.5,
            "cached" => false,
            "shards" => Value::List(vec![Value::Uint(1), Value::Uint(3)]),
        },
    ));

    let parsed: serde_json::Value = serde_json::from_str(&sink.rendered()[0]).unwrap();
    assert_eq!(parsed["level"], "WARNING");
    assert_eq!(parsed["logger"], "app.db");
    assert_eq!(parsed["event"], "slow query");
    assert_eq!(parsed["table"], "users");
    assert_eq!(parsed["rows"], 42);
    assert_eq!(parsed["elapsed"], 1.5);
    assert_eq!(parsed["cached"], false);
    assert_eq!(parsed["shards"], serde_json::json!([1, 3]));
}

#[test]
fn redaction_applies_before_rendering() {
    let sink = Arc::new(CaptureSink::new());
    let pipeline = Pipeline::builder(Renderer::new(LogFormat::KeyValue, false))
        .processor(RedactionProcessor::new(RedactionPolicy::standard()))
        .sink(sink.clone())
        .build();

    pipeline.dispatch(LogRecord::new(
        "app.auth",
        Level::Info,
        "login",
        attrs! { "password" => "hunter2", "user" => "ada" },
    ));

    let line = sink.rendered()[0].clone();
    assert!(!line.contains("hunter2"));
    assert!(line.contains("password=\"[REDACTED]\"") || line.contains("password=[REDACTED]"));
    assert!(line.contains("user=ada"));
}
