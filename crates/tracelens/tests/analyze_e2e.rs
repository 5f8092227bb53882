use std::process::Command;

fn export_fixture() -> serde_json::Value {
    let span = |span_id: &str, parent: Option<&str>, kind: &str, url: &str, start: u64, end: u64| {
        let mut s = serde_json::json!({
            "traceId": "trace-1",
            "spanId": span_id,
            "name": format!("GET {url}"),
            "kind": kind,
            "startTimeUnixNano": start.to_string(),
            "endTimeUnixNano": end.to_string(),
            "attributes": [
                {"key": "http.method", "value": {"stringValue": "GET"}},
                {"key": "http.url", "value": {"stringValue": url}}
            ]
        });
        if let Some(parent) = parent {
            s["parentSpanId"] = serde_json::json!(parent);
        }
        s
    };

    serde_json::json!({
        "batches": [
            {
                "resource": {"attributes": [
                    {"key": "service.name", "value": {"stringValue": "api"}}
                ]},
                "instrumentationLibrarySpans": [{"spans": [
                    span("root", None, "SPAN_KIND_SERVER", "/entry", 0, 150_000_000),
                    span("c1", Some("root"), "SPAN_KIND_CLIENT",
                         "http://items.svc/items/1", 10_000_000, 110_000_000),
                    span("c2", Some("root"), "SPAN_KIND_CLIENT",
                         "http://items.svc/items/2", 30_000_000, 110_000_000),
                ]}]
            },
            {
                "resource": {"attributes": [
                    {"key": "service.name", "value": {"stringValue": "items"}}
                ]},
                "instrumentationLibrarySpans": [{"spans": [
                    span("s1", Some("c1"), "SPAN_KIND_SERVER", "/items/1",
                         15_000_000, 100_000_000),
                    span("s2", Some("c2"), "SPAN_KIND_SERVER", "/items/2",
                         35_000_000, 100_000_000),
                ]}]
            }
        ]
    })
}

fn tracelens() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tracelens"))
}

#[test]
fn analyze_writes_a_markdown_report() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("trace.json");
    let report = dir.path().join("report.md");
    std::fs::write(&input, serde_json::to_vec(&export_fixture()).unwrap()).unwrap();

    let status = tracelens()
        .arg("analyze")
        .arg(&input)
        .arg("-o")
        .arg(&report)
        .status()
        .unwrap();
    assert!(status.success());

    let md = std::fs::read_to_string(&report).unwrap();
    assert!(md.starts_with("# Trace Endpoint Analysis Report"));
    assert!(md.contains("## api"));
    assert!(md.contains("## items"));
    assert!(md.contains("GET /items/{id}"));
    assert!(md.contains("## api → items"));
}

#[test]
fn analyze_json_emits_aggregated_tables() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("trace.json");
    std::fs::write(&input, serde_json::to_vec(&export_fixture()).unwrap()).unwrap();

    let out = tracelens()
        .arg("analyze")
        .arg(&input)
        .arg("--json")
        .output()
        .unwrap();
    assert!(out.status.success());

    let result: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(result["summary"]["traces"], 1);
    assert_eq!(result["summary"]["spans"], 5);

    let endpoints = result["endpoints"].as_array().unwrap();
    let items = endpoints
        .iter()
        .find(|e| e["service"] == "items")
        .expect("items endpoint");
    assert_eq!(items["endpoint"], "/items/{id}");
    assert_eq!(items["count"], 2);

    let calls = result["service_calls"].as_array().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["callee"], "items");
    assert_eq!(calls[0]["count"], 2);
}

#[test]
fn share_round_trip_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("trace.json");
    std::fs::write(&input, serde_json::to_vec(&export_fixture()).unwrap()).unwrap();
    let share_dir = dir.path().join("shares");

    let out = tracelens()
        .arg("analyze")
        .arg(&input)
        .arg("--json")
        .arg("--share")
        .arg("7d")
        .env("TRACELENS_SHARE_DIR", &share_dir)
        .output()
        .unwrap();
    assert!(out.status.success());

    let stdout = String::from_utf8(out.stdout).unwrap();
    let share_line = stdout
        .lines()
        .find(|l| l.starts_with("Share created: "))
        .expect("share id line");
    let share_id = share_line
        .trim_start_matches("Share created: ")
        .split_whitespace()
        .next()
        .unwrap();
    assert_eq!(share_id.len(), 8);

    let out = tracelens()
        .arg("shares")
        .arg("show")
        .arg(share_id)
        .env("TRACELENS_SHARE_DIR", &share_dir)
        .output()
        .unwrap();
    assert!(out.status.success());
    let payload: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(payload["summary"]["traces"], 1);

    let out = tracelens()
        .arg("shares")
        .arg("list")
        .env("TRACELENS_SHARE_DIR", &share_dir)
        .output()
        .unwrap();
    assert!(String::from_utf8(out.stdout).unwrap().contains(share_id));
}

#[test]
fn analyze_fails_on_missing_file() {
    let status = tracelens()
        .arg("analyze")
        .arg("/definitely/not/here.json")
        .arg("--json")
        .status()
        .unwrap();
    assert!(!status.success());
}
