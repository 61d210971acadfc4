mod common;

use std::sync::Mutex;
use std::time::Duration;

use common::{action_url, page, posts, run, runs_url, settings, workspace, workspaces_url};
use lizzy::http::{HttpMethod, HttpResponse};
use lizzy::terraform::{self, CancelOutcome, CancelReport, TerraformClient};
use lizzy::test_support::ScriptedTransport;

fn single_workspace(platform: &ScriptedTransport, id: &str, name: &str, runs: Vec<serde_json::Value>) {
    platform.respond(
        HttpMethod::Get,
        &workspaces_url(),
        page(vec![workspace(id, name)], None),
    );
    platform.respond(HttpMethod::Get, &runs_url(id), page(runs, None));
}

#[test]
fn planned_run_is_discarded_without_cancel() {
    let platform = ScriptedTransport::new();
    single_workspace(&platform, "ws-id-1", "ws-1", vec![run("run-42", "planned")]);
    platform.respond(
        HttpMethod::Post,
        &action_url("run-42", "discard"),
        HttpResponse::new(200, ""),
    );

    let settings = settings();
    let client = TerraformClient::new(&platform, &settings);
    let lines = Mutex::new(Vec::new());
    let outcome = terraform::discard_plans(&client, &|report: &CancelReport| {
        lines.lock().unwrap().extend(report.lines());
    })
    .unwrap();

    assert_eq!(platform.count(HttpMethod::Post, &action_url("run-42", "discard")), 1);
    assert_eq!(platform.count(HttpMethod::Post, &action_url("run-42", "cancel")), 0);
    assert_eq!(outcome.summary.succeeded, 1);
    assert!(!outcome.summary.has_failures());
    assert_eq!(
        lines.into_inner().unwrap(),
        vec!["✅ Successfully discarded run run-42 (Status: planned)".to_string()]
    );
}

#[test]
fn conflicting_cancel_reports_inspect_link() {
    let platform = ScriptedTransport::new();
    single_workspace(&platform, "ws-id-2", "ws-2", vec![run("run-7", "planning")]);
    platform.respond(
        HttpMethod::Post,
        &action_url("run-7", "cancel"),
        HttpResponse::new(409, ""),
    );

    let settings = settings();
    let client = TerraformClient::new(&platform, &settings);
    let lines = Mutex::new(Vec::new());
    let outcome = terraform::discard_plans(&client, &|report: &CancelReport| {
        lines.lock().unwrap().extend(report.lines());
    })
    .unwrap();

    assert_eq!(platform.count(HttpMethod::Post, &action_url("run-7", "cancel")), 1);
    assert_eq!(platform.count(HttpMethod::Post, &action_url("run-7", "discard")), 0);
    assert_eq!(outcome.summary.already_terminal, 1);

    let lines = lines.into_inner().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("run-7 cannot be cancelled in current state (Status: planning)"));
    assert!(lines[0].ends_with("https://tfc.test/app/acme/workspaces/ws-2/runs/run-7"));
}

#[test]
fn terminal_runs_are_never_touched() {
    let platform = ScriptedTransport::new();
    single_workspace(
        &platform,
        "ws-id-1",
        "ws-1",
        vec![
            run("run-1", "applied"),
            run("run-2", "pending"),
            run("run-3", "discarded"),
            run("run-4", "errored"),
            run("run-5", "canceled"),
            run("run-6", "planned_and_finished"),
        ],
    );
    platform.respond(
        HttpMethod::Post,
        &action_url("run-2", "cancel"),
        HttpResponse::new(202, ""),
    );

    let settings = settings();
    let client = TerraformClient::new(&platform, &settings);
    let outcome = terraform::discard_plans(&client, &|_: &CancelReport| {}).unwrap();

    assert_eq!(outcome.summary.total, 1);
    assert_eq!(outcome.summary.reports[0].run_id, "run-2");
    assert_eq!(
        outcome.summary.reports[0].outcome,
        CancelOutcome::Success {
            action: terraform::RunAction::Cancel,
            accepted: true
        }
    );
    assert_eq!(posts(&platform), 1);
}

#[test]
fn twenty_five_runs_across_workspaces_are_all_attempted() {
    let platform = ScriptedTransport::new();
    let workspaces: Vec<_> = (0..5)
        .map(|w| workspace(&format!("ws-id-{}", w), &format!("ws-{}", w)))
        .collect();
    platform.respond(HttpMethod::Get, &workspaces_url(), page(workspaces, None));

    for w in 0..5 {
        let runs = (0..5).map(|r| run(&format!("run-{}-{}", w, r), "planning")).collect();
        platform.respond(HttpMethod::Get, &runs_url(&format!("ws-id-{}", w)), page(runs, None));
        for r in 0..5 {
            // Mix outcomes: failures must not stop the rest.
            let status = match r {
                0 => 500,
                1 => 409,
                _ => 200,
            };
            platform.respond(
                HttpMethod::Post,
                &action_url(&format!("run-{}-{}", w, r), "cancel"),
                HttpResponse::new(status, ""),
            );
        }
    }

    let settings = settings();
    let client = TerraformClient::new(&platform, &settings);
    let reported = Mutex::new(0usize);
    let outcome = terraform::discard_plans(&client, &|_: &CancelReport| {
        *reported.lock().unwrap() += 1;
    })
    .unwrap();

    assert_eq!(posts(&platform), 25);
    assert_eq!(reported.into_inner().unwrap(), 25);
    assert_eq!(outcome.summary.total, 25);
    assert_eq!(outcome.summary.failed, 5);
    assert_eq!(outcome.summary.already_terminal, 5);
    assert_eq!(outcome.summary.succeeded, 15);
    assert!(outcome.summary.has_failures());
}

#[test]
fn rate_limited_workspace_retries_then_continues() {
    let platform = ScriptedTransport::new();
    platform.respond(
        HttpMethod::Get,
        &workspaces_url(),
        page(vec![workspace("ws-id-1", "ws-1")], None),
    );
    platform.respond(
        HttpMethod::Get,
        &runs_url("ws-id-1"),
        HttpResponse::new(429, "").with_header("Retry-After", "2"),
    );
    platform.respond(HttpMethod::Get, &runs_url("ws-id-1"), HttpResponse::new(429, ""));
    platform.respond(
        HttpMethod::Get,
        &runs_url("ws-id-1"),
        page(vec![run("run-9", "applying")], None),
    );
    platform.respond(
        HttpMethod::Post,
        &action_url("run-9", "cancel"),
        HttpResponse::new(200, ""),
    );

    let settings = settings();
    let client = TerraformClient::new(&platform, &settings);
    let outcome = terraform::discard_plans(&client, &|_: &CancelReport| {}).unwrap();

    assert_eq!(platform.count(HttpMethod::Get, &runs_url("ws-id-1")), 3);
    assert_eq!(
        platform.pauses(),
        vec![Duration::from_secs(2), Duration::from_secs(20)]
    );
    assert_eq!(outcome.summary.succeeded, 1);
    assert!(outcome.warnings.is_empty());
}

#[test]
fn failing_listing_becomes_a_warning() {
    let platform = ScriptedTransport::new();
    platform.respond(
        HttpMethod::Get,
        &workspaces_url(),
        page(
            vec![workspace("ws-id-1", "broken"), workspace("ws-id-2", "healthy")],
            None,
        ),
    );
    platform.respond(HttpMethod::Get, &runs_url("ws-id-1"), HttpResponse::new(503, "down"));
    platform.respond(
        HttpMethod::Get,
        &runs_url("ws-id-2"),
        page(vec![run("run-1", "pending")], None),
    );
    platform.respond(
        HttpMethod::Post,
        &action_url("run-1", "cancel"),
        HttpResponse::new(200, ""),
    );

    let settings = settings();
    let client = TerraformClient::new(&platform, &settings);
    let outcome = terraform::discard_plans(&client, &|_: &CancelReport| {}).unwrap();

    assert_eq!(outcome.summary.total, 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].code, "api.request_failed");
    assert_eq!(outcome.warnings[0].details["workspace"], "broken");
}

#[test]
fn transport_failure_surfaces_after_pool_drains() {
    let platform = ScriptedTransport::new();
    single_workspace(
        &platform,
        "ws-id-1",
        "ws-1",
        vec![run("run-a", "pending"), run("run-b", "pending")],
    );
    platform.fail(
        HttpMethod::Post,
        &action_url("run-a", "cancel"),
        "connection reset by peer",
    );
    platform.respond(
        HttpMethod::Post,
        &action_url("run-b", "cancel"),
        HttpResponse::new(200, ""),
    );

    let settings = settings();
    let client = TerraformClient::new(&platform, &settings);
    let err = terraform::discard_plans(&client, &|_: &CancelReport| {}).unwrap_err();

    assert_eq!(err.code.as_str(), "api.transport_failed");
    assert_eq!(err.code.exit_code(), 20);
    assert_eq!(platform.count(HttpMethod::Post, &action_url("run-b", "cancel")), 1);
    assert_eq!(err.details["failedUnits"], 1);
    assert_eq!(err.details["completedUnits"], 1);
}
