use std::sync::Arc;

use fixup_engine::{FixupError, Guardrails, Intent, Mode, Script, TaskNotification, TaskOptions, TaskState};
use fixup_primitives::{Position, TextChange, TextRange};
use pretty_assertions::assert_eq;

use crate::common::{Harness, URI};

const SOURCE: &str = "fn main() {\n    foo();\n}\n";

fn foo_range() -> TextRange {
	TextRange::from_coords(1, 4, 1, 9)
}

#[tokio::test(start_paused = true)]
async fn test_foo_streams_to_applied() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["f", "foo", "foo(x)"])]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.controller.run_until_settled().await;

	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.state, TaskState::Applied);
	assert_eq!(snapshot.replacement.as_deref(), Some("foo(x)"));
	assert_eq!(snapshot.in_progress_replacement, None);
	assert_eq!(snapshot.spin_count, 1);
	assert_eq!(snapshot.diff_clean, Some(true));
	assert_eq!(snapshot.selection_range, TextRange::from_coords(1, 4, 1, 10));
	assert_eq!(snapshot.original_range, foo_range());
	assert_eq!(harness.text(), "fn main() {\n    foo(x);\n}\n");
	assert_eq!(
		harness.states(id),
		vec![TaskState::Pending, TaskState::Working, TaskState::Applying, TaskState::Formatting, TaskState::Applied]
	);
}

#[tokio::test(start_paused = true)]
async fn test_accept_discards() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["foo(x)"])]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.controller.run_until_settled().await;

	harness.controller.accept(id).unwrap();
	assert_eq!(harness.state(id), None);
	assert!(harness.was_deleted(id));
	assert_eq!(harness.text(), "fn main() {\n    foo(x);\n}\n");
}

#[tokio::test(start_paused = true)]
async fn test_accept_requires_applied() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["foo(x)"]).hang()]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;

	let err = harness.controller.accept(id).unwrap_err();
	assert!(matches!(
		err,
		FixupError::InvalidOperation {
			operation: "accept",
			state: TaskState::Working,
			..
		}
	));
	assert!(matches!(harness.controller.undo(id).await, Err(FixupError::InvalidOperation { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_undo_restores_original() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["foo(x, y)"])]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.controller.run_until_settled().await;
	assert_eq!(harness.text(), "fn main() {\n    foo(x, y);\n}\n");

	harness.controller.undo(id).await.unwrap();
	assert_eq!(harness.text(), SOURCE);
	assert!(harness.was_deleted(id));
}

#[tokio::test(start_paused = true)]
async fn test_retry_undoes_and_resubmits() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["foo(x)"]), Script::cumulative(["foo(x: u8)"])]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.controller.run_until_settled().await;

	harness.controller.retry(id, Some(String::from("type the parameter"))).await.unwrap();
	harness.controller.run_until_settled().await;

	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.state, TaskState::Applied);
	assert_eq!(snapshot.spin_count, 2);
	assert_eq!(snapshot.instruction, "type the parameter");
	assert_eq!(harness.text(), "fn main() {\n    foo(x: u8);\n}\n");

	let requests = harness.transport.requests();
	assert_eq!(requests.len(), 2);
	assert_eq!(requests[1].attempt, 2);
	assert_eq!(requests[1].original_text, "foo()");
	assert_eq!(requests[1].instruction, "type the parameter");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_streaming() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["foo("]).hang()]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;

	harness.controller.cancel(id).unwrap();
	assert_eq!(harness.state(id), None);
	assert!(harness.was_deleted(id));
	assert!(matches!(harness.controller.cancel(id), Err(FixupError::UnknownTask(_))));
	harness.controller.run_until_settled().await;
	assert_eq!(harness.text(), SOURCE);
}

#[tokio::test(start_paused = true)]
async fn test_user_edit_on_applied_task_accepts_it() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["foo(x)"])]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.controller.run_until_settled().await;

	harness.user_edit(TextChange::insert(Position::new(1, 8), "1"));
	assert_eq!(harness.state(id), None);
	assert!(harness.was_deleted(id));
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_user_edit_keeps_applied_task() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["foo(x)"])]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.controller.run_until_settled().await;

	harness.user_edit(TextChange::insert(Position::new(0, 0), "// entry\n"));
	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.state, TaskState::Applied);
	assert_eq!(snapshot.selection_range, TextRange::from_coords(2, 4, 2, 10));
}

struct Veto;

impl Guardrails for Veto {
	fn can_apply(&self, _original: &str, proposed: &str) -> bool {
		!proposed.contains("secret")
	}
}

#[tokio::test(start_paused = true)]
async fn test_guardrail_veto_cancels() {
	let mut harness = Harness::with_guardrails(SOURCE, vec![Script::cumulative(["foo(secret)"])], Arc::new(Veto));
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.controller.run_until_settled().await;

	assert_eq!(harness.state(id), None);
	assert!(harness.was_deleted(id));
	assert!(!harness.states(id).contains(&TaskState::Error));
	assert_eq!(harness.text(), SOURCE);
	assert_eq!(harness.transport.submissions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_network_error_uses_generic_message() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["fo"]).fail(fixup_engine::TransportError::network("connection reset by peer"))]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.controller.run_until_settled().await;

	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.state, TaskState::Error);
	assert_eq!(snapshot.error.as_deref(), Some(harness.controller.config().network_error_message.as_str()));

	harness.controller.cancel(id).unwrap();
	assert!(harness.was_deleted(id));
}

#[tokio::test(start_paused = true)]
async fn test_model_error_keeps_message() {
	let mut harness = Harness::new(SOURCE, vec![Script::new().fail(fixup_engine::TransportError::model("context window exceeded"))]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.controller.run_until_settled().await;
	assert_eq!(harness.snapshot(id).error.as_deref(), Some("context window exceeded"));
}

#[tokio::test(start_paused = true)]
async fn test_host_rejection_warns_and_fails() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["foo(x)"])]);
	harness.host.set_reject_edits(true);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.controller.run_until_settled().await;

	assert_eq!(harness.snapshot(id).state, TaskState::Error);
	assert_eq!(harness.controller.application_failures(), 1);
	assert!(
		harness
			.notifications()
			.iter()
			.any(|notification| matches!(notification, TaskNotification::Warning { id: warned, .. } if *warned == id))
	);
	assert_eq!(harness.transport.submissions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_task_is_rejected() {
	let mut harness = Harness::new(SOURCE, vec![Script::new().hang()]);
	let first = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;

	let duplicate = harness
		.controller
		.create_task(URI, "make it better", foo_range(), Intent::Edit, Mode::Replace, TaskOptions::default())
		.await
		.unwrap();
	assert_eq!(duplicate, None);
	assert_eq!(harness.state(first), Some(TaskState::Working));

	let other = harness
		.controller
		.create_task(URI, "something else", foo_range(), Intent::Edit, Mode::Replace, TaskOptions::default())
		.await
		.unwrap();
	assert!(other.is_some());
	assert_eq!(harness.controller.tasks_for_file(URI).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_formatter_edits_inside_range_only() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["foo( x )"])]);
	harness.host.set_formatter(Arc::new(|_: &str, _: TextRange| {
		vec![
			TextChange::new(TextRange::from_coords(1, 8, 1, 11), "x"),
			TextChange::insert(Position::new(0, 0), "// formatted\n"),
		]
	}));
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.controller.run_until_settled().await;

	assert_eq!(harness.text(), "fn main() {\n    foo(x);\n}\n");
	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.state, TaskState::Applied);
	assert!(!snapshot.formatting_pending);
}

#[tokio::test(start_paused = true)]
async fn test_skip_formatting_ignores_late_result() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["foo( x )"])]);
	harness
		.host
		.set_formatter(Arc::new(|_: &str, _: TextRange| vec![TextChange::new(TextRange::from_coords(1, 8, 1, 11), "x")]));
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.step_until(id, TaskState::Formatting).await;
	assert!(harness.snapshot(id).formatting_pending);

	harness.controller.skip_formatting(id).unwrap();
	assert_eq!(harness.state(id), Some(TaskState::Applied));
	harness.controller.step().await;

	assert_eq!(harness.text(), "fn main() {\n    foo( x );\n}\n");
	assert_eq!(harness.state(id), Some(TaskState::Applied));
	assert!(matches!(harness.controller.skip_formatting(id), Err(FixupError::InvalidOperation { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_save_accepts_applied_tasks() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["foo(x)"])]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;
	harness.controller.run_until_settled().await;

	harness.controller.document_saved("file:///other.rs");
	assert_eq!(harness.state(id), Some(TaskState::Applied));
	harness.controller.document_saved(URI);
	assert_eq!(harness.state(id), None);
}

#[tokio::test(start_paused = true)]
async fn test_rename_and_delete_follow_file() {
	let mut harness = Harness::new(SOURCE, vec![Script::new().hang()]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;

	harness.controller.file_renamed(URI, "file:///src/main.rs");
	assert!(harness.controller.tasks_for_file(URI).is_empty());
	assert_eq!(harness.controller.tasks_for_file("file:///src/main.rs")[0].id, id);

	harness.controller.file_deleted("file:///src/main.rs");
	assert_eq!(harness.state(id), None);
}

#[tokio::test(start_paused = true)]
async fn test_destination_task_waits_then_appends() {
	let mut harness = Harness::new(SOURCE, vec![Script::cumulative(["#[test]\nfn runs() {}\n"])]);
	let destination = "file:///tests/main_test.rs";
	harness.host.open(destination, "use super::*;\n");
	let id = harness
		.controller
		.create_task(
			URI,
			"write a test",
			foo_range(),
			Intent::Test,
			Mode::Replace,
			TaskOptions {
				destination: Some(destination.into()),
				prefetch_key: None,
			},
		)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(harness.state(id), Some(TaskState::Pending));
	assert_eq!(harness.transport.submissions(), 0);

	harness.controller.resolve_destination(id, destination).await.unwrap();
	harness.controller.run_until_settled().await;

	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.state, TaskState::Applied);
	assert_eq!(snapshot.uri, destination);
	assert_eq!(snapshot.original_text, "");
	assert_eq!(harness.host.text(destination).unwrap(), "use super::*;\n#[test]\nfn runs() {}\n");
	assert_eq!(harness.text(), SOURCE);
}

#[tokio::test(start_paused = true)]
async fn test_point_selection_expands_to_block() {
	let source = "fn main() {\n    let a = 1;\n    let b = 2;\n}\n";
	let mut harness = Harness::new(source, vec![Script::new().hang()]);
	let id = harness.create(TextRange::point(Position::new(2, 3)), Intent::Edit, Mode::Replace).await;

	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.original_range, TextRange::from_coords(0, 0, 2, 14));
	assert_eq!(snapshot.original_text, "fn main() {\n    let a = 1;\n    let b = 2;");
}

#[tokio::test(start_paused = true)]
async fn test_blank_line_selection_becomes_insertion() {
	let source = "fn main() {\n\n}\n";
	let mut harness = Harness::new(source, vec![Script::new().hang()]);
	let id = harness.create(TextRange::point(Position::new(1, 0)), Intent::Doc, Mode::Replace).await;

	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.intent, Intent::Add);
	assert_eq!(snapshot.mode, Mode::Insert);
	assert_eq!(snapshot.original_text, "");
}

#[tokio::test(start_paused = true)]
async fn test_nearest_task_by_boundary_distance() {
	let source = "a\nb\nc\nd\ne\nf\n";
	let mut harness = Harness::new(source, vec![Script::new().hang()]);
	let top = harness.create(TextRange::from_coords(0, 0, 0, 1), Intent::Test, Mode::Replace).await;
	let bottom = harness.create(TextRange::from_coords(5, 0, 5, 1), Intent::Test, Mode::Replace).await;

	let working = [TaskState::Working];
	assert_eq!(harness.controller.nearest_task(URI, Position::new(1, 0), &working), Some(top));
	assert_eq!(harness.controller.nearest_task(URI, Position::new(4, 0), &working), Some(bottom));
	assert_eq!(harness.controller.nearest_task(URI, Position::new(5, 1), &working), Some(bottom));
	assert_eq!(harness.controller.nearest_task(URI, Position::new(1, 0), &[TaskState::Applied]), None);
}

#[tokio::test(start_paused = true)]
async fn test_error_injection() {
	let mut harness = Harness::new(SOURCE, vec![Script::new().hang()]);
	let id = harness.create(foo_range(), Intent::Edit, Mode::Replace).await;

	harness.controller.error(id, "editor closed").unwrap();
	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.state, TaskState::Error);
	assert_eq!(snapshot.error.as_deref(), Some("editor closed"));
	assert!(matches!(harness.controller.accept(id), Err(FixupError::InvalidOperation { .. })));
}
