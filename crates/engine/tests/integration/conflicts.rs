use fixup_engine::{Intent, Mode, Script, TaskState};
use fixup_primitives::{Position, TextChange, TextRange};
use pretty_assertions::assert_eq;

use crate::common::Harness;

const CALL: &str = "let v = foo();\n";

fn call_range() -> TextRange {
	TextRange::from_coords(0, 8, 0, 13)
}

#[tokio::test(start_paused = true)]
async fn test_conflicting_user_edit_triggers_regeneration() {
	let mut harness = Harness::new(CALL, vec![Script::cumulative(["foo(x)"]), Script::cumulative(["foo(y)"])]);
	let id = harness.create(call_range(), Intent::Edit, Mode::Replace).await;

	harness.user_edit(TextChange::insert(Position::new(0, 12), "y"));
	assert_eq!(harness.snapshot(id).selection_range, TextRange::from_coords(0, 8, 0, 14));
	harness.controller.run_until_settled().await;

	let states = harness.states(id);
	let applying = states.iter().position(|state| *state == TaskState::Applying).unwrap();
	assert_eq!(states[applying + 1], TaskState::Working);
	assert_eq!(states.last(), Some(&TaskState::Applied));

	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.spin_count, 2);
	assert_eq!(snapshot.replacement.as_deref(), Some("foo(y)"));
	assert_eq!(harness.text(), "let v = foo(y);\n");
	assert_eq!(harness.transport.submissions(), 2);
	assert_eq!(harness.transport.requests()[1].attempt, 2);
}

#[tokio::test(start_paused = true)]
async fn test_regeneration_gives_up_after_max_spin() {
	let mut harness = Harness::new(CALL, vec![Script::cumulative(["foo(x)"])]);
	let id = harness.create(call_range(), Intent::Edit, Mode::Replace).await;

	harness.user_edit(TextChange::insert(Position::new(0, 12), "y"));
	harness.controller.run_until_settled().await;

	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.state, TaskState::Error);
	assert_eq!(snapshot.spin_count, 5);
	assert_eq!(snapshot.error.as_deref(), Some("tried 5 times but failed to edit the file"));
	assert_eq!(harness.transport.submissions(), 5);
	assert_eq!(harness.text(), "let v = foo(y);\n");
}

#[tokio::test(start_paused = true)]
async fn test_disjoint_user_edit_is_rebased() {
	let source = "let v = foo();\nlet w = bar();\n";
	let mut harness = Harness::new(source, vec![Script::cumulative(["let v = foo(x);\nlet w = bar();"])]);
	let id = harness.create(TextRange::from_coords(0, 0, 1, 14), Intent::Edit, Mode::Replace).await;

	harness.user_edit(TextChange::insert(Position::new(1, 12), "1"));
	harness.controller.run_until_settled().await;

	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.state, TaskState::Applied);
	assert_eq!(snapshot.spin_count, 1);
	assert_eq!(snapshot.diff_clean, Some(true));
	assert_eq!(harness.text(), "let v = foo(x);\nlet w = bar(1);\n");
}

#[tokio::test(start_paused = true)]
async fn test_user_edit_matching_the_proposal_is_not_a_conflict() {
	let mut harness = Harness::new(CALL, vec![Script::cumulative(["foo(x)"])]);
	let id = harness.create(call_range(), Intent::Edit, Mode::Replace).await;

	harness.user_edit(TextChange::insert(Position::new(0, 12), "x"));
	harness.controller.run_until_settled().await;

	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.state, TaskState::Applied);
	assert_eq!(snapshot.spin_count, 1);
	assert_eq!(harness.text(), "let v = foo(x);\n");
	assert!(harness.host.applied().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_edit_outside_range_does_not_mark_task() {
	let mut harness = Harness::new("// header\nlet v = foo();\n", vec![Script::cumulative(["foo(x)"])]);
	let id = harness.create(TextRange::from_coords(1, 8, 1, 13), Intent::Edit, Mode::Replace).await;

	harness.user_edit(TextChange::insert(Position::new(0, 9), "!"));
	harness.controller.run_until_settled().await;

	assert_eq!(harness.snapshot(id).spin_count, 1);
	assert_eq!(harness.text(), "// header!\nlet v = foo(x);\n");
}
