use fixup_engine::{CompletionRequest, FixupConfig, Intent, Mode, PrefetchKey, Script, TaskId, TaskNotification, TaskOptions, TaskState};
use fixup_primitives::{Position, TextChange, TextRange};
use pretty_assertions::assert_eq;

use crate::common::{Harness, URI};

const BODY: &str = "fn main() {\n    \n}\n";

#[tokio::test(start_paused = true)]
async fn test_insert_mode_applies_chunks_in_order() {
	let mut harness = Harness::new(
		BODY,
		vec![Script::cumulative([
			"let a = 1;\n",
			"let a = 1;\nlet b = 2;\n",
			"let a = 1;\nlet b = 2;\nlet c = 3;",
		])],
	);
	let id = harness.create(TextRange::point(Position::new(1, 4)), Intent::Add, Mode::Insert).await;
	harness.controller.run_until_settled().await;

	assert_eq!(harness.text(), "fn main() {\n    let a = 1;\n    let b = 2;\n    let c = 3;\n}\n");
	let written: Vec<String> = harness
		.host
		.applied()
		.into_iter()
		.map(|batch| {
			assert_eq!(batch.edits.len(), 1);
			batch.edits[0].text.clone()
		})
		.collect();
	assert_eq!(
		written,
		vec![
			"let a = 1;",
			"let a = 1;\n    let b = 2;",
			"let a = 1;\n    let b = 2;\n    let c = 3;",
		]
	);

	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.state, TaskState::Applied);
	assert_eq!(snapshot.selection_range, TextRange::from_coords(1, 4, 3, 14));
	assert_eq!(
		harness.states(id),
		vec![TaskState::Pending, TaskState::Working, TaskState::Inserting, TaskState::Formatting, TaskState::Applied]
	);
}

#[tokio::test(start_paused = true)]
async fn test_insert_range_follows_lines_added_above() {
	let source: String = (0..30).map(|line| format!("line {line}\n")).collect();
	let mut harness = Harness::new(&source, vec![Script::new().hang()]);
	let id = harness.create(TextRange::from_coords(10, 0, 20, 0), Intent::Add, Mode::Insert).await;
	assert_eq!(harness.state(id), Some(TaskState::Working));

	harness.user_edit(TextChange::insert(Position::new(5, 0), "a\nb\nc\n"));
	assert_eq!(harness.snapshot(id).selection_range, TextRange::from_coords(13, 0, 23, 0));
	assert_eq!(harness.snapshot(id).original_range, TextRange::from_coords(10, 0, 20, 0));
}

#[tokio::test(start_paused = true)]
async fn test_streaming_insert_keeps_anchor_when_replaced() {
	let mut harness = Harness::new("abcdef\n", vec![Script::new().hang()]);
	let id = harness.create(TextRange::from_coords(0, 2, 0, 4), Intent::Add, Mode::Insert).await;

	harness.user_edit(TextChange::new(TextRange::from_coords(0, 1, 0, 5), "XY"));
	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.selection_range, TextRange::from_coords(0, 1, 0, 3));
	assert_eq!(snapshot.state, TaskState::Error);
}

/// Starts an insertion at the blank line of `BODY` and lands its first line.
async fn streamed_insertion(harness: &mut Harness) -> TaskId {
	let id = harness.create(TextRange::point(Position::new(1, 4)), Intent::Add, Mode::Insert).await;
	harness.step_until(id, TaskState::Inserting).await;
	assert_eq!(harness.text(), "fn main() {\n    abc\n}\n");
	assert_eq!(harness.snapshot(id).selection_range, TextRange::from_coords(1, 4, 1, 7));
	id
}

fn warned(harness: &mut Harness, id: TaskId) -> bool {
	harness
		.notifications()
		.iter()
		.any(|notification| matches!(notification, TaskNotification::Warning { id: warned, .. } if *warned == id))
}

#[tokio::test(start_paused = true)]
async fn test_typing_inside_streamed_insertion_stops_task() {
	let mut harness = Harness::new(BODY, vec![Script::cumulative(["abc\n", "abc\ndef\n"])]);
	let id = streamed_insertion(&mut harness).await;

	harness.user_edit(TextChange::insert(Position::new(1, 5), "ZZ"));
	harness.controller.run_until_settled().await;

	assert_eq!(harness.text(), "fn main() {\n    aZZbc\n}\n");
	let snapshot = harness.snapshot(id);
	assert_eq!(snapshot.state, TaskState::Error);
	assert!(snapshot.error.is_some());
	assert!(warned(&mut harness, id));
	assert_eq!(harness.host.applied().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_replacing_streamed_insertion_keeps_user_text() {
	let mut harness = Harness::new(BODY, vec![Script::cumulative(["abc\n", "abc\ndef\n"])]);
	let id = streamed_insertion(&mut harness).await;

	harness.user_edit(TextChange::new(TextRange::from_coords(1, 0, 1, 7), "USER"));
	harness.controller.run_until_settled().await;

	assert_eq!(harness.text(), "fn main() {\nUSER\n}\n");
	assert_eq!(harness.state(id), Some(TaskState::Error));
	assert!(warned(&mut harness, id));
}

#[tokio::test(start_paused = true)]
async fn test_typing_at_insertion_point_before_output_is_kept() {
	let mut harness = Harness::new(BODY, vec![Script::cumulative(["let a = 1;"])]);
	let id = harness.create(TextRange::point(Position::new(1, 4)), Intent::Add, Mode::Insert).await;

	harness.user_edit(TextChange::insert(Position::new(1, 4), "// "));
	assert_eq!(harness.snapshot(id).selection_range, TextRange::point(Position::new(1, 7)));
	harness.controller.run_until_settled().await;

	assert_eq!(harness.state(id), Some(TaskState::Applied));
	assert_eq!(harness.text(), "fn main() {\n    // let a = 1;\n}\n");
	assert!(!warned(&mut harness, id));
}

#[tokio::test(start_paused = true)]
async fn test_final_insertion_drops_trailing_newline() {
	let mut harness = Harness::new(BODY, vec![Script::cumulative(["abc\n", "abc\ndef\n"])]);
	let id = harness.create(TextRange::point(Position::new(1, 4)), Intent::Add, Mode::Insert).await;
	harness.controller.run_until_settled().await;

	assert_eq!(harness.state(id), Some(TaskState::Applied));
	assert_eq!(harness.text(), "fn main() {\n    abc\n    def\n}\n");
}

#[tokio::test(start_paused = true)]
async fn test_replace_task_collapses_when_replaced() {
	let mut harness = Harness::new("abcdef\n", vec![Script::new().hang()]);
	let id = harness.create(TextRange::from_coords(0, 2, 0, 4), Intent::Edit, Mode::Replace).await;

	harness.user_edit(TextChange::new(TextRange::from_coords(0, 1, 0, 5), "XY"));
	assert_eq!(harness.snapshot(id).selection_range, TextRange::point(Position::new(0, 1)));
}

#[tokio::test(start_paused = true)]
async fn test_prefetch_is_adopted_without_new_request() {
	let mut harness = Harness::new("fn main() {\n    foo();\n}\n", vec![Script::cumulative(["foo(", "foo(x)"])]);
	let key = PrefetchKey(String::from("quick-fix-1"));
	harness.controller.prefetch(
		key.clone(),
		CompletionRequest {
			uri: URI.into(),
			instruction: "add x".into(),
			original_text: "foo()".into(),
			intent: Intent::Edit,
			mode: Mode::Replace,
			attempt: 1,
		},
	);

	let id = harness
		.controller
		.create_task(
			URI,
			"add x",
			TextRange::from_coords(1, 4, 1, 9),
			Intent::Edit,
			Mode::Replace,
			TaskOptions {
				destination: None,
				prefetch_key: Some(key),
			},
		)
		.await
		.unwrap()
		.unwrap();
	harness.controller.run_until_settled().await;

	assert_eq!(harness.transport.submissions(), 1);
	assert_eq!(harness.snapshot(id).state, TaskState::Applied);
	assert_eq!(harness.text(), "fn main() {\n    foo(x);\n}\n");
}

#[tokio::test(start_paused = true)]
async fn test_missing_prefetch_falls_back_to_request() {
	let mut harness = Harness::new("fn main() {\n    foo();\n}\n", vec![Script::cumulative(["foo(x)"])]);
	let key = PrefetchKey(String::from("never-started"));
	harness.controller.prefetch(
		key.clone(),
		CompletionRequest {
			uri: URI.into(),
			instruction: "unused".into(),
			original_text: String::new(),
			intent: Intent::Edit,
			mode: Mode::Replace,
			attempt: 1,
		},
	);
	harness.controller.abandon_prefetch(&key);

	let id = harness
		.controller
		.create_task(
			URI,
			"add x",
			TextRange::from_coords(1, 4, 1, 9),
			Intent::Edit,
			Mode::Replace,
			TaskOptions {
				destination: None,
				prefetch_key: Some(key),
			},
		)
		.await
		.unwrap()
		.unwrap();
	harness.controller.run_until_settled().await;

	assert_eq!(harness.transport.submissions(), 2);
	assert_eq!(harness.snapshot(id).state, TaskState::Applied);
}

#[tokio::test(start_paused = true)]
async fn test_session_eviction_fails_oldest_task() {
	let config = FixupConfig {
		session_capacity: 1,
		..FixupConfig::default()
	};
	let mut harness = Harness::with_config("a\nb\n", vec![Script::new().hang()], config);
	let first = harness.create(TextRange::from_coords(0, 0, 0, 1), Intent::Test, Mode::Replace).await;
	let second = harness.create(TextRange::from_coords(1, 0, 1, 1), Intent::Test, Mode::Replace).await;

	assert_eq!(harness.state(first), Some(TaskState::Error));
	assert!(harness.snapshot(first).error.is_some());
	assert_eq!(harness.state(second), Some(TaskState::Working));
}

#[tokio::test(start_paused = true)]
async fn test_tasks_in_different_files_stream_independently() {
	let mut harness = Harness::new("one()\n", vec![Script::cumulative(["one(1)"]), Script::cumulative(["two(2)"])]);
	let other = "file:///src/other.rs";
	harness.host.open(other, "two()\n");

	let first = harness.create(TextRange::from_coords(0, 0, 0, 5), Intent::Edit, Mode::Replace).await;
	let second = harness
		.controller
		.create_task(other, "make it better", TextRange::from_coords(0, 0, 0, 5), Intent::Edit, Mode::Replace, TaskOptions::default())
		.await
		.unwrap()
		.unwrap();
	harness.controller.run_until_settled().await;

	assert_eq!(harness.state(first), Some(TaskState::Applied));
	assert_eq!(harness.state(second), Some(TaskState::Applied));
	assert_eq!(harness.text(), "one(1)\n");
	assert_eq!(harness.host.text(other).unwrap(), "two(2)\n");
}
