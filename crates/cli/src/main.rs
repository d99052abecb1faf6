//! `fixup-replay`: drives one fixup task against a file from a recorded
//! model transcript and prints the resulting text.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use fixup_engine::{FixupConfig, FixupController, MemoryHost, ScriptedTransport, TaskNotification, TaskOptions};
use tracing::{debug, info, warn};

mod transcript;

use transcript::Transcript;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "fixup-replay")]
#[command(about = "Replay a model transcript against a file through the fixup engine")]
struct Args {
	/// File the transcript edits
	#[arg(short, long, value_name = "PATH")]
	file: PathBuf,

	/// Transcript JSON
	#[arg(short, long, value_name = "PATH")]
	transcript: PathBuf,

	/// Engine configuration (TOML)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Write the result back to the file instead of printing it
	#[arg(short, long)]
	write: bool,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	setup_tracing(args.verbose);

	let config = match &args.config {
		Some(path) => FixupConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
		None => FixupConfig::default(),
	};
	let text = std::fs::read_to_string(&args.file).with_context(|| format!("reading {}", args.file.display()))?;
	let transcript = Transcript::load(&args.transcript)?;
	let uri = format!("file://{}", args.file.display());

	let host = Arc::new(MemoryHost::new());
	host.open(uri.clone(), &text);
	let transport = Arc::new(ScriptedTransport::new(vec![transcript.script()]));
	let mut controller = FixupController::new(config, host.clone(), transport.clone())?;
	let mut notifications = controller.subscribe();

	info!(file = %args.file.display(), chunks = transcript.chunks.len(), "fixup.replay.start");
	let id = controller
		.create_task(uri.clone(), transcript.instruction.clone(), transcript.range, transcript.intent, transcript.mode, TaskOptions::default())
		.await?
		.context("an identical task is already running")?;
	controller.run_until_settled().await;

	while let Ok(notification) = notifications.try_recv() {
		match notification {
			TaskNotification::StateChanged(snapshot) => debug!(task = %snapshot.id, state = %snapshot.state, spin = snapshot.spin_count, "fixup.replay.state"),
			TaskNotification::Warning { id, message } => warn!(task = %id, %message, "fixup.replay.warning"),
			TaskNotification::Deleted(id) => debug!(task = %id, "fixup.replay.deleted"),
		}
	}

	let result = host.text(&uri).context("document was closed during replay")?;
	if args.write {
		std::fs::write(&args.file, &result).with_context(|| format!("writing {}", args.file.display()))?;
	} else {
		print!("{result}");
	}

	match controller.task(id) {
		Some(snapshot) => {
			eprintln!("{id}: {} after {} submission(s)", snapshot.state, transport.submissions());
			if let Some(error) = snapshot.error {
				eprintln!("{id}: {error}");
			}
		}
		None => eprintln!("{id}: finished"),
	}
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_default_env().unwrap_or_else(|_| {
			if verbose {
				EnvFilter::new("fixup=debug,info")
			} else {
				EnvFilter::new("fixup=info,warn")
			}
		})
	};

	if let Some(log_dir) = std::env::var("FIXUP_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("fixup-replay.{}.log", std::process::id()));
		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer().with_writer(file).with_ansi(false).with_target(true);
			tracing_subscriber::registry().with(filter()).with(file_layer).init();
			tracing::info!(path = ?log_path, "fixup.replay.log_file");
			return;
		}
	}

	tracing_subscriber::fmt().with_env_filter(filter()).with_writer(std::io::stderr).init();
}
