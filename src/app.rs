use crate::commands::{self, Action, COMMANDS};
use crate::event::{Event, EventHandler};
use crate::prefetch::{GateOutcome, GatePhase};
use crate::query::PrefetchOutcome;
use crate::session::{Session, SessionStatus};
use color_eyre::Result;
use std::time::Duration;
use tokio::sync::mpsc;

/// Console application state
pub struct App {
  /// The caches and background work being driven
  session: Session,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  /// Gate phase seen at the last tick, to report background transitions
  last_gate: GatePhase,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(session: Session) -> Self {
    let (tx, _rx) = mpsc::unbounded_channel();
    let last_gate = session.gate().phase();

    Self {
      session,
      event_tx: tx,
      last_gate,
      should_quit: false,
    }
  }

  pub async fn run(mut self) -> Result<()> {
    let mut events = EventHandler::new(Duration::from_millis(500));
    self.event_tx = events.sender();

    self.session.start();
    println!("limelight ready, type help for commands");

    // Main loop
    while !self.should_quit {
      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }

    self.session.shutdown().await;
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Line(line) if line.trim().is_empty() => {}
      Event::Line(line) => self.execute_command(&line),
      Event::Tick => self.report_gate_change(),
      Event::Report(message) => println!("{}", message),
      Event::Closed => self.should_quit = true,
    }
  }

  fn execute_command(&mut self, line: &str) {
    let action = match commands::parse(line) {
      Ok(action) => action,
      Err(e) => {
        println!("{}", e);
        return;
      }
    };

    match action {
      Action::HoverShow(slug) => {
        let intent = self.session.intent().clone();
        self.spawn_report(async move {
          let outcome = intent.prefetch_show(&slug).await;
          format!("show {}: {}", slug, describe_prefetch(&outcome))
        });
      }
      Action::HoverPage(page) => {
        let intent = self.session.intent().clone();
        self.spawn_report(async move {
          let outcome = intent.prefetch_page_content(&page).await;
          format!("page {}: {}", page, describe_prefetch(&outcome))
        });
      }
      Action::Preload(urls) => {
        let images = self.session.images().clone();
        let already: Vec<bool> = urls.iter().map(|url| images.is_loaded(url)).collect();
        self.spawn_report(async move {
          let results = images.preload_all(&urls).await;
          urls
            .iter()
            .zip(already.into_iter().zip(results))
            .map(|(url, (cached, ok))| {
              let state = match (cached, ok) {
                (true, _) => "cached",
                (false, true) => "loaded",
                (false, false) => "failed",
              };
              format!("{} {}", state, url)
            })
            .collect::<Vec<_>>()
            .join("\n")
        });
      }
      Action::Invalidate { prefix, refetch } => {
        let count = self.session.invalidate(&prefix, refetch);
        let verb = if refetch { "refetching" } else { "marked stale" };
        println!("{} {} entries under {}", verb, count, prefix);
      }
      Action::Clear => {
        let dropped = self.session.clear_memory();
        println!("dropped {} cached responses and all preloaded images", dropped);
      }
      Action::Sync => {
        let gate = self.session.gate().clone();
        self.spawn_report(async move { describe_gate(&gate.trigger().await) });
      }
      Action::Status => {
        for line in format_status(&self.session.status()) {
          println!("{}", line);
        }
      }
      Action::Help => {
        for cmd in COMMANDS {
          println!("  {:<26} {}", cmd.usage, cmd.description);
        }
      }
      Action::Quit => self.should_quit = true,
    }
  }

  /// Run `work` in the background and print what it returns.
  fn spawn_report<F>(&self, work: F)
  where
    F: std::future::Future<Output = String> + Send + 'static,
  {
    let tx = self.event_tx.clone();
    tokio::spawn(async move {
      let _ = tx.send(Event::Report(work.await));
    });
  }

  fn report_gate_change(&mut self) {
    let phase = self.session.gate().phase();
    if phase != self.last_gate {
      println!("course sync: {}", describe_phase(phase));
      self.last_gate = phase;
    }
  }
}

fn describe_prefetch(outcome: &PrefetchOutcome) -> String {
  match outcome {
    PrefetchOutcome::Fresh => "already fresh".to_string(),
    PrefetchOutcome::Cached => "already cached".to_string(),
    PrefetchOutcome::Fetched => "prefetched".to_string(),
    PrefetchOutcome::Joined => "joined a fetch in flight".to_string(),
    PrefetchOutcome::Failed(e) => format!("prefetch failed ({})", e),
  }
}

fn describe_gate(outcome: &GateOutcome) -> String {
  match outcome {
    GateOutcome::AlreadyRunning => "course sync already running".to_string(),
    GateOutcome::AlreadyCompleted => "course sync already done this session".to_string(),
    GateOutcome::Skipped => "course sync not due".to_string(),
    GateOutcome::Synced(report) => format!(
      "course sync done: {} inserted, {} updated, {} removed",
      report.inserted, report.updated, report.removed
    ),
    GateOutcome::Failed(e) => format!("course sync failed, will retry on next trigger ({})", e),
  }
}

fn describe_phase(phase: GatePhase) -> &'static str {
  match phase {
    GatePhase::Idle => "idle",
    GatePhase::InProgress => "running",
    GatePhase::Completed => "done",
  }
}

/// Status lines for the console.
pub fn format_status(status: &SessionStatus) -> Vec<String> {
  let mut lines = vec![
    format!(
      "scheduler: {:?} ({} deferred, {} periodic batches)",
      status.scheduler, status.scheduler_runs.0, status.scheduler_runs.1
    ),
    format!("course sync: {}", describe_phase(status.gate)),
    format!(
      "images: {} loaded, {} pending",
      status.images_loaded, status.images_pending
    ),
    format!("queries: {}", status.entries.len()),
  ];

  for entry in &status.entries {
    let state = if entry.is_fetching {
      "fetching"
    } else if entry.is_stale {
      "stale"
    } else {
      "fresh"
    };
    lines.push(format!(
      "  {:<32} {:<8} {}",
      entry.key.to_string(),
      state,
      entry.updated_at.format("%H:%M:%S")
    ));
  }
  lines
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::prefetch::SchedulerState;
  use crate::query::{EntryStatus, QueryKey};
  use crate::site::types::SyncReport;
  use chrono::{TimeZone, Utc};

  #[test]
  fn test_format_status_lists_entries() {
    let status = SessionStatus {
      entries: vec![EntryStatus {
        key: QueryKey::new(["show", "hamlet"]),
        updated_at: Utc.with_ymd_and_hms(2026, 10, 16, 19, 30, 5).unwrap(),
        is_stale: true,
        is_fetching: false,
      }],
      images_loaded: 2,
      images_pending: 1,
      scheduler: SchedulerState::PeriodicActive,
      scheduler_runs: (1, 4),
      gate: GatePhase::Completed,
    };

    let lines = format_status(&status);

    assert_eq!(lines[0], "scheduler: PeriodicActive (1 deferred, 4 periodic batches)");
    assert_eq!(lines[1], "course sync: done");
    assert_eq!(lines[2], "images: 2 loaded, 1 pending");
    assert!(lines[4].contains(r#"["show", "hamlet"]"#));
    assert!(lines[4].contains("stale"));
    assert!(lines[4].ends_with("19:30:05"));
  }

  #[test]
  fn test_describe_outcomes() {
    assert_eq!(describe_prefetch(&PrefetchOutcome::Cached), "already cached");
    assert!(describe_prefetch(&PrefetchOutcome::Failed("timeout".to_string())).contains("timeout"));
    assert_eq!(
      describe_gate(&GateOutcome::Synced(SyncReport {
        inserted: 1,
        updated: 2,
        removed: 0,
      })),
      "course sync done: 1 inserted, 2 updated, 0 removed"
    );
  }
}
