//! `scry` — interactive terminal client for the scry search server.
//!
//! # Usage
//!
//! ```
//! scry --url http://localhost:3000
//! scry --url http://localhost:3000 --queue ~/.cache/scry/pending_searches.json
//! ```
//!
//! Type to search; results stream in as you type and the last value becomes a
//! recorded final search after one second of inactivity. Esc clears the input,
//! Ctrl-C exits (queueing any in-progress final for the next run).

use std::{
  io::{self, Write as _},
  sync::Arc,
  time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
  event::{self, Event as TermEvent, KeyCode, KeyEventKind, KeyModifiers},
  terminal::{disable_raw_mode, enable_raw_mode},
};
use scry_client::{
  client::{ApiClient, SearchResponse},
  dispatch::{DispatchResult, Dispatcher},
  queue::PendingQueue,
  session::{Action, Event, SearchSession},
};
use scry_core::types::Document;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "scry", about = "Interactive client for the scry search server")]
struct Args {
  /// Base URL of the scry server.
  #[arg(long, env = "SCRY_URL", default_value = "http://localhost:3000")]
  url: String,

  /// Path of the durable pending-search queue file.
  #[arg(long, value_name = "FILE", default_value = "pending_searches.json")]
  queue: std::path::PathBuf,
}

// ─── Messages from request tasks back to the event loop ──────────────────────

enum UiMsg {
  Results { response: SearchResponse, term: String },
  AllDocuments(Vec<Document>),
  FinalRecorded(String),
  Analytics(Value),
  RequestFailed(String),
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .with_writer(io::stderr)
    .init();

  let args = Args::parse();
  let client = ApiClient::new(&args.url)?;
  let queue = PendingQueue::new(&args.queue);

  // Replay anything left behind by a previous run before taking input.
  replay_pending(&client, &queue).await;

  enable_raw_mode().context("enabling raw mode")?;
  let result = run_event_loop(client, queue).await;
  disable_raw_mode().ok();

  result
}

/// Replay queued finals from the previous session as one batch. The queue is
/// only cleared once the server acknowledges, so a failed replay retries on
/// the next start.
async fn replay_pending(client: &ApiClient, queue: &PendingQueue) {
  let entries = queue.load();
  let finals: Vec<_> = entries.into_iter().filter(|e| e.is_final).collect();
  if finals.is_empty() {
    // Nothing worth replaying; intermediates alone are discarded.
    queue.clear().ok();
    return;
  }

  match client.process_pending_searches(&finals).await {
    Ok(processed) => {
      say(&format!("replayed {processed} pending search(es)"));
      queue.clear().ok();
      // The replayed finals moved the ledger; show the refreshed view.
      match client.analytics().await {
        Ok(view) => render(UiMsg::Analytics(view)),
        Err(error) => tracing::warn!(%error, "analytics refresh failed"),
      }
    }
    Err(error) => {
      tracing::warn!(%error, "pending replay failed; keeping queue for next run");
    }
  }
}

// ─── Event loop ───────────────────────────────────────────────────────────────

async fn run_event_loop(client: ApiClient, queue: PendingQueue) -> Result<()> {
  let dispatcher = Arc::new(Dispatcher::new());
  let mut session = SearchSession::new();
  let mut input = String::new();
  let (tx, mut rx) = mpsc::unbounded_channel::<UiMsg>();

  say("scry — type to search, Esc to clear, Ctrl-C to quit");

  // Initial listing.
  spawn_fetch_all(&client, &dispatcher, &tx);

  loop {
    // Fire any due debounce/finality deadline.
    for action in session.on_tick(Instant::now()) {
      perform(action, &client, &queue, &dispatcher, &tx)?;
    }

    // Drain completed requests.
    while let Ok(msg) = rx.try_recv() {
      render(msg);
    }

    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    let Some(term_event) = maybe_event else {
      continue;
    };

    let session_event = match term_event {
      TermEvent::Key(key) if key.kind == KeyEventKind::Press => match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
          for action in session.on_event(Event::Unload, Instant::now()) {
            perform(action, &client, &queue, &dispatcher, &tx)?;
          }
          break;
        }
        KeyCode::Char(c) => {
          input.push(c);
          Some(Event::Keystroke(input.clone()))
        }
        KeyCode::Backspace => {
          input.pop();
          Some(Event::Keystroke(input.clone()))
        }
        KeyCode::Esc => {
          input.clear();
          Some(Event::Clear)
        }
        _ => None,
      },
      TermEvent::FocusLost => Some(Event::FocusLost),
      _ => None,
    };

    if let Some(session_event) = session_event {
      for action in session.on_event(session_event, Instant::now()) {
        perform(action, &client, &queue, &dispatcher, &tx)?;
      }
      say(&format!("> {input}"));
    }
  }

  Ok(())
}

/// Carry out one session action.
fn perform(
  action: Action,
  client: &ApiClient,
  queue: &PendingQueue,
  dispatcher: &Arc<Dispatcher>,
  tx: &mpsc::UnboundedSender<UiMsg>,
) -> Result<()> {
  match action {
    Action::DispatchIntermediate(term) => {
      spawn_search(client, dispatcher, tx, term, false);
    }
    Action::DispatchFinal(term) => {
      // Durable intent first: the queue entry is written before the request
      // leaves, so the intent survives a dispatch that never completes. The
      // next start's batch replay clears it on ack.
      queue.enqueue_final(&term)?;
      spawn_search(client, dispatcher, tx, term, true);
    }
    Action::EnqueueFinal(term) => {
      queue.enqueue_final(&term)?;
      say(&format!("queued final search {term:?} for next run"));
    }
    Action::FetchAll => {
      spawn_fetch_all(client, dispatcher, tx);
    }
    Action::ClearResults => {
      say("results cleared");
    }
    Action::NotifyFinal(term) => {
      say(&format!("final search recorded: {term:?}"));
    }
  }
  Ok(())
}

/// Guarded search request. A dispatch arriving while another request is live
/// is dropped. Final intents are already durably queued by the caller, so a
/// failed (or never-settled) final loses nothing.
fn spawn_search(
  client: &ApiClient,
  dispatcher: &Arc<Dispatcher>,
  tx: &mpsc::UnboundedSender<UiMsg>,
  term: String,
  is_final: bool,
) {
  if !dispatcher.try_begin() {
    tracing::debug!(%term, is_final, result = ?DispatchResult::Dropped, "search discarded");
    return;
  }

  let client = client.clone();
  let dispatcher = Arc::clone(dispatcher);
  let tx = tx.clone();
  tokio::spawn(async move {
    let outcome = client.search(&term, is_final).await;
    dispatcher.finish();
    let result = if outcome.is_ok() {
      DispatchResult::Completed
    } else {
      DispatchResult::Failed
    };
    tracing::debug!(%term, is_final, ?result, "search dispatch settled");
    match outcome {
      Ok(response) => {
        if is_final {
          tx.send(UiMsg::FinalRecorded(term.clone())).ok();
        }
        tx.send(UiMsg::Results { response, term }).ok();
        if is_final {
          // The recorded final moved the ledger; pull the refreshed
          // aggregated view.
          match client.analytics().await {
            Ok(view) => {
              tx.send(UiMsg::Analytics(view)).ok();
            }
            Err(error) => tracing::warn!(%error, "analytics refresh failed"),
          }
        }
      }
      Err(error) => {
        tx.send(UiMsg::RequestFailed(error.to_string())).ok();
      }
    }
  });
}

fn spawn_fetch_all(
  client: &ApiClient,
  dispatcher: &Arc<Dispatcher>,
  tx: &mpsc::UnboundedSender<UiMsg>,
) {
  if !dispatcher.try_begin() {
    return;
  }

  let client = client.clone();
  let dispatcher = Arc::clone(dispatcher);
  let tx = tx.clone();
  tokio::spawn(async move {
    let outcome = client.list_documents().await;
    dispatcher.finish();
    match outcome {
      Ok(documents) => {
        tx.send(UiMsg::AllDocuments(documents)).ok();
      }
      Err(error) => {
        tx.send(UiMsg::RequestFailed(error.to_string())).ok();
      }
    }
  });
}

// ─── Rendering ────────────────────────────────────────────────────────────────

fn render(msg: UiMsg) {
  match msg {
    UiMsg::Results { response, term } => {
      say(&format!("{} result(s) for {term:?}", response.total));
      for document in response.documents.iter().take(10) {
        say(&format!("  {}", document.title));
      }
    }
    UiMsg::AllDocuments(documents) => {
      say(&format!("{} document(s)", documents.len()));
      for document in documents.iter().take(10) {
        say(&format!("  {}", document.title));
      }
    }
    UiMsg::FinalRecorded(term) => {
      say(&format!("recorded final search {term:?}"));
    }
    UiMsg::Analytics(view) => {
      for line in analytics_lines(&view) {
        say(&line);
      }
    }
    UiMsg::RequestFailed(error) => {
      say(&format!("request failed: {error}"));
    }
  }
}

/// Summarise the aggregated analytics view as printable lines.
fn analytics_lines(view: &Value) -> Vec<String> {
  let mut lines = Vec::new();

  if let Some(top) = view["top_searches"].as_array() {
    let terms: Vec<&str> =
      top.iter().filter_map(|t| t["term"].as_str()).collect();
    if !terms.is_empty() {
      lines.push(format!("your top searches: {}", terms.join(", ")));
    }
  }

  let stats = &view["stats"];
  if stats.is_object() {
    lines.push(format!(
      "{} unique search(es), {} document(s) surfaced, {} appearance(s)",
      stats["total_unique_searches"],
      stats["total_documents_found"],
      stats["total_appearances"],
    ));
  }

  lines
}

/// Print one line under raw mode (explicit carriage return).
fn say(line: &str) {
  let mut stdout = io::stdout();
  write!(stdout, "{line}\r\n").ok();
  stdout.flush().ok();
}

#[cfg(test)]
mod tests {
  use super::*;

  fn fixture() -> (
    PendingQueue,
    ApiClient,
    Arc<Dispatcher>,
    mpsc::UnboundedSender<UiMsg>,
    tempfile::TempDir,
  ) {
    let dir = tempfile::tempdir().unwrap();
    let queue = PendingQueue::new(dir.path().join("pending_searches.json"));
    // A dead endpoint: requests never succeed, which is exactly the case
    // the durable queue must cover.
    let client = ApiClient::new("http://127.0.0.1:9").unwrap();
    let (tx, _rx) = mpsc::unbounded_channel();
    (queue, client, Arc::new(Dispatcher::new()), tx, dir)
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn final_dispatch_queues_intent_before_the_request_settles() {
    let (queue, client, dispatcher, tx, _dir) = fixture();

    perform(
      Action::DispatchFinal("cats".into()),
      &client,
      &queue,
      &dispatcher,
      &tx,
    )
    .unwrap();

    // The durable entry exists immediately, with the request still in
    // flight; killing the process here would lose nothing.
    let entries = queue.load();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].query, "cats");
    assert!(entries[0].is_final);
  }

  #[tokio::test(flavor = "multi_thread")]
  async fn intermediate_dispatch_writes_nothing_durable() {
    let (queue, client, dispatcher, tx, _dir) = fixture();

    perform(
      Action::DispatchIntermediate("ca".into()),
      &client,
      &queue,
      &dispatcher,
      &tx,
    )
    .unwrap();

    assert!(queue.load().is_empty());
  }

  #[test]
  fn analytics_lines_summarise_the_view() {
    let view = serde_json::json!({
      "top_searches": [
        { "term": "ruby", "count": 3 },
        { "term": "cats", "count": 1 },
      ],
      "stats": {
        "total_unique_searches": 2,
        "total_documents_found": 4,
        "total_appearances": 5,
      },
    });

    let lines = analytics_lines(&view);
    assert_eq!(lines[0], "your top searches: ruby, cats");
    assert_eq!(lines[1], "2 unique search(es), 4 document(s) surfaced, 5 appearance(s)");
  }

  #[test]
  fn analytics_lines_tolerate_an_empty_view() {
    assert!(analytics_lines(&serde_json::json!({})).is_empty());
  }
}
