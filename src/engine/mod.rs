mod catalog;
mod conflict;
mod error;
mod lifecycle;
mod queries;
mod registrar;
mod store;
mod validate;

pub use error::{EngineError, Entity};

use std::io;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::config::EngineConfig;
use crate::journal::Journal;
use crate::limits::DEFAULT_LOCK_RETRIES;
use crate::model::*;
use crate::observability::{
    JOURNAL_COMPACTIONS_TOTAL, JOURNAL_FLUSH_BATCH_SIZE, JOURNAL_FLUSH_DURATION_SECONDS,
};

use store::{BookingState, ResourceLocks, Store};

// ── Group-commit journal channel ─────────────────────────────────

enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Rewrite {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type Pending = (Event, oneshot::Sender<io::Result<()>>);

/// Owns the journal. Each wakeup takes every append already queued and
/// commits them with a single fsync.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            JournalCommand::Append { event, response } => (event, response),
            other => {
                handle_command(&mut journal, other);
                continue;
            }
        };

        let mut batch = vec![(event, response)];
        let mut deferred = None;
        while let Ok(next) = rx.try_recv() {
            match next {
                JournalCommand::Append { event, response } => batch.push((event, response)),
                other => {
                    deferred = Some(other);
                    break;
                }
            }
        }
        commit_batch(&mut journal, batch);
        if let Some(cmd) = deferred {
            handle_command(&mut journal, cmd);
        }
    }
    debug!("journal writer stopped");
}

fn commit_batch(journal: &mut Journal, batch: Vec<Pending>) {
    metrics::histogram!(JOURNAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = Instant::now();

    let appended = batch
        .iter()
        .try_for_each(|(event, _)| journal.append_buffered(event));
    // Flush regardless so a failed batch leaves nothing buffered for the next one.
    let flushed = journal.flush_sync();
    metrics::histogram!(JOURNAL_FLUSH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());

    let outcome = appended.and(flushed);
    if let Err(e) = &outcome {
        warn!(events = batch.len(), "journal commit failed: {e}");
    }
    for (_, tx) in batch {
        let reply = match &outcome {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(reply);
    }
}

fn handle_command(journal: &mut Journal, cmd: JournalCommand) {
    match cmd {
        JournalCommand::Append { event, response } => {
            commit_batch(journal, vec![(event, response)]);
        }
        JournalCommand::Rewrite { events, response } => {
            let _ = response.send(journal.rewrite(&events));
        }
        JournalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(journal.appends_since_compact());
        }
    }
}

// ── Engine ───────────────────────────────────────────────────────

/// The booking engine: catalog, bookings and attendance behind one handle.
/// Share it as `Arc<Engine>`.
pub struct Engine {
    store: Store,
    journal_tx: Option<mpsc::Sender<JournalCommand>>,
    /// Mutations hold this shared; compaction holds it exclusively so the
    /// snapshot it writes cannot miss a commit.
    commit_gate: RwLock<()>,
    lock_retries: u32,
}

impl Engine {
    /// Volatile engine. Nothing survives a restart.
    pub fn in_memory() -> Self {
        Self {
            store: Store::default(),
            journal_tx: None,
            commit_gate: RwLock::new(()),
            lock_retries: DEFAULT_LOCK_RETRIES,
        }
    }

    /// Replay the configured journal and start its writer task. Must be
    /// called inside a tokio runtime when a journal is configured.
    pub fn open(config: &EngineConfig) -> io::Result<Self> {
        let Some(path) = config.journal_path() else {
            return Ok(Self {
                lock_retries: config.lock_retries.max(1),
                ..Self::in_memory()
            });
        };

        std::fs::create_dir_all(&config.data_dir)?;
        let events = Journal::recover(&path)?;
        let journal = Journal::open(&path)?;
        let (tx, rx) = mpsc::channel(config.journal_channel_capacity.max(1));
        tokio::spawn(journal_writer_loop(journal, rx));

        let store = Store::replay(&events);
        info!(
            events = events.len(),
            rooms = store.rooms.len(),
            speakers = store.speakers.len(),
            bookings = store.bookings.len(),
            "replayed journal {}",
            path.display()
        );

        Ok(Self {
            store,
            journal_tx: Some(tx),
            commit_gate: RwLock::new(()),
            lock_retries: config.lock_retries.max(1),
        })
    }

    pub fn is_durable(&self) -> bool {
        self.journal_tx.is_some()
    }

    /// Commit one event. Returns once it is on disk (or immediately when
    /// running in memory). Callers apply the change only after this succeeds.
    async fn persist(&self, event: &Event) -> Result<(), EngineError> {
        let Some(journal) = &self.journal_tx else {
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        journal
            .send(JournalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::Journal("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Journal("journal writer dropped response".into()))?
            .map_err(|e| EngineError::Journal(e.to_string()))
    }

    /// Rewrite the journal as a minimal snapshot of the current state.
    pub async fn compact_journal(&self) -> Result<(), EngineError> {
        let Some(journal) = &self.journal_tx else {
            return Ok(());
        };
        let _exclusive = self.commit_gate.write().await;
        let events = self.store.to_events().await;
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        journal
            .send(JournalCommand::Rewrite { events, response: tx })
            .await
            .map_err(|_| EngineError::Journal("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::Journal("journal writer dropped response".into()))?
            .map_err(|e| EngineError::Journal(e.to_string()))?;

        metrics::counter!(JOURNAL_COMPACTIONS_TOTAL).increment(1);
        info!(events = count, "journal compacted");
        Ok(())
    }

    pub async fn journal_appends_since_compact(&self) -> u64 {
        let Some(journal) = &self.journal_tx else {
            return 0;
        };
        let (tx, rx) = oneshot::channel();
        if journal
            .send(JournalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Lock a booking together with the resources it sits on, plus the extra
    /// room and speaker a move would take it to. Resources are locked before
    /// the booking; if the booking moved in between, start over.
    async fn lock_booking(
        &self,
        id: Ulid,
        extra_room: Option<Ulid>,
        extra_speaker: Option<Ulid>,
    ) -> Result<(ResourceLocks, OwnedRwLockWriteGuard<BookingState>), EngineError> {
        for attempt in 0..self.lock_retries {
            let shared = self.store.booking(&id)?;
            let (room_id, speaker_id) = {
                let state = shared.read().await;
                (state.booking.room_id, state.booking.speaker_id)
            };

            let rooms: Vec<Ulid> = std::iter::once(room_id).chain(extra_room).collect();
            let speakers: Vec<Ulid> = std::iter::once(speaker_id).chain(extra_speaker).collect();
            let locks = self.store.lock_resources(&rooms, &speakers).await?;

            let state = shared.write_owned().await;
            if state.booking.room_id == room_id && state.booking.speaker_id == speaker_id {
                return Ok((locks, state));
            }
            debug!(booking = %id, attempt, "booking moved while locking, retrying");
        }
        Err(EngineError::Contention(id))
    }
}
