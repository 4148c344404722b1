mod availability;
mod error;
mod mutations;
mod queries;
mod store;
mod validate;

pub use availability::{claim_nights, first_saturated_night, has_saturated_night, missing_days};
pub use error::EngineError;
pub use store::{BookingLedger, CalendarStore, RequestSlot, SharedCalendar};

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock, RwLockReadGuard};

use crate::catalog::HotelCatalog;
use crate::model::*;
use crate::observability;
use crate::wal::Wal;

/// How long a request waits for a calendar lock before giving up.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(3);

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single fsync for the whole batch; a failed batch is rolled back.
/// 5. Respond to all senders with the batch result.
///
/// Exits when the engine (the only sender) is dropped.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break, // channel empty, flush batch
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
    tracing::debug!("WAL writer stopped");
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = Instant::now();
    let result = wal.append_batch(batch.iter().map(|(event, _)| event));
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed for {} events: {e}", batch.len());
    }
    respond_batch(batch, &result);
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let mut batch = vec![(event, response)];
            commit_batch(wal, &mut batch);
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// The availability & booking engine: calendar store, booking ledger and the
/// WAL that makes both durable.
pub struct Engine {
    calendars: CalendarStore,
    ledger: BookingLedger,
    catalog: Arc<dyn HotelCatalog>,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Held shared by every mutation and exclusively by compaction, so no
    /// commit can land between a compaction snapshot and the WAL swap.
    commit_gate: RwLock<()>,
    lock_timeout: Duration,
}

/// Apply an event to a calendar. Caller holds the write lock.
fn apply_to_calendar(calendar: &mut HotelCalendar, event: &Event, ledger: &BookingLedger) {
    match event {
        Event::DaysProvisioned { days, .. } => {
            for day in days {
                calendar.set_day(*day);
            }
        }
        Event::BookingCommitted { booking } => {
            claim_nights(calendar, &booking.stay);
            ledger.record(booking.clone());
        }
        Event::BookingRestored { booking } => ledger.record(booking.clone()),
    }
}

fn event_hotel_id(event: &Event) -> HotelId {
    match event {
        Event::DaysProvisioned { hotel_id, .. } => *hotel_id,
        Event::BookingCommitted { booking } | Event::BookingRestored { booking } => booking.hotel_id,
    }
}

impl Engine {
    /// Replay the WAL at `wal_path` and start the group-commit writer.
    /// Must be called from within a tokio runtime.
    pub fn open(
        wal_path: PathBuf,
        catalog: Arc<dyn HotelCatalog>,
        config: EngineConfig,
    ) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        // Rebuild on plain maps; nothing else can see this state yet.
        let ledger = BookingLedger::new();
        let mut calendars: HashMap<HotelId, HotelCalendar> = HashMap::new();
        for event in &events {
            let hotel_id = event_hotel_id(event);
            let calendar = calendars
                .entry(hotel_id)
                .or_insert_with(|| HotelCalendar::new(hotel_id));
            apply_to_calendar(calendar, event, &ledger);
        }

        let days: usize = calendars.values().map(|c| c.days.len()).sum();
        metrics::gauge!(observability::CALENDAR_DAYS).set(days as f64);
        tracing::info!(
            events = events.len(),
            hotels = calendars.len(),
            days,
            bookings = ledger.booking_count(),
            "engine state replayed from {}",
            wal_path.display()
        );

        Ok(Self {
            calendars: CalendarStore::from_calendars(calendars.into_values()),
            ledger,
            catalog,
            wal_tx,
            commit_gate: RwLock::new(()),
            lock_timeout: config.lock_timeout,
        })
    }

    /// Raw calendar handle. Lets tests and diagnostics take the hotel lock
    /// directly.
    pub fn calendar(&self, hotel_id: &HotelId) -> Option<SharedCalendar> {
        self.calendars.get(hotel_id)
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append then apply. Nothing is applied if the append fails.
    pub(super) async fn persist_and_apply(
        &self,
        calendar: &mut HotelCalendar,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_calendar(calendar, event, &self.ledger);
        Ok(())
    }

    pub(super) async fn require_hotel(&self, hotel_id: HotelId) -> Result<Hotel, EngineError> {
        self.catalog
            .hotel(hotel_id)
            .await?
            .ok_or(EngineError::UnknownHotel(hotel_id))
    }

    /// Take the commit gate (shared) and the calendar's write lock, giving
    /// up after the lock timeout.
    pub(super) async fn lock_for_commit(
        &self,
        hotel_id: HotelId,
        calendar: SharedCalendar,
    ) -> Result<(RwLockReadGuard<'_, ()>, OwnedRwLockWriteGuard<HotelCalendar>), EngineError> {
        let started = Instant::now();
        let acquire = async move {
            let gate = self.commit_gate.read().await;
            let guard = calendar.write_owned().await;
            (gate, guard)
        };
        let locked = tokio::time::timeout(self.lock_timeout, acquire).await;
        self.record_lock_wait(hotel_id, started, locked.is_ok());
        locked.map_err(|_| self.lock_timeout_error(hotel_id))
    }

    pub(super) async fn lock_for_read(
        &self,
        hotel_id: HotelId,
        calendar: SharedCalendar,
    ) -> Result<OwnedRwLockReadGuard<HotelCalendar>, EngineError> {
        let started = Instant::now();
        let locked = tokio::time::timeout(self.lock_timeout, calendar.read_owned()).await;
        self.record_lock_wait(hotel_id, started, locked.is_ok());
        locked.map_err(|_| self.lock_timeout_error(hotel_id))
    }

    fn record_lock_wait(&self, hotel_id: HotelId, started: Instant, acquired: bool) {
        metrics::histogram!(observability::LOCK_WAIT_SECONDS).record(started.elapsed().as_secs_f64());
        if !acquired {
            metrics::counter!(observability::LOCK_TIMEOUTS_TOTAL).increment(1);
            tracing::warn!(hotel_id = %hotel_id, timeout = ?self.lock_timeout, "calendar lock timed out");
        }
    }

    fn lock_timeout_error(&self, hotel_id: HotelId) -> EngineError {
        EngineError::LockTimeout {
            hotel_id,
            timeout: self.lock_timeout,
        }
    }
}
