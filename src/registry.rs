// Profile registry: owns every client profile's cursor and state, and funnels
// all updates through one serialized path per profile.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::classify::classify;
use crate::config::ProfileConfig;
use crate::error::TrackerError;
use crate::metrics;
use crate::notes::NoteBook;
use crate::profile::ZoneLevelState;
use crate::tail::{LogCursor, TailSummary};

/// Capacity of the state change broadcast; slow subscribers skip older events.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A state change, published after every update or reset that altered a profile.
#[derive(Debug, Clone, Serialize)]
pub struct StateEvent {
    pub client: String,
    #[serde(flatten)]
    pub state: ZoneLevelState,
}

/// How an update request was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// This call ran the tail passes; the summary totals all of them.
    Scanned(TailSummary),
    /// Another update for the profile was already running; it will make one more
    /// pass on this call's behalf. The reported state may predate that pass.
    Coalesced,
}

#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub outcome: UpdateOutcome,
    pub state: ZoneLevelState,
}

struct ProfileRecord {
    cursor: LogCursor,
    state: ZoneLevelState,
}

struct ProfileSlot {
    record: Mutex<ProfileRecord>,
    in_flight: AtomicBool,
    /// Set by every update request; the running update keeps passing while it is set.
    rerun: AtomicBool,
}

/// Clears the in-flight flag when the update finishes, even on early return.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn lock(record: &Mutex<ProfileRecord>) -> MutexGuard<'_, ProfileRecord> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}

/// All configured client profiles.
pub struct ProfileRegistry {
    profiles: BTreeMap<String, ProfileSlot>,
    notes: NoteBook,
    events: broadcast::Sender<StateEvent>,
}

impl ProfileRegistry {
    pub fn new(profiles: Vec<ProfileConfig>, notes: NoteBook) -> Self {
        let profiles = profiles
            .into_iter()
            .map(|p| {
                let slot = ProfileSlot {
                    record: Mutex::new(ProfileRecord {
                        cursor: LogCursor::new(p.log_path),
                        state: ZoneLevelState::new(),
                    }),
                    in_flight: AtomicBool::new(false),
                    rerun: AtomicBool::new(false),
                };
                (p.id, slot)
            })
            .collect();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            profiles,
            notes,
            events,
        }
    }

    fn slot(&self, id: &str) -> Result<&ProfileSlot, TrackerError> {
        self.profiles
            .get(id)
            .ok_or_else(|| TrackerError::UnknownProfile(id.to_string()))
    }

    pub fn profile_ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// Log path of every profile, for the file watcher.
    pub fn log_paths(&self) -> Vec<(String, PathBuf)> {
        self.profiles
            .iter()
            .map(|(id, slot)| (id.clone(), lock(&slot.record).cursor.log_path().to_path_buf()))
            .collect()
    }

    /// Current state of every profile. Never touches the log files.
    pub fn snapshot_all(&self) -> BTreeMap<String, ZoneLevelState> {
        self.profiles
            .iter()
            .map(|(id, slot)| (id.clone(), lock(&slot.record).state.clone()))
            .collect()
    }

    pub fn snapshot(&self, id: &str) -> Result<ZoneLevelState, TrackerError> {
        Ok(lock(&self.slot(id)?.record).state.clone())
    }

    /// Bytes of the profile's log consumed so far.
    pub fn byte_offset(&self, id: &str) -> Result<u64, TrackerError> {
        Ok(lock(&self.slot(id)?.record).cursor.byte_offset())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    /// Run tail passes for `id` and fold the new lines into its state.
    ///
    /// Blocks on file I/O; async callers go through `spawn_blocking`. A call that
    /// arrives while another update of the same profile is running is coalesced:
    /// it returns the current state at once and the running update makes one
    /// more pass before it finishes, so the trigger is never lost.
    pub fn update(&self, id: &str) -> Result<UpdateReport, TrackerError> {
        let slot = self.slot(id)?;

        // Request a pass before trying to become the runner.
        slot.rerun.store(true, Ordering::SeqCst);
        if slot.in_flight.swap(true, Ordering::SeqCst) {
            metrics::TAIL_PASSES_TOTAL
                .with_label_values(&[id, "coalesced"])
                .inc();
            tracing::debug!("Update for '{id}' already running, coalescing");
            let state = lock(&slot.record).state.clone();
            return Ok(UpdateReport {
                outcome: UpdateOutcome::Coalesced,
                state,
            });
        }

        let mut total = TailSummary::default();
        loop {
            {
                let _in_flight = InFlight(&slot.in_flight);
                while slot.rerun.swap(false, Ordering::SeqCst) {
                    let summary = self.tail_pass(id, slot)?;
                    total.lines += summary.lines;
                    total.bytes += summary.bytes;
                    total.rotated |= summary.rotated;
                }
            }
            // A request made after the last swap but before in_flight was cleared
            // saw us still running; pick it up unless another runner already has.
            if !slot.rerun.load(Ordering::SeqCst) || slot.in_flight.swap(true, Ordering::SeqCst) {
                break;
            }
        }

        Ok(UpdateReport {
            outcome: UpdateOutcome::Scanned(total),
            state: lock(&slot.record).state.clone(),
        })
    }

    /// One tail pass over the profile's log. Caller holds the in-flight flag.
    fn tail_pass(&self, id: &str, slot: &ProfileSlot) -> Result<TailSummary, TrackerError> {
        let mut record = lock(&slot.record);
        let ProfileRecord { cursor, state } = &mut *record;

        let started = Instant::now();
        let mut next = state.clone();
        let mut changed = false;
        let result = cursor.tail(|line| {
            if let Some(event) = classify(line) {
                changed |= next.apply(event);
            }
        });
        metrics::TAIL_DURATION_SECONDS
            .with_label_values(&[id])
            .observe(started.elapsed().as_secs_f64());

        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                metrics::TAIL_PASSES_TOTAL
                    .with_label_values(&[id, "unavailable"])
                    .inc();
                tracing::debug!("Tail pass for '{id}' skipped: {e}");
                return Err(e);
            }
        };

        metrics::TAIL_PASSES_TOTAL
            .with_label_values(&[id, "scanned"])
            .inc();
        metrics::LINES_SCANNED_TOTAL
            .with_label_values(&[id])
            .inc_by(summary.lines as u64);
        if summary.rotated {
            metrics::LOG_ROTATIONS_TOTAL.with_label_values(&[id]).inc();
            tracing::info!(
                "Log for '{id}' was replaced, rescanned {} lines from the start",
                summary.lines
            );
        }

        if changed {
            self.refresh_note(&mut next);
            *state = next;
            metrics::STATE_CHANGES_TOTAL.with_label_values(&[id]).inc();
            tracing::info!("'{id}' is now in {} at level {}", state.zone, state.level);
            self.publish(id, state);
        }

        Ok(summary)
    }

    /// Put `id` back at the starting zone and level 1.
    pub fn reset(&self, id: &str) -> Result<ZoneLevelState, TrackerError> {
        let slot = self.slot(id)?;
        let mut record = lock(&slot.record);
        record.state.reset();
        self.refresh_note(&mut record.state);
        metrics::STATE_CHANGES_TOTAL.with_label_values(&[id]).inc();
        tracing::info!("'{id}' reset to {}", record.state.zone);
        self.publish(id, &record.state);
        Ok(record.state.clone())
    }

    /// Re-render the note for the state's zone and level. Leaves the previous
    /// note in place when no rule matches.
    fn refresh_note(&self, state: &mut ZoneLevelState) {
        if let Some(html) = self.notes.render(&state.zone, state.level) {
            state.html_note = Some(html);
        }
    }

    fn publish(&self, id: &str, state: &ZoneLevelState) {
        // No subscribers is the common case.
        let _ = self.events.send(StateEvent {
            client: id.to_string(),
            state: state.clone(),
        });
    }
}
