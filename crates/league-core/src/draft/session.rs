// Draft session: the single writer of a DraftState.
//
// Manual picks and pick clock ticks arrive on one command queue and are
// applied strictly one at a time, so a click and a clock expiry can never
// both advance the same turn. On completion the session stops the clock and
// runs the finalizer.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::clock::PickClock;
use super::finalize;
use super::pick::PickSource;
use super::state::{DraftEvent, DraftState, Transition};
use crate::protocol::{DraftCommand, DraftSnapshot, DraftUpdate};
use crate::store::LeagueStore;

/// Channels and task handle of a spawned session.
pub struct DraftHandle {
    pub commands: mpsc::Sender<DraftCommand>,
    pub updates: mpsc::Receiver<DraftUpdate>,
    /// Resolves to the final state once the command queue closes or the
    /// session is cancelled.
    pub task: JoinHandle<DraftState>,
}

/// Spawn a session task for `state`.
pub fn spawn<R>(
    state: DraftState,
    store: Arc<dyn LeagueStore>,
    tick_interval: Duration,
    rng: R,
) -> DraftHandle
where
    R: Rng + Send + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (update_tx, update_rx) = mpsc::channel(256);
    let weak = cmd_tx.downgrade();
    let task = tokio::spawn(run(
        cmd_rx,
        weak,
        update_tx,
        state,
        store,
        tick_interval,
        rng,
    ));
    DraftHandle {
        commands: cmd_tx,
        updates: update_rx,
        task,
    }
}

/// Drain the command queue until it closes or a `Cancel` arrives.
///
/// `clock_tx` is handed to the pick clock; it is weak so the clock alone
/// does not keep the queue open.
pub async fn run<R: Rng + Send>(
    mut cmd_rx: mpsc::Receiver<DraftCommand>,
    clock_tx: mpsc::WeakSender<DraftCommand>,
    update_tx: mpsc::Sender<DraftUpdate>,
    mut state: DraftState,
    store: Arc<dyn LeagueStore>,
    tick_interval: Duration,
    mut rng: R,
) -> DraftState {
    info!("Draft session for game {} started", state.game_id);
    let mut clock = PickClock::new(tick_interval);

    while let Some(cmd) = cmd_rx.recv().await {
        let event = match cmd {
            DraftCommand::Cancel => {
                info!("Draft session for game {} cancelled", state.game_id);
                clock.stop();
                let _ = update_tx.send(DraftUpdate::Cancelled).await;
                break;
            }
            DraftCommand::Finalize => {
                finalize_draft(&state, store.as_ref(), &update_tx).await;
                continue;
            }
            DraftCommand::Tick { generation } => {
                if generation != clock.generation() {
                    debug!("Dropping stale tick from clock run {}", generation);
                    continue;
                }
                DraftEvent::Tick
            }
            DraftCommand::Start => DraftEvent::Start,
            DraftCommand::Pick { participant_id } => DraftEvent::Pick {
                participant_id,
                source: PickSource::Manual,
            },
        };

        match state.apply(event, &mut rng) {
            Ok(Transition::Started) => {
                clock.start(clock_tx.clone());
                let snapshot = DraftSnapshot::from_state(&state);
                let _ = update_tx.send(DraftUpdate::Started { snapshot }).await;
            }
            Ok(Transition::Picked { pick, completed }) => {
                if !completed {
                    // Full period for the next team.
                    clock.start(clock_tx.clone());
                }
                let snapshot = DraftSnapshot::from_state(&state);
                let _ = update_tx.send(DraftUpdate::Picked { pick, snapshot }).await;
                if completed {
                    complete(&state, &mut clock, store.as_ref(), &update_tx).await;
                }
            }
            Ok(Transition::Ticked { seconds_remaining }) => {
                let _ = update_tx
                    .send(DraftUpdate::Tick { seconds_remaining })
                    .await;
            }
            Ok(Transition::Completed) => {
                complete(&state, &mut clock, store.as_ref(), &update_tx).await;
            }
            Ok(Transition::Idle) => {}
            Err(e) => {
                warn!("Draft command rejected: {}", e);
                let _ = update_tx
                    .send(DraftUpdate::Rejected {
                        reason: e.to_string(),
                    })
                    .await;
            }
        }
    }

    clock.stop();
    info!("Draft session for game {} ended", state.game_id);
    state
}

async fn complete(
    state: &DraftState,
    clock: &mut PickClock,
    store: &dyn LeagueStore,
    update_tx: &mpsc::Sender<DraftUpdate>,
) {
    clock.stop();
    let snapshot = DraftSnapshot::from_state(state);
    let _ = update_tx.send(DraftUpdate::Completed { snapshot }).await;
    finalize_draft(state, store, update_tx).await;
}

async fn finalize_draft(
    state: &DraftState,
    store: &dyn LeagueStore,
    update_tx: &mpsc::Sender<DraftUpdate>,
) {
    match finalize::plan(state) {
        Ok(plan) => {
            let report = finalize::submit(store, &plan).await;
            let _ = update_tx.send(DraftUpdate::Finalized { report }).await;
        }
        Err(e) => {
            warn!("Finalize rejected: {}", e);
            let _ = update_tx
                .send(DraftUpdate::Rejected {
                    reason: e.to_string(),
                })
                .await;
        }
    }
}
