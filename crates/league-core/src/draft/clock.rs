// Pick clock: a background ticker feeding the draft session queue.

use std::time::Duration;

use tokio::sync::mpsc::WeakSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::protocol::DraftCommand;

/// Sends `DraftCommand::Tick` into the session queue once per period.
///
/// Holds only a weak sender, so a running clock never keeps the session
/// alive on its own. At most one ticker task runs at a time.
pub struct PickClock {
    period: Duration,
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl PickClock {
    pub fn new(period: Duration) -> Self {
        PickClock {
            period,
            generation: 0,
            handle: None,
        }
    }

    /// Start a fresh run, cancelling any run in progress. Returns the
    /// generation stamped on this run's ticks.
    pub fn start(&mut self, tx: WeakSender<DraftCommand>) -> u64 {
        self.stop();
        self.generation += 1;
        let generation = self.generation;
        let period = self.period;

        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(tx) = tx.upgrade() else {
                    debug!("Pick clock {} stopping: session gone", generation);
                    break;
                };
                if tx.send(DraftCommand::Tick { generation }).await.is_err() {
                    break;
                }
            }
        }));
        generation
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Generation of the most recent run; ticks stamped otherwise are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for PickClock {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const PERIOD: Duration = Duration::from_secs(1);

    fn drain(rx: &mut mpsc::Receiver<DraftCommand>) -> Vec<DraftCommand> {
        let mut out = Vec::new();
        while let Ok(cmd) = rx.try_recv() {
            out.push(cmd);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut clock = PickClock::new(PERIOD);
        let generation = clock.start(tx.downgrade());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let ticks = drain(&mut rx);
        assert_eq!(ticks.len(), 3);
        assert!(ticks
            .iter()
            .all(|t| *t == DraftCommand::Tick { generation }));
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_replaces_running_ticker() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut clock = PickClock::new(PERIOD);
        let first = clock.start(tx.downgrade());
        let second = clock.start(tx.downgrade());
        assert_ne!(first, second);
        assert_eq!(clock.generation(), second);

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let ticks = drain(&mut rx);
        assert_eq!(ticks.len(), 2);
        assert!(ticks
            .iter()
            .all(|t| *t == DraftCommand::Tick { generation: second }));
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_ticks() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut clock = PickClock::new(PERIOD);
        clock.start(tx.downgrade());
        assert!(clock.is_running());
        clock.stop();
        assert!(!clock.is_running());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(drain(&mut rx).is_empty());
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_last_sender_ends_the_ticker() {
        let (tx, mut rx) = mpsc::channel(16);
        let mut clock = PickClock::new(PERIOD);
        clock.start(tx.downgrade());
        drop(tx);

        assert!(rx.recv().await.is_none());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!clock.is_running());
    }
}
