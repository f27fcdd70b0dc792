//! Round countdown task
//!
//! One task per running round, spawned by
//! [`Session::start`](crate::session::Session::start). The task
//! wakes once per second, takes the session lock, and broadcasts the
//! remaining time; after the final second it pauses the round instead.
//!
//! A task can outlive its round when the round is stopped or restarted
//! while the task is asleep. The epoch captured at spawn time detects
//! this: the session bumps `timer_epoch` whenever the countdown is
//! superseded, and a task whose epoch no longer matches exits without
//! touching anything.

use std::sync::Arc;

use tokio::{sync::Mutex, time::sleep};

use crate::{constants::round::DURATION_SECONDS, game::Game, session::Tunnel};

const TICK: std::time::Duration = std::time::Duration::from_secs(1);

/// Runs one full round countdown against the shared game state
pub(crate) async fn run<T: Tunnel + Send>(game: Arc<Mutex<Game<T>>>, epoch: u64) {
    for remaining in (1..DURATION_SECONDS).rev() {
        sleep(TICK).await;
        let mut game = game.lock().await;
        if game.timer_epoch != epoch || !game.round_running() {
            return;
        }
        log::debug!("countdown tick, {remaining}s remaining");
        game.tick(remaining);
    }

    sleep(TICK).await;
    let mut game = game.lock().await;
    if game.timer_epoch != epoch || !game.round_running() {
        return;
    }
    game.finalize_round();
}
