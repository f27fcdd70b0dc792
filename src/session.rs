//! Session handle and the client communication seam
//!
//! [`Tunnel`] abstracts the push channel to a single client so the
//! game logic stays transport-agnostic; a WebSocket sender, an SSE
//! writer, or an in-memory test channel all fit behind it.
//!
//! [`Session`] wraps a [`Game`] in a shared async mutex and exposes
//! the operations a transport or HTTP layer calls. Every operation
//! takes the lock once, mutates, and releases, so the session behaves
//! as a single-writer state machine no matter how many tasks hold a
//! handle.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{
    constants::round::DURATION_SECONDS,
    game::{
        ActionError, ActionResult, AnswerOutcome, Game, IncomingMessage, StatusView, UpdateMessage,
    },
    roster::{Id, JoinRequest, PlayerView},
    timer,
};

/// Trait for sending messages through a communication tunnel
///
/// Sends are fire-and-forget; a tunnel whose peer has gone away should
/// swallow the failure, and the session will drop the connection when
/// the transport reports the close.
pub trait Tunnel {
    /// Sends an update message to the client
    fn send_message(&self, message: &UpdateMessage);
}

impl Tunnel for tokio::sync::mpsc::UnboundedSender<UpdateMessage> {
    fn send_message(&self, message: &UpdateMessage) {
        // A closed receiver means the client is gone; nothing to do.
        let _ = self.send(message.clone());
    }
}

/// A cloneable handle to one shared game session
pub struct Session<T: Tunnel> {
    game: Arc<Mutex<Game<T>>>,
}

impl<T: Tunnel> Clone for Session<T> {
    fn clone(&self) -> Self {
        Self {
            game: Arc::clone(&self.game),
        }
    }
}

impl<T: Tunnel> Default for Session<T>
where
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tunnel + Send + 'static> Session<T> {
    /// Creates an idle session with no connections
    pub fn new() -> Self {
        Self {
            game: Arc::new(Mutex::new(Game::new())),
        }
    }

    /// Registers a freshly opened connection
    pub async fn connect(&self, connection: Id, tunnel: T) {
        self.game.lock().await.connect(connection, tunnel);
    }

    /// Removes a closed connection and the player bound to it
    pub async fn disconnect(&self, connection: Id) {
        self.game.lock().await.disconnect(connection);
    }

    /// Handles one raw text frame from a client connection
    pub async fn handle_text(&self, connection: Id, text: &str) {
        self.game.lock().await.handle_text(connection, text);
    }

    /// Handles one decoded message from a client connection
    pub async fn handle_message(&self, connection: Id, message: IncomingMessage) {
        self.game.lock().await.handle_message(connection, message);
    }

    /// Adds a player to the roster
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] if a round exists or the request is
    /// rejected, see [`Game::join`].
    pub async fn join(
        &self,
        connection: Id,
        request: &JoinRequest,
    ) -> Result<PlayerView, ActionError> {
        self.game.lock().await.join(connection, request)
    }

    /// Scores an answer from the given player
    pub async fn answer(&self, player: Id, option_index: usize) -> Option<AnswerOutcome> {
        self.game.lock().await.answer(player, option_index)
    }

    /// Starts a new round or resumes a paused one
    ///
    /// On success the countdown task is (re)started for a full
    /// [`DURATION_SECONDS`] run; any previous countdown is cancelled
    /// first so only one task ever ticks.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::AlreadyRunning`] if a round is already
    /// running.
    pub async fn start(&self) -> Result<ActionResult, ActionError> {
        let mut game = self.game.lock().await;
        let result = game.begin_round()?;

        if let Some(task) = game.timer_task.take() {
            task.abort();
        }
        game.timer_epoch += 1;
        game.tick(DURATION_SECONDS);

        let epoch = game.timer_epoch;
        game.timer_task = Some(tokio::spawn(timer::run(Arc::clone(&self.game), epoch)));

        Ok(result)
    }

    /// Stops and discards the current round
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::NotRunning`] if no round exists.
    pub async fn stop(&self) -> Result<ActionResult, ActionError> {
        self.game.lock().await.end_round()
    }

    /// Returns `true` while a round exists, running or paused
    pub async fn is_running(&self) -> bool {
        self.game.lock().await.is_running()
    }

    /// Builds a poll-friendly snapshot of the session
    pub async fn status(&self) -> StatusView {
        self.game.lock().await.status()
    }
}
