//! Core game state and message dispatch
//!
//! [`Game`] owns everything a single session knows: the connected
//! tunnels, the player roster, the optional round state, and the
//! countdown bookkeeping. It is written sans-IO; all pushes go through
//! the [`Tunnel`] trait and all inputs arrive as decoded messages, so
//! the same code runs under any transport.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use web_time::SystemTime;

use crate::{
    question::QuestionView,
    roster::{self, Id, JoinRequest, PlayerView, Roster},
    round::{RoundState, RoundView},
    session::Tunnel,
};

/// Messages received from clients over the transport layer
///
/// The wire format is JSON with an `action` discriminator, e.g.
/// `{"action": "answer", "answer": 2}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum IncomingMessage {
    /// Request to join the roster with a name and board piece
    Join(JoinRequest),
    /// Answer the outstanding question by option index
    Answer {
        /// Index into the options of the player's current question
        answer: usize,
    },
    /// Request the current roster
    Clients,
}

impl IncomingMessage {
    /// Decodes a client message from its JSON wire form
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if the text is not valid JSON or
    /// does not match any known action.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Messages pushed to clients over the transport layer
///
/// Mirrors [`IncomingMessage`]'s wire format: JSON with an `action`
/// discriminator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum UpdateMessage {
    /// Tells a freshly joined client who they are
    Identity {
        /// The joined player as seen by everyone else
        client: PlayerView,
    },
    /// The full roster, sent on every roster change and on request
    Clients {
        /// All currently connected players
        clients: Vec<PlayerView>,
    },
    /// A fresh question for the receiving player only
    Question {
        /// The challenge text and candidate options
        question: QuestionView,
    },
    /// The verdict on an answer, together with the next question
    Answer {
        /// Whether the chosen option was correct
        correct: bool,
        /// The replacement question
        question: QuestionView,
    },
    /// Scores and status for the current round
    State {
        /// The broadcast projection of the round
        state: RoundView,
    },
    /// Countdown tick
    Timer {
        /// Seconds remaining in the round
        time: u64,
    },
    /// The round has been stopped and discarded
    Stop,
    /// Something about the client's last message was unacceptable
    Error {
        /// Human-readable description of the problem
        message: String,
    },
}

impl UpdateMessage {
    /// Converts the message to its JSON wire form
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never
    /// happen with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Failure to decode a client message
#[derive(Error, Debug)]
#[error("malformed message: {0}")]
pub struct ProtocolError(#[from] serde_json::Error);

/// Outcome of a control-plane operation, for HTTP-style callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    /// Human-readable outcome description
    pub message: String,
    /// Suggested HTTP status code
    pub status_code: u16,
}

impl ActionResult {
    fn ok(message: &str) -> Self {
        Self {
            message: message.to_owned(),
            status_code: 200,
        }
    }
}

/// Errors returned by control-plane and join operations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ActionError {
    /// A round already exists, so the operation cannot proceed
    #[error("round is already running")]
    AlreadyRunning,
    /// The connection already has a player identity
    #[error("connection has already joined")]
    AlreadyJoined,
    /// No round exists, so there is nothing to stop
    #[error("no round is running")]
    NotRunning,
    /// The join request was rejected by the roster
    #[error(transparent)]
    Join(#[from] roster::Error),
    /// The request failed structural validation
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ActionError {
    /// Suggested HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AlreadyRunning
            | Self::AlreadyJoined
            | Self::NotRunning
            | Self::Join(roster::Error::PieceTaken) => 409,
            Self::Join(_) | Self::InvalidRequest(_) => 400,
        }
    }
}

/// Result of scoring one answer
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    /// Whether the chosen option was correct
    pub correct: bool,
    /// The fresh question issued to replace the answered one
    pub question: QuestionView,
}

/// Session status as reported to pollers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No round exists
    None,
    /// A round is live and the countdown is ticking
    Running,
    /// A round exists but its countdown has elapsed
    Paused,
}

/// One roster row in a [`StatusView`]
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    /// Player identity
    pub id: Id,
    /// Display name
    pub name: String,
    /// Chosen board piece
    pub piece: u8,
    /// Cumulative score, zero when no round exists
    pub score: u32,
}

/// Poll-friendly snapshot of the whole session
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    /// Round state machine position
    pub status: SessionStatus,
    /// Seconds remaining in the countdown, zero outside a running round
    pub remaining: u64,
    /// All connected players with their scores
    pub roster: Vec<RosterEntry>,
}

/// The complete state of one game session
///
/// Generic over the tunnel type so tests can use in-memory channels
/// while production uses real transport senders.
pub struct Game<T: Tunnel> {
    /// Open push channels, keyed by connection id
    connections: HashMap<Id, T>,
    /// Connected players
    roster: Roster,
    /// The current round, if any
    round: Option<RoundState>,
    /// Seconds remaining in the countdown
    remaining: u64,
    /// Bumped whenever the countdown is restarted or cancelled, so a
    /// stale countdown task can detect it has been superseded
    pub(crate) timer_epoch: u64,
    /// Handle of the live countdown task, if any
    pub(crate) timer_task: Option<JoinHandle<()>>,
}

impl<T: Tunnel> Default for Game<T> {
    fn default() -> Self {
        Self {
            connections: HashMap::new(),
            roster: Roster::default(),
            round: None,
            remaining: 0,
            timer_epoch: 0,
            timer_task: None,
        }
    }
}

impl<T: Tunnel> Game<T> {
    /// Creates an idle session with no connections
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly opened connection
    ///
    /// The newcomer immediately receives the current roster so
    /// spectators can render the lobby before joining.
    pub fn connect(&mut self, connection: Id, tunnel: T) {
        self.connections.insert(connection, tunnel);
        self.send_to(
            connection,
            &UpdateMessage::Clients {
                clients: self.roster.views(),
            },
        );
    }

    /// Removes a closed connection and the player bound to it
    ///
    /// If the connection had joined, the player leaves the roster and
    /// their round bookkeeping is dropped; everyone else sees the
    /// updated roster. A spectator connection disappears silently.
    pub fn disconnect(&mut self, connection: Id) {
        self.connections.remove(&connection);

        let Some(player) = self.roster.remove_by_connection(connection) else {
            return;
        };

        log::info!("player {} left the session", player.name);
        if let Some(round) = self.round.as_mut() {
            round.remove_player(player.id);
        }
        self.broadcast_roster();
    }

    /// Adds a player to the roster
    ///
    /// Joins are only accepted while no round exists; a paused round
    /// still blocks joining, since mid-session arrivals would start
    /// with no score history. A connection carries at most one player,
    /// so a second join on the same connection is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::AlreadyRunning`] while a round exists,
    /// [`ActionError::AlreadyJoined`] when the connection already has
    /// a player, [`ActionError::InvalidRequest`] when the request
    /// fails structural validation, or a roster error.
    pub fn join(
        &mut self,
        connection: Id,
        request: &JoinRequest,
    ) -> Result<PlayerView, ActionError> {
        if self.round.is_some() {
            return Err(ActionError::AlreadyRunning);
        }

        if self.roster.find_by_connection(connection).is_some() {
            return Err(ActionError::AlreadyJoined);
        }

        garde::Validate::validate(request)
            .map_err(|report| ActionError::InvalidRequest(report.to_string()))?;

        let view = self.roster.join(&request.name, request.piece, connection)?;
        log::info!("player {} joined with piece {}", view.name, view.piece);
        self.broadcast_roster();

        Ok(view)
    }

    /// Starts a new round or resumes a paused one
    ///
    /// Every player receives a fresh question, then the round state is
    /// broadcast. The caller is responsible for spinning up the
    /// countdown task afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::AlreadyRunning`] if a round is already
    /// running.
    pub(crate) fn begin_round(&mut self) -> Result<ActionResult, ActionError> {
        let result = match self.round.as_mut() {
            Some(round) if round.is_running() => return Err(ActionError::AlreadyRunning),
            Some(round) => {
                round.resume();
                log::info!("round resumed");
                ActionResult::ok("Game has been resumed")
            }
            None => {
                self.round = Some(RoundState::new(self.roster.ids().collect_vec()));
                log::info!("round started with {} players", self.roster.len());
                ActionResult::ok("New round has been started")
            }
        };

        for id in self.roster.ids().collect_vec() {
            self.reissue_question(id);
        }
        self.broadcast_state();

        Ok(result)
    }

    /// Stops and discards the current round
    ///
    /// Cancels the countdown task, zeroes the timer, and tells every
    /// client the round is gone. Scores do not survive a stop.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::NotRunning`] if no round exists.
    pub(crate) fn end_round(&mut self) -> Result<ActionResult, ActionError> {
        if self.round.is_none() {
            return Err(ActionError::NotRunning);
        }

        if let Some(task) = self.timer_task.take() {
            task.abort();
        }
        self.timer_epoch += 1;
        self.remaining = 0;
        self.round = None;

        log::info!("round stopped");
        self.broadcast(&UpdateMessage::Timer { time: 0 });
        self.broadcast(&UpdateMessage::Stop);

        Ok(ActionResult::ok("Game has been stopped"))
    }

    /// Scores an answer from the given player
    ///
    /// Returns `None` when no round is running, so late answers after
    /// the countdown elapses are dropped rather than scored. A scored
    /// answer always yields a replacement question; a correct one also
    /// triggers a state broadcast so every client sees the new score.
    pub fn answer(&mut self, player: Id, option_index: usize) -> Option<AnswerOutcome> {
        if !self.round_running() {
            return None;
        }

        let answered_at = SystemTime::now();
        let correct = self
            .round
            .as_mut()?
            .answer(player, option_index, answered_at);

        log::debug!("player {player} answered option {option_index}, correct: {correct}");
        if correct {
            self.broadcast_state();
        }

        let question = self.round.as_mut()?.issue_question(player);
        Some(AnswerOutcome { correct, question })
    }

    /// Handles one decoded message from a client connection
    pub fn handle_message(&mut self, connection: Id, message: IncomingMessage) {
        match message {
            IncomingMessage::Join(request) => match self.join(connection, &request) {
                Ok(client) => self.send_to(connection, &UpdateMessage::Identity { client }),
                Err(error) => self.send_error(connection, &error.to_string()),
            },
            IncomingMessage::Answer { answer } => {
                let Some(player) = self.roster.find_by_connection(connection).map(|p| p.id)
                else {
                    self.send_error(connection, "you have not joined the game");
                    return;
                };
                // Answers outside a running round are dropped silently;
                // a reply would race the pause broadcast for no benefit.
                if let Some(AnswerOutcome { correct, question }) = self.answer(player, answer) {
                    self.send_to(connection, &UpdateMessage::Answer { correct, question });
                }
            }
            IncomingMessage::Clients => self.send_to(
                connection,
                &UpdateMessage::Clients {
                    clients: self.roster.views(),
                },
            ),
        }
    }

    /// Handles one raw text frame from a client connection
    ///
    /// A frame that fails to decode earns the sender an error push and
    /// is otherwise ignored; a malformed client cannot disturb the
    /// session.
    pub fn handle_text(&mut self, connection: Id, text: &str) {
        match IncomingMessage::from_json(text) {
            Ok(message) => self.handle_message(connection, message),
            Err(error) => {
                log::warn!("undecodable message from {connection}: {error}");
                self.send_error(connection, &error.to_string());
            }
        }
    }

    /// Records and broadcasts one countdown tick
    pub(crate) fn tick(&mut self, remaining: u64) {
        self.remaining = remaining;
        self.broadcast(&UpdateMessage::Timer { time: remaining });
    }

    /// Ends the countdown and pauses the round
    ///
    /// Pausing triggers the score-to-movement conversion inside the
    /// state broadcast.
    pub(crate) fn finalize_round(&mut self) {
        self.remaining = 0;
        self.broadcast(&UpdateMessage::Timer { time: 0 });
        if let Some(round) = self.round.as_mut() {
            round.pause();
        }
        log::info!("round countdown elapsed");
        self.broadcast_state();
    }

    /// Returns `true` while a round exists and is running
    pub fn round_running(&self) -> bool {
        self.round.as_ref().is_some_and(RoundState::is_running)
    }

    /// Returns `true` while a round exists, running or paused
    pub fn is_running(&self) -> bool {
        self.round.is_some()
    }

    /// Builds a poll-friendly snapshot of the session
    pub fn status(&self) -> StatusView {
        let status = match self.round.as_ref() {
            None => SessionStatus::None,
            Some(round) if round.is_running() => SessionStatus::Running,
            Some(_) => SessionStatus::Paused,
        };

        let roster = self
            .roster
            .iter()
            .map(|player| RosterEntry {
                id: player.id,
                name: player.name.clone(),
                piece: player.piece,
                score: self
                    .round
                    .as_ref()
                    .and_then(|round| round.score(player.id))
                    .unwrap_or(0),
            })
            .collect_vec();

        StatusView {
            status,
            remaining: self.remaining,
            roster,
        }
    }

    /// Issues a fresh question to the player and pushes it to them
    fn reissue_question(&mut self, player: Id) {
        let Some(round) = self.round.as_mut() else {
            return;
        };
        let question = round.issue_question(player);
        let Some(connection) = self.roster.get(player).map(|p| p.connection) else {
            return;
        };
        self.send_to(connection, &UpdateMessage::Question { question });
    }

    /// Broadcasts the round state to every connection
    fn broadcast_state(&mut self) {
        let Some(round) = self.round.as_mut() else {
            return;
        };
        let state = round.view();
        self.broadcast(&UpdateMessage::State { state });
    }

    /// Broadcasts the roster to every connection
    fn broadcast_roster(&self) {
        self.broadcast(&UpdateMessage::Clients {
            clients: self.roster.views(),
        });
    }

    /// Sends a message to every open connection, best effort
    fn broadcast(&self, message: &UpdateMessage) {
        for tunnel in self.connections.values() {
            tunnel.send_message(message);
        }
    }

    /// Sends a message to one connection, best effort
    fn send_to(&self, connection: Id, message: &UpdateMessage) {
        if let Some(tunnel) = self.connections.get(&connection) {
            tunnel.send_message(message);
        }
    }

    /// Pushes an error message to one connection
    fn send_error(&self, connection: Id, message: &str) {
        self.send_to(
            connection,
            &UpdateMessage::Error {
                message: message.to_owned(),
            },
        );
    }

    /// Direct access to the round for deterministic tests
    #[cfg(test)]
    pub(crate) fn round_mut(&mut self) -> Option<&mut RoundState> {
        self.round.as_mut()
    }
}
