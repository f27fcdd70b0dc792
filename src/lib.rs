//! # Quizboard Session Library
//!
//! This library provides the core session logic for a real-time
//! multiplayer board game driven by rapid-fire arithmetic questions.
//! Players join a shared session with a name and a board piece, and
//! each timed round every player races through their own stream of
//! questions; faster correct answers earn more points, and when the
//! round's countdown elapses the scores are converted into board
//! movement.
//!
//! The library is sans-IO: all client pushes go through the
//! [`session::Tunnel`] trait and the transport layer feeds decoded (or
//! raw JSON) messages in, so the same session logic runs behind
//! WebSockets, Server-Sent Events, or in-memory test channels.

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

pub mod constants;

pub mod game;
pub mod question;
pub mod roster;
pub mod round;
pub mod session;
mod timer;

pub use game::{
    ActionError, ActionResult, AnswerOutcome, Game, IncomingMessage, StatusView, UpdateMessage,
};
pub use roster::{Id, JoinRequest, PlayerView};
pub use session::{Session, Tunnel};
