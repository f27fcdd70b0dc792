//! Player roster management
//!
//! This module tracks the set of connected players: their identity,
//! display name, and chosen board piece. It validates join requests
//! (name content, piece uniqueness) and keeps the mapping from players
//! to the transport connections that carry their messages.

use std::{fmt::Display, str::FromStr};

use garde::Validate;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use crate::constants::roster::MAX_NAME_LENGTH;

/// A unique identifier for players and connections
///
/// Player ids are minted when a join succeeds; connection ids are
/// minted by the transport layer when a socket opens. Both use the
/// same opaque UUID-backed type.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an identifier from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// A join request as decoded from the transport layer
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct JoinRequest {
    /// Requested display name
    #[garde(length(min = 1, max = crate::constants::roster::MAX_NAME_LENGTH))]
    pub name: String,
    /// Requested board piece identifier
    #[garde(range(
        min = crate::constants::roster::MIN_PIECE,
        max = crate::constants::roster::MAX_PIECE
    ))]
    pub piece: u8,
}

/// Errors that can occur when joining the roster
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested board piece is already held by a connected player
    #[error("someone is already using this piece")]
    PieceTaken,
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    EmptyName,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    NameTooLong,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    InappropriateName,
}

/// A connected player
///
/// The `connection` field is the id of the push channel owned by the
/// transport layer; the session only ever sends through it, it never
/// takes the channel over.
#[derive(Debug, Clone)]
pub struct Player {
    /// Unique player identity, minted at join time
    pub id: Id,
    /// Display name shown to all participants
    pub name: String,
    /// Chosen board piece, unique among connected players
    pub piece: u8,
    /// Id of the transport connection carrying this player's messages
    pub connection: Id,
}

impl Player {
    /// Returns the client-facing projection of this player
    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id,
            name: self.name.clone(),
            piece: self.piece,
        }
    }
}

/// The client-facing projection of a [`Player`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerView {
    /// Unique player identity
    pub id: Id,
    /// Display name
    pub name: String,
    /// Chosen board piece
    pub piece: u8,
}

/// The set of currently connected players
#[derive(Debug, Default)]
pub struct Roster {
    players: Vec<Player>,
}

/// Validates and normalizes a requested display name
fn clean_name(name: &str) -> Result<String, Error> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::EmptyName);
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::NameTooLong);
    }
    if name.is_inappropriate() {
        return Err(Error::InappropriateName);
    }
    Ok(name.to_owned())
}

impl Roster {
    /// Adds a new player to the roster
    ///
    /// Mints a fresh player id and associates it with the given
    /// transport connection. The caller is responsible for rejecting
    /// joins while a round is active; this method only enforces
    /// roster-local rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PieceTaken`] if the piece is already held by a
    /// connected player, or a name validation error.
    pub fn join(&mut self, name: &str, piece: u8, connection: Id) -> Result<PlayerView, Error> {
        let name = clean_name(name)?;

        if self.players.iter().any(|player| player.piece == piece) {
            return Err(Error::PieceTaken);
        }

        let player = Player {
            id: Id::new(),
            name,
            piece,
            connection,
        };
        let view = player.view();
        self.players.push(player);

        Ok(view)
    }

    /// Removes and returns the player bound to the given connection
    ///
    /// Returns `None` if the connection never joined (e.g. a spectator),
    /// which is not an error.
    pub fn remove_by_connection(&mut self, connection: Id) -> Option<Player> {
        let index = self
            .players
            .iter()
            .position(|player| player.connection == connection)?;
        Some(self.players.remove(index))
    }

    /// Looks up a player by their connection id
    pub fn find_by_connection(&self, connection: Id) -> Option<&Player> {
        self.players
            .iter()
            .find(|player| player.connection == connection)
    }

    /// Looks up a player by their player id
    pub fn get(&self, id: Id) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    /// Iterates over all connected players
    pub fn iter(&self) -> std::slice::Iter<'_, Player> {
        self.players.iter()
    }

    /// Returns the ids of all connected players
    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.players.iter().map(|player| player.id)
    }

    /// Returns the client-facing projection of the full roster
    pub fn views(&self) -> Vec<PlayerView> {
        self.players.iter().map(Player::view).collect()
    }

    /// Returns the number of connected players
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` if no players are connected
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
