//! Interactive sub-games: NPC dialogs and arcade machines.
//!
//! The engine does not interpret sub-game content. It starts, stops and feeds
//! a [`SubGame`] and reads back an opaque [`SubGameState`]. On the server the
//! state is authoritative and is pushed to the client after every accepted
//! tick; the client side runs [`RemoteSubGame`], which only mirrors what it is
//! told.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use verity_world::prelude::*;

use crate::input::{InputSample, Key};

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Errors raised by sub-games and their providers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubGameError {
    #[error("no {kind} registered with id '{id}'")]
    UnknownId { kind: SubGameKind, id: String },

    #[error("{0}")]
    Failed(String),
}

/// The two trigger categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubGameKind {
    Dialog,
    Arcade,
}

impl fmt::Display for SubGameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubGameKind::Dialog => f.write_str("dialog"),
            SubGameKind::Arcade => f.write_str("arcade"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    #[default]
    Pending,
    Won,
    Lost,
}

/// Serializable state of a sub-game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubGameState {
    pub outcome: Outcome,
    /// No more input is accepted.
    pub finished: bool,
    /// Content-specific state, e.g. dialog text.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A dialog or minigame that takes focus from the world.
pub trait SubGame: Send {
    fn start(&mut self) -> Result<(), SubGameError>;
    fn stop(&mut self) -> Result<(), SubGameError>;
    fn feed(&mut self, input: &InputSample) -> Result<(), SubGameError>;
    fn state(&self) -> SubGameState;

    /// Overwrites the local state with an authoritative copy.
    fn apply_state(&mut self, _state: SubGameState) {}
}

/// Creates sub-games for the triggers found in a level.
pub trait SubGameProvider {
    fn create(&self, kind: SubGameKind, id: &str) -> Result<Box<dyn SubGame>, SubGameError>;
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// An NPC or arcade machine placed in the level.
#[derive(Serialize)]
pub struct Trigger {
    pub body: Body,
    pub kind: SubGameKind,
    /// Sub-game id as named in the level.
    pub id: String,
    /// Name of the item handed over on a win.
    pub reward_item: String,
    /// Index of the reward item until it has been handed over.
    pub linked_item: Option<usize>,
    #[serde(skip_serializing)]
    pub(crate) game: Box<dyn SubGame>,
}

impl Trigger {
    pub fn new(
        body: Body,
        kind: SubGameKind,
        id: impl Into<String>,
        reward_item: impl Into<String>,
        game: Box<dyn SubGame>,
    ) -> Self {
        Self {
            body,
            kind,
            id: id.into(),
            reward_item: reward_item.into(),
            linked_item: None,
            game,
        }
    }

    pub fn state(&self) -> SubGameState {
        self.game.state()
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("body", &self.body)
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("reward_item", &self.reward_item)
            .field("linked_item", &self.linked_item)
            .finish_non_exhaustive()
    }
}

impl HasRectangle for Trigger {
    fn rectangle(&self) -> Rectangle {
        self.body.rectangle()
    }
}

impl Collidable for Trigger {}

// ---------------------------------------------------------------------------
// Remote mirror
// ---------------------------------------------------------------------------

/// Client-side stand-in whose state only changes through
/// [`SubGame::apply_state`].
#[derive(Debug, Default)]
pub struct RemoteSubGame {
    state: SubGameState,
}

impl SubGame for RemoteSubGame {
    fn start(&mut self) -> Result<(), SubGameError> {
        self.state = SubGameState::default();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SubGameError> {
        Ok(())
    }

    fn feed(&mut self, _input: &InputSample) -> Result<(), SubGameError> {
        Ok(())
    }

    fn state(&self) -> SubGameState {
        self.state.clone()
    }

    fn apply_state(&mut self, state: SubGameState) {
        self.state = state;
    }
}

/// Provides a [`RemoteSubGame`] for every id.
#[derive(Debug, Default, Clone, Copy)]
pub struct RemoteProvider;

impl SubGameProvider for RemoteProvider {
    fn create(&self, _kind: SubGameKind, _id: &str) -> Result<Box<dyn SubGame>, SubGameError> {
        Ok(Box::new(RemoteSubGame::default()))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

type Factory = Box<dyn Fn() -> Box<dyn SubGame> + Send + Sync>;

/// Id-keyed sub-game factories.
#[derive(Default)]
pub struct Registry {
    factories: BTreeMap<(SubGameKind, String), Factory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, G>(&mut self, kind: SubGameKind, id: impl Into<String>, factory: F)
    where
        F: Fn() -> G + Send + Sync + 'static,
        G: SubGame + 'static,
    {
        self.factories.insert(
            (kind, id.into()),
            Box::new(move || Box::new(factory()) as Box<dyn SubGame>),
        );
    }

    pub fn with<F, G>(mut self, kind: SubGameKind, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> G + Send + Sync + 'static,
        G: SubGame + 'static,
    {
        self.register(kind, id, factory);
        self
    }
}

impl SubGameProvider for Registry {
    fn create(&self, kind: SubGameKind, id: &str) -> Result<Box<dyn SubGame>, SubGameError> {
        self.factories
            .get(&(kind, id.to_string()))
            .map(|factory| factory())
            .ok_or_else(|| SubGameError::UnknownId {
                kind,
                id: id.to_string(),
            })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

// ---------------------------------------------------------------------------
// ScriptedDialog
// ---------------------------------------------------------------------------

/// Riddle-style dialog: shows a greeting, collects a typed answer, and wins
/// when Enter submits the expected text.
#[derive(Debug, Clone)]
pub struct ScriptedDialog {
    greeting: String,
    answer: String,
    success: String,
    failure: String,
    typed: String,
    text: String,
    state: SubGameState,
}

#[derive(Serialize)]
struct DialogPayload<'a> {
    text: &'a str,
    typed: &'a str,
}

impl ScriptedDialog {
    pub fn new(greeting: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            greeting: greeting.into(),
            answer: answer.into(),
            success: "Correct!".to_string(),
            failure: "Wrong.".to_string(),
            typed: String::new(),
            text: String::new(),
            state: SubGameState::default(),
        }
    }

    pub fn with_replies(mut self, success: impl Into<String>, failure: impl Into<String>) -> Self {
        self.success = success.into();
        self.failure = failure.into();
        self
    }

    fn refresh(&mut self) {
        self.state.payload = serde_json::to_value(DialogPayload {
            text: &self.text,
            typed: &self.typed,
        })
        .unwrap_or_default();
    }

    fn submit(&mut self) {
        if self.typed.trim() == self.answer {
            self.text = self.success.clone();
            self.state.outcome = Outcome::Won;
        } else {
            self.text = self.failure.clone();
            self.state.outcome = Outcome::Lost;
        }
        self.state.finished = true;
    }
}

impl SubGame for ScriptedDialog {
    fn start(&mut self) -> Result<(), SubGameError> {
        self.typed.clear();
        self.text = self.greeting.clone();
        self.state = SubGameState::default();
        self.refresh();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SubGameError> {
        Ok(())
    }

    fn feed(&mut self, input: &InputSample) -> Result<(), SubGameError> {
        if self.state.finished {
            return Ok(());
        }
        for key in &input.newly_pressed {
            match key {
                Key::Enter => {
                    self.submit();
                    break;
                }
                Key::Backspace => {
                    self.typed.pop();
                }
                other => {
                    if let Some(c) = other.to_char() {
                        self.typed.push(c);
                    }
                }
            }
        }
        self.refresh();
        Ok(())
    }

    fn state(&self) -> SubGameState {
        self.state.clone()
    }
}
