//! Session recording and offline verification.
//!
//! A [`ReplayRecorder`] captures the input of every step of a session plus
//! periodic checksum checkpoints, producing a [`ReplayLog`]. Replaying the
//! log against a freshly built [`Engine`] re-feeds the inputs and compares
//! checksums at each checkpoint, which settles whether a disputed session was
//! played honestly.
//!
//! Steps are counted from 1 and are independent of [`Engine::tick`], which
//! restarts from zero whenever the player restarts the level. A checkpoint
//! holds the checksum *after* its step ran, the same value a client sends
//! with each tick.
//!
//! # Recording
//!
//! ```
//! use verity_engine::prelude::*;
//!
//! let level = LevelDef::new("demo", 32.0, 32.0, 4, 2)
//!     .with_layer(TileLayer::empty("ground", 4, 2, true).with_tile(4, 0, 1, 1))
//!     .with_object(ObjectDef::new("player_spawn", "", 0.0, 0.0, 0.0, 0.0));
//! let mut engine = Engine::new(EngineConfig::default(), &level, &RemoteProvider).unwrap();
//!
//! let mut recorder = ReplayRecorder::new(&engine, 10).unwrap();
//! for _ in 0..30 {
//!     let input = InputSample::held([Key::D]);
//!     engine.update(&input).unwrap();
//!     recorder.record_step(&input, Some(engine.checksum().unwrap()));
//! }
//! let log = recorder.finish();
//!
//! let mut fresh = Engine::new(EngineConfig::default(), &level, &RemoteProvider).unwrap();
//! let result = replay(&mut fresh, &log).unwrap();
//! assert!(result.completed);
//! assert!(result.first_divergence.is_none());
//! ```

use std::collections::BTreeMap;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::input::InputSample;
use crate::snapshot::Snapshot;
use crate::{Engine, EngineError};

// ---------------------------------------------------------------------------
// ReplayLog
// ---------------------------------------------------------------------------

/// A recorded session: starting point plus ordered inputs and checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLog {
    pub level: String,
    /// Snapshot the session was resumed from, if any.
    pub start_snapshot: Option<Snapshot>,
    /// Checksum of the engine before the first step.
    pub initial_checksum: String,
    /// Number of steps recorded. Steps without an input entry replay with an
    /// empty sample.
    pub total_steps: u64,
    pub entries: Vec<ReplayEntry>,
}

/// One entry of a [`ReplayLog`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum ReplayEntry {
    Input { step: u64, input: InputSample },
    Checkpoint { step: u64, checksum: String },
}

// ---------------------------------------------------------------------------
// ReplayResult
// ---------------------------------------------------------------------------

/// Outcome of [`replay`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayResult {
    /// Whether every recorded step ran and matched.
    pub completed: bool,
    pub steps_replayed: u64,
    pub first_divergence: Option<ReplayDivergence>,
}

/// First checkpoint whose checksum did not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDivergence {
    pub step: u64,
    pub expected: String,
    pub actual: String,
}

// ---------------------------------------------------------------------------
// ReplayRecorder
// ---------------------------------------------------------------------------

/// Builds a [`ReplayLog`] while a session runs.
///
/// Call [`record_step`](Self::record_step) after every [`Engine::update`].
#[derive(Debug)]
pub struct ReplayRecorder {
    log: ReplayLog,
    /// Every n-th step keeps its checksum. Zero keeps all of them.
    checkpoint_interval: u64,
}

impl ReplayRecorder {
    /// Starts recording from the current state of `engine`.
    pub fn new(engine: &Engine, checkpoint_interval: u64) -> Result<Self, EngineError> {
        Ok(Self {
            log: ReplayLog {
                level: engine.level().to_string(),
                start_snapshot: engine.start_snapshot().cloned(),
                initial_checksum: engine.checksum()?,
                total_steps: 0,
                entries: Vec::new(),
            },
            checkpoint_interval,
        })
    }

    /// Steps recorded so far.
    pub fn steps(&self) -> u64 {
        self.log.total_steps
    }

    /// Records one step. Empty inputs are not stored; `checksum` is kept when
    /// the step falls on the checkpoint interval.
    pub fn record_step(&mut self, input: &InputSample, checksum: Option<String>) {
        self.log.total_steps += 1;
        let step = self.log.total_steps;

        if !input.is_empty() {
            self.log.entries.push(ReplayEntry::Input {
                step,
                input: input.clone(),
            });
        }

        if let Some(checksum) = checksum {
            if self.checkpoint_interval == 0 || step % self.checkpoint_interval == 0 {
                self.log.entries.push(ReplayEntry::Checkpoint { step, checksum });
            }
        }
    }

    pub fn finish(self) -> ReplayLog {
        self.log
    }
}

// ---------------------------------------------------------------------------
// replay()
// ---------------------------------------------------------------------------

/// Re-feeds `log` into `engine`, which must be freshly built for the same
/// level (and from the same snapshot, if the log has one).
///
/// The log is validated before `engine` is touched. Replay stops at the first
/// diverging checkpoint. A failed snapshot write does not interrupt replay;
/// any other engine error does.
pub fn replay(engine: &mut Engine, log: &ReplayLog) -> anyhow::Result<ReplayResult> {
    let mut inputs: BTreeMap<u64, &InputSample> = BTreeMap::new();
    let mut checkpoints: BTreeMap<u64, &str> = BTreeMap::new();

    for entry in &log.entries {
        let (step, duplicate) = match entry {
            ReplayEntry::Input { step, input } => (*step, inputs.insert(*step, input).is_some()),
            ReplayEntry::Checkpoint { step, checksum } => (*step, checkpoints.insert(*step, checksum).is_some()),
        };
        if duplicate {
            bail!("replay log has two entries of the same kind at step {step}");
        }
        if step == 0 || step > log.total_steps {
            bail!("replay entry at step {step} is outside 1..={}", log.total_steps);
        }
    }

    if engine.level() != log.level {
        bail!("replay log is for level '{}', engine runs '{}'", log.level, engine.level());
    }
    let initial = engine.checksum().context("failed to checksum initial state")?;
    if initial != log.initial_checksum {
        bail!("engine does not start from the recorded initial state");
    }

    let empty = InputSample::default();
    let mut steps_replayed = 0;
    for step in 1..=log.total_steps {
        let input = inputs.get(&step).copied().unwrap_or(&empty);
        match engine.update(input) {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => debug!(step, error = %err, "ignoring persistence failure"),
            Err(err) => return Err(err).with_context(|| format!("replay failed at step {step}")),
        }
        steps_replayed += 1;

        if let Some(&expected) = checkpoints.get(&step) {
            let actual = engine.checksum()?;
            if actual != expected {
                info!(step, "replay diverged");
                return Ok(ReplayResult {
                    completed: false,
                    steps_replayed,
                    first_divergence: Some(ReplayDivergence {
                        step,
                        expected: expected.to_string(),
                        actual,
                    }),
                });
            }
        }
    }

    Ok(ReplayResult {
        completed: true,
        steps_replayed,
        first_divergence: None,
    })
}
