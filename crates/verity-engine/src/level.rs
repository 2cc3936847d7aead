//! Level definitions and their conversion into world entities.
//!
//! A [`LevelDef`] is plain data, usually read from JSON. [`LevelContent::build`]
//! turns it into typed entity collections and rejects broken content before
//! a single tick runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use verity_world::prelude::*;

use crate::boss::{BossEntity, BossV1, BossV2};
use crate::config::Rules;
use crate::subgame::{SubGameKind, SubGameProvider, Trigger};
use crate::LevelError;

/// Platforms whose name starts with this belong to the boss arena.
const BOSS_PLATFORM_PREFIX: &str = "boss";

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// A tile map with typed object markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelDef {
    pub name: String,
    pub tile_width: f64,
    pub tile_height: f64,
    /// Map size in tiles.
    pub width: usize,
    pub height: usize,
    #[serde(default)]
    pub layers: Vec<TileLayer>,
    #[serde(default)]
    pub image_layers: Vec<ImageLayer>,
    #[serde(default)]
    pub objects: Vec<ObjectDef>,
}

/// Row-major tile ids. Zero means "no tile".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileLayer {
    pub name: String,
    /// Tiles of a collision layer are solid; others are background.
    #[serde(default)]
    pub collisions: bool,
    pub tiles: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLayer {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// A typed marker placed in the level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDef {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl LevelDef {
    pub fn new(name: impl Into<String>, tile_width: f64, tile_height: f64, width: usize, height: usize) -> Self {
        Self {
            name: name.into(),
            tile_width,
            tile_height,
            width,
            height,
            layers: Vec::new(),
            image_layers: Vec::new(),
            objects: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_layer(mut self, layer: TileLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn with_object(mut self, object: ObjectDef) -> Self {
        self.objects.push(object);
        self
    }
}

impl TileLayer {
    /// Layer of the map's size with every tile empty.
    pub fn empty(name: impl Into<String>, width: usize, height: usize, collisions: bool) -> Self {
        Self {
            name: name.into(),
            collisions,
            tiles: vec![0; width * height],
        }
    }

    /// Sets the tile at grid position (`col`, `row`) for a map `width` tiles wide.
    pub fn with_tile(mut self, width: usize, col: usize, row: usize, gid: u32) -> Self {
        if let Some(slot) = self.tiles.get_mut(row * width + col) {
            *slot = gid;
        }
        self
    }
}

impl ObjectDef {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            x,
            y,
            width,
            height,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    fn body(&self) -> Body {
        Body::new(self.origin(), self.width, self.height)
    }

    fn bad_property(&self, property: &str, expected: &'static str) -> LevelError {
        LevelError::BadProperty {
            object: self.name.clone(),
            property: property.to_string(),
            expected,
        }
    }

    /// String property. Missing and empty both read as `None`.
    pub fn string(&self, key: &str) -> Result<Option<&str>, LevelError> {
        match self.properties.get(key) {
            None => Ok(None),
            Some(serde_json::Value::String(s)) if s.is_empty() => Ok(None),
            Some(serde_json::Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(self.bad_property(key, "string")),
        }
    }

    /// Boolean property, `false` when missing.
    pub fn flag(&self, key: &str) -> Result<bool, LevelError> {
        match self.properties.get(key) {
            None => Ok(false),
            Some(serde_json::Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.bad_property(key, "bool")),
        }
    }

    /// Numeric property, `default` when missing.
    pub fn number(&self, key: &str, default: f64) -> Result<f64, LevelError> {
        match self.properties.get(key) {
            None => Ok(default),
            Some(value) => value.as_f64().ok_or_else(|| self.bad_property(key, "number")),
        }
    }

    fn path(&self) -> Result<MovementPath, LevelError> {
        match self.string("path")? {
            None => Ok(MovementPath::None),
            Some(keyword) => keyword.parse().map_err(|source| LevelError::Path {
                object: self.name.clone(),
                source,
            }),
        }
    }

    fn motion(&self) -> Result<MovingObject, LevelError> {
        Ok(MovingObject::new(
            self.origin(),
            self.width,
            self.height,
            self.path()?,
            self.number("distance", 0.0)?,
            self.number("speed", 0.0)?,
        ))
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// Where the boss fight's props live.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BossArena {
    /// Index of the boss reward item.
    pub item: usize,
    /// Index of the portal that opens the arena.
    pub portal: usize,
    /// Where the entry portal stood before it was retracted.
    pub portal_origin: Point,
    pub win_point: Point,
}

/// Entity collections built from a [`LevelDef`].
#[derive(Debug)]
pub struct LevelContent {
    pub tiles: Vec<StaticTile>,
    pub background: Vec<BackgroundImage>,
    pub player_spawn: Point,
    pub items: Vec<Item>,
    /// Sorted by name.
    pub portals: Vec<Portal>,
    pub spikes: Vec<Spike>,
    pub platforms: Vec<Platform>,
    pub npcs: Vec<Trigger>,
    pub arcades: Vec<Trigger>,
    pub slots: Vec<SlotMachine>,
    pub boss: Option<(BossEntity, BossArena)>,
}

impl LevelContent {
    /// Builds every entity of `def`.
    pub fn build(def: &LevelDef, rules: &Rules, provider: &dyn SubGameProvider) -> Result<Self, LevelError> {
        let (tiles, background) = build_tiles(def)?;

        let mut player_spawn = None;
        let mut items = Vec::new();
        let mut portals_by_name: BTreeMap<String, Portal> = BTreeMap::new();
        let mut spikes = Vec::new();
        let mut platforms = Vec::new();
        let mut npcs = Vec::new();
        let mut arcades = Vec::new();
        let mut slots = Vec::new();
        let mut boss_marker: Option<&ObjectDef> = None;
        let mut win_point = None;

        for object in &def.objects {
            match object.kind.as_str() {
                "player_spawn" => {
                    player_spawn.get_or_insert(object.origin());
                }
                "item" => items.push(Item {
                    body: object.body(),
                    name: object.name.clone(),
                    important: object.flag("important")?,
                    boss: object.flag("boss")?,
                    collected: false,
                }),
                "portal" => {
                    portals_by_name.insert(
                        object.name.clone(),
                        Portal {
                            body: object.body(),
                            name: object.name.clone(),
                            destination: object.string("portal-to")?.map(str::to_string),
                            teleport_to: None,
                            boss: object.string("boss")?.map(str::to_string),
                        },
                    );
                }
                "spike" => spikes.push(Spike {
                    motion: object.motion()?,
                    damage: rules.hazard(object.number("damage", rules.spike_damage as f64)? as i32),
                }),
                "platform" => platforms.push(Platform {
                    motion: object.motion()?,
                    name: object.name.clone(),
                    collisions_disabled: false,
                }),
                "npc" => npcs.push(build_trigger(object, SubGameKind::Dialog, provider)?),
                "arcade" => arcades.push(build_trigger(object, SubGameKind::Arcade, provider)?),
                "slot" => slots.push(SlotMachine {
                    body: object.body(),
                    payout: object.number("coins", 0.0)? as i64,
                    cooldown: object.number("cooldown", 0.0)? as u64,
                    probability: object.number("probability", 0.0)?,
                    seed: object.number("seed", 0.0)? as u64,
                    last_triggered: None,
                }),
                "boss" => boss_marker = Some(object),
                "boss-win" => win_point = Some(object.origin()),
                other => warn!(kind = other, name = %object.name, "skipping unknown level object"),
            }
        }

        let player_spawn = player_spawn.ok_or_else(|| LevelError::NoPlayerSpawn {
            level: def.name.clone(),
        })?;

        for trigger in npcs.iter_mut().chain(arcades.iter_mut()) {
            let index = items
                .iter()
                .position(|i: &Item| i.name == trigger.reward_item)
                .ok_or_else(|| LevelError::MissingItem {
                    item: trigger.reward_item.clone(),
                    kind: trigger.kind,
                    owner: trigger.id.clone(),
                })?;
            trigger.linked_item = Some(index);
        }

        let destinations: BTreeMap<String, Point> = portals_by_name
            .iter()
            .map(|(name, p)| (name.clone(), p.body.origin))
            .collect();
        for (name, portal) in portals_by_name.iter_mut() {
            let Some(destination) = &portal.destination else {
                continue;
            };
            let target = destinations
                .get(destination)
                .ok_or_else(|| LevelError::MissingPortalDestination {
                    portal: name.clone(),
                    destination: destination.clone(),
                })?;
            portal.teleport_to = Some(*target);
        }
        let portals: Vec<Portal> = portals_by_name.into_values().collect();

        let boss = match boss_marker {
            None => None,
            Some(marker) => Some(build_boss(marker, &items, &portals, &platforms, win_point, rules)?),
        };

        debug!(
            level = %def.name,
            tiles = tiles.len(),
            items = items.len(),
            portals = portals.len(),
            platforms = platforms.len(),
            boss = boss.is_some(),
            "level built"
        );

        Ok(Self {
            tiles,
            background,
            player_spawn,
            items,
            portals,
            spikes,
            platforms,
            npcs,
            arcades,
            slots,
            boss,
        })
    }
}

fn build_tiles(def: &LevelDef) -> Result<(Vec<StaticTile>, Vec<BackgroundImage>), LevelError> {
    let mut tiles = Vec::new();
    let mut background: Vec<BackgroundImage> = def
        .image_layers
        .iter()
        .map(|layer| BackgroundImage {
            body: Body::new(Point::new(layer.x, layer.y), layer.width, layer.height),
        })
        .collect();

    let expected = def.width * def.height;
    for layer in &def.layers {
        if layer.tiles.len() != expected {
            return Err(LevelError::LayerSize {
                layer: layer.name.clone(),
                expected,
                actual: layer.tiles.len(),
            });
        }
        for (i, &gid) in layer.tiles.iter().enumerate() {
            if gid == 0 {
                continue;
            }
            let origin = Point::new(
                (i % def.width) as f64 * def.tile_width,
                (i / def.width) as f64 * def.tile_height,
            );
            let body = Body::new(origin, def.tile_width, def.tile_height);
            if layer.collisions {
                tiles.push(StaticTile { body, gid });
            } else {
                background.push(BackgroundImage { body });
            }
        }
    }
    Ok((tiles, background))
}

fn build_trigger(object: &ObjectDef, kind: SubGameKind, provider: &dyn SubGameProvider) -> Result<Trigger, LevelError> {
    let game = provider
        .create(kind, &object.name)
        .map_err(|source| LevelError::SubGame {
            id: object.name.clone(),
            source,
        })?;
    let reward = object.string("item")?.unwrap_or_default();
    Ok(Trigger::new(object.body(), kind, object.name.clone(), reward, game))
}

fn build_boss(
    marker: &ObjectDef,
    items: &[Item],
    portals: &[Portal],
    platforms: &[Platform],
    win_point: Option<Point>,
    rules: &Rules,
) -> Result<(BossEntity, BossArena), LevelError> {
    let item = items
        .iter()
        .position(|i| i.boss)
        .ok_or(LevelError::IncompleteBossArena { missing: "boss item" })?;
    let portal = portals
        .iter()
        .position(|p| p.boss.is_some())
        .ok_or(LevelError::IncompleteBossArena { missing: "boss portal" })?;
    let win_point = win_point.ok_or(LevelError::IncompleteBossArena { missing: "boss-win marker" })?;

    let boss = match marker.string("variant")?.unwrap_or("v1") {
        "v1" => BossEntity::V1(BossV1::new(marker.body(), rules)),
        "v2" => {
            let arena = platforms
                .iter()
                .enumerate()
                .filter(|(_, p)| p.name.starts_with(BOSS_PLATFORM_PREFIX))
                .map(|(i, _)| i)
                .collect();
            BossEntity::V2(BossV2::new(marker.body(), arena, rules))
        }
        other => return Err(LevelError::UnknownBossVariant(other.to_string())),
    };

    let arena = BossArena {
        item,
        portal,
        portal_origin: portals[portal].body.origin,
        win_point,
    };
    Ok((boss, arena))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
