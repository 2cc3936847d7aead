//! Ordered collision query over every entity of a match.

use verity_world::prelude::*;

use crate::boss::BossEntity;
use crate::player::Player;
use crate::subgame::Trigger;
use crate::Engine;

/// One entity hit by [`Engine::collisions`], with its index in the owning
/// collection.
///
/// Variants are declared in query order, so a sorted list of hits is also a
/// back-to-front draw order.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Background(usize, &'a BackgroundImage),
    Tile(usize, &'a StaticTile),
    Item(usize, &'a Item),
    Portal(usize, &'a Portal),
    Spike(usize, &'a Spike),
    Platform(usize, &'a Platform),
    Npc(usize, &'a Trigger),
    Arcade(usize, &'a Trigger),
    Slot(usize, &'a SlotMachine),
    Player(&'a Player),
    Boss(&'a BossEntity),
    Bullet(usize, &'a Bullet),
}

impl EntityRef<'_> {
    pub fn rectangle(&self) -> Rectangle {
        match self {
            EntityRef::Background(_, e) => e.rectangle(),
            EntityRef::Tile(_, e) => e.rectangle(),
            EntityRef::Item(_, e) => e.rectangle(),
            EntityRef::Portal(_, e) => e.rectangle(),
            EntityRef::Spike(_, e) => e.rectangle(),
            EntityRef::Platform(_, e) => e.rectangle(),
            EntityRef::Npc(_, e) | EntityRef::Arcade(_, e) => e.rectangle(),
            EntityRef::Slot(_, e) => e.rectangle(),
            EntityRef::Player(e) => e.rectangle(),
            EntityRef::Boss(e) => e.rectangle(),
            EntityRef::Bullet(_, e) => e.rectangle(),
        }
    }
}

impl Engine {
    /// Every entity intersecting `rect`: background, tiles, items, portals,
    /// spikes, platforms, NPCs, arcades, slot machines, the player, the boss,
    /// then enemy bullets. Disabled entities are included.
    pub fn collisions(&self, rect: Rectangle) -> Vec<EntityRef<'_>> {
        let mut hits = Vec::new();
        hits.extend(collide(rect, &self.background).map(|(i, e)| EntityRef::Background(i, e)));
        hits.extend(collide(rect, &self.tiles).map(|(i, e)| EntityRef::Tile(i, e)));
        hits.extend(collide(rect, &self.items).map(|(i, e)| EntityRef::Item(i, e)));
        hits.extend(collide(rect, &self.portals).map(|(i, e)| EntityRef::Portal(i, e)));
        hits.extend(collide(rect, &self.spikes).map(|(i, e)| EntityRef::Spike(i, e)));
        hits.extend(collide(rect, &self.platforms).map(|(i, e)| EntityRef::Platform(i, e)));
        hits.extend(collide(rect, &self.npcs).map(|(i, e)| EntityRef::Npc(i, e)));
        hits.extend(collide(rect, &self.arcades).map(|(i, e)| EntityRef::Arcade(i, e)));
        hits.extend(collide(rect, &self.slots).map(|(i, e)| EntityRef::Slot(i, e)));
        if self.player.rectangle().intersects(&rect) {
            hits.push(EntityRef::Player(&self.player));
        }
        if let Some(boss) = self.boss.as_ref().filter(|b| b.rectangle().intersects(&rect)) {
            hits.push(EntityRef::Boss(boss));
        }
        hits.extend(collide(rect, &self.enemy_bullets).map(|(i, e)| EntityRef::Bullet(i, e)));
        hits
    }
}
