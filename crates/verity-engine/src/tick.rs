//! The per-tick update.
//!
//! [`Engine::update`] is the only way a match advances. Each step below runs
//! in a fixed order and several of them end the tick early; both peers of a
//! session must run exactly this sequence for checksums to agree.

use tracing::{debug, info, warn};
use verity_world::prelude::*;

use crate::boss::{Boss, TickState};
use crate::engine::{ActiveInteraction, Engine};
use crate::input::{InputSample, Key};
use crate::player::GroundRef;
use crate::subgame::{Outcome, SubGameError, SubGameKind};
use crate::EngineError;

/// Where the boss portal is parked once the arena has been entered.
const RETRACTED: Point = Point::new(-9999.0, -9999.0);

/// Amplitude of the jitter added to homing bullets.
const BULLET_JITTER: f64 = 1.0 / 3.0;

impl Engine {
    /// Advances the match by one tick.
    ///
    /// Errors other than [`EngineError::Persistence`] abort the tick midway
    /// and must end the session. A persistence error is reported after the
    /// tick has fully completed.
    pub fn update(&mut self, input: &InputSample) -> Result<(), EngineError> {
        self.deferred = None;
        self.advance(input)?;
        self.player.update_animation();
        match self.deferred.take() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn advance(&mut self, input: &InputSample) -> Result<(), EngineError> {
        self.tick += 1;

        if let Some(active) = self.active {
            return self.update_sub_game(active, input);
        }

        if self.paused {
            if !input.is_newly_pressed(Key::P) {
                return Ok(());
            }
            self.paused = false;
        } else if input.is_newly_pressed(Key::P) {
            self.paused = true;
            return Ok(());
        }

        if input.is_newly_pressed(Key::R) {
            self.reset();
            return Ok(());
        }

        if !self.items.iter().any(|i| i.important && !i.collected) {
            if !self.is_win {
                info!(tick = self.tick, "all important items collected");
            }
            self.is_win = true;
            return Ok(());
        }

        if self.player.is_dead() {
            return Ok(());
        }

        self.process_player_input(input);

        self.process_moving_x();
        self.player.physical.apply_acceleration_x();
        self.player.move_by(Vector::new(self.player.physical.speed.x, 0.0));
        self.align_player_x();

        self.process_moving_y();
        self.player.physical.apply_acceleration_y();
        self.player.move_by(Vector::new(0.0, self.player.physical.speed.y));
        self.align_player_y();

        self.check_portals();
        self.check_spikes();
        self.check_enemy_bullets();
        self.check_boss();
        self.collect_items();

        if self.check_triggers(input)? {
            return Ok(());
        }
        self.check_slots(input);

        if let Some(notification) = &self.notification {
            if self.tick >= notification.expires_at {
                self.notification = None;
            }
        }
        self.center_camera();
        Ok(())
    }

    // -- sub-games ----------------------------------------------------------

    fn update_sub_game(&mut self, active: ActiveInteraction, input: &InputSample) -> Result<(), EngineError> {
        let tick = self.tick;
        let feed_interval = self.config.physics.arcade_feed_interval.max(1);
        let player_origin = self.player.body.origin;

        let Some(trigger) = self.trigger_mut(active) else {
            self.active = None;
            return Ok(());
        };
        let id = trigger.id.clone();
        let wrap = |source: SubGameError| EngineError::SubGame { id: id.clone(), source };

        if input.is_newly_pressed(Key::Escape) {
            trigger.game.stop().map_err(wrap)?;
            self.active = None;
            debug!(kind = %active.kind, id = %id, "sub-game closed");
            return Ok(());
        }

        let state = trigger.game.state();
        let linked = trigger.linked_item;
        match active.kind {
            SubGameKind::Dialog => {
                if state.outcome == Outcome::Won && linked.is_some() {
                    trigger.linked_item = None;
                }
                if !input.newly_pressed.is_empty() && !state.finished {
                    trigger.game.feed(input).map_err(wrap)?;
                }
            }
            SubGameKind::Arcade => {
                if input.is_newly_pressed(Key::R) {
                    trigger.game.stop().map_err(wrap)?;
                    trigger.game.start().map_err(wrap)?;
                    return Ok(());
                }
                if state.outcome == Outcome::Won && linked.is_some() {
                    trigger.linked_item = None;
                } else if state.outcome == Outcome::Pending && tick % feed_interval == 0 {
                    trigger.game.feed(input).map_err(wrap)?;
                }
            }
        }

        if state.outcome == Outcome::Won {
            if let Some(index) = linked {
                if let Some(item) = self.items.get_mut(index) {
                    item.move_to(player_origin);
                    info!(item = %item.name, id = %id, "reward handed over");
                }
            }
        }
        Ok(())
    }

    /// Activates a nearby NPC or arcade machine on interact. Returns true when
    /// one took focus.
    fn check_triggers(&mut self, input: &InputSample) -> Result<bool, EngineError> {
        if !input.is_newly_pressed(Key::E) {
            return Ok(false);
        }
        let reach = self.player.rectangle().extended(self.config.physics.interact_radius);

        let candidate = collide(reach, &self.npcs)
            .next()
            .map(|(index, _)| ActiveInteraction {
                kind: SubGameKind::Dialog,
                index,
            })
            .or_else(|| {
                collide(reach, &self.arcades).next().map(|(index, _)| ActiveInteraction {
                    kind: SubGameKind::Arcade,
                    index,
                })
            });

        let Some(active) = candidate else {
            return Ok(false);
        };
        if let Some(trigger) = self.trigger_mut(active) {
            trigger.game.start().map_err(|source| EngineError::SubGame {
                id: trigger.id.clone(),
                source,
            })?;
            debug!(kind = %active.kind, id = %trigger.id, "sub-game opened");
        }
        self.active = Some(active);
        Ok(true)
    }

    fn check_slots(&mut self, input: &InputSample) {
        if !input.is_newly_pressed(Key::E) {
            return;
        }
        let tick = self.tick;
        let reach = self.player.rectangle().extended(self.config.physics.interact_radius);
        let Some(index) = collide(reach, &self.slots).map(|(i, _)| i).next() else {
            return;
        };

        let slot = &mut self.slots[index];
        if !slot.ready(tick) {
            return;
        }
        slot.last_triggered = Some(tick);
        let roll: f64 = rand::Rng::gen(&mut tick_rng_salted(tick, slot.seed));
        let message = if roll < slot.probability {
            self.player.coins += slot.payout;
            format!("Jackpot! +{} coins", slot.payout)
        } else {
            "No luck this time".to_string()
        };
        self.notify(message);
    }

    // -- player motion ------------------------------------------------------

    fn process_player_input(&mut self, input: &InputSample) {
        let physics = &self.config.physics;
        let player = &mut self.player;

        if (input.is_pressed(Key::Space) || input.is_pressed(Key::W)) && player.can_jump() {
            player.physical.speed.y = -physics.jump_speed;
            player.reset_coyote();
        }

        if input.is_pressed(Key::A) {
            player.physical.speed.x = -physics.run_speed;
            player.looks_right = false;
        } else if input.is_pressed(Key::D) {
            player.physical.speed.x = physics.run_speed;
            player.looks_right = true;
        } else {
            player.physical.speed.x = 0.0;
        }
    }

    fn process_moving_x(&mut self) {
        for spike in &mut self.spikes {
            spike.motion.advance_x();
        }
        for platform in &mut self.platforms {
            platform.motion.advance_x();
        }
        if let Some(GroundRef::Platform(i)) = self.player.on_ground() {
            if let Some(platform) = self.platforms.get(i) {
                self.player.body.origin.x += platform.velocity().x;
            }
        }
    }

    fn process_moving_y(&mut self) {
        for spike in &mut self.spikes {
            spike.motion.advance_y();
        }
        for platform in &mut self.platforms {
            platform.motion.advance_y();
        }
        if let Some(GroundRef::Platform(i)) = self.player.on_ground() {
            if let Some(platform) = self.platforms.get(i) {
                self.player.physical.acceleration.y += platform.acceleration().y;
            }
        }
    }

    fn solid_rectangle(&self, hit: SolidHit) -> Rectangle {
        match hit {
            SolidHit::Platform(i) => self.platforms[i].rectangle(),
            SolidHit::Tile(i) => self.tiles[i].rectangle(),
        }
    }

    fn align_player_x(&mut self) {
        let rect = self.player.rectangle();
        if let Some(hit) = first_solid(rect, &self.platforms, &self.tiles) {
            let push = self.solid_rectangle(hit).push_vector_x(&rect);
            self.player.move_by(push);
        }
    }

    fn align_player_y(&mut self) {
        let tick = self.tick;
        let physics = &self.config.physics;
        let rect = self.player.rectangle();
        let mut probe = rect;
        probe.bottom += physics.ground_probe;

        let Some(hit) = first_solid(probe, &self.platforms, &self.tiles) else {
            self.player.set_on_ground(None, tick, physics.coyote_ticks);
            self.player.physical.acceleration.y = physics.gravity;
            return;
        };

        let push = self.solid_rectangle(hit).push_vector_y(&rect);
        if push.y <= 0.0 {
            self.player.set_on_ground(Some(hit.into()), tick, physics.coyote_ticks);
            self.player.physical.acceleration.y = 0.0;
        } else {
            self.player.set_on_ground(None, tick, physics.coyote_ticks);
            self.player.physical.acceleration.y = physics.gravity;
        }
        self.player.move_by(push);

        let hit_ref = GroundRef::from(hit);
        if Some(hit_ref) != self.player.previous_ground() {
            self.player.physical.speed.y = 0.0;
            if let SolidHit::Platform(i) = hit {
                self.player.physical.acceleration.y += self.platforms[i].velocity().y;
            }
        }
    }

    // -- interactions -------------------------------------------------------

    fn check_portals(&mut self) {
        let rect = self.player.rectangle();
        let hits: Vec<usize> = collide(rect, &self.portals).map(|(i, _)| i).collect();
        let offset = self.config.physics.portal_exit_offset;

        for index in hits {
            let portal = &self.portals[index];
            if let Some(destination) = portal.teleport_to {
                let dx = if self.player.physical.speed.x < 0.0 { -offset } else { offset };
                self.player.move_to(destination + Vector::new(dx, 0.0));
            }

            if portal.boss.is_some() && self.boss.is_some() {
                self.boss_entered = true;
                if let Some(arena) = self.boss_arena {
                    self.portals[arena.portal].move_to(RETRACTED);
                }
                info!(tick = self.tick, "boss arena entered");
            }
        }
    }

    fn check_spikes(&mut self) {
        let rect = self.player.rectangle();
        let damage: i32 = collide(rect, &self.spikes).map(|(_, s)| s.damage).sum();
        self.player.health -= damage;
    }

    fn check_enemy_bullets(&mut self) {
        let max = self.config.physics.max_enemy_bullets;
        if self.enemy_bullets.len() > max {
            let excess = self.enemy_bullets.len() - max;
            self.enemy_bullets.drain(..excess);
        }

        let target = self.player.rectangle().center();
        let mut rng = tick_rng(self.tick);
        let tiles = &self.tiles;
        let platforms = &self.platforms;
        self.enemy_bullets.retain_mut(|bullet| {
            if bullet.seek_speed > 0.0 {
                let aim = (target - bullet.body.origin).normalize() * bullet.seek_speed;
                let jx = (rand::Rng::gen::<f64>(&mut rng) - 0.5) * BULLET_JITTER;
                let jy = (rand::Rng::gen::<f64>(&mut rng) - 0.5) * BULLET_JITTER;
                bullet.direction = aim + Vector::new(jx, jy);
            }
            bullet.move_by(bullet.direction);
            let rect = bullet.rectangle();
            !collide_any(rect, tiles) && !collide_any(rect, platforms)
        });

        let rect = self.player.rectangle();
        for bullet in &mut self.enemy_bullets {
            if bullet.triggered || !bullet.rectangle().intersects(&rect) {
                continue;
            }
            self.player.health -= bullet.damage;
            bullet.triggered = true;
        }
    }

    fn check_boss(&mut self) {
        if !self.boss_entered {
            return;
        }
        let Some(boss) = self.boss.as_mut() else {
            return;
        };

        let result = boss.tick(&TickState { current_tick: self.tick }, &mut self.platforms);
        if result.dead {
            if let Some(arena) = self.boss_arena {
                if let Some(item) = self.items.get_mut(arena.item) {
                    item.move_to(arena.win_point);
                }
                if let Some(portal) = self.portals.get_mut(arena.portal) {
                    let width = portal.body.width;
                    portal.move_to(arena.win_point + Vector::new(-width, 0.0));
                }
            }
        }
        self.enemy_bullets.extend(result.bullets);
    }

    fn collect_items(&mut self) {
        let rect = self.player.rectangle();
        let fresh: Vec<usize> = collide(rect, &self.items)
            .filter(|(_, item)| !item.collected)
            .map(|(i, _)| i)
            .collect();
        if fresh.is_empty() {
            return;
        }

        for &index in &fresh {
            let item = &mut self.items[index];
            item.collected = true;
            self.player.inventory.items.push(item.name.clone());
            debug!(item = %item.name, tick = self.tick, "item collected");
        }
        if let Some(&last) = fresh.last() {
            let text = format!("Collected {}", self.items[last].name);
            self.notify(text);
        }

        let snapshot = self.make_snapshot();
        if let Err(err) = self.save_snapshot(&snapshot) {
            warn!(error = %err, "snapshot save failed");
            self.deferred = Some(err);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
