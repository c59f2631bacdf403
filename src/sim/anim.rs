//! Animation playback cursor

use serde::{Deserialize, Serialize};

use super::assets::{AssetTables, FighterId, HitCoord, MoveDef, MoveId, SpriteFrame};

/// Position of an object inside one of its fighter's move animations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnimCursor {
    pub fighter: FighterId,
    pub move_id: MoveId,
    pub frame: usize,
    /// Ticks already spent on the current frame
    pub elapsed: u16,
    /// Set once a non-looping animation has shown its last frame
    pub finished: bool,
}

impl AnimCursor {
    pub fn new(fighter: FighterId, move_id: MoveId) -> Self {
        Self {
            fighter,
            move_id,
            frame: 0,
            elapsed: 0,
            finished: false,
        }
    }

    /// Restart on a different move (no-op if already playing it)
    pub fn play(&mut self, move_id: MoveId) {
        if self.move_id != move_id || self.finished {
            *self = Self::new(self.fighter, move_id);
        }
    }

    pub fn move_def<'a>(&self, assets: &'a AssetTables) -> Option<&'a MoveDef> {
        assets.move_def(self.fighter, self.move_id)
    }

    pub fn sprite<'a>(&self, assets: &'a AssetTables) -> Option<&'a SpriteFrame> {
        self.move_def(assets)
            .and_then(|m| m.animation.sprite_at(self.frame))
    }

    pub fn hit_coords<'a>(&self, assets: &'a AssetTables) -> Vec<&'a HitCoord> {
        match self.move_def(assets) {
            Some(m) => m.animation.hit_coords_at(self.frame).collect(),
            None => Vec::new(),
        }
    }

    /// Advance one tick
    ///
    /// Returns true on the tick the animation finishes.
    pub fn advance(&mut self, assets: &AssetTables) -> bool {
        if self.finished {
            return false;
        }
        let Some(anim) = self.move_def(assets).map(|m| &m.animation) else {
            // Unknown move: nothing to play, finish right away
            self.finished = true;
            return true;
        };
        let Some(step) = anim.frame(self.frame) else {
            self.finished = true;
            return true;
        };

        self.elapsed += 1;
        if self.elapsed < step.ticks.max(1) {
            return false;
        }
        self.elapsed = 0;
        self.frame += 1;
        if self.frame < anim.frames.len() {
            return false;
        }
        if anim.looping {
            self.frame = 0;
            false
        } else {
            self.frame = anim.frames.len() - 1;
            self.finished = true;
            true
        }
    }
}
