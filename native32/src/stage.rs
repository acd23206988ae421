//! The root timeline and sprite table, per spec.md §3's `Stage` record.
//! Insertion order is preserved via `order`; draw order is computed
//! separately by depth (see `Engine::draw_list`).

use std::collections::HashMap;

use native32_core::{ContainerError, FrameObject, Native32Container, ObjectKind};

use crate::sprite::Sprite;

pub struct Stage {
    order: Vec<String>,
    sprites: HashMap<String, Sprite>,
    pub channels: Vec<Option<String>>,
    pub frame: i64,
    pub next_frame: Option<i64>,
    pub playing: bool,
    pub ticks: u64,
    pub vm_time_ms: u64,
    pub cur_frame_objects: Vec<FrameObject>,
    /// Set by `SSL_PlayNext`; the engine checks this after each tick and,
    /// if present, reloads from the named container (n32emu.py's `reload`).
    pub pending_reload: Option<String>,
}

impl Stage {
    pub fn new(channel_count: usize) -> Self {
        Stage {
            order: Vec::new(),
            sprites: HashMap::new(),
            channels: vec![None; channel_count.max(1)],
            frame: 0,
            next_frame: Some(1),
            playing: true,
            ticks: 0,
            vm_time_ms: 0,
            cur_frame_objects: Vec::new(),
            pending_reload: None,
        }
    }

    pub fn sprite(&self, name: &str) -> Option<&Sprite> {
        self.sprites.get(name)
    }

    pub fn sprite_mut(&mut self, name: &str) -> Option<&mut Sprite> {
        self.sprites.get_mut(name)
    }

    pub fn sprite_names(&self) -> &[String] {
        &self.order
    }

    pub fn sprite_count(&self) -> usize {
        self.order.len()
    }

    pub fn insert_sprite(&mut self, name: String, sprite: Sprite) {
        if !self.sprites.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.sprites.insert(name, sprite);
    }

    pub fn remove_sprite(&mut self, name: &str) -> Option<Sprite> {
        self.order.retain(|n| n.as_str() != name);
        self.sprites.remove(name)
    }

    /// Loads frame `index` (1-based), reads its `Movie` objects to decide
    /// which sprites should exist, and reaps anything no longer named
    /// unless it was created by `CloneSprite`. Mirrors
    /// `N32Emu.load_frame`.
    pub fn load_frame(
        &mut self,
        index: i64,
        container: &Native32Container,
    ) -> Result<(), ContainerError> {
        let objects = if index >= 1 {
            container
                .get_frame(index as u32)?
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut frame_movies: Vec<&str> = Vec::new();
        for obj in &objects {
            if obj.kind == ObjectKind::Movie {
                if let Some(name) = obj.name.as_deref() {
                    frame_movies.push(name);
                    if !self.sprites.contains_key(name) {
                        self.insert_sprite(
                            name.to_string(),
                            Sprite::new(obj.index, obj.x, obj.y, obj.depth),
                        );
                    }
                }
            }
        }

        let to_delete = sprites_to_reap(&self.order, &self.sprites, &frame_movies);
        for name in to_delete {
            self.remove_sprite(&name);
        }

        self.cur_frame_objects = objects;
        Ok(())
    }
}

/// Names tracked in `order` that should be reaped because the new frame
/// doesn't name them and they weren't created by `CloneSprite`. Split out of
/// `load_frame` so the reaping rule (spec.md §8 property 7) is testable
/// without a parsed container.
fn sprites_to_reap(
    order: &[String],
    sprites: &HashMap<String, Sprite>,
    frame_movies: &[&str],
) -> Vec<String> {
    order
        .iter()
        .filter(|name| {
            !frame_movies.contains(&name.as_str())
                && !sprites.get(name.as_str()).map(|s| s.cloned).unwrap_or(false)
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite(cloned: bool) -> Sprite {
        let mut s = Sprite::new(1, 0, 0, 0);
        s.cloned = cloned;
        s
    }

    #[test]
    fn reaps_sprites_not_named_by_the_new_frame() {
        let order = vec!["hero".to_string(), "foe".to_string()];
        let mut sprites = HashMap::new();
        sprites.insert("hero".to_string(), sprite(false));
        sprites.insert("foe".to_string(), sprite(false));

        let to_delete = sprites_to_reap(&order, &sprites, &["hero"]);
        assert_eq!(to_delete, vec!["foe".to_string()]);
    }

    #[test]
    fn a_cloned_sprite_survives_even_when_unnamed() {
        let order = vec!["hero".to_string(), "foe".to_string(), "foe2".to_string()];
        let mut sprites = HashMap::new();
        sprites.insert("hero".to_string(), sprite(false));
        sprites.insert("foe".to_string(), sprite(false));
        sprites.insert("foe2".to_string(), sprite(true));

        let to_delete = sprites_to_reap(&order, &sprites, &["hero"]);
        assert_eq!(to_delete, vec!["foe".to_string()]);
        assert!(!to_delete.contains(&"foe2".to_string()));
    }

    #[test]
    fn insert_and_remove_sprite_track_order() {
        let mut stage = Stage::new(4);
        stage.insert_sprite("hero".to_string(), Sprite::new(1, 0, 0, 0));
        stage.insert_sprite("foe".to_string(), Sprite::new(2, 0, 0, 0));
        assert_eq!(stage.sprite_names(), &["hero".to_string(), "foe".to_string()]);

        stage.remove_sprite("hero");
        assert_eq!(stage.sprite_names(), &["foe".to_string()]);
        assert!(stage.sprite("hero").is_none());
    }
}
