//! Runtime sprite (a "movie" instance) state, per spec.md §3's `Sprite`
//! record. Grounded in `MovieState` from `original_source/native32/n32emu.py`.

#[derive(Debug, Clone)]
pub struct Sprite {
    pub movie_id: u16,
    pub x: i16,
    pub y: i16,
    pub depth: u16,
    pub frame: i64,
    pub next_frame: Option<i64>,
    pub playing: bool,
    pub visible: bool,
    pub cloned: bool,
    pub sound_channel: Option<usize>,
}

impl Sprite {
    /// A freshly instanced sprite, as created by `Stage::load_frame` the
    /// first time a frame names a movie object. `next_frame = Some(0)`
    /// matches `MovieState`'s own default, not `None` — the sprite advances
    /// into frame 0 on its very first eligible tick.
    pub fn new(movie_id: u16, x: i16, y: i16, depth: u16) -> Self {
        Sprite {
            movie_id,
            x,
            y,
            depth,
            frame: 0,
            next_frame: Some(0),
            playing: true,
            visible: true,
            cloned: false,
            sound_channel: None,
        }
    }

    /// A sprite created by the `CloneSprite` opcode: starts at `frame = -1`
    /// with `next_frame` set to the template's current frame, and is never
    /// auto-reaped on frame transitions.
    pub fn cloned_from(template: &Sprite, depth: i64) -> Self {
        Sprite {
            movie_id: template.movie_id,
            x: template.x,
            y: template.y,
            depth: depth as u16,
            frame: -1,
            next_frame: Some(template.frame),
            playing: template.playing,
            visible: true,
            cloned: true,
            sound_channel: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sprite_advances_into_frame_zero() {
        let s = Sprite::new(7, 10, 20, 5);
        assert_eq!(s.frame, 0);
        assert_eq!(s.next_frame, Some(0));
        assert!(s.playing);
        assert!(!s.cloned);
    }

    #[test]
    fn clone_inherits_template_playback_state_but_not_frame() {
        let mut template = Sprite::new(7, 10, 20, 5);
        template.frame = 3;
        template.next_frame = None;
        template.playing = false;

        let clone = Sprite::cloned_from(&template, 100);
        assert_eq!(clone.movie_id, 7);
        assert_eq!(clone.depth, 100);
        assert_eq!(clone.frame, -1);
        assert_eq!(clone.next_frame, Some(3));
        assert!(!clone.playing);
        assert!(clone.cloned);
        assert!(clone.visible);
    }
}
