//! The tick-driven playback engine: owns the container, the VM, the stage,
//! and the embedder's `HostIo`, and drives one 30 Hz step per `tick()` call.
//! Sequencing is grounded in `N32Emu.tick`
//! (`original_source/native32/n32emu.py`) and in `Scripter::run`'s
//! per-context dispatch loop (`rfvp-core/src/vm/mod.rs`).

use std::sync::Arc;

use native32_core::{Native32Container, ObjectKind};
use native32_vm::Vm;

use crate::bridge::StageHost;
use crate::error::EngineError;
use crate::host_io::{DrawCommand, HostIo, Input};
use crate::stage::Stage;

/// The fixed tick rate the scheduler assumes, per spec.md §4.F.
pub const TICK_HZ: u64 = 30;
const MS_PER_TICK: u64 = 1000 / TICK_HZ;

pub struct Engine<H: HostIo> {
    container: Arc<Native32Container>,
    stage: Stage,
    vm: Vm,
    host: H,
}

impl<H: HostIo> Engine<H> {
    pub fn new(container: Arc<Native32Container>, host: H) -> Self {
        let channel_count = host.channel_count();
        Engine {
            container,
            stage: Stage::new(channel_count),
            vm: Vm::new(),
            host,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    /// Runs one 30 Hz tick: root-frame advance, frame actions, sprite
    /// advance/sound/actions, button polling, sound-channel reaping, clock
    /// advance. See spec.md §4.F for the exact ordering.
    pub fn tick(&mut self) -> Result<(), EngineError> {
        let container = Arc::clone(&self.container);
        let container = container.as_ref();
        let Engine {
            stage, vm, host, ..
        } = self;

        stage.ticks += 1;

        if stage.next_frame.is_none() && stage.playing {
            stage.next_frame = Some(stage.frame + 1);
        }
        if let Some(next) = stage.next_frame.take() {
            stage.frame = next;
            stage.load_frame(next, container)?;
        }

        let frame_objects = stage.cur_frame_objects.clone();
        for obj in &frame_objects {
            if obj.kind == ObjectKind::Action {
                let mut bridge = StageHost {
                    stage: &mut *stage,
                    host: &mut *host,
                    container,
                };
                vm.run(container, &mut bridge, obj.index as u32, "")?;
            }
        }

        let names: Vec<String> = stage.sprite_names().to_vec();
        for name in &names {
            Self::advance_sprite(container, stage, vm, host, name)?;
        }

        poll_buttons(container, stage, vm, host)?;
        reap_finished_sounds(stage, host);

        stage.vm_time_ms += MS_PER_TICK;

        if let Some(path) = stage.pending_reload.take() {
            host.navigate(&path);
        }

        Ok(())
    }

    fn advance_sprite(
        container: &Native32Container,
        stage: &mut Stage,
        vm: &mut Vm,
        host: &mut H,
        name: &str,
    ) -> Result<(), EngineError> {
        let Some(sprite) = stage.sprite(name) else {
            return Ok(());
        };
        let movie_id = sprite.movie_id;
        let movie_frames = container.get_movie(movie_id as u32)?;

        {
            let sprite = stage.sprite_mut(name).expect("checked above");
            if sprite.next_frame.is_none()
                && sprite.playing
                && stage.ticks % 2 == 0
                && sprite.sound_channel.is_none()
            {
                sprite.next_frame = Some(if (sprite.frame as usize) < movie_frames.len().saturating_sub(1) {
                    sprite.frame + 1
                } else {
                    0
                });
            }
        }

        let next = stage.sprite(name).and_then(|s| s.next_frame);
        let Some(mut next) = next else {
            return Ok(());
        };

        if let Some(channel) = stage.sprite(name).and_then(|s| s.sound_channel) {
            host.stop_channel(channel);
            stage.channels[channel] = None;
            if let Some(sprite) = stage.sprite_mut(name) {
                sprite.sound_channel = None;
            }
        }
        if next == -1 {
            next = 0;
        }
        if (next as usize) >= movie_frames.len() {
            if let Some(sprite) = stage.sprite_mut(name) {
                sprite.next_frame = None;
            }
            return Ok(());
        }

        if let Some(sprite) = stage.sprite_mut(name) {
            sprite.frame = next;
            sprite.next_frame = None;
        }

        let movie_frame = movie_frames[next as usize];
        if movie_frame.sound != 0 {
            let channel = allocate_and_play_sound(stage, host, container, movie_frame.sound, name)?;
            if let Some(sprite) = stage.sprite_mut(name) {
                sprite.sound_channel = channel;
            }
        }
        if movie_frame.action != 0 {
            let mut bridge = StageHost {
                stage: &mut *stage,
                host: &mut *host,
                container,
            };
            vm.run(container, &mut bridge, movie_frame.action as u32, name)?;
        }

        Ok(())
    }

    /// The render list for the current frame: standalone `Image` objects
    /// plus each visible sprite's current movie frame, depth-sorted.
    pub fn draw_list(&self) -> Result<Vec<DrawCommand>, EngineError> {
        let mut commands = Vec::new();
        for obj in &self.stage.cur_frame_objects {
            if obj.kind == ObjectKind::Image {
                commands.push(DrawCommand {
                    image: obj.index,
                    x: obj.x as i32,
                    y: obj.y as i32,
                    depth: obj.depth,
                });
            }
        }
        for name in self.stage.sprite_names() {
            let Some(sprite) = self.stage.sprite(name) else {
                continue;
            };
            if !sprite.visible {
                continue;
            }
            let movie_frames = self.container.get_movie(sprite.movie_id as u32)?;
            if sprite.frame >= 0 && (sprite.frame as usize) < movie_frames.len() {
                let mf = movie_frames[sprite.frame as usize];
                commands.push(DrawCommand {
                    image: mf.image,
                    x: sprite.x as i32 + mf.x as i32,
                    y: sprite.y as i32 + mf.y as i32,
                    depth: sprite.depth,
                });
            }
        }
        commands.sort_by_key(|c| c.depth);
        Ok(commands)
    }
}

/// Decides which channel a new sound should land on, given the current
/// ownership table. The last channel is reserved exclusively for MP3; RAW
/// sounds take the first free channel among the rest. Pulled out as a pure
/// function so the allocation policy (spec.md §8 property 8) is directly
/// testable without a real container or host.
fn pick_channel(channels: &[Option<String>], format: native32_core::SoundFormat) -> Option<usize> {
    match format {
        native32_core::SoundFormat::Mp3 => channels.len().checked_sub(1),
        native32_core::SoundFormat::Raw16Mono => {
            let last = channels.len().saturating_sub(1);
            (0..last).find(|&i| channels[i].is_none())
        }
    }
}

/// Sound-channel allocation: the last channel is the exclusive MP3 voice,
/// all others are RAW voices. Mirrors `N32Emu.play_sound`.
fn allocate_and_play_sound<H: HostIo>(
    stage: &mut Stage,
    host: &mut H,
    container: &Native32Container,
    sound: u16,
    owner: &str,
) -> Result<Option<usize>, EngineError> {
    let loops = {
        let repeat = (sound >> 8) & 0xFF;
        if repeat == 0xFF {
            -1
        } else {
            repeat as i32
        }
    };
    let index = (sound & 0xFF) as u32;
    let record = container.get_sound(index)?;

    let Some(channel) = pick_channel(&stage.channels, record.format) else {
        return Ok(None);
    };

    match record.format {
        native32_core::SoundFormat::Mp3 => {
            if let Some(prev_owner) = stage.channels[channel].take() {
                if let Some(sprite) = stage.sprite_mut(&prev_owner) {
                    sprite.sound_channel = None;
                }
            }
            host.stop_channel(channel);
            host.play_mp3(channel, &record.payload, loops);
        }
        native32_core::SoundFormat::Raw16Mono => {
            host.play_raw(channel, &record.payload);
        }
    }
    stage.channels[channel] = Some(owner.to_string());
    Ok(Some(channel))
}

fn poll_buttons<H: HostIo>(
    container: &Native32Container,
    stage: &mut Stage,
    vm: &mut Vm,
    host: &mut H,
) -> Result<(), EngineError> {
    let objects = stage.cur_frame_objects.clone();
    for obj in &objects {
        if obj.kind != ObjectKind::Button {
            continue;
        }
        let events = container.get_button_events(obj.index as u32)?;
        for (keycode, action) in events {
            let Some(input) = Input::from_wire_keycode(keycode) else {
                continue;
            };
            if host.key_down(input) {
                let mut bridge = StageHost {
                    stage: &mut *stage,
                    host: &mut *host,
                    container,
                };
                vm.run(container, &mut bridge, action as u32, "")?;
            }
        }
    }
    Ok(())
}

fn reap_finished_sounds<H: HostIo>(stage: &mut Stage, host: &mut H) {
    for i in 0..stage.channels.len() {
        if host.channel_busy(i) {
            continue;
        }
        if let Some(owner) = stage.channels[i].take() {
            if let Some(sprite) = stage.sprite_mut(&owner) {
                sprite.sound_channel = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use native32_core::SoundFormat;

    #[test]
    fn mp3_always_lands_on_the_last_channel() {
        let channels: Vec<Option<String>> = vec![None, None, None, None];
        assert_eq!(pick_channel(&channels, SoundFormat::Mp3), Some(3));

        let mut busy = channels;
        busy[3] = Some("hero".to_string());
        assert_eq!(pick_channel(&busy, SoundFormat::Mp3), Some(3));
    }

    #[test]
    fn raw_takes_the_first_free_channel_excluding_the_last() {
        let channels: Vec<Option<String>> = vec![None, None, None, None];
        assert_eq!(pick_channel(&channels, SoundFormat::Raw16Mono), Some(0));

        let mut partly_busy = channels.clone();
        partly_busy[0] = Some("a".to_string());
        assert_eq!(pick_channel(&partly_busy, SoundFormat::Raw16Mono), Some(1));

        let mut only_last_free = channels;
        only_last_free[0] = Some("a".to_string());
        only_last_free[1] = Some("b".to_string());
        only_last_free[2] = Some("c".to_string());
        assert_eq!(pick_channel(&only_last_free, SoundFormat::Raw16Mono), None);
    }

    #[test]
    fn raw_never_steals_the_mp3_channel() {
        let mut channels: Vec<Option<String>> = vec![None, None];
        channels[0] = Some("a".to_string());
        assert_eq!(pick_channel(&channels, SoundFormat::Raw16Mono), None);
    }
}
