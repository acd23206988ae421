//! Translates `native32_vm::Host` callbacks (what a running action program
//! can do) into `Stage` mutations and `HostIo` calls. This is the seam
//! spec.md §9 calls out as "Host as interface, not inheritance": the VM only
//! ever sees this bridge, never `Stage` or the embedder directly.

use native32_core::Native32Container;
use native32_vm::{Host, Property, VmError};

use crate::host_io::HostIo;
use crate::sprite::Sprite;
use crate::stage::Stage;

pub struct StageHost<'a, H: HostIo> {
    pub stage: &'a mut Stage,
    pub host: &'a mut H,
    pub container: &'a Native32Container,
}

impl<'a, H: HostIo> StageHost<'a, H> {
    /// Stops the channel at `channel`, if any, and clears its owner's
    /// `sound_channel`. Mirrors `N32Emu.stop_channel`.
    fn stop_channel(&mut self, channel: usize) {
        self.host.stop_channel(channel);
        if let Some(owner) = self.stage.channels[channel].take() {
            if let Some(sprite) = self.stage.sprite_mut(&owner) {
                sprite.sound_channel = None;
            }
        }
    }
}

impl<'a, H: HostIo> Host for StageHost<'a, H> {
    fn stop(&mut self, target: &str) {
        if target.is_empty() {
            self.stage.playing = false;
        } else if let Some(sprite) = self.stage.sprite_mut(target) {
            sprite.playing = false;
        }
    }

    fn play(&mut self, target: &str) {
        if target.is_empty() {
            self.stage.playing = true;
        } else if let Some(sprite) = self.stage.sprite_mut(target) {
            sprite.playing = true;
        }
    }

    fn stop_sounds(&mut self, target: &str) {
        if target.is_empty() {
            for i in 0..self.stage.channels.len() {
                self.stop_channel(i);
            }
        } else if let Some(channel) = self.stage.sprite(target).and_then(|s| s.sound_channel) {
            self.stop_channel(channel);
        }
    }

    fn current_frame(&mut self, target: &str) -> i64 {
        if target.is_empty() {
            self.stage.frame
        } else {
            self.stage.sprite(target).map(|s| s.frame + 1).unwrap_or(0)
        }
    }

    fn goto_frame(&mut self, target: &str, frame: i64) {
        if target.is_empty() {
            self.stage.next_frame = Some(frame);
            self.stage.playing = false;
        } else if let Some(sprite) = self.stage.sprite_mut(target) {
            sprite.next_frame = Some(frame - 1);
            sprite.playing = false;
        }
    }

    fn get_property(&mut self, target: &str, prop: Property) -> String {
        let Some(sprite) = self.stage.sprite(target) else {
            return "0".to_string();
        };
        match prop {
            Property::X => sprite.x.to_string(),
            Property::Y => sprite.y.to_string(),
            // n32emu.py's get_property asserts False on anything but x, y,
            // visible, currentframe, totalframes and name; no valid program
            // reads these, so an inert default stands in for the abort.
            Property::XScale => "0".to_string(),
            Property::YScale => "0".to_string(),
            Property::Visible => (sprite.visible as i32).to_string(),
            Property::CurrentFrame => {
                if sprite.next_frame.is_none() && sprite.playing {
                    (sprite.frame + 2).to_string()
                } else {
                    (sprite.frame + 1).to_string()
                }
            }
            Property::TotalFrames => self
                .container
                .get_movie(sprite.movie_id as u32)
                .ok()
                .map(|m| m.len())
                .unwrap_or(0)
                .to_string(),
            Property::Alpha => "0".to_string(),
            Property::Width => "0".to_string(),
            Property::Height => "0".to_string(),
            Property::Name => target.to_string(),
        }
    }

    fn set_property(&mut self, target: &str, prop: Property, value: &str) {
        let Some(sprite) = self.stage.sprite_mut(target) else {
            return;
        };
        match prop {
            Property::X => sprite.x = native32_vm::value::to_int(value) as i16,
            Property::Y => sprite.y = native32_vm::value::to_int(value) as i16,
            Property::Visible => sprite.visible = native32_vm::value::to_float(value) != 0.0,
            Property::CurrentFrame => sprite.next_frame = Some(native32_vm::value::to_int(value)),
            Property::Name => {
                let renamed = self.stage.remove_sprite(target);
                if let Some(sprite) = renamed {
                    self.stage.insert_sprite(value.to_string(), sprite);
                }
            }
            _ => {}
        }
    }

    fn clone_sprite(&mut self, src: &str, dst: &str, depth: i64) {
        let Some(template) = self.stage.sprite(src) else {
            return;
        };
        let clone = Sprite::cloned_from(template, depth);
        self.stage.insert_sprite(dst.to_string(), clone);
    }

    fn remove_sprite(&mut self, target: &str) {
        if let Some(channel) = self.stage.sprite(target).and_then(|s| s.sound_channel) {
            self.stop_channel(channel);
        }
        self.stage.remove_sprite(target);
    }

    fn now_ms(&mut self) -> u64 {
        self.stage.vm_time_ms
    }

    fn get_url2(&mut self, url: &str, target: &str) -> Result<Vec<(String, String)>, VmError> {
        let fields: Vec<&str> = target.split('+').collect();
        let verb = fields.get(1).copied().unwrap_or("");
        match verb {
            "SSL_PlayNext" => {
                // `url` is itself `+`-delimited (intro movie, etc. before
                // the real target); only the last segment matters.
                let last_segment = url.rsplit('+').next().unwrap_or(url);
                self.stage.pending_reload = Some(last_segment.to_string());
                Ok(Vec::new())
            }
            "SSL_PlayPlan" | "SSL_PlayProg" => Ok(Vec::new()),
            "SSL_GetSSLData" => {
                // Here `url` is the name of the VM variable to receive the
                // companion file's contents, not a path.
                let success_var = fields.get(2).copied().unwrap_or("");
                match self.host.read_companion() {
                    Some(data) => Ok(vec![
                        (url.to_string(), String::from_utf8_lossy(&data).into_owned()),
                        (success_var.to_string(), "S".to_string()),
                    ]),
                    None => Ok(vec![(success_var.to_string(), "N".to_string())]),
                }
            }
            "SSL_SaveSSLData" => {
                // Here `url` is the literal data to persist, not a path.
                let success_var = fields.get(2).copied().unwrap_or("");
                self.host.write_companion(url.as_bytes());
                Ok(vec![(success_var.to_string(), "S".to_string())])
            }
            other => Err(VmError::UnhandledUrlVerb {
                verb: other.to_string(),
            }),
        }
    }
}
