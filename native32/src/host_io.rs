//! The engine-level host interface: everything the scheduler needs from its
//! embedder, per spec.md §6. Separate from `native32_vm::Host`, which only
//! carries the narrower set of callbacks a running action program can
//! trigger directly (see `bridge.rs`).

/// The fixed wire-keycode → logical-input mapping from spec.md §4.F,
/// confirmed against `original_source/native32/n32emu.py`'s `key_map`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Left,
    Right,
    Up,
    Down,
    BtnA,
    BtnB,
}

impl Input {
    pub fn from_wire_keycode(code: u16) -> Option<Self> {
        match code {
            0x0200 => Some(Input::Left),
            0x0400 => Some(Input::Right),
            0x1c00 => Some(Input::Up),
            0x1e00 => Some(Input::Down),
            0x4000 => Some(Input::BtnA),
            0x8800 => Some(Input::BtnB),
            _ => None,
        }
    }
}

/// One entry of a depth-sorted render list, per spec.md §6 `render`.
#[derive(Debug, Clone, Copy)]
pub struct DrawCommand {
    pub image: u16,
    pub x: i32,
    pub y: i32,
    pub depth: u16,
}

pub trait HostIo {
    /// Number of audio voices this host exposes. The last index is the
    /// exclusive MP3/music channel; see spec.md §3 `channels`.
    fn channel_count(&self) -> usize;

    fn render(&mut self, commands: &[DrawCommand]);

    fn play_raw(&mut self, channel: usize, pcm: &[u8]);
    fn play_mp3(&mut self, channel: usize, data: &[u8], loops: i32);
    fn stop_channel(&mut self, channel: usize);
    fn channel_busy(&mut self, channel: usize) -> bool;

    fn key_down(&mut self, input: Input) -> bool;

    /// Wall-clock milliseconds, independent of the VM's own virtual clock
    /// (`Stage::vm_time_ms`, which `GetTime` reads).
    fn now_ms(&mut self) -> u64;

    /// Reads/writes the single companion save file next to the current
    /// container (`original_source/native32/n32emu.py` always uses a fixed
    /// `<container>.ssl_sav` suffix — there is only ever one).
    fn read_companion(&mut self) -> Option<Vec<u8>>;
    fn write_companion(&mut self, data: &[u8]);

    /// `SSL_PlayNext`'s reload request: queue loading a new container.
    fn navigate(&mut self, container_path: &str);
}

/// A `HostIo` that renders and plays nothing, for headless `--ticks` runs
/// (spec.md §6's CLI surface has no windowing/audio backend in scope).
#[derive(Debug, Default)]
pub struct NullHost {
    pub channels: usize,
}

impl NullHost {
    pub fn new(channels: usize) -> Self {
        NullHost { channels }
    }
}

impl HostIo for NullHost {
    fn channel_count(&self) -> usize {
        self.channels.max(1)
    }

    fn render(&mut self, _commands: &[DrawCommand]) {}

    fn play_raw(&mut self, _channel: usize, _pcm: &[u8]) {}
    fn play_mp3(&mut self, _channel: usize, _data: &[u8], _loops: i32) {}
    fn stop_channel(&mut self, _channel: usize) {}
    fn channel_busy(&mut self, _channel: usize) -> bool {
        false
    }

    fn key_down(&mut self, _input: Input) -> bool {
        false
    }

    fn now_ms(&mut self) -> u64 {
        0
    }

    fn read_companion(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn write_companion(&mut self, _data: &[u8]) {}

    fn navigate(&mut self, _container_path: &str) {}
}
