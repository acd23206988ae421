//! Random-access container reader: boot sequence plus lazy, memoized record
//! accessors. Ported from `Native32Reader` in
//! `original_source/native32/process_file.py`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::des;
use crate::error::ContainerError;
use crate::image::{self, DecodedImage};

const THUMBNAIL_MAGIC: &[u8; 4] = b"SWFT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colorspace {
    Yuv,
    Argb,
}

impl Colorspace {
    fn magic(self) -> &'static [u8; 4] {
        match self {
            Colorspace::Yuv => b"_YUV",
            Colorspace::Argb => b"ARGB",
        }
    }
}

/// Immutable file bytes plus the `base` origin that all in-container offsets
/// are relative to. Mirrors spec.md's `ByteStore`.
#[derive(Debug, Clone)]
pub struct ByteStore {
    bytes: Arc<[u8]>,
    pub base: usize,
}

impl ByteStore {
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn slice(&self, start: usize, len: usize, what: &'static str) -> Result<&[u8], ContainerError> {
        let end = start.checked_add(len).ok_or(ContainerError::TruncatedRecord {
            offset: start,
            what,
        })?;
        self.bytes
            .get(start..end)
            .ok_or(ContainerError::TruncatedRecord { offset: start, what })
    }

    fn u16(&self, off: usize, what: &'static str) -> Result<u16, ContainerError> {
        let s = self.slice(off, 2, what)?;
        Ok(u16::from_le_bytes([s[0], s[1]]))
    }

    fn i16(&self, off: usize, what: &'static str) -> Result<i16, ContainerError> {
        Ok(self.u16(off, what)? as i16)
    }

    fn u32(&self, off: usize, what: &'static str) -> Result<u32, ContainerError> {
        let s = self.slice(off, 4, what)?;
        Ok(u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
    }

    /// NUL-terminated byte string, decoded one byte per char (matches the
    /// source's `chr(byte)` loop, not UTF-8).
    fn c_string(&self, off: usize) -> String {
        let mut out = String::new();
        let mut i = off;
        while i < self.len() {
            let b = self.bytes[i];
            if b == 0 {
                break;
            }
            out.push(b as char);
            i += 1;
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct ContainerHeader {
    pub colorspace: Colorspace,
    pub generator: String,
    pub fps_color_size: u16,
    pub action_stack_var: u16,
    pub button_movieclip: u16,
    pub buffer_sound: u16,
    pub load_addr: u32,
    pub binary_size: u32,
    pub mp3_offset: u32,
    pub mp3_length: u32,
    pub unkh: u32,
    pub frame_tbl: u32,
    pub image_tbl: u32,
    pub action_tbl: u32,
    pub movie_tbl: u32,
    pub button_tbl: u32,
    pub button_cond_tbl: u32,
    pub cursor_width: u16,
    pub cursor_height: u16,
    pub cursor: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Image = 1,
    Movie = 2,
    Button = 3,
    Action = 4,
    Sound = 5,
}

impl TryFrom<u16> for ObjectKind {
    type Error = ();
    fn try_from(v: u16) -> Result<Self, ()> {
        match v {
            1 => Ok(ObjectKind::Image),
            2 => Ok(ObjectKind::Movie),
            3 => Ok(ObjectKind::Button),
            4 => Ok(ObjectKind::Action),
            5 => Ok(ObjectKind::Sound),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FrameObject {
    pub kind: ObjectKind,
    pub index: u16,
    pub x: i16,
    pub y: i16,
    pub depth: u16,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct MovieFrame {
    pub image: u16,
    pub x: i16,
    pub y: i16,
    pub action: u16,
    pub sound: u16,
    pub u3: i16,
}

/// The ~40-member opcode set, in the order `spec.md` §4.D enumerates it.
/// Discriminant values are assigned by table position, not recovered from
/// source (the numeric opcode table lives in the container's own bytecode
/// and isn't part of the retrieved reference material); what matters for
/// correctness is that `get_action`'s raw `u32` opcode is looked up, not the
/// specific discriminant chosen here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ActionCode {
    Push = 0,
    Pop = 1,
    Not = 2,
    Add = 3,
    Subtract = 4,
    Multiply = 5,
    Divide = 6,
    Equals = 7,
    Less = 8,
    And = 9,
    Or = 10,
    StringEquals = 11,
    StringAdd = 12,
    StringLess = 13,
    StringExtract = 14,
    StringLength = 15,
    ToInteger = 16,
    CharToAscii = 17,
    AsciiToChar = 18,
    GetVariable = 19,
    SetVariable = 20,
    Jump = 21,
    If = 22,
    Call = 23,
    End = 24,
    Stop = 25,
    Play = 26,
    StopSounds = 27,
    NextFrame = 28,
    PreviousFrame = 29,
    GotoFrame = 30,
    GotoFrame2 = 31,
    GotoLabel = 32,
    WaitForFrame = 33,
    SetTarget = 34,
    SetTarget2 = 35,
    SetProperty = 36,
    GetProperty = 37,
    CloneSprite = 38,
    RemoveSprite = 39,
    RandomNumber = 40,
    GetTime = 41,
    GetUrl2 = 42,
    Trace = 43,
}

impl TryFrom<u32> for ActionCode {
    type Error = ();
    fn try_from(v: u32) -> Result<Self, ()> {
        use ActionCode::*;
        const TABLE: [ActionCode; 44] = [
            Push, Pop, Not, Add, Subtract, Multiply, Divide, Equals, Less, And, Or, StringEquals,
            StringAdd, StringLess, StringExtract, StringLength, ToInteger, CharToAscii,
            AsciiToChar, GetVariable, SetVariable, Jump, If, Call, End, Stop, Play, StopSounds,
            NextFrame, PreviousFrame, GotoFrame, GotoFrame2, GotoLabel, WaitForFrame, SetTarget,
            SetTarget2, SetProperty, GetProperty, CloneSprite, RemoveSprite, RandomNumber,
            GetTime, GetUrl2, Trace,
        ];
        TABLE.get(v as usize).copied().filter(|c| *c as u32 == v).ok_or(())
    }
}

impl ActionCode {
    fn is_branch(self) -> bool {
        matches!(
            self,
            ActionCode::If | ActionCode::Jump | ActionCode::GotoFrame | ActionCode::GotoFrame2
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    None,
    Int(i16),
    Str(String),
}

#[derive(Debug, Clone)]
pub struct Instruction {
    pub op: ActionCode,
    pub payload: Payload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundFormat {
    Mp3,
    Raw16Mono,
}

#[derive(Debug, Clone)]
pub struct SoundRecord {
    pub format: SoundFormat,
    pub payload: Vec<u8>,
}

#[derive(Default)]
struct Caches {
    actions: HashMap<u32, Option<Instruction>>,
    frames: HashMap<u32, Option<Vec<FrameObject>>>,
    movies: HashMap<u32, Vec<MovieFrame>>,
    images: HashMap<u32, Option<DecodedImage>>,
    sounds: HashMap<u32, SoundRecord>,
    button_events: HashMap<u32, Vec<(u16, u16)>>,
}

pub struct Native32Container {
    store: ByteStore,
    pub header: ContainerHeader,
    pub thumbnail: Option<Vec<u8>>,
    sound_tbl: usize,
    cache: RefCell<Caches>,
}

impl Native32Container {
    pub fn parse(bytes: Vec<u8>) -> Result<Self, ContainerError> {
        let bytes: Arc<[u8]> = bytes.into();
        let mut idx = 0usize;
        let mut thumbnail = None;

        if bytes.len() >= 4 && &bytes[0..4] == THUMBNAIL_MAGIC {
            idx += 4;
            let store = ByteStore { bytes: bytes.clone(), base: 0 };
            let size = store.u32(idx + 12, "thumbnail size")?;
            let total = 0x10 + size as usize;
            let blob = store.slice(idx, total, "thumbnail payload")?.to_vec();
            thumbnail = Some(blob);
            idx += total;
        }

        let colorspace = loop {
            if idx + 4 > bytes.len() {
                return Err(ContainerError::HeaderNotFound);
            }
            let magic = &bytes[idx..idx + 4];
            if magic == Colorspace::Yuv.magic() {
                break Colorspace::Yuv;
            }
            if magic == Colorspace::Argb.magic() {
                break Colorspace::Argb;
            }
            idx += 1;
        };

        let store = ByteStore { bytes: bytes.clone(), base: 0 };
        let generator = store.c_string(idx + 4);
        idx += 0x60;
        let base = idx;
        let store = ByteStore { bytes: bytes.clone(), base };

        let fps_color_size = store.u16(base, "fps_color_size")?;
        let action_stack_var = store.u16(base + 2, "action_stack_var")?;
        let button_movieclip = store.u16(base + 4, "button_movieclip")?;
        let buffer_sound = store.u16(base + 6, "buffer_sound")?;
        idx = base + 8;

        let load_addr = store.u32(idx, "load_addr")?;
        let binary_size = store.u32(idx + 4, "binary_size")?;
        let mp3_offset = store.u32(idx + 8, "mp3_offset")?;
        let mp3_length = store.u32(idx + 12, "mp3_length")?;
        idx += 0x10;

        let encrypted: [u8; 32] = store
            .slice(idx, 32, "encrypted directory")?
            .try_into()
            .map_err(|_| ContainerError::TruncatedRecord {
                offset: idx,
                what: "encrypted directory",
            })?;
        idx += 0x20;

        let (decrypted, _key) =
            des::decrypt_header(&encrypted).ok_or(ContainerError::HeaderKeyNotFound)?;
        let dir_store = ByteStore { bytes: Arc::from(decrypted.to_vec()), base: 0 };
        let unkh = dir_store.u32(0, "unkh")?;
        let _magic8202 = dir_store.u32(4, "magic8202")?;
        let frame_tbl = dir_store.u32(8, "frame_tbl")?;
        let image_tbl = dir_store.u32(12, "image_tbl")?;
        let action_tbl = dir_store.u32(16, "action_tbl")?;
        let movie_tbl = dir_store.u32(20, "movie_tbl")?;
        let button_tbl = dir_store.u32(24, "button_tbl")?;
        let button_cond_tbl = dir_store.u32(28, "button_cond_tbl")?;

        let cursor_width = store.u16(idx, "cursor_width")?;
        let cursor_height = store.u16(idx + 2, "cursor_height")?;
        idx += 4;
        let cursor_size = 2 * cursor_width as usize * cursor_height as usize;
        let cursor = store.slice(idx, cursor_size, "cursor bitmap")?.to_vec();
        idx += cursor_size;
        let sound_tbl = idx;

        let header = ContainerHeader {
            colorspace,
            generator,
            fps_color_size,
            action_stack_var,
            button_movieclip,
            buffer_sound,
            load_addr,
            binary_size,
            mp3_offset,
            mp3_length,
            unkh,
            frame_tbl,
            image_tbl,
            action_tbl,
            movie_tbl,
            button_tbl,
            button_cond_tbl,
            cursor_width,
            cursor_height,
            cursor,
        };

        log::info!(
            "parsed Native32 container: colorspace={:?} generator={:?} base=0x{base:x}",
            header.colorspace,
            header.generator
        );

        Ok(Native32Container {
            store,
            header,
            thumbnail,
            sound_tbl,
            cache: RefCell::new(Caches::default()),
        })
    }

    fn disassemble_action(&self, index: u32) -> Result<Option<Instruction>, ContainerError> {
        let Some(slot) = one_based_slot(index) else {
            return Ok(None);
        };
        let ptr = self.store.base + self.header.action_tbl as usize + slot * 8;
        if ptr + 8 > self.store.len() {
            return Ok(None);
        }
        let opcode = self.store.u32(ptr, "action opcode")?;
        let raw_payload = self.store.u32(ptr + 4, "action payload")?;
        let op = match ActionCode::try_from(opcode) {
            Ok(op) => op,
            Err(()) => return Ok(None),
        };

        if raw_payload == 0 || op == ActionCode::End {
            return Ok(Some(Instruction { op, payload: Payload::None }));
        }

        let payload_idx = self.store.base + raw_payload as usize;
        if payload_idx >= self.store.len() {
            return Ok(Some(Instruction { op, payload: Payload::None }));
        }

        let payload = if op.is_branch() {
            Payload::Int(self.store.i16(payload_idx, "branch payload")?)
        } else {
            Payload::Str(self.store.c_string(payload_idx))
        };
        Ok(Some(Instruction { op, payload }))
    }

    pub fn get_action(&self, index: u32) -> Result<Option<Instruction>, ContainerError> {
        if let Some(hit) = self.cache.borrow().actions.get(&index) {
            return Ok(hit.clone());
        }
        let value = self.disassemble_action(index)?;
        self.cache.borrow_mut().actions.insert(index, value.clone());
        Ok(value)
    }

    pub fn get_frame(&self, frame: u32) -> Result<Option<Vec<FrameObject>>, ContainerError> {
        if let Some(hit) = self.cache.borrow().frames.get(&frame) {
            return Ok(hit.clone());
        }
        let value = self.load_frame(frame)?;
        self.cache.borrow_mut().frames.insert(frame, value.clone());
        Ok(value)
    }

    fn load_frame(&self, frame: u32) -> Result<Option<Vec<FrameObject>>, ContainerError> {
        let Some(slot) = one_based_slot(frame) else {
            return Ok(None);
        };
        let ptr_idx = self.store.base + self.header.frame_tbl as usize + 4 * slot;
        let offset = self.store.u32(ptr_idx, "frame pointer")?;
        if offset == 0 || offset as usize > self.store.len() {
            return Ok(None);
        }
        let mut i = self.store.base + offset as usize;
        let mut objects = Vec::new();
        while i + 0x10 <= self.store.len() {
            let obj_type = self.store.u16(i, "frame object type")?;
            if obj_type == 0x0000 || obj_type == 0xFFFF {
                break;
            }
            let kind = match ObjectKind::try_from(obj_type) {
                Ok(k) => k,
                Err(()) => break,
            };
            let index = self.store.u16(i + 2, "frame object index")?;
            let x = self.store.i16(i + 4, "frame object x")?;
            let y = self.store.i16(i + 6, "frame object y")?;
            let depth = self.store.u16(i + 8, "frame object depth")?;
            let reserved = self.store.u16(i + 10, "frame object reserved")?;
            if reserved != 0 {
                log::trace!("frame {frame} object at 0x{i:x} has nonzero reserved field");
            }
            let name_offset = self.store.u32(i + 12, "frame object name offset")?;
            let name = if name_offset != 0 {
                Some(self.store.c_string(self.store.base + name_offset as usize))
            } else {
                None
            };
            objects.push(FrameObject { kind, index, x, y, depth, name });
            i += 0x10;
        }
        Ok(Some(objects))
    }

    pub fn get_movie(&self, movie: u32) -> Result<Vec<MovieFrame>, ContainerError> {
        if let Some(hit) = self.cache.borrow().movies.get(&movie) {
            return Ok(hit.clone());
        }
        let Some(slot) = one_based_slot(movie) else {
            self.cache.borrow_mut().movies.insert(movie, Vec::new());
            return Ok(Vec::new());
        };
        let idx_ptr = self.store.base + self.header.movie_tbl as usize + 4 * slot;
        let rel = self.store.u32(idx_ptr, "movie pointer")?;
        let mut ptr = self.store.base + rel as usize;
        let mut frames = Vec::new();
        while ptr + 0x0C <= self.store.len() {
            let image = self.store.u16(ptr, "movie frame image")?;
            if image == 0xFFFF || image == 0x0000 {
                break;
            }
            let x = self.store.i16(ptr + 2, "movie frame x")?;
            let y = self.store.i16(ptr + 4, "movie frame y")?;
            let action = self.store.u16(ptr + 6, "movie frame action")?;
            let sound = self.store.u16(ptr + 8, "movie frame sound")?;
            let u3 = self.store.i16(ptr + 10, "movie frame u3")?;
            frames.push(MovieFrame { image, x, y, action, sound, u3 });
            ptr += 0x0C;
        }
        self.cache.borrow_mut().movies.insert(movie, frames.clone());
        Ok(frames)
    }

    pub fn get_image(&self, index: u32) -> Result<Option<DecodedImage>, ContainerError> {
        if let Some(hit) = self.cache.borrow().images.get(&index) {
            return Ok(hit.clone());
        }
        let Some(slot) = one_based_slot(index) else {
            self.cache.borrow_mut().images.insert(index, None);
            return Ok(None);
        };
        let ptr = self.store.base + self.header.image_tbl as usize + 4 * slot;
        let img_offset = self.store.u32(ptr, "image pointer")?;
        let value = if img_offset == 0xFFFFFFFF {
            None
        } else {
            let img_size = self.store.u32(
                self.store.base + img_offset as usize + 4,
                "image payload size",
            )?;
            let start = self.store.base + img_offset as usize;
            let payload = self.store.slice(start, img_size as usize + 8, "image payload")?;
            let decoded = match self.header.colorspace {
                Colorspace::Argb => image::decode_argb(payload)?,
                Colorspace::Yuv => image::decode_yuv(payload)?,
            };
            Some(decoded)
        };
        self.cache.borrow_mut().images.insert(index, value.clone());
        Ok(value)
    }

    fn resample(&self, data: &[u8]) -> Vec<u8> {
        resample_duplicate(data)
    }

    fn endian_swap_resample(&self, data: &[u8]) -> Vec<u8> {
        endian_swap_resample_duplicate(data)
    }

    pub fn get_sound(&self, idx: u32) -> Result<SoundRecord, ContainerError> {
        if let Some(hit) = self.cache.borrow().sounds.get(&idx) {
            return Ok(hit.clone());
        }
        let slot = one_based_slot(idx).ok_or(ContainerError::TruncatedRecord {
            offset: 0,
            what: "sound index (1-based, got 0)",
        })?;
        let table_idx = self.sound_tbl + slot * 4;
        let ptr = self.store.u32(table_idx, "sound table entry")?;
        let flags = ptr & 0xF000_0000;
        let addr = ptr & 0x0FFF_FFFF;

        let record = if flags == 0xF000_0000 {
            let begin = self.store.base + self.header.mp3_offset as usize + addr as usize;
            let size = self.store.u32(begin, "mp3 sound size")?;
            let data_start = begin + 6;
            let payload = self.store.slice(data_start, size as usize, "mp3 sound payload")?.to_vec();
            SoundRecord { format: SoundFormat::Mp3, payload }
        } else if flags == 0 {
            let begin = self.store.base + addr as usize;
            let size = self.store.u32(begin, "raw sound size")?;
            let data_start = begin + 4;
            let raw = self.store.slice(data_start, size as usize, "raw sound payload")?;
            let payload = match self.header.colorspace {
                Colorspace::Argb => self.resample(raw),
                Colorspace::Yuv => self.endian_swap_resample(raw),
            };
            SoundRecord { format: SoundFormat::Raw16Mono, payload }
        } else {
            return Err(ContainerError::UnsupportedSoundFormat { ptr });
        };

        self.cache.borrow_mut().sounds.insert(idx, record.clone());
        Ok(record)
    }

    pub fn get_button_events(&self, button: u32) -> Result<Vec<(u16, u16)>, ContainerError> {
        if let Some(hit) = self.cache.borrow().button_events.get(&button) {
            return Ok(hit.clone());
        }
        let Some(slot) = one_based_slot(button) else {
            self.cache.borrow_mut().button_events.insert(button, Vec::new());
            return Ok(Vec::new());
        };
        let cond_table_idx = self.store.base + self.header.button_cond_tbl as usize + 4 * slot;
        let rel = self.store.u32(cond_table_idx, "button cond pointer")?;
        let mut ptr = self.store.base + rel as usize;
        let total_act_len = self.store.u16(ptr, "button total act len")?;
        ptr += 2;

        let mut i = 0u16;
        let mut events = Vec::new();
        while i < total_act_len {
            let keycode = self.store.u16(ptr, "button keycode")?;
            let act_len = self.store.u16(ptr + 2, "button act len")?;
            let event = self.store.u16(ptr + 4, "button event action")?;
            events.push((keycode, event));
            if act_len == 0 {
                break;
            }
            i = i.wrapping_add(act_len);
            ptr += 6;
        }
        self.cache.borrow_mut().button_events.insert(button, events.clone());
        Ok(events)
    }
}

/// Converts a wire-level 1-based table index into a 0-based slot, rejecting
/// the invalid `0` index instead of underflowing (spec.md §3: "Indices into
/// tables are 1-based at the wire level").
fn one_based_slot(index: u32) -> Option<usize> {
    (index as usize).checked_sub(1)
}

/// `_resample` from `process_file.py`: duplicate each source byte pair without swapping.
fn resample_duplicate(data: &[u8]) -> Vec<u8> {
    let even_len = data.len() & !1usize;
    let out_len = 2 * even_len;
    (0..out_len)
        .map(|i| {
            let idx = (2 * (i / 4)) | (i & 1);
            data.get(idx).copied().unwrap_or(0)
        })
        .collect()
}

/// `_endian_swap_resample` from `process_file.py`: duplicate and swap each 16-bit sample.
fn endian_swap_resample_duplicate(data: &[u8]) -> Vec<u8> {
    let even_len = data.len() & !1usize;
    let out_len = 2 * even_len;
    (0..out_len)
        .map(|i| {
            let idx = (2 * (i / 4)) | ((i & 1) ^ 1);
            data.get(idx).copied().unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_duplicates_without_swap() {
        let out = resample_duplicate(&[0xAA, 0xBB]);
        assert_eq!(out, vec![0xAA, 0xBB, 0xAA, 0xBB]);
    }

    #[test]
    fn endian_swap_resample_duplicates_and_swaps() {
        let out = endian_swap_resample_duplicate(&[0xAA, 0xBB]);
        assert_eq!(out, vec![0xBB, 0xAA, 0xBB, 0xAA]);
    }

    #[test]
    fn action_code_round_trips_through_u32() {
        assert_eq!(ActionCode::try_from(0u32), Ok(ActionCode::Push));
        assert_eq!(ActionCode::try_from(43u32), Ok(ActionCode::Trace));
        assert_eq!(ActionCode::try_from(999u32), Err(()));
    }

    #[test]
    fn object_kind_rejects_out_of_range() {
        assert!(ObjectKind::try_from(6u16).is_err());
        assert_eq!(ObjectKind::try_from(1u16), Ok(ObjectKind::Image));
    }

    #[test]
    fn one_based_slot_rejects_zero_instead_of_underflowing() {
        assert_eq!(one_based_slot(0), None);
        assert_eq!(one_based_slot(1), Some(0));
        assert_eq!(one_based_slot(5), Some(4));
    }
}
