//! VM-level host callbacks: everything a running action program can trigger
//! outside of its own stack/variable state. Modeled as a capability trait
//! (spec.md §9 "Host as interface, not inheritance") rather than a back
//! pointer to the engine, mirroring `rfvp-script::vm::thread::VmRuntime`.

use crate::error::VmError;

/// `ActionProp` from `original_source/native32/actionvm.py`: the fixed,
/// numbered property set `GetProperty`/`SetProperty` address. Discriminants
/// match the source's `IntEnum` values (note the gap before `name`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Property {
    X = 0,
    Y = 1,
    XScale = 2,
    YScale = 3,
    CurrentFrame = 4,
    TotalFrames = 5,
    Alpha = 6,
    Visible = 7,
    Width = 8,
    Height = 9,
    Name = 13,
}

impl TryFrom<i64> for Property {
    type Error = ();
    fn try_from(v: i64) -> Result<Self, ()> {
        use Property::*;
        match v {
            0 => Ok(X),
            1 => Ok(Y),
            2 => Ok(XScale),
            3 => Ok(YScale),
            4 => Ok(CurrentFrame),
            5 => Ok(TotalFrames),
            6 => Ok(Alpha),
            7 => Ok(Visible),
            8 => Ok(Width),
            9 => Ok(Height),
            13 => Ok(Name),
            _ => Err(()),
        }
    }
}

/// Side effects a running action program can have on the playback engine.
/// `target` is `""` for the root timeline, otherwise a sprite name.
pub trait Host {
    fn stop(&mut self, target: &str);
    fn play(&mut self, target: &str);
    fn stop_sounds(&mut self, target: &str);

    /// `emu.get_frame(target)` in the source: the target's *current* frame
    /// number (1-based for the root, per the scheduler's `get_frame`).
    fn current_frame(&mut self, target: &str) -> i64;

    fn goto_frame(&mut self, target: &str, frame: i64);

    fn get_property(&mut self, target: &str, prop: Property) -> String;
    fn set_property(&mut self, target: &str, prop: Property, value: &str);

    fn clone_sprite(&mut self, src: &str, dst: &str, depth: i64);
    fn remove_sprite(&mut self, target: &str);

    fn now_ms(&mut self) -> u64;

    /// Runs a `GetUrl2` verb (`target` is the raw, not-yet-split `+`
    /// delimited string; see spec.md §4.F) and returns the VM variable
    /// assignments it produces, e.g. `SSL_GetSSLData` setting the named data
    /// variable and a success flag. The VM applies these itself since only
    /// it owns the variable table. Unknown verbs are fatal per spec.md §7.
    fn get_url2(&mut self, url: &str, target: &str) -> Result<Vec<(String, String)>, VmError>;
}
