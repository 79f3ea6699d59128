use input_linux_sys::{EV_ABS, EV_KEY, EV_SYN};

/// How a control's raw state is turned into press semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// `1` is a press, `0` a release, anything else is ignored.
    Digital,
    /// Continuous axis, pressed while above the trigger threshold.
    Trigger,
    /// Hat axis, pressed while non-zero.
    DPad,
}

/// A trackable control: canonical button name plus its input shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    pub name: &'static str,
    pub kind: ControlKind,
}

static CONTROLS: phf::Map<&'static str, Control> = phf::phf_map! {
    "BTN_SOUTH"  => Control { name: "A",       kind: ControlKind::Digital },
    "BTN_EAST"   => Control { name: "B",       kind: ControlKind::Digital },
    "BTN_WEST"   => Control { name: "X",       kind: ControlKind::Digital },
    "BTN_NORTH"  => Control { name: "Y",       kind: ControlKind::Digital },
    "BTN_TL"     => Control { name: "LB",      kind: ControlKind::Digital },
    "BTN_TR"     => Control { name: "RB",      kind: ControlKind::Digital },
    "BTN_THUMBL" => Control { name: "LS",      kind: ControlKind::Digital },
    "BTN_THUMBR" => Control { name: "RS",      kind: ControlKind::Digital },
    "BTN_START"  => Control { name: "Start",   kind: ControlKind::Digital },
    "BTN_SELECT" => Control { name: "Back",    kind: ControlKind::Digital },
    "ABS_Z"      => Control { name: "LT",      kind: ControlKind::Trigger },
    "ABS_RZ"     => Control { name: "RT",      kind: ControlKind::Trigger },
    "ABS_HAT0X"  => Control { name: "D-Pad X", kind: ControlKind::DPad },
    "ABS_HAT0Y"  => Control { name: "D-Pad Y", kind: ControlKind::DPad },
};

/// Canonical button names, digital buttons first, then triggers, then the d-pad.
pub const BUTTON_NAMES: [&str; 14] = [
    "A", "B", "X", "Y", "LB", "RB", "LS", "RS", "Start", "Back", "LT", "RT", "D-Pad X", "D-Pad Y",
];

// evdev EV_KEY codes for gamepad buttons (linux/input-event-codes.h).
static KEY_CODE_NAMES: phf::Map<u16, &'static str> = phf::phf_map! {
    304u16 => "BTN_SOUTH",
    305u16 => "BTN_EAST",
    306u16 => "BTN_C",
    307u16 => "BTN_NORTH",
    308u16 => "BTN_WEST",
    309u16 => "BTN_Z",
    310u16 => "BTN_TL",
    311u16 => "BTN_TR",
    312u16 => "BTN_TL2",
    313u16 => "BTN_TR2",
    314u16 => "BTN_SELECT",
    315u16 => "BTN_START",
    316u16 => "BTN_MODE",
    317u16 => "BTN_THUMBL",
    318u16 => "BTN_THUMBR",
    544u16 => "BTN_DPAD_UP",
    545u16 => "BTN_DPAD_DOWN",
    546u16 => "BTN_DPAD_LEFT",
    547u16 => "BTN_DPAD_RIGHT",
};

// evdev EV_ABS codes.
static ABS_CODE_NAMES: phf::Map<u16, &'static str> = phf::phf_map! {
    0u16 => "ABS_X",
    1u16 => "ABS_Y",
    2u16 => "ABS_Z",
    3u16 => "ABS_RX",
    4u16 => "ABS_RY",
    5u16 => "ABS_RZ",
    16u16 => "ABS_HAT0X",
    17u16 => "ABS_HAT0Y",
};

/// Looks up the control bound to a raw code name.
#[inline]
pub fn lookup(code: &str) -> Option<Control> {
    CONTROLS.get(code).copied()
}

/// Like [`lookup`], but also hands back the table's own `'static` copy of the code.
#[inline]
pub fn lookup_entry(code: &str) -> Option<(&'static str, Control)> {
    CONTROLS
        .get_entry(code)
        .map(|(code, control)| (*code, *control))
}

/// The canonical names of every trackable button.
#[inline]
pub fn available_buttons() -> &'static [&'static str] {
    &BUTTON_NAMES
}

/// Returns `true` if `name` is one of the canonical button names.
#[inline]
pub fn is_button_name(name: &str) -> bool {
    BUTTON_NAMES.contains(&name)
}

/// Resolves a button identifier to its canonical spelling.
/// Accepts canonical names case-insensitively, or a raw code name such as `BTN_SOUTH`.
pub fn resolve_button(identifier: &str) -> Option<&'static str> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(name) = BUTTON_NAMES
        .iter()
        .find(|name| name.eq_ignore_ascii_case(trimmed))
    {
        return Some(*name);
    }
    lookup(&trimmed.to_ascii_uppercase()).map(|control| control.name)
}

/// Maps an evdev `(type, code)` pair to its symbolic code name.
/// Returns `None` for event types and codes outside the gamepad tables.
#[inline]
pub fn code_name(type_: u16, code: u16) -> Option<&'static str> {
    match i32::from(type_) {
        EV_KEY => KEY_CODE_NAMES.get(&code).copied(),
        EV_ABS => ABS_CODE_NAMES.get(&code).copied(),
        _ => None,
    }
}

#[inline]
pub fn get_event_type_name(type_: u16) -> &'static str {
    match i32::from(type_) {
        EV_SYN => "EV_SYN",
        EV_KEY => "EV_KEY",
        EV_ABS => "EV_ABS",
        _ => "Unknown",
    }
}
