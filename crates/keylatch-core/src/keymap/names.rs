//! Virtual-key name, description and alias table.
//!
//! Names follow the `VK_*` constants of `<winuser.h>`, lower-cased and with
//! the `VK_` prefix removed (`VK_RETURN` becomes `"return"`).  Digit keys are
//! spelled `"_0"`..`"_9"` so that every name is a valid identifier in user
//! logic.  Codes that Windows reserves or leaves unassigned carry a marker
//! description instead of a name.
//!
//! Lookups by code are O(1) indexes into [`VK_TABLE`].  Lookups by name scan
//! the table; they happen when user configuration is parsed, not per event.

use super::KeyCode;

/// Metadata for one virtual-key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualKeyInfo {
    /// Canonical name, empty when the code has none.
    pub name: &'static str,
    /// Free-form description, empty when there is nothing to add.
    pub description: &'static str,
    /// Alternative names that resolve to the same code.
    pub aliases: &'static [&'static str],
}

impl VirtualKeyInfo {
    const BLANK: Self = Self {
        name: "",
        description: "",
        aliases: &[],
    };

    const fn named(name: &'static str) -> Self {
        Self {
            name,
            description: "",
            aliases: &[],
        }
    }

    const fn described(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            aliases: &[],
        }
    }

    const fn aliased(
        name: &'static str,
        description: &'static str,
        aliases: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            description,
            aliases,
        }
    }

    const fn marker(description: &'static str) -> Self {
        Self {
            name: "",
            description,
            aliases: &[],
        }
    }

    /// Returns `true` if `candidate` is this key's name or one of its aliases.
    pub fn answers_to(&self, candidate: &str) -> bool {
        !self.name.is_empty()
            && (self.name.eq_ignore_ascii_case(candidate)
                || self
                    .aliases
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(candidate)))
    }
}

const RESERVED: VirtualKeyInfo = VirtualKeyInfo::marker("reserved");
const UNASSIGNED: VirtualKeyInfo = VirtualKeyInfo::marker("unassigned");

/// Returns the metadata entry for `code`.
pub fn info(code: KeyCode) -> &'static VirtualKeyInfo {
    &VK_TABLE[code as usize]
}

/// Returns the canonical name of `code`, or `None` if it has none.
pub fn name_of(code: KeyCode) -> Option<&'static str> {
    let name = VK_TABLE[code as usize].name;
    (!name.is_empty()).then_some(name)
}

/// Returns the description of `code`, or `None` if it has none.
pub fn describe(code: KeyCode) -> Option<&'static str> {
    let description = VK_TABLE[code as usize].description;
    (!description.is_empty()).then_some(description)
}

/// Resolves a key name or alias (case-insensitive) to its code.
///
/// An optional `vk_` prefix is accepted, so `"VK_RETURN"` and `"return"` are
/// equivalent.
pub fn lookup_name(name: &str) -> Option<KeyCode> {
    let trimmed = name.trim();
    let bare = match trimmed.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("vk_") => &trimmed[3..],
        _ => trimmed,
    };
    if bare.is_empty() {
        return None;
    }
    VK_TABLE
        .iter()
        .position(|entry| entry.answers_to(bare))
        .map(|code| code as KeyCode)
}

/// The 256-entry virtual-key metadata table, indexed by VK code.
///
/// Reference: https://learn.microsoft.com/windows/win32/inputdev/virtual-key-codes
pub const VK_TABLE: [VirtualKeyInfo; 256] = {
    let mut t = [VirtualKeyInfo::BLANK; 256];

    t[0x01] = VirtualKeyInfo::named("lbutton");
    t[0x02] = VirtualKeyInfo::named("rbutton");
    t[0x03] = VirtualKeyInfo::named("cancel");
    t[0x04] = VirtualKeyInfo::described("mbutton", "not contiguous with l & rbutton");
    t[0x05] = VirtualKeyInfo::described("xbutton1", "not contiguous with l & rbutton");
    t[0x06] = VirtualKeyInfo::described("xbutton2", "not contiguous with l & rbutton");
    t[0x07] = UNASSIGNED;
    t[0x08] = VirtualKeyInfo::named("back");
    t[0x09] = VirtualKeyInfo::named("tab");
    let mut i = 0x0A;
    while i <= 0x0B {
        t[i] = RESERVED;
        i += 1;
    }
    t[0x0C] = VirtualKeyInfo::named("clear");
    t[0x0D] = VirtualKeyInfo::named("return");
    t[0x10] = VirtualKeyInfo::named("shift");
    t[0x11] = VirtualKeyInfo::named("control");
    t[0x12] = VirtualKeyInfo::named("menu");
    t[0x13] = VirtualKeyInfo::named("pause");
    t[0x14] = VirtualKeyInfo::named("capital");
    t[0x15] = VirtualKeyInfo::aliased("kana", "Japanese and Korean versions are different", &["hangul", "hangeul"]);
    t[0x17] = VirtualKeyInfo::named("junja");
    t[0x18] = VirtualKeyInfo::named("final");
    t[0x19] = VirtualKeyInfo::aliased("kanji", "Japanese and Korean versions are different", &["hanja"]);
    t[0x1B] = VirtualKeyInfo::named("escape");
    t[0x1C] = VirtualKeyInfo::named("convert");
    t[0x1D] = VirtualKeyInfo::named("nonconvert");
    t[0x1E] = VirtualKeyInfo::named("accept");
    t[0x1F] = VirtualKeyInfo::named("modechange");
    t[0x20] = VirtualKeyInfo::named("space");
    t[0x21] = VirtualKeyInfo::named("prior");
    t[0x22] = VirtualKeyInfo::named("next");
    t[0x23] = VirtualKeyInfo::named("end");
    t[0x24] = VirtualKeyInfo::named("home");
    t[0x25] = VirtualKeyInfo::named("left");
    t[0x26] = VirtualKeyInfo::named("up");
    t[0x27] = VirtualKeyInfo::named("right");
    t[0x28] = VirtualKeyInfo::named("down");
    t[0x29] = VirtualKeyInfo::named("select");
    t[0x2A] = VirtualKeyInfo::named("print");
    t[0x2B] = VirtualKeyInfo::named("execute");
    t[0x2C] = VirtualKeyInfo::named("snapshot");
    t[0x2D] = VirtualKeyInfo::named("insert");
    t[0x2E] = VirtualKeyInfo::named("delete");
    t[0x2F] = VirtualKeyInfo::named("help");
    t[0x30] = VirtualKeyInfo::described("_0", "same as ASCII '0'");
    t[0x31] = VirtualKeyInfo::described("_1", "same as ASCII '1'");
    t[0x32] = VirtualKeyInfo::described("_2", "same as ASCII '2'");
    t[0x33] = VirtualKeyInfo::described("_3", "same as ASCII '3'");
    t[0x34] = VirtualKeyInfo::described("_4", "same as ASCII '4'");
    t[0x35] = VirtualKeyInfo::described("_5", "same as ASCII '5'");
    t[0x36] = VirtualKeyInfo::described("_6", "same as ASCII '6'");
    t[0x37] = VirtualKeyInfo::described("_7", "same as ASCII '7'");
    t[0x38] = VirtualKeyInfo::described("_8", "same as ASCII '8'");
    t[0x39] = VirtualKeyInfo::described("_9", "same as ASCII '9'");
    t[0x40] = UNASSIGNED;
    t[0x41] = VirtualKeyInfo::described("a", "same as ASCII 'A'");
    t[0x42] = VirtualKeyInfo::described("b", "same as ASCII 'B'");
    t[0x43] = VirtualKeyInfo::described("c", "same as ASCII 'C'");
    t[0x44] = VirtualKeyInfo::described("d", "same as ASCII 'D'");
    t[0x45] = VirtualKeyInfo::described("e", "same as ASCII 'E'");
    t[0x46] = VirtualKeyInfo::described("f", "same as ASCII 'F'");
    t[0x47] = VirtualKeyInfo::described("g", "same as ASCII 'G'");
    t[0x48] = VirtualKeyInfo::described("h", "same as ASCII 'H'");
    t[0x49] = VirtualKeyInfo::described("i", "same as ASCII 'I'");
    t[0x4A] = VirtualKeyInfo::described("j", "same as ASCII 'J'");
    t[0x4B] = VirtualKeyInfo::described("k", "same as ASCII 'K'");
    t[0x4C] = VirtualKeyInfo::described("l", "same as ASCII 'L'");
    t[0x4D] = VirtualKeyInfo::described("m", "same as ASCII 'M'");
    t[0x4E] = VirtualKeyInfo::described("n", "same as ASCII 'N'");
    t[0x4F] = VirtualKeyInfo::described("o", "same as ASCII 'O'");
    t[0x50] = VirtualKeyInfo::described("p", "same as ASCII 'P'");
    t[0x51] = VirtualKeyInfo::described("q", "same as ASCII 'Q'");
    t[0x52] = VirtualKeyInfo::described("r", "same as ASCII 'R'");
    t[0x53] = VirtualKeyInfo::described("s", "same as ASCII 'S'");
    t[0x54] = VirtualKeyInfo::described("t", "same as ASCII 'T'");
    t[0x55] = VirtualKeyInfo::described("u", "same as ASCII 'U'");
    t[0x56] = VirtualKeyInfo::described("v", "same as ASCII 'V'");
    t[0x57] = VirtualKeyInfo::described("w", "same as ASCII 'W'");
    t[0x58] = VirtualKeyInfo::described("x", "same as ASCII 'X'");
    t[0x59] = VirtualKeyInfo::described("y", "same as ASCII 'Y'");
    t[0x5A] = VirtualKeyInfo::described("z", "same as ASCII 'Z'");
    t[0x5B] = VirtualKeyInfo::named("lwin");
    t[0x5C] = VirtualKeyInfo::named("rwin");
    t[0x5D] = VirtualKeyInfo::named("apps");
    t[0x5E] = RESERVED;
    t[0x5F] = VirtualKeyInfo::named("sleep");
    t[0x60] = VirtualKeyInfo::named("numpad0");
    t[0x61] = VirtualKeyInfo::named("numpad1");
    t[0x62] = VirtualKeyInfo::named("numpad2");
    t[0x63] = VirtualKeyInfo::named("numpad3");
    t[0x64] = VirtualKeyInfo::named("numpad4");
    t[0x65] = VirtualKeyInfo::named("numpad5");
    t[0x66] = VirtualKeyInfo::named("numpad6");
    t[0x67] = VirtualKeyInfo::named("numpad7");
    t[0x68] = VirtualKeyInfo::named("numpad8");
    t[0x69] = VirtualKeyInfo::named("numpad9");
    t[0x6A] = VirtualKeyInfo::named("multiply");
    t[0x6B] = VirtualKeyInfo::named("add");
    t[0x6C] = VirtualKeyInfo::named("separator");
    t[0x6D] = VirtualKeyInfo::named("subtract");
    t[0x6E] = VirtualKeyInfo::named("decimal");
    t[0x6F] = VirtualKeyInfo::named("divide");
    t[0x70] = VirtualKeyInfo::named("f1");
    t[0x71] = VirtualKeyInfo::named("f2");
    t[0x72] = VirtualKeyInfo::named("f3");
    t[0x73] = VirtualKeyInfo::named("f4");
    t[0x74] = VirtualKeyInfo::named("f5");
    t[0x75] = VirtualKeyInfo::named("f6");
    t[0x76] = VirtualKeyInfo::named("f7");
    t[0x77] = VirtualKeyInfo::named("f8");
    t[0x78] = VirtualKeyInfo::named("f9");
    t[0x79] = VirtualKeyInfo::named("f10");
    t[0x7A] = VirtualKeyInfo::named("f11");
    t[0x7B] = VirtualKeyInfo::named("f12");
    t[0x7C] = VirtualKeyInfo::named("f13");
    t[0x7D] = VirtualKeyInfo::named("f14");
    t[0x7E] = VirtualKeyInfo::named("f15");
    t[0x7F] = VirtualKeyInfo::named("f16");
    t[0x80] = VirtualKeyInfo::named("f17");
    t[0x81] = VirtualKeyInfo::named("f18");
    t[0x82] = VirtualKeyInfo::named("f19");
    t[0x83] = VirtualKeyInfo::named("f20");
    t[0x84] = VirtualKeyInfo::named("f21");
    t[0x85] = VirtualKeyInfo::named("f22");
    t[0x86] = VirtualKeyInfo::named("f23");
    t[0x87] = VirtualKeyInfo::named("f24");
    let mut i = 0x88;
    while i <= 0x8F {
        t[i] = UNASSIGNED;
        i += 1;
    }
    t[0x90] = VirtualKeyInfo::named("numlock");
    t[0x91] = VirtualKeyInfo::named("scroll");
    t[0x92] = VirtualKeyInfo::aliased("oem_fj_jisho", "Fujitsu/OASYS 'dictionary' key; NEC PC-9800 '=' key on numpad", &["oem_nec_equal"]);
    t[0x93] = VirtualKeyInfo::described("oem_fj_masshou", "Fujitsu/OASYS 'unregister word' key");
    t[0x94] = VirtualKeyInfo::described("oem_fj_touroku", "Fujitsu/OASYS 'register word' key");
    t[0x95] = VirtualKeyInfo::described("oem_fj_loya", "Fujitsu/OASYS 'left oyayubi' key");
    t[0x96] = VirtualKeyInfo::described("oem_fj_roya", "Fujitsu/OASYS 'right oyayubi' key");
    let mut i = 0x97;
    while i <= 0x9F {
        t[i] = UNASSIGNED;
        i += 1;
    }
    t[0xA0] = VirtualKeyInfo::described("lshift", "left Shift; Used only as parameters to GetAsyncKeyState() and GetKeyState(). No other API or message will distinguish left and right keys in this way.");
    t[0xA1] = VirtualKeyInfo::described("rshift", "right Shift; Used only as parameters to GetAsyncKeyState() and GetKeyState(). No other API or message will distinguish left and right keys in this way.");
    t[0xA2] = VirtualKeyInfo::described("lcontrol", "left Ctrl; Used only as parameters to GetAsyncKeyState() and GetKeyState(). No other API or message will distinguish left and right keys in this way.");
    t[0xA3] = VirtualKeyInfo::described("rcontrol", "right Ctrl; Used only as parameters to GetAsyncKeyState() and GetKeyState(). No other API or message will distinguish left and right keys in this way.");
    t[0xA4] = VirtualKeyInfo::described("lmenu", "left Alt; Used only as parameters to GetAsyncKeyState() and GetKeyState(). No other API or message will distinguish left and right keys in this way.");
    t[0xA5] = VirtualKeyInfo::described("rmenu", "right Alt; Used only as parameters to GetAsyncKeyState() and GetKeyState(). No other API or message will distinguish left and right keys in this way.");
    t[0xA6] = VirtualKeyInfo::named("browser_back");
    t[0xA7] = VirtualKeyInfo::named("browser_forward");
    t[0xA8] = VirtualKeyInfo::named("browser_refresh");
    t[0xA9] = VirtualKeyInfo::named("browser_stop");
    t[0xAA] = VirtualKeyInfo::named("browser_search");
    t[0xAB] = VirtualKeyInfo::named("browser_favorites");
    t[0xAC] = VirtualKeyInfo::named("browser_home");
    t[0xAD] = VirtualKeyInfo::named("volume_mute");
    t[0xAE] = VirtualKeyInfo::named("volume_down");
    t[0xAF] = VirtualKeyInfo::named("volume_up");
    t[0xB0] = VirtualKeyInfo::named("media_next_track");
    t[0xB1] = VirtualKeyInfo::named("media_prev_track");
    t[0xB2] = VirtualKeyInfo::named("media_stop");
    t[0xB3] = VirtualKeyInfo::named("media_play_pause");
    t[0xB4] = VirtualKeyInfo::named("launch_mail");
    t[0xB5] = VirtualKeyInfo::named("launch_media_select");
    t[0xB6] = VirtualKeyInfo::named("launch_app1");
    t[0xB7] = VirtualKeyInfo::named("launch_app2");
    let mut i = 0xB8;
    while i <= 0xB9 {
        t[i] = RESERVED;
        i += 1;
    }
    t[0xBA] = VirtualKeyInfo::described("oem_1", "';:' for us");
    t[0xBB] = VirtualKeyInfo::described("oem_plus", "'+' any country");
    t[0xBC] = VirtualKeyInfo::described("oem_comma", "',' any country");
    t[0xBD] = VirtualKeyInfo::described("oem_minus", "'-' any country");
    t[0xBE] = VirtualKeyInfo::described("oem_period", "'.' any country");
    t[0xBF] = VirtualKeyInfo::described("oem_2", "'/?' for us");
    t[0xC0] = VirtualKeyInfo::described("oem_3", "'`~' for us");
    let mut i = 0xC1;
    while i <= 0xD7 {
        t[i] = RESERVED;
        i += 1;
    }
    let mut i = 0xD8;
    while i <= 0xDA {
        t[i] = UNASSIGNED;
        i += 1;
    }
    t[0xDB] = VirtualKeyInfo::described("oem_4", "'[{' for us");
    t[0xDC] = VirtualKeyInfo::described("oem_5", "'\\|' for us");
    t[0xDD] = VirtualKeyInfo::described("oem_6", "']}' for us");
    t[0xDE] = VirtualKeyInfo::described("oem_7", "''\"' for us");
    t[0xDF] = VirtualKeyInfo::named("oem_8");
    t[0xE0] = RESERVED;
    t[0xE1] = VirtualKeyInfo::described("oem_ax", "Various extended or enhanced keyboards; 'ax' key on japanese ax kbd");
    t[0xE2] = VirtualKeyInfo::described("oem_102", "Various extended or enhanced keyboards; \"<>\" or \"\\|\" on rt 102-key kbd.");
    t[0xE3] = VirtualKeyInfo::described("ico_help", "Various extended or enhanced keyboards; help key on ico");
    t[0xE4] = VirtualKeyInfo::described("ico_00", "Various extended or enhanced keyboards; 00 key on ico");
    t[0xE5] = VirtualKeyInfo::named("processkey");
    t[0xE6] = VirtualKeyInfo::named("ico_clear");
    t[0xE7] = VirtualKeyInfo::named("packet");
    t[0xE8] = UNASSIGNED;
    t[0xE9] = VirtualKeyInfo::described("oem_reset", "Nokia/Ericsson");
    t[0xEA] = VirtualKeyInfo::described("oem_jump", "Nokia/Ericsson");
    t[0xEB] = VirtualKeyInfo::described("oem_pa1", "Nokia/Ericsson");
    t[0xEC] = VirtualKeyInfo::described("oem_pa2", "Nokia/Ericsson");
    t[0xED] = VirtualKeyInfo::described("oem_pa3", "Nokia/Ericsson");
    t[0xEE] = VirtualKeyInfo::described("oem_wsctrl", "Nokia/Ericsson");
    t[0xEF] = VirtualKeyInfo::described("oem_cusel", "Nokia/Ericsson");
    t[0xF0] = VirtualKeyInfo::described("oem_attn", "Nokia/Ericsson");
    t[0xF1] = VirtualKeyInfo::described("oem_finish", "Nokia/Ericsson");
    t[0xF2] = VirtualKeyInfo::described("oem_copy", "Nokia/Ericsson");
    t[0xF3] = VirtualKeyInfo::described("oem_auto", "Nokia/Ericsson");
    t[0xF4] = VirtualKeyInfo::described("oem_enlw", "Nokia/Ericsson");
    t[0xF5] = VirtualKeyInfo::described("oem_backtab", "Nokia/Ericsson");
    t[0xF6] = VirtualKeyInfo::named("attn");
    t[0xF7] = VirtualKeyInfo::named("crsel");
    t[0xF8] = VirtualKeyInfo::named("exsel");
    t[0xF9] = VirtualKeyInfo::named("ereof");
    t[0xFA] = VirtualKeyInfo::named("play");
    t[0xFB] = VirtualKeyInfo::named("zoom");
    t[0xFC] = VirtualKeyInfo::named("noname");
    t[0xFD] = VirtualKeyInfo::named("pa1");
    t[0xFE] = VirtualKeyInfo::named("oem_clear");
    t[0xFF] = RESERVED;

    t
};
