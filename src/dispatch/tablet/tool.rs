//! Tool identity and capability lookup
//!
//! A tool is identified by `(type, tool-id, serial)`. Tools with a nonzero
//! hardware serial live in the context-global registry, because the same
//! physical pen may enter proximity on any tablet of the context; serial-less
//! tools cannot be told apart across tablets and stay local to the one that
//! saw them. Capabilities come from a table keyed on the hardware tool id,
//! with a per-type fallback for tools the table does not know.

use once_cell::sync::Lazy;

use crate::evdev::codes;
use crate::event::tablet::{TabletTool, TabletToolType, ToolCapabilities};

struct KnownTool {
    tool_id: u64,
    capabilities: ToolCapabilities,
    buttons: &'static [u16],
}

const STYLUS_BUTTONS: &[u16] = &[codes::BTN_STYLUS, codes::BTN_STYLUS2];
const STYLUS3_BUTTONS: &[u16] = &[codes::BTN_STYLUS, codes::BTN_STYLUS2, codes::BTN_STYLUS3];
const PUCK_BUTTONS: &[u16] = &[
    codes::BTN_LEFT,
    codes::BTN_RIGHT,
    codes::BTN_MIDDLE,
    codes::BTN_SIDE,
    codes::BTN_EXTRA,
];

/// Hardware tool ids with capabilities beyond their type's fallback
static TOOL_TABLE: Lazy<Vec<KnownTool>> = Lazy::new(|| {
    use ToolCapabilities as C;
    vec![
        // Intuos grip pen family
        KnownTool {
            tool_id: 0x802,
            capabilities: C::PRESSURE | C::DISTANCE | C::TILT,
            buttons: STYLUS_BUTTONS,
        },
        // Pro Pen 3D
        KnownTool {
            tool_id: 0x80c,
            capabilities: C::PRESSURE | C::DISTANCE | C::TILT,
            buttons: STYLUS3_BUTTONS,
        },
        // Art pen, adds barrel rotation
        KnownTool {
            tool_id: 0x804,
            capabilities: C::PRESSURE | C::DISTANCE | C::TILT | C::ROTATION,
            buttons: STYLUS_BUTTONS,
        },
        // Airbrush with finger slider and wheel
        KnownTool {
            tool_id: 0x902,
            capabilities: C::PRESSURE | C::DISTANCE | C::TILT | C::SLIDER | C::WHEEL,
            buttons: STYLUS_BUTTONS,
        },
        // 4D mouse
        KnownTool {
            tool_id: 0x94,
            capabilities: C::ROTATION | C::WHEEL,
            buttons: PUCK_BUTTONS,
        },
    ]
});

/// Capability set for a tool, by id when known, by type otherwise
pub(crate) fn capabilities_for(
    tool_type: TabletToolType,
    tool_id: u64,
) -> (ToolCapabilities, Vec<u16>) {
    if let Some(known) = TOOL_TABLE.iter().find(|t| t.tool_id == tool_id) {
        return (known.capabilities, known.buttons.to_vec());
    }
    use ToolCapabilities as C;
    match tool_type {
        TabletToolType::Pen
        | TabletToolType::Eraser
        | TabletToolType::Brush
        | TabletToolType::Pencil => (
            C::PRESSURE | C::DISTANCE | C::TILT,
            STYLUS_BUTTONS.to_vec(),
        ),
        TabletToolType::Airbrush => (
            C::PRESSURE | C::DISTANCE | C::TILT | C::SLIDER | C::WHEEL,
            STYLUS_BUTTONS.to_vec(),
        ),
        TabletToolType::Mouse | TabletToolType::Lens => {
            (C::ROTATION | C::WHEEL, PUCK_BUTTONS.to_vec())
        }
        TabletToolType::Finger => (C::empty(), Vec::new()),
    }
}

/// Find a previously-seen tool in `registry` or create and register it
pub(crate) fn lookup_or_create(
    registry: &mut Vec<TabletTool>,
    tool_type: TabletToolType,
    tool_id: u64,
    serial: u64,
) -> TabletTool {
    if let Some(tool) = registry.iter().find(|t| {
        t.tool_type() == tool_type && t.tool_id() == tool_id && t.serial() == serial
    }) {
        return tool.clone();
    }
    let (capabilities, buttons) = capabilities_for(tool_type, tool_id);
    let tool = TabletTool::new(tool_type, tool_id, serial, capabilities, buttons);
    registry.push(tool.clone());
    tool
}

/// Map a `BTN_TOOL_*` code to the tool type it announces
pub(crate) fn tool_type_for_code(code: u16) -> Option<TabletToolType> {
    match code {
        codes::BTN_TOOL_PEN => Some(TabletToolType::Pen),
        codes::BTN_TOOL_RUBBER => Some(TabletToolType::Eraser),
        codes::BTN_TOOL_BRUSH => Some(TabletToolType::Brush),
        codes::BTN_TOOL_PENCIL => Some(TabletToolType::Pencil),
        codes::BTN_TOOL_AIRBRUSH => Some(TabletToolType::Airbrush),
        codes::BTN_TOOL_FINGER => Some(TabletToolType::Finger),
        codes::BTN_TOOL_MOUSE => Some(TabletToolType::Mouse),
        codes::BTN_TOOL_LENS => Some(TabletToolType::Lens),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_tools_resolve_to_one_handle() {
        let mut registry = Vec::new();
        let a = lookup_or_create(&mut registry, TabletToolType::Pen, 0x802, 1234);
        let b = lookup_or_create(&mut registry, TabletToolType::Pen, 0x802, 1234);
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);

        let other = lookup_or_create(&mut registry, TabletToolType::Pen, 0x802, 99);
        assert_ne!(a, other);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn unknown_id_falls_back_to_type() {
        let (caps, buttons) = capabilities_for(TabletToolType::Mouse, 0xdead);
        assert!(caps.contains(ToolCapabilities::ROTATION));
        assert!(buttons.contains(&codes::BTN_LEFT));

        let (caps, _) = capabilities_for(TabletToolType::Pen, 0xdead);
        assert!(caps.contains(ToolCapabilities::PRESSURE));
        assert!(!caps.contains(ToolCapabilities::ROTATION));
    }

    #[test]
    fn airbrush_table_entry_has_slider() {
        let (caps, _) = capabilities_for(TabletToolType::Airbrush, 0x902);
        assert!(caps.contains(ToolCapabilities::SLIDER | ToolCapabilities::WHEEL));
    }
}
