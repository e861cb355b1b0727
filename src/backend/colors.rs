//! Color name database (subset of rgb.txt)

/// Look up a color by name, returning 16-bit channels
pub fn lookup_named_color(name: &str) -> Option<(u16, u16, u16)> {
    let color_map: &[(&str, (u8, u8, u8))] = &[
        ("black", (0, 0, 0)),
        ("white", (255, 255, 255)),
        ("red", (255, 0, 0)),
        ("green", (0, 255, 0)),
        ("blue", (0, 0, 255)),
        ("yellow", (255, 255, 0)),
        ("cyan", (0, 255, 255)),
        ("magenta", (255, 0, 255)),
        ("gray", (190, 190, 190)),
        ("grey", (190, 190, 190)),
        ("darkgray", (169, 169, 169)),
        ("darkgrey", (169, 169, 169)),
        ("lightgray", (211, 211, 211)),
        ("lightgrey", (211, 211, 211)),
        ("orange", (255, 165, 0)),
        ("pink", (255, 192, 203)),
        ("brown", (165, 42, 42)),
        ("purple", (160, 32, 240)),
        ("navy", (0, 0, 128)),
        ("maroon", (176, 48, 96)),
        ("gold", (255, 215, 0)),
        ("coral", (255, 127, 80)),
        ("salmon", (250, 128, 114)),
        ("tomato", (255, 99, 71)),
        ("firebrick", (178, 34, 34)),
        ("darkred", (139, 0, 0)),
        ("darkgreen", (0, 100, 0)),
        ("darkblue", (0, 0, 139)),
        ("lightblue", (173, 216, 230)),
        ("lightgreen", (144, 238, 144)),
        ("violet", (238, 130, 238)),
        ("wheat", (245, 222, 179)),
        ("tan", (210, 180, 140)),
        ("khaki", (240, 230, 140)),
        ("ivory", (255, 255, 240)),
        ("snow", (255, 250, 250)),
        ("steelblue", (70, 130, 180)),
        ("royalblue", (65, 105, 225)),
        ("skyblue", (135, 206, 235)),
        ("turquoise", (64, 224, 208)),
        ("forestgreen", (34, 139, 34)),
        ("seagreen", (46, 139, 87)),
        ("lavender", (230, 230, 250)),
        ("plum", (221, 160, 221)),
        ("orchid", (218, 112, 214)),
        ("hotpink", (255, 105, 180)),
        ("beige", (245, 245, 220)),
        ("linen", (250, 240, 230)),
    ];

    let name_lower = name.to_lowercase().replace(' ', "");

    color_map
        .iter()
        .find(|(color_name, _)| *color_name == name_lower)
        .map(|(_, (r, g, b))| {
            // Convert 8-bit to 16-bit values
            (
                (*r as u16) << 8 | (*r as u16),
                (*g as u16) << 8 | (*g as u16),
                (*b as u16) << 8 | (*b as u16),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_and_space_insensitive() {
        assert_eq!(lookup_named_color("Steel Blue"), Some((0x4646, 0x8282, 0xb4b4)));
        assert_eq!(lookup_named_color("no such color"), None);
    }
}
