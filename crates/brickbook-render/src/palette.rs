//! Color code to RGB lookup for the common solid colors.

use brickbook_ir::ColorCode;

/// Color used when nothing up the placement chain sets one.
pub const DEFAULT_COLOR: ColorCode = 7;

/// Fallback for codes missing from the table.
const UNKNOWN_RGB: [u8; 3] = [160, 160, 160];

const PALETTE: &[(ColorCode, [u8; 3])] = &[
    (0, [27, 42, 52]),
    (1, [30, 90, 168]),
    (2, [0, 133, 43]),
    (3, [6, 157, 159]),
    (4, [180, 0, 0]),
    (5, [211, 53, 157]),
    (6, [84, 51, 36]),
    (7, [138, 146, 141]),
    (8, [84, 89, 85]),
    (9, [151, 203, 217]),
    (10, [88, 171, 65]),
    (11, [0, 170, 164]),
    (12, [240, 109, 97]),
    (13, [246, 169, 187]),
    (14, [250, 200, 10]),
    (15, [244, 244, 244]),
    (19, [228, 205, 158]),
    (25, [214, 121, 35]),
    (28, [149, 125, 98]),
    (70, [95, 49, 9]),
    (71, [160, 165, 169]),
    (72, [108, 110, 104]),
];

/// RGB for a color code.
pub fn rgb(code: ColorCode) -> [u8; 3] {
    PALETTE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, rgb)| *rgb)
        .unwrap_or(UNKNOWN_RGB)
}

/// Edge color derived from a body color.
pub fn edge_rgb(code: ColorCode) -> [u8; 3] {
    if code == 0 {
        [89, 89, 89]
    } else {
        [51, 51, 51]
    }
}
