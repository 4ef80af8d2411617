// Color assignment for series.

use anyhow::{bail, Result};

/// The fixed 10-color categorical cycle, reused modulo across color groups.
pub const CATEGORY10: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
    "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

/// Series color when no color grouping is bound.
pub const SINGLE_SERIES_COLOR: &str = "#3f51b5";

/// Color for the group at `index`, cycling through the palette.
pub fn color_for(index: usize) -> &'static str {
    CATEGORY10[index % CATEGORY10.len()]
}

/// Convert `#rrggbb` into an `rgba(...)` string with the given alpha.
/// Area fills use the series base color at reduced opacity.
pub fn hex_to_rgba(hex: &str, alpha: f64) -> Result<String> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("Invalid hex color '{hex}'");
    }
    let r = u8::from_str_radix(&digits[0..2], 16)?;
    let g = u8::from_str_radix(&digits[2..4], 16)?;
    let b = u8::from_str_radix(&digits[4..6], 16)?;
    Ok(format!("rgba({r}, {g}, {b}, {alpha})"))
}
