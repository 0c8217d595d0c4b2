//! Inline placeholder shown where removed media used to be.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;

use crate::common::xml::escape_text;

/// Placeholder dimensions in CSS pixels
pub const PLACEHOLDER_WIDTH: u32 = 300;
pub const PLACEHOLDER_HEIGHT: u32 = 60;

/// SVG markup labelling the removed file.
pub fn placeholder_svg(filename: &str) -> String {
    let (w, h) = (PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT);
    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r##"<rect x="0.5" y="0.5" width="{rw}" height="{rh}" fill="#f2f2f2" stroke="#999999"/>"##,
            r##"<text x="{cx}" y="{cy}" font-family="sans-serif" font-size="14" text-anchor="middle" fill="#555555">"##,
            "Media removed: {name}</text></svg>"
        ),
        w = w,
        h = h,
        rw = w - 1,
        rh = h - 1,
        cx = w / 2,
        cy = h / 2 + 5,
        name = escape_text(filename),
    )
}

/// `data:` URI of the placeholder for `filename`.
pub fn placeholder_data_uri(filename: &str) -> String {
    format!("data:image/svg+xml;base64,{}", BASE64_ENGINE.encode(placeholder_svg(filename)))
}
