//! Stable color assignment for model names and group tags.
//!
//! Colors are a pure function of the name: a curated override table is consulted first, then a
//! 32-bit multiplicative hash over the name's UTF-16 code units indexes into one of two palettes.
//! Short names (at most [`SHORT_NAME_LIMIT`] units) use the 10-color palette, longer names the
//! 20-color one, so that visually similar short model ids still spread across the legend.

use crate::types::Color;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Names longer than this (in UTF-16 code units) use [`EXTENDED_PALETTE`]
pub const SHORT_NAME_LIMIT: usize = 10;

/// Base palette for short model names
pub const BASE_PALETTE: [Color; 10] = [
    "#1664FF", "#1AC6FF", "#FF8A00", "#3CC780", "#7442D4", "#FFC400", "#304D77", "#B48DEB", "#009488", "#FF7DDA",
];

/// Extended palette for long model names
pub const EXTENDED_PALETTE: [Color; 20] = [
    "#1664FF", "#B2CFFF", "#1AC6FF", "#94EFFF", "#FF8A00", "#FFCE7A", "#3CC780", "#B9EDCD", "#7442D4", "#DDC5FA", "#FFC400", "#FAE878",
    "#304D77", "#8B959E", "#B48DEB", "#EFE3FF", "#009488", "#59BAA8", "#FF7DDA", "#FFCFEE",
];

/// Named tag colors used for channel group badges
pub const TAG_PALETTE: [Color; 15] = [
    "amber",
    "blue",
    "cyan",
    "green",
    "grey",
    "indigo",
    "light-blue",
    "lime",
    "orange",
    "pink",
    "purple",
    "red",
    "teal",
    "violet",
    "yellow",
];

/// Hand-curated colors for well-known models. Families share hues.
static MODEL_COLOR_OVERRIDES: Lazy<HashMap<&'static str, Color>> = Lazy::new(|| {
    HashMap::from([
        ("dall-e", "rgb(147,112,219)"),
        ("dall-e-3", "rgb(153,50,204)"),
        ("gpt-3.5-turbo", "rgb(184,227,167)"),
        ("gpt-3.5-turbo-0613", "rgb(60,179,113)"),
        ("gpt-3.5-turbo-1106", "rgb(32,178,170)"),
        ("gpt-3.5-turbo-16k", "rgb(149,252,206)"),
        ("gpt-3.5-turbo-16k-0613", "rgb(119,255,214)"),
        ("gpt-3.5-turbo-instruct", "rgb(175,238,238)"),
        ("gpt-4", "rgb(135,206,235)"),
        ("gpt-4-0613", "rgb(100,149,237)"),
        ("gpt-4-1106-preview", "rgb(30,144,255)"),
        ("gpt-4-0125-preview", "rgb(2,177,236)"),
        ("gpt-4-turbo-preview", "rgb(2,177,255)"),
        ("gpt-4-32k", "rgb(104,111,238)"),
        ("gpt-4-32k-0613", "rgb(61,71,139)"),
        ("gpt-4-all", "rgb(65,105,225)"),
        ("gpt-4-gizmo-*", "rgb(0,0,255)"),
        ("gpt-4-vision-preview", "rgb(25,25,112)"),
        ("text-ada-001", "rgb(255,192,203)"),
        ("text-babbage-001", "rgb(255,160,122)"),
        ("text-curie-001", "rgb(219,112,147)"),
        ("text-davinci-003", "rgb(219,112,147)"),
        ("text-davinci-edit-001", "rgb(255,105,180)"),
        ("text-embedding-ada-002", "rgb(255,182,193)"),
        ("text-embedding-v1", "rgb(255,174,185)"),
        ("text-moderation-latest", "rgb(255,130,171)"),
        ("text-moderation-stable", "rgb(255,160,122)"),
        ("tts-1", "rgb(255,140,0)"),
        ("tts-1-1106", "rgb(255,165,0)"),
        ("tts-1-hd", "rgb(255,215,0)"),
        ("tts-1-hd-1106", "rgb(255,223,0)"),
        ("whisper-1", "rgb(245,245,220)"),
        ("claude-3-opus-20240229", "rgb(255,132,31)"),
        ("claude-3-sonnet-20240229", "rgb(253,135,93)"),
        ("claude-3-haiku-20240307", "rgb(255,175,146)"),
        ("claude-2.1", "rgb(255,209,190)"),
    ])
});

/// Fixed badge colors for premium-tier group names
const GROUP_TAG_OVERRIDES: [(&str, Color); 4] = [("vip", "yellow"), ("pro", "yellow"), ("svip", "red"), ("premium", "red")];

/// 32-bit hash of a name: `h = h * 31 + unit` over UTF-16 code units with two's-complement
/// wrapping, returned as an absolute value.
pub fn name_hash(name: &str) -> u32 {
    name.encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
        .unsigned_abs()
}

/// Color for a model name. Same name, same color, in every process.
pub fn color_of(model_name: &str) -> Color {
    if let Some(color) = MODEL_COLOR_OVERRIDES.get(model_name) {
        return *color;
    }

    let palette: &[Color] = if model_name.encode_utf16().count() > SHORT_NAME_LIMIT {
        &EXTENDED_PALETTE
    } else {
        &BASE_PALETTE
    };

    palette[name_hash(model_name) as usize % palette.len()]
}

/// Whether a model name has a curated color
pub fn has_override(model_name: &str) -> bool {
    MODEL_COLOR_OVERRIDES.contains_key(model_name)
}

/// Badge color for a channel or user group name
pub fn group_tag_color(group: &str) -> Color {
    if let Some((_, color)) = GROUP_TAG_OVERRIDES.iter().find(|(name, _)| *name == group) {
        return *color;
    }
    let sum: usize = group.encode_utf16().map(usize::from).sum();
    TAG_PALETTE[sum % TAG_PALETTE.len()]
}
