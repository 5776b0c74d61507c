//! Dark mode style sheet generation.
//!
//! `DarkStylesheet` is the single source of truth for every value the
//! injected CSS uses. It resolves a `SettingsRecord` into derived lightness
//! values, then renders the rule blocks in a fixed order:
//!
//! 1. base rules (page filter, body, containers, text, links, forms,
//!    buttons, scrollbars)
//! 2. media inversion (when `invertImages` is set)
//! 3. theme overlay (overrides base rules, so it must come after them)
//! 4. color preservation (when `preserveColors` is set)
//!
//! Every declaration is `!important` so it wins over page author styles.

use crate::settings::{SettingsRecord, ThemeStyle};

// Lightness clamp ranges (percent). These are part of the visual contract:
// identical settings must produce identical colors across implementations.
const BODY_BACKGROUND_RANGE: (f64, f64) = (5.0, 20.0);
const BODY_FOREGROUND_RANGE: (f64, f64) = (70.0, 95.0);
const INPUT_BACKGROUND_RANGE: (f64, f64) = (15.0, 30.0);
const INPUT_BORDER_RANGE: (f64, f64) = (30.0, 50.0);
const BUTTON_BACKGROUND_RANGE: (f64, f64) = (20.0, 40.0);
const BUTTON_BORDER_RANGE: (f64, f64) = (30.0, 60.0);
const SCROLLBAR_TRACK_RANGE: (f64, f64) = (10.0, 25.0);
const SCROLLBAR_THUMB_RANGE: (f64, f64) = (30.0, 60.0);

// Body foreground starts from this base before adding darkness / 2.
const BODY_FOREGROUND_BASE: f64 = 60.0;

// Links ignore darkness and contrast.
const LINK_HUE: u32 = 210;
const LINK_LIGHTNESS: u32 = 70;
const LINK_ACTIVE_LIGHTNESS: u32 = 85;

// true-dark overlay
const TRUE_DARK_BACKGROUND: &str = "#000";
const TRUE_DARK_FOREGROUND: &str = "#e0e0e0";

// blue-dark overlay
const BLUE_DARK_HUE: u32 = 220;
const BLUE_DARK_BACKGROUND_SATURATION: u32 = 30;
const BLUE_DARK_FOREGROUND_SATURATION: u32 = 20;
const BLUE_DARK_BACKGROUND_RANGE: (f64, f64) = (5.0, 15.0);
const BLUE_DARK_FOREGROUND_RANGE: (f64, f64) = (75.0, 95.0);
const BLUE_DARK_FOREGROUND_BASE: f64 = 65.0;
const BLUE_DARK_LINK_HUE: u32 = 200;
const BLUE_DARK_LINK_LIGHTNESS: u32 = 65;

// sepia overlay
const SEPIA_HUE: u32 = 30;
const SEPIA_BACKGROUND_SATURATION: u32 = 30;
const SEPIA_FOREGROUND_SATURATION: u32 = 20;
const SEPIA_BACKGROUND_RANGE: (f64, f64) = (10.0, 25.0);
const SEPIA_FOREGROUND_RANGE: (f64, f64) = (20.0, 40.0);

const CONTAINER_SELECTORS: &str = "div, section, article, main, aside, header, footer, nav,
form, fieldset, legend, details, summary, figure, figcaption";

const TEXT_SELECTORS: &str = "h1, h2, h3, h4, h5, h6, p, span, li, td, th, caption,
label, input, textarea, select, button, a, em, strong, i, b,
blockquote, cite, code, pre, mark, small, sub, sup";

const LINK_SELECTORS: &str = "a, a:link, a:visited";
const LINK_ACTIVE_SELECTORS: &str = "a:hover, a:active, a:focus";
const INPUT_SELECTORS: &str = "input, textarea, select";
const BUTTON_SELECTORS: &str =
    r#"button, input[type="button"], input[type="submit"], input[type="reset"]"#;
const MEDIA_SELECTORS: &str = "img, video, canvas, svg";
const PRESERVE_SELECTORS: &str = r#".logo, .brand, [class*="color-"], [class*="Color"],
[style*="color:"], [style*="background-color:"]"#;

/// Clamp `value` into `range` (inclusive).
fn clamp_to(value: f64, range: (f64, f64)) -> f64 {
    value.clamp(range.0, range.1)
}

/// Format an HSL color. Lightness prints in shortest round-trip form
/// (`10`, `85.5`, `29.411764705882355`).
pub fn hsl(hue: u32, saturation: u32, lightness: f64) -> String {
    format!("hsl({hue}, {saturation}%, {lightness}%)")
}

/// Format a zero-saturation (gray) color.
pub fn gray(lightness: f64) -> String {
    hsl(0, 0, lightness)
}

/// Theme-specific values, resolved from the darkness level.
#[derive(Debug, Clone, PartialEq)]
pub enum ThemeOverlay {
    /// `gray-dark`: base rules only.
    None,
    /// `true-dark`: fixed black/light-gray body.
    TrueDark,
    BlueDark { background: f64, foreground: f64 },
    Sepia { background: f64, foreground: f64 },
}

impl ThemeOverlay {
    fn resolve(theme: ThemeStyle, darkness: f64) -> Self {
        match theme {
            ThemeStyle::GrayDark => ThemeOverlay::None,
            ThemeStyle::TrueDark => ThemeOverlay::TrueDark,
            ThemeStyle::BlueDark => ThemeOverlay::BlueDark {
                background: clamp_to(darkness / 10.0, BLUE_DARK_BACKGROUND_RANGE),
                foreground: clamp_to(
                    BLUE_DARK_FOREGROUND_BASE + darkness / 3.0,
                    BLUE_DARK_FOREGROUND_RANGE,
                ),
            },
            ThemeStyle::Sepia => ThemeOverlay::Sepia {
                background: clamp_to(darkness / 4.0, SEPIA_BACKGROUND_RANGE),
                foreground: clamp_to(darkness / 2.5, SEPIA_FOREGROUND_RANGE),
            },
        }
    }
}

/// Resolved style values for one settings record.
///
/// Constructed via `DarkStylesheet::from_settings(&settings)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DarkStylesheet {
    pub darkness: u32,
    pub contrast: u32,
    pub invert_images: bool,
    pub preserve_colors: bool,

    // Lightness values (percent)
    pub body_background: f64,
    pub body_foreground: f64,
    pub input_background: f64,
    pub input_border: f64,
    pub button_background: f64,
    pub button_border: f64,
    pub scrollbar_track: f64,
    /// Same formula and range as `button_border`.
    pub scrollbar_thumb: f64,

    pub overlay: ThemeOverlay,
}

impl DarkStylesheet {
    /// Resolve all derived values from a settings record.
    pub fn from_settings(settings: &SettingsRecord) -> Self {
        let d = f64::from(settings.darkness_level);

        Self {
            darkness: settings.darkness_level,
            contrast: settings.contrast,
            invert_images: settings.invert_images,
            preserve_colors: settings.preserve_colors,
            body_background: clamp_to(d / 5.0, BODY_BACKGROUND_RANGE),
            body_foreground: clamp_to(BODY_FOREGROUND_BASE + d / 2.0, BODY_FOREGROUND_RANGE),
            input_background: clamp_to(d / 3.0, INPUT_BACKGROUND_RANGE),
            input_border: clamp_to(d / 2.0, INPUT_BORDER_RANGE),
            button_background: clamp_to(d / 2.5, BUTTON_BACKGROUND_RANGE),
            button_border: clamp_to(d / 1.7, BUTTON_BORDER_RANGE),
            scrollbar_track: clamp_to(d / 4.0, SCROLLBAR_TRACK_RANGE),
            scrollbar_thumb: clamp_to(d / 1.7, SCROLLBAR_THUMB_RANGE),
            overlay: ThemeOverlay::resolve(settings.theme_style, d),
        }
    }

    /// Render the complete style sheet.
    pub fn css(&self) -> String {
        let mut css = self.base_block();
        if self.invert_images {
            css.push_str(&self.media_block());
        }
        css.push_str(&self.theme_block());
        if self.preserve_colors {
            css.push_str(&preserve_block());
        }
        css
    }

    /// Base rules shared by every theme.
    pub fn base_block(&self) -> String {
        format!(
            r#"
/* ===== Base ===== */
html {{
    filter: contrast({contrast}%) !important;
}}

body {{
    background-color: {body_bg} !important;
    color: {body_fg} !important;
}}

/* ===== Containers ===== */
{containers} {{
    background-color: inherit !important;
}}

/* ===== Text ===== */
{text} {{
    color: inherit !important;
}}

/* ===== Links ===== */
{links} {{
    color: {link} !important;
}}

{links_active} {{
    color: {link_active} !important;
}}

/* ===== Inputs ===== */
{inputs} {{
    background-color: {input_bg} !important;
    border-color: {input_border} !important;
}}

/* ===== Buttons ===== */
{buttons} {{
    background-color: {button_bg} !important;
    border-color: {button_border} !important;
}}

/* ===== Scrollbars ===== */
::-webkit-scrollbar-track {{
    background: {track} !important;
}}

::-webkit-scrollbar-thumb {{
    background: {thumb} !important;
}}
"#,
            contrast = self.contrast,
            body_bg = gray(self.body_background),
            body_fg = gray(self.body_foreground),
            containers = CONTAINER_SELECTORS,
            text = TEXT_SELECTORS,
            links = LINK_SELECTORS,
            link = hsl(LINK_HUE, 100, f64::from(LINK_LIGHTNESS)),
            links_active = LINK_ACTIVE_SELECTORS,
            link_active = hsl(LINK_HUE, 100, f64::from(LINK_ACTIVE_LIGHTNESS)),
            inputs = INPUT_SELECTORS,
            input_bg = gray(self.input_background),
            input_border = gray(self.input_border),
            buttons = BUTTON_SELECTORS,
            button_bg = gray(self.button_background),
            button_border = gray(self.button_border),
            track = gray(self.scrollbar_track),
            thumb = gray(self.scrollbar_thumb),
        )
    }

    /// Media inversion rule.
    fn media_block(&self) -> String {
        format!(
            r#"
/* ===== Media ===== */
{media} {{
    filter: invert({darkness}%) hue-rotate(180deg) contrast({contrast}%) !important;
}}
"#,
            media = MEDIA_SELECTORS,
            darkness = self.darkness,
            contrast = self.contrast,
        )
    }

    /// Theme overlay rules. Empty for `gray-dark`.
    pub fn theme_block(&self) -> String {
        match &self.overlay {
            ThemeOverlay::None => String::new(),
            ThemeOverlay::TrueDark => format!(
                r#"
/* ===== Theme: true-dark ===== */
body {{
    background-color: {TRUE_DARK_BACKGROUND} !important;
    color: {TRUE_DARK_FOREGROUND} !important;
}}
"#
            ),
            ThemeOverlay::BlueDark {
                background,
                foreground,
            } => format!(
                r#"
/* ===== Theme: blue-dark ===== */
body {{
    background-color: {bg} !important;
    color: {fg} !important;
}}

{links} {{
    color: {link} !important;
}}
"#,
                bg = hsl(BLUE_DARK_HUE, BLUE_DARK_BACKGROUND_SATURATION, *background),
                fg = hsl(BLUE_DARK_HUE, BLUE_DARK_FOREGROUND_SATURATION, *foreground),
                links = LINK_SELECTORS,
                link = hsl(
                    BLUE_DARK_LINK_HUE,
                    100,
                    f64::from(BLUE_DARK_LINK_LIGHTNESS)
                ),
            ),
            ThemeOverlay::Sepia {
                background,
                foreground,
            } => format!(
                r#"
/* ===== Theme: sepia ===== */
html {{
    filter: sepia(100%) contrast({contrast}%) !important;
}}

body {{
    background-color: {bg} !important;
    color: {fg} !important;
}}
"#,
                contrast = self.contrast,
                bg = hsl(SEPIA_HUE, SEPIA_BACKGROUND_SATURATION, *background),
                fg = hsl(SEPIA_HUE, SEPIA_FOREGROUND_SATURATION, *foreground),
            ),
        }
    }
}

/// Rule that opts brand/logo/inline-colored elements out of filters.
fn preserve_block() -> String {
    format!(
        r#"
/* ===== Preserved colors ===== */
{PRESERVE_SELECTORS} {{
    filter: none !important;
}}
"#
    )
}

/// Generate the dark mode style sheet for a settings record.
pub fn generate(settings: &SettingsRecord) -> String {
    DarkStylesheet::from_settings(settings).css()
}
