//! Settings record, per-page state, and page identity.
//!
//! `SettingsRecord` is read from several places (extension storage, popup
//! messages, per-page snapshots, command-line input). All of them go through
//! [`SettingsRecord::from_value`], so a missing or malformed field always
//! resolves to the same default no matter where the record came from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::Location;

/// Default darkness level (percent).
pub const DEFAULT_DARKNESS: u32 = 50;

/// Default contrast (percent).
pub const DEFAULT_CONTRAST: u32 = 100;

/// Upper bound for the darkness level.
pub const MAX_DARKNESS: u32 = 100;

/// Theme overlay applied on top of the base dark rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThemeStyle {
    /// Plain grayscale; no overlay beyond the base rules.
    #[default]
    GrayDark,
    /// Pure black background with fixed light-gray text.
    TrueDark,
    /// Blue-tinted background, text and links.
    BlueDark,
    /// Sepia filter with warm background and text.
    Sepia,
}

impl ThemeStyle {
    /// Every theme, in popup order.
    pub const ALL: [ThemeStyle; 4] = [
        ThemeStyle::GrayDark,
        ThemeStyle::TrueDark,
        ThemeStyle::BlueDark,
        ThemeStyle::Sepia,
    ];

    /// Wire name (`gray-dark`, `true-dark`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeStyle::GrayDark => "gray-dark",
            ThemeStyle::TrueDark => "true-dark",
            ThemeStyle::BlueDark => "blue-dark",
            ThemeStyle::Sepia => "sepia",
        }
    }
}

impl fmt::Display for ThemeStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown theme name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTheme(pub String);

impl fmt::Display for UnknownTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = ThemeStyle::ALL.iter().map(|t| t.as_str()).collect();
        write!(
            f,
            "unknown theme '{}', expected one of: {}",
            self.0,
            names.join(", ")
        )
    }
}

impl std::error::Error for UnknownTheme {}

impl FromStr for ThemeStyle {
    type Err = UnknownTheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ThemeStyle::ALL
            .into_iter()
            .find(|theme| theme.as_str() == s.trim())
            .ok_or_else(|| UnknownTheme(s.to_string()))
    }
}

/// Global configuration for the style generator.
///
/// Serializes with the camelCase field names used in storage and messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct SettingsRecord {
    /// Darkness level, 0-100. Drives every derived lightness.
    pub darkness_level: u32,
    /// Contrast percentage for the page-level filter.
    pub contrast: u32,
    pub theme_style: ThemeStyle,
    /// Invert media elements (images, video, canvas, svg).
    pub invert_images: bool,
    /// Clear filters on brand/logo/inline-colored elements.
    pub preserve_colors: bool,
    /// Capture time in milliseconds since the Unix epoch. Informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        Self {
            darkness_level: DEFAULT_DARKNESS,
            contrast: DEFAULT_CONTRAST,
            theme_style: ThemeStyle::GrayDark,
            invert_images: true,
            preserve_colors: false,
            timestamp: None,
        }
    }
}

impl SettingsRecord {
    /// Resolve a settings record from an arbitrary JSON value.
    ///
    /// Never fails: a non-object value yields the defaults, and each missing,
    /// null or wrongly-typed field falls back to its own default. Integers
    /// may arrive as numbers or numeric strings; fractions are truncated.
    /// Darkness clamps to 0-100 and contrast to non-negative values.
    pub fn from_value(value: &Value) -> Self {
        let defaults = Self::default();
        let Some(obj) = value.as_object() else {
            return defaults;
        };

        // An explicit 0 is a real value here, not a missing field.
        let darkness_level = obj
            .get("darknessLevel")
            .and_then(integer_field)
            .and_then(|v| u32::try_from(v.clamp(0, i64::from(MAX_DARKNESS))).ok())
            .unwrap_or(defaults.darkness_level);

        let contrast = obj
            .get("contrast")
            .and_then(integer_field)
            .map(|v| u32::try_from(v.max(0)).unwrap_or(u32::MAX))
            .unwrap_or(defaults.contrast);

        let theme_style = obj
            .get("themeStyle")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.theme_style);

        let invert_images = obj
            .get("invertImages")
            .and_then(Value::as_bool)
            .unwrap_or(defaults.invert_images);

        let preserve_colors = obj
            .get("preserveColors")
            .and_then(Value::as_bool)
            .unwrap_or(defaults.preserve_colors);

        let timestamp = obj.get("timestamp").and_then(integer_field);

        Self {
            darkness_level,
            contrast,
            theme_style,
            invert_images,
            preserve_colors,
            timestamp,
        }
    }

    /// Copy of this record stamped with the current time.
    pub fn stamped(&self) -> Self {
        Self {
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
            ..self.clone()
        }
    }

    /// Serialize to a JSON value (infallible for this type).
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("darknessLevel".into(), self.darkness_level.into());
        obj.insert("contrast".into(), self.contrast.into());
        obj.insert("themeStyle".into(), self.theme_style.as_str().into());
        obj.insert("invertImages".into(), self.invert_images.into());
        obj.insert("preserveColors".into(), self.preserve_colors.into());
        if let Some(ts) = self.timestamp {
            obj.insert("timestamp".into(), ts.into());
        }
        Value::Object(obj)
    }
}

impl From<Value> for SettingsRecord {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

/// Read an integer from a number or numeric string, truncating fractions.
fn integer_field(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                // saturating float-to-int cast
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i64)
            })
        }
        _ => None,
    }
}

/// Identity of a page used as the per-page state key: `"<hostname>-<pathname>"`.
///
/// Hosts or paths containing `-` can collide. The format is kept so that
/// existing stored state keeps matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    pub fn new(hostname: &str, pathname: &str) -> Self {
        Self(format!("{hostname}-{pathname}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&Location> for PageId {
    fn from(location: &Location) -> Self {
        Self::new(location.hostname(), location.pathname())
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last-known dark mode state of one page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageState {
    pub enabled: bool,
    /// Settings last applied on the page; may differ from the global settings.
    pub settings: Option<SettingsRecord>,
    /// Full URL at the time of saving. Informational.
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = SettingsRecord::default();
        assert_eq!(settings.darkness_level, 50);
        assert_eq!(settings.contrast, 100);
        assert_eq!(settings.theme_style, ThemeStyle::GrayDark);
        assert!(settings.invert_images);
        assert!(!settings.preserve_colors);
        assert_eq!(settings.timestamp, None);
    }

    #[test]
    fn test_from_empty_object_is_default() {
        assert_eq!(
            SettingsRecord::from_value(&json!({})),
            SettingsRecord::default()
        );
    }

    #[test]
    fn test_from_non_object_is_default() {
        assert_eq!(
            SettingsRecord::from_value(&Value::Null),
            SettingsRecord::default()
        );
        assert_eq!(
            SettingsRecord::from_value(&json!("dark")),
            SettingsRecord::default()
        );
        assert_eq!(
            SettingsRecord::from_value(&json!([1, 2, 3])),
            SettingsRecord::default()
        );
    }

    #[test]
    fn test_from_full_object() {
        let settings = SettingsRecord::from_value(&json!({
            "darknessLevel": 80,
            "contrast": 120,
            "themeStyle": "blue-dark",
            "invertImages": false,
            "preserveColors": true,
            "timestamp": 1_700_000_000_000_i64,
        }));

        assert_eq!(settings.darkness_level, 80);
        assert_eq!(settings.contrast, 120);
        assert_eq!(settings.theme_style, ThemeStyle::BlueDark);
        assert!(!settings.invert_images);
        assert!(settings.preserve_colors);
        assert_eq!(settings.timestamp, Some(1_700_000_000_000));
    }

    #[test]
    fn test_malformed_fields_fall_back_per_field() {
        let settings = SettingsRecord::from_value(&json!({
            "darknessLevel": "lots",
            "contrast": 90,
            "themeStyle": "neon",
            "invertImages": "yes",
            "preserveColors": null,
        }));

        assert_eq!(settings.darkness_level, DEFAULT_DARKNESS);
        assert_eq!(settings.contrast, 90);
        assert_eq!(settings.theme_style, ThemeStyle::GrayDark);
        assert!(settings.invert_images);
        assert!(!settings.preserve_colors);
    }

    #[test]
    fn test_numeric_strings_and_fractions() {
        let settings = SettingsRecord::from_value(&json!({
            "darknessLevel": "75",
            "contrast": 110.9,
        }));
        assert_eq!(settings.darkness_level, 75);
        assert_eq!(settings.contrast, 110);
    }

    #[test]
    fn test_out_of_range_values_clamp() {
        let settings = SettingsRecord::from_value(&json!({
            "darknessLevel": 250,
            "contrast": -20,
        }));
        assert_eq!(settings.darkness_level, 100);
        assert_eq!(settings.contrast, 0);

        let settings = SettingsRecord::from_value(&json!({ "darknessLevel": -5 }));
        assert_eq!(settings.darkness_level, 0);
    }

    #[test]
    fn test_explicit_zero_is_kept() {
        let settings = SettingsRecord::from_value(&json!({
            "darknessLevel": 0,
            "contrast": 0,
        }));
        assert_eq!(settings.darkness_level, 0);
        assert_eq!(settings.contrast, 0);
    }

    #[test]
    fn test_deserialize_goes_through_defaulting() {
        let settings: SettingsRecord =
            serde_json::from_str(r#"{"themeStyle":"sepia","contrast":"abc"}"#).unwrap();
        assert_eq!(settings.theme_style, ThemeStyle::Sepia);
        assert_eq!(settings.contrast, DEFAULT_CONTRAST);
        assert_eq!(settings.darkness_level, DEFAULT_DARKNESS);
    }

    #[test]
    fn test_serialize_uses_wire_names() {
        let value = serde_json::to_value(SettingsRecord::default()).unwrap();
        assert_eq!(
            value,
            json!({
                "darknessLevel": 50,
                "contrast": 100,
                "themeStyle": "gray-dark",
                "invertImages": true,
                "preserveColors": false,
            })
        );
        assert_eq!(SettingsRecord::default().to_value(), value);
    }

    #[test]
    fn test_stamped_sets_timestamp() {
        let stamped = SettingsRecord::default().stamped();
        assert!(stamped.timestamp.is_some_and(|ts| ts > 0));
        assert_eq!(stamped.darkness_level, DEFAULT_DARKNESS);
    }

    #[test]
    fn test_theme_parse_and_display() {
        for theme in ThemeStyle::ALL {
            assert_eq!(theme.to_string().parse::<ThemeStyle>(), Ok(theme));
        }
        assert!("purple".parse::<ThemeStyle>().is_err());
        let err = "purple".parse::<ThemeStyle>().unwrap_err();
        assert!(err.to_string().contains("gray-dark"));
    }

    #[test]
    fn test_page_id_format() {
        let id = PageId::new("example.com", "/docs/intro");
        assert_eq!(id.as_str(), "example.com-/docs/intro");
    }

    #[test]
    fn test_page_state_lenient_deserialize() {
        let state: PageState = serde_json::from_value(json!({ "enabled": true })).unwrap();
        assert!(state.enabled);
        assert_eq!(state.settings, None);
        assert_eq!(state.url, "");

        let state: PageState = serde_json::from_value(json!({
            "enabled": true,
            "settings": { "darknessLevel": 30 },
            "url": "https://example.com/",
        }))
        .unwrap();
        assert_eq!(state.settings.map(|s| s.darkness_level), Some(30));
    }

    #[test]
    fn test_page_state_null_settings() {
        let state: PageState =
            serde_json::from_value(json!({ "enabled": false, "settings": null, "url": "" }))
                .unwrap();
        assert_eq!(state.settings, None);
    }
}
