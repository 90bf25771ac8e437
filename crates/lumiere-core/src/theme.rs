//! Theme and accent preferences.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemePref {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemePref {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemePref::Light => "light",
            ThemePref::Dark => "dark",
            ThemePref::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Some(ThemePref::Light),
            "dark" => Some(ThemePref::Dark),
            "system" => Some(ThemePref::System),
            _ => None,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            ThemePref::Light => ThemePref::Dark,
            ThemePref::Dark => ThemePref::System,
            ThemePref::System => ThemePref::Light,
        }
    }
}

pub const DARK_CLASS: &str = "theme-dark";
pub const LIGHT_CLASS: &str = "theme-light";

/// The stored preference plus the last appearance signal from the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThemeState {
    pref: ThemePref,
    system_dark: bool,
}

impl ThemeState {
    /// Restore from the stored value; missing or unknown values mean `system`.
    pub fn restore(stored: Option<&str>, system_dark: bool) -> Self {
        Self {
            pref: stored.and_then(ThemePref::from_str).unwrap_or_default(),
            system_dark,
        }
    }

    pub fn pref(&self) -> ThemePref {
        self.pref
    }

    pub fn set_pref(&mut self, pref: ThemePref) {
        self.pref = pref;
    }

    /// Record a system appearance change. Returns whether the applied class
    /// changed; an explicit light/dark preference is never overridden.
    pub fn on_system_change(&mut self, prefers_dark: bool) -> bool {
        let before = self.class();
        self.system_dark = prefers_dark;
        before != self.class()
    }

    pub fn is_dark(&self) -> bool {
        match self.pref {
            ThemePref::Dark => true,
            ThemePref::Light => false,
            ThemePref::System => self.system_dark,
        }
    }

    pub fn class(&self) -> &'static str {
        if self.is_dark() {
            DARK_CLASS
        } else {
            LIGHT_CLASS
        }
    }
}

/// Best guess at the terminal's appearance from `COLORFGBG` ("fg;bg").
/// Terminals that don't set it are assumed dark.
pub fn detect_system_dark() -> bool {
    std::env::var("COLORFGBG")
        .ok()
        .and_then(|v| v.rsplit(';').next().and_then(|bg| bg.parse::<u8>().ok()))
        .map(|bg| bg < 7 || bg == 8)
        .unwrap_or(true)
}

/// Normalize an accent colour to lowercase `#rrggbb`; `None` if it isn't one.
pub fn normalize_accent(input: &str) -> Option<String> {
    let hex = input.trim().strip_prefix('#')?;
    let expanded = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
        6 => hex.to_string(),
        _ => return None,
    };
    if expanded.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(format!("#{}", expanded.to_lowercase()))
    } else {
        None
    }
}

/// Split `#rrggbb` into channels.
pub fn accent_rgb(accent: &str) -> Option<(u8, u8, u8)> {
    let hex = normalize_accent(accent)?;
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(1)?, channel(3)?, channel(5)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_dark_ignores_system_changes() {
        let mut theme = ThemeState::restore(Some("dark"), false);
        assert_eq!(theme.class(), "theme-dark");
        assert!(!theme.on_system_change(false));
        assert!(!theme.on_system_change(true));
        assert_eq!(theme.class(), "theme-dark");
    }

    #[test]
    fn test_system_follows_appearance() {
        let mut theme = ThemeState::restore(None, false);
        assert_eq!(theme.pref(), ThemePref::System);
        assert_eq!(theme.class(), "theme-light");
        assert!(theme.on_system_change(true));
        assert_eq!(theme.class(), "theme-dark");
    }

    #[test]
    fn test_user_change_takes_effect() {
        let mut theme = ThemeState::restore(Some("dark"), true);
        theme.set_pref(ThemePref::Light);
        assert_eq!(theme.class(), "theme-light");
        theme.set_pref(ThemePref::System);
        assert_eq!(theme.class(), "theme-dark");
    }

    #[test]
    fn test_unknown_stored_value_is_system() {
        assert_eq!(ThemeState::restore(Some("sepia"), false).pref(), ThemePref::System);
    }

    #[test]
    fn test_accent_normalization() {
        assert_eq!(normalize_accent("#3B82F6").as_deref(), Some("#3b82f6"));
        assert_eq!(normalize_accent("#abc").as_deref(), Some("#aabbcc"));
        assert_eq!(normalize_accent("3b82f6"), None);
        assert_eq!(normalize_accent("#zzzzzz"), None);
        assert_eq!(accent_rgb("#ff8000"), Some((255, 128, 0)));
    }
}
