use indexmap::IndexMap;

/// Translation catalogs bundled with the engine, keyed by language code.
pub fn builtin_catalogs() -> IndexMap<&'static str, &'static str> {
    IndexMap::from([
        ("fr", include_str!("../content/i18n/fr.json")),
        ("en", include_str!("../content/i18n/en.json")),
    ])
}

/// Display name and flag country for the languages we know by name.
pub fn language_label(code: &str) -> Option<(&'static str, &'static str)> {
    Some(match code {
        "fr" => ("Français", "fr"),
        "en" => ("English", "gb"),
        "de" => ("Deutsch", "de"),
        "es" => ("Español", "es"),
        "it" => ("Italiano", "it"),
        "pt" => ("Português", "pt"),
        "ru" => ("Русский", "ru"),
        "ja" => ("日本語", "jp"),
        "zh" => ("中文", "cn"),
        "ko" => ("한국어", "kr"),
        _ => return None,
    })
}
