use nxui_core::DEFAULT_THEME;
use serde::Serialize;

/// A named set of CSS custom properties shared by every surface.
#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub id: &'static str,
    pub name: &'static str,
    pub colors: &'static [(&'static str, &'static str)],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThemeInfo {
    pub id: String,
    pub name: String,
    pub active: bool,
}

const THEMES: &[Theme] = &[
    Theme {
        id: "miku-garden",
        name: "Miku Garden",
        colors: &[
            ("--nxui-bg", "rgba(30, 42, 37, 0.88)"),
            ("--nxui-bg-solid", "#1e2a25"),
            ("--nxui-surface", "rgba(55, 75, 65, 0.75)"),
            ("--nxui-border", "rgba(102, 194, 165, 0.25)"),
            ("--nxui-accent", "#66c2a5"),
            ("--nxui-accent-glow", "rgba(102, 194, 165, 0.3)"),
            ("--nxui-text", "rgba(245, 250, 245, 0.95)"),
            ("--nxui-text-secondary", "rgba(210, 230, 220, 0.7)"),
            ("--nxui-text-muted", "rgba(210, 230, 220, 0.45)"),
            ("--nxui-success", "#81b29a"),
            ("--nxui-danger", "#e07a5f"),
            (
                "--nxui-gradient",
                "linear-gradient(135deg, rgba(30, 42, 37, 0.9), rgba(55, 75, 65, 0.85))",
            ),
        ],
    },
    Theme {
        id: "midnight",
        name: "Midnight",
        colors: &[
            ("--nxui-bg", "rgba(13, 15, 20, 0.88)"),
            ("--nxui-bg-solid", "#0d0f14"),
            ("--nxui-surface", "rgba(26, 30, 40, 0.75)"),
            ("--nxui-border", "rgba(0, 212, 255, 0.12)"),
            ("--nxui-accent", "#00d4ff"),
            ("--nxui-accent-glow", "rgba(0, 212, 255, 0.25)"),
            ("--nxui-text", "rgba(255, 255, 255, 0.95)"),
            ("--nxui-text-secondary", "rgba(255, 255, 255, 0.55)"),
            ("--nxui-text-muted", "rgba(255, 255, 255, 0.35)"),
            ("--nxui-success", "#00e676"),
            ("--nxui-danger", "#ff5252"),
            (
                "--nxui-gradient",
                "linear-gradient(135deg, rgba(13, 15, 20, 0.88), rgba(20, 24, 35, 0.8))",
            ),
        ],
    },
    Theme {
        id: "arctic",
        name: "Arctic",
        colors: &[
            ("--nxui-bg", "rgba(240, 245, 255, 0.88)"),
            ("--nxui-bg-solid", "#f0f5ff"),
            ("--nxui-surface", "rgba(255, 255, 255, 0.8)"),
            ("--nxui-border", "rgba(0, 100, 200, 0.12)"),
            ("--nxui-accent", "#0066cc"),
            ("--nxui-accent-glow", "rgba(0, 102, 204, 0.2)"),
            ("--nxui-text", "rgba(10, 20, 40, 0.92)"),
            ("--nxui-text-secondary", "rgba(10, 20, 40, 0.55)"),
            ("--nxui-text-muted", "rgba(10, 20, 40, 0.35)"),
            ("--nxui-success", "#00a86b"),
            ("--nxui-danger", "#d32f2f"),
            (
                "--nxui-gradient",
                "linear-gradient(135deg, rgba(240, 245, 255, 0.9), rgba(220, 230, 250, 0.85))",
            ),
        ],
    },
    Theme {
        id: "cyberpunk",
        name: "Cyberpunk",
        colors: &[
            ("--nxui-bg", "rgba(15, 5, 25, 0.9)"),
            ("--nxui-bg-solid", "#0f0519"),
            ("--nxui-surface", "rgba(30, 10, 50, 0.75)"),
            ("--nxui-border", "rgba(255, 0, 128, 0.15)"),
            ("--nxui-accent", "#ff0080"),
            ("--nxui-accent-glow", "rgba(255, 0, 128, 0.3)"),
            ("--nxui-text", "rgba(255, 255, 255, 0.95)"),
            ("--nxui-text-secondary", "rgba(255, 255, 255, 0.55)"),
            ("--nxui-text-muted", "rgba(255, 255, 255, 0.35)"),
            ("--nxui-success", "#39ff14"),
            ("--nxui-danger", "#ff073a"),
            (
                "--nxui-gradient",
                "linear-gradient(135deg, rgba(15, 5, 25, 0.9), rgba(30, 10, 50, 0.85))",
            ),
        ],
    },
    Theme {
        id: "emerald",
        name: "Emerald",
        colors: &[
            ("--nxui-bg", "rgba(5, 15, 12, 0.9)"),
            ("--nxui-bg-solid", "#050f0c"),
            ("--nxui-surface", "rgba(10, 30, 25, 0.75)"),
            ("--nxui-border", "rgba(0, 200, 150, 0.12)"),
            ("--nxui-accent", "#00c896"),
            ("--nxui-accent-glow", "rgba(0, 200, 150, 0.25)"),
            ("--nxui-text", "rgba(255, 255, 255, 0.95)"),
            ("--nxui-text-secondary", "rgba(255, 255, 255, 0.55)"),
            ("--nxui-text-muted", "rgba(255, 255, 255, 0.35)"),
            ("--nxui-success", "#00e676"),
            ("--nxui-danger", "#ff5252"),
            (
                "--nxui-gradient",
                "linear-gradient(135deg, rgba(5, 15, 12, 0.9), rgba(10, 30, 25, 0.85))",
            ),
        ],
    },
];

pub fn find_theme(id: &str) -> Option<&'static Theme> {
    THEMES.iter().find(|theme| theme.id == id)
}

/// Theme for `id`, falling back to the default for unknown ids.
pub fn theme_or_default(id: &str) -> &'static Theme {
    find_theme(id)
        .or_else(|| find_theme(DEFAULT_THEME))
        .unwrap_or(&THEMES[0])
}

pub fn list_themes(active: &str) -> Vec<ThemeInfo> {
    THEMES
        .iter()
        .map(|theme| ThemeInfo {
            id: theme.id.to_string(),
            name: theme.name.to_string(),
            active: theme.id == active,
        })
        .collect()
}

impl Theme {
    /// Stylesheet declaring the theme's variables on `:root`.
    pub fn css(&self) -> String {
        let mut css = String::from(":root {\n");
        for (key, value) in self.colors {
            css.push_str(&format!("  {key}: {value};\n"));
        }
        css.push('}');
        css
    }
}
