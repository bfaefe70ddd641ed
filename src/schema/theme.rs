use serde::{Deserialize, Serialize};

/// A story genre. Each theme selects a fixed opening sentence that seeds
/// the text-generation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Fantasy,
    Scifi,
    Mystery,
    Romance,
    Adventure,
    Horror,
    Historical,
}

impl Theme {
    /// Every theme, in table order.
    pub const ALL: [Theme; 7] = [
        Self::Fantasy,
        Self::Scifi,
        Self::Mystery,
        Self::Romance,
        Self::Adventure,
        Self::Horror,
        Self::Historical,
    ];

    /// The theme used when a lookup misses.
    pub const FALLBACK: Theme = Self::Fantasy;

    /// Returns the table key for this theme (e.g., "scifi").
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fantasy => "fantasy",
            Self::Scifi => "scifi",
            Self::Mystery => "mystery",
            Self::Romance => "romance",
            Self::Adventure => "adventure",
            Self::Horror => "horror",
            Self::Historical => "historical",
        }
    }

    /// The opening sentence handed to the model as its prompt.
    pub fn opening(&self) -> &'static str {
        match self {
            Self::Fantasy => {
                "In the magical kingdom of Eldoria, where dragons soared through rainbow skies,"
            }
            Self::Scifi => "The colony on Mars received a mysterious signal from deep space that",
            Self::Mystery => {
                "Detective Sarah Morgan found a cryptic note at the crime scene that read,"
            }
            Self::Romance => {
                "When Emma bumped into the stranger at the bookstore, she had no idea he would"
            }
            Self::Adventure => {
                "The ancient map revealed the location of a treasure that had been lost for centuries,"
            }
            Self::Horror => {
                "The old house at the end of the street had been abandoned for years, until one night"
            }
            Self::Historical => {
                "In the midst of the revolution, Marie discovered a secret document that could change history:"
            }
        }
    }

    /// Short genre blurb, shown by `story --list-themes`.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Fantasy => "magical world with dragons, wizards, and mystical creatures",
            Self::Scifi => "futuristic setting with advanced technology, space travel, or aliens",
            Self::Mystery => "suspenseful story involving a puzzle, crime, or unexplained phenomenon",
            Self::Romance => "emotional journey focused on relationships and love",
            Self::Adventure => "exciting journey or quest with challenges and discoveries",
            Self::Horror => "frightening or unsettling story designed to evoke fear",
            Self::Historical => "story set in a specific historical period with accurate details",
        }
    }

    /// Exact lookup by lowercase table key.
    pub fn from_name(name: &str) -> Option<Theme> {
        Self::ALL.into_iter().find(|theme| theme.name() == name)
    }

    /// Resolve a user-supplied theme: lowercased, then looked up, falling
    /// back to fantasy for anything not in the table.
    pub fn resolve(input: &str) -> Theme {
        Self::from_name(&input.to_lowercase()).unwrap_or(Self::FALLBACK)
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the theme table, as listed by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct ThemeInfo {
    pub name: &'static str,
    pub opening: &'static str,
    pub description: &'static str,
}

impl From<Theme> for ThemeInfo {
    fn from(theme: Theme) -> Self {
        Self {
            name: theme.name(),
            opening: theme.opening(),
            description: theme.description(),
        }
    }
}
