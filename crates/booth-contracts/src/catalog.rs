use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One preset garment or accessory inside a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardrobeItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub prompt: String,
}

impl WardrobeItem {
    /// The descriptor used in the composed prompt; falls back to the display
    /// name when no dedicated prompt text was supplied.
    pub fn descriptor(&self) -> &str {
        if self.prompt.is_empty() {
            &self.name
        } else {
            &self.prompt
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardrobeCategory {
    pub id: String,
    pub label: String,
    pub emoji: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<WardrobeItem>,
}

impl WardrobeCategory {
    pub fn item(&self, id_or_name: &str) -> Option<&WardrobeItem> {
        self.items
            .iter()
            .find(|item| item.id == id_or_name || item.name.eq_ignore_ascii_case(id_or_name))
    }
}

/// Reference data defining the universe of categories and their presets.
///
/// Read-only after load. The externally supplied JSON shape and the built-in
/// fallback produce the same structure, so the selection store and prompt
/// composer behave identically against either.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardrobeCatalog {
    pub categories: Vec<WardrobeCategory>,
}

impl WardrobeCatalog {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("wardrobe catalog JSON did not match expected shape")
    }

    /// Parses external catalog JSON, substituting the built-in catalog on any
    /// failure.
    pub fn from_json_or_builtin(raw: &str) -> Self {
        Self::from_json(raw).unwrap_or_else(|_| Self::builtin())
    }

    pub fn get(&self, category_id: &str) -> Option<&WardrobeCategory> {
        self.categories
            .iter()
            .find(|category| category.id == category_id)
    }

    pub fn label_for(&self, category_id: &str) -> Option<&str> {
        self.get(category_id).map(|category| category.label.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = (&str, &str)> {
        self.categories
            .iter()
            .map(|category| (category.id.as_str(), category.label.as_str()))
    }

    /// The fixed fallback catalog used when the external source is
    /// unreachable or malformed.
    pub fn builtin() -> Self {
        let category = |id: &str, label: &str, emoji: &str, presets: &[(&str, &str)]| {
            WardrobeCategory {
                id: id.to_string(),
                label: label.to_string(),
                emoji: emoji.to_string(),
                description: None,
                items: presets
                    .iter()
                    .map(|(name, prompt)| WardrobeItem {
                        id: slugify(name),
                        name: (*name).to_string(),
                        image: String::new(),
                        prompt: (*prompt).to_string(),
                    })
                    .collect(),
            }
        };

        Self {
            categories: vec![
                category(
                    "lower-body",
                    "Lower Body",
                    "👖",
                    &[
                        ("Blue Jeans", "classic blue denim jeans"),
                        ("Black Pants", "black dress pants"),
                        ("Khaki Chinos", "khaki chino pants"),
                        ("Denim Skirt", "blue denim mini skirt"),
                        ("Leather Pants", "black leather pants"),
                        ("Joggers", "grey athletic joggers"),
                    ],
                ),
                category(
                    "upper-body",
                    "Upper Body",
                    "👕",
                    &[
                        ("White T-Shirt", "plain white cotton t-shirt"),
                        ("Black Tee", "black fitted t-shirt"),
                        ("Button Shirt", "white button-up dress shirt"),
                        ("Hoodie", "grey pullover hoodie"),
                        ("Tank Top", "black athletic tank top"),
                        ("Polo Shirt", "navy blue polo shirt"),
                    ],
                ),
                category(
                    "outerwear",
                    "Outerwear",
                    "🧥",
                    &[
                        ("Denim Jacket", "blue denim jacket"),
                        ("Leather Jacket", "black leather biker jacket"),
                        ("Blazer", "navy blue blazer"),
                        ("Bomber Jacket", "olive green bomber jacket"),
                        ("Hoodie Zip", "grey zip-up hoodie"),
                        ("Trench Coat", "beige trench coat"),
                    ],
                ),
                category(
                    "footwear",
                    "Footwear",
                    "👟",
                    &[
                        ("White Sneakers", "white canvas sneakers"),
                        ("Black Boots", "black leather boots"),
                        ("Running Shoes", "athletic running shoes"),
                        ("Dress Shoes", "black oxford dress shoes"),
                        ("Sandals", "brown leather sandals"),
                        ("High Heels", "black stiletto heels"),
                    ],
                ),
                category(
                    "glasses",
                    "Eyewear",
                    "👓",
                    &[
                        ("Sunglasses", "black aviator sunglasses"),
                        ("Clear Glasses", "clear frame eyeglasses"),
                        ("Cat Eye", "cat-eye frame glasses"),
                        ("Round Frames", "round wire-frame glasses"),
                        ("Sport Glasses", "athletic sport sunglasses"),
                    ],
                ),
                category(
                    "headwear",
                    "Headwear",
                    "🧢",
                    &[
                        ("Baseball Cap", "black baseball cap"),
                        ("Beanie", "grey knit beanie"),
                        ("Fedora", "brown fedora hat"),
                        ("Bucket Hat", "khaki bucket hat"),
                        ("Snapback", "streetwear snapback cap"),
                    ],
                ),
                category(
                    "accessories",
                    "Accessories",
                    "💎",
                    &[
                        ("Watch", "silver wristwatch"),
                        ("Necklace", "gold chain necklace"),
                        ("Bracelet", "leather bracelet"),
                        ("Earrings", "silver hoop earrings"),
                        ("Ring", "gold ring"),
                        ("Scarf", "patterned silk scarf"),
                    ],
                ),
                category(
                    "bags",
                    "Bags",
                    "👜",
                    &[
                        ("Backpack", "black leather backpack"),
                        ("Tote Bag", "canvas tote bag"),
                        ("Messenger Bag", "brown messenger bag"),
                        ("Handbag", "designer handbag"),
                        ("Clutch", "evening clutch bag"),
                    ],
                ),
                category(
                    "background",
                    "Background",
                    "🌆",
                    &[
                        ("City Street", "urban city street background"),
                        ("Studio", "white photography studio"),
                        ("Park", "outdoor park with trees"),
                        ("Beach", "sandy beach with ocean"),
                        ("Modern Office", "contemporary office interior"),
                        ("Cafe", "cozy coffee shop interior"),
                    ],
                ),
            ],
        }
    }
}

fn slugify(name: &str) -> String {
    name.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
