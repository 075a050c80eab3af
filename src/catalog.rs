//! Garment variant policy and product drafts.
//!
//! The fulfillment catalog lists every color/size combination a provider can
//! print. [`select_variants`] narrows that to the colors we sell, prices each
//! size, splits the kept ids into light and dark garments, and marks a single
//! default variant.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::PrintifySettings;

/// Garment colors offered in the store, in catalog display order.
pub const SUPPORTED_COLORS: &[&str] = &[
    "Black",
    "White",
    "Cardinal Red",
    "Carolina Blue",
    "Sport Grey",
    "Red",
    "Light Pink",
    "Navy",
    "Sapphire",
    "Sunset",
    "Turf Green",
    "Military Green",
    "Heliconia",
    "Charcoal",
    "Purple",
    "Heather Sapphire",
];

/// Garments that take dark text. Every other supported color takes light text.
pub const LIGHT_GARMENTS: &[&str] = &["White", "Sport Grey"];

/// Sizes sold at the standard price.
pub const STANDARD_SIZES: &[&str] = &["XS", "S", "M", "L", "XL", "2XL"];

/// Size of the default variant.
pub const DEFAULT_SIZE: &str = "L";

/// One row of the provider's variant catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogVariant {
    pub id: u64,
    pub color: String,
    pub size: String,
}

/// A variant as sent in a product draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSetting {
    pub id: u64,
    /// Price in cents.
    pub price: u32,
    pub is_enabled: bool,
    pub is_default: bool,
}

/// Outcome of [`select_variants`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantCatalog {
    pub variants: Vec<VariantSetting>,
    /// Kept variant ids on light garments.
    pub light_ids: Vec<u64>,
    /// Kept variant ids on dark garments.
    pub dark_ids: Vec<u64>,
}

impl VariantCatalog {
    pub fn default_variant(&self) -> Option<&VariantSetting> {
        self.variants.iter().find(|v| v.is_default)
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// Pricing and size limits applied by [`select_variants`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantPolicy {
    pub standard_price: u32,
    pub extended_price: u32,
    pub max_variants: usize,
}

impl Default for VariantPolicy {
    fn default() -> Self {
        Self::from(&PrintifySettings::default())
    }
}

impl From<&PrintifySettings> for VariantPolicy {
    fn from(settings: &PrintifySettings) -> Self {
        Self {
            standard_price: settings.standard_price,
            extended_price: settings.extended_price,
            max_variants: settings.max_variants,
        }
    }
}

pub fn is_supported_color(color: &str) -> bool {
    SUPPORTED_COLORS.contains(&color)
}

pub fn is_light_garment(color: &str) -> bool {
    LIGHT_GARMENTS.contains(&color)
}

/// Filter, price and classify catalog variants.
///
/// Unsupported colors are dropped, then at most `max_variants` are kept in
/// catalog order. Standard sizes are enabled at the standard price; larger
/// sizes are listed disabled at the extended price. The default variant is
/// size L in a color drawn from `rng`; if no L survives, the first enabled
/// variant is the default.
pub fn select_variants<R: Rng + ?Sized>(
    raw: &[CatalogVariant],
    policy: &VariantPolicy,
    rng: &mut R,
) -> VariantCatalog {
    let kept: Vec<&CatalogVariant> = raw
        .iter()
        .filter(|v| is_supported_color(&v.color))
        .take(policy.max_variants)
        .collect();

    if kept.len() < raw.iter().filter(|v| is_supported_color(&v.color)).count() {
        tracing::warn!(
            max = policy.max_variants,
            "variant catalog truncated to the maximum variant count"
        );
    }

    let mut catalog = VariantCatalog::default();
    for variant in &kept {
        let standard = STANDARD_SIZES.contains(&variant.size.as_str());
        catalog.variants.push(VariantSetting {
            id: variant.id,
            price: if standard {
                policy.standard_price
            } else {
                policy.extended_price
            },
            is_enabled: standard,
            is_default: false,
        });
        if is_light_garment(&variant.color) {
            catalog.light_ids.push(variant.id);
        } else {
            catalog.dark_ids.push(variant.id);
        }
    }

    let mut default_colors: Vec<&str> = Vec::new();
    for variant in &kept {
        if variant.size == DEFAULT_SIZE && !default_colors.contains(&variant.color.as_str()) {
            default_colors.push(&variant.color);
        }
    }

    let default_id = default_colors
        .choose(rng)
        .and_then(|color| {
            kept.iter()
                .find(|v| v.size == DEFAULT_SIZE && v.color == *color)
                .map(|v| v.id)
        })
        .or_else(|| catalog.variants.iter().find(|v| v.is_enabled).map(|v| v.id));

    if let Some(id) = default_id {
        if let Some(v) = catalog.variants.iter_mut().find(|v| v.id == id) {
            v.is_default = true;
        }
    }

    tracing::debug!(
        variants = catalog.variants.len(),
        light = catalog.light_ids.len(),
        dark = catalog.dark_ids.len(),
        default = ?default_id,
        "variant catalog selected"
    );
    catalog
}

/// Whether text is printed dark or light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shade {
    Dark,
    Light,
}

/// A text color rendered for every pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextColor {
    /// Upper-case RGB hex without `#`; also the image file name suffix.
    pub hex: &'static str,
    pub shade: Shade,
}

/// Both text colors, in image id order.
pub const TEXT_COLORS: [TextColor; 2] = [
    TextColor {
        hex: "000000",
        shade: Shade::Dark,
    },
    TextColor {
        hex: "FFFFFF",
        shade: Shade::Light,
    },
];

impl TextColor {
    /// Variants this text is printed on: dark text on light garments and
    /// light text on dark garments.
    pub fn variant_ids<'a>(&self, catalog: &'a VariantCatalog) -> &'a [u64] {
        match self.shade {
            Shade::Dark => &catalog.light_ids,
            Shade::Light => &catalog.dark_ids,
        }
    }

    /// `{pattern_id}{HEX}.png`
    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}{}.png", self.hex)
    }
}

/// One print area: an image placed on the front of a set of variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintArea {
    pub variant_ids: Vec<u64>,
    pub image_id: String,
}

/// Everything needed to create one product listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub blueprint_id: u64,
    pub print_provider_id: u64,
    pub variants: Vec<VariantSetting>,
    pub print_areas: Vec<PrintArea>,
}
