use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Opaque pagination cursor issued by the catalog service.
///
/// Only ever passed back verbatim as the `after` argument of the next fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct Cursor(pub String);

impl Cursor {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Cursor {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A catalog product as displayed in a list row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub image: Option<String>,
    pub image_alt: String,
    pub category: String,
}

impl Product {
    /// Product with the catalog's display fallbacks for every optional field.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            description: DEFAULT_DESCRIPTION.to_owned(),
            price: 0.0,
            currency: DEFAULT_CURRENCY.to_owned(),
            image: None,
            image_alt: name.clone(),
            category: DEFAULT_CATEGORY.to_owned(),
            name,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_price(mut self, amount: f64, currency: impl Into<String>) -> Self {
        self.price = amount;
        self.currency = currency.into();
        self
    }

    #[must_use]
    pub fn with_image(mut self, url: impl Into<String>, alt: impl Into<String>) -> Self {
        self.image = Some(url.into());
        self.image_alt = alt.into();
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }
}

pub(crate) const DEFAULT_DESCRIPTION: &str = "No description available";
pub(crate) const DEFAULT_CURRENCY: &str = "USD";
pub(crate) const DEFAULT_CATEGORY: &str = "Uncategorized";

/// One page as returned by a [`CatalogGateway`](super::CatalogGateway).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPage {
    pub items: Vec<Product>,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub start_cursor: Option<Cursor>,
    pub end_cursor: Option<Cursor>,
}

/// A page stored in the [`PageCache`](super::PageCache). Immutable once stored.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct PageEntry {
    /// 1-based.
    pub page_number: u32,
    pub items: Vec<Product>,
    pub start_cursor: Option<Cursor>,
    /// `None` means the next page cannot be requested.
    pub end_cursor: Option<Cursor>,
    pub has_next_page: bool,
}

impl PageEntry {
    #[must_use]
    pub fn new(page_number: u32, page: ProductPage) -> Self {
        Self {
            page_number,
            items: page.items,
            start_cursor: page.start_cursor,
            end_cursor: page.end_cursor,
            has_next_page: page.has_next_page,
        }
    }
}
