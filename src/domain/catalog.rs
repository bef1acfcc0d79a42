/// A product record returned by the catalog service. Read-only to this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub price: i64,
    pub available: bool,
}
