use serde::{Deserialize, Serialize};

/// What the listing directory exposes about a posted item. Listing
/// storage itself lives outside this core; ownership is all the
/// routing and cleanup logic ever need, title and kind only enrich
/// conversation summaries for the listing's owner.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingSummary {
    pub listing_id: String,
    pub owner_id: String,
    pub title: String,
    pub kind: String,
}
