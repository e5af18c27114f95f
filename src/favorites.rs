// Favorite listing ids with optimistic toggling.
// The local set flips immediately; a failed remote call flips it back.
// Toggles made before the server list arrives are replayed on top of it.

use std::collections::HashSet;
use tracing::warn;

use crate::api::CatalogApi;
use crate::error::DiscoveryResult;

/// One pending flip, kept so it can be reverted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FavoriteChange {
    pub listing_id: String,
    pub favorite: bool,
}

impl FavoriteChange {
    pub async fn send(&self, api: &dyn CatalogApi) -> DiscoveryResult<()> {
        if self.favorite {
            api.add_favorite(&self.listing_id).await
        } else {
            api.remove_favorite(&self.listing_id).await
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Favorites {
    ids: HashSet<String>,
    loaded: bool,
    // Toggles issued before `replace`, in order
    pending: Vec<FavoriteChange>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the server's list, then replays toggles made while it was
    /// in flight.
    pub fn replace(&mut self, ids: impl IntoIterator<Item = String>) {
        self.ids = ids.into_iter().collect();
        self.loaded = true;
        for change in std::mem::take(&mut self.pending) {
            self.set(&change.listing_id, change.favorite);
        }
    }

    pub fn contains(&self, listing_id: &str) -> bool {
        self.ids.contains(listing_id)
    }

    pub fn toggle(&mut self, listing_id: &str) -> FavoriteChange {
        let favorite = !self.ids.remove(listing_id);
        if favorite {
            self.ids.insert(listing_id.to_string());
        }
        let change = FavoriteChange {
            listing_id: listing_id.to_string(),
            favorite,
        };
        if !self.loaded {
            self.pending.push(change.clone());
        }
        change
    }

    pub fn revert(&mut self, change: &FavoriteChange) {
        warn!(listing_id = %change.listing_id, favorite = change.favorite, "Reverting favorite toggle");
        if let Some(pos) = self.pending.iter().rposition(|c| c == change) {
            self.pending.remove(pos);
        }
        self.set(&change.listing_id, !change.favorite);
    }

    fn set(&mut self, listing_id: &str, favorite: bool) {
        if favorite {
            self.ids.insert(listing_id.to_string());
        } else {
            self.ids.remove(listing_id);
        }
    }
}
