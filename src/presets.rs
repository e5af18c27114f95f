// Named filter snapshots owned by the signed-in user.
// Presets are never edited in place: replace means delete then create.

use std::sync::Arc;
use tracing::{info, warn};

use crate::api::CatalogApi;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{FilterState, NewFilterPreset, SavedFilterPreset};

pub const MAX_NAME_LEN: usize = 50;

/// Trims and checks a preset name before any request goes out.
pub fn validate_name(name: &str) -> DiscoveryResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DiscoveryError::Validation("preset name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DiscoveryError::Validation(format!(
            "preset name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

/// The preset to auto-apply, if exactly one is marked default.
pub fn default_preset(presets: &[SavedFilterPreset]) -> Option<&SavedFilterPreset> {
    let mut defaults = presets.iter().filter(|p| p.is_default);
    match (defaults.next(), defaults.next()) {
        (Some(only), None) => Some(only),
        _ => None,
    }
}

// Default first, otherwise server order
fn sort_default_first(presets: &mut [SavedFilterPreset]) {
    presets.sort_by_key(|p| !p.is_default);
}

#[derive(Clone)]
pub struct SavedFilterPresetManager {
    api: Arc<dyn CatalogApi>,
    category_id: String,
}

impl SavedFilterPresetManager {
    pub fn new(api: Arc<dyn CatalogApi>, category_id: &str) -> Self {
        Self {
            api,
            category_id: category_id.to_string(),
        }
    }

    /// Presets for the active category. Anonymous callers get an empty list.
    pub async fn list(&self) -> DiscoveryResult<Vec<SavedFilterPreset>> {
        if !self.api.is_authenticated() {
            return Ok(Vec::new());
        }
        match self.api.list_presets(&self.category_id).await {
            Ok(mut presets) => {
                presets.retain(|p| p.category_id == self.category_id);
                sort_default_first(&mut presets);
                Ok(presets)
            }
            Err(DiscoveryError::Unauthenticated) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Validates, creates, and returns the refreshed list.
    pub async fn save(
        &self,
        name: &str,
        filters: &FilterState,
        is_default: bool,
    ) -> DiscoveryResult<Vec<SavedFilterPreset>> {
        let name = validate_name(name)?;
        if !self.api.is_authenticated() {
            return Err(DiscoveryError::Unauthenticated);
        }
        let created = self
            .api
            .create_preset(&NewFilterPreset {
                name,
                category_id: self.category_id.clone(),
                filters: filters.clone(),
                is_default,
            })
            .await?;
        info!(preset_id = %created.id, name = %created.name, "Saved filter preset");
        self.list().await
    }

    /// Deletes and returns the refreshed list.
    pub async fn delete(&self, preset_id: &str) -> DiscoveryResult<Vec<SavedFilterPreset>> {
        if let Err(e) = self.api.delete_preset(preset_id).await {
            warn!(preset_id, error = %e, "Failed to delete filter preset");
            return Err(e);
        }
        info!(preset_id, "Deleted filter preset");
        self.list().await
    }
}
