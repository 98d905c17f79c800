//! Player directory interface and in-memory implementation
//!
//! The directory auto-registers unseen players on first contact and keeps
//! their display names current.

use crate::error::{LadderError, Result};
use crate::types::{PlayerId, PlayerProfile};
use crate::utils::current_timestamp;
use std::collections::HashMap;
use std::sync::RwLock;

/// Trait for player profile lookups and auto-registration
#[cfg_attr(test, mockall::automock)]
pub trait PlayerDirectory: Send + Sync {
    /// Get a player's profile, creating it at first contact. The display
    /// name is refreshed on every call.
    fn get_or_create(&self, player_id: &str, display_name: &str) -> Result<PlayerProfile>;

    /// Get a player's profile without creating one
    fn get(&self, player_id: &str) -> Result<Option<PlayerProfile>>;

    /// Resolve display names for a batch of player ids; unknown ids
    /// fall back to the raw id
    fn display_names(&self, player_ids: &[PlayerId]) -> Result<HashMap<PlayerId, String>>;
}

/// In-memory player directory implementation
#[derive(Debug, Default)]
pub struct InMemoryPlayerDirectory {
    profiles: RwLock<HashMap<PlayerId, PlayerProfile>>,
}

impl InMemoryPlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayerDirectory for InMemoryPlayerDirectory {
    fn get_or_create(&self, player_id: &str, display_name: &str) -> Result<PlayerProfile> {
        let mut profiles = self
            .profiles
            .write()
            .map_err(|_| LadderError::StorageFailure {
                message: "Failed to acquire player directory write lock".to_string(),
            })?;

        let now = current_timestamp();
        let profile = profiles
            .entry(player_id.to_string())
            .and_modify(|p| {
                p.display_name = display_name.to_string();
                p.last_seen = now;
            })
            .or_insert_with(|| PlayerProfile {
                id: player_id.to_string(),
                display_name: display_name.to_string(),
                created_at: now,
                last_seen: now,
            });

        Ok(profile.clone())
    }

    fn get(&self, player_id: &str) -> Result<Option<PlayerProfile>> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| LadderError::StorageFailure {
                message: "Failed to acquire player directory read lock".to_string(),
            })?;

        Ok(profiles.get(player_id).cloned())
    }

    fn display_names(&self, player_ids: &[PlayerId]) -> Result<HashMap<PlayerId, String>> {
        let profiles = self
            .profiles
            .read()
            .map_err(|_| LadderError::StorageFailure {
                message: "Failed to acquire player directory read lock".to_string(),
            })?;

        let mut names = HashMap::new();
        for player_id in player_ids {
            let name = profiles
                .get(player_id)
                .map(|p| p.display_name.clone())
                .unwrap_or_else(|| player_id.clone());
            names.insert(player_id.clone(), name);
        }

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_registration() {
        let directory = InMemoryPlayerDirectory::new();

        assert!(directory.get("p1").unwrap().is_none());

        let profile = directory.get_or_create("p1", "Player One").unwrap();
        assert_eq!(profile.id, "p1");
        assert_eq!(profile.display_name, "Player One");

        assert!(directory.get("p1").unwrap().is_some());
    }

    #[test]
    fn test_display_name_refresh() {
        let directory = InMemoryPlayerDirectory::new();

        directory.get_or_create("p1", "Old Name").unwrap();
        let updated = directory.get_or_create("p1", "New Name").unwrap();

        assert_eq!(updated.display_name, "New Name");
        assert_eq!(
            directory.get("p1").unwrap().unwrap().display_name,
            "New Name"
        );
    }

    #[test]
    fn test_display_names_fall_back_to_id() {
        let directory = InMemoryPlayerDirectory::new();
        directory.get_or_create("p1", "Player One").unwrap();

        let names = directory
            .display_names(&["p1".to_string(), "ghost".to_string()])
            .unwrap();

        assert_eq!(names["p1"], "Player One");
        assert_eq!(names["ghost"], "ghost");
    }
}
