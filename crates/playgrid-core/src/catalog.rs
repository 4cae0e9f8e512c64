//! Built-in game catalog and launch providers.
//!
//! The catalog drives two checks in the scheduler: plan entitlement
//! (`min_plan`) at session request, and provider resolution at launch-ticket
//! issuance. A game without a provider launches through the built-in player
//! page instead of an external launcher.

use serde::{Deserialize, Serialize};

use crate::plan::Plan;

/// A playable title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub slug: String,
    pub title: String,
    pub genre: String,
    /// Minimum plan tier entitled to request this game.
    pub min_plan: Plan,
    /// External launch provider, if the title launches through one.
    pub provider: Option<String>,
}

/// An external launch provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub name: String,
    /// Base URL the launch ticket points at.
    pub launch_url_template: String,
}

/// The default title catalog.
#[must_use]
pub fn default_catalog() -> Vec<Game> {
    vec![
        Game {
            slug: "roblox".to_owned(),
            title: "Roblox".to_owned(),
            genre: "Sandbox".to_owned(),
            min_plan: Plan::Free,
            provider: Some("roblox".to_owned()),
        },
        Game {
            slug: "fortnite".to_owned(),
            title: "Fortnite".to_owned(),
            genre: "Shooter".to_owned(),
            min_plan: Plan::Free,
            provider: Some("epic".to_owned()),
        },
        Game {
            slug: "fall-guys".to_owned(),
            title: "Fall Guys".to_owned(),
            genre: "Party".to_owned(),
            min_plan: Plan::Performance,
            provider: None,
        },
        Game {
            slug: "rocket-league".to_owned(),
            title: "Rocket League".to_owned(),
            genre: "Sports".to_owned(),
            min_plan: Plan::Performance,
            provider: None,
        },
    ]
}

/// The launch providers known to the control plane.
#[must_use]
pub fn default_providers() -> Vec<Provider> {
    vec![
        Provider {
            id: "epic".to_owned(),
            name: "Epic Games".to_owned(),
            launch_url_template: "https://launcher.epicgames.com".to_owned(),
        },
        Provider {
            id: "roblox".to_owned(),
            name: "Roblox".to_owned(),
            launch_url_template: "https://www.roblox.com/games".to_owned(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_providers_are_registered() {
        let providers = default_providers();
        for game in default_catalog() {
            if let Some(provider) = game.provider {
                assert!(
                    providers.iter().any(|p| p.id == provider),
                    "unknown provider {provider} for {}",
                    game.slug
                );
            }
        }
    }

    #[test]
    fn free_titles_exist() {
        assert!(default_catalog().iter().any(|g| g.min_plan == Plan::Free));
    }
}
