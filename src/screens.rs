//! Fixed RouteKey → screen registry.
//!
//! Screens are the CRUD pages of the console. The access engine never looks
//! inside them: it only hands out a [`ScreenRef`] whose module descriptor is
//! resolved on first [`ScreenRef::load`], so building a route table for a
//! role does not load any screen.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::route_key::RouteKey;

/// Descriptor produced when a screen is actually loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenModule {
    pub component: &'static str,
    pub bundle: String,
    pub loaded_at: DateTime<Utc>,
}

struct Screen {
    key: RouteKey,
    component: &'static str,
    title: &'static str,
    module: OnceLock<ScreenModule>,
}

/// Deferred-loadable reference to a screen. Cloning shares the underlying
/// screen, so a module loaded through one clone is loaded for all of them.
#[derive(Clone)]
pub struct ScreenRef(Arc<Screen>);

impl ScreenRef {
    fn new(key: RouteKey, component: &'static str, title: &'static str) -> Self {
        ScreenRef(Arc::new(Screen {
            key,
            component,
            title,
            module: OnceLock::new(),
        }))
    }

    pub fn key(&self) -> RouteKey {
        self.0.key
    }

    pub fn component(&self) -> &'static str {
        self.0.component
    }

    pub fn title(&self) -> &'static str {
        self.0.title
    }

    pub fn is_loaded(&self) -> bool {
        self.0.module.get().is_some()
    }

    /// Resolve the screen module, loading it on first use.
    pub fn load(&self) -> &ScreenModule {
        self.0.module.get_or_init(|| {
            tracing::debug!(component = self.0.component, "loading screen module");
            ScreenModule {
                component: self.0.component,
                bundle: format!("screens/{}.js", self.0.key.as_str()),
                loaded_at: Utc::now(),
            }
        })
    }
}

impl PartialEq for ScreenRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.key == other.0.key && self.0.component == other.0.component
    }
}

impl Eq for ScreenRef {}

impl fmt::Debug for ScreenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScreenRef")
            .field("key", &self.0.key)
            .field("component", &self.0.component)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

lazy_static! {
    static ref STANDARD_SCREENS: ScreenRegistry = {
        let mut screens = HashMap::new();
        for (key, component, title) in [
            (RouteKey::Dashboard, "DashboardPage", "Dashboard"),
            (RouteKey::Properties, "PropertiesPage", "Properties"),
            (RouteKey::Jobs, "JobsPage", "Jobs"),
            (RouteKey::Contacts, "ContactsPage", "Contacts"),
            (RouteKey::Reports, "ReportsPage", "Reports"),
            (RouteKey::Compliance, "CompliancePage", "Compliance"),
            (RouteKey::Payment, "PaymentPage", "Payments"),
            (RouteKey::Region, "RegionPage", "Regions"),
            (RouteKey::Technician, "TechnicianPage", "Technicians"),
            (RouteKey::Agencies, "AgenciesPage", "Agencies"),
            (RouteKey::Tenant, "TenantPortalPage", "My Tenancy"),
        ] {
            screens.insert(key, ScreenRef::new(key, component, title));
        }
        ScreenRegistry { screens }
    };
}

/// Mapping from feature area to its screen.
#[derive(Clone, Debug, Default)]
pub struct ScreenRegistry {
    screens: HashMap<RouteKey, ScreenRef>,
}

impl ScreenRegistry {
    /// The console's built-in screens, one per route key.
    pub fn standard() -> Self {
        STANDARD_SCREENS.clone()
    }

    pub fn get(&self, key: RouteKey) -> Option<&ScreenRef> {
        self.screens.get(&key)
    }

    pub fn contains(&self, key: RouteKey) -> bool {
        self.screens.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    /// Copy of this registry whose screens share nothing with the original,
    /// so none of them is loaded yet.
    pub fn detached(&self) -> Self {
        let screens = self
            .screens
            .iter()
            .map(|(key, screen)| (*key, ScreenRef::new(*key, screen.component(), screen.title())))
            .collect();
        Self { screens }
    }

    /// Copy of this registry with one screen removed.
    pub fn without(&self, key: RouteKey) -> Self {
        let mut screens = self.screens.clone();
        screens.remove(&key);
        Self { screens }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_covers_every_route_key() {
        let registry = ScreenRegistry::standard();
        for key in RouteKey::ALL {
            let screen = registry.get(key).expect("screen registered");
            assert_eq!(screen.key(), key);
        }
        assert_eq!(registry.len(), RouteKey::ALL.len());
    }

    #[test]
    fn load_is_deferred_and_shared_between_clones() {
        let screen = ScreenRef::new(RouteKey::Jobs, "JobsPage", "Jobs");
        let clone = screen.clone();
        assert!(!screen.is_loaded());

        let module = clone.load();
        assert_eq!(module.component, "JobsPage");
        assert_eq!(module.bundle, "screens/jobs.js");
        assert!(screen.is_loaded());
    }

    #[test]
    fn detached_copy_does_not_share_load_state() {
        let registry = ScreenRegistry::standard();
        let detached = registry.detached();
        registry.get(RouteKey::Reports).unwrap().load();
        assert!(!detached.get(RouteKey::Reports).unwrap().is_loaded());
        assert_eq!(
            detached.get(RouteKey::Reports).unwrap(),
            registry.get(RouteKey::Reports).unwrap()
        );
    }

    #[test]
    fn without_removes_only_the_named_screen() {
        let registry = ScreenRegistry::standard().without(RouteKey::Payment);
        assert!(!registry.contains(RouteKey::Payment));
        assert!(registry.contains(RouteKey::Jobs));
        assert!(ScreenRegistry::standard().contains(RouteKey::Payment));
    }
}
