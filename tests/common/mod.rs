//! Shared fixtures: a scripted in-memory backend and a recording observer.

#![allow(dead_code)]

use futures::future::BoxFuture;
use futures::FutureExt;
use listing_sync::feed::{Item, ItemPage};
use listing_sync::settings::{SettingsForm, SettingsSnapshot};
use listing_sync::view::ViewChange;
use listing_sync::{
    Dashboard, DashboardObserver, DashboardView, Policies, RemoteError, RemoteSource,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct State {
    /// Newest first.
    catalog: Vec<Item>,
    /// Cities of the last stored settings; empty matches everything.
    stored_cities: Vec<String>,
    stored: Option<SettingsSnapshot>,
    save_attempts: Vec<SettingsSnapshot>,
    save_failures: usize,
    save_delay: Duration,
    list_calls: Vec<u32>,
    list_failures: usize,
    list_delay: Duration,
}

/// Backend that filters its catalog by the stored city selection, the way
/// the real dashboard does.
#[derive(Default)]
pub struct ScriptedRemote {
    state: Mutex<State>,
}

pub fn listing(key: &str, city: &str) -> Item {
    let Value::Object(fields) = json!({
        "url": key,
        "address": format!("Street {}", key),
        "city": city,
    }) else {
        unreachable!()
    };
    Item::from_fields(fields).unwrap()
}

impl ScriptedRemote {
    /// `(key, city)` pairs, newest first.
    pub fn new(listings: &[(&str, &str)]) -> Arc<Self> {
        let remote = Self::default();
        remote.state.lock().unwrap().catalog =
            listings.iter().map(|(k, c)| listing(k, c)).collect();
        Arc::new(remote)
    }

    /// `n` listings in `city`, keyed `{prefix}-01` (newest) onwards.
    pub fn numbered(prefix: &str, city: &str, n: usize) -> Arc<Self> {
        let keys: Vec<String> = (1..=n).map(|i| format!("{}-{:02}", prefix, i)).collect();
        let listings: Vec<(&str, &str)> = keys.iter().map(|k| (k.as_str(), city)).collect();
        Self::new(&listings)
    }

    /// Publish listings on top of the catalog, first one newest.
    pub fn publish(&self, listings: &[(&str, &str)]) {
        let fresh: Vec<Item> = listings.iter().map(|(k, c)| listing(k, c)).collect();
        self.state.lock().unwrap().catalog.splice(0..0, fresh);
    }

    pub fn fail_saves(&self, n: usize) {
        self.state.lock().unwrap().save_failures = n;
    }

    pub fn fail_lists(&self, n: usize) {
        self.state.lock().unwrap().list_failures = n;
    }

    pub fn set_save_delay(&self, delay: Duration) {
        self.state.lock().unwrap().save_delay = delay;
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.state.lock().unwrap().list_delay = delay;
    }

    pub fn save_attempts(&self) -> Vec<SettingsSnapshot> {
        self.state.lock().unwrap().save_attempts.clone()
    }

    pub fn stored(&self) -> Option<SettingsSnapshot> {
        self.state.lock().unwrap().stored.clone()
    }

    pub fn list_calls(&self) -> Vec<u32> {
        self.state.lock().unwrap().list_calls.clone()
    }
}

impl RemoteSource for ScriptedRemote {
    fn save_settings<'a>(
        &'a self,
        snapshot: &'a SettingsSnapshot,
    ) -> BoxFuture<'a, Result<(), RemoteError>> {
        async move {
            let (delay, fail) = {
                let mut state = self.state.lock().unwrap();
                state.save_attempts.push(snapshot.clone());
                let fail = state.save_failures > 0;
                state.save_failures = state.save_failures.saturating_sub(1);
                (state.save_delay, fail)
            };
            tokio::time::sleep(delay).await;
            if fail {
                return Err(RemoteError::HttpStatus(503));
            }

            let mut state = self.state.lock().unwrap();
            state.stored_cities = snapshot.filter_cities.clone();
            state.stored = Some(snapshot.clone());
            Ok(())
        }
        .boxed()
    }

    fn list_items(&self, page: u32, per_page: u32) -> BoxFuture<'_, Result<ItemPage, RemoteError>> {
        async move {
            let delay = {
                let mut state = self.state.lock().unwrap();
                state.list_calls.push(page);
                state.list_delay
            };
            tokio::time::sleep(delay).await;

            let mut state = self.state.lock().unwrap();
            if state.list_failures > 0 {
                state.list_failures -= 1;
                return Err(RemoteError::HttpStatus(503));
            }

            let matching: Vec<Item> = state
                .catalog
                .iter()
                .filter(|item| {
                    state.stored_cities.is_empty()
                        || item.field_str("city").is_some_and(|city| {
                            state.stored_cities.contains(&city.to_lowercase())
                        })
                })
                .cloned()
                .collect();
            let total = matching.len() as u64;
            let start = (page.saturating_sub(1) * per_page) as usize;
            let items = matching
                .into_iter()
                .skip(start)
                .take(per_page as usize)
                .collect();
            Ok(ItemPage::new(items, page, per_page, total))
        }
        .boxed()
    }
}

/// Records every change notification in delivery order.
#[derive(Clone, Default)]
pub struct Recorder {
    changes: Arc<Mutex<Vec<ViewChange>>>,
}

impl Recorder {
    pub fn observer(&self) -> Box<dyn DashboardObserver> {
        Box::new(self.clone())
    }

    pub fn changes(&self) -> Vec<ViewChange> {
        self.changes.lock().unwrap().clone()
    }

    pub fn count(&self, change: ViewChange) -> usize {
        self.changes().iter().filter(|c| **c == change).count()
    }

    pub fn clear(&self) {
        self.changes.lock().unwrap().clear();
    }
}

impl DashboardObserver for Recorder {
    fn notify(&mut self, change: &ViewChange, _view: &DashboardView<'_>) {
        self.changes.lock().unwrap().push(*change);
    }
}

pub fn dashboard(
    remote: &Arc<ScriptedRemote>,
    form: SettingsForm,
    recorder: &Recorder,
) -> Dashboard {
    Dashboard::new(remote.clone(), Policies::default(), form, recorder.observer())
}

pub fn keys(dashboard: &Dashboard) -> Vec<String> {
    dashboard
        .view()
        .items()
        .iter()
        .map(|item| item.key().to_string())
        .collect()
}

pub fn assert_unique_keys(dashboard: &Dashboard) {
    let keys = keys(dashboard);
    let mut unique = keys.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), keys.len(), "duplicate keys in feed: {:?}", keys);
}

pub fn form_with_cities(cities: &[&str]) -> SettingsForm {
    let mut form = SettingsForm::default();
    for city in cities {
        form.add_city(city);
    }
    form
}
