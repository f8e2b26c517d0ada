//! Visibility evaluation against the active filter selection.
//!
//! Selections combine with OR inside a dimension and AND across dimensions; a dimension with
//! nothing selected places no constraint on the torrent.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::category::{ActivityCategory, Category, Memberships, StatusCategory};
use crate::model::TorrentId;

/// Categories and labels the user currently filters by.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterSelection {
    categories: BTreeSet<Category>,
}

impl FilterSelection {
    /// Empty selection; every torrent is visible.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a category to the selection, returning whether it was newly added.
    pub fn insert(&mut self, category: Category) -> bool {
        self.categories.insert(category)
    }

    /// Drop a category from the selection, returning whether it was present.
    pub fn remove(&mut self, category: &Category) -> bool {
        self.categories.remove(category)
    }

    /// Whether the category is selected.
    #[must_use]
    pub fn contains(&self, category: &Category) -> bool {
        self.categories.contains(category)
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Selected categories in category order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    fn selected_labels(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().filter_map(|category| match category {
            Category::Label(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

impl FromIterator<Category> for FilterSelection {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        Self {
            categories: iter.into_iter().collect(),
        }
    }
}

/// Decide whether a torrent with the given memberships passes the selection.
#[must_use]
pub fn is_visible(memberships: &Memberships, selection: &FilterSelection) -> bool {
    passes_status(memberships, selection)
        && passes_activity(memberships, selection)
        && passes_labels(memberships, selection)
}

fn passes_status(memberships: &Memberships, selection: &FilterSelection) -> bool {
    let downloading = selection.contains(&Category::Downloading);
    let completed = selection.contains(&Category::Completed);
    if !downloading && !completed {
        return true;
    }
    match memberships.status {
        StatusCategory::Downloading => downloading,
        StatusCategory::Completed => completed,
    }
}

fn passes_activity(memberships: &Memberships, selection: &FilterSelection) -> bool {
    let active = selection.contains(&Category::Active);
    let inactive = selection.contains(&Category::Inactive);
    if !active && !inactive {
        return true;
    }
    match memberships.activity {
        ActivityCategory::Active => active,
        ActivityCategory::Inactive => inactive,
    }
}

fn passes_labels(memberships: &Memberships, selection: &FilterSelection) -> bool {
    let no_label = selection.contains(&Category::NoLabel);
    let mut labels = selection.selected_labels().peekable();
    if !no_label && labels.peek().is_none() {
        return true;
    }
    (no_label && memberships.has_no_label())
        || labels.any(|label| memberships.labels.contains(label))
}

/// Visibility transitions produced by an evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisibilityChanges {
    /// Torrents that became visible.
    pub shown: Vec<TorrentId>,
    /// Torrents that became hidden.
    pub hidden: Vec<TorrentId>,
}

impl VisibilityChanges {
    /// Whether no torrent changed visibility.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shown.is_empty() && self.hidden.is_empty()
    }

    /// Record a transition for `id` given its previous and current state.
    pub fn record(&mut self, id: &TorrentId, was_visible: bool, visible: bool) {
        match (was_visible, visible) {
            (false, true) => self.shown.push(id.clone()),
            (true, false) => self.hidden.push(id.clone()),
            _ => {}
        }
    }

    pub(crate) fn sort(&mut self) {
        self.shown.sort_unstable();
        self.hidden.sort_unstable();
    }
}
