//! Category memberships and incrementally maintained per-category counters.
//!
//! # Design
//! - Each torrent's last computed membership set is recorded next to the counters so that a
//!   recompute only touches the counters of categories it gained or lost.
//! - A from-scratch recount is available for initial loads and for verification; the
//!   incremental path must always agree with it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::model::{TorrentId, TorrentItem};
use crate::store::ItemStore;

const LABEL_PREFIX: &str = "label:";

/// Category identifier a torrent can be a member of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Every tracked torrent.
    All,
    /// Progress below the completion threshold.
    Downloading,
    /// Progress at or above the completion threshold.
    Completed,
    /// Either transfer rate above the activity threshold.
    Active,
    /// Both transfer rates at or below the activity threshold.
    Inactive,
    /// Torrent carries no labels.
    NoLabel,
    /// Torrent carries the named label.
    Label(String),
}

impl Category {
    /// Categories every counter map reports, even at zero.
    pub const BUILT_IN: [Self; 6] = [
        Self::All,
        Self::Downloading,
        Self::Completed,
        Self::Active,
        Self::Inactive,
        Self::NoLabel,
    ];

    /// Label category for the given name.
    #[must_use]
    pub fn label(name: impl Into<String>) -> Self {
        Self::Label(name.into())
    }
}

impl Display for Category {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => formatter.write_str("all"),
            Self::Downloading => formatter.write_str("downloading"),
            Self::Completed => formatter.write_str("completed"),
            Self::Active => formatter.write_str("active"),
            Self::Inactive => formatter.write_str("inactive"),
            Self::NoLabel => formatter.write_str("no-label"),
            Self::Label(name) => write!(formatter, "{LABEL_PREFIX}{name}"),
        }
    }
}

impl FromStr for Category {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(Self::All),
            "downloading" => Ok(Self::Downloading),
            "completed" => Ok(Self::Completed),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "no-label" => Ok(Self::NoLabel),
            other => match other.strip_prefix(LABEL_PREFIX) {
                Some(name) if !name.trim().is_empty() => Ok(Self::label(name.trim())),
                _ => Err(SyncError::InvalidCategory {
                    value: other.to_string(),
                }),
            },
        }
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| D::Error::custom(format!("unknown category '{raw}'")))
    }
}

/// Completion dimension of the status partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    /// Still downloading.
    Downloading,
    /// Download finished.
    Completed,
}

/// Activity dimension of the status partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityCategory {
    /// Transferring above the activity threshold.
    Active,
    /// Idle.
    Inactive,
}

/// Derived memberships of a single torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memberships {
    /// Completion membership.
    pub status: StatusCategory,
    /// Activity membership.
    pub activity: ActivityCategory,
    /// Assigned labels; empty means the torrent is in the no-label category.
    pub labels: BTreeSet<String>,
}

impl Memberships {
    /// Derive memberships from a torrent record.
    #[must_use]
    pub fn classify(item: &TorrentItem, config: &SyncConfig) -> Self {
        let status = if item.progress_per_mille >= config.completion_per_mille {
            StatusCategory::Completed
        } else {
            StatusCategory::Downloading
        };
        let activity = if item.download_bps > config.activity_threshold_bps
            || item.upload_bps > config.activity_threshold_bps
        {
            ActivityCategory::Active
        } else {
            ActivityCategory::Inactive
        };
        Self {
            status,
            activity,
            labels: item.labels.iter().cloned().collect(),
        }
    }

    /// Whether the torrent carries no labels.
    #[must_use]
    pub fn has_no_label(&self) -> bool {
        self.labels.is_empty()
    }

    /// Flattened category set, always including [`Category::All`].
    #[must_use]
    pub fn categories(&self) -> BTreeSet<Category> {
        let mut categories = BTreeSet::new();
        categories.insert(Category::All);
        categories.insert(match self.status {
            StatusCategory::Downloading => Category::Downloading,
            StatusCategory::Completed => Category::Completed,
        });
        categories.insert(match self.activity {
            ActivityCategory::Active => Category::Active,
            ActivityCategory::Inactive => Category::Inactive,
        });
        if self.labels.is_empty() {
            categories.insert(Category::NoLabel);
        } else {
            categories.extend(self.labels.iter().cloned().map(Category::Label));
        }
        categories
    }
}

/// Categories a torrent entered or left during a recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MembershipDelta {
    /// Categories the torrent joined.
    pub gained: Vec<Category>,
    /// Categories the torrent left.
    pub lost: Vec<Category>,
}

impl MembershipDelta {
    /// Whether memberships were unchanged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.gained.is_empty() && self.lost.is_empty()
    }
}

/// Number of torrents per category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCounters {
    counts: BTreeMap<Category, usize>,
}

impl Default for CategoryCounters {
    fn default() -> Self {
        Self {
            counts: Category::BUILT_IN
                .into_iter()
                .map(|category| (category, 0))
                .collect(),
        }
    }
}

impl CategoryCounters {
    /// Counters with every built-in category at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count every membership set from scratch.
    #[must_use]
    pub fn recount<'a>(memberships: impl IntoIterator<Item = &'a Memberships>) -> Self {
        let mut counters = Self::new();
        for membership in memberships {
            for category in membership.categories() {
                counters.increment(&category);
            }
        }
        counters
    }

    /// Current count for a category (zero when never seen).
    #[must_use]
    pub fn get(&self, category: &Category) -> usize {
        self.counts.get(category).copied().unwrap_or_default()
    }

    /// Iterate over categories and counts in category order.
    pub fn iter(&self) -> impl Iterator<Item = (&Category, usize)> {
        self.counts.iter().map(|(category, count)| (category, *count))
    }

    fn increment(&mut self, category: &Category) {
        if let Some(count) = self.counts.get_mut(category) {
            *count += 1;
        } else {
            self.counts.insert(category.clone(), 1);
        }
    }

    fn decrement(&mut self, category: &Category) {
        let Some(count) = self.counts.get_mut(category) else {
            warn!(category = %category, "decrement of untracked category counter");
            return;
        };
        if *count == 0 {
            warn!(category = %category, "category counter already at zero");
            return;
        }
        *count -= 1;
        if *count == 0 && matches!(category, Category::Label(_)) {
            self.counts.remove(category);
        }
    }
}

impl Serialize for CategoryCounters {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.counts.iter())
    }
}

/// Per-torrent membership bookkeeping with incrementally maintained counters.
#[derive(Debug, Clone, Default)]
pub struct CategoryAggregator {
    config: SyncConfig,
    recorded: HashMap<TorrentId, Memberships>,
    counters: CategoryCounters,
}

impl CategoryAggregator {
    /// Construct an empty aggregator using the given thresholds.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            recorded: HashMap::new(),
            counters: CategoryCounters::new(),
        }
    }

    /// Thresholds in use.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Live counters.
    #[must_use]
    pub const fn counters(&self) -> &CategoryCounters {
        &self.counters
    }

    /// Last recorded memberships for a torrent.
    #[must_use]
    pub fn memberships(&self, id: &TorrentId) -> Option<&Memberships> {
        self.recorded.get(id)
    }

    /// Re-derive a torrent's memberships and move counters by the difference.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownItemReference`] when the store does not track `id`.
    pub fn recompute(
        &mut self,
        store: &ItemStore,
        id: &TorrentId,
    ) -> SyncResult<MembershipDelta> {
        let item = store
            .get(id)
            .ok_or_else(|| SyncError::UnknownItemReference {
                torrent_id: id.to_string(),
            })?;
        let next = Memberships::classify(item, &self.config);
        let next_set = next.categories();
        let previous_set = self
            .recorded
            .get(id)
            .map(Memberships::categories)
            .unwrap_or_default();

        let delta = MembershipDelta {
            gained: next_set.difference(&previous_set).cloned().collect(),
            lost: previous_set.difference(&next_set).cloned().collect(),
        };
        for category in &delta.gained {
            self.counters.increment(category);
        }
        for category in &delta.lost {
            self.counters.decrement(category);
        }
        self.recorded.insert(id.clone(), next);
        Ok(delta)
    }

    /// Forget a removed torrent, decrementing every category it held.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownItemReference`] when nothing is recorded for `id`.
    pub fn remove(&mut self, id: &TorrentId) -> SyncResult<MembershipDelta> {
        let previous = self
            .recorded
            .remove(id)
            .ok_or_else(|| SyncError::UnknownItemReference {
                torrent_id: id.to_string(),
            })?;
        let lost: Vec<Category> = previous.categories().into_iter().collect();
        for category in &lost {
            self.counters.decrement(category);
        }
        Ok(MembershipDelta {
            gained: Vec::new(),
            lost,
        })
    }

    /// Classify every tracked torrent and recount from scratch.
    pub fn rebuild(&mut self, store: &ItemStore) {
        self.recorded = store
            .iter()
            .map(|item| (item.id.clone(), Memberships::classify(item, &self.config)))
            .collect();
        self.counters = CategoryCounters::recount(self.recorded.values());
    }

    /// Swap thresholds and rebuild against the store.
    pub fn reconfigure(&mut self, config: SyncConfig, store: &ItemStore) {
        self.config = config;
        self.rebuild(store);
    }

    /// Counters recomputed from the recorded memberships, for verification.
    #[must_use]
    pub fn recount(&self) -> CategoryCounters {
        CategoryCounters::recount(self.recorded.values())
    }
}
