//! Core type definitions for the simulation.
//!
//! Users and items are read-only views handed out by the loaders; the engine
//! never mutates them once loaded.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::memory::InteractionRecord;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Dense user identifier, assigned `0..N` in load order and stable for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u32);

impl UserId {
    /// Position of this user in the loaded user list.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Catalog-native item identifier. Distinct from the dense action index.
///
/// Kept as a string so numeric catalogs (TMDB ids) and textual ones
/// (book ids, news ids) share one representation.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Demographic gender attribute of a synthetic user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    /// Male.
    #[serde(rename = "M")]
    Male,
    /// Female.
    #[serde(rename = "F")]
    Female,
    /// Not stated in the profile.
    #[default]
    #[serde(rename = "U")]
    Unspecified,
}

impl Gender {
    /// Numeric code used in observations (`0` male, `1` female, `2` unspecified).
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Male => 0,
            Self::Female => 1,
            Self::Unspecified => 2,
        }
    }
}

/// A synthetic user with a free-text profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Dense id; reassigned by the engine in load order.
    #[serde(default = "default_user_id")]
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Gender attribute.
    #[serde(default)]
    pub gender: Gender,
    /// Age in years.
    pub age: u32,
    /// Free-text description, including taste in items.
    pub description: String,
    /// Optional occupation.
    #[serde(default)]
    pub job: String,
    /// Optional hobby.
    #[serde(default)]
    pub hobby: String,
}

fn default_user_id() -> UserId {
    UserId(0)
}

impl User {
    /// Create a user with an empty job and hobby. The id is assigned at load time.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        gender: Gender,
        age: u32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: UserId(0),
            name: name.into(),
            gender,
            age,
            description: description.into(),
            job: String::new(),
            hobby: String::new(),
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User(id = {}, name = {})", self.id, self.name)
    }
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// A dense vector embedding (e.g. of an item overview).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    /// Cosine similarity between two embeddings.
    /// Returns 0.0 if the lengths differ or either vector is empty or zero.
    #[must_use]
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        if self.0.len() != other.0.len() || self.0.is_empty() {
            return 0.0;
        }
        let (mut dot, mut norm_a, mut norm_b) = (0.0_f32, 0.0_f32, 0.0_f32);
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }
        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom < f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    /// Dimensionality of the embedding.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }
}

/// A catalog item.
///
/// The domain features vary by catalog, so they are kept generic:
/// categorical groups live in `tags` (`"genres"`, `"actors"`, `"authors"`, …)
/// and precomputed text embeddings in `embeddings` keyed by source field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Catalog-native id. May be omitted when the catalog is keyed by id.
    #[serde(default)]
    pub id: ItemId,
    /// Human-readable title.
    pub title: String,
    /// Free-text description / overview.
    #[serde(default)]
    pub description: String,
    /// Categorical feature groups.
    #[serde(default)]
    pub tags: BTreeMap<String, Vec<String>>,
    /// Average catalog rating.
    #[serde(default)]
    pub vote_average: f64,
    /// Broad popularity score, used to break selection ties.
    #[serde(default)]
    pub popularity: f64,
    /// Precomputed embeddings keyed by source field.
    #[serde(default)]
    pub embeddings: BTreeMap<String, Embedding>,
}

impl Item {
    /// Create an item with no features.
    #[must_use]
    pub fn new(id: impl Into<ItemId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            tags: BTreeMap::new(),
            vote_average: 0.0,
            popularity: 0.0,
            embeddings: BTreeMap::new(),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a categorical feature group.
    #[must_use]
    pub fn with_tags<I, S>(mut self, group: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags
            .insert(group.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Set the catalog vote average.
    #[must_use]
    pub fn with_vote_average(mut self, vote_average: f64) -> Self {
        self.vote_average = vote_average;
        self
    }

    /// Set the popularity score.
    #[must_use]
    pub fn with_popularity(mut self, popularity: f64) -> Self {
        self.popularity = popularity;
        self
    }

    /// Attach an embedding for `field`.
    #[must_use]
    pub fn with_embedding(mut self, field: impl Into<String>, embedding: Embedding) -> Self {
        self.embeddings.insert(field.into(), embedding);
        self
    }

    /// Values of a categorical group; empty if the group is absent.
    #[must_use]
    pub fn tag_values(&self, group: &str) -> &[String] {
        self.tags.get(group).map_or(&[], Vec::as_slice)
    }
}

// ---------------------------------------------------------------------------
// Rating scale
// ---------------------------------------------------------------------------

/// The feasible rating grid: `{min, min + step, …, max}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingScale {
    /// Smallest rating an item can receive.
    pub min: f64,
    /// Largest rating an item can receive.
    pub max: f64,
    /// Grid spacing.
    pub step: f64,
}

impl Default for RatingScale {
    fn default() -> Self {
        Self {
            min: 1.0,
            max: 10.0,
            step: 1.0,
        }
    }
}

impl RatingScale {
    /// Project onto the nearest multiple of `step` (ties to even), then clamp to `[min, max]`.
    #[must_use]
    pub fn snap_nearest(&self, value: f64) -> f64 {
        ((value / self.step).round_ties_even() * self.step).clamp(self.min, self.max)
    }

    /// Floor to a multiple of `step`, then clamp to `[0, max]`.
    ///
    /// Shaped rewards may legitimately fall below `min` down to zero.
    #[must_use]
    pub fn snap_floor(&self, value: f64) -> f64 {
        ((value / self.step).floor() * self.step).clamp(0.0, self.max)
    }

    /// Whether `value` lies in `[min, max]`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

// ---------------------------------------------------------------------------
// Context and observations
// ---------------------------------------------------------------------------

/// A previously consumed item paired with the user's latest interaction with it.
///
/// Retrieval returns these pairs whole, so items and interactions can never
/// fall out of step with one another.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextEntry {
    /// The consumed item.
    pub item: Arc<Item>,
    /// The most recent interaction with it.
    pub interaction: InteractionRecord,
}

/// What the agent sees after `reset` and after every `step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Current user.
    pub user_id: UserId,
    /// Display name of the current user.
    pub user_name: String,
    /// Gender of the current user.
    pub user_gender: Gender,
    /// Age of the current user.
    pub user_age: u32,
    /// Free-text description of the current user.
    pub user_description: String,
    /// `(action, rating)` of the watched item of every step so far, in step
    /// order. The rating is the perturbed one stored in memory.
    pub interactions: Vec<(usize, f64)>,
}

impl Observation {
    /// Observation of `user` with the given episode interactions.
    #[must_use]
    pub fn new(user: &User, interactions: Vec<(usize, f64)>) -> Self {
        Self {
            user_id: user.id,
            user_name: user.name.clone(),
            user_gender: user.gender,
            user_age: user.age,
            user_description: user.description.clone(),
            interactions,
        }
    }
}

// ---------------------------------------------------------------------------
// Retrieval Score
// ---------------------------------------------------------------------------

/// Totally ordered similarity score used to rank history during retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RetrievalScore(pub OrderedFloat<f64>);

impl RetrievalScore {
    /// Create a retrieval score from a raw f64.
    #[must_use]
    pub fn new(score: f64) -> Self {
        Self(OrderedFloat(score))
    }

    /// Get the raw score value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0.into_inner()
    }
}
