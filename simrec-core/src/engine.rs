//! The episodic simulation engine.
//!
//! One step runs the full pipeline:
//!
//! ```text
//! action(s) → items → user history → retrieval → oracle → selection
//!           → perturbation → memory update → reward shaping → stop draw
//! ```
//!
//! The engine owns its memory, its policies and every random stream, so a
//! fixed seed and a deterministic oracle reproduce an episode bit for bit.

use std::collections::HashSet;
use std::sync::Arc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{EpisodeConfig, SimConfig};
use crate::error::{Result, SimError};
use crate::index::ActionItemIndex;
use crate::loader::{ItemsLoader, UsersLoader};
use crate::memory::InteractionMemory;
use crate::oracle::{OracleError, RatingOracle, RatingRequest};
use crate::perturbation::{self, PerturbationPolicy};
use crate::render::{self, RenderFrame, RenderSink};
use crate::retrieval::{self, RetrievalPolicy};
use crate::rng::{self, RngStream};
use crate::selection::{self, Candidate, SelectionPolicy};
use crate::shaping::{self, RewardShaper};
use crate::types::{ContextEntry, Item, ItemId, Observation, RatingScale, User, UserId};

// ---------------------------------------------------------------------------
// Public step types
// ---------------------------------------------------------------------------

/// Lifecycle of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Constructed, never reset.
    Idle,
    /// An episode is running; `step` is allowed.
    Active,
    /// The last step terminated or truncated the episode.
    Finished,
}

/// Diagnostics of one step, always carrying the oracle's raw answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// The watched item.
    pub item_id: ItemId,
    /// The oracle's rating of the watched item as returned, before clamping,
    /// selection and noise.
    pub oracle_rating: f64,
    /// The oracle's explanation of that rating.
    pub explanation: String,
    /// Raw oracle output for the watched item.
    pub trace: String,
    /// Watch count of the watched item, this step included.
    pub watch_count: u32,
    /// Seed forwarded to the oracle for the watched item.
    pub oracle_seed: u64,
    /// Whether the oracle output for the watched item could not be parsed.
    pub parse_failure: bool,
    /// Whether the reward shaper asked to end the episode.
    pub forced_termination: bool,
    /// `(action, oracle rating)` of every slate candidate, in slate order.
    pub slate: Vec<(usize, f64)>,
}

/// Everything `step` returns.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    /// Observation after the step.
    pub observation: Observation,
    /// Shaped reward.
    pub reward: f64,
    /// The episode ended naturally (stop draw, shaper or evaluation budget).
    pub terminated: bool,
    /// The episode hit `max_episode_steps`.
    pub truncated: bool,
    /// Step diagnostics.
    pub info: StepInfo,
}

/// Running counters over the engine's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Completed `reset` calls.
    pub episodes: u64,
    /// Completed `step` calls.
    pub steps: u64,
    /// Oracle queries issued.
    pub oracle_queries: u64,
    /// Oracle answers recovered as rating 0.
    pub parse_failures: u64,
    /// Steps the reward shaper asked to terminate.
    pub forced_terminations: u64,
    /// Stop draws that came up true.
    pub stop_draws: u64,
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// The pluggable parts of the step pipeline.
#[derive(Debug)]
pub struct Policies {
    /// History retrieval.
    pub retrieval: Box<dyn RetrievalPolicy>,
    /// Watched-item selection.
    pub selection: Box<dyn SelectionPolicy>,
    /// Rating noise.
    pub perturbation: Box<dyn PerturbationPolicy>,
    /// Reward shaping.
    pub shaping: Box<dyn RewardShaper>,
    /// Render target.
    pub render: Box<dyn RenderSink>,
}

impl Policies {
    /// Build every policy named in `config`, seeded with `general.seed`.
    ///
    /// # Errors
    /// `Config` if a policy rejects its parameters.
    pub fn from_config(config: &SimConfig) -> Result<Self> {
        let seed = config.general.seed;
        Ok(Self {
            retrieval: retrieval::build(&config.retrieval)?,
            selection: selection::build(&config.selection),
            perturbation: perturbation::build(&config.perturbation, config.rating, seed)?,
            shaping: shaping::build(&config.shaping, config.rating, seed),
            render: render::build(&config.render),
        })
    }

    fn reseed(&mut self, seed: u64) {
        self.perturbation.reseed(seed);
        self.shaping.reseed(seed);
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Oracle answer for one slate candidate after sanitizing.
#[derive(Debug, Clone)]
struct Queried {
    action: usize,
    rating: f64,
    raw_rating: f64,
    explanation: String,
    trace: String,
    seed: u64,
    parse_failure: bool,
}

/// Seeded user/item interaction simulator.
pub struct SimulationEngine<O> {
    episode: EpisodeConfig,
    scale: RatingScale,
    users: Vec<User>,
    items: Vec<Arc<Item>>,
    index: ActionItemIndex,
    memory: InteractionMemory,
    policies: Policies,
    oracle: O,

    episode_rng: ChaCha8Rng,
    termination_rng: ChaCha8Rng,
    oracle_seed: u64,

    phase: Phase,
    user: Option<UserId>,
    interactions: Vec<(usize, f64)>,
    latest: Option<(usize, f64)>,
    steps_in_episode: usize,
    evaluation_cursor: usize,
    stats: EngineStats,
}

impl<O: RatingOracle> SimulationEngine<O> {
    /// Build an engine with the policies named in `config`.
    ///
    /// # Errors
    /// Invalid configuration, an empty or inconsistent catalog, or no users.
    pub fn new(
        config: &SimConfig,
        items: &dyn ItemsLoader,
        users: &dyn UsersLoader,
        oracle: O,
    ) -> Result<Self> {
        config.validate()?;
        let policies = Policies::from_config(config)?;
        Self::with_policies(config, items, users, oracle, policies)
    }

    /// Build an engine with caller-supplied policies. Only the `general`,
    /// `episode` and `rating` sections of `config` are read.
    ///
    /// # Errors
    /// Invalid configuration, an empty or inconsistent catalog, or no users.
    pub fn with_policies(
        config: &SimConfig,
        items: &dyn ItemsLoader,
        users: &dyn UsersLoader,
        oracle: O,
        policies: Policies,
    ) -> Result<Self> {
        config.validate()?;

        let index = ActionItemIndex::new(items.load_all_ids()?)?;
        let loaded = items.load_items_from_ids(index.items())?;
        if loaded.len() != index.len() {
            return Err(SimError::Config(format!(
                "items loader returned {} items for {} ids",
                loaded.len(),
                index.len()
            )));
        }
        for (expected, item) in index.items().iter().zip(&loaded) {
            if &item.id != expected {
                return Err(SimError::UnknownItem(expected.clone()));
            }
        }

        let users: Vec<User> = users
            .get_users()?
            .into_iter()
            .zip(0_u32..)
            .map(|(mut user, id)| {
                user.id = UserId(id);
                user
            })
            .collect();
        if users.is_empty() {
            return Err(SimError::NoUsers);
        }

        let seed = config.general.seed;
        info!(
            items = index.len(),
            users = users.len(),
            seed,
            evaluation = config.episode.evaluation,
            "Simulation engine ready"
        );

        Ok(Self {
            episode: config.episode.clone(),
            scale: config.rating,
            users,
            items: loaded,
            index,
            memory: InteractionMemory::new(),
            policies,
            oracle,
            episode_rng: rng::seeded(seed, RngStream::Episode),
            termination_rng: rng::seeded(seed, RngStream::Termination),
            oracle_seed: seed,
            phase: Phase::Idle,
            user: None,
            interactions: Vec::new(),
            latest: None,
            steps_in_episode: 0,
            evaluation_cursor: 0,
            stats: EngineStats::default(),
        })
    }

    /// Start a new episode.
    ///
    /// With `seed`, every random stream is restarted from it and the oracle
    /// seed counter is set to it. The user is `user_id` if given, else the
    /// next user in round-robin order in evaluation mode, else a uniform
    /// draw. Memory is wiped.
    ///
    /// # Errors
    /// `InvalidUserId` when `user_id` is out of range.
    pub fn reset(&mut self, seed: Option<u64>, user_id: Option<UserId>) -> Result<Observation> {
        if let Some(seed) = seed {
            self.episode_rng = rng::seeded(seed, RngStream::Episode);
            self.termination_rng = rng::seeded(seed, RngStream::Termination);
            self.policies.reseed(seed);
            self.oracle_seed = seed;
        }

        let num_users = self.users.len();
        let user_id = match user_id {
            Some(id) if id.index() < num_users => {
                if self.episode.evaluation {
                    self.evaluation_cursor = id.index() + 1;
                }
                id
            }
            Some(id) => {
                return Err(SimError::InvalidUserId {
                    user_id: id,
                    num_users,
                });
            }
            None if self.episode.evaluation => {
                let id = self.evaluation_cursor % num_users;
                self.evaluation_cursor = id + 1;
                self.users[id].id
            }
            None => self.users[self.episode_rng.gen_range(0..num_users)].id,
        };

        self.memory.clear();
        self.interactions.clear();
        self.latest = None;
        self.steps_in_episode = 0;
        self.user = Some(user_id);
        self.phase = Phase::Active;
        self.stats.episodes += 1;

        info!(user = %user_id, seed = ?seed, episode = self.stats.episodes, "Episode reset");
        Ok(self.observation(user_id))
    }

    /// Recommend the item behind `action`.
    ///
    /// # Errors
    /// See [`Self::step_slate`].
    pub fn step(&mut self, action: usize) -> Result<StepOutcome> {
        self.step_slate(&[action])
    }

    /// Recommend several items at once; the selection policy decides which
    /// one the user watches.
    ///
    /// Every candidate is rated by its own oracle query, each with the next
    /// oracle seed. A transport failure aborts the step after the seeds of
    /// the queries already issued have been consumed.
    ///
    /// # Errors
    /// `EpisodeNotActive`, `EmptySlate`, `DuplicateAction`, `InvalidAction`,
    /// or `OracleTransport`.
    pub fn step_slate(&mut self, actions: &[usize]) -> Result<StepOutcome> {
        if self.phase != Phase::Active {
            return Err(SimError::EpisodeNotActive);
        }
        let user_id = self.user.ok_or(SimError::EpisodeNotActive)?;
        if actions.is_empty() {
            return Err(SimError::EmptySlate);
        }
        let mut seen = HashSet::with_capacity(actions.len());
        for &action in actions {
            self.index.item(action)?;
            if !seen.insert(action) {
                return Err(SimError::DuplicateAction(action));
            }
        }

        let history = self.context_for(user_id);
        let user = &self.users[user_id.index()];

        let mut queried = Vec::with_capacity(actions.len());
        let mut candidates = Vec::with_capacity(actions.len());
        for &action in actions {
            let item = Arc::clone(&self.items[action]);
            let context = self.policies.retrieval.retrieve(&item, &history);
            let request = RatingRequest {
                user,
                item: &item,
                watch_count: self.memory.num_times_watched(user_id, &item.id),
                context: &context,
                seed: self.oracle_seed,
            };
            self.oracle_seed = self.oracle_seed.wrapping_add(1);
            self.stats.oracle_queries += 1;

            let answer = query_oracle(&mut self.oracle, &self.scale, &request, action)?;
            if answer.parse_failure {
                self.stats.parse_failures += 1;
            }
            candidates.push(Candidate {
                action,
                item,
                rating: answer.rating,
            });
            queried.push(answer);
        }

        let selection = self.policies.selection.select(candidates)?;
        let mut ratings: Vec<f64> = selection.candidates.iter().map(|c| c.rating).collect();
        self.policies.perturbation.perturb(&mut ratings);

        let watched = selection.watched();
        let watched_rating = ratings[selection.watched];
        self.memory.update(
            user_id,
            std::slice::from_ref(&watched.item.id),
            &[watched_rating],
        )?;

        let reward: f64 = ratings.iter().sum();
        let records = self.memory.records(user_id, &watched.item.id);
        let shaped = self.policies.shaping.reshape(records, reward);

        let stop = self.termination_rng.gen_bool(self.episode.stop_probability);
        self.steps_in_episode += 1;
        self.stats.steps += 1;
        if stop {
            self.stats.stop_draws += 1;
        }
        if shaped.terminate {
            self.stats.forced_terminations += 1;
        }

        let terminated = if self.episode.evaluation {
            self.steps_in_episode >= self.episode.evaluation_budget
        } else {
            stop || shaped.terminate
        };
        let truncated = self
            .episode
            .max_episode_steps
            .is_some_and(|max| self.steps_in_episode >= max);
        if terminated || truncated {
            self.phase = Phase::Finished;
        }

        self.interactions.push((watched.action, watched_rating));
        self.latest = Some((watched.action, watched_rating));

        let answer = queried
            .iter()
            .find(|q| q.action == watched.action)
            .cloned()
            .ok_or(SimError::InvalidAction {
                action: watched.action,
                num_items: self.index.len(),
            })?;
        let watch_count = self.memory.num_times_watched(user_id, &watched.item.id);

        debug!(
            user = %user_id,
            action = watched.action,
            item = %watched.item.id,
            oracle_rating = answer.raw_rating,
            rating = watched_rating,
            reward = shaped.reward,
            watch_count,
            terminated,
            truncated,
            "Step"
        );

        Ok(StepOutcome {
            observation: self.observation(user_id),
            reward: shaped.reward,
            terminated,
            truncated,
            info: StepInfo {
                item_id: watched.item.id.clone(),
                oracle_rating: answer.raw_rating,
                explanation: answer.explanation,
                trace: answer.trace,
                watch_count,
                oracle_seed: answer.seed,
                parse_failure: answer.parse_failure,
                forced_termination: shaped.terminate,
                slate: queried.iter().map(|q| (q.action, q.rating)).collect(),
            },
        })
    }

    /// Emit the current episode state to the configured render sink.
    /// Does nothing before the first `reset`.
    ///
    /// # Errors
    /// I/O failures of the sink.
    pub fn render(&mut self) -> Result<()> {
        let Some(user_id) = self.user else {
            return Ok(());
        };
        let latest = match self.latest {
            Some((action, rating)) => Some((action, self.index.item(action)?, rating)),
            None => None,
        };
        let frame = RenderFrame {
            user: &self.users[user_id.index()],
            interactions: &self.interactions,
            latest,
        };
        self.policies.render.render(&frame)
    }

    /// Forget every interaction of `user_id` with the item behind `action`.
    ///
    /// # Errors
    /// `InvalidAction` for a bad action, `UnknownInteraction` if nothing is recorded.
    pub fn delete_user_item(&mut self, user_id: UserId, action: usize) -> Result<()> {
        let item_id = self.index.item(action)?;
        self.memory.delete(user_id, item_id)
    }

    /// Forget only the latest interaction of `user_id` with the item behind `action`.
    ///
    /// # Errors
    /// `InvalidAction` for a bad action, `UnknownInteraction` if nothing is recorded.
    pub fn delete_last_user_item(&mut self, user_id: UserId, action: usize) -> Result<()> {
        let item_id = self.index.item(action)?;
        self.memory.delete_last(user_id, item_id)
    }

    /// Size of the action space.
    #[must_use]
    pub fn num_items(&self) -> usize {
        self.index.len()
    }

    /// Number of loaded users.
    #[must_use]
    pub fn num_users(&self) -> usize {
        self.users.len()
    }

    /// All users, indexed by id.
    #[must_use]
    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// The user of the current (or last) episode.
    #[must_use]
    pub fn current_user(&self) -> Option<&User> {
        self.user.map(|id| &self.users[id.index()])
    }

    /// The item behind `action`.
    ///
    /// # Errors
    /// `InvalidAction` when out of range.
    pub fn item(&self, action: usize) -> Result<&Arc<Item>> {
        self.items.get(action).ok_or(SimError::InvalidAction {
            action,
            num_items: self.items.len(),
        })
    }

    /// The interaction memory.
    #[must_use]
    pub fn memory(&self) -> &InteractionMemory {
        &self.memory
    }

    /// The action ↔ item index.
    #[must_use]
    pub fn index(&self) -> &ActionItemIndex {
        &self.index
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// The rating grid.
    #[must_use]
    pub fn scale(&self) -> RatingScale {
        self.scale
    }

    /// The rating oracle.
    pub fn oracle_mut(&mut self) -> &mut O {
        &mut self.oracle
    }

    fn observation(&self, user_id: UserId) -> Observation {
        Observation::new(&self.users[user_id.index()], self.interactions.clone())
    }

    /// The user's current-state history, paired with catalog items.
    fn context_for(&self, user_id: UserId) -> Vec<ContextEntry> {
        self.memory
            .get_history(user_id)
            .into_iter()
            .filter_map(|(item_id, interaction)| {
                self.index.action(&item_id).map(|action| ContextEntry {
                    item: Arc::clone(&self.items[action]),
                    interaction,
                })
            })
            .collect()
    }
}

/// Query the oracle and normalize its answer onto the rating grid.
///
/// Parse failures and non-finite ratings become 0; out-of-range non-zero
/// ratings are clamped.
fn query_oracle<O: RatingOracle>(
    oracle: &mut O,
    scale: &RatingScale,
    request: &RatingRequest<'_>,
    action: usize,
) -> Result<Queried> {
    let recovered = |explanation: String, trace: String| Queried {
        action,
        rating: 0.0,
        raw_rating: 0.0,
        explanation,
        trace,
        seed: request.seed,
        parse_failure: true,
    };

    match oracle.query(request) {
        Ok(response) if !response.rating.is_finite() => {
            warn!(
                item = %request.item.id,
                rating = response.rating,
                "Oracle returned a non-finite rating; recording 0"
            );
            Ok(recovered(response.explanation, response.trace))
        }
        Ok(response) => {
            let mut rating = response.rating;
            if rating != 0.0 && !scale.contains(rating) {
                warn!(
                    item = %request.item.id,
                    rating,
                    min = scale.min,
                    max = scale.max,
                    "Oracle rating out of range; clamping"
                );
                rating = rating.clamp(scale.min, scale.max);
            }
            Ok(Queried {
                action,
                rating,
                raw_rating: response.rating,
                explanation: response.explanation,
                trace: response.trace,
                seed: request.seed,
                parse_failure: false,
            })
        }
        Err(OracleError::Parse(message)) => {
            warn!(item = %request.item.id, %message, "Unparseable oracle output; recording 0");
            Ok(recovered(String::new(), message))
        }
        Err(OracleError::Transport(message)) => Err(SimError::OracleTransport(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{InMemoryCatalog, UserList};
    use crate::oracle::OracleResponse;
    use crate::types::Gender;

    type Oracle = fn(&RatingRequest<'_>) -> std::result::Result<OracleResponse, OracleError>;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new([
            Item::new(862_u64, "Toy Story").with_popularity(20.0),
            Item::new(8844_u64, "Jumanji").with_popularity(15.0),
            Item::new(15602_u64, "Grumpier Old Men").with_popularity(5.0),
        ])
        .expect("catalog")
    }

    fn users() -> UserList {
        UserList::new(vec![
            User::new("Ann", Gender::Female, 34, "Loves animation."),
            User::new("Bo", Gender::Male, 61, "Prefers comedies."),
        ])
    }

    fn seven(_: &RatingRequest<'_>) -> std::result::Result<OracleResponse, OracleError> {
        Ok(OracleResponse::rating(7.0))
    }

    fn engine(config: &SimConfig, oracle: Oracle) -> SimulationEngine<Oracle> {
        SimulationEngine::new(config, &catalog(), &users(), oracle).expect("engine")
    }

    fn no_stop() -> SimConfig {
        let mut config = SimConfig::default();
        config.episode.stop_probability = 0.0;
        config
    }

    #[test]
    fn step_before_reset_is_rejected() {
        let mut engine = engine(&SimConfig::default(), seven);
        assert_eq!(engine.phase(), Phase::Idle);
        assert!(matches!(engine.step(0), Err(SimError::EpisodeNotActive)));
    }

    #[test]
    fn explicit_user_is_used_and_validated() {
        let mut engine = engine(&SimConfig::default(), seven);
        let obs = engine.reset(Some(1), Some(UserId(1))).expect("reset");
        assert_eq!(obs.user_name, "Bo");
        assert!(obs.interactions.is_empty());
        assert!(matches!(
            engine.reset(None, Some(UserId(2))),
            Err(SimError::InvalidUserId { num_users: 2, .. })
        ));
    }

    #[test]
    fn step_records_watch_and_observation() {
        let mut engine = engine(&no_stop(), seven);
        engine.reset(Some(42), Some(UserId(0))).expect("reset");
        let outcome = engine.step(2).expect("step");
        assert!((outcome.reward - 7.0).abs() < f64::EPSILON);
        assert_eq!(outcome.observation.interactions, vec![(2, 7.0)]);
        assert_eq!(outcome.info.item_id, ItemId::from(15602_u64));
        assert_eq!(outcome.info.watch_count, 1);
        assert_eq!(outcome.info.oracle_seed, 42);
        assert_eq!(
            engine.memory().num_times_watched(UserId(0), &ItemId::from(15602_u64)),
            1
        );
    }

    #[test]
    fn repeat_watch_decays_reward() {
        let mut engine = engine(&no_stop(), seven);
        engine.reset(Some(42), Some(UserId(0))).expect("reset");
        engine.step(0).expect("first");
        let outcome = engine.step(0).expect("second");
        // 7 · 0.1^(2/1) = 0.07 → 0
        assert!(outcome.reward.abs() < f64::EPSILON);
        assert_eq!(outcome.info.watch_count, 2);
        assert!((outcome.info.oracle_rating - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn invalid_actions_are_rejected() {
        let mut engine = engine(&no_stop(), seven);
        engine.reset(Some(1), None).expect("reset");
        assert!(matches!(
            engine.step(3),
            Err(SimError::InvalidAction { .. })
        ));
        assert!(matches!(engine.step_slate(&[]), Err(SimError::EmptySlate)));
        assert!(matches!(
            engine.step_slate(&[1, 1]),
            Err(SimError::DuplicateAction(1))
        ));
        assert_eq!(engine.stats().oracle_queries, 0);
    }

    #[test]
    fn slate_watches_one_item_and_advances_oracle_seed_per_query() {
        let mut engine = engine(&no_stop(), seven);
        engine.reset(Some(100), Some(UserId(0))).expect("reset");
        let outcome = engine.step_slate(&[2, 1, 0]).expect("slate");
        // Equal ratings: the most popular item (action 0) wins.
        assert_eq!(outcome.observation.interactions, vec![(0, 7.0)]);
        assert_eq!(outcome.info.oracle_seed, 102);
        assert_eq!(outcome.info.slate, vec![(2, 7.0), (1, 7.0), (0, 7.0)]);
        assert_eq!(engine.memory().num_items(UserId(0)), 1);
        assert_eq!(engine.stats().oracle_queries, 3);
    }

    #[test]
    fn parse_failure_records_zero() {
        fn broken(_: &RatingRequest<'_>) -> std::result::Result<OracleResponse, OracleError> {
            Err(OracleError::Parse("no digits in answer".into()))
        }
        let mut engine = engine(&no_stop(), broken);
        engine.reset(Some(1), Some(UserId(0))).expect("reset");
        let outcome = engine.step(1).expect("step");
        assert!(outcome.info.parse_failure);
        assert!(outcome.reward.abs() < f64::EPSILON);
        assert_eq!(outcome.observation.interactions, vec![(1, 0.0)]);
        assert_eq!(engine.stats().parse_failures, 1);
    }

    #[test]
    fn out_of_range_rating_is_clamped() {
        fn loud(_: &RatingRequest<'_>) -> std::result::Result<OracleResponse, OracleError> {
            Ok(OracleResponse::rating(42.0))
        }
        let mut engine = engine(&no_stop(), loud);
        engine.reset(Some(1), Some(UserId(0))).expect("reset");
        let outcome = engine.step(0).expect("step");
        assert!((outcome.reward - 10.0).abs() < f64::EPSILON);
        assert_eq!(outcome.observation.interactions, vec![(0, 10.0)]);
        assert!((outcome.info.oracle_rating - 42.0).abs() < f64::EPSILON);
        assert!(!outcome.info.parse_failure);
    }

    #[test]
    fn transport_failure_is_fatal() {
        fn offline(_: &RatingRequest<'_>) -> std::result::Result<OracleResponse, OracleError> {
            Err(OracleError::Transport("connection refused".into()))
        }
        let mut engine = engine(&no_stop(), offline);
        engine.reset(Some(1), Some(UserId(0))).expect("reset");
        assert!(matches!(engine.step(0), Err(SimError::OracleTransport(_))));
        assert_eq!(engine.memory().num_items(UserId(0)), 0);
    }

    #[test]
    fn evaluation_mode_cycles_users_with_fixed_budget() {
        let mut config = SimConfig::default();
        config.episode.evaluation = true;
        config.episode.stop_probability = 1.0;
        let mut engine = engine(&config, seven);

        for expected_user in [0, 1, 0] {
            let obs = engine.reset(None, None).expect("reset");
            assert_eq!(obs.user_id, UserId(expected_user));
            for step in 1..=11 {
                let outcome = engine.step(step % 3).expect("step");
                assert_eq!(outcome.terminated, step == 11);
            }
            assert_eq!(engine.phase(), Phase::Finished);
            assert!(matches!(engine.step(0), Err(SimError::EpisodeNotActive)));
        }
    }

    #[test]
    fn explicit_user_moves_the_evaluation_cursor() {
        let mut config = SimConfig::default();
        config.episode.evaluation = true;
        config.episode.stop_probability = 1.0;
        let mut engine = engine(&config, seven);

        engine.reset(None, Some(UserId(0))).expect("explicit");
        engine.step(0).expect("step");
        let next = engine.reset(None, None).expect("cycled");
        assert_eq!(next.user_id, UserId(1));
        let wrapped = engine.reset(None, None).expect("wrapped");
        assert_eq!(wrapped.user_id, UserId(0));
    }

    #[test]
    fn max_episode_steps_truncates() {
        let mut config = no_stop();
        config.episode.max_episode_steps = Some(2);
        let mut engine = engine(&config, seven);
        engine.reset(Some(3), None).expect("reset");
        assert!(!engine.step(0).expect("first").truncated);
        let last = engine.step(1).expect("second");
        assert!(last.truncated);
        assert!(!last.terminated);
        assert_eq!(engine.phase(), Phase::Finished);
    }

    #[test]
    fn reset_wipes_memory() {
        let mut engine = engine(&no_stop(), seven);
        engine.reset(Some(1), Some(UserId(0))).expect("reset");
        engine.step(0).expect("step");
        engine.reset(None, Some(UserId(0))).expect("reset");
        assert_eq!(engine.memory().num_items(UserId(0)), 0);
        assert_eq!(engine.stats().episodes, 2);
    }

    #[test]
    fn deletes_map_actions_to_items() {
        let mut engine = engine(&no_stop(), seven);
        engine.reset(Some(1), Some(UserId(0))).expect("reset");
        engine.step(1).expect("step");
        engine.step(1).expect("step");

        engine.delete_last_user_item(UserId(0), 1).expect("delete last");
        assert_eq!(
            engine.memory().num_times_watched(UserId(0), &ItemId::from(8844_u64)),
            1
        );
        engine.delete_user_item(UserId(0), 1).expect("delete");
        assert!(matches!(
            engine.delete_user_item(UserId(0), 1),
            Err(SimError::UnknownInteraction { .. })
        ));
        assert!(matches!(
            engine.delete_user_item(UserId(0), 9),
            Err(SimError::InvalidAction { .. })
        ));
    }

    #[test]
    fn empty_user_list_is_rejected() {
        let result = SimulationEngine::new(
            &SimConfig::default(),
            &catalog(),
            &UserList::new(Vec::new()),
            seven as Oracle,
        );
        assert!(matches!(result, Err(SimError::NoUsers)));
    }
}
