//! Prompt templates for the third-person descriptive rater.
//!
//! The rater describes the user in the third person, lists what the user
//! has rated before, describes the item and then asks the model to complete
//! an assistant answer that stops right where the rating goes. Every
//! template is a plain string with `{key}` placeholders, so alternative
//! wordings can be loaded from a TOML file without recompiling.

use std::path::Path;

use serde::{Deserialize, Serialize};

use simrec_core::{ContextEntry, Gender, Item, RatingRequest, User};

use crate::config::PromptConfig;
use crate::error::LlmError;
use crate::types::ChatMessage;

/// Version tag of the built-in templates.
pub const TEMPLATE_VERSION: &str = "1.0";

/// System prompt shared by every query.
pub const RATER_SYSTEM: &str = r"You are a highly sophisticated {noun} rating assistant with a deep understanding of human behavior.
You predict how a specific person would rate a specific {noun}, taking into account who they are, what they liked and disliked before and what the {noun} offers.
Base your answer only on the information you are given, reason carefully and answer with a single rating.";

/// Who the user is.
pub const RATER_PERSONA: &str = "{name} is a {age} years old {person}, {pronoun} {is} {description}";

/// What the user rated before; omitted when the context is empty.
pub const RATER_HISTORY: &str = "{name} has previously {verb_past} the following {noun}s (in parentheses are the ratings {pronoun} gave on a scale of {range}): {history}.";

/// The item and the question.
pub const RATER_QUESTION: &str = r#"Consider the {noun} "{title}", which is described as follows: {overview}{features} {name} {verb} the {noun} "{title}" for the {ordinal} time.
What can you conclude about {name}'s rating for the {noun} "{title}" on a scale of {range}, where {low} represents a low rating and {high} represents a high rating, based on available information and logical reasoning?"#;

/// Assistant prefix the model continues with the rating.
pub const RATER_ASSISTANT_START: &str =
    "Based on {name}'s preferences and tastes, I conclude that {pronoun} will assign a rating of ";

/// Appended after the parsed rating to ask for a justification.
pub const RATER_EXPLANATION_START: &str = "{rating} on a scale of {range}, because ";

/// Names used by the few-shot examples. A user sharing one is renamed.
pub const FEW_SHOT_NAMES: [&str; 2] = ["Alex", "Nicholas"];

/// Replacement first name for users colliding with [`FEW_SHOT_NAMES`].
pub const RENAMED_USER: &str = "Michael";

const RATING_WORDS: [&str; 11] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten",
];

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

/// English ordinal of `n`: `1st`, `2nd`, `3rd`, `4th`, `11th`, `21st`, …
#[must_use]
pub fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// Number word for `0..=10`.
#[must_use]
pub fn rating_word(value: usize) -> Option<&'static str> {
    RATING_WORDS.get(value).copied()
}

// ---------------------------------------------------------------------------
// Scales
// ---------------------------------------------------------------------------

/// The scale the model is asked to answer on.
///
/// The engine always works on `1..=10`; `0-9` prompts shift every number the
/// model sees down by one and its answer back up by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PromptScale {
    /// Digits `0` to `9`.
    #[serde(rename = "0-9")]
    ZeroNine,
    /// Numbers `1` to `10`.
    #[default]
    #[serde(rename = "1-10")]
    OneTen,
    /// Words `one` to `ten`.
    #[serde(rename = "one-ten")]
    OneTenWords,
}

impl PromptScale {
    /// Offset between the engine's rating and the number shown to the model.
    #[must_use]
    pub fn shift(self) -> f64 {
        match self {
            Self::ZeroNine => 1.0,
            Self::OneTen | Self::OneTenWords => 0.0,
        }
    }

    /// Lowest and highest answer, as written in the prompt.
    #[must_use]
    pub fn bounds(self) -> (&'static str, &'static str) {
        match self {
            Self::ZeroNine => ("0", "9"),
            Self::OneTen => ("1", "10"),
            Self::OneTenWords => ("one", "ten"),
        }
    }

    /// `"0 to 9"`, `"1 to 10"` or `"one to ten"`.
    #[must_use]
    pub fn range_text(self) -> String {
        let (low, high) = self.bounds();
        format!("{low} to {high}")
    }

    /// An engine rating as the model should see it.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn format_rating(self, rating: f64) -> String {
        let shown = (rating - self.shift()).round().max(0.0);
        match self {
            Self::OneTenWords => rating_word(shown as usize)
                .map_or_else(|| format!("{shown:.0}"), str::to_string),
            Self::ZeroNine | Self::OneTen => format!("{shown:.0}"),
        }
    }

    /// A crowd average, one decimal, shifted like ratings.
    #[must_use]
    pub fn format_average(self, average: f64) -> String {
        format!("{:.1}", (average - self.shift()).max(0.0))
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// The set of templates one rater uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplates {
    /// Template version, reported in traces.
    pub version: String,
    /// System prompt.
    pub system: String,
    /// User description.
    pub persona: String,
    /// Previously rated items.
    pub history: String,
    /// Item description and question.
    pub question: String,
    /// Assistant prefix ending right before the rating.
    pub assistant_start: String,
    /// Continuation after the rating that asks for a reason.
    pub explanation_start: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::builtin()
    }
}

/// TOML layout: `[prompt]` holding the template fields.
#[derive(Debug, Serialize, Deserialize)]
struct TomlPromptFile {
    prompt: PromptTemplates,
}

impl PromptTemplates {
    /// The compiled-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            version: TEMPLATE_VERSION.into(),
            system: RATER_SYSTEM.into(),
            persona: RATER_PERSONA.into(),
            history: RATER_HISTORY.into(),
            question: RATER_QUESTION.into(),
            assistant_start: RATER_ASSISTANT_START.into(),
            explanation_start: RATER_EXPLANATION_START.into(),
        }
    }

    /// Load templates from a TOML file with a `[prompt]` table.
    ///
    /// # Errors
    ///
    /// `ConfigError` if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, LlmError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LlmError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        let parsed: TomlPromptFile = toml::from_str(&content).map_err(|e| {
            LlmError::ConfigError(format!("failed to parse {}: {e}", path.display()))
        })?;
        Ok(parsed.prompt)
    }
}

// ---------------------------------------------------------------------------
// RatingPrompt
// ---------------------------------------------------------------------------

/// How the user is referred to inside a prompt.
struct Persona {
    name: String,
    person: &'static str,
    pronoun: &'static str,
    is: &'static str,
}

impl Persona {
    fn of(user: &User, rename: bool) -> Self {
        let first = user.name.split_whitespace().next().unwrap_or("The user");
        let name = if rename && FEW_SHOT_NAMES.contains(&first) {
            RENAMED_USER.to_string()
        } else {
            first.to_string()
        };
        let minor = user.age < 18;
        let (person, pronoun, is) = match user.gender {
            Gender::Male => (if minor { "boy" } else { "man" }, "he", "is"),
            Gender::Female => (if minor { "girl" } else { "woman" }, "she", "is"),
            Gender::Unspecified => (if minor { "child" } else { "person" }, "they", "are"),
        };
        Self {
            name,
            person,
            pronoun,
            is,
        }
    }
}

fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Builds the chat messages for rating and explanation queries.
#[derive(Debug, Clone)]
pub struct RatingPrompt {
    scale: PromptScale,
    few_shot: bool,
    item_noun: String,
    action_verb: String,
    action_verb_past: String,
    item_features: Vec<String>,
    templates: PromptTemplates,
}

impl Default for RatingPrompt {
    fn default() -> Self {
        Self::new(&PromptConfig::default(), PromptTemplates::builtin())
    }
}

impl RatingPrompt {
    /// Combine prompt settings with a template set.
    #[must_use]
    pub fn new(config: &PromptConfig, templates: PromptTemplates) -> Self {
        Self {
            scale: config.scale,
            few_shot: config.few_shot,
            item_noun: config.item_noun.clone(),
            action_verb: config.action_verb.clone(),
            action_verb_past: config.action_verb_past.clone(),
            item_features: config.item_features.clone(),
            templates,
        }
    }

    /// Settings plus the templates they point at (built-in when no path is set).
    ///
    /// # Errors
    ///
    /// `ConfigError` if a template file is named but cannot be loaded.
    pub fn from_config(config: &PromptConfig) -> Result<Self, LlmError> {
        let templates = match &config.templates_path {
            Some(path) => PromptTemplates::from_file(path)?,
            None => PromptTemplates::builtin(),
        };
        Ok(Self::new(config, templates))
    }

    /// The answer scale.
    #[must_use]
    pub fn scale(&self) -> PromptScale {
        self.scale
    }

    /// The template set in use.
    #[must_use]
    pub fn templates(&self) -> &PromptTemplates {
        &self.templates
    }

    /// Rendered system prompt.
    #[must_use]
    pub fn system(&self) -> String {
        render_template(&self.templates.system, &[("noun", &self.item_noun)])
    }

    /// The question about `item` and the assistant prefix to complete.
    #[must_use]
    pub fn question(
        &self,
        user: &User,
        item: &Item,
        watch_count: u32,
        context: &[ContextEntry],
    ) -> (String, String) {
        let persona = Persona::of(user, self.few_shot);
        let range = self.scale.range_text();
        let (low, high) = self.scale.bounds();
        let age = user.age.to_string();
        let description = lower_first(user.description.trim());

        let mut text = render_template(
            &self.templates.persona,
            &[
                ("name", &persona.name),
                ("age", &age),
                ("person", persona.person),
                ("pronoun", persona.pronoun),
                ("is", persona.is),
                ("description", &description),
            ],
        );
        text.push('\n');

        if !context.is_empty() {
            let history = context
                .iter()
                .map(|entry| {
                    format!(
                        "\"{}\" ({})",
                        entry.item.title,
                        self.scale.format_rating(entry.interaction.rating)
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
            text.push_str(&render_template(
                &self.templates.history,
                &[
                    ("name", &persona.name),
                    ("verb_past", &self.action_verb_past),
                    ("noun", &self.item_noun),
                    ("pronoun", persona.pronoun),
                    ("range", &range),
                    ("history", &history),
                ],
            ));
            text.push('\n');
        }

        let ordinal = ordinal(watch_count.saturating_add(1));
        let features = self.describe_features(item);
        text.push_str(&render_template(
            &self.templates.question,
            &[
                ("noun", &self.item_noun),
                ("title", &item.title),
                ("overview", &lower_first(item.description.trim())),
                ("features", &features),
                ("name", &persona.name),
                ("verb", &self.action_verb),
                ("ordinal", &ordinal),
                ("range", &range),
                ("low", low),
                ("high", high),
            ],
        ));

        let start = render_template(
            &self.templates.assistant_start,
            &[("name", &persona.name), ("pronoun", persona.pronoun)],
        );
        (text, start)
    }

    /// Sentences for the configured item features, each with a leading space.
    fn describe_features(&self, item: &Item) -> String {
        let mut out = String::new();
        for feature in &self.item_features {
            match feature.as_str() {
                "vote_average" => {
                    if item.vote_average > 0.0 {
                        out.push_str(&format!(
                            " On average, people rate the {} \"{}\" {} on a scale of {}.",
                            self.item_noun,
                            item.title,
                            self.scale.format_average(item.vote_average),
                            self.scale.range_text()
                        ));
                    }
                }
                group => {
                    let values = item.tag_values(group);
                    if !values.is_empty() {
                        out.push_str(&format!(
                            " The {} \"{}\" has the following {}: {}.",
                            self.item_noun,
                            item.title,
                            group.replace('_', " "),
                            values.join(", ")
                        ));
                    }
                }
            }
        }
        out
    }

    /// Full conversation for one rating query, ending with the assistant prefix.
    #[must_use]
    pub fn rating_messages(&self, request: &RatingRequest<'_>) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(self.system())];
        if self.few_shot {
            messages.extend(self.few_shot_messages());
        }
        let (question, start) = self.question(
            request.user,
            request.item,
            request.watch_count,
            request.context,
        );
        messages.push(ChatMessage::user(question));
        messages.push(ChatMessage::assistant(start));
        messages
    }

    /// Extend a rating conversation with the given rating and an open
    /// "because", so the model explains itself.
    #[must_use]
    pub fn explanation_messages(
        &self,
        mut messages: Vec<ChatMessage>,
        rating: f64,
    ) -> Vec<ChatMessage> {
        let shown = self.scale.format_rating(rating);
        let continuation = render_template(
            &self.templates.explanation_start,
            &[("rating", &shown), ("range", &self.scale.range_text())],
        );
        match messages.last_mut() {
            Some(last) if last.role == crate::types::Role::Assistant => {
                last.content.push_str(&continuation);
            }
            _ => messages.push(ChatMessage::assistant(continuation)),
        }
        messages
    }

    /// Worked question/answer pairs placed before the real question.
    #[must_use]
    pub fn few_shot_messages(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        for example in few_shot_examples() {
            let (question, start) = {
                // Examples keep their own names.
                let plain = Self {
                    few_shot: false,
                    ..self.clone()
                };
                plain.question(&example.user, &example.item, 0, &[])
            };
            let continuation = render_template(
                &self.templates.explanation_start,
                &[
                    ("rating", &self.scale.format_rating(example.rating)),
                    ("range", &self.scale.range_text()),
                ],
            );
            messages.push(ChatMessage::user(question));
            messages.push(ChatMessage::assistant(format!(
                "{start}{continuation}{}",
                example.reason
            )));
        }
        messages
    }
}

struct FewShotExample {
    user: User,
    item: Item,
    rating: f64,
    reason: &'static str,
}

fn few_shot_examples() -> Vec<FewShotExample> {
    vec![
        FewShotExample {
            user: User::new(
                FEW_SHOT_NAMES[0],
                Gender::Male,
                29,
                "a software engineer who spends his evenings on science fiction and strategy games, and finds romance plots dull.",
            ),
            item: Item::new("few-shot-1", "Interstellar")
                .with_description(
                    "A team of explorers travels through a wormhole in search of a new home for humanity.",
                )
                .with_tags("genres", ["Adventure", "Drama", "Science Fiction"])
                .with_vote_average(8.3),
            rating: 9.0,
            reason: "the film combines ambitious science fiction with a strong story, which matches his interests closely.",
        },
        FewShotExample {
            user: User::new(
                FEW_SHOT_NAMES[1],
                Gender::Male,
                67,
                "a retired postman who enjoys gentle comedies and period dramas, and dislikes loud action and violence.",
            ),
            item: Item::new("few-shot-2", "The Expendables")
                .with_description(
                    "A group of mercenaries is hired to overthrow a dictator on a remote island.",
                )
                .with_tags("genres", ["Action", "Adventure", "Thriller"])
                .with_vote_average(6.0),
            rating: 2.0,
            reason: "the film is built around loud action and violence, which he actively avoids.",
        },
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use simrec_core::InteractionRecord;

    use super::*;
    use crate::types::Role;

    fn user() -> User {
        User::new(
            "Ann Smith",
            Gender::Female,
            34,
            "Loves animated family films.",
        )
    }

    fn item() -> Item {
        Item::new(862_u64, "Toy Story")
            .with_description("Led by Woody, Andy's toys live happily in his room.")
            .with_tags("genres", ["Animation", "Comedy", "Family"])
            .with_vote_average(7.7)
    }

    fn context() -> Vec<ContextEntry> {
        vec![ContextEntry {
            item: Arc::new(Item::new(8844_u64, "Jumanji")),
            interaction: InteractionRecord {
                rating: 8.0,
                step_index: 1,
                watch_count: 1,
            },
        }]
    }

    #[test]
    fn ordinals_follow_english_rules() {
        let got: Vec<String> = [1, 2, 3, 4, 11, 12, 13, 21, 22, 101, 111]
            .into_iter()
            .map(ordinal)
            .collect();
        assert_eq!(
            got,
            [
                "1st", "2nd", "3rd", "4th", "11th", "12th", "13th", "21st", "22nd", "101st", "111th",
            ]
        );
    }

    #[test]
    fn zero_nine_shifts_shown_numbers() {
        assert_eq!(PromptScale::ZeroNine.format_rating(8.0), "7");
        assert_eq!(PromptScale::OneTen.format_rating(8.0), "8");
        assert_eq!(PromptScale::OneTenWords.format_rating(8.0), "eight");
        assert_eq!(PromptScale::ZeroNine.format_average(7.7), "6.7");
    }

    #[test]
    fn question_mentions_user_item_history_and_count() {
        let prompt = RatingPrompt::default();
        let (question, start) = prompt.question(&user(), &item(), 1, &context());
        assert!(
            question.starts_with("Ann is a 34 years old woman, she is loves animated")
        );
        assert!(question.contains("\"Jumanji\" (8)"));
        assert!(question.contains("for the 2nd time"));
        assert!(question.contains("Animation, Comedy, Family"));
        assert!(question.contains("led by Woody"));
        assert!(!question.contains('{'));
        assert_eq!(
            start,
            "Based on Ann's preferences and tastes, I conclude that she will assign a rating of "
        );
    }

    #[test]
    fn empty_context_omits_history_line() {
        let prompt = RatingPrompt::default();
        let (question, _) = prompt.question(&user(), &item(), 0, &[]);
        assert!(!question.contains("previously"));
        assert!(question.contains("for the 1st time"));
    }

    #[test]
    fn few_shot_renames_colliding_users() {
        let config = PromptConfig {
            few_shot: true,
            ..PromptConfig::default()
        };
        let prompt = RatingPrompt::new(&config, PromptTemplates::builtin());
        let alex = User::new("Alex Doe", Gender::Male, 15, "into skateboarding.");
        let (question, _) = prompt.question(&alex, &item(), 0, &[]);
        assert!(question.starts_with("Michael is a 15 years old boy, he is"));
    }

    #[test]
    fn rating_messages_end_with_assistant_prefix() {
        let config = PromptConfig {
            few_shot: true,
            ..PromptConfig::default()
        };
        let prompt = RatingPrompt::new(&config, PromptTemplates::builtin());
        let user = user();
        let item = item();
        let request = RatingRequest {
            user: &user,
            item: &item,
            watch_count: 0,
            context: &[],
            seed: 3,
        };
        let messages = prompt.rating_messages(&request);
        assert_eq!(messages.len(), 1 + 4 + 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[2].content.contains("Alex"));
        assert_eq!(messages.last().map(|m| m.role), Some(Role::Assistant));

        let explained = prompt.explanation_messages(messages, 9.0);
        let last = explained.last().expect("assistant");
        assert!(
            last.content.ends_with("assign a rating of 9 on a scale of 1 to 10, because ")
        );
    }

    #[test]
    fn templates_load_from_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rater.toml");
        let mut templates = PromptTemplates::builtin();
        templates.version = "2.0-test".into();
        templates.persona = "{name} ({age})".into();
        let file = toml::to_string(&TomlPromptFile { prompt: templates }).expect("toml");
        std::fs::write(&path, file).expect("write");

        let loaded = PromptTemplates::from_file(&path).expect("load");
        assert_eq!(loaded.version, "2.0-test");
        assert_eq!(loaded.persona, "{name} ({age})");
        assert!(
            PromptTemplates::from_file(&dir.path().join("missing.toml")).is_err()
        );
    }
}
