//! Built-in intents answered without calling the response generator
//!
//! Intents are an ordered list of `(pattern, handler)` pairs; the first
//! pattern that matches the utterance handles it.

use chrono::{DateTime, Local};
use regex::Regex;

use super::pick_phrase;
use crate::Result;

/// What a handler can draw on when composing a reply
pub struct IntentContext<'a> {
    /// Assistant's name
    pub assistant_name: &'a str,
    /// Jokes to pick from
    pub jokes: &'a [String],
    /// Current local time
    pub now: DateTime<Local>,
}

/// Builds a reply for a matched utterance
pub type IntentHandler = fn(&IntentContext<'_>, &str) -> String;

/// A compiled intent
struct Intent {
    name: &'static str,
    pattern: Regex,
    handler: IntentHandler,
}

/// A reply produced by an intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentReply {
    /// Name of the intent that matched
    pub intent: &'static str,
    /// Reply text
    pub text: String,
}

/// Ordered intent list, first match wins
#[derive(Default)]
pub struct IntentRouter {
    intents: Vec<Intent>,
}

impl IntentRouter {
    /// Create an empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a router with the time, date, name and joke intents
    ///
    /// # Errors
    ///
    /// Returns error if a built-in pattern fails to compile
    pub fn with_builtins() -> Result<Self> {
        let mut router = Self::new();
        router.register(
            "time",
            r"\bwhat(?:'s| is)? the time\b|\bwhat time is it\b|\bcurrent time\b",
            reply_time,
        )?;
        router.register(
            "date",
            r"\bwhat(?:'s| is)? (?:the |today's )?date\b|\bwhat day is (?:it|today)\b",
            reply_date,
        )?;
        router.register(
            "name",
            r"\bwhat(?:'s| is) your name\b|\bwho are you\b",
            reply_name,
        )?;
        router.register("joke", r"\b(?:tell|know) (?:me )?(?:a|another) joke\b", reply_joke)?;
        Ok(router)
    }

    /// Append an intent; it is tried after every intent registered before it
    ///
    /// # Errors
    ///
    /// Returns error if `pattern` is not a valid regex
    pub fn register(&mut self, name: &'static str, pattern: &str, handler: IntentHandler) -> Result<()> {
        let pattern = Regex::new(&format!("(?i){pattern}"))?;
        self.intents.push(Intent {
            name,
            pattern,
            handler,
        });
        Ok(())
    }

    /// Reply with the first matching intent, if any
    #[must_use]
    pub fn route(&self, utterance: &str, ctx: &IntentContext<'_>) -> Option<IntentReply> {
        let intent = self.intents.iter().find(|i| i.pattern.is_match(utterance))?;
        tracing::debug!(intent = intent.name, "intent matched");
        Some(IntentReply {
            intent: intent.name,
            text: (intent.handler)(ctx, utterance),
        })
    }

    /// Number of registered intents
    #[must_use]
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Whether no intents are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

fn reply_time(ctx: &IntentContext<'_>, _: &str) -> String {
    format!(
        "Beep boop! My internal chronometer says it is {}.",
        ctx.now.format("%-I:%M %p")
    )
}

fn reply_date(ctx: &IntentContext<'_>, _: &str) -> String {
    format!("Today is {}. What a glorious day!", ctx.now.format("%A, %B %-d, %Y"))
}

fn reply_name(ctx: &IntentContext<'_>, _: &str) -> String {
    format!(
        "I am {}, the Not Evil Pie-Throwing Robot! At your service!",
        ctx.assistant_name
    )
}

fn reply_joke(ctx: &IntentContext<'_>, _: &str) -> String {
    pick_phrase(
        ctx.jokes,
        "What's a robot's favorite dessert? Pi!",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(jokes: &[String]) -> IntentContext<'_> {
        IntentContext {
            assistant_name: "Neptr",
            jokes,
            now: Local::now(),
        }
    }

    #[test]
    fn test_time_intent() {
        let router = IntentRouter::with_builtins().unwrap();
        let reply = router.route("What time is it", &ctx(&[])).unwrap();
        assert_eq!(reply.intent, "time");
        let clock = Regex::new(r"\d{1,2}:\d{2} (AM|PM)").unwrap();
        assert!(clock.is_match(&reply.text), "{}", reply.text);
    }

    #[test]
    fn test_name_and_joke_intents() {
        let router = IntentRouter::with_builtins().unwrap();
        let jokes = vec!["only joke".to_string()];

        let reply = router.route("so what's your name", &ctx(&jokes)).unwrap();
        assert!(reply.text.contains("Neptr"));

        let reply = router.route("tell me a joke", &ctx(&jokes)).unwrap();
        assert_eq!(reply.text, "only joke");
    }

    #[test]
    fn test_first_match_wins() {
        let mut router = IntentRouter::new();
        router.register("first", r"hello", |_, _| "one".to_string()).unwrap();
        router.register("second", r"hello there", |_, _| "two".to_string()).unwrap();

        let reply = router.route("hello there", &ctx(&[])).unwrap();
        assert_eq!(reply.intent, "first");
    }

    #[test]
    fn test_no_match_falls_through() {
        let router = IntentRouter::with_builtins().unwrap();
        assert!(router.route("explain quantum physics", &ctx(&[])).is_none());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut router = IntentRouter::new();
        assert!(router.register("bad", "(unclosed", |_, _| String::new()).is_err());
    }
}
