//! Reply generation
//!
//! Every utterance gets an answer: built-in intents first, then the
//! response generator behind a rate gate, and a canned apology when the
//! generator fails.

mod gate;
mod intents;
mod provider;

use std::sync::Arc;

use rand::seq::SliceRandom;

pub use gate::RateGate;
pub use intents::{IntentContext, IntentHandler, IntentReply, IntentRouter};
pub use provider::{ChatOptions, OpenAiResponder, ProviderError, ResponseGenerator, classify_status};

use crate::clock::Clock;
use crate::config::Personality;

/// Apology used when no apology phrases are configured
const FALLBACK_APOLOGY: &str = "I'm sorry, my circuits are a bit fuzzy right now.";

/// Pick a random phrase, or `fallback` when `options` is empty
#[must_use]
pub fn pick_phrase(options: &[String], fallback: &str) -> String {
    options
        .choose(&mut rand::thread_rng())
        .map_or_else(|| fallback.to_string(), Clone::clone)
}

/// Produces a spoken reply for every user turn
pub struct ReplyService {
    intents: IntentRouter,
    generator: Box<dyn ResponseGenerator>,
    gate: RateGate,
    clock: Arc<dyn Clock>,
    personality: Personality,
}

impl ReplyService {
    /// Create a reply service
    #[must_use]
    pub fn new(
        intents: IntentRouter,
        generator: Box<dyn ResponseGenerator>,
        gate: RateGate,
        clock: Arc<dyn Clock>,
        personality: Personality,
    ) -> Self {
        Self {
            intents,
            generator,
            gate,
            clock,
            personality,
        }
    }

    /// Reply to an utterance; never fails
    pub fn reply(&mut self, utterance: &str) -> String {
        let utterance = utterance.trim();
        tracing::info!(utterance, "processing user turn");

        let ctx = IntentContext {
            assistant_name: &self.personality.name,
            jokes: &self.personality.jokes,
            now: chrono::Local::now(),
        };
        if let Some(reply) = self.intents.route(utterance, &ctx) {
            return reply.text;
        }

        self.gate.acquire(self.clock.as_ref());
        match self.generator.respond(utterance) {
            Ok(reply) => reply,
            Err(ProviderError::RateLimited { retry_after }) => {
                self.gate.backoff(self.clock.now(), retry_after);
                self.apology()
            }
            Err(e) => {
                tracing::warn!(error = %e, "response generator failed");
                self.apology()
            }
        }
    }

    /// A random apology phrase
    #[must_use]
    pub fn apology(&self) -> String {
        pick_phrase(&self.personality.apologies, FALLBACK_APOLOGY)
    }

    /// Called when a conversation ends
    pub fn end_session(&mut self) {
        self.generator.reset();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;

    struct Scripted {
        replies: Vec<Result<String, ProviderError>>,
        seen: Rc<RefCell<Vec<String>>>,
    }

    impl ResponseGenerator for Scripted {
        fn respond(&mut self, utterance: &str) -> Result<String, ProviderError> {
            self.seen.borrow_mut().push(utterance.to_string());
            if self.replies.is_empty() {
                return Err(ProviderError::EmptyReply);
            }
            self.replies.remove(0)
        }
    }

    fn personality() -> Personality {
        Personality {
            apologies: vec!["sorry!".to_string()],
            ..Personality::default()
        }
    }

    fn service(
        replies: Vec<Result<String, ProviderError>>,
        clock: &ManualClock,
    ) -> (ReplyService, Rc<RefCell<Vec<String>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let service = ReplyService::new(
            IntentRouter::with_builtins().unwrap(),
            Box::new(Scripted {
                replies,
                seen: Rc::clone(&seen),
            }),
            RateGate::new(Duration::from_secs(1), Duration::from_secs(10)),
            Arc::new(clock.clone()),
            personality(),
        );
        (service, seen)
    }

    #[test]
    fn test_intent_bypasses_generator() {
        let clock = ManualClock::new();
        let (mut service, seen) = service(vec![], &clock);
        let reply = service.reply("what time is it");
        assert!(reply.contains(':'));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_generator_reply_passed_through() {
        let clock = ManualClock::new();
        let (mut service, seen) = service(vec![Ok("Paris!".to_string())], &clock);
        assert_eq!(service.reply("what is the capital of france"), "Paris!");
        assert_eq!(seen.borrow().as_slice(), ["what is the capital of france"]);
    }

    #[test]
    fn test_failure_falls_back_to_apology() {
        let clock = ManualClock::new();
        let (mut service, _) = service(
            vec![Err(ProviderError::Network("offline".to_string()))],
            &clock,
        );
        assert_eq!(service.reply("explain quantum physics"), "sorry!");
    }

    #[test]
    fn test_rate_limited_backs_off() {
        let clock = ManualClock::new();
        let (mut service, _) = service(
            vec![
                Err(ProviderError::RateLimited { retry_after: None }),
                Ok("ok".to_string()),
            ],
            &clock,
        );
        let start = clock.now();
        assert_eq!(service.reply("first question"), "sorry!");
        assert_eq!(service.reply("second question"), "ok");
        assert_eq!(clock.now() - start, Duration::from_secs(10));
    }

    #[test]
    fn test_pick_phrase_fallback() {
        assert_eq!(pick_phrase(&[], "default"), "default");
        assert_eq!(pick_phrase(&["only".to_string()], "default"), "only");
    }
}
