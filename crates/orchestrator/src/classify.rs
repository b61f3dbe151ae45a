use veildesk_contract::Action;

/// Keywords that flag a step as needing human approval. Scanned over
/// the action name, tags, and the serialized payload.
const HIGH_IMPACT_KEYWORDS: &[&str] = &[
    "payment",
    "pay",
    "purchase",
    "buy",
    "checkout",
    "order",
    "delete",
    "remove",
    "erase",
    "wipe",
    "send",
    "publish",
    "post",
    "transfer",
    "wire",
    "unsubscribe",
    "irreversible",
];

/// Risk at or above this level needs approval even when no keyword
/// matches. Sits above the sandbox default threshold so allow-listed
/// high-risk actions still stop for a human.
const HIGH_IMPACT_RISK: f32 = 0.8;

fn contains_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    HIGH_IMPACT_KEYWORDS
        .iter()
        .any(|kw| lower.split(|c: char| !c.is_alphanumeric()).any(|w| w == *kw))
}

/// Heuristic scan for actions that must block on approval before
/// dispatch. Tags are authoritative; name and payload are fuzzy.
pub fn is_high_impact(action: &Action) -> bool {
    if action.risk_level() >= HIGH_IMPACT_RISK {
        return true;
    }
    if action.tags().iter().any(|t| contains_keyword(t)) {
        return true;
    }
    if contains_keyword(action.name()) {
        return true;
    }
    serde_json::to_string(action.payload())
        .map(|payload| contains_keyword(&payload))
        .unwrap_or(false)
}
