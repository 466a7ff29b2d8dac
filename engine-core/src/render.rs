//! Shared message-template rendering (§4.5's "Shared responsibilities").
//!
//! Every handler that emits text goes through [`render_message`]: `{field}`
//! substitution, then the primary/alternatives jitter. The jitter's RNG is
//! injected rather than global so tests can pin a seed and assert on the
//! exact branch taken.

use crate::validators::FieldValue;
use rand::Rng;
use std::collections::HashMap;

/// Substitute `{field}` occurrences from `data`; any placeholder that
/// doesn't resolve is removed entirely (§4.5).
pub fn substitute(template: &str, data: &HashMap<String, FieldValue>) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i..].find('}') {
                let key = &template[i + 1..i + end];
                if let Some(value) = data.get(key) {
                    out.push_str(&value.to_string());
                }
                i += end + 1;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Choose between the primary `message` and one of `alternatives`, with a
/// 50% chance of preferring an alternative when any exist (§4.5's
/// naturalness jitter), then substitute fields into whichever was picked.
pub fn render_message(
    message: &str,
    alternatives: &[String],
    data: &HashMap<String, FieldValue>,
    rng: &mut impl Rng,
) -> String {
    let chosen = if !alternatives.is_empty() && rng.gen_bool(0.5) {
        let idx = rng.gen_range(0..alternatives.len());
        &alternatives[idx]
    } else {
        message
    };
    substitute(chosen, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn substitute_removes_unresolved_placeholders() {
        let data = HashMap::new();
        assert_eq!(substitute("Hi {name}!", &data), "Hi !");
    }

    #[test]
    fn substitute_fills_known_fields() {
        let mut data = HashMap::new();
        data.insert("name".to_string(), FieldValue::String("Ana".to_string()));
        assert_eq!(substitute("Hi {name}!", &data), "Hi Ana!");
    }

    #[test]
    fn jitter_is_deterministic_for_a_fixed_seed() {
        let data = HashMap::new();
        let alternatives = vec!["Hey there!".to_string(), "Hiya!".to_string()];

        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);
        let a = render_message("Hello!", &alternatives, &data, &mut rng_a);
        let b = render_message("Hello!", &alternatives, &data, &mut rng_b);
        assert_eq!(a, b);
    }

    #[test]
    fn no_alternatives_always_uses_primary() {
        let data = HashMap::new();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(render_message("Hello!", &[], &data, &mut rng), "Hello!");
        }
    }
}
