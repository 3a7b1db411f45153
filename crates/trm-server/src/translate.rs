use serde_json::{Map, Value};

/// Short-name to canonical-name key tables for each operation's argument
/// object. The short-name layer is intentionally confined to this module —
/// everything past here deals only in canonical names.
const START_KEYS: &[(&str, &str)] = &[
    ("repo", "repo_path"),
    ("dataQual", "data_quality_cmd"),
    ("test", "test_cmd"),
    ("lint", "lint_cmd"),
    ("bench", "perf_cmd"),
    ("timeout", "timeout_sec"),
    ("ema", "ema_alpha"),
    ("notes", "z_notes"),
];

const WEIGHTS_KEYS: &[(&str, &str)] = &[
    ("dataQual", "data_quality"),
    ("test", "test"),
    ("lint", "lint"),
    ("perf", "perf"),
];

const HALT_KEYS: &[(&str, &str)] = &[
    ("max", "max_steps"),
    ("threshold", "pass_threshold"),
    ("patience", "patience_no_improve"),
    ("min", "min_steps"),
];

const SUBMIT_KEYS: &[(&str, &str)] = &[("sid", "session_id"), ("reason", "rationale")];

const SESSION_ID_KEYS: &[(&str, &str)] = &[("sid", "session_id")];

const READ_KEYS: &[(&str, &str)] = &[("sid", "session_id")];

const CHECKPOINT_RESTORE_KEYS: &[(&str, &str)] = &[("sid", "session_id")];

const LINES_KEYS: &[(&str, &str)] = &[("sid", "session_id")];

const REVIEW_KEYS: &[(&str, &str)] = &[("sid", "session_id")];

fn remap_keys(obj: &Map<String, Value>, table: &[(&str, &str)]) -> Map<String, Value> {
    let mut out = Map::with_capacity(obj.len());
    for (key, value) in obj {
        let renamed = table
            .iter()
            .find(|(short, _)| short == key)
            .map(|(_, long)| *long)
            .unwrap_or(key.as_str());
        out.insert(renamed.to_string(), value.clone());
    }
    out
}

fn invert(table: &[(&str, &str)]) -> Vec<(&str, &str)> {
    table.iter().map(|(a, b)| (*b, *a)).collect()
}

/// Translate `start` arguments: top-level keys plus the nested `weights`
/// and `halt` objects.
pub fn translate_start(args: &Value) -> Value {
    let Some(obj) = args.as_object() else {
        return args.clone();
    };

    let mut translated = remap_keys(obj, START_KEYS);

    if let Some(weights) = translated.get("weights").and_then(Value::as_object).cloned() {
        translated.insert(
            "weights".to_string(),
            Value::Object(remap_keys(&weights, WEIGHTS_KEYS)),
        );
    }

    if let Some(halt) = translated.get("halt").and_then(Value::as_object).cloned() {
        translated.insert(
            "halt".to_string(),
            Value::Object(remap_keys(&halt, HALT_KEYS)),
        );
    }

    Value::Object(translated)
}

/// Inverse of `translate_start`, used only to exercise the round-trip
/// property (translate then invert is identity on known keys).
pub fn untranslate_start(args: &Value) -> Value {
    let Some(obj) = args.as_object() else {
        return args.clone();
    };

    let mut untranslated = remap_keys(obj, &invert(START_KEYS));

    if let Some(weights) = untranslated.get("weights").and_then(Value::as_object).cloned() {
        untranslated.insert(
            "weights".to_string(),
            Value::Object(remap_keys(&weights, &invert(WEIGHTS_KEYS))),
        );
    }

    if let Some(halt) = untranslated.get("halt").and_then(Value::as_object).cloned() {
        untranslated.insert(
            "halt".to_string(),
            Value::Object(remap_keys(&halt, &invert(HALT_KEYS))),
        );
    }

    Value::Object(untranslated)
}

pub fn translate_submit(args: &Value) -> Value {
    translate_flat(args, SUBMIT_KEYS)
}

pub fn translate_session_id(args: &Value) -> Value {
    translate_flat(args, SESSION_ID_KEYS)
}

pub fn translate_read(args: &Value) -> Value {
    translate_flat(args, READ_KEYS)
}

pub fn translate_checkpoint_save(args: &Value) -> Value {
    translate_flat(args, SESSION_ID_KEYS)
}

pub fn translate_checkpoint_restore(args: &Value) -> Value {
    translate_flat(args, CHECKPOINT_RESTORE_KEYS)
}

pub fn translate_lines(args: &Value) -> Value {
    translate_flat(args, LINES_KEYS)
}

pub fn translate_review(args: &Value) -> Value {
    translate_flat(args, REVIEW_KEYS)
}

fn translate_flat(args: &Value, table: &[(&str, &str)]) -> Value {
    match args.as_object() {
        Some(obj) => Value::Object(remap_keys(obj, table)),
        None => args.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_translates_top_level_and_nested_objects() {
        let args = json!({
            "repo": ".",
            "dataQual": "make lint",
            "test": "pytest",
            "timeout": 60,
            "weights": {"dataQual": 0.2, "test": 0.5, "lint": 0.1, "perf": 0.2},
            "halt": {"max": 5, "threshold": 0.9, "patience": 2, "min": 1},
        });

        let translated = translate_start(&args);
        assert_eq!(translated["repo_path"], ".");
        assert_eq!(translated["data_quality_cmd"], "make lint");
        assert_eq!(translated["test_cmd"], "pytest");
        assert_eq!(translated["timeout_sec"], 60);
        assert_eq!(translated["weights"]["data_quality"], 0.2);
        assert_eq!(translated["halt"]["max_steps"], 5);
        assert_eq!(translated["halt"]["pass_threshold"], 0.9);
    }

    #[test]
    fn start_round_trip_is_identity_on_known_keys() {
        let args = json!({
            "repo": ".",
            "dataQual": "make lint",
            "weights": {"dataQual": 0.2, "test": 0.5, "lint": 0.1, "perf": 0.2},
            "halt": {"max": 5, "threshold": 0.9, "patience": 2, "min": 1},
        });

        let round_tripped = untranslate_start(&translate_start(&args));
        assert_eq!(round_tripped, args);
    }

    #[test]
    fn submit_translates_sid_and_reason() {
        let args = json!({"sid": "abc", "reason": "trying again", "candidate": {"mode": "files", "files": []}});
        let translated = translate_submit(&args);
        assert_eq!(translated["session_id"], "abc");
        assert_eq!(translated["rationale"], "trying again");
        assert_eq!(translated["candidate"]["mode"], "files");
    }

    #[test]
    fn session_id_translation_is_minimal() {
        let args = json!({"sid": "xyz"});
        let translated = translate_session_id(&args);
        assert_eq!(translated["session_id"], "xyz");
    }

    #[test]
    fn unrecognized_keys_pass_through_unchanged() {
        let args = json!({"repo": ".", "somethingElse": 42});
        let translated = translate_start(&args);
        assert_eq!(translated["somethingElse"], 42);
    }
}
