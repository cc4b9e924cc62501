use serde_json::Value;

/// Print just the key answer: the artifact location on success, the error
/// message otherwise.
pub fn print_minimal(value: &Value) {
    let result = value.get("result");

    // Priority list of location fields, most specific first
    let priority_keys = ["location", "stats_location", "locations"];
    if let Some(Value::Object(map)) = result {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    println!("{}", super::format_value(val));
                    return;
                }
            }
        }
        // A full run nests the combined location under `aggregate`
        if let Some(Value::String(loc)) = map.get("aggregate").and_then(|a| a.get("location")) {
            println!("{}", loc);
            return;
        }
    }

    match value.get("message") {
        Some(Value::String(message)) => println!("{}", message),
        _ => println!("{}", value),
    }
}
