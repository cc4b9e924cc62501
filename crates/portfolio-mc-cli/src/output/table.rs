use colored::Colorize;
use serde_json::Value;
use tabled::{builder::Builder, Table};

use super::{flatten, format_value, is_record_array};

/// Format an invocation envelope as tables using the tabled crate.
pub fn print_table(value: &Value) {
    let Value::Object(envelope) = value else {
        println!("{}", value);
        return;
    };

    print_status(envelope);

    if let Some(result) = envelope.get("result") {
        let mut fields = Vec::new();
        flatten("", result, &mut fields);
        let (arrays, scalars): (Vec<_>, Vec<_>) =
            fields.into_iter().partition(|(_, v)| is_record_array(v));

        if !scalars.is_empty() {
            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            for (key, val) in &scalars {
                builder.push_record([key.as_str(), &format_value(val)]);
            }
            println!("{}", Table::from(builder));
        }
        for (key, val) in arrays {
            if let Value::Array(items) = val {
                println!("\n{}:", key);
                print_array_table(items);
            }
        }
    }

    if let Some(Value::Object(meta)) = envelope.get("metadata") {
        let field = |k: &str| meta.get(k).map(format_value).unwrap_or_default();
        println!(
            "\n{} v{} in {} µs",
            field("operation"),
            field("version"),
            field("computation_time_us")
        );
    }
}

fn print_status(envelope: &serde_json::Map<String, Value>) {
    let code = envelope
        .get("status_code")
        .and_then(Value::as_u64)
        .unwrap_or_default();
    let message = envelope
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let status = if code == 200 {
        code.to_string().green().bold()
    } else {
        code.to_string().red().bold()
    };
    println!("{} {}\n", status, message);
}

fn print_array_table(arr: &[Value]) {
    // Headers from the first object; nested fields are flattened.
    let mut first = Vec::new();
    flatten("", &arr[0], &mut first);
    let headers: Vec<String> = first.into_iter().map(|(k, _)| k).collect();

    let mut builder = Builder::default();
    builder.push_record(&headers);
    for item in arr {
        let mut fields = Vec::new();
        flatten("", item, &mut fields);
        let row: Vec<String> = headers
            .iter()
            .map(|h| {
                fields
                    .iter()
                    .find(|(k, _)| k == h)
                    .map(|(_, v)| format_value(v))
                    .unwrap_or_default()
            })
            .collect();
        builder.push_record(row);
    }
    println!("{}", Table::from(builder));
}
