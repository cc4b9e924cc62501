use serde_json::Value;
use std::io;

use super::{flatten, format_value, is_record_array};

/// Write an invocation envelope as CSV to stdout.
///
/// A result holding a list of records (e.g. per-asset statistics) is written
/// as one row per record; anything else as `field,value` pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let null = Value::Null;
    let result = value.get("result").unwrap_or(&null);
    let mut fields = Vec::new();
    flatten("", result, &mut fields);

    let records = fields.iter().find(|(_, v)| is_record_array(v));
    match records {
        Some((_, Value::Array(items))) => write_array_csv(&mut wtr, items),
        _ => {
            let _ = wtr.write_record(["field", "value"]);
            for key in ["status_code", "message"] {
                if let Some(val) = value.get(key) {
                    let _ = wtr.write_record([key, &format_value(val)]);
                }
            }
            for (key, val) in &fields {
                if !val.is_null() {
                    let _ = wtr.write_record([key.as_str(), &format_value(val)]);
                }
            }
        }
    }

    let _ = wtr.flush();
}

fn write_array_csv(wtr: &mut csv::Writer<io::StdoutLock<'_>>, arr: &[Value]) {
    let mut first = Vec::new();
    flatten("", &arr[0], &mut first);
    let headers: Vec<String> = first.into_iter().map(|(k, _)| k).collect();
    let _ = wtr.write_record(&headers);

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
        let _ = wtr.write_record(&row);
    }
}
