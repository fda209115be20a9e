use serde_json::{Number, Value};

/// Render a `Value` to the canonical byte form described in spec.md §4.1:
/// object keys sorted lexicographically, arrays left in place, floats
/// rendered with `ryu`'s shortest round-trip decimal (no exponent, `-0.0`
/// folded to `0.0`).
///
/// The result is not necessarily valid JSON (float formatting departs from
/// it) — it exists only to be hashed and previewed, never re-parsed.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_value(value, &mut out);
    out.into_bytes()
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(n, out),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(&map[*key], out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    let escaped = serde_json::to_string(s).expect("string serialization is infallible");
    out.push_str(&escaped);
}

fn write_number(n: &Number, out: &mut String) {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
        return;
    }
    if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
        return;
    }
    if let Some(f) = n.as_f64() {
        // Fold -0.0 to 0.0 (spec.md §4.1 rule 3).
        let f = if f == 0.0 { 0.0 } else { f };
        let mut buf = ryu::Buffer::new();
        out.push_str(buf.format_finite(f));
        return;
    }
    out.push_str("null");
}
