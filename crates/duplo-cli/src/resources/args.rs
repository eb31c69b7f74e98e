//! Argument descriptors shared across resources.

use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use duplo_core::{ArgAction, Argument, Nargs};

/// Resource name.
pub static NAME: Lazy<Argument> =
    Lazy::new(|| Argument::new("name").help("The name of the resource."));

/// Container image.
pub static IMAGE: Lazy<Argument> =
    Lazy::new(|| Argument::new("image").help("The new image, e.g. nginx:1.25."));

/// Infrastructure plan for a new tenant.
pub static PLAN: Lazy<Argument> = Lazy::new(|| {
    Argument::new("plan")
        .flag("--plan")
        .flag("-p")
        .default_value("default")
        .help("Infrastructure plan the tenant runs on.")
});

/// `KEY=VALUE` pairs collected into a map.
pub static DATA: Lazy<Argument> = Lazy::new(|| {
    Argument::new("data")
        .flag("--data")
        .flag("-d")
        .nargs(Nargs::OneOrMore)
        .action(ArgAction::Custom(key_values))
        .help("Secret entries as KEY=VALUE; repeatable.")
});

/// Collects `KEY=VALUE` tokens into a JSON object; later keys win.
pub fn key_values(values: Vec<Value>) -> Result<Value, String> {
    let mut map = Map::new();
    for value in values {
        let pair = value.as_str().unwrap_or_default();
        let (key, val) = pair
            .split_once('=')
            .filter(|(k, _)| !k.is_empty())
            .ok_or_else(|| format!("expected KEY=VALUE, got '{pair}'"))?;
        map.insert(key.to_string(), Value::from(val));
    }
    Ok(Value::Object(map))
}
