//! The rendering-session seam
//!
//! Everything the analyzer and executor need from a live rendering engine
//! goes through [`RenderSession`]. The Chrome implementation lives in
//! [`crate::cdp`]; tests drive the pipeline with scripted in-memory sessions.

use serde::de::DeserializeOwned;

use crate::geometry::{Rect, Size};
use crate::{Error, Result};

/// A controllable rendering-engine instance with one loaded document
pub trait RenderSession {
    /// Load a document and wait for navigation to finish
    fn load_url(&mut self, url: &str) -> Result<()>;

    /// Evaluate a script in the page context
    ///
    /// Scripts return a JSON string; implementations hand back the parsed
    /// value. When `await_promise` is set the script's promise is awaited.
    fn evaluate_json(&mut self, script: &str, await_promise: bool) -> Result<serde_json::Value>;

    /// Screenshot a region given in CSS pixels of document space
    ///
    /// The returned PNG is sized in device pixels.
    fn capture_region(&mut self, clip: &Rect) -> Result<Vec<u8>>;

    /// Current viewport in CSS pixels
    fn viewport(&mut self) -> Result<Size>;

    /// Resize the viewport (CSS pixels)
    fn set_viewport(&mut self, size: Size) -> Result<()>;

    /// Close the session and release the engine
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Evaluate a script and deserialize its JSON result
pub fn evaluate_as<T, S>(session: &mut S, script: &str, await_promise: bool) -> Result<T>
where
    T: DeserializeOwned,
    S: RenderSession + ?Sized,
{
    let value = session.evaluate_json(script, await_promise)?;
    serde_json::from_value(value)
        .map_err(|e| Error::ScriptError(format!("Unexpected script result: {}", e)))
}

/// Parse the JSON text a page script returned
pub fn parse_script_value(raw: Option<serde_json::Value>) -> Result<serde_json::Value> {
    match raw {
        Some(serde_json::Value::String(text)) => serde_json::from_str(&text)
            .map_err(|e| Error::ScriptError(format!("Script returned invalid JSON: {}", e))),
        Some(serde_json::Value::Null) | None => Ok(serde_json::Value::Null),
        Some(other) => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn script_strings_are_parsed_as_json() {
        let parsed = parse_script_value(Some(json!("{\"fontsLoaded\":true}"))).unwrap();
        assert_eq!(parsed, json!({ "fontsLoaded": true }));
        assert_eq!(parse_script_value(None).unwrap(), serde_json::Value::Null);
        assert!(parse_script_value(Some(json!("{oops"))).is_err());
    }
}
