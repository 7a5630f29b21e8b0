//! Templated text format
//!
//! Renders items through a minijinja template supplied by the data
//! source. The template receives the raw item as its root context.

use minijinja::Environment;

use contracts::{DataFormat, Item, WatchError};

/// Text format driven by a per-source template.
pub struct TemplatedFormat {
    env: Environment<'static>,
    name: String,
}

impl TemplatedFormat {
    /// Compile a template for the named source.
    ///
    /// # Errors
    /// `WatchError::Marshal` when the template does not compile.
    pub fn new(source_name: &str, template: &str) -> Result<Self, WatchError> {
        let mut env = Environment::new();
        env.add_template_owned(source_name.to_string(), template.to_string())
            .map_err(|e| WatchError::marshal("text", e.to_string()))?;
        Ok(Self {
            env,
            name: source_name.to_string(),
        })
    }

    fn render(&self, data: &Item) -> Result<Vec<u8>, WatchError> {
        let template = self
            .env
            .get_template(&self.name)
            .map_err(|e| WatchError::marshal("text", e.to_string()))?;
        let rendered = template
            .render(data)
            .map_err(|e| WatchError::marshal("text", e.to_string()))?;
        Ok(rendered.into_bytes())
    }
}

impl DataFormat for TemplatedFormat {
    fn marshal_get(&self, data: &Item) -> Result<Vec<u8>, WatchError> {
        self.render(data)
    }

    fn marshal_init(&self, data: &Item) -> Result<Vec<u8>, WatchError> {
        self.render(data)
    }

    fn marshal_item(&self, item: &Item) -> Result<Vec<u8>, WatchError> {
        self.render(item)
    }

    fn frame_item(&self, marshaled: &[u8]) -> Result<Vec<u8>, WatchError> {
        let mut framed = marshaled.to_vec();
        if framed.last() != Some(&b'\n') {
            framed.push(b'\n');
        }
        Ok(framed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_item() {
        let f = TemplatedFormat::new("ticker", "tick {{ n }}").unwrap();
        let buf = f.marshal_item(&json!({"n": 7})).unwrap();
        assert_eq!(buf, b"tick 7");
    }

    #[test]
    fn test_invalid_template_rejected() {
        assert!(matches!(
            TemplatedFormat::new("bad", "{{ unclosed"),
            Err(WatchError::Marshal { .. })
        ));
    }

    #[test]
    fn test_frame_ensures_single_trailing_newline() {
        let f = TemplatedFormat::new("t", "x").unwrap();
        assert_eq!(f.frame_item(b"line").unwrap(), b"line\n");
        assert_eq!(f.frame_item(b"line\n").unwrap(), b"line\n");
    }
}
