use std::fmt;
use std::sync::Arc;

use super::converter::ModelConverter;
use super::engine::SpeechEngine;

/// Detail reported when speech synthesis cannot run at all
pub const MISSING_ENGINE_DETAIL: &str =
    "Speech engine not installed. Start the server with a speech engine configured.";

/// Optional components the server was started with.
///
/// Both are injected once at construction and never change afterwards.
#[derive(Clone, Default)]
pub struct Capabilities {
    converter: Option<Arc<dyn ModelConverter>>,
    engine: Option<Arc<dyn SpeechEngine>>,
}

impl Capabilities {
    /// No converter and no engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Components compiled into this binary
    pub fn builtin() -> Self {
        #[cfg(feature = "gguf")]
        {
            Self::new().with_converter(Arc::new(super::converter::GgufConverter))
        }
        #[cfg(not(feature = "gguf"))]
        {
            Self::new()
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn ModelConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn SpeechEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn converter(&self) -> Option<&Arc<dyn ModelConverter>> {
        self.converter.as_ref()
    }

    pub fn engine(&self) -> Option<&Arc<dyn SpeechEngine>> {
        self.engine.as_ref()
    }

    pub fn generation_available(&self) -> bool {
        self.engine.is_some()
    }

    pub fn conversion_available(&self) -> bool {
        self.converter.is_some()
    }
}

impl fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("converter", &self.converter.as_ref().map(|c| c.name().to_string()))
            .field("engine", &self.engine.as_ref().map(|e| e.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_capabilities() {
        let caps = Capabilities::new();
        assert!(!caps.generation_available());
        assert!(!caps.conversion_available());
        assert!(caps.engine().is_none());
    }

    #[cfg(feature = "gguf")]
    #[test]
    fn test_builtin_has_gguf_converter() {
        let caps = Capabilities::builtin();
        assert!(caps.conversion_available());
        assert!(!caps.generation_available());
        assert!(format!("{caps:?}").contains("gguf"));
    }
}
