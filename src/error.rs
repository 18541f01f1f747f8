use thiserror::Error;
use wasm_bindgen::JsValue;

/// Every way a correction run can fail. All of them are fatal: nothing is
/// written when one is returned.
#[derive(Debug, Error)]
pub enum TcxFixError {
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("Missing <{element}> in <{parent}>")]
    MissingElement {
        parent: &'static str,
        element: &'static str,
    },

    #[error("Invalid value '{value}' for <{element}>")]
    InvalidValue { element: &'static str, value: String },

    /// A ground-truth line that cannot be read in the active mode.
    #[error("laps file line {line}: cannot parse '{text}' as {expected}")]
    Format {
        line: usize,
        text: String,
        expected: &'static str,
    },

    #[error("{0}")]
    StructuralMismatch(String),

    #[error("lap {lap}: {reason}")]
    IntegrityViolation { lap: usize, reason: String },

    #[error(
        "lap {lap}: adj_len={adj_len}, rec_len={recorded}. if recorded looks good, add --use-recorded-time"
    )]
    DurationMismatch {
        lap: usize,
        adj_len: f64,
        recorded: f64,
    },

    #[error("XML write error: {0}")]
    Write(String),
}

impl From<TcxFixError> for JsValue {
    fn from(e: TcxFixError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
