use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher '{dispatcher}': no pattern matches {input:?}")]
    NoMatch { dispatcher: String, input: String },

    #[error("dispatcher '{dispatcher}': {input:?} matches {patterns:?} at equal priority {priority}")]
    Conflict {
        dispatcher: String,
        input: String,
        priority: i32,
        patterns: Vec<String>,
    },

    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
