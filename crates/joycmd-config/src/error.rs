//! Configuration errors

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Failed to parse KDL")]
    #[diagnostic(
        code(joycmd::config::parse_error),
        help("combos are written as `combo <button>... \"<command>\"` inside a device block")
    )]
    ParseError {
        #[source_code]
        src: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source]
        source: kdl::KdlError,
    },

    /// A global option has a value joycmd cannot use
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(joycmd::config::invalid))]
    Invalid { message: String },

    #[error("Cannot access configuration file: {0}")]
    #[diagnostic(code(joycmd::config::io))]
    Io(#[from] std::io::Error),
}
