mod chord;
mod parse;
mod schema;

use thiserror::Error;

pub(crate) use schema::ConfigV1;

pub use chord::ChordErrorKind;
pub use parse::parse_button_name;

#[derive(Error, Debug)]
pub enum Error {
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid button: {0}")]
    InvalidButton(String),
    #[error("invalid chord \"{0}\": {1}")]
    InvalidChord(String, ChordErrorKind),
    #[error("invalid guid override: {0}")]
    InvalidGuid(String),
    #[error("type default \"{0}\" must set both vendor_id and product_id or neither")]
    PartialIds(String),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}
