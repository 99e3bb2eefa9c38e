use std::{
    error::Error,
    fmt::{Display, Formatter},
};

/// Result type used throughout the crate.
pub type PortFindResult<T> = Result<T, Box<dyn Error>>;

/**
 * A structural failure that makes it impossible to run a stage.
 *
 * Bad rows are never reported this way, they are dropped. This is for things like an input file
 * without the columns we need or a worker thread that died.
 */
#[derive(Debug, Clone, Copy)]
pub struct PortFindError {
    pub msg: &'static str,
}

impl Display for PortFindError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), std::fmt::Error> {
        write!(f, "{}", self.msg)
    }
}

impl Error for PortFindError {}
