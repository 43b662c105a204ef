use crate::parser::ParseError;
use crate::path_cache::PathCacheError;
use crate::storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("cannot parse type information file {}: {source}", path.display())]
    CannotParseQmlTypesFile { path: PathBuf, source: ParseError },
    #[error("cannot parse document {}: {source}", path.display())]
    CannotParseQmlDocumentFile { path: PathBuf, source: ParseError },
    #[error(transparent)]
    PathCache(#[from] PathCacheError),
    #[error("synchronizing the project storage failed: {0}")]
    Storage(#[from] StorageError),
}

impl UpdateError {
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            UpdateError::CannotParseQmlTypesFile { .. } | UpdateError::CannotParseQmlDocumentFile { .. }
        )
    }
}
