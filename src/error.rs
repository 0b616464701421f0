use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchivistError {
    #[error("source directory is missing or not a directory: {0} (edit the config file)")]
    SourceRootInvalid(String),
    #[error("target directory is missing or not a directory: {0} (edit the config file)")]
    TargetRootInvalid(String),
}
