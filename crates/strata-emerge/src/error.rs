use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmergeError {
    #[error("failed to spawn emerge worker {id}: {source}")]
    Spawn {
        id: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("emerge workers were stopped and cannot be restarted")]
    Stopped,
}
