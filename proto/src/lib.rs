//! gRPC protocol definitions for the audio-research daemon.

tonic::include_proto!("audio_research");

impl ChunkStatus {
    /// Whether the chunk has reached a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChunkStatus::Completed | ChunkStatus::Failed)
    }
}

impl TaskSnapshot {
    /// Number of chunks that are no longer processing.
    pub fn terminal_chunks(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| c.status().is_terminal())
            .count()
    }

    /// Whether every chunk has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.terminal_chunks() == self.chunks.len()
    }
}
