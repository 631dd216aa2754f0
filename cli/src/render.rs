//! Plain-text rendering of task snapshots.

use audio_research_proto::{ChunkRecord, ChunkStatus, TaskSnapshot};

pub fn summary(snapshot: &TaskSnapshot) -> String {
    let failed = count(snapshot, ChunkStatus::Failed);
    let mut line = format!(
        "task {}: {}/{} chunks done",
        snapshot.task_id,
        snapshot.terminal_chunks(),
        snapshot.total_chunks
    );
    if failed > 0 {
        line.push_str(&format!(" ({failed} failed)"));
    }
    line
}

pub fn failures(snapshot: &TaskSnapshot) -> String {
    match count(snapshot, ChunkStatus::Failed) {
        0 => String::new(),
        n => format!("{n} failed"),
    }
}

pub fn chunk_line(chunk: &ChunkRecord) -> String {
    let head = format!(
        "#{:<3} {:>8.2}s-{:>8.2}s",
        chunk.chunk_id, chunk.start_time, chunk.end_time
    );
    match chunk.status() {
        ChunkStatus::Completed => {
            let mut parts = vec![format!("{head} completed")];
            if let Some(features) = &chunk.features {
                if let Some(a) = &features.acoustic {
                    parts.push(format!(
                        "pitch={:.1}Hz energy={:.4} zcr={:.3}",
                        a.pitch, a.energy, a.zcr
                    ));
                }
                if let Some(s) = &features.speaker {
                    parts.push(format!(
                        "rate={:.2}/s vot={:.3}s",
                        s.speaking_rate, s.voice_onset_time
                    ));
                }
                if let Some(p) = &features.paralinguistic {
                    parts.push(format!("arousal={:.2} valence={:.2}", p.arousal, p.valence));
                }
            }
            parts.join(" ")
        }
        ChunkStatus::Failed => format!(
            "{head} failed: {}",
            chunk.error.as_deref().unwrap_or("unknown error")
        ),
        ChunkStatus::Processing | ChunkStatus::Unspecified => format!("{head} processing"),
    }
}

fn count(snapshot: &TaskSnapshot, status: ChunkStatus) -> usize {
    snapshot
        .chunks
        .iter()
        .filter(|c| c.status() == status)
        .count()
}
