//! gRPC server for submitting recordings and following their analysis.

use std::pin::Pin;
use std::sync::Arc;

use audio_research_proto as proto;
use audio_research_proto::audio_research_server::{AudioResearch, AudioResearchServer};
use tokio_stream::Stream;
use tonic::{Request, Response, Status};
use tracing::debug;

use crate::controller::Controller;
use crate::features::{
    AcousticFeatures, CategorySet, FeatureCategory, FeatureSet, ParalinguisticFeatures,
    SpeakerFeatures,
};
use crate::hub::HubError;
use crate::orchestrator::SubmitError;
use crate::task::{ChunkRecord, ChunkStatus, TaskId, TaskSnapshot};

/// gRPC service implementation.
pub struct AudioResearchService {
    controller: Arc<Controller>,
}

impl AudioResearchService {
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }

    /// Create the tonic server, sized for whole recordings in one request.
    pub fn into_server(self) -> AudioResearchServer<Self> {
        let limit = self.controller.config().server.max_message_bytes;
        AudioResearchServer::new(self)
            .max_decoding_message_size(limit)
            .max_encoding_message_size(limit)
    }
}

#[tonic::async_trait]
impl AudioResearch for AudioResearchService {
    async fn submit(
        &self,
        request: Request<proto::SubmitRequest>,
    ) -> Result<Response<proto::TaskSnapshot>, Status> {
        let request = request.into_inner();
        let categories = parse_categories(&request.categories)?;

        let submitted = self
            .controller
            .submit(
                request.samples,
                request.sample_rate,
                categories,
                request.chunk_duration,
            )
            .map_err(submit_status)?;

        Ok(Response::new(proto::TaskSnapshot::from(&submitted.snapshot)))
    }

    async fn get_status(
        &self,
        request: Request<proto::TaskRequest>,
    ) -> Result<Response<proto::TaskSnapshot>, Status> {
        let task_id = parse_task_id(&request.into_inner().task_id)?;
        let snapshot = self
            .controller
            .status(task_id)
            .ok_or_else(|| Status::not_found(format!("unknown task {task_id}")))?;
        Ok(Response::new(proto::TaskSnapshot::from(&snapshot)))
    }

    type SubscribeStream = Pin<Box<dyn Stream<Item = Result<proto::TaskSnapshot, Status>> + Send>>;

    async fn subscribe(
        &self,
        request: Request<proto::TaskRequest>,
    ) -> Result<Response<Self::SubscribeStream>, Status> {
        let task_id = parse_task_id(&request.into_inner().task_id)?;
        let mut subscription = self.controller.subscribe(task_id).map_err(|e| match e {
            HubError::NotFound(_) => Status::not_found(e.to_string()),
            HubError::ObserverClosed(_) => Status::internal(e.to_string()),
        })?;
        debug!(task_id = %task_id, observer = subscription.observer_id(), "Subscriber attached");

        // Ends after the first complete snapshot, or when the hub drops the observer.
        let stream = async_stream::stream! {
            while let Some(snapshot) = subscription.recv().await {
                let complete = snapshot.is_complete();
                yield Ok(proto::TaskSnapshot::from(&snapshot));
                if complete {
                    break;
                }
            }
        };
        Ok(Response::new(Box::pin(stream)))
    }

    async fn shutdown(
        &self,
        _request: Request<proto::Empty>,
    ) -> Result<Response<proto::Empty>, Status> {
        self.controller.shutdown().await;
        Ok(Response::new(proto::Empty {}))
    }
}

fn parse_task_id(raw: &str) -> Result<TaskId, Status> {
    raw.parse()
        .map_err(|_| Status::not_found(format!("unknown task {raw}")))
}

fn parse_categories(raw: &[i32]) -> Result<CategorySet, Status> {
    raw.iter()
        .map(|&value| match proto::FeatureCategory::try_from(value) {
            Ok(proto::FeatureCategory::Acoustic) => Ok(FeatureCategory::Acoustic),
            Ok(proto::FeatureCategory::Speaker) => Ok(FeatureCategory::Speaker),
            Ok(proto::FeatureCategory::Paralinguistic) => Ok(FeatureCategory::Paralinguistic),
            Ok(proto::FeatureCategory::Unspecified) | Err(_) => Err(Status::invalid_argument(
                format!("unknown feature category {value}"),
            )),
        })
        .collect()
}

fn submit_status(error: SubmitError) -> Status {
    match error {
        SubmitError::ShuttingDown => Status::unavailable(error.to_string()),
        SubmitError::Store(_) => Status::internal(error.to_string()),
        _ => Status::invalid_argument(error.to_string()),
    }
}

impl From<FeatureCategory> for proto::FeatureCategory {
    fn from(category: FeatureCategory) -> Self {
        match category {
            FeatureCategory::Acoustic => Self::Acoustic,
            FeatureCategory::Speaker => Self::Speaker,
            FeatureCategory::Paralinguistic => Self::Paralinguistic,
        }
    }
}

impl From<ChunkStatus> for proto::ChunkStatus {
    fn from(status: ChunkStatus) -> Self {
        match status {
            ChunkStatus::Processing => Self::Processing,
            ChunkStatus::Completed => Self::Completed,
            ChunkStatus::Failed => Self::Failed,
        }
    }
}

impl From<&TaskSnapshot> for proto::TaskSnapshot {
    fn from(snapshot: &TaskSnapshot) -> Self {
        Self {
            task_id: snapshot.task_id.to_string(),
            total_chunks: snapshot.total_chunks() as u32,
            chunks: snapshot.chunks.iter().map(proto::ChunkRecord::from).collect(),
        }
    }
}

impl From<&ChunkRecord> for proto::ChunkRecord {
    fn from(record: &ChunkRecord) -> Self {
        Self {
            chunk_id: record.chunk_id,
            start_time: record.start_time,
            end_time: record.end_time,
            status: proto::ChunkStatus::from(record.status()).into(),
            features: record.features().map(proto::FeatureSet::from),
            error: record.error().map(str::to_string),
        }
    }
}

impl From<&FeatureSet> for proto::FeatureSet {
    fn from(set: &FeatureSet) -> Self {
        Self {
            acoustic: set.acoustic.as_ref().map(proto::AcousticFeatures::from),
            speaker: set.speaker.as_ref().map(proto::SpeakerFeatures::from),
            paralinguistic: set
                .paralinguistic
                .as_ref()
                .map(proto::ParalinguisticFeatures::from),
        }
    }
}

impl From<&AcousticFeatures> for proto::AcousticFeatures {
    fn from(a: &AcousticFeatures) -> Self {
        Self {
            mfcc: a.mfcc.clone(),
            pitch: a.pitch,
            formants: a.formants.clone(),
            energy: a.energy,
            zcr: a.zcr,
            spectral: Some(proto::SpectralFeatures {
                centroid: a.spectral.centroid,
                bandwidth: a.spectral.bandwidth,
                flux: a.spectral.flux,
                rolloff: a.spectral.rolloff,
            }),
            voice_onset_time: a.voice_onset_time,
        }
    }
}

impl From<&SpeakerFeatures> for proto::SpeakerFeatures {
    fn from(s: &SpeakerFeatures) -> Self {
        Self {
            speaking_rate: s.speaking_rate,
            voice_onset_time: s.voice_onset_time,
        }
    }
}

impl From<&ParalinguisticFeatures> for proto::ParalinguisticFeatures {
    fn from(p: &ParalinguisticFeatures) -> Self {
        Self {
            arousal: p.arousal,
            valence: p.valence,
        }
    }
}

#[cfg(test)]
#[path = "server_test.rs"]
mod tests;
