use crate::api::texttospeech::{SpeechError, SpeechSynthesizer};
use crate::chunker::{self, ChunkPlan};
use crate::{logi, logw};

/// Synthesizes a whole document, in source order, into one MP3 byte stream.
///
/// Segments are concatenated as returned with no re-encoding. A pair the
/// API rejects as too long is resubmitted one group at a time; errors on
/// that resubmission fail the document. Any other per-chunk error drops
/// that chunk's audio and carries on.
pub async fn synthesize_document(
    synth: &dyn SpeechSynthesizer,
    name: &str,
    text: &str,
) -> Result<Vec<u8>, SpeechError> {
    let chunks = match chunker::plan_chunks(text) {
        ChunkPlan::Single(whole) => return synth.synthesize(whole).await,
        ChunkPlan::Pairs(chunks) => chunks,
    };

    logi(format!(
        "File {} too big, we'll make {} requests to generate the mp3",
        name,
        chunker::estimated_requests(text.len())
    ));

    let mut audio = Vec::new();
    for chunk in &chunks {
        logi(format!("Request #{}", chunk.index));
        match synth.synthesize(&chunk.text()).await {
            Ok(segment) => audio.extend_from_slice(&segment),
            Err(SpeechError::InputTooLong) if chunk.groups.len() > 1 => {
                logw(format!(
                    "Request #{} over the byte limit; splitting into {} requests",
                    chunk.index,
                    chunk.groups.len()
                ));
                for group in &chunk.groups {
                    let segment = synth.synthesize(group).await?;
                    audio.extend_from_slice(&segment);
                }
            }
            Err(err) => {
                logw(format!(
                    "Something went wrong when generating the speech file (request #{}): {}",
                    chunk.index, err
                ));
            }
        }
    }

    Ok(audio)
}
