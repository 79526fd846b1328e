//! The meeting-response command handler.

use crate::error::ServerResult;
use crate::meeting::{
    decode_meeting_response, encode_meeting_results, MeetingRequest, MeetingResponseStatus,
    MeetingResult,
};
use airsync_protocol::INBOX_FOLDER_ID;
use airsync_state::Backend;
use std::sync::Arc;
use tracing::{debug, warn};

/// Handles the meeting-response command.
///
/// Each request block is resolved independently against the backend;
/// one failing invitation degrades only its own result block, never
/// the sibling requests or the command as a whole.
pub struct MeetingResponseHandler<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> MeetingResponseHandler<B> {
    /// Creates a handler over the given backend.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Decodes a command body, applies every request, and encodes the
    /// response. Results appear in request order.
    ///
    /// # Errors
    ///
    /// Returns an error only for an undecodable body; per-request
    /// failures are reported in their result's status instead.
    pub fn handle(&self, body: &[u8]) -> ServerResult<Vec<u8>> {
        let requests = decode_meeting_response(body)?;
        debug!("meeting response with {} request(s)", requests.len());

        let results: Vec<MeetingResult> = requests
            .iter()
            .map(|request| self.apply_request(request))
            .collect();
        encode_meeting_results(&results)
    }

    fn apply_request(&self, request: &MeetingRequest) -> MeetingResult {
        match self
            .backend
            .resolve_request_target(&request.folder_id, &request.request_id)
        {
            Ok(calendar_id) => success(request, calendar_id),
            Err(err) if err.is_not_found() => {
                warn!(
                    "meeting request {} not found in folder {}",
                    request.request_id, request.folder_id
                );
                failure(request, MeetingResponseStatus::ServerError)
            }
            Err(err) => {
                // Some clients report the wrong source folder for
                // invitations that actually live in the inbox.
                warn!(
                    "meeting request {} failed in folder {} ({}), retrying in {}",
                    request.request_id, request.folder_id, err, INBOX_FOLDER_ID
                );
                match self
                    .backend
                    .resolve_request_target(INBOX_FOLDER_ID, &request.request_id)
                {
                    Ok(calendar_id) => success(request, calendar_id),
                    Err(retry_err) => {
                        warn!(
                            "meeting request {} failed on inbox retry: {}",
                            request.request_id, retry_err
                        );
                        failure(request, MeetingResponseStatus::InvalidRequest)
                    }
                }
            }
        }
    }
}

fn success(request: &MeetingRequest, calendar_id: String) -> MeetingResult {
    MeetingResult {
        request_id: request.request_id.clone(),
        status: MeetingResponseStatus::Success,
        calendar_id: Some(calendar_id),
    }
}

fn failure(request: &MeetingRequest, status: MeetingResponseStatus) -> MeetingResult {
    MeetingResult {
        request_id: request.request_id.clone(),
        status,
        calendar_id: None,
    }
}
