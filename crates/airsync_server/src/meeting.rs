//! Wire grammar for the meeting-response command.

use crate::error::{ServerError, ServerResult};
use airsync_codec::{TagDecoder, TagEncoder};

/// How the user answered a meeting invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserResponse {
    /// The invitation was accepted.
    Accepted,
    /// The invitation was tentatively accepted.
    Tentative,
    /// The invitation was declined.
    Declined,
}

impl UserResponse {
    /// Encodes to the wire code.
    pub fn to_code(&self) -> u8 {
        match self {
            UserResponse::Accepted => 1,
            UserResponse::Tentative => 2,
            UserResponse::Declined => 3,
        }
    }

    /// Decodes the wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(UserResponse::Accepted),
            2 => Some(UserResponse::Tentative),
            3 => Some(UserResponse::Declined),
            _ => None,
        }
    }
}

/// Per-request outcome reported back to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingResponseStatus {
    /// The response was applied.
    Success,
    /// The request could not be applied, not even through the inbox
    /// fallback.
    InvalidRequest,
    /// The sync state for the invitation's collection is unusable.
    StateError,
    /// The referenced invitation was not found.
    ServerError,
}

impl MeetingResponseStatus {
    /// Encodes to the wire code.
    pub fn to_code(&self) -> u8 {
        match self {
            MeetingResponseStatus::Success => 1,
            MeetingResponseStatus::InvalidRequest => 2,
            MeetingResponseStatus::StateError => 3,
            MeetingResponseStatus::ServerError => 4,
        }
    }

    /// Decodes the wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(MeetingResponseStatus::Success),
            2 => Some(MeetingResponseStatus::InvalidRequest),
            3 => Some(MeetingResponseStatus::StateError),
            4 => Some(MeetingResponseStatus::ServerError),
            _ => None,
        }
    }
}

/// One decoded meeting-response request block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRequest {
    /// The user's answer.
    pub user_response: UserResponse,
    /// The folder holding the invitation.
    pub folder_id: String,
    /// The invitation item id within that folder.
    pub request_id: String,
}

/// One result block of the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingResult {
    /// The request id this result answers.
    pub request_id: String,
    /// The per-request outcome.
    pub status: MeetingResponseStatus,
    /// The created calendar entry, present only on success.
    pub calendar_id: Option<String>,
}

/// Decodes a meeting-response command body.
///
/// The grammar is `MeetingResponse ( Request ( UserResponse | FolderId
/// | RequestId )* )*`. Fields within a `Request` block may appear in
/// any order; the loop probes each known tag in turn and stops when
/// none match. All three fields must be present by the end of the
/// block.
///
/// # Errors
///
/// Returns an error for a body that violates the grammar, omits a
/// required field, carries an unknown user-response code, or has
/// trailing bytes.
pub fn decode_meeting_response(body: &[u8]) -> ServerResult<Vec<MeetingRequest>> {
    let mut decoder = TagDecoder::new(body);
    if !decoder.try_start_tag("MeetingResponse")? {
        return Err(ServerError::invalid_request("expected MeetingResponse"));
    }

    let mut requests = Vec::new();
    while decoder.try_start_tag("Request")? {
        let mut user_response = None;
        let mut folder_id = None;
        let mut request_id = None;

        loop {
            if decoder.try_start_tag("UserResponse")? {
                let code = leaf_text(&mut decoder)?;
                user_response = Some(
                    code.parse::<u8>()
                        .ok()
                        .and_then(UserResponse::from_code)
                        .ok_or_else(|| {
                            ServerError::invalid_request(format!(
                                "unknown UserResponse code {code:?}"
                            ))
                        })?,
                );
            } else if decoder.try_start_tag("FolderId")? {
                folder_id = Some(leaf_text(&mut decoder)?);
            } else if decoder.try_start_tag("RequestId")? {
                request_id = Some(leaf_text(&mut decoder)?);
            } else {
                break;
            }
        }
        decoder.require_end_tag()?;

        let (Some(user_response), Some(folder_id), Some(request_id)) =
            (user_response, folder_id, request_id)
        else {
            return Err(ServerError::invalid_request(
                "Request block missing UserResponse, FolderId or RequestId",
            ));
        };
        requests.push(MeetingRequest {
            user_response,
            folder_id,
            request_id,
        });
    }
    decoder.require_end_tag()?;

    if !decoder.is_empty() {
        return Err(ServerError::invalid_request(
            "trailing bytes after MeetingResponse",
        ));
    }
    Ok(requests)
}

fn leaf_text(decoder: &mut TagDecoder<'_>) -> ServerResult<String> {
    let text = decoder.text_content()?;
    decoder.require_end_tag()?;
    Ok(text)
}

/// Encodes the results of a meeting-response command.
///
/// Result blocks appear in the given order; `CalendarId` is emitted
/// only when the result carries one.
///
/// # Errors
///
/// Returns an error if a field exceeds the codec size limits.
pub fn encode_meeting_results(results: &[MeetingResult]) -> ServerResult<Vec<u8>> {
    let mut encoder = TagEncoder::new();
    encoder.start_tag("MeetingResponse")?;
    for result in results {
        encoder.start_tag("Result")?;

        encoder.start_tag("RequestId")?;
        encoder.text(&result.request_id)?;
        encoder.end_tag()?;

        encoder.start_tag("Status")?;
        encoder.text(&result.status.to_code().to_string())?;
        encoder.end_tag()?;

        if let Some(calendar_id) = &result.calendar_id {
            encoder.start_tag("CalendarId")?;
            encoder.text(calendar_id)?;
            encoder.end_tag()?;
        }

        encoder.end_tag()?;
    }
    encoder.end_tag()?;
    Ok(encoder.into_bytes()?)
}
