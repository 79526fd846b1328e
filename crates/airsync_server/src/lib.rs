//! # AirSync Server
//!
//! Command handlers for AirSync: each handler decodes a request body
//! with [`airsync_codec`], drives the state machine or the backend, and
//! encodes the response.
//!
//! Handlers take their collaborators explicitly at construction; there
//! is no ambient registry to reach into. The meeting-response command
//! is the exemplar:
//!
//! ```rust,ignore
//! use airsync_server::MeetingResponseHandler;
//! use std::sync::Arc;
//!
//! let handler = MeetingResponseHandler::new(Arc::new(backend));
//! let response_bytes = handler.handle(&request_bytes)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod handler;
mod meeting;

pub use error::{ServerError, ServerResult};
pub use handler::MeetingResponseHandler;
pub use meeting::{
    decode_meeting_response, encode_meeting_results, MeetingRequest, MeetingResponseStatus,
    MeetingResult, UserResponse,
};
