//! Force-feedback request plumbing between the virtual device and the rumble engine.
//!
//! The kernel parks an application's `EVIOCSFF` / `EVIOCRMFF` call until the uinput
//! owner answers it. The request id arrives in an `EV_UINPUT` event and the answer
//! must carry the same id, so a port fetches the request, lets the caller decide
//! and sends the reply in one call.

use evdev::{FFEffectCode, FFEffectData, FFEffectKind};
use std::io;

use crate::rumble::effect_table::{Effect, EffectKind};

/// The answer to one upload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReply {
    /// Id the application gets back for the effect
    pub effect_id: i16,
    /// 0 on success, a negative errno otherwise
    pub retval: i32,
}

impl UploadReply {
    pub fn accepted(effect_id: i16) -> Self {
        Self {
            effect_id,
            retval: 0,
        }
    }

    /// Keeps the requested id and reports `errno` to the application.
    pub fn rejected(effect_id: i16, errno: i32) -> Self {
        Self {
            effect_id,
            retval: errno,
        }
    }
}

/// The side of the uinput protocol that answers force-feedback requests.
pub trait FfRequestPort {
    /// Fetches upload `request_id`, passes its effect to `decide` and sends the reply.
    fn answer_upload<F>(&mut self, request_id: u32, decide: F) -> io::Result<UploadReply>
    where
        F: FnOnce(Effect) -> UploadReply;

    /// Fetches erase `request_id`, passes its effect id to `decide` and sends the
    /// returned retval.
    fn answer_erase<F>(&mut self, request_id: u32, decide: F) -> io::Result<i32>
    where
        F: FnOnce(i32) -> i32;
}

/// Converts an uploaded payload into the engine's representation.
pub fn effect_from_data(id: i16, data: &FFEffectData) -> Effect {
    match data.kind {
        FFEffectKind::Rumble {
            strong_magnitude,
            weak_magnitude,
        } => Effect::rumble(id, strong_magnitude, weak_magnitude, data.replay.length),
        other => Effect {
            id,
            kind: EffectKind::Other(FFEffectCode::from(other).0),
            strong_magnitude: 0,
            weak_magnitude: 0,
            duration_ms: data.replay.length,
        },
    }
}
