use evdev::{EventSummary, FFEffectCode, InputEvent, UInputCode};
use std::io;
use std::time::Instant;
use tracing::{debug, warn};

use crate::device::ff::{FfRequestPort, UploadReply};
use crate::rumble::actuator::Actuator;
use crate::rumble::engine::RumbleEngine;

/// Force-feedback traffic read back from the virtual pad.
///
/// Applications talk to the pad through `EVIOCSFF`, `EVIOCRMFF` and `EV_FF` writes;
/// uinput turns those into events on the owner's fd. Only three of them matter to
/// a single on/off motor, everything else (gain, autocenter, input echoes) is
/// dropped by [`ControlMessage::decode`].
///
/// - `Upload` / `Erase` carry the kernel's request id, which must be answered
///   through an [`FfRequestPort`] or the application's ioctl never returns.
/// - `Play` is fire-and-forget: the code is the effect id, the value the repeat
///   count, with 0 meaning stop.
///
/// # Examples
///
/// ```rust
/// use evdev::{EventType, InputEvent};
/// use rumble_proxy::proxy::control::ControlMessage;
///
/// // an application started effect 2
/// let event = InputEvent::new(EventType::FORCEFEEDBACK.0, 2, 1);
/// assert_eq!(
///     ControlMessage::decode(&event),
///     Some(ControlMessage::Play { effect_id: 2, value: 1 })
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Upload { request_id: u32 },
    Erase { request_id: u32 },
    /// `value == 0` stops, anything else plays
    Play { effect_id: u16, value: i32 },
}

impl ControlMessage {
    /// Returns `None` for anything that is not an upload, erase or play.
    pub fn decode(event: &InputEvent) -> Option<Self> {
        match event.destructure() {
            EventSummary::UInput(_, UInputCode::UI_FF_UPLOAD, value) => {
                Some(ControlMessage::Upload {
                    request_id: value as u32,
                })
            }
            EventSummary::UInput(_, UInputCode::UI_FF_ERASE, value) => {
                Some(ControlMessage::Erase {
                    request_id: value as u32,
                })
            }
            EventSummary::ForceFeedback(_, FFEffectCode::FF_GAIN, _) => None,
            EventSummary::ForceFeedback(_, code, value) => Some(ControlMessage::Play {
                effect_id: code.0,
                value,
            }),
            _ => None,
        }
    }
}

/// Handles one control message synchronously, replying to the kernel when needed.
pub fn dispatch<P: FfRequestPort, A: Actuator>(
    message: ControlMessage,
    port: &mut P,
    engine: &mut RumbleEngine<A>,
    now: Instant,
) -> io::Result<()> {
    match message {
        ControlMessage::Upload { request_id } => {
            let reply = port.answer_upload(request_id, |effect| match engine.upload(effect) {
                Ok(id) => UploadReply::accepted(id),
                Err(e) => {
                    debug!("Rejecting upload request {}: {}", request_id, e);
                    UploadReply::rejected(effect.id, e.errno())
                }
            })?;
            debug!("Upload request {} answered with {:?}", request_id, reply);
            Ok(())
        }
        ControlMessage::Erase { request_id } => {
            port.answer_erase(request_id, |effect_id| {
                if let Err(e) = engine.erase(effect_id) {
                    debug!("Erase request {} ignored: {}", request_id, e);
                }
                0
            })?;
            Ok(())
        }
        ControlMessage::Play { effect_id, value } => {
            let outcome = engine.play(i32::from(effect_id), value, now);
            debug!("Play effect {} value {}: {:?}", effect_id, value, outcome);
            Ok(())
        }
    }
}

/// Handles every control message in `events`, in order.
///
/// A failed reply is logged and skipped so one stale request cannot block the
/// rest. Returns the number of control messages seen.
pub fn handle_control_events<P, A>(
    events: &[InputEvent],
    port: &mut P,
    engine: &mut RumbleEngine<A>,
) -> usize
where
    P: FfRequestPort,
    A: Actuator,
{
    let mut handled = 0;
    for event in events {
        let Some(message) = ControlMessage::decode(event) else {
            continue;
        };
        if let Err(e) = dispatch(message, port, engine, Instant::now()) {
            warn!("Failed to answer {:?}: {}", message, e);
        }
        handled += 1;
    }
    handled
}
