use evdev::uinput::{VirtualDevice, VirtualEventStream};
use evdev::{
    AbsInfo, AbsoluteAxisCode, AttributeSet, BusType, FFEffectCode, InputEvent, InputId, KeyCode,
    UInputCode, UInputEvent, UinputAbsSetup,
};
use std::fs::File;
use std::io::{self, Write};
use std::os::fd::AsFd;
use std::task::{Context, Poll};
use tracing::{debug, info};

use crate::config::VirtualDeviceConfig;
use crate::device::ff::{effect_from_data, FfRequestPort, UploadReply};
use crate::device::stream::{EventSink, EventSource};
use crate::device::DeviceError;
use crate::rumble::effect_table::Effect;

/// A uinput gamepad with rumble support.
///
/// Raw events written to it appear on the new evdev node; force-feedback traffic
/// from applications comes back as `EV_UINPUT` / `EV_FF` events on the same fd.
/// The kernel device is destroyed when the last fd closes, i.e. on drop.
pub struct VirtualPad {
    name: String,
    stream: VirtualEventStream,
    sink: File,
}

fn setup_step(step: &'static str) -> impl FnOnce(io::Error) -> DeviceError {
    move |source| DeviceError::Setup { step, source }
}

impl VirtualPad {
    /// Registers the device with uinput. Must be called from within a Tokio runtime.
    pub fn create(config: &VirtualDeviceConfig, ff_effects_max: u32) -> Result<Self, DeviceError> {
        info!("Creating virtual gamepad '{}'", config.name);
        check_name(&config.name)?;

        let keys: AttributeSet<KeyCode> = config.keys.iter().map(|&code| KeyCode(code)).collect();
        let ff: AttributeSet<FFEffectCode> = [FFEffectCode::FF_RUMBLE, FFEffectCode::FF_GAIN]
            .into_iter()
            .collect();

        let mut builder = VirtualDevice::builder()
            .map_err(|source| DeviceError::Open {
                path: "/dev/uinput".into(),
                source,
            })?
            .name(config.name.as_str())
            .input_id(InputId::new(
                BusType(config.bustype),
                config.vendor,
                config.product,
                config.version,
            ))
            .with_keys(&keys)
            .map_err(setup_step("keys"))?;

        for axis in &config.axes {
            let setup = UinputAbsSetup::new(
                AbsoluteAxisCode(axis.code),
                AbsInfo::new(0, axis.min, axis.max, axis.fuzz, axis.flat, 0),
            );
            builder = builder
                .with_absolute_axis(&setup)
                .map_err(setup_step("absolute axis"))?;
        }

        let device = builder
            .with_ff(&ff)
            .map_err(setup_step("force feedback"))?
            .with_ff_effects_max(ff_effects_max)
            .build()
            .map_err(setup_step("device creation"))?;

        let sink = device
            .as_fd()
            .try_clone_to_owned()
            .map(File::from)
            .map_err(setup_step("event sink"))?;
        let stream = device
            .into_event_stream()
            .map_err(|source| DeviceError::Register {
                what: "virtual pad",
                source,
            })?;

        info!(
            "Virtual gamepad '{}' created ({} keys, {} axes, {} effects)",
            config.name,
            config.keys.len(),
            config.axes.len(),
            ff_effects_max
        );

        Ok(Self {
            name: config.name.clone(),
            stream,
            sink,
        })
    }
}

/// uinput names are NUL-terminated inside an 80-byte field.
fn check_name(name: &str) -> Result<(), DeviceError> {
    if name.len() + 1 >= libc::UINPUT_MAX_NAME_SIZE || name.contains('\0') {
        return Err(DeviceError::NameTooLong(name.to_string()));
    }
    Ok(())
}

/// Appends the kernel `input_event` layout of every event to `buf`.
///
/// `struct input_event` has no padding on Linux, so its fields are written back to
/// back in native byte order.
fn encode_events(events: &[InputEvent], buf: &mut Vec<u8>) {
    for event in events {
        let raw: &libc::input_event = event.as_ref();
        buf.extend_from_slice(&raw.time.tv_sec.to_ne_bytes());
        buf.extend_from_slice(&raw.time.tv_usec.to_ne_bytes());
        buf.extend_from_slice(&raw.type_.to_ne_bytes());
        buf.extend_from_slice(&raw.code.to_ne_bytes());
        buf.extend_from_slice(&raw.value.to_ne_bytes());
    }
}

impl EventSource for VirtualPad {
    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<InputEvent>> {
        self.stream.poll_event(cx)
    }
}

impl EventSink for VirtualPad {
    fn write_events(&mut self, events: &[InputEvent]) -> io::Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut buf = Vec::with_capacity(events.len() * std::mem::size_of::<libc::input_event>());
        encode_events(events, &mut buf);
        self.sink.write_all(&buf)
    }
}

impl FfRequestPort for VirtualPad {
    fn answer_upload<F>(&mut self, request_id: u32, decide: F) -> io::Result<UploadReply>
    where
        F: FnOnce(Effect) -> UploadReply,
    {
        let event = UInputEvent::new(UInputCode::UI_FF_UPLOAD, request_id as i32);
        let mut upload = self.stream.device_mut().process_ff_upload(event)?;

        let reply = decide(effect_from_data(upload.effect_id(), &upload.effect()));
        upload.set_effect_id(reply.effect_id);
        upload.set_retval(reply.retval);
        // dropping the upload sends UI_END_FF_UPLOAD
        Ok(reply)
    }

    fn answer_erase<F>(&mut self, request_id: u32, decide: F) -> io::Result<i32>
    where
        F: FnOnce(i32) -> i32,
    {
        let event = UInputEvent::new(UInputCode::UI_FF_ERASE, request_id as i32);
        let mut erase = self.stream.device_mut().process_ff_erase(event)?;

        let retval = decide(erase.effect_id() as i32);
        erase.set_retval(retval);
        Ok(retval)
    }
}

impl std::fmt::Debug for VirtualPad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualPad")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Drop for VirtualPad {
    fn drop(&mut self) {
        debug!("Destroying virtual gamepad '{}'", self.name);
    }
}
