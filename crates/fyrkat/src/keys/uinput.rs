//! Virtual keyboard backed by /dev/uinput
//!
//! Creates a uinput device registered for exactly the keys this peripheral
//! can emit (the ten digits and Enter) and posts key transitions to it.
//! Requires the uinput module to be loaded and write access to /dev/uinput.

use super::codes::{emittable_codes, KeyCode};
use super::{InjectError, KeyEventSink};
use std::os::unix::io::RawFd;
use std::time::Duration;
use tracing::{info, trace};

const UINPUT_PATH: &str = "/dev/uinput";
const DEVICE_NAME: &[u8] = b"fyrkat virtual keypad";

// uinput ioctl requests
const UI_DEV_CREATE: libc::c_ulong = 0x5501;
const UI_DEV_DESTROY: libc::c_ulong = 0x5502;
const UI_DEV_SETUP: libc::c_ulong = 0x405C_5503;
const UI_SET_EVBIT: libc::c_ulong = 0x4004_5564;
const UI_SET_KEYBIT: libc::c_ulong = 0x4004_5565;

// input event types
const EV_SYN: u16 = 0x00;
const EV_KEY: u16 = 0x01;
const SYN_REPORT: u16 = 0x00;

const BUS_VIRTUAL: u16 = 0x06;

#[repr(C)]
struct InputId {
    bustype: u16,
    vendor: u16,
    product: u16,
    version: u16,
}

#[repr(C)]
struct UinputSetup {
    id: InputId,
    name: [u8; 80],
    ff_effects_max: u32,
}

#[repr(C)]
struct InputEvent {
    time: libc::timeval,
    type_: u16,
    code: u16,
    value: i32,
}

/// A virtual keyboard device
#[derive(Debug)]
pub struct UinputKeyboard {
    fd: RawFd,
}

impl UinputKeyboard {
    /// Check whether the uinput device node exists
    pub fn is_available() -> bool {
        std::path::Path::new(UINPUT_PATH).exists()
    }

    /// Create the virtual keyboard device
    pub fn open() -> Result<Self, InjectError> {
        let fd = unsafe {
            libc::open(
                b"/dev/uinput\0".as_ptr() as *const libc::c_char,
                libc::O_WRONLY | libc::O_NONBLOCK,
            )
        };

        if fd < 0 {
            return Err(InjectError::Open(std::io::Error::last_os_error()));
        }

        let keyboard = UinputKeyboard { fd };
        keyboard.setup()?;

        // The compositor needs a moment to bind the new device before the
        // first events arrive, or they are silently dropped.
        std::thread::sleep(Duration::from_millis(200));

        info!("virtual keypad device created");
        Ok(keyboard)
    }

    fn setup(&self) -> Result<(), InjectError> {
        self.ioctl_int(UI_SET_EVBIT, EV_KEY as libc::c_int)?;
        for code in emittable_codes() {
            self.ioctl_int(UI_SET_KEYBIT, code.0 as libc::c_int)?;
        }

        let mut setup = UinputSetup {
            id: InputId {
                bustype: BUS_VIRTUAL,
                vendor: 0,
                product: 0,
                version: 1,
            },
            name: [0u8; 80],
            ff_effects_max: 0,
        };
        setup.name[..DEVICE_NAME.len()].copy_from_slice(DEVICE_NAME);

        let result = unsafe { libc::ioctl(self.fd, UI_DEV_SETUP, &setup as *const UinputSetup) };
        if result < 0 {
            return Err(InjectError::Setup(std::io::Error::last_os_error()));
        }

        let result = unsafe { libc::ioctl(self.fd, UI_DEV_CREATE) };
        if result < 0 {
            return Err(InjectError::Setup(std::io::Error::last_os_error()));
        }

        Ok(())
    }

    fn ioctl_int(&self, request: libc::c_ulong, value: libc::c_int) -> Result<(), InjectError> {
        let result = unsafe { libc::ioctl(self.fd, request, value) };
        if result < 0 {
            return Err(InjectError::Setup(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    fn emit(&self, type_: u16, code: u16, value: i32) -> Result<(), InjectError> {
        let event = InputEvent {
            time: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            type_,
            code,
            value,
        };

        let size = std::mem::size_of::<InputEvent>();
        let written = unsafe {
            libc::write(
                self.fd,
                &event as *const InputEvent as *const libc::c_void,
                size,
            )
        };

        if written != size as isize {
            return Err(InjectError::Emit(std::io::Error::last_os_error()));
        }

        Ok(())
    }
}

impl KeyEventSink for UinputKeyboard {
    fn send_key(&mut self, code: KeyCode, pressed: bool) -> Result<(), InjectError> {
        trace!(code = code.0, pressed, "key event");

        // Each transition is its own report
        self.emit(EV_KEY, code.0, pressed as i32)?;
        self.emit(EV_SYN, SYN_REPORT, 0)
    }
}

impl Drop for UinputKeyboard {
    fn drop(&mut self) {
        unsafe {
            libc::ioctl(self.fd, UI_DEV_DESTROY);
            libc::close(self.fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_struct_layout() {
        // The kernel ABI fixes these sizes; UI_DEV_SETUP encodes 92.
        assert_eq!(std::mem::size_of::<InputId>(), 8);
        assert_eq!(std::mem::size_of::<UinputSetup>(), 92);
        assert_eq!(std::mem::size_of::<InputEvent>(), 24);
    }

    #[test]
    fn test_device_name_fits_setup_field() {
        assert!(DEVICE_NAME.len() < 80);
    }
}
