/*!
IOKit binding for the controller service.

Discovery matches the service class by name, takes the first instance and
opens a user client connection to it. Calls go through
`IOConnectCallStructMethod` with one [`KeyDataFrame`] in each direction.
*/

use std::ffi::{c_char, c_void, CString};
use std::mem::size_of;
use tracing::{debug, warn};

use crate::error::{Result, SmcError};
use crate::frame::KeyDataFrame;
use crate::transport::SmcTransport;

type KernReturn = i32;
type MachPort = u32;
type IoObject = MachPort;
type IoConnect = MachPort;

const KERN_SUCCESS: KernReturn = 0;
const MACH_PORT_NULL: MachPort = 0;

#[link(name = "IOKit", kind = "framework")]
extern "C" {
    fn IOServiceMatching(name: *const c_char) -> *mut c_void;
    fn IOServiceGetMatchingServices(
        main_port: MachPort,
        matching: *mut c_void,
        existing: *mut IoObject,
    ) -> KernReturn;
    fn IOIteratorNext(iterator: IoObject) -> IoObject;
    fn IOObjectRelease(object: IoObject) -> KernReturn;
    fn IOServiceOpen(
        service: IoObject,
        owning_task: MachPort,
        connect_type: u32,
        connect: *mut IoConnect,
    ) -> KernReturn;
    fn IOServiceClose(connect: IoConnect) -> KernReturn;
    fn IOConnectCallStructMethod(
        connection: IoConnect,
        selector: u32,
        input: *const c_void,
        input_size: usize,
        output: *mut c_void,
        output_size: *mut usize,
    ) -> KernReturn;
}

extern "C" {
    static mach_task_self_: MachPort;
}

/// Releases an IOKit object reference when dropped
struct ObjectGuard(IoObject);

impl Drop for ObjectGuard {
    fn drop(&mut self) {
        if self.0 != MACH_PORT_NULL {
            // SAFETY: the guard owns one reference to a live object
            unsafe {
                IOObjectRelease(self.0);
            }
        }
    }
}

/// A user client connection to the controller
#[derive(Debug)]
pub struct IoKitTransport {
    connection: IoConnect,
}

impl IoKitTransport {
    /// Find the first `service_name` instance and open a connection to it
    pub fn connect(service_name: &str) -> Result<Self> {
        let name = CString::new(service_name)
            .map_err(|_| SmcError::service_not_found(service_name))?;

        // SAFETY: `name` outlives the call. The matching dictionary is
        // consumed by IOServiceGetMatchingServices, even on failure.
        let iterator = unsafe {
            let matching = IOServiceMatching(name.as_ptr());
            if matching.is_null() {
                return Err(SmcError::service_not_found(service_name));
            }

            let mut iterator: IoObject = MACH_PORT_NULL;
            let status = IOServiceGetMatchingServices(MACH_PORT_NULL, matching, &mut iterator);
            if status != KERN_SUCCESS {
                debug!("IOServiceGetMatchingServices() = {:#010x}", status);
                return Err(SmcError::service_not_found(service_name));
            }
            ObjectGuard(iterator)
        };

        // SAFETY: the iterator is live for the guard's lifetime
        let device = ObjectGuard(unsafe { IOIteratorNext(iterator.0) });
        drop(iterator);
        if device.0 == MACH_PORT_NULL {
            return Err(SmcError::service_not_found(service_name));
        }

        let mut connection: IoConnect = MACH_PORT_NULL;
        // SAFETY: `device` is a live service reference and `connection` is a
        // valid out-pointer.
        let status = unsafe { IOServiceOpen(device.0, mach_task_self_, 0, &mut connection) };
        if status != KERN_SUCCESS {
            return Err(SmcError::ConnectFailed(status));
        }

        debug!(service = service_name, connection, "Connected to SMC service");
        Ok(Self { connection })
    }
}

impl SmcTransport for IoKitTransport {
    fn call(&mut self, selector: u32, input: &KeyDataFrame) -> Result<KeyDataFrame> {
        if self.connection == MACH_PORT_NULL {
            return Err(SmcError::SessionClosed);
        }

        let mut output = KeyDataFrame::default();
        let mut output_size = size_of::<KeyDataFrame>();

        // SAFETY: both frames are #[repr(C)] and sized as the driver expects
        let status = unsafe {
            IOConnectCallStructMethod(
                self.connection,
                selector,
                (input as *const KeyDataFrame).cast(),
                size_of::<KeyDataFrame>(),
                (&mut output as *mut KeyDataFrame).cast(),
                &mut output_size,
            )
        };

        if status != KERN_SUCCESS {
            return Err(SmcError::CallFailed(status));
        }
        Ok(output)
    }

    fn close(&mut self) -> Result<()> {
        if self.connection == MACH_PORT_NULL {
            return Ok(());
        }

        // SAFETY: the connection is open and is cleared right after
        let status = unsafe { IOServiceClose(self.connection) };
        self.connection = MACH_PORT_NULL;

        if status != KERN_SUCCESS {
            return Err(SmcError::CallFailed(status));
        }
        Ok(())
    }
}

impl Drop for IoKitTransport {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close SMC connection: {}", e);
        }
    }
}
