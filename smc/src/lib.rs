/*!
# SMC Protocol

Reads sensor values from the System Management Controller through its
key/value interface.

## Core Types

- [`SensorKey`] - four-character key such as `TC0P`
- [`TypeTag`] - four-character wire data type such as `sp78`
- [`KeyDataFrame`] - the fixed-size request/response frame
- [`Session`] - an open connection to the controller
- [`RawSensorValue`] - typed bytes returned by a two-phase read

## Modules

- [`key`] - key and data-type codec
- [`frame`] - wire frame layout and request builders
- [`transport`] - the call primitive and a scripted transport for tests
- [`session`] - session lifecycle, worker thread and call timeouts
- [`reader`] - the two-phase read protocol
- [`decode`] - fixed-point and integer value decoding
- [`sensor`] - temperature facade
- [`error`] - error types

## Example

```no_run
use smc::{Session, keys};

let mut session = Session::open()?;
let cpu = session.read_temperature(keys::CPU_PROXIMITY)?;
println!("CPU: {}", cpu);
session.close()?;
# Ok::<(), smc::SmcError>(())
```
*/

pub mod decode;
pub mod error;
pub mod frame;
#[cfg(target_os = "macos")]
pub mod iokit;
pub mod key;
pub mod reader;
pub mod sensor;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use decode::{decode_temperature, decode_value, DataType};
pub use error::{Result, SmcError};
pub use frame::{KeyDataFrame, KeyInfoBlock};
pub use key::{decode_type_tag, encode_key, SensorKey, TypeTag};
pub use reader::{KeyInfo, RawSensorValue};
pub use session::{Session, SessionOptions};
pub use transport::{CallLog, ScriptedTransport, SmcTransport};

/// Version information for the SMC library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol constants
pub mod protocol {
    use std::time::Duration;

    /// IOKit class name of the controller service
    pub const SERVICE_NAME: &str = "AppleSMC";

    /// Driver selector for key/value struct calls
    pub const KERNEL_INDEX_SMC: u32 = 2;

    /// Size of the payload region of a frame in bytes
    pub const PAYLOAD_SIZE: usize = 32;

    /// Default bound on a single call
    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(1);

    /// Sub-commands carried in the frame's `data8` field
    pub mod command {
        pub const READ_BYTES: u8 = 5;
        pub const READ_KEYINFO: u8 = 9;
    }

    /// Controller result byte values
    pub mod result_code {
        pub const SUCCESS: u8 = 0;
        pub const KEY_NOT_FOUND: u8 = 0x84;
    }
}

/// Well-known sensor keys
pub mod keys {
    use crate::key::SensorKey;

    /// CPU proximity temperature
    pub const CPU_PROXIMITY: SensorKey = SensorKey::from_bytes(*b"TC0P");

    /// GPU proximity temperature
    pub const GPU_PROXIMITY: SensorKey = SensorKey::from_bytes(*b"TG0P");
}
