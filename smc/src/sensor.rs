/*!
Temperature facade over the key reader and value decoder.
*/

use tracing::debug;

use crate::decode::{decode_temperature, decode_value};
use crate::error::Result;
use crate::key::SensorKey;
use crate::session::Session;

impl Session {
    /// Read `key` as a temperature in degrees Celsius
    pub fn read_temperature(&mut self, key: SensorKey) -> Result<f64> {
        let value = self.read_key(key)?;
        decode_temperature(&value)
    }

    /// Read `key` as a temperature, reporting any failure as `0.0`
    ///
    /// Meant for display consumers that have no use for the error; the
    /// failure is still logged.
    pub fn read_temperature_or_zero(&mut self, key: SensorKey) -> f64 {
        self.read_temperature(key).unwrap_or_else(|e| {
            debug!(%key, "Temperature unavailable: {}", e);
            0.0
        })
    }

    /// Read `key` and decode it according to its own data type
    pub fn read_value(&mut self, key: SensorKey) -> Result<f64> {
        let value = self.read_key(key)?;
        decode_value(&value)
    }
}
