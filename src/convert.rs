//! Pure conversion pipeline from raw ADC counts to Celsius temperatures.
//!
//! The chips report the ratio of the voltage over the thermistor to the
//! supply voltage as an ADC count. The ratio is inverted through the voltage
//! divider to a resistance, and the resistance mapped to a temperature with
//! the Steinhart--Hart three-term approximation.

use snafu::ensure;

use crate::{Error, OutOfRangeSnafu};

/// A thermistor modelled by its Steinhart--Hart coefficients (A, B, C).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thermistor {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Thermistor {
    /// Temperature in Celsius at the given resistance (ohms).
    pub fn celsius(&self, resistance: f64) -> f64 {
        let ln_r = resistance.ln();
        let kelvin_recip = self.a + self.b * ln_r + self.c * ln_r.powi(3);
        1.0 / kelvin_recip - 273.15
    }
}

/// Immutable calibration supplied once at startup.
///
/// The divider topology is fixed: the thermistor sits on the measured side
/// of the divider, so `R = ratio / (1 - ratio) * series_resistor` and the
/// measured resistance grows with the ADC count. Boards wired the other way
/// around need their ratio inverted before it reaches this model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationModel {
    pub thermistor: Thermistor,
    /// Resistance of the divider's series resistor, in ohms.
    pub series_resistor: f64,
    /// The ADC count that represents ratio = 1, e.g. 1023 for 10 bits.
    pub adc_full_scale: u32,
}

impl CalibrationModel {
    /// The voltage ratio in \[0, 1\] corresponding to an ADC count.
    pub fn ratio(&self, count: u16) -> f64 {
        f64::from(count) / f64::from(self.adc_full_scale)
    }

    /// The thermistor resistance at the given voltage ratio.
    pub fn resistance(&self, ratio: f64) -> f64 {
        ratio / (1.0 - ratio) * self.series_resistor
    }

    /// Run the whole pipeline: count to ratio to resistance to Celsius.
    /// # Errors
    /// Returns [`Error::OutOfRange`] when the ratio is 0 or 1, where the
    /// divider inversion degenerates and no finite temperature exists.
    pub fn celsius(&self, count: u16) -> Result<f64, Error> {
        let ratio = self.ratio(count);
        ensure!(ratio > 0.0 && ratio < 1.0, OutOfRangeSnafu { count });
        Ok(self.thermistor.celsius(self.resistance(ratio)))
    }
}
