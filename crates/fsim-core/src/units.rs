// fsim-core/src/units.rs

use uom::si::f64::{
    MassRate as UomMassRate, Pressure as UomPressure,
    ThermodynamicTemperature as UomThermodynamicTemperature,
};

// Public canonical unit types (SI, f64)
pub type MassRate = UomMassRate;
pub type Pressure = UomPressure;
pub type Temperature = UomThermodynamicTemperature;

#[inline]
pub fn pa(v: f64) -> Pressure {
    use uom::si::pressure::pascal;
    Pressure::new::<pascal>(v)
}

#[inline]
pub fn k(v: f64) -> Temperature {
    use uom::si::thermodynamic_temperature::kelvin;
    Temperature::new::<kelvin>(v)
}

#[inline]
pub fn kgps(v: f64) -> MassRate {
    use uom::si::mass_rate::kilogram_per_second;
    MassRate::new::<kilogram_per_second>(v)
}

/// Raw SI magnitude helpers for the numeric kernels.
pub mod raw {
    use super::*;

    #[inline]
    pub fn kgps_of(v: MassRate) -> f64 {
        v.get::<uom::si::mass_rate::kilogram_per_second>()
    }

    #[inline]
    pub fn k_of(v: Temperature) -> f64 {
        v.get::<uom::si::thermodynamic_temperature::kelvin>()
    }

    #[inline]
    pub fn pa_of(v: Pressure) -> f64 {
        v.get::<uom::si::pressure::pascal>()
    }
}

/// Standard conditions used as stream defaults.
pub mod constants {
    pub const STANDARD_TEMPERATURE_K: f64 = 298.15;
    pub const STANDARD_PRESSURE_PA: f64 = 101_325.0;
}
