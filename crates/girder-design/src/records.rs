//! Design input/output records.
//!
//! Both records are plain immutable data supplied by the caller: the input is
//! what the engineer typed in, the output is whatever the upstream design
//! computation produced. Nothing in this crate computes engineering values;
//! it only moves them into template cells and audits the populated workbook.

use serde::{Deserialize, Serialize};

/// Engineer-supplied design parameters.
///
/// Scalars are meters, cumecs, and MPa as labelled in the template's INSERT
/// sheets; `soil_bearing_capacity` is tonnes/m².
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DesignInput {
    /// Total bridge span (m).
    pub span: f64,
    /// Deck width (m).
    pub width: f64,
    /// Design discharge (cumecs).
    pub discharge: f64,
    /// Highest Flood Level, HFL (m above datum).
    pub flood_level: f64,
    /// River bed level (m above datum). Surveys sometimes omit it; a map
    /// that references it then fails population rather than inventing zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bed_level: Option<f64>,
    /// Longitudinal bed slope (dimensionless).
    pub bed_slope: f64,
    /// Concrete grade, fck (MPa).
    pub fck: f64,
    /// Steel grade, fy (MPa).
    pub fy: f64,
    /// Safe soil bearing capacity (tonnes/m²).
    pub soil_bearing_capacity: f64,
    pub number_of_lanes: u32,
    /// IRC loading class (e.g. "Class AA", "70R").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_class: Option<String>,
}

/// Computed design quantities, grouped the way the template groups them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DesignOutput {
    pub hydraulics: Hydraulics,
    pub levels: Levels,
    pub pier: Pier,
    pub abutment: Abutment,
    pub slab: Slab,
    pub quantities: Quantities,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hydraulics {
    /// Rise in upstream water level caused by the obstruction (m).
    pub afflux: f64,
    /// Mean flow velocity through the waterway (m/s).
    pub velocity: f64,
    /// Effective waterway cross-section (m²).
    pub cross_sectional_area: f64,
    /// Contraction loss component (m).
    pub contraction: f64,
    /// HFL + afflux (m above datum).
    pub design_water_level: f64,
}

/// Reference elevations (m above datum, ~100 m scale).
///
/// The two soffit notions are deliberately distinct. The structural soffit is
/// the underside of the deck slab; the hydraulic soffit is the HFL-defined
/// clearance elevation ("the soffit of the deck is at HFL" in the source
/// template). Conflating them is exactly the reconciliation mistake the audit
/// exists to catch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Levels {
    pub deck_level: f64,
    pub structural_soffit_level: f64,
    pub hydraulic_soffit_level: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pier {
    pub width: f64,
    pub length: f64,
    pub number_of_piers: u32,
    pub spacing: f64,
    pub base_width: f64,
    pub base_length: f64,
    pub stability: StabilityFos,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Abutment {
    pub height: f64,
    pub width: f64,
    pub depth: f64,
    pub base_width: f64,
    pub base_length: f64,
    pub wing_wall_height: f64,
    pub wing_wall_thickness: f64,
    /// Concrete volumes (m³) for the estimate sheet.
    pub abutment_concrete: f64,
    pub base_concrete: f64,
    pub wing_wall_concrete: f64,
    /// Active earth pressure resultant (kN).
    pub active_earth_pressure: f64,
    /// Total vertical load at base (kN).
    pub vertical_load: f64,
    pub stability: StabilityFos,
}

/// Factors of safety from a stability check.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StabilityFos {
    pub sliding: f64,
    pub overturning: f64,
    pub bearing: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slab {
    /// Deck slab thickness (m).
    pub thickness: f64,
    /// Wearing coat thickness (m); 0.075 is the conventional 75 mm coat.
    pub wearing_coat: f64,
}

/// Material take-off totals for the estimate sheet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quantities {
    /// Total concrete (m³).
    pub total_concrete: f64,
    /// Total steel (tonnes).
    pub total_steel: f64,
    /// Formwork area (m²).
    pub formwork: f64,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A consistent sample design: deck 101.6 = soffit 100.6 + slab 0.85 +
    /// wearing coat 0.075, within the default audit tolerance.
    pub fn sample_input() -> DesignInput {
        DesignInput {
            span: 10.0,
            width: 12.0,
            discharge: 850.0,
            flood_level: 100.6,
            bed_level: Some(95.0),
            bed_slope: 0.001,
            fck: 25.0,
            fy: 415.0,
            soil_bearing_capacity: 45.0,
            number_of_lanes: 2,
            load_class: Some("Class AA".to_string()),
        }
    }

    pub fn sample_output() -> DesignOutput {
        DesignOutput {
            hydraulics: Hydraulics {
                afflux: 0.296,
                velocity: 3.2,
                cross_sectional_area: 265.6,
                contraction: 0.148,
                design_water_level: 100.896,
            },
            levels: Levels {
                deck_level: 101.6,
                structural_soffit_level: 100.6,
                hydraulic_soffit_level: 100.6,
            },
            pier: Pier {
                width: 1.2,
                length: 8.5,
                number_of_piers: 1,
                spacing: 8.8,
                base_width: 3.0,
                base_length: 10.0,
                stability: StabilityFos {
                    sliding: 1.8,
                    overturning: 2.4,
                    bearing: 1.6,
                },
            },
            abutment: Abutment {
                height: 6.5,
                width: 1.5,
                depth: 12.0,
                base_width: 4.5,
                base_length: 13.0,
                wing_wall_height: 5.0,
                wing_wall_thickness: 0.5,
                abutment_concrete: 117.0,
                base_concrete: 70.2,
                wing_wall_concrete: 25.0,
                active_earth_pressure: 420.0,
                vertical_load: 3150.0,
                stability: StabilityFos {
                    sliding: 1.7,
                    overturning: 2.2,
                    bearing: 1.5,
                },
            },
            slab: Slab {
                thickness: 0.85,
                wearing_coat: 0.075,
            },
            quantities: Quantities {
                total_concrete: 485.0,
                total_steel: 38.5,
                formwork: 920.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{sample_input, sample_output};
    use super::*;

    #[test]
    fn records_roundtrip_through_json() {
        let input = sample_input();
        let json = serde_json::to_string(&input).unwrap();
        let back: DesignInput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, input);

        let output = sample_output();
        let json = serde_json::to_string(&output).unwrap();
        let back: DesignOutput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, output);
    }

    #[test]
    fn optional_survey_fields_default_to_absent() {
        let json = r#"{
            "span": 10.0, "width": 12.0, "discharge": 850.0,
            "flood_level": 100.6, "bed_slope": 0.001,
            "fck": 25.0, "fy": 415.0, "soil_bearing_capacity": 45.0,
            "number_of_lanes": 2
        }"#;
        let input: DesignInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.bed_level, None);
        assert_eq!(input.load_class, None);
    }
}
