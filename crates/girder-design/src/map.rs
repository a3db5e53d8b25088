//! The template cell-address map.
//!
//! A [`CellAddressMap`] is the single authoritative table of where each
//! design quantity lands in the template: one row per
//! `(sheet name, field, coordinate)`. Construction enforces the load-bearing
//! invariant that no coordinate is bound twice; two fields aliasing one cell
//! would silently overwrite each other in address order.

use core::fmt;
use std::collections::BTreeSet;

use girder_model::{CellRef, CellValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::{DesignInput, DesignOutput};

/// Selector for a value in the design records (or a fixed label string).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// A fixed caption written next to a value cell.
    Label(String),
    Input(InputField),
    Output(OutputField),
}

impl Field {
    pub fn label(text: impl Into<String>) -> Self {
        Field::Label(text.into())
    }

    /// Resolve the selector against the records. `None` means the records do
    /// not carry the value (an optional survey field left empty).
    pub fn resolve(&self, input: &DesignInput, output: &DesignOutput) -> Option<CellValue> {
        match self {
            Field::Label(text) => Some(CellValue::String(text.clone())),
            Field::Input(f) => f.resolve(input),
            Field::Output(f) => Some(f.resolve(output)),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Label(text) => write!(f, "label {text:?}"),
            Field::Input(field) => write!(f, "input.{field}"),
            Field::Output(field) => write!(f, "output.{field}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputField {
    Span,
    Width,
    Discharge,
    FloodLevel,
    BedLevel,
    BedSlope,
    Fck,
    Fy,
    SoilBearingCapacity,
    NumberOfLanes,
    LoadClass,
}

impl InputField {
    fn resolve(self, input: &DesignInput) -> Option<CellValue> {
        Some(match self {
            InputField::Span => input.span.into(),
            InputField::Width => input.width.into(),
            InputField::Discharge => input.discharge.into(),
            InputField::FloodLevel => input.flood_level.into(),
            InputField::BedLevel => input.bed_level?.into(),
            InputField::BedSlope => input.bed_slope.into(),
            InputField::Fck => input.fck.into(),
            InputField::Fy => input.fy.into(),
            InputField::SoilBearingCapacity => input.soil_bearing_capacity.into(),
            InputField::NumberOfLanes => (input.number_of_lanes as f64).into(),
            InputField::LoadClass => input.load_class.clone()?.into(),
        })
    }
}

impl fmt::Display for InputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputField::Span => "span",
            InputField::Width => "width",
            InputField::Discharge => "discharge",
            InputField::FloodLevel => "flood_level",
            InputField::BedLevel => "bed_level",
            InputField::BedSlope => "bed_slope",
            InputField::Fck => "fck",
            InputField::Fy => "fy",
            InputField::SoilBearingCapacity => "soil_bearing_capacity",
            InputField::NumberOfLanes => "number_of_lanes",
            InputField::LoadClass => "load_class",
        };
        f.write_str(name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputField {
    Afflux,
    Velocity,
    CrossSectionalArea,
    Contraction,
    DesignWaterLevel,
    DeckLevel,
    StructuralSoffitLevel,
    HydraulicSoffitLevel,
    AbutmentHeight,
    AbutmentWidth,
    AbutmentDepth,
    AbutmentBaseWidth,
    AbutmentBaseLength,
    WingWallHeight,
    WingWallThickness,
    AbutmentConcrete,
    AbutmentBaseConcrete,
    WingWallConcrete,
    ActiveEarthPressure,
    VerticalLoad,
    AbutmentSlidingFos,
    AbutmentOverturningFos,
    AbutmentBearingFos,
    SlabThickness,
    WearingCoat,
    TotalConcrete,
    TotalSteel,
    Formwork,
}

impl OutputField {
    fn resolve(self, output: &DesignOutput) -> CellValue {
        match self {
            OutputField::Afflux => output.hydraulics.afflux.into(),
            OutputField::Velocity => output.hydraulics.velocity.into(),
            OutputField::CrossSectionalArea => output.hydraulics.cross_sectional_area.into(),
            OutputField::Contraction => output.hydraulics.contraction.into(),
            OutputField::DesignWaterLevel => output.hydraulics.design_water_level.into(),
            OutputField::DeckLevel => output.levels.deck_level.into(),
            OutputField::StructuralSoffitLevel => output.levels.structural_soffit_level.into(),
            OutputField::HydraulicSoffitLevel => output.levels.hydraulic_soffit_level.into(),
            OutputField::AbutmentHeight => output.abutment.height.into(),
            OutputField::AbutmentWidth => output.abutment.width.into(),
            OutputField::AbutmentDepth => output.abutment.depth.into(),
            OutputField::AbutmentBaseWidth => output.abutment.base_width.into(),
            OutputField::AbutmentBaseLength => output.abutment.base_length.into(),
            OutputField::WingWallHeight => output.abutment.wing_wall_height.into(),
            OutputField::WingWallThickness => output.abutment.wing_wall_thickness.into(),
            OutputField::AbutmentConcrete => output.abutment.abutment_concrete.into(),
            OutputField::AbutmentBaseConcrete => output.abutment.base_concrete.into(),
            OutputField::WingWallConcrete => output.abutment.wing_wall_concrete.into(),
            OutputField::ActiveEarthPressure => output.abutment.active_earth_pressure.into(),
            OutputField::VerticalLoad => output.abutment.vertical_load.into(),
            OutputField::AbutmentSlidingFos => output.abutment.stability.sliding.into(),
            OutputField::AbutmentOverturningFos => output.abutment.stability.overturning.into(),
            OutputField::AbutmentBearingFos => output.abutment.stability.bearing.into(),
            OutputField::SlabThickness => output.slab.thickness.into(),
            OutputField::WearingCoat => output.slab.wearing_coat.into(),
            OutputField::TotalConcrete => output.quantities.total_concrete.into(),
            OutputField::TotalSteel => output.quantities.total_steel.into(),
            OutputField::Formwork => output.quantities.formwork.into(),
        }
    }
}

impl fmt::Display for OutputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputField::Afflux => "hydraulics.afflux",
            OutputField::Velocity => "hydraulics.velocity",
            OutputField::CrossSectionalArea => "hydraulics.cross_sectional_area",
            OutputField::Contraction => "hydraulics.contraction",
            OutputField::DesignWaterLevel => "hydraulics.design_water_level",
            OutputField::DeckLevel => "levels.deck_level",
            OutputField::StructuralSoffitLevel => "levels.structural_soffit_level",
            OutputField::HydraulicSoffitLevel => "levels.hydraulic_soffit_level",
            OutputField::AbutmentHeight => "abutment.height",
            OutputField::AbutmentWidth => "abutment.width",
            OutputField::AbutmentDepth => "abutment.depth",
            OutputField::AbutmentBaseWidth => "abutment.base_width",
            OutputField::AbutmentBaseLength => "abutment.base_length",
            OutputField::WingWallHeight => "abutment.wing_wall_height",
            OutputField::WingWallThickness => "abutment.wing_wall_thickness",
            OutputField::AbutmentConcrete => "abutment.abutment_concrete",
            OutputField::AbutmentBaseConcrete => "abutment.base_concrete",
            OutputField::WingWallConcrete => "abutment.wing_wall_concrete",
            OutputField::ActiveEarthPressure => "abutment.active_earth_pressure",
            OutputField::VerticalLoad => "abutment.vertical_load",
            OutputField::AbutmentSlidingFos => "abutment.stability.sliding",
            OutputField::AbutmentOverturningFos => "abutment.stability.overturning",
            OutputField::AbutmentBearingFos => "abutment.stability.bearing",
            OutputField::SlabThickness => "slab.thickness",
            OutputField::WearingCoat => "slab.wearing_coat",
            OutputField::TotalConcrete => "quantities.total_concrete",
            OutputField::TotalSteel => "quantities.total_steel",
            OutputField::Formwork => "quantities.formwork",
        };
        f.write_str(name)
    }
}

/// One row of the map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CellBinding {
    pub sheet: String,
    pub field: Field,
    #[serde(with = "a1")]
    pub cell: CellRef,
}

impl CellBinding {
    pub fn new(sheet: &str, field: Field, a1: &str) -> Result<Self, MapError> {
        let cell = CellRef::from_a1(a1).map_err(|source| MapError::BadAddress {
            sheet: sheet.to_string(),
            address: a1.to_string(),
            source,
        })?;
        Ok(Self {
            sheet: sheet.to_string(),
            field,
            cell,
        })
    }
}

/// Errors raised while building a map.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum MapError {
    #[error("invalid cell address {address:?} on sheet {sheet:?}: {source}")]
    BadAddress {
        sheet: String,
        address: String,
        source: girder_model::A1ParseError,
    },
    #[error("{first} and {second} both map to {sheet:?}!{cell}")]
    AliasedCoordinate {
        sheet: String,
        cell: CellRef,
        first: Field,
        second: Field,
    },
}

/// A validated, ordered set of cell bindings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CellBinding>", into = "Vec<CellBinding>")]
pub struct CellAddressMap {
    bindings: Vec<CellBinding>,
}

impl CellAddressMap {
    /// Build a map, rejecting coordinate aliasing.
    pub fn new(bindings: Vec<CellBinding>) -> Result<Self, MapError> {
        let mut seen: BTreeSet<(&str, u32, u32)> = BTreeSet::new();
        for binding in &bindings {
            let key = (binding.sheet.as_str(), binding.cell.row, binding.cell.col);
            if !seen.insert(key) {
                let first = bindings
                    .iter()
                    .find(|b| b.sheet == binding.sheet && b.cell == binding.cell)
                    .expect("duplicate key has a first occurrence");
                return Err(MapError::AliasedCoordinate {
                    sheet: binding.sheet.clone(),
                    cell: binding.cell,
                    first: first.field.clone(),
                    second: binding.field.clone(),
                });
            }
        }
        Ok(Self { bindings })
    }

    pub fn bindings(&self) -> &[CellBinding] {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// The distinct sheet names the map writes to, in first-use order.
    pub fn sheet_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for binding in &self.bindings {
            if !names.contains(&binding.sheet.as_str()) {
                names.push(binding.sheet.as_str());
            }
        }
        names
    }

    /// The built-in map for the master bridge-design template's three INSERT
    /// sheets. Coordinates follow the template's blocked layout: captions in
    /// column A, values in column B, one blank row between parameter groups.
    pub fn bridge_template() -> Self {
        use Field::{Input, Output};
        use InputField as I;
        use OutputField as O;

        let mut rows: Vec<(&str, Field, &str)> = Vec::new();

        let hyd = "INSERT- HYDRAULICS";
        rows.extend([
            (hyd, Field::label("BRIDGE HYDRAULIC DESIGN INPUTS"), "A1"),
            (hyd, Field::label("Geometric Parameters"), "A11"),
            (hyd, Field::label("Span (m):"), "A12"),
            (hyd, Input(I::Span), "B12"),
            (hyd, Field::label("Width (m):"), "A13"),
            (hyd, Input(I::Width), "B13"),
            (hyd, Field::label("Number of Lanes:"), "A14"),
            (hyd, Input(I::NumberOfLanes), "B14"),
            (hyd, Field::label("Flow Parameters"), "A16"),
            (hyd, Field::label("Design Discharge (cumecs):"), "A17"),
            (hyd, Input(I::Discharge), "B17"),
            (hyd, Field::label("Flood Level (m):"), "A18"),
            (hyd, Input(I::FloodLevel), "B18"),
            (hyd, Field::label("Bed Level (m):"), "A19"),
            (hyd, Input(I::BedLevel), "B19"),
            (hyd, Field::label("Bed Slope:"), "A20"),
            (hyd, Input(I::BedSlope), "B20"),
            (hyd, Field::label("Material Properties"), "A22"),
            (hyd, Field::label("Concrete Grade (fck, MPa):"), "A23"),
            (hyd, Input(I::Fck), "B23"),
            (hyd, Field::label("Steel Grade (fy, MPa):"), "A24"),
            (hyd, Input(I::Fy), "B24"),
            (hyd, Field::label("Soil Bearing Capacity (tonnes/m²):"), "A25"),
            (hyd, Input(I::SoilBearingCapacity), "B25"),
        ]);

        let abut = "INSERT C1-ABUT";
        rows.extend([
            (abut, Field::label("ABUTMENT DESIGN PARAMETERS"), "A5"),
            (abut, Field::label("Geometric Dimensions"), "A8"),
            (abut, Field::label("Height (m):"), "A9"),
            (abut, Output(O::AbutmentHeight), "B9"),
            (abut, Field::label("Width (m):"), "A10"),
            (abut, Output(O::AbutmentWidth), "B10"),
            (abut, Field::label("Depth (m):"), "A11"),
            (abut, Output(O::AbutmentDepth), "B11"),
            (abut, Field::label("Base Width (m):"), "A12"),
            (abut, Output(O::AbutmentBaseWidth), "B12"),
            (abut, Field::label("Base Length (m):"), "A13"),
            (abut, Output(O::AbutmentBaseLength), "B13"),
            (abut, Field::label("Wing Wall Parameters"), "A15"),
            (abut, Field::label("Height (m):"), "A16"),
            (abut, Output(O::WingWallHeight), "B16"),
            (abut, Field::label("Thickness (m):"), "A17"),
            (abut, Output(O::WingWallThickness), "B17"),
            (abut, Field::label("Material Quantities"), "A19"),
            (abut, Field::label("Abutment Concrete (m³):"), "A20"),
            (abut, Output(O::AbutmentConcrete), "B20"),
            (abut, Field::label("Base Concrete (m³):"), "A21"),
            (abut, Output(O::AbutmentBaseConcrete), "B21"),
            (abut, Field::label("Wing Wall Concrete (m³):"), "A22"),
            (abut, Output(O::WingWallConcrete), "B22"),
            (abut, Field::label("Structural Checks"), "A24"),
            (abut, Field::label("Active Earth Pressure:"), "A25"),
            (abut, Output(O::ActiveEarthPressure), "B25"),
            (abut, Field::label("Vertical Load:"), "A26"),
            (abut, Output(O::VerticalLoad), "B26"),
            (abut, Field::label("Sliding FOS:"), "A27"),
            (abut, Output(O::AbutmentSlidingFos), "B27"),
            (abut, Field::label("Overturning FOS:"), "A28"),
            (abut, Output(O::AbutmentOverturningFos), "B28"),
            (abut, Field::label("Bearing FOS:"), "A29"),
            (abut, Output(O::AbutmentBearingFos), "B29"),
        ]);

        let est = "INSERT ESTIMATE";
        rows.extend([
            (est, Field::label("PROJECT ESTIMATION PARAMETERS"), "A5"),
            (est, Field::label("Material Quantities"), "A8"),
            (est, Field::label("Total Concrete (m³):"), "A9"),
            (est, Output(O::TotalConcrete), "B9"),
            (est, Field::label("Total Steel (tonnes):"), "A10"),
            (est, Output(O::TotalSteel), "B10"),
            (est, Field::label("Formwork Area (m²):"), "A11"),
            (est, Output(O::Formwork), "B11"),
        ]);

        let bindings = rows
            .into_iter()
            .map(|(sheet, field, a1)| {
                CellBinding::new(sheet, field, a1).expect("built-in address is well-formed")
            })
            .collect();
        Self::new(bindings).expect("built-in map has no aliased coordinates")
    }
}

impl TryFrom<Vec<CellBinding>> for CellAddressMap {
    type Error = MapError;

    fn try_from(bindings: Vec<CellBinding>) -> Result<Self, MapError> {
        Self::new(bindings)
    }
}

impl From<CellAddressMap> for Vec<CellBinding> {
    fn from(map: CellAddressMap) -> Self {
        map.bindings
    }
}

/// Serialize [`CellRef`] as an A1 string in map/identity JSON.
pub(crate) mod a1 {
    use girder_model::CellRef;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(cell: &CellRef, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&cell.to_a1())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<CellRef, D::Error> {
        let text = String::deserialize(deserializer)?;
        CellRef::from_a1(&text).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures::{sample_input, sample_output};
    use girder_model::CellValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn built_in_map_is_well_formed() {
        let map = CellAddressMap::bridge_template();
        assert_eq!(
            map.sheet_names(),
            ["INSERT- HYDRAULICS", "INSERT C1-ABUT", "INSERT ESTIMATE"]
        );
        // Every binding resolves against a complete record pair.
        let input = sample_input();
        let output = sample_output();
        for binding in map.bindings() {
            assert!(
                binding.field.resolve(&input, &output).is_some(),
                "{} did not resolve",
                binding.field
            );
        }
    }

    #[test]
    fn aliased_coordinates_are_rejected() {
        let err = CellAddressMap::new(vec![
            CellBinding::new("S", Field::Input(InputField::Span), "B12").unwrap(),
            CellBinding::new("S", Field::Input(InputField::Width), "B12").unwrap(),
        ])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"input.span and input.width both map to "S"!B12"#
        );
    }

    #[test]
    fn optional_field_resolution() {
        let mut input = sample_input();
        let output = sample_output();
        input.bed_level = None;
        assert_eq!(
            Field::Input(InputField::BedLevel).resolve(&input, &output),
            None
        );
        assert_eq!(
            Field::Input(InputField::NumberOfLanes).resolve(&input, &output),
            Some(CellValue::Number(2.0))
        );
    }

    #[test]
    fn map_json_roundtrip_validates() {
        let json = r#"[
            {"sheet": "S", "field": {"input": "span"}, "cell": "B12"},
            {"sheet": "S", "field": {"label": "Span (m):"}, "cell": "A12"}
        ]"#;
        let map: CellAddressMap = serde_json::from_str(json).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.bindings()[0].cell, CellRef::from_a1("B12").unwrap());

        let aliased = r#"[
            {"sheet": "S", "field": {"input": "span"}, "cell": "B12"},
            {"sheet": "S", "field": {"input": "width"}, "cell": "B12"}
        ]"#;
        assert!(serde_json::from_str::<CellAddressMap>(aliased).is_err());
    }
}
