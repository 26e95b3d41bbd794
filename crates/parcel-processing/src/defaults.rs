//! Built-in manifest for the Philadelphia Office of Property Assessment export.
//!
//! Column lists, sentinels and valid-value sets follow the OPA metadata.
//! Comments give the reason a column is dropped where the metadata alone does
//! not make it obvious.

use crate::manifest::{
    DEFAULT_CUTOFF_YEAR, DEFAULT_MAX_DISTINCT, DEFAULT_MIN_PRESENT_FRACTION, Manifest, Step,
    ZeroVariancePolicy,
};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Basement codes, in increasing order of finish.
pub const BASEMENT_CODES: [&str; 12] = ["0", "A", "B", "C", "D", "E", "F", "G", "H", "I", "J", "K"];

/// Heater type codes; `H` stands for unknown.
pub const TYPE_HEATER_CODES: [&str; 8] = ["A", "B", "C", "D", "E", "F", "G", "H"];

pub const VIEW_TYPE_CODES: [&str; 8] = ["I", "H", "D", "A", "C", "0", "E", "B"];

/// Topography codes; `F` is street level.
pub const TOPOGRAPHY_CODES: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

pub const PARCEL_SHAPE_CODES: [&str; 5] = ["A", "B", "C", "D", "E"];

/// Columns a record must carry once imputation is done.
pub const REQUIRED_COLUMNS: [&str; 20] = [
    "census_tract",
    "depth",
    "exterior_condition",
    "fireplaces",
    "frontage",
    "garage_spaces",
    "geographic_ward",
    "interior_condition",
    "market_value",
    "number_of_bathrooms",
    "number_of_bedrooms",
    "number_stories",
    "parcel_shape",
    "taxable_building",
    "total_area",
    "total_livable_area",
    "view_type",
    "year_built",
    "zip_code",
    "zoning",
];

/// Nominal columns with dozens of categories or more.
pub const BINARY_ENCODED_COLUMNS: [&str; 7] = [
    "zoning",
    "zip_code",
    "year_built",
    "geographic_ward",
    "census_tract",
    "street_name",
    "street_designation",
];

/// Standardized feature columns, in output order.
pub const SCALED_COLUMNS: [&str; 17] = [
    "fireplaces",
    "number_of_bathrooms",
    "number_of_bedrooms",
    "number_stories",
    "basements_encoded",
    "exterior_encoded",
    "interior_encoded",
    "type_heater_encoded",
    "homestead_exemption_encoded",
    "depth_capped",
    "frontage_capped",
    "garage_spaces_capped",
    "total_area_capped",
    "total_livable_area_capped",
    "taxable_building_capped",
    "taxable_land_capped",
    "exempt_building_capped",
];

/// Regression target once outliers are capped.
pub const TARGET_COLUMN: &str = "market_value_capped";

static PHILADELPHIA: Lazy<Manifest> = Lazy::new(build_philadelphia);

pub(crate) fn philadelphia_steps() -> Manifest {
    PHILADELPHIA.clone()
}

fn build_philadelphia() -> Manifest {
    let mut steps = vec![
        Step::PruneColumns {
            min_present_fraction: DEFAULT_MIN_PRESENT_FRACTION,
            max_distinct: DEFAULT_MAX_DISTINCT,
            // Coordinates are near-unique per parcel but carry location.
            exempt: vec!["lat".to_string(), "lng".to_string()],
        },
        Step::filter_category("category_code_description", ["SINGLE FAMILY"]),
        Step::drop_columns([
            // recency bias
            "assessment_date",
            "recording_date",
            // single remaining category after the filter above
            "category_code",
            "category_code_description",
            // year_built carries the same signal with fewer gaps
            "year_built_estimate",
            // owner mailing address says nothing about the parcel
            "mailing_city_state",
            "mailing_zip",
            // codes undocumented in the OPA metadata
            "building_code",
            "street_code",
            "building_code_new",
            // sparse and nominal; zip code and coordinates cover location
            "street_direction",
        ]),
        Step::ExcludeContaining {
            column: "building_code_description".to_string(),
            needle: "VACANT".to_string(),
        },
        // 0 and 1 are placeholder prices for non-market transfers
        Step::RequireGreaterThan {
            column: "sale_price".to_string(),
            bound: 1.0,
        },
        Step::RequireGreaterThan {
            column: "market_value".to_string(),
            bound: 1.0,
        },
        Step::drop_columns([
            "building_code_description",
            "building_code_description_new",
            // binary with 38% missing and nothing to impute from
            "central_air",
            "off_street_open",
            "state_code",
            "house_number",
            "general_construction",
            "quality_grade",
            // correlation with market value of 0.06
            "exempt_land",
            "sale_price",
        ]),
        Step::Impute {
            fills: BTreeMap::from([
                ("basements".to_string(), "K".to_string()),
                ("type_heater".to_string(), "H".to_string()),
                ("topography".to_string(), "F".to_string()),
            ]),
        },
        Step::require_present(REQUIRED_COLUMNS),
        Step::FilterYearBefore {
            column: "sale_date".to_string(),
            cutoff_year: DEFAULT_CUTOFF_YEAR,
            drop_column: true,
        },
        Step::filter_domain("basements", BASEMENT_CODES),
        Step::filter_domain("type_heater", TYPE_HEATER_CODES),
        Step::filter_domain("view_type", VIEW_TYPE_CODES),
        Step::filter_domain("topography", TOPOGRAPHY_CODES),
        Step::filter_domain("parcel_shape", PARCEL_SHAPE_CODES),
        Step::EncodeOrdinal {
            column: "basements".to_string(),
            categories: Some(BASEMENT_CODES.iter().map(|s| s.to_string()).collect()),
            output: Some("basements_encoded".to_string()),
            exclude_codes: Vec::new(),
        },
        Step::EncodeOrdinal {
            column: "exterior_condition".to_string(),
            categories: None,
            output: Some("exterior_encoded".to_string()),
            exclude_codes: Vec::new(),
        },
        // codes 0, 1 and 8 have no definition in the metadata
        Step::EncodeOrdinal {
            column: "interior_condition".to_string(),
            categories: None,
            output: Some("interior_encoded".to_string()),
            exclude_codes: vec![0, 1, 8],
        },
        Step::EncodeOrdinal {
            column: "type_heater".to_string(),
            categories: Some(TYPE_HEATER_CODES.iter().map(|s| s.to_string()).collect()),
            output: Some("type_heater_encoded".to_string()),
            exclude_codes: Vec::new(),
        },
        Step::EncodeOneHot {
            column: "view_type".to_string(),
            categories: Some(VIEW_TYPE_CODES.iter().map(|s| s.to_string()).collect()),
        },
        Step::EncodeOneHot {
            column: "topography".to_string(),
            categories: Some(TOPOGRAPHY_CODES.iter().map(|s| s.to_string()).collect()),
        },
        Step::EncodeOneHot {
            column: "parcel_shape".to_string(),
            categories: Some(PARCEL_SHAPE_CODES.iter().map(|s| s.to_string()).collect()),
        },
        // any exemption amount becomes 1
        Step::Clip {
            column: "homestead_exemption".to_string(),
            lower: 0.0,
            upper: 1.0,
            output: Some("homestead_exemption_encoded".to_string()),
        },
    ];

    steps.extend(BINARY_ENCODED_COLUMNS.iter().map(|column| Step::EncodeBinary {
        column: column.to_string(),
    }));

    steps.extend(
        [
            "depth",
            "frontage",
            "garage_spaces",
            "total_area",
            "total_livable_area",
            "taxable_building",
            "taxable_land",
            "exempt_building",
        ]
        .into_iter()
        .map(Step::remove_outliers),
    );
    steps.push(Step::RemoveOutliers {
        column: "market_value".to_string(),
        lower_percentile: 5.0,
        upper_percentile: 99.0,
    });

    steps.push(Step::Checkpoint);
    steps.push(Step::Scale {
        columns: SCALED_COLUMNS.iter().map(|s| s.to_string()).collect(),
        on_zero_variance: ZeroVariancePolicy::Fail,
    });

    Manifest::new(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_philadelphia_manifest_is_valid() {
        let manifest = Manifest::philadelphia();
        assert!(manifest.validate().is_ok());
        assert_eq!(manifest.steps.len(), 41);
    }

    #[test]
    fn test_checkpoint_precedes_scaling() {
        let steps = Manifest::philadelphia().steps;
        let checkpoint = steps.iter().position(|s| matches!(s, Step::Checkpoint));
        let scale = steps.iter().position(|s| matches!(s, Step::Scale { .. }));
        assert!(checkpoint.unwrap() + 1 == scale.unwrap());
    }

    #[test]
    fn test_scaled_columns_are_produced_upstream() {
        let steps = Manifest::philadelphia().steps;
        let produced: Vec<String> = steps
            .iter()
            .filter_map(|s| match s {
                Step::EncodeOrdinal { output, .. } | Step::Clip { output, .. } => output.clone(),
                Step::RemoveOutliers { column, .. } => Some(format!("{}_capped", column)),
                _ => None,
            })
            .collect();

        for column in SCALED_COLUMNS.iter().filter(|c| c.ends_with("_encoded") || c.ends_with("_capped")) {
            assert!(
                produced.iter().any(|p| p == column),
                "{} is scaled but never produced",
                column
            );
        }
    }

    #[test]
    fn test_target_is_not_scaled() {
        assert!(!SCALED_COLUMNS.contains(&TARGET_COLUMN));
    }
}
