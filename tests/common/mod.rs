//! Shared test utilities and fixture generators

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stayscore::config::{
    ConfigOverrides, PipelineConfig, CLEANED_BUCKET_VAR, MODELS_BUCKET_VAR,
    PREDICTIONS_BUCKET_VAR, RAW_BUCKET_VAR,
};
use stayscore::pipeline::forest::ForestParams;

pub const RAW: &str = "raw-listings";
pub const CLEANED: &str = "cleaned-listings";
pub const MODELS: &str = "models";
pub const PREDICTIONS: &str = "predictions";

/// Bucket variables as they would be set in the environment.
pub fn bucket_vars() -> Vec<(&'static str, &'static str)> {
    vec![
        (RAW_BUCKET_VAR, RAW),
        (CLEANED_BUCKET_VAR, CLEANED),
        (MODELS_BUCKET_VAR, MODELS),
        (PREDICTIONS_BUCKET_VAR, PREDICTIONS),
    ]
}

pub fn lookup(vars: Vec<(&'static str, &'static str)>) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

/// Configuration rooted in `root`: store, work dir and raw source all live there.
pub fn test_config(root: &Path) -> PipelineConfig {
    let overrides = ConfigOverrides {
        store_root: Some(root.join("store")),
        work_dir: Some(root.join("work")),
        raw_source: Some(root.join("listings.csv")),
        tracking_log: None,
    };
    PipelineConfig::from_lookup(lookup(bucket_vars()), overrides).unwrap()
}

/// A forest small enough to keep integration tests quick.
pub fn small_forest() -> ForestParams {
    ForestParams {
        n_estimators: 12,
        ..ForestParams::default()
    }
}

fn pick<'a>(rng: &mut StdRng, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}

/// Create a raw listings table shaped like a scraped marketplace export.
///
/// Every column is text. Ratings are driven by a hidden quality score that
/// also shapes response rates, room type and review counts, so a model has
/// something to learn. Roughly one row in seventeen has no rating and some
/// fields are blank or `N/A`. `id` and `name` are columns cleaning ignores.
pub fn create_raw_listings(rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut columns: Vec<(&str, Vec<Option<String>>)> = [
        "id",
        "name",
        "review_scores_rating",
        "host_response_time",
        "host_response_rate",
        "host_acceptance_rate",
        "host_identity_verified",
        "host_listings_count",
        "room_type",
        "accommodates",
        "bedrooms",
        "bathrooms",
        "bathrooms_text",
        "price",
        "instant_bookable",
        "minimum_nights",
        "maximum_nights",
        "number_of_reviews_ltm",
    ]
    .into_iter()
    .map(|name| (name, Vec::with_capacity(rows)))
    .collect();

    for i in 0..rows {
        let quality: f64 = rng.gen();
        let blank = |rng: &mut StdRng, p: f64| rng.gen::<f64>() < p;

        let rating = if i % 17 == 5 {
            None
        } else {
            Some(format!("{:.2}", 3.8 + quality * 1.2))
        };
        let response_time = if blank(&mut rng, 0.1) {
            Some("N/A".to_string())
        } else if quality > 0.6 {
            Some("within an hour".to_string())
        } else {
            Some(pick(&mut rng, &["within a few hours", "within a day", "a few days or more"]).to_string())
        };
        let response_rate = if blank(&mut rng, 0.1) {
            Some("N/A".to_string())
        } else {
            Some(format!("{}%", (60.0 + quality * 40.0).round() as u32))
        };
        let acceptance_rate = if blank(&mut rng, 0.1) {
            None
        } else {
            Some(format!("{}%", rng.gen_range(40..=100)))
        };
        let verified = if blank(&mut rng, 0.05) {
            None
        } else {
            Some(pick(&mut rng, &["t", "t", "f"]).to_string())
        };
        let room = if quality > 0.5 {
            pick(&mut rng, &["Entire home/apt", "Entire home/apt", "Private room"])
        } else {
            pick(&mut rng, &["Private room", "Shared room", "Hotel room"])
        };
        let bedrooms = if blank(&mut rng, 0.15) {
            None
        } else {
            Some(rng.gen_range(1..=4).to_string())
        };
        let bathrooms_text = pick(&mut rng, &["1 bath", "2 baths", "1.5 shared baths", "Half-bath", "1 private bath"]);
        let price = if blank(&mut rng, 0.08) {
            None
        } else {
            Some(format!("${:.2}", 40.0 + rng.gen::<f64>() * 300.0))
        };

        let row: [Option<String>; 18] = [
            Some(format!("{}", 1000 + i)),
            Some(format!("Cozy place #{}, near the park", i)),
            rating,
            response_time,
            response_rate,
            acceptance_rate,
            verified,
            Some(rng.gen_range(1..=20).to_string()),
            Some(room.to_string()),
            Some(rng.gen_range(1..=8).to_string()),
            bedrooms,
            // Most exports leave the numeric bathroom count empty
            if i % 4 == 0 { Some("1".to_string()) } else { None },
            Some(bathrooms_text.to_string()),
            price,
            Some(pick(&mut rng, &["t", "f"]).to_string()),
            Some(rng.gen_range(1..=7).to_string()),
            Some(rng.gen_range(30..=365).to_string()),
            Some(((quality * 30.0) as u32).to_string()),
        ];
        for ((_, values), cell) in columns.iter_mut().zip(row) {
            values.push(cell);
        }
    }

    let columns: Vec<Column> = columns
        .into_iter()
        .map(|(name, values)| Column::new(name.into(), values))
        .collect();
    DataFrame::new(columns).unwrap()
}

/// Write a raw listings CSV to `path`.
pub fn write_raw_listings(path: &Path, rows: usize) -> PathBuf {
    let mut df = create_raw_listings(rows, 7);
    write_csv(&mut df, path);
    path.to_path_buf()
}

pub fn write_csv(df: &mut DataFrame, path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut file = std::fs::File::create(path).unwrap();
    CsvWriter::new(&mut file).include_header(true).finish(df).unwrap();
}

pub fn read_csv(path: &Path) -> DataFrame {
    LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(None)
        .finish()
        .unwrap()
        .collect()
        .unwrap()
}

pub fn names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

pub fn f64_values(df: &DataFrame, column: &str) -> Vec<f64> {
    df.column(column)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect()
}

/// Object bytes as text; panics if the object is absent.
pub fn object_text(store: &stayscore::storage::MemoryObjectStore, bucket: &str, key: &str) -> String {
    let bytes = store
        .object(bucket, key)
        .unwrap_or_else(|| panic!("object {}/{} missing", bucket, key));
    String::from_utf8(bytes).unwrap()
}
