//! RFM feature construction, churn labeling and column reconciliation.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::warn;

use crate::data::{
    COL_AGE, COL_CATEGORY, COL_CITY, COL_DATE, COL_DISCOUNT, COL_GENDER, COL_ORDER_ID, COL_PRICE,
    COL_PRODUCT,
};

/// Days without a purchase after which a city counts as churned
pub const CHURN_RECENCY_DAYS: i32 = 30;

/// Feature frame column names
pub const RECENCY: &str = "Recency";
pub const CHURN: &str = "Churn";
pub const GENDER: &str = "Gender";

// chrono's default NaiveDate is the unix epoch, matching the Date dtype's
// integer representation
fn epoch() -> NaiveDate {
    NaiveDate::default()
}

pub(crate) fn day_number(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

/// Latest transaction date observed in the table.
pub fn latest_date(df: &DataFrame) -> crate::Result<NaiveDate> {
    let max_day = df
        .column(COL_DATE)?
        .cast(&DataType::Int32)?
        .i32()?
        .max()
        .ok_or_else(|| anyhow::anyhow!("transaction table has no dates"))?;
    Ok(epoch() + Duration::days(i64::from(max_day)))
}

/// Reference date for recency: one day after the latest transaction.
pub fn snapshot_date(df: &DataFrame) -> crate::Result<NaiveDate> {
    Ok(latest_date(df)? + Duration::days(1))
}

/// Aggregate the transaction table into one feature row per city.
///
/// Each city acts as the customer unit and yields recency in days against
/// the snapshot date, order frequency, monetary value as the sum of line
/// prices, product and category variety, mean age, the first observed gender
/// and the share of discounted orders. Rows come back sorted by city.
///
/// # Arguments
/// * `df` - Transaction table with a parsed Date column
///
/// # Returns
/// * `DataFrame` with one row per city
pub fn build_city_features(df: &DataFrame) -> crate::Result<DataFrame> {
    let snapshot_day = day_number(snapshot_date(df)?);

    let features = df
        .clone()
        .lazy()
        .group_by([col(COL_CITY)])
        .agg([
            (lit(snapshot_day) - col(COL_DATE).cast(DataType::Int32).max()).alias(RECENCY),
            col(COL_ORDER_ID).count().alias("Frequency"),
            col(COL_PRICE).sum().alias("Monetary"),
            col(COL_PRODUCT).n_unique().alias("ProductVariety"),
            col(COL_AGE).mean().alias("AverageAge"),
            col(COL_GENDER).first().alias(GENDER),
            col(COL_DISCOUNT).cast(DataType::Float64).mean().alias("DiscountRate"),
            col(COL_CATEGORY).n_unique().alias("ProductCategoryVariety"),
        ])
        .sort([COL_CITY], SortMultipleOptions::default())
        .collect()?;

    Ok(features)
}

/// Add the churn label: 1 when a city's recency exceeds [`CHURN_RECENCY_DAYS`].
pub fn assign_churn_labels(features: &DataFrame) -> crate::Result<DataFrame> {
    let labeled = features
        .clone()
        .lazy()
        .with_columns([col(RECENCY)
            .gt(lit(CHURN_RECENCY_DAYS))
            .cast(DataType::Int32)
            .alias(CHURN)])
        .collect()?;
    Ok(labeled)
}

/// One-hot encode the gender column, dropping the first level of the sorted
/// category set. `Male`/`Female` data therefore yields a single `Gender_Male`
/// column, appended after the existing columns.
pub fn encode_gender(df: &DataFrame) -> crate::Result<DataFrame> {
    if df.column(GENDER).is_err() {
        return Ok(df.clone());
    }

    let mut levels = BTreeSet::new();
    for value in df.column(GENDER)?.str()?.into_no_null_iter() {
        levels.insert(value.to_string());
    }

    let dummies: Vec<Expr> = levels
        .iter()
        .skip(1)
        .map(|level| {
            let name = format!("{GENDER}_{level}");
            col(GENDER)
                .eq(lit(level.clone()))
                .cast(DataType::Int32)
                .alias(&name)
        })
        .collect();

    let encoded = if dummies.is_empty() {
        df.clone()
    } else {
        df.clone().lazy().with_columns(dummies).collect()?
    };
    Ok(encoded.drop(GENDER)?)
}

/// Names of the model input columns: everything except the city key, the
/// recency used for labeling, and the label itself.
pub fn feature_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .filter(|name| *name != COL_CITY && *name != RECENCY && *name != CHURN)
        .map(|name| name.to_string())
        .collect()
}

/// Align a scoring frame with the trained column order.
///
/// Missing columns are zero-filled and unknown columns are dropped; both
/// reconciliations are logged so schema drift stays visible. The result
/// has exactly `columns` in order, all as Float64, and reindexing an
/// already aligned frame is a no-op.
pub fn reindex_to_columns(df: &DataFrame, columns: &[String]) -> crate::Result<DataFrame> {
    let expected: BTreeSet<&str> = columns.iter().map(String::as_str).collect();
    let dropped: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| !expected.contains(*name))
        .map(|name| name.to_string())
        .collect();

    let mut zero_filled = Vec::new();
    let mut aligned = Vec::with_capacity(columns.len());
    for name in columns {
        match df.column(name) {
            Ok(series) => aligned.push(series.cast(&DataType::Float64)?),
            Err(_) => {
                zero_filled.push(name.clone());
                aligned.push(Series::new(name, vec![0.0f64; df.height()]));
            }
        }
    }

    if !zero_filled.is_empty() {
        warn!(columns = ?zero_filled, "scoring input is missing trained columns, filling with zeros");
    }
    if !dropped.is_empty() {
        warn!(columns = ?dropped, "scoring input carries columns the model was not trained on, dropping");
    }

    Ok(DataFrame::new(aligned)?)
}

/// Extract the named columns into a row-major feature matrix.
pub fn to_matrix(df: &DataFrame, columns: &[String]) -> crate::Result<Array2<f64>> {
    let rows = df.height();
    let cols = columns.len();
    let mut data = vec![0.0f64; rows * cols];
    for (j, name) in columns.iter().enumerate() {
        let series = df.column(name)?.cast(&DataType::Float64)?;
        for (i, value) in series.f64()?.into_no_null_iter().enumerate() {
            data[i * cols + j] = value;
        }
    }
    Ok(Array2::from_shape_vec((rows, cols), data)?)
}

/// Extract churn labels as a float vector aligned with the feature rows.
pub fn labels_vector(df: &DataFrame) -> crate::Result<Array1<f64>> {
    let values: Vec<f64> = df
        .column(CHURN)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_no_null_iter()
        .collect();
    Ok(Array1::from_vec(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{COL_PAYMENT, COL_QUANTITY};

    fn parse_dates(df: DataFrame) -> DataFrame {
        df.lazy()
            .with_columns([col(COL_DATE).str().to_date(StrptimeOptions {
                format: Some("%Y-%m-%d".into()),
                strict: true,
                exact: true,
                cache: true,
            })])
            .collect()
            .unwrap()
    }

    fn sample_transactions() -> DataFrame {
        let df = df!(
            COL_ORDER_ID => &[1i64, 2, 3, 4, 5],
            COL_PRODUCT => &["Laptop", "Mouse", "Laptop", "Keyboard", "Monitor"],
            COL_QUANTITY => &[2i64, 1, 3, 2, 1],
            COL_PRICE => &[1000.0, 25.0, 1200.0, 45.0, 300.0],
            COL_AGE => &[30i64, 40, 35, 50, 28],
            COL_CITY => &["Springfield", "Springfield", "Shelbyville", "Shelbyville", "Springfield"],
            COL_PAYMENT => &["Cash", "Cash", "Credit Card", "Cash", "Debit Card"],
            COL_DATE => &["2025-06-10", "2025-06-16", "2025-05-01", "2025-05-17", "2025-06-01"],
            COL_GENDER => &["Male", "Female", "Female", "Female", "Male"],
            COL_CATEGORY => &["Electronics", "Accessories", "Electronics", "Accessories", "Electronics"],
            COL_DISCOUNT => &[true, false, false, true, false],
        )
        .unwrap();
        parse_dates(df)
    }

    #[test]
    fn test_snapshot_is_day_after_latest() {
        let df = sample_transactions();
        let latest = latest_date(&df).unwrap();
        let snapshot = snapshot_date(&df).unwrap();

        assert_eq!(latest, NaiveDate::from_ymd_opt(2025, 6, 16).unwrap());
        assert_eq!(snapshot, NaiveDate::from_ymd_opt(2025, 6, 17).unwrap());
    }

    #[test]
    fn test_city_features() {
        let df = sample_transactions();
        let features = build_city_features(&df).unwrap();

        assert_eq!(features.height(), 2);
        // Sorted by city: Shelbyville first
        let cities: Vec<&str> = features
            .column(COL_CITY)
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(cities, vec!["Shelbyville", "Springfield"]);

        let recency: Vec<i32> = features
            .column(RECENCY)
            .unwrap()
            .i32()
            .unwrap()
            .into_no_null_iter()
            .collect();
        // Snapshot 2025-06-17: Shelbyville last bought 05-17, Springfield 06-16
        assert_eq!(recency, vec![31, 1]);

        let monetary: Vec<f64> = features
            .column("Monetary")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!((monetary[0] - 1245.0).abs() < 1e-9);
        assert!((monetary[1] - 1325.0).abs() < 1e-9);
    }

    #[test]
    fn test_labels_flip_above_threshold() {
        let features = df!(
            COL_CITY => &["A", "B", "C"],
            RECENCY => &[30i32, 31, 2],
        )
        .unwrap();

        let labeled = assign_churn_labels(&features).unwrap();
        let labels: Vec<i32> = labeled
            .column(CHURN)
            .unwrap()
            .i32()
            .unwrap()
            .into_no_null_iter()
            .collect();
        // Exactly 30 days is still active; 31 is churned
        assert_eq!(labels, vec![0, 1, 0]);
    }

    #[test]
    fn test_encode_gender_drops_first_level() {
        let frame = df!(
            "Frequency" => &[10i64, 20],
            GENDER => &["Male", "Female"],
        )
        .unwrap();

        let encoded = encode_gender(&frame).unwrap();
        assert!(encoded.column(GENDER).is_err());
        let flags: Vec<i32> = encoded
            .column("Gender_Male")
            .unwrap()
            .i32()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(flags, vec![1, 0]);
    }

    #[test]
    fn test_encode_gender_single_level() {
        let frame = df!(
            "Frequency" => &[10i64, 20],
            GENDER => &["Female", "Female"],
        )
        .unwrap();

        let encoded = encode_gender(&frame).unwrap();
        assert!(encoded.column(GENDER).is_err());
        assert!(encoded.column("Gender_Female").is_err());
        assert_eq!(encoded.width(), 1);
    }

    #[test]
    fn test_feature_columns_excludes_label_and_key() {
        let frame = df!(
            COL_CITY => &["A"],
            RECENCY => &[5i32],
            "Frequency" => &[10i64],
            "Monetary" => &[100.0],
            CHURN => &[0i32],
        )
        .unwrap();

        let columns = feature_columns(&frame);
        assert_eq!(columns, vec!["Frequency".to_string(), "Monetary".to_string()]);
    }

    #[test]
    fn test_reindex_fills_and_drops() {
        let frame = df!(
            "Frequency" => &[12.0],
            "Unknown" => &[9.9],
        )
        .unwrap();
        let columns = vec![
            "Frequency".to_string(),
            "Monetary".to_string(),
            "Gender_Male".to_string(),
        ];

        let aligned = reindex_to_columns(&frame, &columns).unwrap();
        assert_eq!(
            aligned.get_column_names(),
            vec!["Frequency", "Monetary", "Gender_Male"]
        );
        assert_eq!(aligned.column("Monetary").unwrap().f64().unwrap().get(0), Some(0.0));
        assert_eq!(aligned.column("Gender_Male").unwrap().f64().unwrap().get(0), Some(0.0));

        // Reindexing an aligned frame changes nothing
        let again = reindex_to_columns(&aligned, &columns).unwrap();
        assert!(aligned.equals(&again));
    }

    #[test]
    fn test_to_matrix_order() {
        let frame = df!(
            "Frequency" => &[1i64, 2],
            "Monetary" => &[10.0, 20.0],
        )
        .unwrap();
        let columns = vec!["Frequency".to_string(), "Monetary".to_string()];

        let matrix = to_matrix(&frame, &columns).unwrap();
        assert_eq!(matrix.shape(), &[2, 2]);
        assert!((matrix[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((matrix[[1, 1]] - 20.0).abs() < 1e-12);
    }
}
