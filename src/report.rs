//! Business metrics and aggregate reports over the transaction table.
//!
//! Revenue here is quantity times price, which deliberately differs from the
//! model's Monetary feature (sum of line prices). The two definitions coexist
//! in the source data and are kept separate.

use polars::prelude::*;
use tracing::info;

use crate::data::{COL_CITY, COL_DATE, COL_ORDER_ID, COL_PRICE, COL_PRODUCT, COL_QUANTITY};
use crate::features::{self, CHURN_RECENCY_DAYS, RECENCY};

/// Assumed profit margin on revenue
const PROFIT_MARGIN: f64 = 0.3;

/// Headline numbers of the business overview.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessMetrics {
    pub total_revenue: f64,
    pub average_order_value: f64,
    /// Share of cities past the churn threshold, in percent
    pub churn_rate: f64,
    pub total_cities: usize,
    pub churned_cities: usize,
}

/// Compute total revenue, average order value and the city churn rate.
///
/// The churn rate measures recency from the latest table date rather than
/// the trainer's snapshot date, mirroring the overview the original
/// dashboard showed. A city exactly at the threshold can therefore differ
/// by one day between the two views.
pub fn business_metrics(df: &DataFrame) -> crate::Result<BusinessMetrics> {
    let totals = df
        .clone()
        .lazy()
        .select([
            (col(COL_QUANTITY).cast(DataType::Float64) * col(COL_PRICE))
                .sum()
                .alias("Revenue"),
            col(COL_ORDER_ID).n_unique().alias("Orders"),
        ])
        .collect()?;
    let total_revenue = totals
        .column("Revenue")?
        .f64()?
        .get(0)
        .unwrap_or_default();
    let orders = totals
        .column("Orders")?
        .cast(&DataType::Float64)?
        .f64()?
        .get(0)
        .unwrap_or_default();
    let average_order_value = if orders > 0.0 {
        total_revenue / orders
    } else {
        0.0
    };

    let max_day = features::day_number(features::latest_date(df)?);
    let last_purchase = df
        .clone()
        .lazy()
        .group_by([col(COL_CITY)])
        .agg([col(COL_DATE).cast(DataType::Int32).max().alias("LastDay")])
        .with_columns([(lit(max_day) - col("LastDay")).alias(RECENCY)])
        .collect()?;

    let total_cities = last_purchase.height();
    let churned_cities = last_purchase
        .column(RECENCY)?
        .i32()?
        .into_no_null_iter()
        .filter(|recency| *recency > CHURN_RECENCY_DAYS)
        .count();
    let churn_rate = if total_cities > 0 {
        churned_cities as f64 / total_cities as f64 * 100.0
    } else {
        0.0
    };

    info!(
        total_revenue,
        orders = orders as usize,
        churn_rate,
        "business metrics computed"
    );
    Ok(BusinessMetrics {
        total_revenue,
        average_order_value,
        churn_rate,
        total_cities,
        churned_cities,
    })
}

/// Monthly revenue, estimated profit and month-over-month revenue growth.
///
/// Growth keeps the original report's lag defaults: the first month has no
/// predecessor, so the numerator lags to 0 and the denominator to the
/// month's own revenue, which reads as 100 percent.
pub fn monthly_analysis(df: &DataFrame) -> crate::Result<DataFrame> {
    let monthly = df
        .clone()
        .lazy()
        .with_columns([col(COL_DATE).dt().to_string("%Y-%m").alias("SalesMonth")])
        .group_by([col("SalesMonth")])
        .agg([(col(COL_QUANTITY).cast(DataType::Float64) * col(COL_PRICE))
            .sum()
            .alias("Revenue")])
        .sort(["SalesMonth"], SortMultipleOptions::default())
        .with_columns([(col("Revenue") * lit(PROFIT_MARGIN)).alias("Profit")])
        .with_columns([((col("Revenue") - col("Revenue").shift(lit(1)).fill_null(lit(0.0)))
            * lit(100.0)
            / col("Revenue").shift(lit(1)).fill_null(col("Revenue")))
        .alias("MoM_Revenue_Growth_Percentage")])
        .collect()?;
    Ok(monthly)
}

/// Total sales per product, highest seller first.
pub fn sales_per_product(df: &DataFrame) -> crate::Result<DataFrame> {
    let processed = df
        .clone()
        .lazy()
        .group_by([col(COL_PRODUCT)])
        .agg([(col(COL_QUANTITY).cast(DataType::Float64) * col(COL_PRICE))
            .sum()
            .alias("TotalSales")])
        .sort(
            ["TotalSales"],
            SortMultipleOptions::default().with_order_descending(true),
        )
        .collect()?;
    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        COL_AGE, COL_CATEGORY, COL_DISCOUNT, COL_GENDER, COL_PAYMENT,
    };

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
            COL_ORDER_ID => &[1i64, 2, 3, 4],
            COL_PRODUCT => &["Laptop", "Mouse", "Laptop", "Keyboard"],
            COL_QUANTITY => &[2i64, 1, 1, 3],
            COL_PRICE => &[1000.0, 25.0, 900.0, 45.0],
            COL_AGE => &[30i64, 40, 35, 50],
            COL_CITY => &["Springfield", "Springfield", "Shelbyville", "Shelbyville"],
            COL_PAYMENT => &["Cash", "Cash", "Credit Card", "Cash"],
            COL_DATE => &["2025-06-10", "2025-06-16", "2025-05-01", "2025-05-12"],
            COL_GENDER => &["Male", "Female", "Female", "Female"],
            COL_CATEGORY => &["Electronics", "Accessories", "Electronics", "Accessories"],
            COL_DISCOUNT => &[true, false, false, true],
        )
        .unwrap();
        parse_dates(df)
    }

    #[test]
    fn test_revenue_and_order_value() {
        let df = parse_dates(
            df!(
                COL_ORDER_ID => &[1i64, 2],
                COL_PRODUCT => &["Laptop", "Mouse"],
                COL_QUANTITY => &[2i64, 1],
                COL_PRICE => &[10.0, 5.0],
                COL_AGE => &[30i64, 40],
                COL_CITY => &["Springfield", "Springfield"],
                COL_PAYMENT => &["Cash", "Cash"],
                COL_DATE => &["2025-06-10", "2025-06-16"],
                COL_GENDER => &["Male", "Female"],
                COL_CATEGORY => &["Electronics", "Accessories"],
                COL_DISCOUNT => &[false, false],
            )
            .unwrap(),
        );

        let metrics = business_metrics(&df).unwrap();
        assert!((metrics.total_revenue - 25.0).abs() < 1e-9);
        assert!((metrics.average_order_value - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_churn_rate_counts_stale_cities() {
        // Latest table date is 2025-06-16; Shelbyville last bought 05-12,
        // which is 35 days earlier
        let df = sample_transactions();
        let metrics = business_metrics(&df).unwrap();

        assert_eq!(metrics.total_cities, 2);
        assert_eq!(metrics.churned_cities, 1);
        assert!((metrics.churn_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_monthly_analysis_growth() {
        let df = sample_transactions();
        let monthly = monthly_analysis(&df).unwrap();

        assert_eq!(monthly.height(), 2);
        let months: Vec<&str> = monthly
            .column("SalesMonth")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(months, vec!["2025-05", "2025-06"]);

        let revenue: Vec<f64> = monthly
            .column("Revenue")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        // May: 900 + 135; June: 2000 + 25
        assert!((revenue[0] - 1035.0).abs() < 1e-9);
        assert!((revenue[1] - 2025.0).abs() < 1e-9);

        let profit: Vec<f64> = monthly
            .column("Profit")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!((profit[0] - 1035.0 * 0.3).abs() < 1e-9);

        let growth: Vec<f64> = monthly
            .column("MoM_Revenue_Growth_Percentage")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        // First month lags against itself and reads 100
        assert!((growth[0] - 100.0).abs() < 1e-9);
        assert!((growth[1] - (2025.0 - 1035.0) * 100.0 / 1035.0).abs() < 1e-9);
    }

    #[test]
    fn test_sales_per_product_sorted() {
        let df = sample_transactions();
        let processed = sales_per_product(&df).unwrap();

        let products: Vec<&str> = processed
            .column(COL_PRODUCT)
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        // Laptop 2900, Keyboard 135, Mouse 25
        assert_eq!(products, vec!["Laptop", "Keyboard", "Mouse"]);

        let sales: Vec<f64> = processed
            .column("TotalSales")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!((sales[0] - 2900.0).abs() < 1e-9);
    }
}
