//! Synthetic retail transaction generator for demo fixtures.

use std::path::Path;

use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::data::{
    self, COL_AGE, COL_CATEGORY, COL_CITY, COL_DATE, COL_DISCOUNT, COL_GENDER, COL_ORDER_ID,
    COL_PAYMENT, COL_PRICE, COL_PRODUCT, COL_QUANTITY,
};

/// Fixed reference date the generated history counts back from
const ANCHOR: (i32, u32, u32) = (2025, 12, 1);

const PRODUCTS: [(&str, &str); 8] = [
    ("Laptop", "Electronics"),
    ("Monitor", "Electronics"),
    ("Mouse", "Accessories"),
    ("Keyboard", "Accessories"),
    ("Webcam", "Accessories"),
    ("Headphones", "Accessories"),
    ("Speaker", "Audio"),
    ("Microphone", "Audio"),
];

const PAYMENT_METHODS: [&str; 4] = ["Credit Card", "Debit Card", "Cash", "Online Transfer"];
const GENDERS: [&str; 2] = ["Male", "Female"];

const ACTIVE_CITIES: [&str; 3] = ["New York", "Los Angeles", "Chicago"];
const CHURNED_CITIES: [&str; 3] = ["Houston", "Phoenix", "Philadelphia"];

struct CohortSpec {
    cities: &'static [&'static str],
    quantity: std::ops::Range<i64>,
    price: std::ops::Range<f64>,
    days_back: std::ops::Range<i64>,
    discount_rate: f64,
}

/// Build a synthetic transaction table with `records` rows.
///
/// Half the rows come from "active" cities with purchases inside the churn
/// window, the other half from "churned" cities whose last purchase lies
/// 31 to 365 days back, so a trained model always sees both classes. Rows
/// come back sorted by transaction date.
pub fn generate_transactions(records: usize, seed: u64) -> crate::Result<DataFrame> {
    if records < 2 {
        anyhow::bail!("at least 2 records are needed to cover both cohorts");
    }
    let anchor = NaiveDate::from_ymd_opt(ANCHOR.0, ANCHOR.1, ANCHOR.2)
        .ok_or_else(|| anyhow::anyhow!("invalid anchor date"))?;
    let half = records / 2;

    let active = CohortSpec {
        cities: &ACTIVE_CITIES,
        quantity: 2..6,
        price: 50.0..1200.0,
        days_back: 0..30,
        discount_rate: 0.2,
    };
    let churned = CohortSpec {
        cities: &CHURNED_CITIES,
        quantity: 1..3,
        price: 10.0..500.0,
        days_back: 31..365,
        discount_rate: 0.1,
    };

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut order_ids = Vec::with_capacity(2 * half);
    let mut products = Vec::with_capacity(2 * half);
    let mut quantities = Vec::with_capacity(2 * half);
    let mut prices = Vec::with_capacity(2 * half);
    let mut ages = Vec::with_capacity(2 * half);
    let mut cities = Vec::with_capacity(2 * half);
    let mut payments = Vec::with_capacity(2 * half);
    let mut dates = Vec::with_capacity(2 * half);
    let mut genders = Vec::with_capacity(2 * half);
    let mut categories = Vec::with_capacity(2 * half);
    let mut discounts = Vec::with_capacity(2 * half);

    let mut next_order_id = 1i64;
    for cohort in [&active, &churned] {
        for _ in 0..half {
            let (product, category) = PRODUCTS[rng.gen_range(0..PRODUCTS.len())];
            let date = anchor - Duration::days(rng.gen_range(cohort.days_back.clone()));

            order_ids.push(next_order_id);
            next_order_id += 1;
            products.push(product);
            quantities.push(rng.gen_range(cohort.quantity.clone()));
            prices.push((rng.gen_range(cohort.price.clone()) * 100.0).round() / 100.0);
            ages.push(rng.gen_range(18..70i64));
            cities.push(*cohort.cities.choose(&mut rng).unwrap_or(&cohort.cities[0]));
            payments.push(*PAYMENT_METHODS.choose(&mut rng).unwrap_or(&PAYMENT_METHODS[0]));
            dates.push(date.format("%Y-%m-%d").to_string());
            genders.push(*GENDERS.choose(&mut rng).unwrap_or(&GENDERS[0]));
            categories.push(category);
            discounts.push(rng.gen_bool(cohort.discount_rate));
        }
    }

    let df = df!(
        COL_ORDER_ID => order_ids,
        COL_PRODUCT => products,
        COL_QUANTITY => quantities,
        COL_PRICE => prices,
        COL_AGE => ages,
        COL_CITY => cities,
        COL_PAYMENT => payments,
        COL_DATE => dates,
        COL_GENDER => genders,
        COL_CATEGORY => categories,
        COL_DISCOUNT => discounts,
    )?;

    // ISO dates sort correctly as strings
    let sorted = df
        .lazy()
        .sort([COL_DATE], SortMultipleOptions::default())
        .collect()?;
    Ok(sorted)
}

/// Generate a transaction table and write it as CSV.
pub fn write_demo_data(path: &Path, records: usize, seed: u64) -> crate::Result<()> {
    let mut df = generate_transactions(records, seed)?;
    data::write_csv(&mut df, path)?;
    info!(path = %path.display(), rows = df.height(), "synthetic transactions generated");
    Ok(())
}
