//! Transaction table access: CSV loading, validity filtering and a
//! process-local cache keyed by file identity.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Context;
use polars::prelude::*;
use tracing::{debug, info, warn};

/// Column names of the flat transaction table
pub const COL_ORDER_ID: &str = "OrderID";
pub const COL_PRODUCT: &str = "Product";
pub const COL_QUANTITY: &str = "Quantity";
pub const COL_PRICE: &str = "Price";
pub const COL_AGE: &str = "CustomerAge";
pub const COL_CITY: &str = "City";
pub const COL_PAYMENT: &str = "PaymentMethod";
pub const COL_DATE: &str = "TransactionDate";
pub const COL_GENDER: &str = "Customer_Gender";
pub const COL_CATEGORY: &str = "Product_Category";
pub const COL_DISCOUNT: &str = "Discount_Applied";

/// Columns every transaction table must provide
pub const REQUIRED_COLUMNS: [&str; 11] = [
    COL_ORDER_ID,
    COL_PRODUCT,
    COL_QUANTITY,
    COL_PRICE,
    COL_AGE,
    COL_CITY,
    COL_PAYMENT,
    COL_DATE,
    COL_GENDER,
    COL_CATEGORY,
    COL_DISCOUNT,
];

/// Load the transaction table from a CSV file.
///
/// Dates are parsed as `%Y-%m-%d` and rows with a negative quantity or price
/// are dropped. The full table schema is validated up front so downstream
/// stages can rely on every column being present.
///
/// # Arguments
/// * `path` - Path to the transaction CSV file
///
/// # Returns
/// * `DataFrame` with `TransactionDate` as a Date column
pub fn load_transactions(path: &Path) -> crate::Result<DataFrame> {
    if !path.exists() {
        anyhow::bail!("transaction file not found at {}", path.display());
    }

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
        .with_context(|| format!("failed to read transactions from {}", path.display()))?;

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|name| df.column(name).is_err())
        .collect();
    if !missing.is_empty() {
        anyhow::bail!(
            "{} is missing required columns: {}",
            path.display(),
            missing.join(", ")
        );
    }

    let date_needs_parse = df.column(COL_DATE)?.dtype() == &DataType::String;
    let discount_needs_cast = df.column(COL_DISCOUNT)?.dtype() == &DataType::String;
    let before = df.height();

    let mut lf = df.lazy();
    if date_needs_parse {
        lf = lf.with_columns([col(COL_DATE).str().to_date(StrptimeOptions {
            format: Some("%Y-%m-%d".into()),
            strict: true,
            exact: true,
            cache: true,
        })]);
    }
    if discount_needs_cast {
        lf = lf.with_columns([col(COL_DISCOUNT).cast(DataType::Boolean)]);
    }
    let df = lf
        .filter(
            // Drop invalid rows instead of failing the whole load
            col(COL_QUANTITY)
                .gt_eq(lit(0))
                .and(col(COL_PRICE).gt_eq(lit(0.0))),
        )
        .collect()
        .with_context(|| format!("failed to parse transactions from {}", path.display()))?;

    let dropped = before - df.height();
    if dropped > 0 {
        warn!(dropped, "dropped transactions with negative quantity or price");
    }
    if df.height() == 0 {
        anyhow::bail!("no valid transactions found in {}", path.display());
    }

    debug!(rows = df.height(), "transaction table loaded");
    Ok(df)
}

/// Distinct product names in the table, sorted alphabetically.
pub fn distinct_products(df: &DataFrame) -> crate::Result<Vec<String>> {
    let mut products = BTreeSet::new();
    for value in df.column(COL_PRODUCT)?.str()?.into_no_null_iter() {
        products.insert(value.to_string());
    }
    Ok(products.into_iter().collect())
}

/// Keep only transactions whose product is in `products`.
///
/// An empty selection keeps everything, matching the explorer's default of
/// all products selected.
pub fn filter_by_products(df: &DataFrame, products: &[String]) -> crate::Result<DataFrame> {
    if products.is_empty() {
        return Ok(df.clone());
    }
    let selection = Series::new("selection", products);
    let filtered = df
        .clone()
        .lazy()
        .filter(col(COL_PRODUCT).is_in(lit(selection)))
        .collect()?;
    Ok(filtered)
}

/// Write a frame as CSV, creating parent directories as needed.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    let mut file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    info!(path = %path.display(), rows = df.height(), "csv written");
    Ok(())
}

/// Process-local cache for the transaction table.
///
/// A reread happens only when the path, file size or modification time
/// changes, or after an explicit [`TableCache::invalidate`].
#[derive(Debug, Default)]
pub struct TableCache {
    entry: Option<CacheEntry>,
}

#[derive(Debug)]
struct CacheEntry {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
    table: DataFrame,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table at `path`, reusing the cached copy when the file is
    /// unchanged.
    pub fn load(&mut self, path: &Path) -> crate::Result<DataFrame> {
        let meta = fs::metadata(path)
            .with_context(|| format!("transaction file not found at {}", path.display()))?;
        let len = meta.len();
        let modified = meta.modified().ok();

        if let Some(entry) = &self.entry {
            if entry.path == path && entry.len == len && entry.modified == modified {
                debug!(path = %path.display(), "table cache hit");
                return Ok(entry.table.clone());
            }
        }

        let table = load_transactions(path)?;
        info!(path = %path.display(), rows = table.height(), "table cache refreshed");
        self.entry = Some(CacheEntry {
            path: path.to_path_buf(),
            len,
            modified,
            table: table.clone(),
        });
        Ok(table)
    }

    /// Drop the cached table; the next `load` rereads from disk.
    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}
