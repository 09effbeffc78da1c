//! ChurnForge: retail churn analytics CLI
//!
//! This is the main entrypoint that orchestrates data generation, reporting,
//! model training and churn scoring.

use anyhow::Result;
use churnforge::{
    cli::{Cli, Command},
    data, gen, report, score, viz,
    model::{self, ArtifactCache, BoostingParams},
    TableCache,
};
use clap::Parser;
use std::path::Path;
use std::time::Instant;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();
    cli.validate()?;

    let default_filter = if cli.verbose {
        "churnforge=debug"
    } else {
        "churnforge=info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let mut tables = TableCache::new();
    let mut artifacts = ArtifactCache::new();

    match &cli.command {
        Command::Generate {
            output,
            records,
            seed,
        } => run_generate(output, *records, *seed),
        Command::Etl { input, output } => run_etl(&mut tables, input, output),
        Command::Analytics { input, output } => run_analytics(&mut tables, input, output),
        Command::Train {
            input,
            artifacts: artifact_dir,
            plot,
            n_estimators,
            learning_rate,
            max_depth,
            seed,
        } => {
            let params = BoostingParams {
                n_estimators: *n_estimators,
                learning_rate: *learning_rate,
                max_depth: *max_depth,
                seed: *seed,
                ..BoostingParams::default()
            };
            run_train(&mut tables, input, artifact_dir, plot, &params, cli.verbose)
        }
        Command::Predict {
            artifacts: artifact_dir,
            frequency,
            monetary,
            product_variety,
            average_age,
            gender,
            discount_rate,
            product_category_variety,
        } => {
            let profile = score::CustomerProfile {
                frequency: *frequency,
                monetary: *monetary,
                product_variety: *product_variety,
                average_age: *average_age,
                gender: gender.clone(),
                discount_rate: *discount_rate,
                product_category_variety: *product_category_variety,
            };
            run_predict(&mut artifacts, artifact_dir, &profile)
        }
        Command::Score {
            artifacts: artifact_dir,
            profiles,
            output,
            seed,
        } => run_score(&mut artifacts, artifact_dir, *profiles, *seed, output),
        Command::Report { input } => run_report(&mut tables, input),
        Command::Export {
            input,
            output,
            products,
        } => run_export(&mut tables, input, output, products),
    }
}

fn run_generate(output: &Path, records: usize, seed: u64) -> Result<()> {
    println!("=== Generating Synthetic Transactions ===");

    let start_time = Instant::now();
    gen::write_demo_data(output, records, seed)?;

    println!(
        "✓ Generated {} transaction records to: {}",
        records,
        output.display()
    );
    println!("  Processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn run_etl(tables: &mut TableCache, input: &Path, output: &Path) -> Result<()> {
    println!("=== Sales Per Product ===");

    let df = tables.load(input)?;
    let mut processed = report::sales_per_product(&df)?;
    data::write_csv(&mut processed, output)?;

    println!(
        "✓ Total sales for {} products written to: {}",
        processed.height(),
        output.display()
    );
    Ok(())
}

fn run_analytics(tables: &mut TableCache, input: &Path, output: &Path) -> Result<()> {
    println!("=== Monthly Analytics ===");

    let df = tables.load(input)?;
    let mut monthly = report::monthly_analysis(&df)?;
    data::write_csv(&mut monthly, output)?;

    println!(
        "✓ Monthly analysis for {} months written to: {}",
        monthly.height(),
        output.display()
    );
    Ok(())
}

fn run_train(
    tables: &mut TableCache,
    input: &Path,
    artifact_dir: &Path,
    plot: &Path,
    params: &BoostingParams,
    verbose: bool,
) -> Result<()> {
    println!("=== Training Churn Model ===\n");

    let start_time = Instant::now();
    let df = tables.load(input)?;
    println!("✓ Data loaded: {} transactions", df.height());

    if verbose {
        println!("  Estimators: {}", params.n_estimators);
        println!("  Learning rate: {}", params.learning_rate);
        println!("  Max depth: {}", params.max_depth);
        println!("  Seed: {}", params.seed);
    }

    let outcome = model::train_churn_model(&df, params)?;
    println!(
        "✓ Model trained on {} cities ({} train / {} test)",
        outcome.n_cities, outcome.n_train, outcome.n_test
    );
    println!("  Holdout accuracy: {:.2}", outcome.accuracy);

    outcome.artifacts.save_to_dir(artifact_dir)?;
    println!("✓ Artifacts saved to: {}", artifact_dir.display());

    viz::plot_feature_importance(
        &outcome.artifacts.columns,
        &outcome.artifacts.model.feature_importances,
        &plot.to_string_lossy(),
    )?;

    println!(
        "\nTotal processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

fn run_predict(
    cache: &mut ArtifactCache,
    artifact_dir: &Path,
    profile: &score::CustomerProfile,
) -> Result<()> {
    println!("=== Churn Prediction ===");
    println!(
        "Input profile: F={}, M={:.2}, products={}, age={:.0}, gender={}, discounts={:.2}, categories={}",
        profile.frequency,
        profile.monetary,
        profile.product_variety,
        profile.average_age,
        profile.gender,
        profile.discount_rate,
        profile.product_category_variety
    );

    let artifacts = cache.load(artifact_dir)?;
    let prediction = score::predict_profile(&artifacts, profile)?;

    if prediction.churn {
        println!("\n✓ Prediction: Customer is likely to CHURN");
        println!(
            "  Churn probability: {:.2}%",
            prediction.churn_probability * 100.0
        );
    } else {
        println!("\n✓ Prediction: Customer is likely to STAY");
        println!(
            "  Stay probability: {:.2}%",
            prediction.stay_probability() * 100.0
        );
    }
    Ok(())
}

fn run_score(
    cache: &mut ArtifactCache,
    artifact_dir: &Path,
    profiles: usize,
    seed: u64,
    output: &Path,
) -> Result<()> {
    println!("=== Batch Scoring ===\n");

    let start_time = Instant::now();
    let artifacts = cache.load(artifact_dir)?;
    let batch = score::random_profiles(profiles, seed);
    println!("✓ Generated {} customer profiles", batch.len());

    let mut outcome = score::score_batch(&artifacts, &batch)?;
    data::write_csv(&mut outcome.scored, output)?;
    println!("✓ Scored profiles written to: {}", output.display());

    println!("\nHighest churn risk ({:.2}%):", outcome.highest.1 * 100.0);
    print_profile(&outcome.highest.0);
    println!("\nLowest churn risk ({:.2}%):", outcome.lowest.1 * 100.0);
    print_profile(&outcome.lowest.0);

    println!(
        "\nTotal processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}

fn print_profile(profile: &score::CustomerProfile) {
    println!("  Frequency: {}", profile.frequency);
    println!("  Monetary: {:.2}", profile.monetary);
    println!("  Product variety: {}", profile.product_variety);
    println!("  Average age: {:.0}", profile.average_age);
    println!("  Gender: {}", profile.gender);
    println!("  Discount rate: {:.2}", profile.discount_rate);
    println!("  Category variety: {}", profile.product_category_variety);
}

fn run_report(tables: &mut TableCache, input: &Path) -> Result<()> {
    println!("=== Business Overview ===\n");

    let df = tables.load(input)?;
    let metrics = report::business_metrics(&df)?;

    println!("Total Revenue: ${:.2}", metrics.total_revenue);
    println!("Average Order Value: ${:.2}", metrics.average_order_value);
    println!(
        "Churn Rate: {:.2}% ({} of {} cities)",
        metrics.churn_rate, metrics.churned_cities, metrics.total_cities
    );
    Ok(())
}

fn run_export(
    tables: &mut TableCache,
    input: &Path,
    output: &Path,
    products: &[String],
) -> Result<()> {
    println!("=== Data Export ===");

    let df = tables.load(input)?;
    let mut filtered = data::filter_by_products(&df, products)?;
    data::write_csv(&mut filtered, output)?;

    if products.is_empty() {
        println!(
            "✓ Exported all {} rows to: {}",
            filtered.height(),
            output.display()
        );
    } else {
        println!(
            "✓ Exported {} rows for {} products to: {}",
            filtered.height(),
            products.len(),
            output.display()
        );
    }
    Ok(())
}
