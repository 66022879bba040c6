//! Reading a CSV file into typed records with inference and error skipping.
//!
//! Run with: cargo run --example typed_csv

use chrono::NaiveDate;
use ingestguard::{
    CsvLimits, CsvOptions, CsvReader, ErrorAction, MemoryErrorSink, ProgressCadence, ReadOptions,
    materialize_properties,
};
use rust_decimal::Decimal;

#[derive(Debug, Default)]
struct Order {
    order_id: String,
    customer: String,
    placed_on: Option<NaiveDate>,
    total: Decimal,
    express: bool,
}

materialize_properties!(Order {
    order_id: String,
    customer: String,
    placed_on: Option<NaiveDate>,
    total: Decimal,
    express: bool,
});

const ORDERS: &str = "\
Order ID,Customer,Placed On,Total,Express
00017,Ada Lovelace,2024-03-01,129.90,true
00018,Charles Babbage,2024-03-02,15.00,false
00019,Grace Hopper,2024-03-02,not-a-number,true
00020,Alan Turing,,42.00,false,extra
00021,Edsger Dijkstra,2024-03-04,7.25,false
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let errors = MemoryErrorSink::new();

    // Skip bad rows and report progress every two records
    let read = ReadOptions::new()
        .with_error_action(ErrorAction::Skip)
        .with_error_sink(errors.clone())
        .with_file_id("orders.csv")
        .with_progress_cadence(ProgressCadence::records(2))
        .with_progress(|report| println!("  progress: {} records", report.records_emitted));
    let metrics = read.metrics().clone();

    let options = CsvOptions::new()
        .with_preserve_leading_zeros(true)
        .with_limits(CsvLimits::default().with_max_columns(5));

    let mut reader = CsvReader::<_, Order>::new(ORDERS.as_bytes(), options, read);
    let orders = reader.by_ref().collect::<Result<Vec<_>, _>>()?;

    println!("Column types: {:?}", reader.column_types());
    println!("Read {} order(s):", orders.len());
    for order in &orders {
        println!(
            "  - {} {} {:?} {} (express: {})",
            order.order_id, order.customer, order.placed_on, order.total, order.express
        );
    }

    println!("Skipped {} row(s):", errors.len());
    for error in errors.errors() {
        println!("  - {}", error);
    }

    println!("{:?}", metrics.snapshot());
    Ok(())
}
