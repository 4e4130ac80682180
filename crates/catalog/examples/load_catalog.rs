use catalog::ReferenceCatalog;
use std::path::Path;
use std::time::Instant;

fn main() {
    let path = Path::new("data/tourism_with_id.csv");

    println!("Loading catalog from {}...\n", path.display());

    let start = Instant::now();
    let catalog = ReferenceCatalog::load(path, "Place_Id")
        .expect("Failed to load catalog");
    let elapsed = start.elapsed();

    println!("=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Rows: {}", catalog.len());
    println!("Columns: {}", catalog.columns().join(", "));
    println!("\nPerformance: {:.0} rows/second",
             catalog.len() as f64 / elapsed.as_secs_f64());
}
