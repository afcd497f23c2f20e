use soa_ledger_builder::{extract_file, resolve_with_trace, SoaSources, Workbook};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let Some(path) = std::env::args().nth(1) else {
        println!("Usage: cargo run --example extract_file -- \"<NN Name>.xlsx\"");
        return Ok(());
    };

    println!("📄 Extracting {}", path);
    let data = extract_file(&path)?;
    println!("{}", serde_json::to_string_pretty(&data)?);

    // Show where each statement total came from.
    let workbook = Workbook::from_bytes(&std::fs::read(&path)?)?;
    if let Some(soa) = workbook.find_sheet("01 SOA") {
        let resolved = resolve_with_trace(&SoaSources::new(soa, workbook.find_sheet("00 ACC DETAILS")));
        println!("\n🔎 Resolution tiers:");
        for (field, tier) in resolved.trace {
            match tier {
                Some(tier) => println!("   {:<10} {:?}", format!("{:?}", field), tier),
                None => println!("   {:<10} (empty)", format!("{:?}", field)),
            }
        }
    }

    if data.file_id.is_empty() {
        println!("\n⚠️  No file id in the file name; this file cannot be injected.");
    }

    Ok(())
}
