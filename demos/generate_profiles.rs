use soa_ledger_builder::{
    generate_profiles, ProfileGenerator, TemplateSource, ARCHIVE_FILENAME,
};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let Some(master_path) = std::env::args().nth(1) else {
        println!("Usage: cargo run --example generate_profiles -- <masters-list.xlsx> [template.xlsx]");
        return Ok(());
    };

    let template = match std::env::args().nth(2) {
        Some(path) => TemplateSource::from_path(path)?,
        None => TemplateSource::locate_default()?,
    };
    println!("🧾 Template: {}", template.origin());

    let generator = ProfileGenerator::new(template)?;
    let archive = generate_profiles(&std::fs::read(&master_path)?, &generator)?;

    std::fs::write(ARCHIVE_FILENAME, &archive)?;
    println!("✅ Wrote {} ({} bytes)", ARCHIVE_FILENAME, archive.len());

    Ok(())
}
