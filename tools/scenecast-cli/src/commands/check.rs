//! Check encoder availability.

use scenecast_common::AppConfig;
use scenecast_export_engine::is_encoder_available;

pub fn run() -> anyhow::Result<()> {
    println!("Scenecast System Check");
    println!("{}", "=".repeat(50));

    let config = AppConfig::load();
    println!("Encoder binary: {}", config.encoder.binary.display());

    if is_encoder_available(&config.encoder) {
        println!("[OK] Encoder is runnable");
        Ok(())
    } else {
        println!("[FAIL] Encoder not found or not runnable");
        Err(anyhow::anyhow!(
            "encoder '{}' unavailable",
            config.encoder.binary.display()
        ))
    }
}
