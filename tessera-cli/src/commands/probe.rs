//! Probe command implementation - print a source's resolution pyramid and
//! optionally the level a target resolution selects.

use anyhow::Result;
use std::path::PathBuf;

pub fn execute(source: PathBuf, resolution: Option<f64>) -> Result<()> {
    let config = super::load_source_config(&source)?;
    let levels = config.level_set()?;

    println!("source: {}", config.name);
    println!(
        "coverage: lat {}..{}, lon {}..{}",
        levels.sector().min_latitude,
        levels.sector().max_latitude,
        levels.sector().min_longitude,
        levels.sector().max_longitude
    );
    println!("level  tile delta  texel size     grid");
    for level in levels.levels() {
        println!(
            "{:>5}  {:>9.4}°  {:>11.6}°/px  {}x{}",
            level.level_number,
            level.tile_delta,
            level.texel_size(),
            level.num_rows,
            level.num_columns
        );
    }

    if let Some(target) = resolution {
        let selected = levels.level_for_resolution(target);
        println!(
            "target {target}°/px selects level {} (texel {:.6}°/px)",
            selected.level_number,
            selected.texel_size()
        );
    }
    Ok(())
}
